//! An interactive assistant for the terminal.

#[macro_use]
extern crate tracing;

use std::io::Write as _;
use std::process::ExitCode;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use lookout::core::checkpoint::FileStore;
use lookout::core::conversation::Message;
use lookout::core::{StepEvent, TurnConfig, cancellation};
use lookout::tools::SearchTool;
use lookout::{Session, SessionBuilder, Settings};
use lookout_openai_model::OpenAIProvider;
use owo_colors::OwoColorize;
use tokio::io::{self, AsyncBufReadExt};
use tokio::select;
use tokio::signal;

const BAR_CHAR: &str = "▎";

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    debug!("loaded {settings:?}");

    let session = match build_session(&settings) {
        Ok(session) => session,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");

    loop {
        print!("User: ");
        let _ = std::io::stdout().flush();

        let line = select! {
            line = read_line() => line,
            _ = signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            println!("\nExiting...");
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if ["quit", "exit", "q"]
            .iter()
            .any(|word| line.eq_ignore_ascii_case(word))
        {
            println!("Goodbye!");
            break;
        }

        let progress_bar = ProgressBar::new_spinner();
        progress_bar.set_style(progress_style.clone());
        progress_bar.set_message("🔎 Thinking...");
        progress_bar.enable_steady_tick(Duration::from_millis(100));

        let (cancel_handle, cancel) = cancellation();
        let turn = session.send_message(line, &cancel, |event| {
            progress_bar.suspend(|| print_step(&event));
        });
        tokio::pin!(turn);

        let interrupted = select! {
            biased;

            _ = &mut turn => false,
            _ = signal::ctrl_c() => true,
        };
        if interrupted {
            // Let the turn observe the cancellation and stop cleanly.
            cancel_handle.cancel();
            let _ = turn.await;
        }
        progress_bar.finish_and_clear();

        if interrupted {
            println!("\nExiting...");
            break;
        }
    }

    ExitCode::SUCCESS
}

fn build_session(
    settings: &Settings,
) -> Result<Session, lookout_openai_model::Error> {
    let model_provider = OpenAIProvider::new(settings.openai_config())?;
    let search_tool = SearchTool::new(settings.tavily_api_key.clone())
        .with_max_results(settings.max_results);

    let mut builder = SessionBuilder::with_model_provider(model_provider)
        .with_thread_id(settings.thread_id.clone())
        .with_system_prompt(include_str!("./system_prompt.md"))
        .with_search_tool(search_tool)
        .with_config(TurnConfig {
            max_iterations: settings.max_iterations,
            ..TurnConfig::default()
        });
    if let Some(state_dir) = &settings.state_dir {
        info!("saving conversations in {}", state_dir.display());
        builder = builder.with_store(FileStore::new(state_dir));
    }
    Ok(builder.build())
}

fn print_step(event: &StepEvent) {
    match event {
        StepEvent::Assistant(msg) => {
            let bar = BAR_CHAR.bright_cyan();
            if !msg.content().is_empty() {
                println!("{bar}Assistant: {}", msg.content().bright_white());
            }
            for call in msg.tool_calls() {
                let arguments =
                    serde_json::Value::Object(call.arguments.clone());
                let call = format!("→ {}({arguments})", call.name);
                println!("{bar}{}", call.dimmed());
            }
        }
        StepEvent::ToolResult(msg) => {
            let bar = BAR_CHAR.bright_black();
            let content = truncate(msg.content(), 300);
            match msg {
                Message::Tool(tool_msg) if tool_msg.is_error => {
                    println!("{bar}Tool: {}", content.bright_red());
                }
                _ => println!("{bar}Tool: {}", content.dimmed()),
            }
        }
        StepEvent::Failed(failure) => {
            let bar = BAR_CHAR.bright_red();
            println!("{bar}Error during the turn: {}", failure.bright_red());
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_owned(),
    }
}

async fn read_line() -> Option<String> {
    let mut stdin = io::BufReader::new(io::stdin());
    let mut line = String::new();

    match stdin.read_line(&mut line).await {
        Ok(count) => {
            if count == 0 {
                return None;
            }
            Some(line)
        }
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}
