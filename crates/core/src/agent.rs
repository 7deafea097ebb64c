mod builder;
mod cancel;
mod config;
mod event;
mod retry;
mod state;

use std::sync::Arc;

use lookout_model::{ModelMessage, ModelRequest};
use tracing::Instrument;

pub use builder::AgentBuilder;
pub use cancel::{CancelHandle, Cancellation, cancellation};
pub use config::{RetryPolicy, TurnConfig};
pub use event::{FailureReason, StepEvent, TurnFailure};
pub use state::TurnState;

use crate::checkpoint::{Checkpointer, Error as CheckpointError};
use crate::conversation::{ConversationState, Message};
use crate::model_client::ModelClient;
use crate::tool::Executor as ToolExecutor;
use state::Turn;

/// An agent drives conversations with a model provider and a set of
/// tools, turn by turn.
///
/// Conversations are identified by a thread id and checkpointed in the
/// agent's store. Turns on the same thread wait for each other, turns on
/// distinct threads run independently. The agent is cheap to clone, clones
/// share the same store and locks.
#[derive(Clone)]
pub struct Agent {
    inner: Arc<AgentInner>,
}

struct AgentInner {
    model_client: ModelClient,
    tool_executor: ToolExecutor,
    checkpointer: Checkpointer,
    system_prompt: Option<String>,
    config: TurnConfig,
}

impl Agent {
    /// Runs one user turn on a thread.
    ///
    /// The user input is appended to the thread, then the model and the
    /// requested tools are invoked in turns until the model gives a final
    /// answer, which is returned. Every intermediate step is reported to
    /// `on_step`, including the failure if the turn fails.
    ///
    /// When the turn fails, the thread keeps its last checkpoint.
    pub async fn run_turn<F>(
        &self,
        thread_id: &str,
        user_text: &str,
        cancel: &Cancellation,
        mut on_step: F,
    ) -> Result<Message, TurnFailure>
    where
        F: FnMut(StepEvent) + Send,
    {
        let span = debug_span!("turn", thread = thread_id);
        async {
            let lease = self.inner.checkpointer.acquire(thread_id).await;
            let result = match Turn::begin(&self.inner, lease, cancel).await {
                Ok(turn) => turn.run(user_text, &mut on_step).await,
                Err(failure) => Err(failure),
            };
            if let Err(failure) = &result {
                warn!("turn failed: {failure}");
                on_step(StepEvent::Failed(failure.clone()));
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Loads the checkpointed conversation of a thread.
    ///
    /// Waits for a running turn of the thread to finish first.
    pub async fn load_conversation(
        &self,
        thread_id: &str,
    ) -> Result<ConversationState, CheckpointError> {
        let lease = self.inner.checkpointer.acquire(thread_id).await;
        lease.load().await
    }
}

impl Agent {
    fn from_builder(builder: AgentBuilder) -> Self {
        let AgentBuilder {
            model_client,
            tools,
            store,
            system_prompt,
            config,
        } = builder;

        let inner = AgentInner {
            model_client,
            tool_executor: ToolExecutor::with_tools(tools),
            checkpointer: Checkpointer::new(store),
            system_prompt,
            config,
        };
        Self {
            inner: Arc::new(inner),
        }
    }
}

impl AgentInner {
    fn build_model_request(&self, state: &ConversationState) -> ModelRequest {
        let system = self
            .system_prompt
            .iter()
            .map(|prompt| ModelMessage::System(prompt.clone()));
        ModelRequest {
            messages: system
                .chain(state.messages.iter().map(Message::to_model_message))
                .collect(),
            tools: self.tool_executor.definitions(),
        }
    }
}
