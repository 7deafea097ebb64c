use std::collections::HashMap;
use std::fmt::{self, Display};

use lookout_model::ToolCall;
use serde_json::Value;
use tokio::select;
use tokio::time::timeout;

use super::retry::{Retrier, Stop};
use super::{AgentInner, Cancellation, FailureReason, StepEvent, TurnFailure};
use crate::checkpoint::ThreadLease;
use crate::conversation::{AssistantReply, ConversationState, Message};
use crate::tool::{Error as ToolError, ToolResult};

/// Stages of a turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TurnState {
    /// Waiting for the model to answer the conversation.
    AwaitModel,
    /// Running the tools requested by the last answer.
    AwaitTools,
    /// The model gave a final answer.
    Done,
    /// The turn stopped without a final answer.
    Failed,
}

impl Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnState::AwaitModel => write!(f, "AWAIT_MODEL"),
            TurnState::AwaitTools => write!(f, "AWAIT_TOOLS"),
            TurnState::Done => write!(f, "DONE"),
            TurnState::Failed => write!(f, "FAILED"),
        }
    }
}

/// What to do next, with the data the next stage works on.
enum Next {
    AwaitModel,
    AwaitTools(Vec<ToolCall>),
    Done(Message),
}

/// The working copy of a thread during one turn.
///
/// Nothing in here is visible to anyone else until it's checkpointed.
pub(super) struct Turn<'a> {
    agent: &'a AgentInner,
    lease: ThreadLease,
    cancel: &'a Cancellation,
    conversation: ConversationState,
    state: TurnState,
    iterations: usize,
    // Failures of each tool call signature in this turn.
    tool_failures: HashMap<(String, String), usize>,
}

impl<'a> Turn<'a> {
    pub(super) async fn begin(
        agent: &'a AgentInner,
        lease: ThreadLease,
        cancel: &'a Cancellation,
    ) -> Result<Self, TurnFailure> {
        if cancel.is_cancelled() {
            return Err(TurnFailure::cancelled());
        }
        let conversation = lease.load().await.map_err(|err| {
            TurnFailure::new(FailureReason::CheckpointFailed, err.to_string())
        })?;
        debug!("loaded {} messages", conversation.messages.len());
        Ok(Self {
            agent,
            lease,
            cancel,
            conversation,
            state: TurnState::AwaitModel,
            iterations: 0,
            tool_failures: HashMap::new(),
        })
    }

    pub(super) async fn run(
        mut self,
        user_text: &str,
        on_step: &mut (dyn FnMut(StepEvent) + Send),
    ) -> Result<Message, TurnFailure> {
        let result = self.drive(user_text, on_step).await;
        if result.is_err() {
            debug!("{} -> {}", self.state, TurnState::Failed);
            self.state = TurnState::Failed;
        }
        result
    }

    async fn drive(
        &mut self,
        user_text: &str,
        on_step: &mut (dyn FnMut(StepEvent) + Send),
    ) -> Result<Message, TurnFailure> {
        self.resume_pending_tool_calls(on_step).await?;

        self.conversation.messages.push(Message::user(user_text));
        self.transition(TurnState::AwaitModel).await?;

        let mut next = Next::AwaitModel;
        loop {
            next = match next {
                Next::AwaitModel => self.await_model(on_step).await?,
                Next::AwaitTools(calls) => {
                    self.await_tools(calls, on_step).await?
                }
                Next::Done(message) => return Ok(message),
            };
        }
    }

    async fn await_model(
        &mut self,
        on_step: &mut (dyn FnMut(StepEvent) + Send),
    ) -> Result<Next, TurnFailure> {
        let max_iterations = self.agent.config.max_iterations;
        if self.iterations >= max_iterations {
            return Err(TurnFailure::new(
                FailureReason::MaxIterationsExceeded,
                format!("no final answer after {max_iterations} model requests"),
            ));
        }
        self.iterations += 1;

        let reply = self.invoke_model().await?;
        let message = reply.to_message();
        self.conversation.messages.push(message.clone());

        let next = match reply {
            AssistantReply::Final(_) => {
                self.transition(TurnState::Done).await?;
                Next::Done(message.clone())
            }
            AssistantReply::ToolRequest { calls, .. } => {
                self.transition(TurnState::AwaitTools).await?;
                Next::AwaitTools(calls)
            }
        };
        on_step(StepEvent::Assistant(message));
        Ok(next)
    }

    async fn await_tools(
        &mut self,
        calls: Vec<ToolCall>,
        on_step: &mut (dyn FnMut(StepEvent) + Send),
    ) -> Result<Next, TurnFailure> {
        // Calls run one by one, results are appended in the requested
        // order.
        for call in &calls {
            let message = self.run_tool_call(call).await?;
            self.conversation.messages.push(message.clone());
            on_step(StepEvent::ToolResult(message));
        }
        self.transition(TurnState::AwaitModel).await?;
        Ok(Next::AwaitModel)
    }

    /// Answers the tool calls a previous turn left behind, so that the
    /// conversation is valid again before the new input is appended.
    async fn resume_pending_tool_calls(
        &mut self,
        on_step: &mut (dyn FnMut(StepEvent) + Send),
    ) -> Result<(), TurnFailure> {
        let pending = self.conversation.pending_tool_calls().to_vec();
        if pending.is_empty() {
            return Ok(());
        }
        info!("resuming {} unanswered tool call(s)", pending.len());

        for call in &pending {
            let message = match self.run_tool_call(call).await {
                Ok(message) => message,
                Err(failure) if failure.reason() == FailureReason::Cancelled => {
                    return Err(failure);
                }
                Err(failure) => Message::tool_error(
                    &call.id,
                    format!("The tool call was interrupted: {failure}"),
                ),
            };
            self.conversation.messages.push(message.clone());
            on_step(StepEvent::ToolResult(message));
        }
        self.tool_failures.clear();
        self.checkpoint().await
    }

    async fn invoke_model(&self) -> Result<AssistantReply, TurnFailure> {
        let config = &self.agent.config;
        let request = self.agent.build_model_request(&self.conversation);
        let mut retrier = Retrier::new(&config.model_retry);

        loop {
            let attempt = timeout(
                config.model_timeout,
                self.agent.model_client.send_request(request.clone()),
            );
            let outcome = select! {
                biased;

                _ = self.cancel.cancelled() => {
                    return Err(TurnFailure::cancelled());
                }
                outcome = attempt => outcome,
            };

            let error = match outcome {
                Ok(Ok(resp)) => {
                    return AssistantReply::try_from(resp).map_err(|err| {
                        TurnFailure::new(
                            FailureReason::InvalidResponse,
                            err.to_string(),
                        )
                    });
                }
                Ok(Err(err)) if !err.kind().is_retryable() => {
                    return Err(TurnFailure::new(
                        FailureReason::InvalidResponse,
                        err.to_string(),
                    ));
                }
                Ok(Err(err)) => format!("{}: {err}", err.kind()),
                Err(_) => {
                    format!("no answer within {:?}", config.model_timeout)
                }
            };

            warn!("model request failed: {error}");
            match retrier.wait(self.cancel).await {
                Ok(()) => continue,
                Err(Stop::Cancelled) => return Err(TurnFailure::cancelled()),
                Err(Stop::Exhausted) => {
                    return Err(TurnFailure::new(
                        FailureReason::ModelUnavailable,
                        error,
                    ));
                }
            }
        }
    }

    /// Runs one tool call and turns its outcome into a tool message.
    ///
    /// Tool errors become error messages for the model to read, until the
    /// same call has failed too many times.
    async fn run_tool_call(
        &mut self,
        call: &ToolCall,
    ) -> Result<Message, TurnFailure> {
        if self.cancel.is_cancelled() {
            return Err(TurnFailure::cancelled());
        }

        let result = self.execute_with_retries(call).await?;
        let err = match result {
            Ok(content) => return Ok(Message::tool_result(&call.id, content)),
            Err(err) if !err.kind().is_recoverable() => {
                return Err(TurnFailure::new(
                    FailureReason::ToolNotFound,
                    err.to_string(),
                ));
            }
            Err(err) => err,
        };

        let signature = (
            call.name.clone(),
            Value::Object(call.arguments.clone()).to_string(),
        );
        let failures = self.tool_failures.entry(signature).or_default();
        *failures += 1;
        if *failures > self.agent.config.max_tool_failures {
            return Err(TurnFailure::new(
                FailureReason::ToolExecutionError,
                format!("`{}` failed {} times: {err}", call.name, *failures),
            ));
        }

        warn!("tool `{}` failed: {err}", call.name);
        Ok(Message::tool_error(&call.id, err.to_string()))
    }

    async fn execute_with_retries(
        &self,
        call: &ToolCall,
    ) -> Result<ToolResult, TurnFailure> {
        let config = &self.agent.config;
        let mut retrier = Retrier::new(&config.tool_retry);

        loop {
            let fut = match self.agent.tool_executor.prepare(call) {
                Ok(fut) => fut,
                Err(err) => return Ok(Err(err)),
            };
            let outcome = select! {
                biased;

                _ = self.cancel.cancelled() => {
                    return Err(TurnFailure::cancelled());
                }
                outcome = timeout(config.tool_timeout, fut) => outcome,
            };
            if let Ok(result) = outcome {
                return Ok(result);
            }

            warn!("tool `{}` timed out", call.name);
            match retrier.wait(self.cancel).await {
                Ok(()) => continue,
                Err(Stop::Cancelled) => return Err(TurnFailure::cancelled()),
                Err(Stop::Exhausted) => {
                    return Ok(Err(ToolError::execution_error().with_reason(
                        format!("no result within {:?}", config.tool_timeout),
                    )));
                }
            }
        }
    }

    async fn transition(&mut self, to: TurnState) -> Result<(), TurnFailure> {
        debug!("{} -> {to}", self.state);
        self.state = to;
        self.checkpoint().await
    }

    async fn checkpoint(&self) -> Result<(), TurnFailure> {
        self.lease.save(&self.conversation).await.map_err(|err| {
            TurnFailure::new(FailureReason::CheckpointFailed, err.to_string())
        })
    }
}
