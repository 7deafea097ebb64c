//! Core logic of the assistant, including the turn controller, the
//! conversation log, checkpointing and tool execution.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

mod agent;
pub mod checkpoint;
pub mod conversation;
mod model_client;
pub mod tool;

pub use agent::{
    Agent, AgentBuilder, CancelHandle, Cancellation, FailureReason,
    RetryPolicy, StepEvent, TurnConfig, TurnFailure, TurnState, cancellation,
};
pub use model_client::MalformedResponse;
