use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A complete response from the model provider.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModelResponse {
    /// The generated text.
    pub content: String,
    /// Tool calls requested by the model, in the order they were issued.
    pub tool_calls: Vec<ToolCall>,
    /// The reason the model finished generating, if reported.
    pub finish_reason: Option<ModelFinishReason>,
}

/// The reason why a model response has finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelFinishReason {
    /// The model needs to call a tool.
    ToolCalls,
    /// The model has finished generating text.
    Stop,
}

/// Describes a tool call request from the model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// The unique identifier for the tool call request, unique within
    /// the message that issued it.
    pub id: String,
    /// The name of the tool to call.
    pub name: String,
    /// The named arguments to pass to the tool.
    #[serde(default)]
    pub arguments: Map<String, Value>,
}
