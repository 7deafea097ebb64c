use lookout_model::{ModelFinishReason, ModelResponse, ToolCall};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The preset response for an assistant step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetResponse {
    /// Text of the answer.
    #[serde(default)]
    pub content: String,
    /// Tool calls in this answer.
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    /// If set, the request will fail in the first `failures` attempts.
    /// `Some(0)` means the request will fail infinitely.
    #[serde(default)]
    pub failures: Option<u64>,
    /// The kind of failure to report, defaults to an unavailable model.
    #[serde(default)]
    pub failure: PresetFailure,
}

/// How a failing preset response fails.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PresetFailure {
    /// The model cannot be reached.
    #[default]
    Unavailable,
    /// The model is rate limited.
    RateLimited,
    /// The model answered with garbage.
    InvalidResponse,
}

impl PresetResponse {
    /// Creates a final answer without tool calls.
    #[inline]
    pub fn text<S: Into<String>>(content: S) -> Self {
        Self {
            content: content.into(),
            tool_calls: vec![],
            failures: None,
            failure: PresetFailure::default(),
        }
    }

    /// Creates an answer requesting a single tool call.
    #[inline]
    pub fn tool_call<I, N>(id: I, name: N, arguments: Value) -> Self
    where
        I: Into<String>,
        N: Into<String>,
    {
        Self::text("").with_tool_call(id, name, arguments)
    }

    /// Appends another tool call to this answer.
    ///
    /// Non-object `arguments` are treated as no arguments.
    #[inline]
    pub fn with_tool_call<I, N>(
        mut self,
        id: I,
        name: N,
        arguments: Value,
    ) -> Self
    where
        I: Into<String>,
        N: Into<String>,
    {
        let arguments = match arguments {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        self.tool_calls.push(ToolCall {
            id: id.into(),
            name: name.into(),
            arguments,
        });
        self
    }

    /// Sets failure times before a successful response. `0` means the
    /// response will always be a failure.
    #[inline]
    pub fn with_failures(mut self, failures: u64) -> Self {
        self.failures = Some(failures);
        self
    }

    /// Sets the kind of failure reported by the failing attempts.
    #[inline]
    pub fn with_failure_kind(mut self, failure: PresetFailure) -> Self {
        self.failure = failure;
        self
    }

    pub(crate) fn to_response(&self) -> ModelResponse {
        ModelResponse {
            content: self.content.clone(),
            tool_calls: self.tool_calls.clone(),
            finish_reason: Some(if self.tool_calls.is_empty() {
                ModelFinishReason::Stop
            } else {
                ModelFinishReason::ToolCalls
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_serialize_deserialize() {
        let response = PresetResponse::text("Let me look it up.")
            .with_tool_call("1", "search", json!({ "query": "weather" }))
            .with_failures(2)
            .with_failure_kind(PresetFailure::RateLimited);

        let serialized = serde_json::to_string(&response).unwrap();
        let deserialized: PresetResponse =
            serde_json::from_str(&serialized).unwrap();

        assert_eq!(response, deserialized);
    }

    #[test]
    fn test_finish_reason() {
        let resp = PresetResponse::text("done").to_response();
        assert_eq!(resp.finish_reason, Some(ModelFinishReason::Stop));

        let resp = PresetResponse::tool_call("1", "search", json!({}))
            .to_response();
        assert_eq!(resp.finish_reason, Some(ModelFinishReason::ToolCalls));
        assert!(resp.content.is_empty());
    }
}
