use lookout_model::{
    ErrorKind, ModelFinishReason, ModelMessage, ModelRequest, ModelResponse,
    ModelTool, ToolCall as ModelToolCall,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, OpenAIConfig};

// ------------------------------
// Types shared in both directions
// ------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionToolCall {
    pub name: String,
    // The server sends the arguments as a JSON-encoded string.
    #[serde(default)]
    pub arguments: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub r#type: String,
    pub function: FunctionToolCall,
}

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ChatCompletion {
    pub choices: Vec<Choice>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
    pub finish_reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ChoiceMessage {
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
struct FunctionTool {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
struct Tool {
    r#type: &'static str,
    function: FunctionTool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: Option<String>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
    stream: bool,
}

// -----------
// Conversions
// -----------

#[inline]
pub fn create_request(
    req: &ModelRequest,
    config: &OpenAIConfig,
) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: config.model.clone(),
        messages: req.messages.iter().map(create_message).collect(),
        tools: req.tools.iter().map(create_tool).collect(),
        stream: false,
    }
}

fn create_message(msg: &ModelMessage) -> Message {
    match msg {
        ModelMessage::System(content) => Message::System {
            content: content.clone(),
        },
        ModelMessage::User(content) => Message::User {
            content: content.clone(),
        },
        ModelMessage::Assistant {
            content,
            tool_calls,
        } => Message::Assistant {
            // Some servers reject empty strings next to tool calls.
            content: if content.is_empty() && !tool_calls.is_empty() {
                None
            } else {
                Some(content.clone())
            },
            tool_calls: tool_calls.iter().map(create_tool_call).collect(),
        },
        ModelMessage::Tool(result) => Message::Tool {
            tool_call_id: result.id.clone(),
            content: result.content.clone(),
        },
    }
}

fn create_tool_call(call: &ModelToolCall) -> ToolCall {
    ToolCall {
        id: call.id.clone(),
        r#type: "function".to_owned(),
        function: FunctionToolCall {
            name: call.name.clone(),
            arguments: Value::Object(call.arguments.clone()).to_string(),
        },
    }
}

#[inline]
fn create_tool(tool: &ModelTool) -> Tool {
    Tool {
        r#type: "function",
        function: FunctionTool {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool.parameters.clone(),
        },
    }
}

/// Parses a chat completion body into a provider-neutral response.
pub fn parse_response(body: &[u8]) -> Result<ModelResponse, Error> {
    let completion: ChatCompletion =
        serde_json::from_slice(body).map_err(|err| {
            Error::new(
                format!("Malformed completion: {err}"),
                ErrorKind::InvalidResponse,
            )
        })?;
    let Some(choice) = completion.choices.into_iter().next() else {
        return Err(Error::new(
            "The completion has no choices",
            ErrorKind::InvalidResponse,
        ));
    };

    let tool_calls = choice
        .message
        .tool_calls
        .into_iter()
        .map(parse_tool_call)
        .collect::<Result<Vec<_>, _>>()?;
    let finish_reason = match choice.finish_reason.as_deref() {
        Some("tool_calls") => Some(ModelFinishReason::ToolCalls),
        Some("stop") => Some(ModelFinishReason::Stop),
        Some(other) => {
            debug!("unknown finish reason: {other}");
            None
        }
        None => None,
    };
    Ok(ModelResponse {
        content: choice.message.content.unwrap_or_default(),
        tool_calls,
        finish_reason,
    })
}

fn parse_tool_call(call: ToolCall) -> Result<ModelToolCall, Error> {
    let arguments = if call.function.arguments.trim().is_empty() {
        Map::new()
    } else {
        match serde_json::from_str(&call.function.arguments) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                return Err(Error::new(
                    format!("Arguments of `{}` are not an object", call.id),
                    ErrorKind::InvalidResponse,
                ));
            }
            Err(err) => {
                return Err(Error::new(
                    format!("Malformed arguments of `{}`: {err}", call.id),
                    ErrorKind::InvalidResponse,
                ));
            }
        }
    };
    Ok(ModelToolCall {
        id: call.id,
        name: call.function.name,
        arguments,
    })
}

#[cfg(test)]
mod tests {
    use lookout_model::ToolCallResult;
    use serde_json::json;

    use super::*;
    use crate::OpenAIConfigBuilder;

    #[test]
    fn test_create_request() {
        let arguments = json!({ "query": "weather in Paris" });
        let request = ModelRequest {
            messages: vec![
                ModelMessage::System("You are a helpful assistant.".to_owned()),
                ModelMessage::User("Weather in Paris?".to_owned()),
                ModelMessage::Assistant {
                    content: String::new(),
                    tool_calls: vec![ModelToolCall {
                        id: "call_1".to_owned(),
                        name: "search".to_owned(),
                        arguments: arguments.as_object().unwrap().clone(),
                    }],
                },
                ModelMessage::Tool(ToolCallResult {
                    id: "call_1".to_owned(),
                    content: "15°C".to_owned(),
                }),
            ],
            tools: vec![ModelTool {
                name: "search".to_owned(),
                description: "Searches the web.".to_owned(),
                parameters: json!({
                    "type": "object",
                    "properties": { "query": { "type": "string" } }
                }),
            }],
        };
        let config = OpenAIConfigBuilder::with_api_key("xxx")
            .with_model("custom")
            .build();

        let body =
            serde_json::to_value(create_request(&request, &config)).unwrap();
        assert_eq!(
            body,
            json!({
                "model": "custom",
                "stream": false,
                "messages": [
                    { "role": "system", "content": "You are a helpful assistant." },
                    { "role": "user", "content": "Weather in Paris?" },
                    {
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [{
                            "id": "call_1",
                            "type": "function",
                            "function": {
                                "name": "search",
                                "arguments": "{\"query\":\"weather in Paris\"}"
                            }
                        }]
                    },
                    { "role": "tool", "tool_call_id": "call_1", "content": "15°C" }
                ],
                "tools": [{
                    "type": "function",
                    "function": {
                        "name": "search",
                        "description": "Searches the web.",
                        "parameters": {
                            "type": "object",
                            "properties": { "query": { "type": "string" } }
                        }
                    }
                }]
            })
        );
    }

    #[test]
    fn test_parse_tool_calls() {
        let body = json!({
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {
                            "name": "search",
                            "arguments": "{\"query\":\"weather in Paris\"}"
                        }
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        });
        let resp = parse_response(body.to_string().as_bytes()).unwrap();
        assert_eq!(resp.content, "");
        assert_eq!(resp.finish_reason, Some(ModelFinishReason::ToolCalls));
        assert_eq!(resp.tool_calls.len(), 1);
        assert_eq!(resp.tool_calls[0].name, "search");
        assert_eq!(
            resp.tool_calls[0].arguments.get("query"),
            Some(&json!("weather in Paris"))
        );
    }

    #[test]
    fn test_parse_text() {
        let body = json!({
            "choices": [{
                "message": { "role": "assistant", "content": "Hello!" },
                "finish_reason": "stop"
            }]
        });
        let resp = parse_response(body.to_string().as_bytes()).unwrap();
        assert_eq!(resp.content, "Hello!");
        assert!(resp.tool_calls.is_empty());
        assert_eq!(resp.finish_reason, Some(ModelFinishReason::Stop));
    }

    #[test]
    fn test_parse_errors() {
        let invalid = [
            "not json".to_owned(),
            json!({ "choices": [] }).to_string(),
            json!({
                "choices": [{
                    "message": {
                        "tool_calls": [{
                            "id": "call_1",
                            "type": "function",
                            "function": { "name": "search", "arguments": "[1]" }
                        }]
                    },
                    "finish_reason": "tool_calls"
                }]
            })
            .to_string(),
        ];
        for body in invalid {
            let err = parse_response(body.as_bytes()).unwrap_err();
            assert_eq!(err.kind, ErrorKind::InvalidResponse, "{body}");
        }
    }
}
