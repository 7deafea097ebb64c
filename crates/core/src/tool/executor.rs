use std::collections::HashMap;

use lookout_model::{ModelTool, ToolCall};
use tracing::Instrument;

use crate::tool::{BoxedToolFuture, DynTool, Error};

/// An executor that handles tool call requests from the model.
pub struct Executor {
    tools: HashMap<String, Box<dyn DynTool>>,
}

impl Executor {
    pub fn with_tools(tools: Vec<Box<dyn DynTool>>) -> Self {
        let mut tool_map = HashMap::with_capacity(tools.len());
        for tool in tools {
            let name = tool.name();
            if tool_map.contains_key(name) {
                warn!("tool `{name}` is registered twice, the last one wins");
            }
            tool_map.insert(name.to_owned(), tool);
        }
        let tools = tool_map;
        Self { tools }
    }

    /// Returns the definitions of all tools, ordered by name.
    pub fn definitions(&self) -> Vec<ModelTool> {
        let mut definitions: Vec<_> = self
            .tools
            .values()
            .map(|tool| ModelTool {
                name: tool.name().to_owned(),
                description: tool.description().to_owned(),
                parameters: tool.parameter_schema().clone(),
            })
            .collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    /// Creates a future running the requested call.
    ///
    /// Each call creates a fresh future, so a timed out call can be
    /// attempted again.
    pub fn prepare(&self, call: &ToolCall) -> Result<BoxedToolFuture, Error> {
        let Some(tool) = self.tools.get(&call.name) else {
            warn!("tool not found: {}", call.name);
            return Err(Error::not_found().with_reason(format!(
                "no tool named `{}` is registered",
                call.name
            )));
        };
        trace!("preparing call {} with args: {:?}", call.id, call.arguments);
        let span = debug_span!("tool call", tool = %call.name, id = %call.id);
        let fut = tool.call(call.arguments.clone()).instrument(span);
        Ok(Box::pin(fut))
    }
}

#[cfg(test)]
mod tests {
    use std::future::ready;

    use serde::Deserialize;
    use serde_json::{Map, Value, json};

    use super::*;
    use crate::tool::{ErrorKind, Tool, ToolResult};

    static EMPTY_SCHEMA: &Value = &Value::Null;

    #[derive(Deserialize)]
    struct EchoInput {
        text: String,
    }

    struct EchoTool;

    impl Tool for EchoTool {
        type Input = EchoInput;

        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echoes the text"
        }

        fn parameter_schema(&self) -> &Value {
            EMPTY_SCHEMA
        }

        fn execute(
            &self,
            input: Self::Input,
        ) -> impl Future<Output = ToolResult> + Send + 'static {
            ready(Ok(input.text))
        }
    }

    struct NoopTool;

    impl Tool for NoopTool {
        type Input = Value;

        fn name(&self) -> &str {
            "noop"
        }

        fn description(&self) -> &str {
            "Does nothing"
        }

        fn parameter_schema(&self) -> &Value {
            EMPTY_SCHEMA
        }

        fn execute(
            &self,
            _input: Self::Input,
        ) -> impl Future<Output = ToolResult> + Send + 'static {
            ready(Ok(String::new()))
        }
    }

    fn call(name: &str, arguments: Value) -> ToolCall {
        let Value::Object(arguments) = arguments else {
            panic!("arguments must be an object");
        };
        ToolCall {
            id: "tool:1".to_owned(),
            name: name.to_owned(),
            arguments,
        }
    }

    fn executor() -> Executor {
        Executor::with_tools(vec![
            Box::new(NoopTool) as Box<dyn DynTool>,
            Box::new(EchoTool),
        ])
    }

    #[tokio::test]
    async fn test_prepare() {
        let executor = executor();

        let fut = executor
            .prepare(&call("echo", json!({ "text": "hello" })))
            .unwrap();
        assert_eq!(fut.await.unwrap(), "hello");

        let fut = executor.prepare(&call("echo", json!({}))).unwrap();
        let err = fut.await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err = executor
            .prepare(&call("read_file", json!({})))
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.reason().contains("read_file"));

        let noop = ToolCall {
            id: "tool:2".to_owned(),
            name: "noop".to_owned(),
            arguments: Map::new(),
        };
        assert_eq!(executor.prepare(&noop).unwrap().await.unwrap(), "");
    }

    #[test]
    fn test_definitions() {
        let names: Vec<_> = executor()
            .definitions()
            .into_iter()
            .map(|def| def.name)
            .collect();
        assert_eq!(names, ["echo", "noop"]);
    }
}
