use lookout_core::tool::{Error as ToolError, Tool, ToolResult};
use reqwest::Client;
use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const DEFAULT_BASE_URL: &str = "https://api.tavily.com";
const DEFAULT_MAX_RESULTS: u32 = 2;

/// Arguments of [`SearchTool`].
#[derive(Deserialize, JsonSchema)]
pub struct SearchToolParameters {
    #[schemars(description = "The search query, in natural language.")]
    query: String,
}

#[derive(Serialize)]
struct SearchRequest {
    query: String,
    max_results: u32,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    url: String,
    #[serde(default)]
    content: String,
}

/// What the model gets back for every hit.
#[derive(Serialize)]
struct SearchResult<'a> {
    url: &'a str,
    content: &'a str,
}

/// A tool for searching the web with the Tavily search API.
pub struct SearchTool {
    client: Client,
    api_key: String,
    url: String,
    max_results: u32,
    parameter_schema: Value,
}

impl SearchTool {
    /// Creates a new search tool authenticated with the given API key.
    #[inline]
    pub fn new<S: Into<String>>(api_key: S) -> Self {
        Self::with_client(Client::new(), api_key)
    }

    /// Creates a new search tool sending requests with `client`.
    pub fn with_client<S: Into<String>>(client: Client, api_key: S) -> Self {
        SearchTool {
            client,
            api_key: api_key.into(),
            url: format!("{DEFAULT_BASE_URL}/search"),
            max_results: DEFAULT_MAX_RESULTS,
            parameter_schema: schema_for!(SearchToolParameters).to_value(),
        }
    }

    /// Sets how many results one search returns at most.
    #[inline]
    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.max_results = max_results;
        self
    }

    /// Sets a custom base URL of the search API.
    #[inline]
    pub fn with_base_url<S: AsRef<str>>(mut self, base_url: S) -> Self {
        let base_url = base_url.as_ref().trim_end_matches('/');
        self.url = format!("{base_url}/search");
        self
    }
}

impl Tool for SearchTool {
    type Input = SearchToolParameters;

    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        r#"
Searches the web for up-to-date information, such as news, weather or facts you are not sure about.
Returns a JSON array of the best matching pages, each with its URL and an excerpt of its content."#
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn execute(
        &self,
        input: SearchToolParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let query = input.query.trim().to_owned();
        let resp_fut = (!query.is_empty()).then(|| {
            self.client
                .post(&self.url)
                .bearer_auth(&self.api_key)
                .json(&SearchRequest {
                    query: query.clone(),
                    max_results: self.max_results,
                })
                .send()
        });

        async move {
            let Some(resp_fut) = resp_fut else {
                return Err(ToolError::invalid_input()
                    .with_reason("The query must not be empty"));
            };
            debug!("searching for {query:?}");

            let resp = resp_fut
                .await
                .and_then(|resp| resp.error_for_status())
                .map_err(|err| {
                    ToolError::execution_error()
                        .with_reason(format!("Search request failed: {err}"))
                })?;
            let body = resp.bytes().await.map_err(|err| {
                ToolError::execution_error()
                    .with_reason(format!("Search request failed: {err}"))
            })?;
            format_results(&body)
        }
    }
}

fn format_results(body: &[u8]) -> ToolResult {
    let resp: SearchResponse = serde_json::from_slice(body).map_err(|err| {
        ToolError::execution_error()
            .with_reason(format!("Malformed search response: {err}"))
    })?;
    let results: Vec<_> = resp
        .results
        .iter()
        .map(|hit| SearchResult {
            url: &hit.url,
            content: &hit.content,
        })
        .collect();
    serde_json::to_string(&results).map_err(|err| {
        ToolError::execution_error().with_reason(format!("{err}"))
    })
}

#[cfg(test)]
mod tests {
    use lookout_core::tool::ErrorKind;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_format_results() {
        let body = json!({
            "query": "weather in Paris",
            "results": [
                {
                    "title": "Paris weather",
                    "url": "https://weather.example/paris",
                    "content": "15°C and cloudy",
                    "score": 0.98
                },
                {
                    "title": "Forecast",
                    "url": "https://forecast.example/fr/paris",
                    "content": "Light rain expected tonight",
                    "score": 0.71
                }
            ],
            "response_time": 1.2
        });
        let result = format_results(body.to_string().as_bytes()).unwrap();
        let result: Value = serde_json::from_str(&result).unwrap();
        assert_eq!(
            result,
            json!([
                {
                    "url": "https://weather.example/paris",
                    "content": "15°C and cloudy"
                },
                {
                    "url": "https://forecast.example/fr/paris",
                    "content": "Light rain expected tonight"
                }
            ])
        );
    }

    #[test]
    fn test_format_no_results() {
        let result = format_results(br#"{"results": []}"#).unwrap();
        assert_eq!(result, "[]");

        let err = format_results(b"<html>").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExecutionError);
    }

    #[test]
    fn test_schema() {
        let tool = SearchTool::new("tvly-xxx");
        let schema = tool.parameter_schema();
        assert_eq!(schema["properties"]["query"]["type"], "string");
        assert_eq!(schema["required"], json!(["query"]));
    }

    #[tokio::test]
    async fn test_empty_query() {
        let tool = SearchTool::new("tvly-xxx");
        let input = SearchToolParameters {
            query: "  ".to_owned(),
        };
        let err = tool.execute(input).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_unreachable_api() {
        // Nothing listens on the discard port.
        let tool = SearchTool::new("tvly-xxx")
            .with_base_url("http://127.0.0.1:9/");
        let input = SearchToolParameters {
            query: "weather in Paris".to_owned(),
        };
        let err = tool.execute(input).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExecutionError);
    }
}
