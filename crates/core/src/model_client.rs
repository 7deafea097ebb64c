use std::collections::HashSet;
use std::fmt::{self, Display};
use std::pin::Pin;
use std::sync::Arc;

use lookout_model::{
    ModelFinishReason, ModelProvider, ModelProviderError, ModelRequest,
    ModelResponse,
};
use tracing::Instrument;

use crate::conversation::AssistantReply;

type SendRequestResult = Result<ModelResponse, Box<dyn ModelProviderError>>;
type BoxedSendRequestFuture =
    Pin<Box<dyn Future<Output = SendRequestResult> + Send>>;
type HandlerFn =
    Arc<dyn Fn(ModelRequest) -> BoxedSendRequestFuture + Send + Sync>;

/// A wrapper around a model provider that provides a type-erased
/// interface for the other modules.
#[derive(Clone)]
pub struct ModelClient {
    handler_fn: HandlerFn,
}

impl ModelClient {
    #[inline]
    pub fn new<P: ModelProvider + 'static>(provider: P) -> Self {
        // We have to erase the type `P`, since `ModelClient` doesn't have a
        // generic parameter and we don't want it either.
        let handler_fn: HandlerFn =
            Arc::new(move |req: ModelRequest| -> BoxedSendRequestFuture {
                let fut = provider.send_request(&req);
                Box::pin(
                    async move {
                        trace!("got a request: {:?}", req);
                        match fut.await {
                            Ok(resp) => {
                                trace!("finished a request: {resp:?}");
                                Ok(resp)
                            }
                            Err(err) => {
                                error!("got an error: {err:?}");
                                Err(Box::new(err)
                                    as Box<dyn ModelProviderError>)
                            }
                        }
                    }
                    .instrument(trace_span!("model client req")),
                )
            });
        Self { handler_fn }
    }

    /// Sends a request and returns the complete response.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe as long as the provider future is.
    #[inline]
    pub async fn send_request(&self, req: ModelRequest) -> SendRequestResult {
        (self.handler_fn)(req).await
    }
}

/// Describes why a model response cannot become a message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MalformedResponse(String);

impl Display for MalformedResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for MalformedResponse {}

impl TryFrom<ModelResponse> for AssistantReply {
    type Error = MalformedResponse;

    fn try_from(resp: ModelResponse) -> Result<Self, Self::Error> {
        let ModelResponse {
            content,
            tool_calls,
            finish_reason,
        } = resp;

        if tool_calls.is_empty() {
            if finish_reason == Some(ModelFinishReason::ToolCalls) {
                return Err(MalformedResponse(
                    "finished for tool calls without any tool call".to_owned(),
                ));
            }
            return Ok(AssistantReply::Final(content));
        }

        let mut ids = HashSet::with_capacity(tool_calls.len());
        for call in &tool_calls {
            if call.id.is_empty() {
                return Err(MalformedResponse(format!(
                    "tool call to `{}` has no id",
                    call.name
                )));
            }
            if call.name.is_empty() {
                return Err(MalformedResponse(format!(
                    "tool call `{}` has no tool name",
                    call.id
                )));
            }
            if !ids.insert(call.id.as_str()) {
                return Err(MalformedResponse(format!(
                    "duplicated tool call id `{}`",
                    call.id
                )));
            }
        }

        Ok(AssistantReply::ToolRequest {
            content,
            calls: tool_calls,
        })
    }
}
