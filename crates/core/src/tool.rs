//! Tools the model can call, and the registry running them.

mod error;
mod executor;

use std::future::ready;
use std::pin::Pin;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

pub use error::{Error, ErrorKind};
pub(crate) use executor::Executor;

/// The outcome of a tool call: the content handed back to the model, or
/// the reason it could not be produced.
pub type ToolResult = Result<String, Error>;

/// A tool that can be called by the model.
///
/// Arguments arrive as a JSON object and are decoded into [`Tool::Input`]
/// before the tool runs. Arguments that don't decode never reach the
/// tool, the model gets an [`ErrorKind::InvalidInput`] error instead.
///
/// Tools must be idempotent. A call may run again after it timed out, or
/// when a turn is resumed after being interrupted between the request and
/// its result. Anything a tool needs at runtime, such as an HTTP client or
/// an API key, should be set at construction and cloned into the future.
pub trait Tool: Send + Sync + 'static {
    /// The decoded arguments of a call.
    type Input: DeserializeOwned;

    /// Returns the name the model refers to the tool by.
    fn name(&self) -> &str;

    /// Returns the description shown to the model.
    fn description(&self) -> &str;

    /// Returns the JSON schema of [`Tool::Input`].
    fn parameter_schema(&self) -> &Value;

    /// Runs the tool.
    ///
    /// The returned future must not borrow `self`, and it may be dropped
    /// at any await point when the call times out or the turn is
    /// cancelled.
    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static;
}

pub(crate) type BoxedToolFuture =
    Pin<Box<dyn Future<Output = ToolResult> + Send>>;

/// Object-safe form of [`Tool`], taking undecoded arguments.
pub(crate) trait DynTool: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameter_schema(&self) -> &Value;

    fn call(&self, arguments: Map<String, Value>) -> BoxedToolFuture;
}

impl<T: Tool> DynTool for T {
    #[inline]
    fn name(&self) -> &str {
        Tool::name(self)
    }

    #[inline]
    fn description(&self) -> &str {
        Tool::description(self)
    }

    #[inline]
    fn parameter_schema(&self) -> &Value {
        Tool::parameter_schema(self)
    }

    fn call(&self, arguments: Map<String, Value>) -> BoxedToolFuture {
        match serde_json::from_value(Value::Object(arguments)) {
            Ok(input) => Box::pin(self.execute(input)),
            Err(err) => {
                debug!("rejecting arguments of `{}`: {err}", Tool::name(self));
                Box::pin(ready(Err(Error::from(err))))
            }
        }
    }
}
