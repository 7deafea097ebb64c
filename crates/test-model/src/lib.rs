//! A local fake model for testing purpose.

mod preset;

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use lookout_model::{
    ErrorKind, ModelMessage, ModelProvider, ModelProviderError, ModelRequest,
    ModelResponse,
};
use tokio::time::sleep;

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    #[allow(dead_code)]
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(self, f)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

#[derive(Default)]
struct Journal {
    requests: Vec<ModelRequest>,
    // Attempts seen so far, keyed by the step index.
    attempts: HashMap<usize, u64>,
}

/// A local fake model for testing purpose.
///
/// Before sending requests, you need to setup the conversation script, which
/// is how the model should respond to a request. The step is selected by
/// counting the assistant messages already in the request, so a script is
/// simply the list of assistant answers in conversation order, and resending
/// the same request (e.g. a retry) selects the same step again. If there are
/// no enough steps in the script and no fallback response, an error will be
/// returned.
///
/// Clones share the same script position bookkeeping and request journal.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing.
#[derive(Clone, Default)]
pub struct TestModelProvider {
    conversation_script: Vec<PresetResponse>,
    fallback: Option<PresetResponse>,
    delay: Option<Duration>,
    journal: Arc<Mutex<Journal>>,
}

impl TestModelProvider {
    #[inline]
    pub fn add_assistant_response_step(&mut self, preset: PresetResponse) {
        self.conversation_script.push(preset);
    }

    /// Sets the response used once the script runs out of steps.
    #[inline]
    pub fn set_fallback_response(&mut self, preset: PresetResponse) {
        self.fallback = Some(preset);
    }

    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns every request received so far, failed attempts included.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.journal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .requests
            .clone()
    }

    fn respond(&self, req: &ModelRequest) -> Result<ModelResponse, Error> {
        let step_idx = req
            .messages
            .iter()
            .filter(|msg| matches!(msg, ModelMessage::Assistant { .. }))
            .count();

        let mut journal =
            self.journal.lock().unwrap_or_else(PoisonError::into_inner);
        journal.requests.push(req.clone());

        let Some(preset) = self
            .conversation_script
            .get(step_idx)
            .or(self.fallback.as_ref())
        else {
            return Err(Error {
                message: "no enough steps",
                kind: ErrorKind::InvalidResponse,
            });
        };

        let attempts = journal.attempts.entry(step_idx).or_default();
        *attempts += 1;
        let failing = match preset.failures {
            Some(0) => true,
            Some(failures) => *attempts <= failures,
            None => false,
        };
        if failing {
            let kind = match preset.failure {
                PresetFailure::Unavailable => ErrorKind::Unavailable,
                PresetFailure::RateLimited => ErrorKind::RateLimitExceeded,
                PresetFailure::InvalidResponse => ErrorKind::InvalidResponse,
            };
            return Err(Error {
                message: "preset failure",
                kind,
            });
        }

        Ok(preset.to_response())
    }
}

impl ModelProvider for TestModelProvider {
    type Error = crate::Error;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<ModelResponse, Self::Error>> + Send + 'static
    {
        let result = self.respond(req);
        let delay = self.delay.unwrap_or(Duration::from_millis(1));
        async move {
            sleep(delay).await;
            result
        }
    }
}
