//! A model provider for OpenAI-compatible APIs.

#[macro_use]
extern crate tracing;

mod config;
mod proto;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use lookout_model::{
    ErrorKind, ModelProvider, ModelProviderError, ModelRequest, ModelResponse,
};
use mime::Mime;
use reqwest::{Client, StatusCode, header};

pub use config::{DnsResolver, OpenAIConfig, OpenAIConfigBuilder};

/// Error type for [`OpenAIProvider`].
#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// OpenAI-compatible model provider.
#[derive(Clone, Debug)]
pub struct OpenAIProvider {
    client: Client,
    config: Arc<OpenAIConfig>,
}

impl OpenAIProvider {
    /// Creates a new `OpenAIProvider` with the given configuration.
    ///
    /// Fails if the HTTP client cannot be set up, e.g. when no TLS backend
    /// is usable.
    pub fn new(config: OpenAIConfig) -> Result<Self, Error> {
        let mut builder = Client::builder();
        if config.dns_resolver == DnsResolver::Ipv4Only {
            builder = builder.local_address(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        }
        let client = builder.build().map_err(|err| {
            Error::new(
                format!("Failed to set up the HTTP client: {err}"),
                ErrorKind::Unavailable,
            )
        })?;
        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }
}

impl ModelProvider for OpenAIProvider {
    type Error = Error;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<ModelResponse, Self::Error>> + Send + 'static
    {
        let openai_req = proto::create_request(req, &self.config);
        let resp_fut = self
            .client
            .post(self.config.completions_url())
            .bearer_auth(&self.config.api_key)
            .header(header::ACCEPT, "application/json")
            .json(&openai_req)
            .send();

        async move {
            let resp = resp_fut.await.map_err(|err| {
                Error::new(format!("{err}"), ErrorKind::Unavailable)
            })?;

            let status = resp.status();
            if let Some(kind) = classify_status(status) {
                let body = resp.text().await.unwrap_or_default();
                return Err(Error::new(
                    format!("The server responded with {status}: {body}"),
                    kind,
                ));
            }

            let content_type = resp
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(ToOwned::to_owned);
            if !is_json(content_type.as_deref()) {
                return Err(Error::new(
                    format!("Unexpected content type: {content_type:?}"),
                    ErrorKind::InvalidResponse,
                ));
            }

            let body = resp.bytes().await.map_err(|err| {
                Error::new(format!("{err}"), ErrorKind::Unavailable)
            })?;
            trace!("got {} bytes of completion", body.len());
            proto::parse_response(&body)
        }
    }
}

/// Maps an unsuccessful status to the kind of error it stands for.
fn classify_status(status: StatusCode) -> Option<ErrorKind> {
    if status.is_success() {
        None
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        Some(ErrorKind::RateLimitExceeded)
    } else if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT
    {
        Some(ErrorKind::Unavailable)
    } else {
        // The request itself was rejected, sending it again won't help.
        Some(ErrorKind::InvalidResponse)
    }
}

fn is_json(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|v| v.parse().ok())
        .map(|m: Mime| {
            m.type_() == mime::APPLICATION && m.subtype() == mime::JSON
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status(StatusCode::OK), None);
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS),
            Some(ErrorKind::RateLimitExceeded)
        );
        assert_eq!(
            classify_status(StatusCode::BAD_GATEWAY),
            Some(ErrorKind::Unavailable)
        );
        assert_eq!(
            classify_status(StatusCode::UNAUTHORIZED),
            Some(ErrorKind::InvalidResponse)
        );
    }

    #[test]
    fn test_is_json() {
        assert!(is_json(Some("application/json")));
        assert!(is_json(Some("application/json; charset=utf-8")));
        assert!(!is_json(Some("text/event-stream")));
        assert!(!is_json(None));
    }

    #[test]
    fn test_new_provider() {
        let config = OpenAIConfigBuilder::with_api_key("xxx")
            .with_dns_resolver(DnsResolver::Ipv4Only)
            .build();
        assert!(OpenAIProvider::new(config).is_ok());
    }
}
