use std::borrow::Cow;
use std::fmt::{self, Display};

/// The kind of a failed tool call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The arguments don't match the parameter schema of the tool.
    InvalidInput,
    /// The tool ran and failed, e.g. its upstream service is down.
    ExecutionError,
    /// No tool with the requested name is registered.
    NotFound,
}

impl ErrorKind {
    /// Returns `true` if the model may read the error and go on, e.g. by
    /// fixing the arguments or answering without the tool.
    #[inline]
    pub fn is_recoverable(self) -> bool {
        !matches!(self, ErrorKind::NotFound)
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorKind::InvalidInput => "Invalid input",
            ErrorKind::ExecutionError => "Execution error",
            ErrorKind::NotFound => "Tool not found",
        })
    }
}

/// Describes a tool call error.
///
/// The rendered error is what the model reads in place of a result, so
/// reasons should be short and actionable.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Error {
    kind: ErrorKind,
    reason: Option<String>,
}

impl Error {
    /// Creates an error of the given kind without a reason.
    #[inline]
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, reason: None }
    }

    /// Shorthand for `Error::new(ErrorKind::InvalidInput)`.
    #[inline]
    pub fn invalid_input() -> Self {
        Self::new(ErrorKind::InvalidInput)
    }

    /// Shorthand for `Error::new(ErrorKind::ExecutionError)`.
    #[inline]
    pub fn execution_error() -> Self {
        Self::new(ErrorKind::ExecutionError)
    }

    /// Shorthand for `Error::new(ErrorKind::NotFound)`.
    #[inline]
    pub fn not_found() -> Self {
        Self::new(ErrorKind::NotFound)
    }

    /// Replaces the reason of the error.
    #[inline]
    pub fn with_reason<S: Into<String>>(mut self, reason: S) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Returns the kind of this error.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the reason, or the kind description if there is none.
    pub fn reason(&self) -> Cow<'_, str> {
        self.reason
            .as_deref()
            .map_or_else(|| Cow::Owned(self.kind.to_string()), Cow::Borrowed)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(reason) = &self.reason {
            write!(f, ": {reason}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::invalid_input().with_reason(err.to_string())
    }
}
