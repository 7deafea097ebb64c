use std::time::Duration;

/// How often and how patiently a failed call is attempted again.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one. `0` disables retrying.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_interval: Duration,
    /// Upper bound of the exponentially growing delay.
    pub max_interval: Duration,
}

impl RetryPolicy {
    /// A policy that never retries.
    #[inline]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_interval: Duration::ZERO,
            max_interval: Duration::ZERO,
        }
    }

    /// Retries `max_retries` times with the default delays.
    #[inline]
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(8),
        }
    }
}

/// Limits of a single turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnConfig {
    /// Maximum number of model requests in one turn. The model is not
    /// trusted to stop asking for tools by itself.
    pub max_iterations: usize,
    /// Time limit of one model request.
    pub model_timeout: Duration,
    /// Time limit of one tool execution.
    pub tool_timeout: Duration,
    /// Retries of unavailable, rate limited or timed out model requests.
    pub model_retry: RetryPolicy,
    /// Retries of timed out tool executions.
    pub tool_retry: RetryPolicy,
    /// How many times the same tool call may fail in one turn while still
    /// being reported back to the model. One more failure fails the turn.
    pub max_tool_failures: usize,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            model_timeout: Duration::from_secs(60),
            tool_timeout: Duration::from_secs(30),
            model_retry: RetryPolicy::default(),
            tool_retry: RetryPolicy {
                max_retries: 1,
                initial_interval: Duration::from_millis(500),
                max_interval: Duration::from_secs(4),
            },
            max_tool_failures: 1,
        }
    }
}
