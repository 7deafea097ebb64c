use backoff::ExponentialBackoff;
use backoff::backoff::Backoff;
use tokio::select;
use tokio::time::sleep;

use super::{Cancellation, RetryPolicy};

pub enum Stop {
    Exhausted,
    Cancelled,
}

/// Paces the attempts of one call.
pub struct Retrier {
    backoff: ExponentialBackoff,
    retries_left: u32,
}

impl Retrier {
    pub fn new(policy: &RetryPolicy) -> Self {
        let backoff = ExponentialBackoff {
            current_interval: policy.initial_interval,
            initial_interval: policy.initial_interval,
            max_interval: policy.max_interval,
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        };
        Self {
            backoff,
            retries_left: policy.max_retries,
        }
    }

    /// Waits until the next attempt may start.
    pub async fn wait(&mut self, cancel: &Cancellation) -> Result<(), Stop> {
        if self.retries_left == 0 {
            return Err(Stop::Exhausted);
        }
        self.retries_left -= 1;

        let Some(delay) = self.backoff.next_backoff() else {
            return Err(Stop::Exhausted);
        };
        trace!("next attempt in {delay:?}");
        select! {
            biased;

            _ = cancel.cancelled() => Err(Stop::Cancelled),
            _ = sleep(delay) => Ok(()),
        }
    }
}
