//! Fixed-interval retry with cancellation.
//!
//! Each attempt reports whether its failure is worth another try. The
//! executor sleeps for the configured interval (or the error's retry hint,
//! whichever is longer) between attempts and gives up when the budget is
//! spent or a stop is requested.

use crate::config::RetryConfig;
use crate::errors::DropError;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Outcome of one attempt.
#[derive(Debug)]
pub enum Attempt<T> {
    /// Finished, stop retrying
    Done(T),
    /// Failed, try again if budget remains
    Retry(DropError),
    /// Failed in a way another attempt cannot fix
    Fatal(DropError),
}

/// Why a retried operation did not produce a value.
#[derive(Debug)]
pub enum RetryFailure {
    Fatal(DropError),
    Exhausted { attempts: u32, last_error: DropError },
    Cancelled,
}

/// Executor that runs an operation until it succeeds, fails fatally or
/// runs out of attempts.
#[derive(Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
    cancel: CancellationToken,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig, cancel: CancellationToken) -> Self {
        Self { config, cancel }
    }

    /// Run `operation`, passing it the 1-based attempt number.
    pub async fn run<F, Fut, T>(&self, label: &str, mut operation: F) -> Result<T, RetryFailure>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Attempt<T>>,
    {
        let mut attempt = 0u32;

        loop {
            if self.cancel.is_cancelled() {
                return Err(RetryFailure::Cancelled);
            }
            attempt += 1;

            let error = match operation(attempt).await {
                Attempt::Done(value) => return Ok(value),
                Attempt::Fatal(e) => return Err(RetryFailure::Fatal(e)),
                Attempt::Retry(e) => e,
            };

            if attempt >= self.config.max_attempts {
                return Err(RetryFailure::Exhausted {
                    attempts: attempt,
                    last_error: error,
                });
            }

            let delay_ms = error
                .retry_hint_ms()
                .map_or(self.config.interval_ms, |hint| hint.max(self.config.interval_ms));

            tracing::warn!(
                operation = label,
                attempt,
                max_attempts = self.config.max_attempts,
                delay_ms,
                error = %error,
                "Operation failed, will retry"
            );

            tokio::select! {
                _ = self.cancel.cancelled() => return Err(RetryFailure::Cancelled),
                _ = sleep(Duration::from_millis(delay_ms)) => {}
            }
        }
    }
}
