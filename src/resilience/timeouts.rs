//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap RPC, oracle and card-reader calls with a deadline
//! - Keep timeout errors distinct from the call's own errors

use std::future::Future;
use std::time::Duration;

/// Outcome of a call that either failed on its own or ran out of time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeoutError<E> {
    /// The deadline passed before the call completed.
    Elapsed(Duration),
    /// The call completed with an error.
    Inner(E),
}

impl<E: std::fmt::Display> std::fmt::Display for TimeoutError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeoutError::Elapsed(d) => write!(f, "timed out after {} ms", d.as_millis()),
            TimeoutError::Inner(e) => write!(f, "{}", e),
        }
    }
}

/// Run `fut` with a deadline.
pub async fn with_timeout<F, T, E>(duration: Duration, fut: F) -> Result<T, TimeoutError<E>>
where
    F: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(duration, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(TimeoutError::Inner(e)),
        Err(_) => Err(TimeoutError::Elapsed(duration)),
    }
}
