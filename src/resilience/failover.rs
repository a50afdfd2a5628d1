//! Ordered failover across a list of candidates.
//!
//! # Responsibilities
//! - Try candidates strictly in order, one at a time
//! - Bound each attempt with the same deadline
//! - Stop at the first success; later candidates are never touched
//! - Report every failure reason when all candidates fail

use std::future::Future;
use std::time::Duration;

use crate::resilience::timeouts::{with_timeout, TimeoutError};

/// Why a single candidate was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFailure {
    /// Position of the candidate in the input list.
    pub index: usize,
    /// Human-readable failure reason.
    pub reason: String,
}

/// Every candidate failed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FailoverError {
    pub failures: Vec<CandidateFailure>,
}

impl std::fmt::Display for FailoverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.failures.is_empty() {
            return write!(f, "no candidates to try");
        }
        write!(f, "all {} candidates failed: ", self.failures.len())?;
        for (i, failure) in self.failures.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "#{} {}", failure.index, failure.reason)?;
        }
        Ok(())
    }
}

impl std::error::Error for FailoverError {}

/// Try `probe` on each candidate in order and return the first success
/// together with the index of the candidate that produced it.
pub async fn first_success<C, T, E, F, Fut>(
    candidates: &[C],
    per_attempt: Duration,
    mut probe: F,
) -> Result<(usize, T), FailoverError>
where
    F: FnMut(&C) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut failures = Vec::new();

    for (index, candidate) in candidates.iter().enumerate() {
        match with_timeout(per_attempt, probe(candidate)).await {
            Ok(value) => {
                if index > 0 {
                    crate::observability::metrics::record_failover(index);
                }
                return Ok((index, value));
            }
            Err(TimeoutError::Elapsed(_)) => {
                tracing::warn!(candidate_idx = index, "Attempt timed out, trying next candidate");
                failures.push(CandidateFailure {
                    index,
                    reason: format!("timed out after {} ms", per_attempt.as_millis()),
                });
            }
            Err(TimeoutError::Inner(e)) => {
                tracing::warn!(candidate_idx = index, error = %e, "Attempt failed, trying next candidate");
                failures.push(CandidateFailure {
                    index,
                    reason: e.to_string(),
                });
            }
        }
    }

    Err(FailoverError { failures })
}
