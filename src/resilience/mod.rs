//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to an external service (RPC node, gas oracle, price API, card reader):
//!     → timeouts.rs (enforce a deadline per call)
//!     → failover.rs (walk an ordered candidate list, first success wins)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Failover is sequential with early exit, never a concurrent race
//! - Nothing here retries a transaction broadcast (not idempotent)

pub mod failover;
pub mod timeouts;

pub use failover::{first_success, CandidateFailure, FailoverError};
pub use timeouts::{with_timeout, TimeoutError};
