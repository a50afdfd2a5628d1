//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGINT (Ctrl-C) → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → every subscribed payment flow sees the message
//!     → a flow that has not broadcast yet stops with `Cancelled`
//! ```
//!
//! # Design Decisions
//! - A broadcast transaction is never cancelled; only the steps before it are
//! - A second Ctrl-C exits immediately

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::spawn_ctrl_c_handler;
