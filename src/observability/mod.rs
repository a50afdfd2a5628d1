//! Logs and counters for the tap-to-pay flow.
//!
//! `logging` installs the subscriber once at startup; `metrics` names every
//! counter and histogram the payment pipeline records, so call sites never
//! spell metric keys by hand.
//!
//! A payment runs inside one tracing span holding a UUID, the network key and
//! the asset symbol. Key material is never logged: `CardSecret` and `Pin`
//! print as redacted in `Debug`.

pub mod logging;
pub mod metrics;
