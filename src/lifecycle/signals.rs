//! OS signal handling.
//!
//! # Responsibilities
//! - Translate Ctrl-C into a shutdown trigger
//! - Force exit on a second Ctrl-C
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)

use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::lifecycle::Shutdown;

/// Exit code used when the operator insists.
const FORCED_EXIT_CODE: i32 = 130;

/// Trigger `shutdown` on the first Ctrl-C and exit on the second.
pub fn spawn_ctrl_c_handler(shutdown: Arc<Shutdown>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "Cannot listen for Ctrl-C");
                return;
            }
            if shutdown.trigger() {
                tracing::info!("Ctrl-C received, cancelling pending payment");
            } else {
                tracing::warn!("Second Ctrl-C, exiting");
                std::process::exit(FORCED_EXIT_CODE);
            }
        }
    })
}
