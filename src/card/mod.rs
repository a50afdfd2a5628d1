//! Card reading subsystem.
//!
//! # Data Flow
//! ```text
//! CardReader (NFC hardware, file, test double)
//!     → reader.rs (session guard, NFC timeout)
//!     → payload.rs (NDEF header, JSON or pipe form)
//!     → CardRecord (zeroized on drop)
//! ```

pub mod payload;
pub mod reader;

use std::time::Duration;
use thiserror::Error;

pub use payload::{parse_payload, CardRecord, UNKNOWN_SERIAL};
pub use reader::{read_card, CardReader, CardSession, FileCardReader, RawTag};

/// Errors from reading a card.
#[derive(Debug, Clone, Error)]
pub enum CardError {
    #[error("no data found on card")]
    NoData,

    #[error("card payload has no encrypted key")]
    MissingKey,

    #[error("invalid card payload: {0}")]
    InvalidPayload(String),

    #[error("card read timed out after {} ms", .0.as_millis())]
    Timeout(Duration),

    #[error("card reader error: {0}")]
    Reader(String),
}

pub type CardResult<T> = Result<T, CardError>;
