//! Card reader seam and session handling.
//!
//! # Responsibilities
//! - Abstract the NFC hardware behind `CardReader`
//! - Bound every read with the configured NFC timeout
//! - Release the reader on every exit path (success, error, timeout, drop)

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

use crate::card::payload::{parse_payload, CardRecord};
use crate::card::{CardError, CardResult};
use crate::resilience::timeouts::{with_timeout, TimeoutError};

/// Raw data read from a tag.
#[derive(Debug, Clone, Default)]
pub struct RawTag {
    /// First NDEF record payload.
    pub payload: Vec<u8>,
    /// Hardware tag identifier, if the reader exposes one.
    pub id: Option<String>,
}

/// An NFC reader (or anything that can stand in for one).
#[async_trait]
pub trait CardReader: Send {
    /// Wait for a tag and return its first record.
    async fn read_tag(&mut self) -> CardResult<RawTag>;

    /// Release the reader session. Must be idempotent.
    fn release(&mut self);
}

/// Holds a reader for the duration of one read and releases it on drop.
pub struct CardSession<'a, R: CardReader + ?Sized> {
    reader: &'a mut R,
}

impl<'a, R: CardReader + ?Sized> CardSession<'a, R> {
    pub fn open(reader: &'a mut R) -> Self {
        Self { reader }
    }

    pub async fn read_tag(&mut self) -> CardResult<RawTag> {
        self.reader.read_tag().await
    }
}

impl<R: CardReader + ?Sized> Drop for CardSession<'_, R> {
    fn drop(&mut self) {
        self.reader.release();
    }
}

/// Read and parse one card within `timeout`.
pub async fn read_card<R>(reader: &mut R, timeout: Duration) -> CardResult<CardRecord>
where
    R: CardReader + ?Sized,
{
    let mut session = CardSession::open(reader);

    let tag = match with_timeout(timeout, session.read_tag()).await {
        Ok(tag) => tag,
        Err(TimeoutError::Elapsed(elapsed)) => {
            tracing::warn!(timeout_ms = elapsed.as_millis() as u64, "Card read timed out");
            return Err(CardError::Timeout(elapsed));
        }
        Err(TimeoutError::Inner(e)) => return Err(e),
    };
    drop(session);

    if tag.payload.is_empty() {
        return Err(CardError::NoData);
    }

    let record = parse_payload(&tag.payload, tag.id.as_deref())?;
    tracing::info!(
        serial = %record.serial,
        has_address = record.address.is_some(),
        "Card read"
    );
    Ok(record)
}

/// Reads a card payload dumped to a file.
///
/// The file holds the record payload bytes exactly as stored on the tag.
#[derive(Debug, Clone)]
pub struct FileCardReader {
    path: PathBuf,
    tag_id: Option<String>,
    released: bool,
}

impl FileCardReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            tag_id: None,
            released: true,
        }
    }

    /// Tag identifier reported alongside the payload.
    pub fn with_tag_id(mut self, id: impl Into<String>) -> Self {
        self.tag_id = Some(id.into());
        self
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

#[async_trait]
impl CardReader for FileCardReader {
    async fn read_tag(&mut self) -> CardResult<RawTag> {
        self.released = false;
        let payload = tokio::fs::read(&self.path)
            .await
            .map_err(|e| CardError::Reader(format!("{}: {}", self.path.display(), e)))?;
        Ok(RawTag {
            payload,
            id: self.tag_id.clone(),
        })
    }

    fn release(&mut self) {
        if !self.released {
            tracing::debug!(path = %self.path.display(), "Card session released");
        }
        self.released = true;
    }
}
