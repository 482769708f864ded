//! Content scanning gate consulted before any upload is committed.

mod clamd;

pub use clamd::{ClamdScanner, CLAMD_DEFAULT_STREAM_MAX};

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanVerdict {
    Accept,
    /// Rejected, with one reason per detection (e.g. signature names).
    Reject(Vec<String>),
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Scanner protocol error: {0}")]
    Protocol(String),
    /// The scanner refuses streams this large (clamd `StreamMaxLength`).
    #[error("Upload exceeds the scanner's stream limit: {0}")]
    StreamLimit(String),
}

/// A scanner inspects the full upload and decides whether it may be stored.
///
/// Implementations do not enforce their own deadline; callers wrap `scan` in a timeout.
#[async_trait]
pub trait ScanGate: Send + Sync {
    async fn scan(&self, data: &Bytes) -> Result<ScanVerdict, ScanError>;
}

/// Accepts everything. Used when no scanner is deployed.
pub struct NoopScanner;

#[async_trait]
impl ScanGate for NoopScanner {
    async fn scan(&self, _data: &Bytes) -> Result<ScanVerdict, ScanError> {
        Ok(ScanVerdict::Accept)
    }
}
