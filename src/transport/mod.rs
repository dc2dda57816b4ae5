//! Archive transports
//!
//! The orchestrator talks to the archive only through [`ArchiveSession`]. Both
//! implementations fold every transport-level failure into a [`StoreReceipt`]
//! (or `false` for the connectivity check) so a bad slice never unwinds the run.

pub mod dimse;
pub mod rest;

use async_trait::async_trait;

use crate::config::{Config, TransportKind};
use crate::encoder::EncodedSlice;

pub use self::dimse::DimseArchive;
pub use self::rest::{RestUploader, UploadError};

/// Diagnostic code attached to every store attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptCode {
    /// DIMSE response status (0000,0900)
    Dimse(u16),
    /// HTTP response status
    Http(u16),
    /// Association negotiation refused or no acceptable presentation context
    Rejected,
    Timeout,
    /// Connection could not be opened
    Unreachable,
    /// The session was closed before the call
    Closed,
    /// Any other local failure
    Error,
}

impl std::fmt::Display for ReceiptCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReceiptCode::Dimse(code) => write!(f, "DIMSE 0x{:04X}", code),
            ReceiptCode::Http(code) => write!(f, "HTTP {}", code),
            ReceiptCode::Rejected => write!(f, "rejected"),
            ReceiptCode::Timeout => write!(f, "timeout"),
            ReceiptCode::Unreachable => write!(f, "unreachable"),
            ReceiptCode::Closed => write!(f, "session closed"),
            ReceiptCode::Error => write!(f, "error"),
        }
    }
}

/// Outcome of one `store` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreReceipt {
    pub success: bool,
    pub code: ReceiptCode,
    pub detail: Option<String>,
}

impl StoreReceipt {
    pub fn stored(code: ReceiptCode) -> Self {
        Self {
            success: true,
            code,
            detail: None,
        }
    }

    pub fn failed(code: ReceiptCode, detail: impl Into<String>) -> Self {
        Self {
            success: false,
            code,
            detail: Some(detail.into()),
        }
    }

    /// Human readable failure reason for the run summary
    pub fn reason(&self) -> String {
        match &self.detail {
            Some(detail) => format!("{}: {}", self.code, detail),
            None => self.code.to_string(),
        }
    }
}

/// Three-phase session against one configured archive
#[async_trait]
pub trait ArchiveSession: Send + Sync {
    /// Zero-payload liveness exchange. Never errors; unreachable is `false`.
    async fn verify_connectivity(&self) -> bool;

    /// Transfer one encoded slice. Success only on the archive's explicit
    /// success status.
    async fn store(&self, item: &EncodedSlice) -> StoreReceipt;

    /// Idempotent teardown
    async fn close(&self);

    /// Short label for logs
    fn describe(&self) -> String;
}

/// Build the transport selected in the configuration
pub fn from_config(config: &Config) -> Result<Box<dyn ArchiveSession>, UploadError> {
    match config.transfer.transport {
        TransportKind::Dimse => Ok(Box::new(DimseArchive::from_config(&config.archive))),
        TransportKind::Rest => Ok(Box::new(RestUploader::new(&config.upload)?)),
    }
}
