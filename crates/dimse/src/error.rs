//! Error types for DIMSE operations

use std::io::ErrorKind;

use dicom_ul::association::Error as AssociationError;
use thiserror::Error;

/// Result type alias for DIMSE operations
pub type Result<T> = std::result::Result<T, DimseError>;

/// Error types that can occur during DIMSE operations
#[derive(Error, Debug)]
pub enum DimseError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] std::io::Error),

    #[error("DICOM object error: {0}")]
    DicomObject(String),

    #[error("DICOM UL error: {0}")]
    DicomUl(String),

    #[error("Association rejected: {0}")]
    AssociationRejected(String),

    #[error("DIMSE operation failed: {0}")]
    OperationFailed(String),

    #[error("Invalid AE Title: {0}")]
    InvalidAeTitle(String),

    #[error("Timeout occurred: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DimseError {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new operation failed error
    pub fn operation_failed(msg: impl Into<String>) -> Self {
        Self::OperationFailed(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Check if the remote refused the association or the capabilities we
    /// proposed, as opposed to the connection itself failing
    pub fn is_negotiation_failure(&self) -> bool {
        matches!(
            self,
            DimseError::AssociationRejected(_) | DimseError::InvalidAeTitle(_)
        )
    }
}

impl From<AssociationError> for DimseError {
    fn from(error: AssociationError) -> Self {
        if timed_out(&error) {
            return DimseError::Timeout(error.to_string());
        }
        match error {
            AssociationError::Rejected { .. }
            | AssociationError::NoAcceptedPresentationContexts { .. } => {
                DimseError::AssociationRejected(error.to_string())
            }
            AssociationError::Connect { source, .. } | AssociationError::ToAddress { source, .. } => {
                DimseError::Network(source)
            }
            AssociationError::Timeout { .. } => DimseError::Timeout(error.to_string()),
            other => DimseError::DicomUl(other.to_string()),
        }
    }
}

/// Walk the source chain looking for a socket timeout. A read timeout
/// surfaces as `WouldBlock` on Unix and `TimedOut` on Windows.
fn timed_out(error: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(err) = current {
        if let Some(io) = err.downcast_ref::<std::io::Error>() {
            if matches!(io.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) {
                return true;
            }
        }
        current = err.source();
    }
    false
}
