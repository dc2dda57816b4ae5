//! Common types for DIMSE operations

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// DIMSE command types issued by this client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DimseCommand {
    /// C-ECHO command
    Echo,
    /// C-STORE command
    Store,
}

impl DimseCommand {
    /// Command Field (0000,0100) value of the request
    pub fn request_field(&self) -> u16 {
        match self {
            DimseCommand::Echo => 0x0030,
            DimseCommand::Store => 0x0001,
        }
    }

    /// Command Field (0000,0100) value of the matching response
    pub fn response_field(&self) -> u16 {
        self.request_field() | 0x8000
    }
}

/// DIMSE operation status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimseStatus {
    /// Operation completed successfully
    Success,
    /// Operation is pending (more responses to follow)
    Pending,
    /// Operation cancelled by user
    Cancel,
    /// Warning occurred during operation
    Warning(u16), // DICOM status code
    /// Operation failed with error
    Failure(u16), // DICOM status code
}

impl DimseStatus {
    /// Classify a raw Status (0000,0900) value as defined in PS3.7 Annex C
    pub fn from_code(code: u16) -> Self {
        match code {
            0x0000 => DimseStatus::Success,
            0xFF00 | 0xFF01 => DimseStatus::Pending,
            0xFE00 => DimseStatus::Cancel,
            0x0001 | 0x0107 | 0x0116 | 0xB000..=0xBFFF => DimseStatus::Warning(code),
            _ => DimseStatus::Failure(code),
        }
    }

    /// Raw status value
    pub fn code(&self) -> u16 {
        match self {
            DimseStatus::Success => 0x0000,
            DimseStatus::Pending => 0xFF00,
            DimseStatus::Cancel => 0xFE00,
            DimseStatus::Warning(code) | DimseStatus::Failure(code) => *code,
        }
    }

    /// Only the canonical success status counts as a completed transfer
    pub fn is_success(&self) -> bool {
        matches!(self, DimseStatus::Success)
    }
}

impl std::fmt::Display for DimseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DimseStatus::Success => write!(f, "Success (0x0000)"),
            DimseStatus::Pending => write!(f, "Pending (0xFF00)"),
            DimseStatus::Cancel => write!(f, "Cancel (0xFE00)"),
            DimseStatus::Warning(code) => write!(f, "Warning (0x{:04X})", code),
            DimseStatus::Failure(code) => write!(f, "Failure (0x{:04X})", code),
        }
    }
}

/// Lifecycle of a single association used for one store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationState {
    Idle,
    Negotiating,
    Rejected,
    Established,
    Transferring,
    Succeeded,
    Failed,
    Closed,
}

impl AssociationState {
    /// Whether `next` is a legal successor of `self`
    pub fn can_transition_to(&self, next: AssociationState) -> bool {
        use AssociationState::*;
        matches!(
            (self, next),
            (Idle, Negotiating)
                | (Idle, Closed)
                | (Negotiating, Rejected)
                | (Negotiating, Established)
                | (Established, Transferring)
                | (Established, Closed)
                | (Transferring, Succeeded)
                | (Transferring, Failed)
                | (Rejected, Closed)
                | (Succeeded, Closed)
                | (Failed, Closed)
        )
    }
}

/// An encoded dataset ready for C-STORE
#[derive(Debug, Clone)]
pub struct StoreRequest {
    /// SOP Class UID, used as the abstract syntax of the presentation context
    pub sop_class_uid: String,
    /// SOP Instance UID, echoed in the command set
    pub sop_instance_uid: String,
    /// Transfer syntax the dataset bytes are encoded in
    pub transfer_syntax: String,
    /// Dataset bytes without preamble or file meta group
    pub dataset: Bytes,
}

impl StoreRequest {
    pub fn new(
        sop_class_uid: impl Into<String>,
        sop_instance_uid: impl Into<String>,
        transfer_syntax: impl Into<String>,
        dataset: Bytes,
    ) -> Self {
        Self {
            sop_class_uid: sop_class_uid.into(),
            sop_instance_uid: sop_instance_uid.into(),
            transfer_syntax: transfer_syntax.into(),
            dataset,
        }
    }
}
