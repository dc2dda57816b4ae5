//! DIMSE (DICOM Message Service Element) client
//!
//! This crate provides the Service Class User (SCU) side of the DICOM upper
//! layer protocol needed to push objects into a remote archive.
//!
//! # Features
//! - C-ECHO liveness checks
//! - C-STORE of a single encoded dataset per association
//! - Bounded connect/read/write timeouts on every exchange
//! - Release (or abort) of the association on every exit path

pub mod config;
pub mod error;
pub mod scu;
pub mod types;

// Re-export commonly used types
pub use config::{RemoteNode, ScuConfig};
pub use error::{DimseError, Result};
pub use scu::{DimseScu, ScuBuilder};
pub use types::{AssociationState, DimseCommand, DimseStatus, StoreRequest};

/// Verification SOP Class
pub const VERIFICATION_SOP_CLASS: &str = "1.2.840.10008.1.1";

/// Implicit VR Little Endian, used for command sets and verification
pub const IMPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2";
