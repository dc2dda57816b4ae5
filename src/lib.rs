//! Synthetic multi-slice CT generation and PACS transmission
//!
//! A run builds a procedurally generated chest-like volume one axial slice at
//! a time, encodes each slice as a DICOM CT image and pushes it to an archive
//! over DIMSE C-STORE or an HTTP upload endpoint. The series carries
//! consistent spatial metadata so viewers can reconstruct it in 3D.

pub mod analysis;
pub mod config;
pub mod encoder;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod synth;
pub mod transport;

pub use config::Config;
pub use encoder::{EncodeError, EncodedSlice, SliceEncoder};
pub use models::outcome::{RunSummary, Verdict};
pub use orchestrator::Orchestrator;
pub use synth::VolumeSynthesizer;
pub use transport::{ArchiveSession, StoreReceipt};
