use std::path::{Path, PathBuf};

use dimse::{RemoteNode, ScuConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::logging_config::LoggingConfig;
use crate::config::synthesis_config::SynthesisConfig;
use crate::models::slice::Dimensions;

/// Top-level configuration, usually loaded from a TOML file.
///
/// Every section has defaults, so an empty file (or `Config::default()`)
/// describes a valid run: 100 slices of 512×512 pushed to
/// `ORTHANC@127.0.0.1:4242` over DIMSE.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub archive: ArchiveConfig,
    pub series: SeriesConfig,
    pub synthesis: SynthesisConfig,
    pub transfer: TransferConfig,
    pub upload: UploadConfig,
    pub logging: LoggingConfig,
}

/// Remote archive reached over DIMSE
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    pub host: String,
    pub port: u16,
    /// Called AE title
    pub remote_aet: String,
    /// Calling AE title
    pub local_aet: String,
    pub connect_timeout_ms: u64,
    pub io_timeout_ms: u64,
    pub association_timeout_ms: u64,
    pub max_pdu: u32,
}

/// Descriptive fields and size of the generated series
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeriesConfig {
    pub slice_count: u32,
    pub width: u32,
    pub height: u32,
    pub patient_name: String,
    /// Generated from the current time when absent
    pub patient_id: Option<String>,
    pub patient_birth_date: String,
    pub patient_sex: String,
    pub modality: String,
    pub study_description: String,
    pub study_id: String,
    pub accession_number: String,
    pub series_description: String,
    /// Peak kilovoltage recorded in the header
    pub kvp: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// C-STORE over the DICOM upper layer protocol
    #[default]
    Dimse,
    /// Multipart POST to the upload endpoint
    Rest,
}

/// Pacing and verdict settings for a run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    pub transport: TransportKind,
    /// Pause after every `batch_size` slices
    pub batch_size: u32,
    pub pause_ms: u64,
    /// Ratio of transferred slices below which a partial run is flagged
    pub success_threshold: f64,
    /// Abort the run when the connectivity check fails
    pub require_verification: bool,
}

/// REST upload endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub base_url: String,
    pub upload_path: String,
    pub timeout_ms: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid archive configuration: {reason}")]
    InvalidArchive { reason: String },

    #[error("Invalid series configuration: {reason}")]
    InvalidSeries { reason: String },

    #[error("Invalid synthesis configuration: {reason}")]
    InvalidSynthesis { reason: String },

    #[error("Invalid transfer configuration: {reason}")]
    InvalidTransfer { reason: String },

    #[error("Invalid upload configuration: {reason}")]
    InvalidUpload { reason: String },
}

impl Config {
    /// Read, parse and validate a TOML configuration file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config = Self::read_unvalidated(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse without validating, for callers that still adjust the
    /// values before checking them
    pub fn read_unvalidated(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&text)?)
    }

    /// Parse and validate TOML text
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.archive.validate()?;
        self.series.validate()?;
        self.synthesis.validate()?;
        self.transfer.validate()?;
        if self.transfer.transport == TransportKind::Rest {
            self.upload.validate()?;
        }
        Ok(())
    }
}

impl ArchiveConfig {
    pub fn remote_node(&self) -> RemoteNode {
        RemoteNode::new(&self.remote_aet, &self.host, self.port)
    }

    pub fn scu_config(&self) -> ScuConfig {
        ScuConfig {
            local_aet: self.local_aet.clone(),
            max_pdu: self.max_pdu,
            connect_timeout_ms: self.connect_timeout_ms,
            io_timeout_ms: self.io_timeout_ms,
            association_timeout_ms: self.association_timeout_ms,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |e: dimse::DimseError| ConfigError::InvalidArchive {
            reason: e.to_string(),
        };
        self.remote_node().validate().map_err(invalid)?;
        self.scu_config().validate().map_err(invalid)?;
        Ok(())
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4242,
            remote_aet: "ORTHANC".to_string(),
            local_aet: "CT_SIMULATOR".to_string(),
            connect_timeout_ms: 10_000,
            io_timeout_ms: 30_000,
            association_timeout_ms: 60_000,
            max_pdu: 16_384,
        }
    }
}

impl SeriesConfig {
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidSeries {
            reason: reason.to_string(),
        };
        if self.slice_count == 0 {
            return Err(invalid("slice_count must be greater than 0"));
        }
        if self.width == 0 || self.height == 0 {
            return Err(invalid("width and height must be greater than 0"));
        }
        // Rows and Columns are US (16-bit) attributes
        if self.width > u16::MAX as u32 || self.height > u16::MAX as u32 {
            return Err(invalid("width and height must fit in 16 bits"));
        }
        if self.modality.trim().is_empty() {
            return Err(invalid("modality cannot be empty"));
        }
        if self.patient_name.trim().is_empty() {
            return Err(invalid("patient_name cannot be empty"));
        }
        Ok(())
    }
}

impl Default for SeriesConfig {
    fn default() -> Self {
        Self {
            slice_count: 100,
            width: 512,
            height: 512,
            patient_name: "MultiSlice^CT^Patient".to_string(),
            patient_id: None,
            patient_birth_date: "19750515".to_string(),
            patient_sex: "M".to_string(),
            modality: "CT".to_string(),
            study_description: "CT Chest Multi-Slice for 3D Rendering".to_string(),
            study_id: "CT3D001".to_string(),
            accession_number: "ACC3D001".to_string(),
            series_description: "Chest CT Axial".to_string(),
            kvp: 120.0,
        }
    }
}

impl TransferConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidTransfer {
                reason: "batch_size must be greater than 0".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.success_threshold) {
            return Err(ConfigError::InvalidTransfer {
                reason: "success_threshold must be within [0, 1]".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Dimse,
            batch_size: 10,
            pause_ms: 500,
            success_threshold: 0.9,
            require_verification: true,
        }
    }
}

impl UploadConfig {
    /// Full URL the slices are posted to
    pub fn upload_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.upload_path.trim_start_matches('/')
        )
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = self.base_url.trim();
        if base.is_empty() {
            return Err(ConfigError::InvalidUpload {
                reason: "base_url is required for the rest transport".to_string(),
            });
        }
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ConfigError::InvalidUpload {
                reason: format!("base_url '{}' must be an http(s) URL", base),
            });
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::InvalidUpload {
                reason: "timeout_ms must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001".to_string(),
            upload_path: "/api/dicom/upload".to_string(),
            timeout_ms: 30_000,
        }
    }
}
