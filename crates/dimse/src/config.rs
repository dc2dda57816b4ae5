//! Configuration types for the DIMSE client

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the DIMSE service class user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScuConfig {
    /// Local (calling) Application Entity Title
    pub local_aet: String,

    /// Maximum PDU size in bytes
    #[serde(default = "default_max_pdu")]
    pub max_pdu: u32,

    /// TCP connection timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Socket read/write timeout in milliseconds
    #[serde(default = "default_io_timeout")]
    pub io_timeout_ms: u64,

    /// Upper bound for a whole association (negotiate, transfer, release)
    #[serde(default = "default_association_timeout")]
    pub association_timeout_ms: u64,
}

/// Configuration for a remote DICOM node
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteNode {
    /// Remote (called) Application Entity Title
    pub ae_title: String,

    /// Remote host address
    pub host: String,

    /// Remote port
    pub port: u16,

    /// Connection timeout in milliseconds (overrides global setting)
    pub connect_timeout_ms: Option<u64>,

    /// Maximum PDU size for this node (overrides global setting)
    pub max_pdu: Option<u32>,
}

impl Default for ScuConfig {
    fn default() -> Self {
        Self {
            local_aet: "SLICECAST".to_string(),
            max_pdu: default_max_pdu(),
            connect_timeout_ms: default_connect_timeout(),
            io_timeout_ms: default_io_timeout(),
            association_timeout_ms: default_association_timeout(),
        }
    }
}

impl ScuConfig {
    /// Get connection timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Get socket read/write timeout as Duration
    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }

    /// Get association timeout as Duration
    pub fn association_timeout(&self) -> Duration {
        Duration::from_millis(self.association_timeout_ms)
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::error::Result<()> {
        validate_ae_title(&self.local_aet)?;

        if self.max_pdu < 16384 || self.max_pdu > 131072 {
            return Err(crate::error::DimseError::config(
                "Max PDU size must be between 16384 and 131072 bytes",
            ));
        }

        if self.connect_timeout_ms == 0 || self.io_timeout_ms == 0 || self.association_timeout_ms == 0
        {
            return Err(crate::error::DimseError::config(
                "Timeouts must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl RemoteNode {
    /// Create a new remote node configuration
    pub fn new(ae_title: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            ae_title: ae_title.into(),
            host: host.into(),
            port,
            connect_timeout_ms: None,
            max_pdu: None,
        }
    }

    /// Set connection timeout for this node
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.connect_timeout_ms = Some(timeout_ms);
        self
    }

    /// `host:port` form used to open the TCP connection
    pub fn socket_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Validate the remote node configuration
    pub fn validate(&self) -> crate::error::Result<()> {
        validate_ae_title(&self.ae_title)?;

        if self.host.is_empty() {
            return Err(crate::error::DimseError::config("Remote host cannot be empty"));
        }

        if self.port == 0 {
            return Err(crate::error::DimseError::config(
                "Remote port must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl std::fmt::Display for RemoteNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}:{}", self.ae_title, self.host, self.port)
    }
}

/// AE titles are 1-16 characters of the default character repertoire,
/// with no backslash and no control characters
pub fn validate_ae_title(aet: &str) -> crate::error::Result<()> {
    let trimmed = aet.trim();
    if trimmed.is_empty() || aet.len() > 16 {
        return Err(crate::error::DimseError::InvalidAeTitle(format!(
            "'{}' must be 1-16 characters",
            aet
        )));
    }
    if aet.chars().any(|c| c == '\\' || c.is_control() || !c.is_ascii()) {
        return Err(crate::error::DimseError::InvalidAeTitle(format!(
            "'{}' contains characters outside the default repertoire",
            aet
        )));
    }
    Ok(())
}

// Default value functions
fn default_max_pdu() -> u32 {
    16384
}

fn default_connect_timeout() -> u64 {
    10_000 // 10 seconds
}

fn default_io_timeout() -> u64 {
    30_000 // 30 seconds
}

fn default_association_timeout() -> u64 {
    60_000 // 1 minute
}
