use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence when set
    pub log_level: String,
    pub log_to_file: bool,
    pub log_file_path: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_to_file: false,
            log_file_path: "slicecast.log".to_string(),
        }
    }
}
