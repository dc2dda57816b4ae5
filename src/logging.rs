use std::fs::File;

use thiserror::Error;
use tracing_subscriber::{self, prelude::*, EnvFilter};

use crate::config::LoggingConfig;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to create log file {path}: {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to initialize logging: {0}")]
    Init(String),
}

/// `RUST_LOG` wins over the configured level
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
}

pub fn init(config: &LoggingConfig) -> Result<(), LoggingError> {
    if config.log_to_file {
        let file = File::create(&config.log_file_path).map_err(|source| LoggingError::File {
            path: config.log_file_path.clone(),
            source,
        })?;

        // Create a file appender
        let file_appender = tracing_subscriber::fmt::layer()
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file));

        // Create a stdout appender
        let stdout_appender = tracing_subscriber::fmt::layer()
            .with_file(true)
            .with_line_number(true);

        // Combine both appenders
        tracing_subscriber::registry()
            .with(env_filter(config))
            .with(file_appender)
            .with(stdout_appender)
            .try_init()
            .map_err(|e| LoggingError::Init(e.to_string()))
    } else {
        // Just stdout if file logging is disabled
        tracing_subscriber::fmt()
            .with_env_filter(env_filter(config))
            .with_file(true)
            .with_line_number(true)
            .try_init()
            .map_err(|e| LoggingError::Init(e.to_string()))
    }
}
