mod logging_config;
mod synthesis_config;
pub mod config;

use std::path::PathBuf;

use clap::Parser;

pub use config::{
    ArchiveConfig, Config, ConfigError, SeriesConfig, TransferConfig, TransportKind, UploadConfig,
};
pub use logging_config::LoggingConfig;
pub use synthesis_config::{DensityBand, SynthesisConfig};

/// Command line arguments. Anything given here overrides the file.
#[derive(Debug, Parser)]
#[command(
    name = "slicecast",
    version,
    about = "Generate a synthetic multi-slice CT series and send it to a PACS"
)]
pub struct Cli {
    /// Path to the TOML configuration file; defaults apply when omitted
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Number of slices to generate
    #[arg(long)]
    pub slices: Option<u32>,

    /// Archive host
    #[arg(long)]
    pub host: Option<String>,

    /// Archive DICOM port
    #[arg(long)]
    pub port: Option<u16>,

    /// Called AE title of the archive
    #[arg(long)]
    pub remote_aet: Option<String>,

    /// Transport used to deliver slices
    #[arg(long, value_parser = parse_transport)]
    pub transport: Option<TransportKind>,

    /// Seed for reproducible pixel jitter
    #[arg(long)]
    pub seed: Option<u64>,
}

impl Cli {
    /// Load the configuration file (or defaults), apply overrides and validate
    pub fn load_config(&self) -> Result<Config, ConfigError> {
        let mut config = match &self.config {
            Some(path) => Config::read_unvalidated(path)?,
            None => Config::default(),
        };
        self.apply_overrides(&mut config);
        config.validate()?;
        Ok(config)
    }

    fn apply_overrides(&self, config: &mut Config) {
        if let Some(slices) = self.slices {
            config.series.slice_count = slices;
        }
        if let Some(host) = &self.host {
            config.archive.host = host.clone();
        }
        if let Some(port) = self.port {
            config.archive.port = port;
        }
        if let Some(aet) = &self.remote_aet {
            config.archive.remote_aet = aet.clone();
        }
        if let Some(transport) = self.transport {
            config.transfer.transport = transport;
        }
        if let Some(seed) = self.seed {
            config.synthesis.seed = Some(seed);
        }
    }
}

fn parse_transport(value: &str) -> Result<TransportKind, String> {
    match value.to_ascii_lowercase().as_str() {
        "dimse" | "dicom" => Ok(TransportKind::Dimse),
        "rest" | "http" => Ok(TransportKind::Rest),
        other => Err(format!("unknown transport '{}', expected dimse or rest", other)),
    }
}
