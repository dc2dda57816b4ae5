use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use slicecast::config::Cli;
use slicecast::transport::ArchiveSession;
use slicecast::{logging, transport, Orchestrator, Verdict};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(Verdict::FullSuccess) => ExitCode::SUCCESS,
        Ok(Verdict::PartialSuccess { below_threshold: false }) => ExitCode::SUCCESS,
        Ok(Verdict::PartialSuccess { below_threshold: true }) => ExitCode::from(2),
        Ok(Verdict::TotalFailure) | Ok(Verdict::Unreachable) => ExitCode::from(3),
        Err(e) => {
            eprintln!("slicecast: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<Verdict> {
    let cli = Cli::parse();
    let config = cli.load_config().context("Failed to load configuration")?;
    logging::init(&config.logging)?;

    tracing::info!("🔧 Starting slicecast");

    let session: Arc<dyn ArchiveSession> =
        Arc::from(transport::from_config(&config).context("Failed to build transport")?);
    let cancel = CancellationToken::new();
    let orchestrator =
        Orchestrator::new(&config, session.clone()).with_cancellation(cancel.clone());

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current slice");
            cancel.cancel();
        }
    });

    let summary = orchestrator.run_configured().await;
    session.close().await;
    Ok(orchestrator.verdict(&summary))
}
