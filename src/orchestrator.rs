//! Transmission orchestrator
//!
//! Drives one run: pre-flight connectivity check, then generate → encode →
//! store for every ordinal in sequence, pausing after each batch, and finally
//! produces the [`RunSummary`]. A failed slice is recorded and the loop moves
//! on; only the pre-flight check can end a run early.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{Config, SeriesConfig, TransferConfig};
use crate::encoder::SliceEncoder;
use crate::models::exam::SeriesContext;
use crate::models::outcome::{RunSummary, TransferOutcome, Verdict};
use crate::models::slice::Dimensions;
use crate::synth::VolumeSynthesizer;
use crate::transport::ArchiveSession;

/// Slices between progress log lines
const PROGRESS_INTERVAL: u32 = 10;

pub struct Orchestrator {
    session: Arc<dyn ArchiveSession>,
    synthesizer: VolumeSynthesizer,
    encoder: SliceEncoder,
    series: SeriesConfig,
    transfer: TransferConfig,
    seed: Option<u64>,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(config: &Config, session: Arc<dyn ArchiveSession>) -> Self {
        Self {
            session,
            synthesizer: VolumeSynthesizer::new(config.synthesis.clone()),
            encoder: SliceEncoder::new(config.series.kvp),
            series: config.series.clone(),
            transfer: config.transfer.clone(),
            seed: config.synthesis.seed,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned token, e.g. one tied to Ctrl-C
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run with the slice count and dimensions from the configuration
    pub async fn run_configured(&self) -> RunSummary {
        self.run(self.series.slice_count, self.series.dimensions())
            .await
    }

    /// Send `total` slices of `dims` to the archive. The session stays open;
    /// closing it is up to its owner.
    pub async fn run(&self, total: u32, dims: Dimensions) -> RunSummary {
        info!(
            "Starting run: {} slices of {} via {}",
            total,
            dims,
            self.session.describe()
        );

        if !self.session.verify_connectivity().await {
            if self.transfer.require_verification {
                error!(
                    "Connectivity check against {} failed, no slices will be sent",
                    self.session.describe()
                );
                let summary = RunSummary::unreachable(total);
                self.log_summary(&summary);
                return summary;
            }
            warn!("Connectivity check failed, continuing because verification is optional");
        }

        let context = SeriesContext::create(&self.series, self.synthesizer.config().geometry());
        info!(
            study_uid = %context.exam.study_uid,
            series_uid = %context.series.series_uid,
            "Created exam identity"
        );

        let mut summary = RunSummary {
            study_uid: Some(context.exam.study_uid.clone()),
            series_uid: Some(context.series.series_uid.clone()),
            requested: total,
            ..Default::default()
        };
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        for index in 1..=total {
            if self.cancel.is_cancelled() {
                warn!("Run cancelled before slice {}/{}", index, total);
                summary.cancelled = true;
                break;
            }

            let outcome = self.transfer_slice(&context, index, total, dims, &mut rng).await;
            if !outcome.success {
                warn!(
                    "Failed to send slice {}/{}: {}",
                    index,
                    total,
                    outcome.reason.as_deref().unwrap_or("unknown")
                );
            }
            summary.record(outcome);

            if index % PROGRESS_INTERVAL == 0 || index == total {
                info!(
                    "Progress {}/{} ({} sent, {} failed)",
                    index, total, summary.succeeded, summary.failed
                );
            }

            if index % self.transfer.batch_size == 0 && index < total {
                self.pause().await;
            }
        }

        self.log_summary(&summary);
        summary
    }

    pub fn verdict(&self, summary: &RunSummary) -> Verdict {
        summary.verdict(self.transfer.success_threshold)
    }

    /// One ordinal end to end. The slice and its encoding are dropped as soon
    /// as the outcome is known.
    async fn transfer_slice(
        &self,
        context: &SeriesContext,
        index: u32,
        total: u32,
        dims: Dimensions,
        rng: &mut StdRng,
    ) -> TransferOutcome {
        let slice = match self
            .synthesizer
            .build_slice(context, index, total, dims, rng)
        {
            Ok(slice) => slice,
            Err(e) => return TransferOutcome::failed(None, index, e.to_string()),
        };
        let uid = slice.instance_uid.clone();

        let encoded = match self
            .encoder
            .encode(&context.exam, &context.series, &slice, index)
        {
            Ok(encoded) => encoded,
            Err(e) => return TransferOutcome::failed(Some(uid), index, e.to_string()),
        };
        drop(slice);

        let receipt = self.session.store(&encoded).await;
        if receipt.success {
            TransferOutcome::succeeded(uid, index)
        } else {
            TransferOutcome::failed(Some(uid), index, receipt.reason())
        }
    }

    /// Fixed pause between batches, cut short by cancellation
    async fn pause(&self) {
        if self.transfer.pause_ms == 0 {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(self.transfer.pause_ms)) => {}
            _ = self.cancel.cancelled() => {}
        }
    }

    fn log_summary(&self, summary: &RunSummary) {
        let verdict = self.verdict(summary);
        info!(
            requested = summary.requested,
            attempted = summary.attempted,
            succeeded = summary.succeeded,
            failed = summary.failed,
            cancelled = summary.cancelled,
            "Run finished: {}",
            verdict
        );
        match verdict {
            Verdict::FullSuccess => {
                if let Some(study) = &summary.study_uid {
                    info!("Series complete and ready for 3D reconstruction (study {})", study);
                }
            }
            Verdict::PartialSuccess { below_threshold } => {
                warn!(
                    "{} slices failed to send; the study may be incomplete for 3D reconstruction",
                    summary.failed
                );
                if below_threshold {
                    warn!(
                        "Only {:.0}% of slices transferred, below the {:.0}% threshold",
                        summary.succeeded as f64 / summary.requested.max(1) as f64 * 100.0,
                        self.transfer.success_threshold * 100.0
                    );
                }
                for failure in &summary.failures {
                    warn!(
                        "  slice {}: {}",
                        failure.ordinal,
                        failure.reason.as_deref().unwrap_or("unknown")
                    );
                }
            }
            Verdict::TotalFailure => error!("No slices were transferred"),
            Verdict::Unreachable => error!("Archive unreachable, nothing was attempted"),
        }
    }
}
