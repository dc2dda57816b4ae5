use serde::{Deserialize, Serialize};

use crate::models::identity::Uid;

/// Result of one slice's generate → encode → store attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferOutcome {
    /// `None` when the slice never got far enough to be assigned one
    pub instance_uid: Option<Uid>,
    pub ordinal: u32,
    pub success: bool,
    pub reason: Option<String>,
}

impl TransferOutcome {
    pub fn succeeded(instance_uid: Uid, ordinal: u32) -> Self {
        Self {
            instance_uid: Some(instance_uid),
            ordinal,
            success: true,
            reason: None,
        }
    }

    pub fn failed(instance_uid: Option<Uid>, ordinal: u32, reason: impl Into<String>) -> Self {
        Self {
            instance_uid,
            ordinal,
            success: false,
            reason: Some(reason.into()),
        }
    }
}

/// Qualitative verdict for operators deciding whether the series is usable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// Every slice was transferred
    FullSuccess,
    /// Some but not all slices were transferred
    PartialSuccess { below_threshold: bool },
    /// Nothing was transferred
    TotalFailure,
    /// The connectivity check failed and no slice was attempted
    Unreachable,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::FullSuccess => write!(f, "full success"),
            Verdict::PartialSuccess {
                below_threshold: true,
            } => write!(f, "partial success (below threshold)"),
            Verdict::PartialSuccess {
                below_threshold: false,
            } => write!(f, "partial success"),
            Verdict::TotalFailure => write!(f, "total failure"),
            Verdict::Unreachable => write!(f, "archive unreachable"),
        }
    }
}

/// The only state that outlives a run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub study_uid: Option<Uid>,
    pub series_uid: Option<Uid>,
    /// Slices requested for this run
    pub requested: u32,
    pub attempted: u32,
    pub succeeded: u32,
    pub failed: u32,
    /// Set when the pre-flight connectivity check failed
    pub unreachable: bool,
    /// Set when the run was cancelled between items
    pub cancelled: bool,
    /// Outcomes of the slices that did not make it
    pub failures: Vec<TransferOutcome>,
}

impl RunSummary {
    /// Summary for a run that was refused before any slice was attempted
    pub fn unreachable(requested: u32) -> Self {
        Self {
            requested,
            unreachable: true,
            ..Default::default()
        }
    }

    pub fn record(&mut self, outcome: TransferOutcome) {
        self.attempted += 1;
        if outcome.success {
            self.succeeded += 1;
        } else {
            self.failed += 1;
            self.failures.push(outcome);
        }
    }

    /// Fraction of attempted slices that were transferred
    pub fn success_ratio(&self) -> f64 {
        if self.attempted == 0 {
            return 0.0;
        }
        self.succeeded as f64 / self.attempted as f64
    }

    /// Full success requires every requested slice to have been transferred;
    /// a cancelled run with all attempted slices stored is still partial.
    pub fn verdict(&self, threshold: f64) -> Verdict {
        if self.unreachable {
            return Verdict::Unreachable;
        }
        if self.succeeded == 0 {
            return Verdict::TotalFailure;
        }
        if self.succeeded == self.requested && self.failed == 0 {
            return Verdict::FullSuccess;
        }
        let ratio = self.succeeded as f64 / self.requested.max(1) as f64;
        Verdict::PartialSuccess {
            below_threshold: ratio < threshold,
        }
    }
}
