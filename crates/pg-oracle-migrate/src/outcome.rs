//! Per-item results of best-effort loops (table copies, constraint toggles,
//! sequence resynchronization).

use serde::{Deserialize, Serialize};

/// Result for one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    Skipped { reason: String },
    Failed { reason: String },
}

/// Named item plus its status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub item: String,
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

impl Outcome {
    pub fn success(item: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            status: OutcomeStatus::Success,
        }
    }

    pub fn skipped(item: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            status: OutcomeStatus::Skipped {
                reason: reason.into(),
            },
        }
    }

    pub fn failed(item: impl Into<String>, reason: impl ToString) -> Self {
        Self {
            item: item.into(),
            status: OutcomeStatus::Failed {
                reason: reason.to_string(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, OutcomeStatus::Success)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.status, OutcomeStatus::Failed { .. })
    }
}

/// Tally of a list of outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl OutcomeCounts {
    pub fn from_outcomes(outcomes: &[Outcome]) -> Self {
        outcomes.iter().fold(Self::default(), |mut acc, o| {
            match o.status {
                OutcomeStatus::Success => acc.succeeded += 1,
                OutcomeStatus::Skipped { .. } => acc.skipped += 1,
                OutcomeStatus::Failed { .. } => acc.failed += 1,
            }
            acc
        })
    }
}
