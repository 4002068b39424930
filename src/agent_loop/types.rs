//! Core run types for the tool loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

/// Unique run identifier.
pub type RunId = Uuid;

/// Terminal state of one loop invocation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LoopStatus {
    /// The model answered without requesting tools.
    Finished,
    /// The step budget ran out. Not an error.
    Exhausted,
    Failed,
    Cancelled,
}

/// Result of a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoopOutcome {
    pub run_id: RunId,
    pub status: LoopStatus,
    /// Chat requests issued.
    pub requests: usize,
    /// Tool rounds completed.
    pub steps: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub finished_at: DateTime<Utc>,
}

impl LoopOutcome {
    pub fn new(run_id: RunId, status: LoopStatus) -> Self {
        Self {
            run_id,
            status,
            requests: 0,
            steps: 0,
            error: None,
            finished_at: Utc::now(),
        }
    }

    pub fn failed(run_id: RunId, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(run_id, LoopStatus::Failed)
        }
    }

    pub(crate) fn with_counts(mut self, requests: usize, steps: usize) -> Self {
        self.requests = requests;
        self.steps = steps;
        self
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, LoopStatus::Finished | LoopStatus::Exhausted)
    }
}
