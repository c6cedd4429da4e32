use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// How an interpreted result is handled at a given confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Band {
    Reject,
    Confirm,
    ExecuteWithNotice,
    Execute,
}

/// Confidence cut-offs for interpreted commands. Each bound is exclusive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceBands {
    pub reject_below: f64,
    pub confirm_below: f64,
    pub notice_below: f64,
}

impl Default for ConfidenceBands {
    fn default() -> Self {
        Self {
            reject_below: 0.40,
            confirm_below: 0.70,
            notice_below: 0.80,
        }
    }
}

impl ConfidenceBands {
    pub fn classify(&self, confidence: f64) -> Band {
        if confidence.is_nan() || confidence < self.reject_below {
            Band::Reject
        } else if confidence < self.confirm_below {
            Band::Confirm
        } else if confidence < self.notice_below {
            Band::ExecuteWithNotice
        } else {
            Band::Execute
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebounceConfig {
    /// Silence after the last partial before it is executed.
    pub quiet_ms: u64,
    /// Upper bound on waiting for the final of a partial containing "and"/"then".
    pub connector_deadline_ms: u64,
    /// Partials shorter than this never schedule a quiet-period execution.
    pub min_len: usize,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            quiet_ms: 500,
            connector_deadline_ms: 2000,
            min_len: 4,
        }
    }
}

impl DebounceConfig {
    pub fn quiet(&self) -> Duration {
        Duration::from_millis(self.quiet_ms)
    }

    pub fn connector_deadline(&self) -> Duration {
        Duration::from_millis(self.connector_deadline_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub bands: ConfidenceBands,
    pub debounce: DebounceConfig,
    /// JSON-lines command log; no log is kept when unset.
    pub history_path: Option<PathBuf>,
}
