//! Append-only JSON-lines log of processed commands.

use crate::{CommandOutcome, Origin, PipelineError, Result, Route};
use anyhow::Context;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRecord {
    pub id: Uuid,
    pub timestamp: String,
    pub text: String,
    pub origin: Origin,
    #[serde(default)]
    pub route: Option<Route>,
    pub outcome: String,
    pub detail: String,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub steps: usize,
}

impl CommandRecord {
    pub fn new(text: &str, origin: Origin, outcome: &CommandOutcome) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: OffsetDateTime::now_utc()
                .format(&Rfc3339)
                .unwrap_or_default(),
            text: text.to_string(),
            origin,
            route: outcome.route(),
            outcome: outcome.kind().to_string(),
            detail: outcome.to_string(),
            confidence: outcome.confidence(),
            steps: outcome.plan().map_or(0, |p| p.len()),
        }
    }
}

/// Command log; a history without a path records nothing.
#[derive(Debug, Default)]
pub struct CommandHistory {
    path: Option<PathBuf>,
    write_lock: Mutex<()>,
}

impl CommandHistory {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn append(&self, record: &CommandRecord) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let fail = |message: String| PipelineError::History {
            path: path.display().to_string(),
            message,
        };
        let line = serde_json::to_string(record).map_err(|e| fail(e.to_string()))?;

        let _guard = self.write_lock.lock();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| fail(e.to_string()))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| fail(e.to_string()))?;
        writeln!(file, "{line}").map_err(|e| fail(e.to_string()))
    }

    /// Every record in the log at `path`, oldest first.
    pub fn read(path: impl AsRef<Path>) -> anyhow::Result<Vec<CommandRecord>> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading command history: {}", path.display()))?;
        raw.lines()
            .filter(|l| !l.trim().is_empty())
            .enumerate()
            .map(|(n, line)| {
                serde_json::from_str(line)
                    .with_context(|| format!("decoding {} line {}", path.display(), n + 1))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_one_line_per_command() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("logs/history.jsonl");
        let history = CommandHistory::new(Some(path.clone()));

        let rejected = CommandOutcome::Rejected {
            reason: "too vague".into(),
            confidence: 0.2,
        };
        history.append(&CommandRecord::new("do the thing", Origin::Final, &rejected))?;
        let halted = CommandOutcome::Halted {
            reason: "emergency stop".into(),
        };
        history.append(&CommandRecord::new("stop", Origin::Partial, &halted))?;

        let records = CommandHistory::read(&path)?;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].outcome, "rejected");
        assert_eq!(records[0].confidence, Some(0.2));
        assert_eq!(records[1].origin, Origin::Partial);
        assert_ne!(records[0].id, records[1].id);
        assert!(OffsetDateTime::parse(&records[0].timestamp, &Rfc3339).is_ok());
        Ok(())
    }

    #[test]
    fn pathless_history_is_a_no_op() {
        let history = CommandHistory::default();
        let outcome = CommandOutcome::NothingToExecute {
            feedback: "nothing".into(),
        };
        assert!(history
            .append(&CommandRecord::new("", Origin::Cli, &outcome))
            .is_ok());
        assert!(history.path().is_none());
    }
}
