//! Structured event logger (C3).
//!
//! One append-only JSON-lines file per `(workflow_id, agent)` pair under
//! `<log_dir>/<workflow_id>/<agent>.jsonl`. Cheap to construct: opening the
//! file is deferred to the first `log_*` call.

use chrono::{DateTime, Utc};
use forge_core::{ForgeError, WorkflowId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Path, PathBuf};

pub type Result<T> = std::result::Result<T, ForgeError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventRecord {
    Event {
        timestamp: DateTime<Utc>,
        name: String,
        data: Value,
    },
    Decision {
        timestamp: DateTime<Utc>,
        decision: String,
        rationale: String,
        alternatives_considered: Vec<String>,
        metadata: Value,
    },
    AlignmentCheck {
        timestamp: DateTime<Utc>,
        is_aligned: bool,
        reason: String,
    },
    PerformanceMetric {
        timestamp: DateTime<Utc>,
        name: String,
        value: f64,
        unit: String,
    },
    Error {
        timestamp: DateTime<Utc>,
        message: String,
        exception_repr: Option<String>,
    },
}

impl EventRecord {
    fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Event { timestamp, .. }
            | Self::Decision { timestamp, .. }
            | Self::AlignmentCheck { timestamp, .. }
            | Self::PerformanceMetric { timestamp, .. }
            | Self::Error { timestamp, .. } => *timestamp,
        }
    }
}

/// Summary shape returned by `get_log_summary`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogSummary {
    pub total_events: usize,
    pub decisions: Vec<EventRecord>,
    pub alignment_checks: Vec<EventRecord>,
    pub performance_metrics: Vec<EventRecord>,
}

/// A logger scoped to one `(workflow_id, agent)` pair.
#[derive(Debug, Clone)]
pub struct EventLogger {
    path: PathBuf,
}

impl EventLogger {
    pub fn new(log_dir: &Path, workflow_id: &WorkflowId, agent: &str) -> Self {
        Self {
            path: log_dir.join(workflow_id.as_str()).join(format!("{agent}.jsonl")),
        }
    }

    fn append(&self, record: &EventRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let line = serde_json::to_string(record)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    pub fn log_event(&self, name: &str, data: Value) -> Result<()> {
        self.append(&EventRecord::Event {
            timestamp: Utc::now(),
            name: name.to_string(),
            data,
        })
    }

    pub fn log_decision(
        &self,
        decision: &str,
        rationale: &str,
        alternatives_considered: Vec<String>,
        metadata: Value,
    ) -> Result<()> {
        self.append(&EventRecord::Decision {
            timestamp: Utc::now(),
            decision: decision.to_string(),
            rationale: rationale.to_string(),
            alternatives_considered,
            metadata,
        })
    }

    pub fn log_alignment_check(&self, is_aligned: bool, reason: &str) -> Result<()> {
        self.append(&EventRecord::AlignmentCheck {
            timestamp: Utc::now(),
            is_aligned,
            reason: reason.to_string(),
        })
    }

    pub fn log_performance_metric(&self, name: &str, value: f64, unit: &str) -> Result<()> {
        self.append(&EventRecord::PerformanceMetric {
            timestamp: Utc::now(),
            name: name.to_string(),
            value,
            unit: unit.to_string(),
        })
    }

    pub fn log_error(&self, message: &str, exception_repr: Option<&str>) -> Result<()> {
        self.append(&EventRecord::Error {
            timestamp: Utc::now(),
            message: message.to_string(),
            exception_repr: exception_repr.map(str::to_string),
        })
    }

    /// Read the log back and summarize it. Order is preserved within each
    /// bucket since the underlying file is append-only.
    pub fn get_log_summary(&self) -> Result<LogSummary> {
        let mut summary = LogSummary::default();
        let Ok(content) = std::fs::read_to_string(&self.path) else {
            return Ok(summary);
        };
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let record: EventRecord = serde_json::from_str(line)?;
            summary.total_events += 1;
            match &record {
                EventRecord::Decision { .. } => summary.decisions.push(record),
                EventRecord::AlignmentCheck { .. } => summary.alignment_checks.push(record),
                EventRecord::PerformanceMetric { .. } => summary.performance_metrics.push(record),
                _ => {}
            }
        }
        Ok(summary)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Merge all per-agent logs for a workflow into one chronological stream,
/// for `forgectl logs`.
pub fn read_workflow_events(log_dir: &Path, workflow_id: &WorkflowId) -> Result<Vec<EventRecord>> {
    let dir = log_dir.join(workflow_id.as_str());
    let mut all = Vec::new();
    if !dir.exists() {
        return Ok(all);
    }
    for entry in std::fs::read_dir(&dir)? {
        let entry = entry?;
        let content = std::fs::read_to_string(entry.path())?;
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            all.push(serde_json::from_str(line)?);
        }
    }
    all.sort_by_key(EventRecord::timestamp);
    Ok(all)
}
