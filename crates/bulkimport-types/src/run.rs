//! Run status, progress and failure reporting types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::{error::ImportError, writer::TargetContainer};

/// Lifecycle state of an import run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    CompletedWithErrors,
    Aborted,
}

impl RunStatus {
    pub fn as_str(&self) -> &str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::CompletedWithErrors => "completed-with-errors",
            RunStatus::Aborted => "aborted",
        }
    }

    /// Terminal states never change again
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::CompletedWithErrors | RunStatus::Aborted
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Category of a recorded per-item failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    Enumeration,
    VersionOrder,
    PermanentWrite,
    RetriesExhausted,
    Internal,
}

impl FailureKind {
    pub fn as_str(&self) -> &str {
        match self {
            FailureKind::Enumeration => "enumeration",
            FailureKind::VersionOrder => "version-order",
            FailureKind::PermanentWrite => "permanent-write",
            FailureKind::RetriesExhausted => "retries-exhausted",
            FailureKind::Internal => "internal",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One item that did not import
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportFailure {
    /// Item reference (target path, or source path when enumeration failed)
    pub item: String,
    pub kind: FailureKind,
    pub message: String,
}

impl ImportFailure {
    /// Build a failure record from a per-item error
    pub fn from_error(item: impl Into<String>, error: &ImportError) -> Self {
        let kind = match error {
            ImportError::Enumeration(_) => FailureKind::Enumeration,
            ImportError::VersionOrder { .. } => FailureKind::VersionOrder,
            ImportError::Write(_) => FailureKind::PermanentWrite,
            ImportError::RetriesExhausted { .. } => FailureKind::RetriesExhausted,
            _ => FailureKind::Internal,
        };

        Self {
            item: item.into(),
            kind,
            message: error.to_string(),
        }
    }
}

/// Point-in-time copy of a run's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Entries pulled from the source, including ones that failed to enumerate
    pub items_enumerated: u64,
    /// Items durably written
    pub items_processed: u64,
    /// Content bytes durably written
    pub bytes_processed: u64,
    /// Items recorded in the failure list
    pub items_failed: u64,
    /// Items currently being written
    pub items_in_flight: u64,
}

/// Serializable report of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub source: String,
    pub target: TargetContainer,
    pub status: RunStatus,
    pub dry_run: bool,
    pub progress: ProgressSnapshot,
    pub failures: Vec<ImportFailure>,
    pub abort_reason: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Wall-clock duration so far (seconds)
    pub duration_seconds: f64,
}
