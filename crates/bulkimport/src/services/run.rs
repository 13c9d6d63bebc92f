//! Import run handle
//!
//! Shared between the task driving a run and any number of observers. Every
//! query takes a short lock or reads the status channel, so observers never
//! wait on the run's progress.

use bulkimport_types::{
    ImportFailure, ProgressSnapshot, RunStatus, RunSummary, TargetContainer,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

struct RunState {
    id: Uuid,
    source: String,
    target: TargetContainer,
    dry_run: bool,
    started_at: DateTime<Utc>,
    status: watch::Sender<RunStatus>,
    progress: Mutex<ProgressSnapshot>,
    failures: Mutex<Vec<ImportFailure>>,
    abort_reason: Mutex<Option<String>>,
    ended_at: Mutex<Option<DateTime<Utc>>>,
    cancellation: CancellationToken,
}

/// Handle to one execution of an import
#[derive(Clone)]
pub struct ImportRun {
    state: Arc<RunState>,
}

impl ImportRun {
    pub(crate) fn new(source: &str, target: TargetContainer, dry_run: bool) -> Self {
        let (status, _) = watch::channel(RunStatus::Pending);
        Self {
            state: Arc::new(RunState {
                id: Uuid::new_v4(),
                source: source.to_string(),
                target,
                dry_run,
                started_at: Utc::now(),
                status,
                progress: Mutex::new(ProgressSnapshot::default()),
                failures: Mutex::new(Vec::new()),
                abort_reason: Mutex::new(None),
                ended_at: Mutex::new(None),
                cancellation: CancellationToken::new(),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.state.id
    }

    pub fn source(&self) -> &str {
        &self.state.source
    }

    pub fn target(&self) -> &TargetContainer {
        &self.state.target
    }

    pub fn is_dry_run(&self) -> bool {
        self.state.dry_run
    }

    pub fn status(&self) -> RunStatus {
        *self.state.status.borrow()
    }

    /// Point-in-time copy of the counters
    pub fn progress_snapshot(&self) -> ProgressSnapshot {
        *self.state.progress.lock()
    }

    /// Copy of the failures recorded so far
    pub fn failures(&self) -> Vec<ImportFailure> {
        self.state.failures.lock().clone()
    }

    pub fn abort_reason(&self) -> Option<String> {
        self.state.abort_reason.lock().clone()
    }

    /// Request cancellation. Writes already in flight still complete.
    pub fn cancel(&self) {
        if !self.state.cancellation.is_cancelled() {
            info!("Cancellation requested for import run {}", self.state.id);
            self.state.cancellation.cancel();
        }
    }

    /// Wait for the run to reach a terminal status
    pub async fn wait(&self) -> RunStatus {
        let mut receiver = self.state.status.subscribe();
        let waited = receiver
            .wait_for(|status| status.is_terminal())
            .await
            .map(|status| *status);
        waited.unwrap_or_else(|_| self.status())
    }

    pub fn summary(&self) -> RunSummary {
        let ended_at = *self.state.ended_at.lock();
        let elapsed = ended_at.unwrap_or_else(Utc::now) - self.state.started_at;

        RunSummary {
            run_id: self.state.id,
            source: self.state.source.clone(),
            target: self.state.target.clone(),
            status: self.status(),
            dry_run: self.state.dry_run,
            progress: self.progress_snapshot(),
            failures: self.failures(),
            abort_reason: self.abort_reason(),
            started_at: self.state.started_at,
            ended_at,
            duration_seconds: elapsed.num_milliseconds().max(0) as f64 / 1000.0,
        }
    }

    pub(crate) fn cancellation_token(&self) -> CancellationToken {
        self.state.cancellation.clone()
    }

    pub(crate) fn mark_running(&self) {
        self.state.status.send_if_modified(|status| {
            if *status == RunStatus::Pending {
                *status = RunStatus::Running;
                true
            } else {
                false
            }
        });
    }

    pub(crate) fn item_enumerated(&self) {
        self.state.progress.lock().items_enumerated += 1;
    }

    pub(crate) fn item_dispatched(&self) {
        self.state.progress.lock().items_in_flight += 1;
    }

    pub(crate) fn item_settled(&self) {
        let mut progress = self.state.progress.lock();
        progress.items_in_flight = progress.items_in_flight.saturating_sub(1);
    }

    pub(crate) fn item_written(&self, bytes: u64) {
        let mut progress = self.state.progress.lock();
        progress.items_processed += 1;
        progress.bytes_processed += bytes;
    }

    pub(crate) fn record_failure(&self, failure: ImportFailure) {
        warn!(
            "Import run {}: {} failed ({}): {}",
            self.state.id, failure.item, failure.kind, failure.message
        );
        // Counter and list change under the list lock so they never disagree
        let mut failures = self.state.failures.lock();
        failures.push(failure);
        self.state.progress.lock().items_failed = failures.len() as u64;
    }

    /// Finish after the stream was exhausted and in-flight work drained
    pub(crate) fn complete(&self) {
        let status = if self.state.failures.lock().is_empty() {
            RunStatus::Completed
        } else {
            RunStatus::CompletedWithErrors
        };
        if self.finish(status) {
            let progress = self.progress_snapshot();
            info!(
                "Import run {} {}: {} items processed, {} bytes, {} failed",
                self.state.id,
                status,
                progress.items_processed,
                progress.bytes_processed,
                progress.items_failed
            );
        }
    }

    pub(crate) fn abort(&self, reason: impl Into<String>) {
        let reason = reason.into();
        {
            let mut abort_reason = self.state.abort_reason.lock();
            if abort_reason.is_none() && !self.status().is_terminal() {
                *abort_reason = Some(reason.clone());
            }
        }
        if self.finish(RunStatus::Aborted) {
            error!("Import run {} aborted: {}", self.state.id, reason);
        }
    }

    /// Move to a terminal status once; later calls are ignored
    fn finish(&self, terminal: RunStatus) -> bool {
        let mut ended_at = self.state.ended_at.lock();
        let changed = self.state.status.send_if_modified(|status| {
            if status.is_terminal() {
                false
            } else {
                *status = terminal;
                true
            }
        });
        if changed {
            *ended_at = Some(Utc::now());
        }
        changed
    }
}
