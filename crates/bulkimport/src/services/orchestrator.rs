//! Import orchestrator service
//!
//! Drives one run at a time per call: resolves and opens the source, pulls
//! items through the version sequencer and hands them to a bounded pool of
//! write tasks ordered by identity and parent.

use bulkimport_types::{
    ImportError, ImportFailure, ImportItem, ItemStream, RepositoryWriter, SourceConfig,
    TargetContainer, WriteRequest,
};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::locks::IdentityLocks;
use super::retry::RetryPolicy;
use super::run::ImportRun;
use super::sequencer::{Release, VersionSequencer};
use crate::registry::SourceRegistry;
use crate::settings::OrchestratorSettings;

/// Import orchestrator coordinating sources and the repository writer
pub struct ImportOrchestrator {
    registry: Arc<SourceRegistry>,
    writer: Arc<dyn RepositoryWriter>,
    settings: OrchestratorSettings,
}

impl ImportOrchestrator {
    pub fn new(
        registry: Arc<SourceRegistry>,
        writer: Arc<dyn RepositoryWriter>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            registry,
            writer,
            settings: settings.normalize(),
        }
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Spawn a run onto the current tokio runtime and return its handle
    ///
    /// Must be called from within a runtime.
    pub fn start(
        &self,
        source: &str,
        config: SourceConfig,
        target: TargetContainer,
    ) -> ImportRun {
        let run = ImportRun::new(source.trim(), target, self.settings.dry_run);
        let execution = RunExecution {
            run: run.clone(),
            registry: Arc::clone(&self.registry),
            writer: Arc::clone(&self.writer),
            settings: self.settings.clone(),
        };
        tokio::spawn(execution.execute(config));
        run
    }

    /// Start a run and wait for it to reach a terminal status
    pub async fn run(
        &self,
        source: &str,
        config: SourceConfig,
        target: TargetContainer,
    ) -> ImportRun {
        let run = self.start(source, config, target);
        run.wait().await;
        run
    }
}

/// Aborts a run whose driving task ends without a terminal status
struct RunGuard(ImportRun);

impl Drop for RunGuard {
    fn drop(&mut self) {
        if !self.0.status().is_terminal() {
            self.0.abort("import task ended unexpectedly");
        }
    }
}

struct RunExecution {
    run: ImportRun,
    registry: Arc<SourceRegistry>,
    writer: Arc<dyn RepositoryWriter>,
    settings: OrchestratorSettings,
}

impl RunExecution {
    async fn execute(self, config: SourceConfig) {
        let _guard = RunGuard(self.run.clone());
        let run = &self.run;
        run.mark_running();

        info!(
            "Starting import run {} from source '{}' into {}{}",
            run.id(),
            run.source(),
            run.target(),
            if run.is_dry_run() { " (dry run)" } else { "" }
        );

        let source = match self.registry.resolve(run.source()) {
            Ok(source) => source,
            Err(e) => {
                run.abort(e.to_string());
                return;
            }
        };

        let mut stream = match source.open(&config).await {
            Ok(stream) => stream,
            Err(e) => {
                run.abort(ImportError::from(e).to_string());
                return;
            }
        };

        let mut pool = WritePool::new(run.clone(), Arc::clone(&self.writer), &self.settings);
        let cancellation = run.cancellation_token();
        self.enumerate(stream.as_mut(), &mut pool, &cancellation).await;
        stream.close().await;
        pool.drain().await;

        if cancellation.is_cancelled() {
            run.abort(ImportError::Cancelled.to_string());
        } else {
            run.complete();
        }
    }

    /// Pull the stream dry (or until cancelled), dispatching released items
    async fn enumerate(
        &self,
        stream: &mut dyn ItemStream,
        pool: &mut WritePool,
        cancellation: &CancellationToken,
    ) {
        let run = &self.run;
        let mut sequencer =
            VersionSequencer::new(self.settings.lookahead, self.settings.version_horizon);

        loop {
            let entry = tokio::select! {
                biased;
                _ = cancellation.cancelled() => return,
                entry = stream.next_item() => entry,
            };

            match entry {
                Some(Ok(item)) => {
                    run.item_enumerated();
                    if let Some(release) = sequencer.push(item) {
                        self.release(release, pool, cancellation).await;
                    }
                }
                Some(Err(e)) => {
                    run.item_enumerated();
                    let reference = e.reference.clone();
                    run.record_failure(ImportFailure::from_error(reference, &e.into()));
                }
                None => break,
            }
        }

        debug!(
            "Import run {}: source exhausted, flushing {} buffered items",
            run.id(),
            sequencer.buffered()
        );
        while let Some(release) = sequencer.drain_next() {
            if cancellation.is_cancelled() {
                return;
            }
            self.release(release, pool, cancellation).await;
        }
    }

    async fn release(
        &self,
        release: Release,
        pool: &mut WritePool,
        cancellation: &CancellationToken,
    ) {
        match release {
            Release::Ready(item) => pool.dispatch(item, cancellation).await,
            Release::OutOfOrder { item, latest } => {
                let error = ImportError::VersionOrder {
                    identity: item.identity().to_string(),
                    version: item.version,
                    latest,
                };
                self.run
                    .record_failure(ImportFailure::from_error(item.reference(), &error));
            }
        }
    }
}

/// Bounded set of write tasks
struct WritePool {
    run: ImportRun,
    writer: Arc<dyn RepositoryWriter>,
    policy: RetryPolicy,
    dry_run: bool,
    semaphore: Arc<Semaphore>,
    locks: Arc<IdentityLocks>,
    tasks: JoinSet<()>,
}

impl WritePool {
    fn new(
        run: ImportRun,
        writer: Arc<dyn RepositoryWriter>,
        settings: &OrchestratorSettings,
    ) -> Self {
        Self {
            run,
            writer,
            policy: settings.retry_policy(),
            dry_run: settings.dry_run,
            semaphore: Arc::new(Semaphore::new(settings.parallelism)),
            locks: Arc::new(IdentityLocks::new()),
            tasks: JoinSet::new(),
        }
    }

    /// Wait for a free slot, then spawn the item's write
    ///
    /// Items are ticketed in call order, which fixes the per-identity and
    /// parent-before-child write order.
    async fn dispatch(&mut self, item: ImportItem, cancellation: &CancellationToken) {
        let permit = tokio::select! {
            biased;
            _ = cancellation.cancelled() => return,
            permit = Arc::clone(&self.semaphore).acquire_owned() => permit,
        };
        // The semaphore is never closed
        let Ok(permit) = permit else {
            return;
        };

        let mut ticket = self.locks.enqueue(item.identity(), item.parent());
        let mut settled = Settled::new(self.run.clone(), item.reference());
        let job = WriteJob {
            run: self.run.clone(),
            writer: Arc::clone(&self.writer),
            policy: self.policy,
            dry_run: self.dry_run,
        };

        self.tasks.spawn(async move {
            let _permit = permit;
            ticket.turn().await;
            job.write(item).await;
            settled.done();
            drop(ticket);
        });

        while let Some(result) = self.tasks.try_join_next() {
            Self::log_join(result);
        }
    }

    /// Wait for every spawned write to finish
    async fn drain(&mut self) {
        while let Some(result) = self.tasks.join_next().await {
            Self::log_join(result);
        }
        if !self.locks.is_empty() {
            warn!(
                "Import run {}: {} identity locks left after draining",
                self.run.id(),
                self.locks.len()
            );
        }
    }

    fn log_join(result: Result<(), tokio::task::JoinError>) {
        if let Err(e) = result {
            error!("Import write task failed: {}", e);
        }
    }
}

/// Keeps the in-flight counter honest and reports writes that never finished
struct Settled {
    run: ImportRun,
    reference: String,
    done: bool,
}

impl Settled {
    fn new(run: ImportRun, reference: String) -> Self {
        run.item_dispatched();
        Self {
            run,
            reference,
            done: false,
        }
    }

    fn done(&mut self) {
        self.done = true;
    }
}

impl Drop for Settled {
    fn drop(&mut self) {
        self.run.item_settled();
        if !self.done {
            let error = ImportError::Internal("write task did not finish".to_string());
            self.run
                .record_failure(ImportFailure::from_error(self.reference.clone(), &error));
        }
    }
}

/// One item's write with retries
struct WriteJob {
    run: ImportRun,
    writer: Arc<dyn RepositoryWriter>,
    policy: RetryPolicy,
    dry_run: bool,
}

impl WriteJob {
    async fn write(&self, item: ImportItem) {
        let run_id = self.run.id();

        if self.dry_run {
            debug!("Import run {}: dry run, skipping write of {}", run_id, item.reference());
            self.run.item_written(item.size_bytes());
            return;
        }

        let mut attempt = 1;
        loop {
            let request = WriteRequest::for_item(self.run.target(), &item);
            let error = match self.writer.write(request).await {
                Ok(()) => {
                    debug!(
                        "Import run {}: wrote {} {} ({} bytes)",
                        run_id,
                        item.kind,
                        item.reference(),
                        item.size_bytes()
                    );
                    self.run.item_written(item.size_bytes());
                    return;
                }
                Err(e) => e,
            };

            let message = error.to_string();
            match self.policy.on_failure(attempt, error) {
                Ok(delay) => {
                    warn!(
                        "Import run {}: write of {} failed (attempt {}/{}), retrying in {}ms: {}",
                        run_id,
                        item.reference(),
                        attempt,
                        self.policy.max_attempts(),
                        delay.as_millis(),
                        message
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => {
                    self.run
                        .record_failure(ImportFailure::from_error(item.reference(), &error));
                    return;
                }
            }
        }
    }
}
