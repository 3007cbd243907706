//! The sync manager: change ledger, conflict handling, watcher lifecycle,
//! and single-flight sync passes.
//!
//! [`SyncManager`] is a cheap-to-clone handle. All clones share one ledger,
//! one event channel, and at most one running watcher.
//!
//! # Locking
//!
//! The ledger sits behind a `std::sync::Mutex` that is never held across an
//! `.await`. Recording a change and checking the opposite side for a
//! conflict happen under one lock acquisition, so concurrent recorders can
//! neither miss a conflict nor create a second one for the same issue.
//!
//! # Sync passes
//!
//! A pass is spawned as its own task and stored as a shared future. Callers
//! arriving while it runs await the same future and get the same report;
//! only the pass itself emits `sync:started` and `sync:completed`.

use super::change::{ChangeLog, ChangeRecord, ChangeSource, ChangeType, ConflictRecord};
use super::events::SyncEvent;
use super::resolver::{resolve, ConflictStrategy, Resolution, Winner};
use super::scheduler::{run_scheduler, SchedulerConfig, SchedulerHost};
use super::watcher::DirectoryWatcher;
use crate::config::SyncConfig;
use crate::domain::{Issue, IssueId};
use crate::error::{Error, ItemSyncError, ItemSyncErrorKind, Result};
use crate::store::{IssueRepository, IssueStore, JsonlStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const EVENT_CAPACITY: usize = 256;
const RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// Destination for local changes during a sync pass.
///
/// Without a sink, local changes are acknowledged as synced.
#[async_trait]
pub trait ChangeSink: Send + Sync {
    /// Deliver one local change to the remote side.
    ///
    /// # Errors
    ///
    /// Transient failures (`Error::Transport`) are retried by the caller.
    async fn publish(&self, change: &ChangeRecord) -> Result<()>;
}

/// Watcher lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchStatus {
    /// Never started
    Idle,
    /// Watch attached
    Watching,
    /// Stopped; may be started again
    Stopped,
}

/// Snapshot of the manager's state. Owned copies, never live views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncState {
    /// Completion time of the last sync pass
    pub last_sync: Option<DateTime<Utc>>,
    /// Local changes not yet synced
    pub pending_local: Vec<ChangeRecord>,
    /// Remote changes not yet applied
    pub pending_remote: Vec<ChangeRecord>,
    /// Conflicts awaiting resolution
    pub conflicts: Vec<ConflictRecord>,
    /// Resolutions the next pass will apply
    pub resolved: Vec<Resolution>,
    /// A sync pass is running
    pub is_syncing: bool,
    /// The directory watch is attached
    pub is_watching: bool,
}

/// Outcome of one sync pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Pass start
    pub started_at: DateTime<Utc>,
    /// Pass end
    pub finished_at: DateTime<Utc>,
    /// Remote changes written to disk
    pub applied_remote: usize,
    /// Local changes delivered (or acknowledged without a sink)
    pub published_local: usize,
    /// Conflict resolutions applied
    pub resolved: usize,
    /// Conflicts still waiting after the pass
    pub pending_conflicts: usize,
    /// Per-item failures; those items stay pending
    pub errors: Vec<ItemSyncError>,
}

impl SyncReport {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: started_at,
            applied_remote: 0,
            published_local: 0,
            resolved: 0,
            pending_conflicts: 0,
            errors: Vec::new(),
        }
    }

    /// Returns `true` if no item failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

struct Ledger {
    log: ChangeLog,
    resolved: Vec<Resolution>,
    last_sync: Option<DateTime<Utc>>,
    is_syncing: bool,
    status: WatchStatus,
}

struct Running {
    watcher: DirectoryWatcher,
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

type SyncPass = Shared<BoxFuture<'static, SyncReport>>;

struct Inner {
    config: SyncConfig,
    store: JsonlStore,
    sink: Option<Arc<dyn ChangeSink>>,
    ledger: Mutex<Ledger>,
    baseline: Mutex<IssueStore>,
    /// Held across "load, diff, replace baseline" and across
    /// "write file, update baseline".
    io: tokio::sync::Mutex<()>,
    in_flight: Mutex<Option<SyncPass>>,
    running: tokio::sync::Mutex<Option<Running>>,
    events: broadcast::Sender<SyncEvent>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to a sync manager.
#[derive(Clone)]
pub struct SyncManager {
    inner: Arc<Inner>,
}

impl SyncManager {
    /// Create a manager for `config.watch_dir` without a change sink.
    #[must_use]
    pub fn new(config: SyncConfig) -> Self {
        Self::build(config, None)
    }

    /// Create a manager that publishes local changes to `sink`.
    #[must_use]
    pub fn with_sink(config: SyncConfig, sink: Arc<dyn ChangeSink>) -> Self {
        Self::build(config, Some(sink))
    }

    fn build(config: SyncConfig, sink: Option<Arc<dyn ChangeSink>>) -> Self {
        let store = JsonlStore::new(&config.watch_dir, &config.issues_file, &config.extension);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                config,
                store,
                sink,
                ledger: Mutex::new(Ledger {
                    log: ChangeLog::new(),
                    resolved: Vec::new(),
                    last_sync: None,
                    is_syncing: false,
                    status: WatchStatus::Idle,
                }),
                baseline: Mutex::new(IssueStore::new()),
                io: tokio::sync::Mutex::new(()),
                in_flight: Mutex::new(None),
                running: tokio::sync::Mutex::new(None),
                events,
            }),
        }
    }

    /// Settings this manager runs with.
    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    /// The repository over the tracked directory.
    #[must_use]
    pub fn store(&self) -> &JsonlStore {
        &self.inner.store
    }

    /// Subscribe to events emitted from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    /// Current watcher lifecycle state.
    #[must_use]
    pub fn status(&self) -> WatchStatus {
        lock(&self.inner.ledger).status
    }

    /// Deep-copied snapshot of the state.
    #[must_use]
    pub fn state(&self) -> SyncState {
        let ledger = lock(&self.inner.ledger);
        SyncState {
            last_sync: ledger.last_sync,
            pending_local: ledger.log.pending_local().to_vec(),
            pending_remote: ledger.log.pending_remote().to_vec(),
            conflicts: ledger.log.conflicts().to_vec(),
            resolved: ledger.resolved.clone(),
            is_syncing: ledger.is_syncing,
            is_watching: ledger.status == WatchStatus::Watching,
        }
    }

    fn emit(&self, event: SyncEvent) {
        debug!(event = event.name(), "Emitting sync event");
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }

    /// Attach the directory watch and start the scheduler loop.
    ///
    /// Loads the tracked directory as the baseline that later rescans diff
    /// against. Calling `start` while already watching does nothing.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if the directory does not exist and
    /// `Error::Watch` if the OS watch cannot be attached; both also emit
    /// `watcher:error`.
    pub async fn start(&self) -> Result<()> {
        let mut running = self.inner.running.lock().await;
        if running.is_some() {
            debug!("Already watching");
            return Ok(());
        }

        let dir = self.inner.config.watch_dir.clone();
        let is_dir = tokio::fs::metadata(&dir)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !is_dir {
            let message = format!("directory not found: {}", dir.display());
            warn!(%message, "Cannot start watcher");
            self.emit(SyncEvent::WatcherError {
                message: message.clone(),
            });
            return Err(Error::Configuration(message));
        }

        {
            let _io = self.inner.io.lock().await;
            let (baseline, warnings) = self.inner.store.load_all().await?;
            for warning in &warnings {
                warn!(%warning, "Skipped data while loading baseline");
            }
            *lock(&self.inner.baseline) = baseline;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let watcher = match DirectoryWatcher::attach(&dir, &self.inner.config.extension, tx) {
            Ok(watcher) => watcher,
            Err(e) => {
                self.emit(SyncEvent::WatcherError {
                    message: e.to_string(),
                });
                return Err(e);
            }
        };

        let (stop, stop_rx) = oneshot::channel();
        let host = Arc::new(ManagerHost {
            inner: Arc::downgrade(&self.inner),
        });
        let schedule = SchedulerConfig {
            debounce: self.inner.config.debounce(),
            auto_sync: self.inner.config.auto_sync_interval(),
        };
        let task = tokio::spawn(run_scheduler(host, schedule, rx, stop_rx));
        *running = Some(Running {
            watcher,
            stop,
            task,
        });
        lock(&self.inner.ledger).status = WatchStatus::Watching;

        info!(
            dir = %dir.display(),
            auto_sync = schedule.auto_sync.is_some(),
            "Watching for changes"
        );
        self.emit(SyncEvent::WatcherStarted { dir });
        Ok(())
    }

    /// Detach the watch and stop the scheduler loop. Does nothing when not
    /// watching.
    pub async fn stop(&self) {
        let mut running = self.inner.running.lock().await;
        let Some(run) = running.take() else {
            return;
        };

        drop(run.watcher);
        let _ = run.stop.send(());
        if let Err(e) = run.task.await {
            warn!(error = %e, "Scheduler task ended abnormally");
        }
        lock(&self.inner.ledger).status = WatchStatus::Stopped;

        info!("Stopped watching");
        self.emit(SyncEvent::WatcherStopped);
    }

    /// Record a change observed in the tracked directory.
    ///
    /// Returns the conflict if this change created one that now waits for
    /// manual resolution.
    pub fn record_local_change(&self, change: ChangeRecord) -> Option<ConflictRecord> {
        self.record(change, ChangeSource::Local)
    }

    /// Record a change received from the remote side.
    ///
    /// Returns the conflict if this change created one that now waits for
    /// manual resolution.
    pub fn record_remote_change(&self, change: ChangeRecord) -> Option<ConflictRecord> {
        self.record(change, ChangeSource::Remote)
    }

    fn record(&self, mut change: ChangeRecord, source: ChangeSource) -> Option<ConflictRecord> {
        change.source = source;
        let mut ledger = lock(&self.inner.ledger);

        debug!(
            issue_id = %change.issue_id,
            change_type = %change.change_type,
            %source,
            "Recording change"
        );
        self.emit(match source {
            ChangeSource::Local => SyncEvent::ChangeLocal(change.clone()),
            ChangeSource::Remote => SyncEvent::ChangeRemote(change.clone()),
        });

        let conflict = ledger.log.record(change)?;
        self.on_conflict(&mut ledger, conflict)
    }

    /// Put a change back after a failed pass.
    fn requeue(&self, change: ChangeRecord) {
        let mut ledger = lock(&self.inner.ledger);
        if let Some(conflict) = ledger.log.record(change) {
            self.on_conflict(&mut ledger, conflict);
        }
    }

    fn on_conflict(&self, ledger: &mut Ledger, conflict: ConflictRecord) -> Option<ConflictRecord> {
        let strategy = self.inner.config.conflict_strategy;
        if strategy != ConflictStrategy::Manual {
            match resolve(&conflict, strategy, None) {
                Ok(resolution) => {
                    info!(
                        issue_id = %conflict.issue_id,
                        %strategy,
                        winner = ?resolution.winner,
                        "Conflict resolved automatically"
                    );
                    ledger.log.settle(&conflict.issue_id);
                    ledger.resolved.push(resolution);
                    return None;
                }
                Err(e) => {
                    warn!(issue_id = %conflict.issue_id, error = %e, "Automatic resolution failed");
                }
            }
        }

        info!(issue_id = %conflict.issue_id, "Conflict detected");
        self.emit(SyncEvent::SyncConflict(conflict.clone()));
        Some(conflict)
    }

    /// Resolve the pending conflict for `issue_id`.
    ///
    /// Clears the conflict and both sides' pending records; the resolved
    /// state is written and published by the next sync pass. Returns
    /// `Ok(None)` if the issue has no pending conflict.
    ///
    /// # Errors
    ///
    /// Returns `Error::Conflict` for `manual` without `manual_state`; the
    /// conflict then stays pending.
    pub fn resolve_conflict(
        &self,
        issue_id: &IssueId,
        strategy: ConflictStrategy,
        manual_state: Option<Issue>,
    ) -> Result<Option<Resolution>> {
        let mut ledger = lock(&self.inner.ledger);
        let Some(conflict) = ledger.log.conflict(issue_id).cloned() else {
            debug!(%issue_id, "No pending conflict to resolve");
            return Ok(None);
        };

        let resolution = resolve(&conflict, strategy, manual_state)?;
        ledger.log.settle(issue_id);
        ledger.resolved.push(resolution.clone());
        info!(%issue_id, %strategy, winner = ?resolution.winner, "Conflict resolved");
        Ok(Some(resolution))
    }

    /// Run a sync pass, or join the one already running.
    pub async fn sync(&self) -> SyncReport {
        let pass = {
            let mut slot = lock(&self.inner.in_flight);
            if let Some(pass) = slot.as_ref() {
                debug!("Joining in-flight sync pass");
                pass.clone()
            } else {
                let pass = self.spawn_pass();
                *slot = Some(pass.clone());
                pass
            }
        };
        pass.await
    }

    fn spawn_pass(&self) -> SyncPass {
        let manager = self.clone();
        let handle = tokio::spawn(async move {
            let report = manager.run_pass().await;
            *lock(&manager.inner.in_flight) = None;
            report
        });

        async move {
            handle.await.unwrap_or_else(|e| {
                let mut report = SyncReport::new(Utc::now());
                report
                    .errors
                    .push(ItemSyncError::new("sync", ItemSyncErrorKind::Store, e.to_string()));
                report
            })
        }
        .boxed()
        .shared()
    }

    async fn run_pass(&self) -> SyncReport {
        let mut report = SyncReport::new(Utc::now());
        let (remote, local, resolutions) = {
            let mut ledger = lock(&self.inner.ledger);
            ledger.is_syncing = true;
            (
                ledger.log.drain_unconflicted(ChangeSource::Remote),
                ledger.log.drain_unconflicted(ChangeSource::Local),
                std::mem::take(&mut ledger.resolved),
            )
        };
        self.emit(SyncEvent::SyncStarted);
        info!(
            remote = remote.len(),
            local = local.len(),
            resolutions = resolutions.len(),
            "Sync started"
        );

        for change in remote {
            match self.apply_remote_change(&change).await {
                Ok(()) => report.applied_remote += 1,
                Err(e) => {
                    warn!(issue_id = %change.issue_id, error = %e, "Failed to apply remote change");
                    report
                        .errors
                        .push(ItemSyncError::from_error(change.issue_id.as_str(), &e));
                    self.requeue(change);
                }
            }
        }

        for change in local {
            match self.publish(&change).await {
                Ok(()) => report.published_local += 1,
                Err(e) => {
                    warn!(issue_id = %change.issue_id, error = %e, "Failed to publish local change");
                    report
                        .errors
                        .push(ItemSyncError::from_error(change.issue_id.as_str(), &e));
                    self.requeue(change);
                }
            }
        }

        for resolution in resolutions {
            match self.apply_resolution(&resolution).await {
                Ok(()) => report.resolved += 1,
                Err(e) => {
                    warn!(issue_id = %resolution.issue_id, error = %e, "Failed to apply resolution");
                    report
                        .errors
                        .push(ItemSyncError::from_error(resolution.issue_id.as_str(), &e));
                    lock(&self.inner.ledger).resolved.push(resolution);
                }
            }
        }

        report.finished_at = Utc::now();
        {
            let mut ledger = lock(&self.inner.ledger);
            ledger.is_syncing = false;
            ledger.last_sync = Some(report.finished_at);
            report.pending_conflicts = ledger.log.conflicts().len();
        }

        if report.is_success() {
            info!(
                applied = report.applied_remote,
                published = report.published_local,
                resolved = report.resolved,
                "Sync completed"
            );
            self.emit(SyncEvent::SyncCompleted(report.clone()));
        } else {
            warn!(errors = report.errors.len(), "Sync completed with errors");
            self.emit(SyncEvent::SyncError(report.clone()));
        }
        report
    }

    async fn publish(&self, change: &ChangeRecord) -> Result<()> {
        let Some(sink) = &self.inner.sink else {
            return Ok(());
        };

        let mut attempt = 0;
        loop {
            match sink.publish(change).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_transient() && attempt < self.inner.config.max_retries => {
                    attempt += 1;
                    warn!(issue_id = %change.issue_id, attempt, error = %e, "Publish failed, retrying");
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn apply_resolution(&self, resolution: &Resolution) -> Result<()> {
        if resolution.winner != Winner::Local {
            self.write_local(&resolution.issue_id, resolution.state.clone())
                .await?;
        }
        if resolution.winner != Winner::Remote {
            let change = match &resolution.state {
                Some(issue) => ChangeRecord::new(
                    resolution.issue_id.clone(),
                    ChangeType::Update,
                    ChangeSource::Local,
                )
                .with_new(issue.clone()),
                None => ChangeRecord::new(
                    resolution.issue_id.clone(),
                    ChangeType::Delete,
                    ChangeSource::Local,
                ),
            };
            self.publish(&change).await?;
        }
        Ok(())
    }

    /// Write a state into the tracked directory and the baseline.
    async fn write_local(&self, id: &IssueId, state: Option<Issue>) -> Result<()> {
        let _io = self.inner.io.lock().await;
        match state {
            Some(issue) => {
                self.inner.store.upsert(issue.clone()).await?;
                lock(&self.inner.baseline).insert(issue);
            }
            None => {
                self.inner.store.remove(id).await?;
                lock(&self.inner.baseline).remove(id);
            }
        }
        Ok(())
    }

    /// Persist a remote change into the primary store file.
    ///
    /// The baseline is updated too, so the watcher does not report the
    /// write back as a local change.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound("file not found: …")` if the store file does
    /// not exist and `Error::InvalidChange` for a create or update without a
    /// new state.
    pub async fn apply_remote_change(&self, change: &ChangeRecord) -> Result<()> {
        let state = match change.change_type {
            ChangeType::Create | ChangeType::Update => {
                let issue = change.new_state.clone().ok_or_else(|| {
                    Error::InvalidChange(format!(
                        "{} of {} carries no new state",
                        change.change_type, change.issue_id
                    ))
                })?;
                Some(issue)
            }
            ChangeType::Delete => None,
        };

        self.write_local(&change.issue_id, state).await?;
        debug!(issue_id = %change.issue_id, change_type = %change.change_type, "Merged remote change");
        self.emit(SyncEvent::ChangeMerged(change.clone()));
        Ok(())
    }

    /// Re-read the tracked directory and record every difference from the
    /// baseline as a local change. Returns the number of changes.
    ///
    /// # Errors
    ///
    /// Returns I/O errors from listing or reading the directory.
    pub async fn rescan(&self) -> Result<usize> {
        let changes = {
            let _io = self.inner.io.lock().await;
            let (current, warnings) = self.inner.store.load_all().await?;
            for warning in &warnings {
                warn!(%warning, "Skipped data while rescanning");
            }

            let mut baseline = lock(&self.inner.baseline);
            let changes = diff(&baseline, &current);
            *baseline = current;
            changes
        };

        debug!(changes = changes.len(), "Rescan complete");
        let count = changes.len();
        for change in changes {
            self.record_local_change(change);
        }
        Ok(count)
    }
}

fn diff(baseline: &IssueStore, current: &IssueStore) -> Vec<ChangeRecord> {
    let mut changes = Vec::new();
    for issue in current.list() {
        match baseline.get(&issue.id) {
            None => changes.push(ChangeRecord::upsert(issue.clone(), None, ChangeSource::Local)),
            Some(previous) if previous != issue => changes.push(ChangeRecord::upsert(
                issue.clone(),
                Some(previous.clone()),
                ChangeSource::Local,
            )),
            Some(_) => {}
        }
    }
    for previous in baseline.list() {
        if !current.contains(&previous.id) {
            changes.push(ChangeRecord::delete(previous.clone(), ChangeSource::Local));
        }
    }
    changes
}

/// Scheduler callbacks. Holds a weak reference so a forgotten manager
/// does not keep its loop alive.
struct ManagerHost {
    inner: Weak<Inner>,
}

impl ManagerHost {
    fn manager(&self) -> Option<SyncManager> {
        self.inner.upgrade().map(|inner| SyncManager { inner })
    }
}

#[async_trait]
impl SchedulerHost for ManagerHost {
    async fn rescan(&self) {
        let Some(manager) = self.manager() else {
            return;
        };
        if let Err(e) = manager.rescan().await {
            warn!(error = %e, "Rescan failed");
        }
    }

    fn request_sync(&self) {
        if let Some(manager) = self.manager() {
            tokio::spawn(async move {
                manager.sync().await;
            });
        }
    }

    fn watch_failed(&self, message: String) {
        if let Some(manager) = self.manager() {
            manager.emit(SyncEvent::WatcherError { message });
        }
    }
}
