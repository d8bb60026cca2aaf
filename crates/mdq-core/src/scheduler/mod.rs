//! Download task scheduler.
//!
//! Owns the priority queue and the active slots. Public calls mutate state under
//! one mutex and return without waiting on I/O; admitted transfers run on the
//! blocking pool and report back through the progress and outcome paths, which
//! re-acquire the lock only to apply their update.
//!
//! Flow: submit → queue → admission (slot free and gate open) → executor →
//! progress updates → outcome (complete / retry with backoff / fail) → admission.

mod admission;
mod outcome;
mod recovery;
mod state;


use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Context;
use tokio::sync::{watch, Notify};

use crate::config::{DownloadConfig, DownloadConfigPatch};
use crate::destination;
use crate::error::SchedulerError;
use crate::events::{EventKind, EventPublisher};
use crate::gate::{ConditionGate, ConditionProbe};
use crate::model::{
    DownloadRequest, DownloadStatistics, DownloadTask, TaskFilter, TaskStatus,
};
use crate::stats;
use crate::store::KvStore;
use crate::task_store::{self, Persister};
use crate::transfer::TransferExecutor;

use state::{unix_now, State};

/// Handle to one scheduler instance. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<State>,
    executor: Arc<dyn TransferExecutor>,
    gate: ConditionGate,
    events: EventPublisher,
    persister: Persister,
    idle: Notify,
    shutdown_tx: watch::Sender<bool>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Persist and announce a transition. Called with the lock held so records
    /// reach the store in mutation order.
    fn transition(&self, kind: EventKind, task: &DownloadTask) {
        self.persister.save_task(task);
        self.events.task(kind, task);
    }

    fn statistics(&self) -> DownloadStatistics {
        let cfg = self.lock().config.clone();
        let free = self.gate.free_storage_bytes(&cfg);
        let st = self.lock();
        stats::snapshot(st.tasks.iter(), free)
    }

    /// Emit a statistics event and wake `wait_idle` callers. Call after every mutation.
    fn publish_statistics(&self) {
        self.events.statistics(self.statistics());
        self.idle.notify_waiters();
    }
}

impl Scheduler {
    /// Build a scheduler over `store`, restoring persisted tasks and config.
    ///
    /// A config record in the store wins over `file_config`, so changes made
    /// with `update_config` survive restarts. The scheduler does not admit
    /// anything until `start` is called.
    pub async fn load(
        store: Arc<dyn KvStore>,
        executor: Arc<dyn TransferExecutor>,
        probe: Arc<dyn ConditionProbe>,
        events: EventPublisher,
        file_config: DownloadConfig,
    ) -> anyhow::Result<Self> {
        let config = match task_store::load_config(store.as_ref()).await {
            Ok(Some(stored)) if stored.validate().is_ok() => stored,
            Ok(Some(_)) => {
                tracing::warn!("persisted config is invalid; using config file");
                file_config
            }
            Ok(None) => file_config,
            Err(e) => {
                tracing::warn!("persisted config unreadable, using config file: {:#}", e);
                file_config
            }
        };
        config.validate().context("scheduler config")?;

        let tasks = task_store::load_tasks(store.as_ref())
            .await
            .context("load persisted tasks")?;
        let persister = Persister::spawn(store);

        let mut state = State::new(config);
        for task in recovery::rebuild(&mut state, tasks) {
            persister.save_task(&task);
        }
        persister.save_config(&state.config);

        let (shutdown_tx, _) = watch::channel(false);
        Ok(Self {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                executor,
                gate: ConditionGate::new(probe),
                events,
                persister,
                idle: Notify::new(),
                shutdown_tx,
            }),
        })
    }

    /// Begin admitting work on the current Tokio runtime. Idempotent.
    pub fn start(&self) -> anyhow::Result<()> {
        let handle = tokio::runtime::Handle::try_current()
            .context("scheduler must be started inside a Tokio runtime")?;
        {
            let mut st = self.inner.lock();
            if st.runtime.is_some() {
                return Ok(());
            }
            st.runtime = Some(handle.clone());
            tracing::info!(
                tasks = st.tasks.len(),
                queued = st.queue.len(),
                slots = st.config.max_concurrent_downloads,
                "scheduler started"
            );
        }
        self.inner.spawn_condition_ticker(&handle);
        self.inner.admit();
        self.inner.publish_statistics();
        Ok(())
    }

    /// Create a task for `request` and queue it.
    pub fn submit(&self, request: DownloadRequest) -> Result<DownloadTask, SchedulerError> {
        let url = destination::parse_media_url(&request.url)?;
        let expected_sha256 = match request.expected_sha256 {
            Some(h) => Some(normalize_sha256(&h)?),
            None => None,
        };

        let task = {
            let mut st = self.inner.lock();
            if st.shutting_down {
                return Err(SchedulerError::InvalidRequest(
                    "scheduler is shutting down".to_string(),
                ));
            }
            let file_path = destination::resolve(
                &st.config.download_directory,
                request.file_path.as_deref(),
                &url,
                &request.source_id,
            )?;
            if let Some(owner) = st.path_owner(&file_path, None) {
                return Err(SchedulerError::FilePathInUse {
                    path: file_path,
                    owner,
                });
            }

            let mut task = DownloadTask {
                id: uuid::Uuid::new_v4().to_string(),
                source_id: request.source_id,
                url: url.to_string(),
                file_path,
                quality: request.quality,
                file_size: request.file_size.unwrap_or(0),
                downloaded_bytes: 0,
                speed_bps: 0,
                estimated_seconds_remaining: None,
                status: TaskStatus::Queued,
                phase: None,
                priority: request.priority,
                progress_percent: 0.0,
                created_at: unix_now(),
                started_at: None,
                ended_at: None,
                last_error: None,
                retry_count: 0,
                metadata: request.metadata,
                expected_sha256,
                submit_seq: st.take_seq(),
            };
            task.refresh_progress();
            st.queue.insert(&task.id, task.priority);
            st.tasks.create(task.clone());
            self.inner.transition(EventKind::Submitted, &task);
            task
        };

        tracing::debug!(
            task = %task.id,
            priority = task.priority.as_str(),
            path = %task.file_path.display(),
            "queued"
        );
        self.inner.admit();
        self.inner.publish_statistics();
        Ok(task)
    }

    /// Stop a queued or active task, keeping its bytes for a later resume.
    /// Pausing a paused task does nothing.
    pub fn pause(&self, id: &str) -> Result<DownloadTask, SchedulerError> {
        let (task, released) = {
            let mut st = self.inner.lock();
            let released = match st.status_of(id)? {
                TaskStatus::Paused => return st.snapshot(id),
                TaskStatus::Queued => {
                    st.unqueue(id);
                    false
                }
                TaskStatus::Active => st.release_slot(id),
                status => return Err(SchedulerError::invalid_transition(id, status, "pause")),
            };
            let task = st
                .tasks
                .update(id, |t| {
                    t.status = TaskStatus::Paused;
                    t.phase = None;
                    t.clear_rate();
                    t.refresh_progress();
                    t.clone()
                })
                .ok_or_else(|| SchedulerError::UnknownTask(id.to_string()))?;
            self.inner.transition(EventKind::Paused, &task);
            (task, released)
        };
        if released {
            self.inner.admit();
        }
        self.inner.publish_statistics();
        Ok(task)
    }

    /// Re-queue a paused task, or restart a failed one with a fresh retry budget.
    /// Queued and active tasks are left as they are.
    pub fn resume(&self, id: &str) -> Result<DownloadTask, SchedulerError> {
        let task = {
            let mut st = self.inner.lock();
            match st.status_of(id)? {
                TaskStatus::Queued | TaskStatus::Active => return st.snapshot(id),
                TaskStatus::Paused => {}
                TaskStatus::Failed => {
                    let path = st.snapshot(id)?.file_path;
                    if let Some(owner) = st.path_owner(&path, Some(id)) {
                        return Err(SchedulerError::FilePathInUse { path, owner });
                    }
                }
                status => return Err(SchedulerError::invalid_transition(id, status, "resume")),
            }
            let task = st
                .tasks
                .update(id, |t| {
                    if t.status == TaskStatus::Failed {
                        t.retry_count = 0;
                        t.last_error = None;
                    }
                    t.status = TaskStatus::Queued;
                    t.ended_at = None;
                    t.refresh_progress();
                    t.clone()
                })
                .ok_or_else(|| SchedulerError::UnknownTask(id.to_string()))?;
            st.queue.insert(id, task.priority);
            self.inner.transition(EventKind::Resumed, &task);
            task
        };
        self.inner.admit();
        self.inner.publish_statistics();
        Ok(task)
    }

    /// Cancel a non-terminal task. Cancelling a task that already ended is a no-op.
    pub fn cancel(&self, id: &str, delete_file: bool) -> Result<DownloadTask, SchedulerError> {
        let (task, released) = {
            let mut st = self.inner.lock();
            let status = st.status_of(id)?;
            if status.is_terminal() {
                return st.snapshot(id);
            }
            st.unqueue(id);
            let released = st.release_slot(id);
            let task = st
                .tasks
                .update(id, |t| {
                    t.status = TaskStatus::Cancelled;
                    t.phase = None;
                    t.clear_rate();
                    t.ended_at = Some(unix_now());
                    if delete_file {
                        t.downloaded_bytes = 0;
                    }
                    t.refresh_progress();
                    t.clone()
                })
                .ok_or_else(|| SchedulerError::UnknownTask(id.to_string()))?;
            self.inner.transition(EventKind::Cancelled, &task);
            (task, released)
        };
        if delete_file {
            remove_download_file(&task.file_path);
        }
        if released {
            self.inner.admit();
        }
        self.inner.publish_statistics();
        Ok(task)
    }

    /// Forget a task entirely, stopping it first if needed.
    pub fn delete(&self, id: &str, delete_file: bool) -> Result<DownloadTask, SchedulerError> {
        let (task, released) = {
            let mut st = self.inner.lock();
            st.status_of(id)?;
            st.unqueue(id);
            let released = st.release_slot(id);
            let task = st
                .tasks
                .remove(id)
                .ok_or_else(|| SchedulerError::UnknownTask(id.to_string()))?;
            self.inner.persister.remove_task(&task.id);
            self.inner.events.task(EventKind::Deleted, &task);
            (task, released)
        };
        if delete_file {
            remove_download_file(&task.file_path);
        }
        if released {
            self.inner.admit();
        }
        self.inner.publish_statistics();
        Ok(task)
    }

    /// Tasks matching `filter`, in submission order.
    pub fn list(&self, filter: &TaskFilter) -> Vec<DownloadTask> {
        self.inner.lock().tasks.list(filter)
    }

    pub fn get(&self, id: &str) -> Result<DownloadTask, SchedulerError> {
        self.inner.lock().snapshot(id)
    }

    pub fn statistics(&self) -> DownloadStatistics {
        self.inner.statistics()
    }

    pub fn config(&self) -> DownloadConfig {
        self.inner.lock().config.clone()
    }

    /// Validate and apply a partial config update. Raising the slot count admits
    /// more work at once; lowering it never preempts running transfers.
    pub fn update_config(
        &self,
        patch: &DownloadConfigPatch,
    ) -> Result<DownloadConfig, SchedulerError> {
        let cfg = {
            let mut st = self.inner.lock();
            let merged = st.config.merged(patch);
            merged.validate()?;
            st.config = merged.clone();
            self.inner.persister.save_config(&merged);
            merged
        };
        tracing::info!(
            slots = cfg.max_concurrent_downloads,
            retries = cfg.max_retry_count,
            wifi_only = cfg.wifi_only,
            speed_limit = ?cfg.speed_limit_bps,
            "config updated"
        );
        self.inner.admit();
        self.inner.publish_statistics();
        Ok(cfg)
    }

    /// Re-run admission now; call when network or storage conditions change.
    pub fn notify_conditions_changed(&self) {
        self.inner.admit();
    }

    /// Resolve once nothing is running, waiting on a backoff, or admissible.
    /// Never resolves while queued work is blocked by the condition gate.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.inner.lock().is_idle() {
                return;
            }
            notified.await;
        }
    }

    /// Wait until every mutation so far is in the store.
    pub async fn flush(&self) {
        self.inner.persister.flush().await;
    }

    /// Stop admitting, abort running transfers and flush. Active tasks stay
    /// Active in the store and are recovered on the next `load`.
    pub async fn shutdown(&self) {
        {
            let mut st = self.inner.lock();
            st.shutting_down = true;
            st.pending_retries.clear();
            for (id, run) in st.active.iter() {
                run.abort.abort();
                if let Some(task) = st.tasks.get(id) {
                    self.inner.persister.save_task(task);
                }
            }
            tracing::info!(aborted = st.active.len(), "scheduler shutting down");
        }
        let _ = self.inner.shutdown_tx.send(true);
        self.flush().await;
    }
}

/// Lowercase hex digest, or InvalidRequest if it is not 64 hex digits.
fn normalize_sha256(raw: &str) -> Result<String, SchedulerError> {
    let h = raw.trim().to_ascii_lowercase();
    if h.len() == 64 && h.bytes().all(|b| b.is_ascii_hexdigit()) {
        Ok(h)
    } else {
        Err(SchedulerError::InvalidRequest(format!(
            "expected_sha256 is not a SHA-256 hex digest: {:?}",
            raw
        )))
    }
}

pub(crate) fn remove_download_file(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "removed download file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), "remove download file: {}", e),
    }
}
