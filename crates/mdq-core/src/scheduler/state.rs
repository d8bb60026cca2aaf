//! Mutable scheduler state. Everything here is guarded by the one scheduler mutex.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::runtime::Handle;

use crate::config::DownloadConfig;
use crate::error::SchedulerError;
use crate::model::{DownloadTask, TaskId, TaskPhase, TaskStatus};
use crate::queue::PriorityQueue;
use crate::task_store::TaskStore;
use crate::transfer::AbortToken;

/// An admitted transfer occupying a slot.
pub(super) struct ActiveRun {
    pub run_id: u64,
    pub abort: AbortToken,
}

/// An aborted transfer whose executor may still be writing `file_path`.
pub(super) struct DrainingRun {
    pub run_id: u64,
    pub file_path: PathBuf,
}

pub(super) struct State {
    pub tasks: TaskStore,
    pub queue: PriorityQueue,
    pub active: HashMap<TaskId, ActiveRun>,
    /// Runs aborted by pause/cancel/delete whose executor has not returned yet.
    /// A task with a draining run is not admitted again until it returns, and
    /// its path cannot be claimed by another task meanwhile.
    pub draining: HashMap<TaskId, DrainingRun>,
    /// Queued tasks waiting out a retry backoff (not in `queue` yet), keyed to
    /// the run whose failure armed the timer. Only that timer may re-queue.
    pub pending_retries: HashMap<TaskId, u64>,
    pub config: DownloadConfig,
    /// Set by `start`; admission is disabled until then.
    pub runtime: Option<Handle>,
    pub shutting_down: bool,
    next_seq: u64,
    next_run_id: u64,
}

impl State {
    pub fn new(config: DownloadConfig) -> Self {
        Self {
            tasks: TaskStore::new(),
            queue: PriorityQueue::new(),
            active: HashMap::new(),
            draining: HashMap::new(),
            pending_retries: HashMap::new(),
            config,
            runtime: None,
            shutting_down: false,
            next_seq: 1,
            next_run_id: 1,
        }
    }

    pub fn take_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    pub fn continue_seq_after(&mut self, last: u64) {
        self.next_seq = self.next_seq.max(last + 1);
    }

    pub fn status_of(&self, id: &str) -> Result<TaskStatus, SchedulerError> {
        self.tasks
            .get(id)
            .map(|t| t.status)
            .ok_or_else(|| SchedulerError::UnknownTask(id.to_string()))
    }

    pub fn snapshot(&self, id: &str) -> Result<DownloadTask, SchedulerError> {
        self.tasks
            .get(id)
            .cloned()
            .ok_or_else(|| SchedulerError::UnknownTask(id.to_string()))
    }

    pub fn is_current_run(&self, id: &str, run_id: u64) -> bool {
        self.active.get(id).is_some_and(|r| r.run_id == run_id)
    }

    /// Mark `id` active in a fresh slot. Returns the task snapshot, run id and abort token.
    pub fn begin_run(&mut self, id: &str) -> Option<(DownloadTask, u64, AbortToken)> {
        let run_id = self.next_run_id;
        let task = self.tasks.update(id, |t| {
            t.status = TaskStatus::Active;
            t.phase = Some(TaskPhase::Transferring);
            t.ended_at = None;
            t.started_at.get_or_insert_with(unix_now);
            t.clone()
        })?;
        self.next_run_id += 1;
        let abort = AbortToken::new();
        self.active.insert(
            id.to_string(),
            ActiveRun {
                run_id,
                abort: abort.clone(),
            },
        );
        Some((task, run_id, abort))
    }

    /// Free the slot held by `id`, signalling its transfer to stop. Returns true if a slot was held.
    /// Call before the task is removed from `tasks`, so the draining entry keeps its path.
    pub fn release_slot(&mut self, id: &str) -> bool {
        match self.active.remove(id) {
            Some(run) => {
                run.abort.abort();
                let file_path = self
                    .tasks
                    .get(id)
                    .map(|t| t.file_path.clone())
                    .unwrap_or_default();
                self.draining.insert(
                    id.to_string(),
                    DrainingRun {
                        run_id: run.run_id,
                        file_path,
                    },
                );
                true
            }
            None => false,
        }
    }

    /// Id of whatever may write `path`: a non-terminal task other than `except`,
    /// or any aborted run that has not returned yet.
    pub fn path_owner(&self, path: &Path, except: Option<&str>) -> Option<TaskId> {
        if let Some(owner) = self.tasks.file_path_owner(path, except) {
            return Some(owner.clone());
        }
        self.draining
            .iter()
            .find(|(_, run)| run.file_path == path)
            .map(|(id, _)| id.clone())
    }

    /// Drop `id` from the queue and the retry backlog.
    pub fn unqueue(&mut self, id: &str) {
        self.queue.remove(id);
        self.pending_retries.remove(id);
    }

    /// Nothing running, nothing waiting on a timer, and nothing admissible queued.
    pub fn is_idle(&self) -> bool {
        self.active.is_empty()
            && self.draining.is_empty()
            && self.pending_retries.is_empty()
            && (self.queue.is_empty() || self.runtime.is_none())
    }
}

pub(super) fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
