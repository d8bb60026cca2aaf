//! Admission loop, transfer launch and the progress path.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinError;

use crate::events::EventKind;
use crate::model::{TaskId, TaskPhase};
use crate::retry::{ErrorKind, TransferError};
use crate::transfer::{verify_sha256, AbortToken, ProgressReporter, ProgressUpdate, TransferRequest};

use super::state::State;
use super::Inner;

/// Re-read interval for the recheck period while periodic rechecks are off.
const RECHECK_IDLE_POLL: Duration = Duration::from_secs(60);

struct Launch {
    request: TransferRequest,
    run_id: u64,
    abort: AbortToken,
    expected_sha256: Option<String>,
}

impl Inner {
    /// Fill free slots from the queue while the condition gate allows.
    ///
    /// A gate refusal leaves every queued task where it is; the next
    /// notification or periodic recheck runs this again.
    pub(super) fn admit(self: &Arc<Self>) {
        let cfg = {
            let st = self.lock();
            if st.runtime.is_none() || st.shutting_down || st.queue.is_empty() {
                return;
            }
            if st.active.len() >= st.config.max_concurrent_downloads {
                return;
            }
            st.config.clone()
        };
        let decision = self.gate.evaluate(&cfg);
        if !decision.is_allowed() {
            tracing::debug!(%decision, "admission deferred");
            return;
        }

        let (handle, launches) = {
            let mut guard = self.lock();
            let Some(handle) = guard.runtime.clone() else {
                return;
            };
            let st: &mut State = &mut guard;
            let speed_limit = st.config.per_transfer_speed_limit();
            let mut launches = Vec::new();
            while st.active.len() < st.config.max_concurrent_downloads {
                let draining = &st.draining;
                let Some(id) = st.queue.pop_first_where(|id| !draining.contains_key(id)) else {
                    break;
                };
                let Some((task, run_id, abort)) = st.begin_run(&id) else {
                    tracing::warn!(task = %id, "queued id has no task; dropped");
                    continue;
                };
                self.transition(EventKind::Started, &task);
                tracing::debug!(
                    task = %task.id,
                    run_id,
                    resume_from = task.downloaded_bytes,
                    active = st.active.len(),
                    "admitted"
                );
                launches.push(Launch {
                    request: TransferRequest {
                        task_id: task.id.clone(),
                        url: task.url.clone(),
                        file_path: task.file_path.clone(),
                        resume_from: task.downloaded_bytes,
                        expected_size: task.file_size,
                        speed_limit_bps: speed_limit,
                    },
                    run_id,
                    abort,
                    expected_sha256: task.expected_sha256.clone(),
                });
            }
            (handle, launches)
        };

        if launches.is_empty() {
            return;
        }
        for launch in launches {
            handle.spawn(run_transfer(Arc::clone(self), launch));
        }
        self.publish_statistics();
    }

    /// Apply one progress update from run `run_id`. Updates from a run that no
    /// longer owns the slot are dropped. Bytes never move backwards while active.
    fn apply_progress(&self, id: &str, run_id: u64, update: ProgressUpdate) {
        let mut guard = self.lock();
        let st: &mut State = &mut guard;
        if !st.is_current_run(id, run_id) {
            return;
        }
        let Some(task) = st.tasks.get_mut(id) else {
            return;
        };
        if let Some(total) = update.total_bytes {
            task.file_size = total;
        }
        if update.downloaded_bytes > task.downloaded_bytes {
            task.downloaded_bytes = update.downloaded_bytes;
        }
        if task.file_size > 0 && task.downloaded_bytes > task.file_size {
            task.file_size = task.downloaded_bytes;
        }
        task.speed_bps = update.speed_bps;
        task.refresh_progress();
        task.refresh_eta();
        self.events.task(EventKind::Progress, task);
    }

    /// Switch a finished transfer into the verifying phase. False if the run is stale.
    fn enter_verifying(&self, id: &str, run_id: u64, bytes: u64) -> bool {
        let mut guard = self.lock();
        let st: &mut State = &mut guard;
        if !st.is_current_run(id, run_id) {
            return false;
        }
        let Some(task) = st.tasks.get_mut(id) else {
            return false;
        };
        task.phase = Some(TaskPhase::Verifying);
        task.downloaded_bytes = task.downloaded_bytes.max(bytes);
        task.clear_rate();
        task.refresh_progress();
        self.events.task(EventKind::Progress, task);
        true
    }

    /// Periodic fallback for condition changes nobody reported.
    pub(super) fn spawn_condition_ticker(self: &Arc<Self>, handle: &Handle) {
        let weak = Arc::downgrade(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        handle.spawn(async move {
            loop {
                let secs = match weak.upgrade() {
                    Some(inner) => inner.lock().config.condition_recheck_secs,
                    None => return,
                };
                let period = if secs == 0 {
                    RECHECK_IDLE_POLL
                } else {
                    Duration::from_secs(secs)
                };
                tokio::select! {
                    _ = tokio::time::sleep(period) => {}
                    _ = shutdown_rx.changed() => return,
                }
                if secs == 0 {
                    continue;
                }
                match weak.upgrade() {
                    Some(inner) => inner.admit(),
                    None => return,
                }
            }
        });
    }
}

async fn run_transfer(inner: Arc<Inner>, launch: Launch) {
    let Launch {
        request,
        run_id,
        abort,
        expected_sha256,
    } = launch;
    let id: TaskId = request.task_id.clone();
    let path: PathBuf = request.file_path.clone();

    let executor = Arc::clone(&inner.executor);
    let progress_inner = Arc::clone(&inner);
    let progress_id = id.clone();
    let transfer_abort = abort.clone();
    let joined = tokio::task::spawn_blocking(move || {
        let mut reporter = ProgressReporter::new(move |update| {
            progress_inner.apply_progress(&progress_id, run_id, update)
        });
        executor.transfer(&request, &mut reporter, &transfer_abort)
    })
    .await;
    let mut result = flatten(joined);

    let verify = match (&result, expected_sha256) {
        (Ok(bytes), Some(expected)) => Some((*bytes, expected)),
        _ => None,
    };
    if let Some((bytes, expected)) = verify {
        if inner.enter_verifying(&id, run_id, bytes) {
            let joined = tokio::task::spawn_blocking(move || verify_sha256(&path, &expected, &abort))
                .await;
            result = flatten(joined).map(|()| bytes);
        }
    }

    inner.finish(&id, run_id, result);
}

fn flatten<T>(joined: Result<Result<T, TransferError>, JoinError>) -> Result<T, TransferError> {
    joined.unwrap_or_else(|e| {
        Err(TransferError::new(
            ErrorKind::StorageError,
            format!("transfer worker failed: {}", e),
        ))
    })
}
