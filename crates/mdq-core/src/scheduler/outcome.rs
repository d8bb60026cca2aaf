//! Routing a finished run: complete, retry after backoff, or fail.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::events::EventKind;
use crate::model::{TaskError, TaskStatus};
use crate::retry::{ErrorKind, RetryPolicy, TransferError};

use super::state::{unix_now, State};
use super::{remove_download_file, Inner};

impl Inner {
    /// Apply the result of run `run_id`, release its slot and refill slots.
    pub(super) fn finish(self: &Arc<Self>, id: &str, run_id: u64, result: Result<u64, TransferError>) {
        let mut retry_after = None;
        let mut remove_file: Option<PathBuf> = None;
        {
            let mut guard = self.lock();
            let st: &mut State = &mut guard;
            if st.shutting_down {
                return;
            }
            if st.draining.get(id).is_some_and(|d| d.run_id == run_id) {
                st.draining.remove(id);
                tracing::debug!(task = id, run_id, "aborted run returned");
            } else if st.is_current_run(id, run_id) {
                st.active.remove(id);
                let policy = RetryPolicy::from_config(&st.config);
                let auto_delete = st.config.auto_delete_on_final_failure;
                let Some(task) = st.tasks.get_mut(id) else {
                    return;
                };
                task.phase = None;
                task.clear_rate();
                let result = result.and_then(|bytes| {
                    if task.file_size > 0 && bytes < task.file_size {
                        Err(TransferError::partial(task.file_size, bytes))
                    } else {
                        Ok(bytes)
                    }
                });

                match result {
                    Ok(bytes) => {
                        task.downloaded_bytes = bytes;
                        task.file_size = task.file_size.max(bytes);
                        task.status = TaskStatus::Completed;
                        task.ended_at = Some(unix_now());
                        task.last_error = None;
                        task.refresh_progress();
                        tracing::info!(task = %task.id, bytes, "download complete");
                        self.transition(EventKind::Completed, task);
                    }
                    Err(e) if e.kind == ErrorKind::Cancelled => {
                        // The executor stopped on its own; keep the bytes for a resume.
                        task.status = TaskStatus::Paused;
                        task.refresh_progress();
                        tracing::warn!(task = %task.id, "transfer stopped without a pause request");
                        self.transition(EventKind::Paused, task);
                    }
                    Err(e) => {
                        task.last_error = Some(TaskError {
                            kind: e.kind,
                            message: e.message.clone(),
                            timestamp: unix_now(),
                            retryable: e.retryable(),
                        });
                        if policy.should_retry(task, &e) {
                            task.retry_count += 1;
                            task.status = TaskStatus::Queued;
                            let delay = policy.next_delay(task.retry_count);
                            tracing::info!(
                                task = %task.id,
                                retry = task.retry_count,
                                delay_ms = delay.as_millis() as u64,
                                "transfer failed: {}",
                                e
                            );
                            self.transition(EventKind::Retrying, task);
                            st.pending_retries.insert(id.to_string(), run_id);
                            retry_after = Some(delay);
                        } else {
                            task.status = TaskStatus::Failed;
                            task.ended_at = Some(unix_now());
                            task.refresh_progress();
                            tracing::warn!(
                                task = %task.id,
                                retries = task.retry_count,
                                "download failed: {}",
                                e
                            );
                            self.transition(EventKind::Failed, task);
                            if auto_delete {
                                if let Some(task) = st.tasks.remove(id) {
                                    self.persister.remove_task(&task.id);
                                    self.events.task(EventKind::Deleted, &task);
                                    remove_file = Some(task.file_path);
                                }
                            }
                        }
                    }
                }
            } else {
                return;
            }
        }

        if let Some(delay) = retry_after {
            self.schedule_retry(id.to_string(), run_id, delay);
        }
        if let Some(path) = remove_file {
            remove_download_file(&path);
        }
        self.admit();
        self.publish_statistics();
    }

    /// Put `id` back in the queue once `delay` has passed, unless it was paused,
    /// cancelled or deleted meanwhile, or a later failure re-armed the backoff.
    fn schedule_retry(self: &Arc<Self>, id: String, run_id: u64, delay: Duration) {
        let Some(handle) = self.lock().runtime.clone() else {
            return;
        };
        let weak = Arc::downgrade(self);
        handle.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                inner.requeue_after_backoff(&id, run_id);
            }
        });
    }

    fn requeue_after_backoff(self: &Arc<Self>, id: &str, run_id: u64) {
        let requeued = {
            let mut guard = self.lock();
            let st: &mut State = &mut guard;
            if st.shutting_down || st.pending_retries.get(id) != Some(&run_id) {
                false
            } else {
                st.pending_retries.remove(id);
                match st.tasks.get(id) {
                    Some(t) if t.status == TaskStatus::Queued => st.queue.insert(id, t.priority),
                    _ => false,
                }
            }
        };
        if requeued {
            tracing::debug!(task = id, "backoff elapsed; re-queued");
            self.admit();
            self.publish_statistics();
        }
    }
}
