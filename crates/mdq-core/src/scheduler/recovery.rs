//! Startup recovery: rebuild queue and slots from persisted tasks.

use crate::model::{DownloadTask, TaskStatus};

use super::state::State;

/// Load `tasks` into `state`.
///
/// Tasks persisted as Active were interrupted mid-transfer: they go back to
/// Queued when `auto_resume_on_startup` is set, otherwise to Paused. Queued
/// tasks are rebuilt into the queue in (priority, submission) order. Returns
/// the tasks whose status changed so the caller can persist them.
pub(super) fn rebuild(state: &mut State, mut tasks: Vec<DownloadTask>) -> Vec<DownloadTask> {
    tasks.sort_by_key(|t| t.submit_seq);
    let auto_resume = state.config.auto_resume_on_startup;
    let mut changed = Vec::new();

    for mut task in tasks {
        task.clear_rate();
        if task.status == TaskStatus::Active {
            task.phase = None;
            task.status = if auto_resume {
                TaskStatus::Queued
            } else {
                TaskStatus::Paused
            };
            tracing::info!(
                task = %task.id,
                bytes = task.downloaded_bytes,
                "interrupted task recovered as {}",
                task.status.as_str()
            );
            changed.push(task.clone());
        }
        task.refresh_progress();
        if task.status == TaskStatus::Queued {
            state.queue.insert(&task.id, task.priority);
        }
        state.tasks.create(task);
    }

    let last = state.tasks.max_submit_seq();
    state.continue_seq_after(last);
    tracing::debug!(
        tasks = state.tasks.len(),
        queued = state.queue.len(),
        "task map rebuilt"
    );
    changed
}
