//! Authoritative in-memory task map plus its persistence path.

mod persist;

use std::collections::HashMap;
use std::path::Path;

use crate::model::{DownloadTask, TaskFilter, TaskId};

pub use persist::{load_config, load_tasks};
pub(crate) use persist::Persister;

#[derive(Debug, Default)]
pub struct TaskStore {
    tasks: HashMap<TaskId, DownloadTask>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new task. Replaces (and returns) any task with the same id.
    pub fn create(&mut self, task: DownloadTask) -> Option<DownloadTask> {
        self.tasks.insert(task.id.clone(), task)
    }

    pub fn get(&self, id: &str) -> Option<&DownloadTask> {
        self.tasks.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut DownloadTask> {
        self.tasks.get_mut(id)
    }

    /// Apply `f` to the task, returning its result, or None for an unknown id.
    pub fn update<R>(&mut self, id: &str, f: impl FnOnce(&mut DownloadTask) -> R) -> Option<R> {
        self.tasks.get_mut(id).map(f)
    }

    pub fn remove(&mut self, id: &str) -> Option<DownloadTask> {
        self.tasks.remove(id)
    }

    /// Matching tasks in submission order.
    pub fn list(&self, filter: &TaskFilter) -> Vec<DownloadTask> {
        let mut out: Vec<DownloadTask> = self
            .tasks
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        out.sort_by_key(|t| t.submit_seq);
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = &DownloadTask> {
        self.tasks.values()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Id of a non-terminal task (other than `except`) writing to `path`, if any.
    pub fn file_path_owner(&self, path: &Path, except: Option<&str>) -> Option<&TaskId> {
        self.tasks
            .values()
            .find(|t| {
                !t.status.is_terminal()
                    && t.file_path == path
                    && except.map_or(true, |e| e != t.id)
            })
            .map(|t| &t.id)
    }

    /// Highest submission sequence seen, for continuing numbering after reload.
    pub fn max_submit_seq(&self) -> u64 {
        self.tasks.values().map(|t| t.submit_seq).max().unwrap_or(0)
    }
}
