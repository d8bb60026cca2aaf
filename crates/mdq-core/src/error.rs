//! Errors returned by the public scheduler API.
//!
//! Transfer failures never surface here; they become task state. These variants
//! cover caller mistakes only.

use std::path::PathBuf;

use crate::model::{TaskId, TaskStatus};

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("unknown task: {0}")]
    UnknownTask(TaskId),

    #[error("destination {path} is already used by task {owner}")]
    FilePathInUse { path: PathBuf, owner: TaskId },

    #[error("cannot {action} task {id} in state {status}")]
    InvalidTransition {
        id: TaskId,
        status: &'static str,
        action: &'static str,
    },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl SchedulerError {
    pub(crate) fn invalid_transition(id: &str, status: TaskStatus, action: &'static str) -> Self {
        SchedulerError::InvalidTransition {
            id: id.to_string(),
            status: status.as_str(),
            action,
        }
    }
}
