//! Data model shared by the scheduler, store and CLI.

mod stats;
mod task;

pub use stats::DownloadStatistics;
pub use task::{
    DownloadRequest, DownloadTask, Priority, Quality, TaskError, TaskFilter, TaskId,
    TaskMetadata, TaskPhase, TaskStatus,
};
