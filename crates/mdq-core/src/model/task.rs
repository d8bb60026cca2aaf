//! Download task entity and the types it is built from.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::retry::ErrorKind;

/// Task identifier (UUID v4 string, opaque to callers).
pub type TaskId = String;

/// Requested media quality. Passed through to the catalogue; not interpreted here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    Low,
    #[default]
    Medium,
    High,
    FullHd,
    Uhd,
}

impl Quality {
    pub fn as_str(self) -> &'static str {
        match self {
            Quality::Low => "low",
            Quality::Medium => "medium",
            Quality::High => "high",
            Quality::FullHd => "full_hd",
            Quality::Uhd => "uhd",
        }
    }
}

/// Admission priority. Higher values are admitted first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low = 0,
    #[default]
    Normal = 1,
    High = 2,
    Urgent = 3,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

/// Task lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Active,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Active => "active",
            TaskStatus::Paused => "paused",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    /// Completed, Failed and Cancelled. Failed can still be re-entered via resume.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    pub const ALL: [TaskStatus; 6] = [
        TaskStatus::Queued,
        TaskStatus::Active,
        TaskStatus::Paused,
        TaskStatus::Completed,
        TaskStatus::Failed,
        TaskStatus::Cancelled,
    ];
}

/// Sub-phase of an `Active` task. Both phases hold the same slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPhase {
    Transferring,
    Verifying,
}

/// Last failure recorded on a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskError {
    pub kind: ErrorKind,
    pub message: String,
    /// Unix seconds.
    pub timestamp: i64,
    pub retryable: bool,
}

/// Passthrough media metadata. Never interpreted by the scheduler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One requested download of a single media asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadTask {
    pub id: TaskId,
    pub source_id: String,
    pub url: String,
    pub file_path: PathBuf,
    pub quality: Quality,
    pub file_size: u64,
    pub downloaded_bytes: u64,
    #[serde(skip)]
    pub speed_bps: u64,
    #[serde(skip)]
    pub estimated_seconds_remaining: Option<u64>,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<TaskPhase>,
    pub priority: Priority,
    pub progress_percent: f64,
    pub created_at: i64,
    #[serde(default)]
    pub started_at: Option<i64>,
    #[serde(default)]
    pub ended_at: Option<i64>,
    #[serde(default)]
    pub last_error: Option<TaskError>,
    pub retry_count: u32,
    #[serde(default)]
    pub metadata: TaskMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_sha256: Option<String>,
    /// Submission order; rebuilds FIFO order within a priority after reload.
    pub submit_seq: u64,
}

impl DownloadTask {
    /// Recompute `progress_percent` from the byte counters.
    ///
    /// Only a completed task reports 100; an active task that has received every
    /// byte but is still verifying stays just below.
    pub fn refresh_progress(&mut self) {
        if self.status == TaskStatus::Completed {
            self.progress_percent = 100.0;
            return;
        }
        if self.file_size == 0 {
            self.progress_percent = 0.0;
            return;
        }
        let pct = self.downloaded_bytes as f64 * 100.0 / self.file_size as f64;
        self.progress_percent = pct.clamp(0.0, 99.9);
    }

    /// Recompute the ETA from the current speed. None when speed or size is unknown.
    pub fn refresh_eta(&mut self) {
        self.estimated_seconds_remaining = if self.speed_bps == 0 || self.file_size == 0 {
            None
        } else {
            let remaining = self.file_size.saturating_sub(self.downloaded_bytes);
            Some(remaining.div_ceil(self.speed_bps))
        };
    }

    /// Clear the derived, non-persisted rate fields.
    pub(crate) fn clear_rate(&mut self) {
        self.speed_bps = 0;
        self.estimated_seconds_remaining = None;
    }
}

/// Caller input for `Scheduler::submit`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DownloadRequest {
    pub source_id: String,
    pub url: String,
    /// Destination; derived from the URL under the download directory when absent.
    /// Relative paths are joined under the download directory.
    #[serde(default)]
    pub file_path: Option<PathBuf>,
    #[serde(default)]
    pub quality: Quality,
    #[serde(default)]
    pub priority: Priority,
    /// Known size in bytes, if the catalogue supplied one.
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub metadata: TaskMetadata,
    #[serde(default)]
    pub expected_sha256: Option<String>,
}

/// Selection for `Scheduler::list`. Empty fields match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskFilter {
    #[serde(default)]
    pub statuses: Vec<TaskStatus>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub source_id: Option<String>,
}

impl TaskFilter {
    pub fn with_status(status: TaskStatus) -> Self {
        Self {
            statuses: vec![status],
            ..Self::default()
        }
    }

    pub fn matches(&self, task: &DownloadTask) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&task.status) {
            return false;
        }
        if let Some(p) = self.priority {
            if task.priority != p {
                return false;
            }
        }
        if let Some(ref s) = self.source_id {
            if &task.source_id != s {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_task() -> DownloadTask {
        DownloadTask {
            id: "t1".to_string(),
            source_id: "src-1".to_string(),
            url: "https://media.example.com/v/1.mp4".to_string(),
            file_path: PathBuf::from("/tmp/1.mp4"),
            quality: Quality::FullHd,
            file_size: 1000,
            downloaded_bytes: 250,
            speed_bps: 50,
            estimated_seconds_remaining: None,
            status: TaskStatus::Active,
            phase: Some(TaskPhase::Transferring),
            priority: Priority::High,
            progress_percent: 0.0,
            created_at: 1,
            started_at: Some(2),
            ended_at: None,
            last_error: None,
            retry_count: 1,
            metadata: TaskMetadata {
                title: Some("Episode 1".to_string()),
                ..TaskMetadata::default()
            },
            expected_sha256: None,
            submit_seq: 7,
        }
    }

    #[test]
    fn progress_capped_until_completed() {
        let mut t = sample_task();
        t.refresh_progress();
        assert!((t.progress_percent - 25.0).abs() < 1e-9);

        t.downloaded_bytes = 1000;
        t.refresh_progress();
        assert!(t.progress_percent < 100.0);

        t.status = TaskStatus::Completed;
        t.refresh_progress();
        assert_eq!(t.progress_percent, 100.0);
    }

    #[test]
    fn progress_zero_when_size_unknown() {
        let mut t = sample_task();
        t.file_size = 0;
        t.refresh_progress();
        assert_eq!(t.progress_percent, 0.0);
    }

    #[test]
    fn eta_from_speed() {
        let mut t = sample_task();
        t.refresh_eta();
        assert_eq!(t.estimated_seconds_remaining, Some(15));
        t.speed_bps = 0;
        t.refresh_eta();
        assert_eq!(t.estimated_seconds_remaining, None);
    }

    #[test]
    fn rate_fields_not_serialized() {
        let t = sample_task();
        let json = serde_json::to_string(&t).unwrap();
        let back: DownloadTask = serde_json::from_str(&json).unwrap();
        assert_eq!(back.speed_bps, 0);
        assert_eq!(back.estimated_seconds_remaining, None);
        assert_eq!(back.status, TaskStatus::Active);
        assert_eq!(back.retry_count, 1);
        assert_eq!(back.metadata.title.as_deref(), Some("Episode 1"));
    }

    #[test]
    fn filter_matches_status_priority_source() {
        let t = sample_task();
        assert!(TaskFilter::default().matches(&t));
        assert!(TaskFilter::with_status(TaskStatus::Active).matches(&t));
        assert!(!TaskFilter::with_status(TaskStatus::Queued).matches(&t));
        let f = TaskFilter {
            priority: Some(Priority::Low),
            ..TaskFilter::default()
        };
        assert!(!f.matches(&t));
        let f = TaskFilter {
            source_id: Some("src-1".to_string()),
            ..TaskFilter::default()
        };
        assert!(f.matches(&t));
    }

    #[test]
    fn priority_ordering() {
        assert!(Priority::Urgent > Priority::High);
        assert!(Priority::High > Priority::Normal);
        assert!(Priority::Normal > Priority::Low);
    }
}
