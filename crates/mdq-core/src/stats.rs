//! Statistics derived from the live task map.
//!
//! Recomputed from scratch on every request; nothing is maintained incrementally.

use crate::model::{DownloadStatistics, DownloadTask, TaskStatus};

/// Build a snapshot over `tasks`. `storage_available` comes from the condition probe.
pub fn snapshot<'a>(
    tasks: impl IntoIterator<Item = &'a DownloadTask>,
    storage_available: u64,
) -> DownloadStatistics {
    let mut s = DownloadStatistics {
        storage_available_bytes: storage_available,
        ..DownloadStatistics::default()
    };
    let mut active_remaining = 0u64;

    for t in tasks {
        s.total += 1;
        s.total_bytes = s.total_bytes.saturating_add(t.file_size);
        s.downloaded_bytes = s.downloaded_bytes.saturating_add(t.downloaded_bytes);
        match t.status {
            TaskStatus::Queued => s.queued += 1,
            TaskStatus::Active => {
                s.active += 1;
                s.current_speed_bps = s.current_speed_bps.saturating_add(t.speed_bps);
                active_remaining = active_remaining
                    .saturating_add(t.file_size.saturating_sub(t.downloaded_bytes));
            }
            TaskStatus::Paused => s.paused += 1,
            TaskStatus::Completed => {
                s.completed += 1;
                s.storage_used_bytes = s.storage_used_bytes.saturating_add(t.downloaded_bytes);
            }
            TaskStatus::Failed => s.failed += 1,
            TaskStatus::Cancelled => s.cancelled += 1,
        }
    }

    if s.active > 0 {
        s.average_speed_bps = s.current_speed_bps / s.active as u64;
    }
    if s.current_speed_bps > 0 {
        s.estimated_seconds_remaining = Some(active_remaining.div_ceil(s.current_speed_bps));
    }
    s
}
