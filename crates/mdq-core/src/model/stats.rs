//! Fleet-wide statistics snapshot.

use serde::{Deserialize, Serialize};

/// Derived view over the task map; produced by `stats::snapshot`, never mutated in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DownloadStatistics {
    pub total: usize,
    pub queued: usize,
    pub active: usize,
    pub paused: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Sum of known `file_size` over all tasks.
    pub total_bytes: u64,
    /// Sum of `downloaded_bytes` over all tasks.
    pub downloaded_bytes: u64,
    /// Sum of `speed_bps` over active tasks.
    pub current_speed_bps: u64,
    /// Mean of `speed_bps` over active tasks (0 when none are active).
    pub average_speed_bps: u64,
    /// Remaining bytes of active tasks divided by the current speed.
    pub estimated_seconds_remaining: Option<u64>,
    /// Bytes held by completed downloads.
    pub storage_used_bytes: u64,
    /// Free bytes reported by the storage probe.
    pub storage_available_bytes: u64,
}
