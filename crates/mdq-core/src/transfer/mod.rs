//! Byte-transfer boundary.
//!
//! The scheduler hands an admitted task to a `TransferExecutor` on the blocking
//! thread pool together with a rate-limited `ProgressReporter` and an
//! `AbortToken`. The executor owns all network and file I/O for that run.

mod curl_executor;
mod progress;
mod verify;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::model::TaskId;
use crate::retry::TransferError;

pub use curl_executor::CurlExecutor;
pub use progress::{ProgressReporter, ProgressUpdate, PROGRESS_INTERVAL};
pub use verify::{sha256_path, verify_sha256};

/// Everything an executor needs to run one attempt.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub task_id: TaskId,
    pub url: String,
    pub file_path: PathBuf,
    /// Bytes already on disk from an earlier run; executors may range-resume from here.
    pub resume_from: u64,
    /// Size known before the transfer starts (0 = unknown).
    pub expected_size: u64,
    /// Per-transfer bandwidth cap.
    pub speed_limit_bps: Option<u64>,
}

/// Cooperative cancellation flag shared between the scheduler and one transfer.
#[derive(Debug, Clone, Default)]
pub struct AbortToken(Arc<AtomicBool>);

impl AbortToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Performs the blocking transfer of one task.
///
/// Returns the total number of bytes present at `file_path` when done. Must
/// return `ErrorKind::Cancelled` promptly once `abort` is set, and should call
/// `progress.report` as bytes arrive (the reporter enforces the rate bound).
pub trait TransferExecutor: Send + Sync {
    fn transfer(
        &self,
        request: &TransferRequest,
        progress: &mut ProgressReporter,
        abort: &AbortToken,
    ) -> Result<u64, TransferError>;
}
