//! Transfer error type and its closed classification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed taxonomy of transfer failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Transport-level failure, idle timeout, short read or transient 5xx. Retryable.
    NetworkError,
    /// Filesystem failure other than a full disk or denied permission.
    StorageError,
    /// Server rejected the request (4xx other than not-found) or served bad content.
    ServerError,
    FileNotFound,
    DiskFull,
    PermissionDenied,
    /// Stopped on user request. Never counted against the retry budget.
    Cancelled,
}

impl ErrorKind {
    /// Only network-class errors are worth another attempt.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::NetworkError)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NetworkError => "network_error",
            ErrorKind::StorageError => "storage_error",
            ErrorKind::ServerError => "server_error",
            ErrorKind::FileNotFound => "file_not_found",
            ErrorKind::DiskFull => "disk_full",
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by a transfer executor, already classified.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct TransferError {
    pub kind: ErrorKind,
    pub message: String,
}

impl TransferError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NetworkError, message)
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::StorageError, message)
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "transfer aborted by user")
    }

    pub fn retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Transfer ended with fewer bytes than the known size (server closed early).
    pub fn partial(expected: u64, received: u64) -> Self {
        Self::network(format!(
            "partial transfer: expected {} bytes, got {}",
            expected, received
        ))
    }
}

impl From<std::io::Error> for TransferError {
    fn from(e: std::io::Error) -> Self {
        Self::new(super::classify_io_error(&e), e.to_string())
    }
}
