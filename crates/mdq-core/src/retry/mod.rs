//! Retry and backoff policy.
//!
//! This module encapsulates error classification (network, storage, HTTP status)
//! and exponential backoff decisions so the scheduler and the transfer executor
//! share one consistent view of what is worth retrying.

mod classify;
mod error;
mod policy;

pub use classify::{classify_curl_error, classify_http_status, classify_io_error};
pub use error::{ErrorKind, TransferError};
pub use policy::RetryPolicy;
