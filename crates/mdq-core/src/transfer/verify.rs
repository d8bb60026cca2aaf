//! SHA-256 verification for the `Verifying` phase.
//!
//! Runs after the transfer finished, never inline with the byte stream.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::AbortToken;
use crate::retry::{ErrorKind, TransferError};

const BUF_SIZE: usize = 64 * 1024;

/// Compute SHA-256 of a file as lowercase hex. Checks `abort` between chunks.
pub fn sha256_path(path: &Path, abort: &AbortToken) -> Result<String, TransferError> {
    let mut f = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        if abort.is_aborted() {
            return Err(TransferError::cancelled());
        }
        let n = f.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Compare the file digest with `expected` (hex, case-insensitive).
///
/// A mismatch means the server delivered the wrong content; it is not retried.
pub fn verify_sha256(path: &Path, expected: &str, abort: &AbortToken) -> Result<(), TransferError> {
    let actual = sha256_path(path, abort)?;
    if actual.eq_ignore_ascii_case(expected.trim()) {
        Ok(())
    } else {
        Err(TransferError::new(
            ErrorKind::ServerError,
            format!("checksum mismatch: expected {}, got {}", expected.trim(), actual),
        ))
    }
}
