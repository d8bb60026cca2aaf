//! Classify HTTP status, curl errors and IO errors into retry policy error kinds.

use super::ErrorKind;

/// Classify a non-2xx HTTP status.
///
/// 404/410 mean the asset is gone; 429 and 5xx are transient on the server side
/// and travel the network retry path; every other 4xx is a permanent rejection.
pub fn classify_http_status(code: u32) -> ErrorKind {
    match code {
        404 | 410 => ErrorKind::FileNotFound,
        429 => ErrorKind::NetworkError,
        500..=599 => ErrorKind::NetworkError,
        _ => ErrorKind::ServerError,
    }
}

/// Classify a curl error.
pub fn classify_curl_error(e: &curl::Error) -> ErrorKind {
    if e.is_aborted_by_callback() {
        return ErrorKind::Cancelled;
    }
    if e.is_write_error() {
        return ErrorKind::StorageError;
    }
    if e.is_url_malformed() || e.is_unsupported_protocol() {
        return ErrorKind::ServerError;
    }
    if e.is_file_couldnt_read_file() {
        return ErrorKind::FileNotFound;
    }
    // Timeouts, connection failures, resets, short reads, TLS hiccups.
    ErrorKind::NetworkError
}

/// Classify a local IO error (opening or writing the destination file).
pub fn classify_io_error(e: &std::io::Error) -> ErrorKind {
    #[cfg(unix)]
    if e.raw_os_error() == Some(libc::ENOSPC) || e.raw_os_error() == Some(libc::EDQUOT) {
        return ErrorKind::DiskFull;
    }
    match e.kind() {
        std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
        std::io::ErrorKind::TimedOut
        | std::io::ErrorKind::ConnectionReset
        | std::io::ErrorKind::ConnectionAborted
        | std::io::ErrorKind::ConnectionRefused
        | std::io::ErrorKind::UnexpectedEof => ErrorKind::NetworkError,
        _ => ErrorKind::StorageError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_404_and_410_not_found() {
        assert_eq!(classify_http_status(404), ErrorKind::FileNotFound);
        assert_eq!(classify_http_status(410), ErrorKind::FileNotFound);
    }

    #[test]
    fn http_4xx_server_error() {
        assert_eq!(classify_http_status(403), ErrorKind::ServerError);
        assert_eq!(classify_http_status(400), ErrorKind::ServerError);
        assert!(!classify_http_status(401).is_retryable());
    }

    #[test]
    fn http_5xx_and_429_retryable() {
        assert_eq!(classify_http_status(503), ErrorKind::NetworkError);
        assert_eq!(classify_http_status(500), ErrorKind::NetworkError);
        assert!(classify_http_status(429).is_retryable());
    }

    #[test]
    fn io_permission_denied() {
        let e = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        assert_eq!(classify_io_error(&e), ErrorKind::PermissionDenied);
    }

    #[cfg(unix)]
    #[test]
    fn io_enospc_is_disk_full() {
        let e = std::io::Error::from_raw_os_error(libc::ENOSPC);
        assert_eq!(classify_io_error(&e), ErrorKind::DiskFull);
        assert!(!classify_io_error(&e).is_retryable());
    }

    #[test]
    fn io_other_is_storage() {
        let e = std::io::Error::new(std::io::ErrorKind::NotFound, "no dir");
        assert_eq!(classify_io_error(&e), ErrorKind::StorageError);
    }
}
