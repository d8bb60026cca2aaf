//! libcurl executor: single-stream GET with range resume, speed cap and idle timeout.

use std::cell::Cell;
use std::fs::{self, File};
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;
use std::str;
use std::time::{Duration, Instant};

use super::{AbortToken, ProgressReporter, TransferExecutor, TransferRequest};
use crate::retry::{classify_curl_error, classify_http_status, TransferError};

fn curl_err(e: curl::Error) -> TransferError {
    TransferError::new(classify_curl_error(&e), e.to_string())
}

#[derive(Debug, Clone)]
pub struct CurlExecutor {
    pub connect_timeout: Duration,
    /// Abort (as a network error) when throughput stays below this many bytes/s...
    pub low_speed_limit: u32,
    /// ...for this long.
    pub low_speed_time: Duration,
}

impl Default for CurlExecutor {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            low_speed_limit: 1024,
            low_speed_time: Duration::from_secs(60),
        }
    }
}

/// Open the destination for writing and return it with the offset to resume from.
///
/// Keeps at most `resume_from` bytes of an existing partial file; anything past
/// that point was never acknowledged by the scheduler and is discarded.
fn open_destination(path: &Path, resume_from: u64) -> std::io::Result<(File, u64)> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let existing = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    if resume_from == 0 || existing == 0 {
        let file = File::options()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        return Ok((file, 0));
    }
    let offset = existing.min(resume_from);
    let mut file = File::options().write(true).open(path)?;
    file.set_len(offset)?;
    file.seek(SeekFrom::Start(offset))?;
    Ok((file, offset))
}

/// Parse the status code from a status line such as `HTTP/1.1 206 Partial Content`.
fn parse_status_line(line: &str) -> Option<u32> {
    if !line.starts_with("HTTP/") {
        return None;
    }
    line.split_whitespace().nth(1)?.parse().ok()
}

/// Total size from `Content-Range: bytes 100-199/1000`.
fn parse_content_range_total(value: &str) -> Option<u64> {
    value.rsplit('/').next()?.trim().parse().ok()
}

/// A 416 reply to `Range: bytes=<offset>-` means nothing is left to fetch when
/// the known size (ours, or the `bytes */N` total in the reply) equals `offset`.
fn range_already_complete(
    code: u32,
    offset: u64,
    expected_size: u64,
    reported: Option<u64>,
) -> bool {
    if code != 416 || offset == 0 {
        return false;
    }
    let size = if expected_size > 0 { Some(expected_size) } else { reported };
    size == Some(offset)
}

impl TransferExecutor for CurlExecutor {
    fn transfer(
        &self,
        request: &TransferRequest,
        progress: &mut ProgressReporter,
        abort: &AbortToken,
    ) -> Result<u64, TransferError> {
        if abort.is_aborted() {
            return Err(TransferError::cancelled());
        }
        let (mut file, offset) = open_destination(&request.file_path, request.resume_from)?;
        if request.expected_size > 0 {
            progress.set_total(request.expected_size);
        }

        let mut easy = curl::easy::Easy::new();
        easy.url(&request.url).map_err(curl_err)?;
        easy.follow_location(true).map_err(curl_err)?;
        easy.max_redirections(10).map_err(curl_err)?;
        easy.connect_timeout(self.connect_timeout).map_err(curl_err)?;
        // Idle detection: a stalled transfer surfaces as a retryable network error.
        easy.low_speed_limit(self.low_speed_limit).map_err(curl_err)?;
        easy.low_speed_time(self.low_speed_time).map_err(curl_err)?;
        easy.progress(true).map_err(curl_err)?;
        if let Some(limit) = request.speed_limit_bps {
            easy.max_recv_speed(limit).map_err(curl_err)?;
        }
        // An explicit Range header (rather than resume_from) lets a 200 reply
        // through so the write path can restart the file from zero.
        if offset > 0 {
            easy.range(&format!("{}-", offset)).map_err(curl_err)?;
        }

        let status = Cell::new(0u32);
        let total_seen: Cell<Option<u64>> = Cell::new(None);
        let written = Cell::new(offset);
        let run_base = Cell::new(offset);
        let restarted = Cell::new(false);
        let mut storage_error: Option<std::io::Error> = None;
        let started = Instant::now();

        let perform_result = {
            let reporter = &mut *progress;
            let storage_error = &mut storage_error;
            let file = &mut file;
            let mut transfer = easy.transfer();
            transfer
                .header_function(|data| {
                    let Ok(line) = str::from_utf8(data) else {
                        return true;
                    };
                    let line = line.trim();
                    if let Some(code) = parse_status_line(line) {
                        status.set(code);
                        return true;
                    }
                    let Some((name, value)) = line.split_once(':') else {
                        return true;
                    };
                    let value = value.trim();
                    if name.eq_ignore_ascii_case("content-range") {
                        if let Some(total) = parse_content_range_total(value) {
                            total_seen.set(Some(total));
                        }
                    } else if name.eq_ignore_ascii_case("content-length") {
                        if let Ok(len) = value.parse::<u64>() {
                            match status.get() {
                                206 => {
                                    if total_seen.get().is_none() {
                                        total_seen.set(Some(offset + len));
                                    }
                                }
                                200..=299 => total_seen.set(Some(len)),
                                _ => {}
                            }
                        }
                    }
                    true
                })
                .map_err(curl_err)?;
            transfer
                .progress_function(|_, _, _, _| !abort.is_aborted())
                .map_err(curl_err)?;
            transfer
                .write_function(|data| {
                    // Server ignored the Range request and is sending the whole body.
                    if offset > 0 && status.get() == 200 && !restarted.get() {
                        restarted.set(true);
                        if let Err(e) = file.set_len(0).and_then(|_| file.seek(SeekFrom::Start(0))) {
                            *storage_error = Some(e);
                            return Ok(0);
                        }
                        written.set(0);
                        run_base.set(0);
                    }
                    if let Err(e) = file.write_all(data) {
                        *storage_error = Some(e);
                        return Ok(0);
                    }
                    let now = written.get() + data.len() as u64;
                    written.set(now);
                    if let Some(total) = total_seen.get() {
                        reporter.set_total(total);
                    }
                    let elapsed = started.elapsed().as_secs_f64();
                    let speed = if elapsed > 0.0 {
                        ((now - run_base.get()) as f64 / elapsed) as u64
                    } else {
                        0
                    };
                    reporter.report(now, speed);
                    Ok(data.len())
                })
                .map_err(curl_err)?;
            transfer.perform()
        };

        if let Err(e) = perform_result {
            if abort.is_aborted() || e.is_aborted_by_callback() {
                return Err(TransferError::cancelled());
            }
            if e.is_write_error() {
                if let Some(io_err) = storage_error.take() {
                    return Err(io_err.into());
                }
            }
            return Err(curl_err(e));
        }

        let code = easy.response_code().map_err(curl_err)?;
        if range_already_complete(code, offset, request.expected_size, total_seen.get()) {
            progress.flush(offset, 0);
            return Ok(offset);
        }
        if !(200..300).contains(&code) {
            return Err(TransferError::new(
                classify_http_status(code),
                format!("GET {} returned HTTP {}", request.url, code),
            ));
        }

        file.sync_all()?;
        let received = written.get();
        let expected = total_seen
            .get()
            .or((request.expected_size > 0).then_some(request.expected_size));
        if let Some(expected) = expected {
            if received < expected {
                return Err(TransferError::partial(expected, received));
            }
        }
        let elapsed = started.elapsed().as_secs_f64();
        let speed = if elapsed > 0.0 {
            ((received - run_base.get()) as f64 / elapsed) as u64
        } else {
            0
        };
        progress.flush(received, speed);
        Ok(received)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_line_parsing() {
        assert_eq!(parse_status_line("HTTP/1.1 206 Partial Content"), Some(206));
        assert_eq!(parse_status_line("HTTP/2 200"), Some(200));
        assert_eq!(parse_status_line("Content-Length: 5"), None);
    }

    #[test]
    fn unsatisfiable_range_completes_only_at_known_size() {
        assert!(range_already_complete(416, 4096, 4096, None));
        assert!(range_already_complete(416, 4096, 0, Some(4096)));
        assert!(!range_already_complete(416, 4096, 0, None));
        assert!(!range_already_complete(416, 100, 0, Some(4096)));
        assert!(!range_already_complete(416, 0, 0, Some(0)));
        assert!(!range_already_complete(200, 4096, 4096, None));
    }

    #[test]
    fn content_range_total() {
        assert_eq!(parse_content_range_total("bytes 100-199/1000"), Some(1000));
        assert_eq!(parse_content_range_total("bytes 0-9/*"), None);
        assert_eq!(parse_content_range_total("bytes */4096"), Some(4096));
    }

    #[test]
    fn open_destination_truncates_to_resume_point() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("a.bin");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, vec![7u8; 100]).unwrap();

        let (_f, off) = open_destination(&path, 40).unwrap();
        assert_eq!(off, 40);
        assert_eq!(fs::metadata(&path).unwrap().len(), 40);

        let (_f, off) = open_destination(&path, 0).unwrap();
        assert_eq!(off, 0);
        assert_eq!(fs::metadata(&path).unwrap().len(), 0);
    }

    #[test]
    fn open_destination_shorter_file_resumes_from_its_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.bin");
        fs::write(&path, vec![1u8; 10]).unwrap();
        let (_f, off) = open_destination(&path, 50).unwrap();
        assert_eq!(off, 10);
    }

    #[test]
    fn open_destination_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x/y/z.bin");
        let (_f, off) = open_destination(&path, 0).unwrap();
        assert_eq!(off, 0);
        assert!(path.exists());
    }

    #[test]
    fn aborted_before_start_is_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let abort = AbortToken::new();
        abort.abort();
        let req = TransferRequest {
            task_id: "t".to_string(),
            url: "http://127.0.0.1:9/never".to_string(),
            file_path: dir.path().join("f"),
            resume_from: 0,
            expected_size: 0,
            speed_limit_bps: None,
        };
        let err = CurlExecutor::default()
            .transfer(&req, &mut ProgressReporter::noop(), &abort)
            .unwrap_err();
        assert_eq!(err.kind, crate::retry::ErrorKind::Cancelled);
    }
}
