//! Minimal HTTP/1.1 server for integration tests.
//!
//! Serves one static body at any path. GET with `Range: bytes=N-` answers 206
//! unless ranges are disabled, in which case the full body comes back with 200.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;

#[derive(Debug, Clone, Copy)]
pub struct ServerOptions {
    /// If false, GET ignores Range and always returns 200 with the full body.
    pub support_ranges: bool,
    /// Answer every request with this status and an empty body.
    pub fail_with: Option<u16>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            support_ranges: true,
            fail_with: None,
        }
    }
}

pub struct MediaServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<Option<u64>>>>,
}

impl MediaServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Range start of every GET received so far (`None` for a plain GET).
    pub fn range_starts(&self) -> Vec<Option<u64>> {
        self.requests.lock().unwrap().clone()
    }
}

pub fn start(body: Vec<u8>) -> MediaServer {
    start_with_options(body, ServerOptions::default())
}

/// Starts a server in a background thread. Runs until the process exits.
pub fn start_with_options(body: Vec<u8>, opts: ServerOptions) -> MediaServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let body = Arc::new(body);
    let requests = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&requests);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let body = Arc::clone(&body);
            let log = Arc::clone(&log);
            thread::spawn(move || handle(stream, &body, opts, &log));
        }
    });
    MediaServer {
        base_url: format!("http://127.0.0.1:{}/", port),
        requests,
    }
}

fn handle(
    mut stream: std::net::TcpStream,
    body: &[u8],
    opts: ServerOptions,
    log: &Mutex<Vec<Option<u64>>>,
) {
    let _ = stream.set_read_timeout(Some(std::time::Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(std::time::Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let Ok(request) = std::str::from_utf8(&buf[..n]) else {
        return;
    };
    let range_start = parse_range_start(request);
    log.lock().unwrap().push(range_start);

    if let Some(code) = opts.fail_with {
        let response = format!(
            "HTTP/1.1 {} Test Failure\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            code
        );
        let _ = stream.write_all(response.as_bytes());
        return;
    }

    let total = body.len() as u64;
    let (status, extra, slice) = match range_start.filter(|_| opts.support_ranges) {
        Some(start) if start >= total => (
            "416 Range Not Satisfiable",
            format!("Content-Range: bytes */{}\r\n", total),
            &body[0..0],
        ),
        Some(start) => (
            "206 Partial Content",
            format!(
                "Content-Range: bytes {}-{}/{}\r\n",
                start,
                total.saturating_sub(1),
                total
            ),
            &body[start as usize..],
        ),
        None => ("200 OK", String::new(), body),
    };
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\n{}Connection: close\r\n\r\n",
        status,
        slice.len(),
        extra
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.write_all(slice);
}

/// Start offset of a `Range: bytes=N-` header, if present.
fn parse_range_start(request: &str) -> Option<u64> {
    for line in request.lines().skip(1) {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("range") {
                let spec = value.trim().strip_prefix("bytes=")?;
                let (start, _) = spec.split_once('-')?;
                return start.trim().parse().ok();
            }
        }
    }
    None
}
