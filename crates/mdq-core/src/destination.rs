//! Destination paths: URL validation, filename derivation, Linux-safe sanitizing.

use std::path::{Path, PathBuf};

use url::Url;

use crate::error::SchedulerError;

const FALLBACK_STEM: &str = "download";
const NAME_MAX: usize = 255;

/// Parse a download URL. Only `http` and `https` are accepted.
pub fn parse_media_url(raw: &str) -> Result<Url, SchedulerError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| SchedulerError::InvalidRequest(format!("bad url {:?}: {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(SchedulerError::InvalidRequest(format!(
            "unsupported url scheme: {}",
            other
        ))),
    }
}

/// File name for a URL: its last path segment, sanitized. Falls back to
/// `<source_id>.bin` (or `download.bin`) when the path has no usable segment.
pub fn derive_filename(url: &Url, source_id: &str) -> String {
    let from_path = url
        .path_segments()
        .and_then(|mut segs| segs.rfind(|s| !s.is_empty()))
        .map(sanitize_file_name)
        .filter(|s| !s.is_empty());
    if let Some(name) = from_path {
        return name;
    }
    let stem = sanitize_file_name(source_id);
    let stem = if stem.is_empty() { FALLBACK_STEM } else { &stem };
    format!("{}.bin", stem)
}

/// Where a task writes. Absolute explicit paths are used as given; relative
/// ones and derived names go under `download_dir`.
pub fn resolve(
    download_dir: &Path,
    explicit: Option<&Path>,
    url: &Url,
    source_id: &str,
) -> Result<PathBuf, SchedulerError> {
    match explicit {
        Some(p) if p.as_os_str().is_empty() => Err(SchedulerError::InvalidRequest(
            "file_path is empty".to_string(),
        )),
        Some(p) if p.is_absolute() => Ok(p.to_path_buf()),
        Some(p) => {
            if p.components().any(|c| matches!(c, std::path::Component::ParentDir)) {
                return Err(SchedulerError::InvalidRequest(format!(
                    "relative file_path may not contain '..': {}",
                    p.display()
                )));
            }
            Ok(download_dir.join(p))
        }
        None => Ok(download_dir.join(derive_filename(url, source_id))),
    }
}

/// Replace separators, NUL and control characters with `_`, collapse runs of
/// `_`, trim dots and spaces, and cap at NAME_MAX bytes.
pub fn sanitize_file_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_was_sub = false;
    for c in name.chars() {
        let bad = matches!(c, '\0' | '/' | '\\' | ' ' | '\t') || c.is_control();
        if bad {
            if !last_was_sub {
                out.push('_');
            }
            last_was_sub = true;
        } else {
            out.push(c);
            last_was_sub = false;
        }
    }
    let trimmed = out.trim_matches(|c| c == '.' || c == '_' || c == ' ');
    let mut end = trimmed.len().min(NAME_MAX);
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    trimmed[..end].to_string()
}
