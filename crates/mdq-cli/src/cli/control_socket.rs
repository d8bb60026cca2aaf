//! Control socket: server (during `mdq run`) and client (every other command).
//! Protocol: one JSON `ControlRequest` line in, one `ControlResponse` line out.

use anyhow::{Context, Result};
use mdq_core::control::{encode_line, ControlRequest, ControlResponse};
use mdq_core::Scheduler;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

/// Fails if another `mdq run` is answering on `path`. A socket file nobody
/// accepts on is stale and may be replaced.
pub fn ensure_no_live_listener(path: &Path) -> Result<()> {
    if path.exists() && std::os::unix::net::UnixStream::connect(path).is_ok() {
        anyhow::bail!(
            "another `mdq run` is already serving {}",
            path.display()
        );
    }
    Ok(())
}

/// Binds `path` and answers each request line by applying it to `scheduler`.
/// A stale socket file from an earlier run is replaced; a live one is an error.
pub fn spawn_control_listener(
    scheduler: Scheduler,
    path: impl AsRef<Path>,
) -> Result<tokio::task::JoinHandle<()>> {
    let path = path.as_ref().to_path_buf();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create socket dir: {}", parent.display()))?;
    }
    ensure_no_live_listener(&path)?;
    let _ = std::fs::remove_file(&path);
    let listener = UnixListener::bind(&path)
        .with_context(|| format!("bind control socket: {}", path.display()))?;

    let handle = tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let scheduler = scheduler.clone();
                    tokio::spawn(async move {
                        if let Err(e) = serve_connection(stream, scheduler).await {
                            tracing::debug!("control connection: {:#}", e);
                        }
                    });
                }
                Err(e) => tracing::debug!("control socket accept: {}", e),
            }
        }
    });
    Ok(handle)
}

async fn serve_connection(stream: UnixStream, scheduler: Scheduler) -> Result<()> {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<ControlRequest>(line) {
            Ok(request) => {
                tracing::debug!(?request, "control request");
                request.apply(&scheduler)
            }
            Err(e) => ControlResponse::Error {
                message: format!("malformed request: {}", e),
            },
        };
        write.write_all(encode_line(&response)?.as_bytes()).await?;
    }
    Ok(())
}

/// Sends `request` to a running `mdq run`. Returns `None` when nobody is listening.
pub async fn send_request(
    socket_path: &Path,
    request: &ControlRequest,
) -> Result<Option<ControlResponse>> {
    if !socket_path.exists() {
        return Ok(None);
    }
    let stream = match UnixStream::connect(socket_path).await {
        Ok(s) => s,
        Err(e) => {
            tracing::debug!(path = %socket_path.display(), "stale control socket: {}", e);
            return Ok(None);
        }
    };
    let (read, mut write) = stream.into_split();
    write.write_all(encode_line(request)?.as_bytes()).await?;
    write.shutdown().await?;

    let mut lines = BufReader::new(read).lines();
    let line = lines
        .next_line()
        .await?
        .context("control socket closed without a response")?;
    let response = serde_json::from_str(&line).context("parse control response")?;
    Ok(Some(response))
}
