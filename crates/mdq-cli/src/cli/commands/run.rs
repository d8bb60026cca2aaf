//! `mdq run` – own the scheduler: admit queued tasks, serve the control socket,
//! print progress until the queue drains (or until Ctrl-C with --watch).

use anyhow::{Context, Result};
use mdq_core::events::{ChannelSink, EventKind, EventPublisher, SchedulerEvent, TracingSink};
use mdq_core::paths;
use mdq_core::DownloadConfig;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::Receiver;

use super::{format_bytes, open_scheduler};
use crate::cli::control_socket;

const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

pub async fn run_scheduler(cfg: DownloadConfig, watch: bool) -> Result<()> {
    let (sink, events) = ChannelSink::new(1024);
    let publisher = EventPublisher::new()
        .with_sink(Arc::new(TracingSink))
        .with_sink(Arc::new(sink));
    // Other commands fall back to the store when no socket answers; never run unreachable.
    let socket_path = paths::default_control_socket_path()?;
    control_socket::ensure_no_live_listener(&socket_path)?;
    let scheduler = open_scheduler(cfg, publisher).await?;
    let listener = control_socket::spawn_control_listener(scheduler.clone(), &socket_path)
        .context("control socket unavailable")?;
    tracing::debug!(path = %socket_path.display(), "control socket listening");

    let printer = tokio::spawn(print_events(events));
    scheduler.start()?;

    let waiting = async {
        if watch {
            std::future::pending::<()>().await
        } else {
            scheduler.wait_idle().await
        }
    };
    tokio::select! {
        _ = waiting => {}
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                tracing::warn!("ctrl-c handler: {}", e);
            }
            println!("Interrupted; stopping active transfers.");
        }
    }

    scheduler.shutdown().await;
    listener.abort();
    let _ = std::fs::remove_file(&socket_path);
    printer.abort();

    let s = scheduler.statistics();
    println!(
        "{} completed, {} failed, {} queued, {} paused",
        s.completed, s.failed, s.queued, s.paused
    );
    tracing::info!(completed = s.completed, failed = s.failed, "run finished");
    Ok(())
}

async fn print_events(mut events: Receiver<SchedulerEvent>) {
    let mut last_print: HashMap<String, Instant> = HashMap::new();
    while let Some(event) = events.recv().await {
        let SchedulerEvent::Task { kind, task } = event else {
            continue;
        };
        let name = task
            .metadata
            .title
            .clone()
            .unwrap_or_else(|| task.file_path.display().to_string());
        match kind {
            EventKind::Progress => {
                let now = Instant::now();
                let due = last_print
                    .get(&task.id)
                    .map_or(true, |t| now.duration_since(*t) >= PROGRESS_INTERVAL);
                if !due {
                    continue;
                }
                last_print.insert(task.id.clone(), now);
                let eta = task
                    .estimated_seconds_remaining
                    .map(|s| format!("{}s", s))
                    .unwrap_or_else(|| "?".to_string());
                println!(
                    "  {} / {} ({:.1}%)  {}/s  ETA {}  {}",
                    format_bytes(task.downloaded_bytes),
                    format_bytes(task.file_size),
                    task.progress_percent,
                    format_bytes(task.speed_bps),
                    eta,
                    name
                );
            }
            EventKind::Started => println!("Started   {}", name),
            EventKind::Completed => {
                last_print.remove(&task.id);
                println!("Completed {}", name);
            }
            EventKind::Retrying => {
                let reason = task.last_error.as_ref().map_or("", |e| e.message.as_str());
                println!("Retrying  {} (attempt {}): {}", name, task.retry_count, reason);
            }
            EventKind::Failed => {
                last_print.remove(&task.id);
                let reason = task.last_error.as_ref().map_or("", |e| e.message.as_str());
                println!("Failed    {}: {}", name, reason);
            }
            EventKind::Paused => println!("Paused    {}", name),
            EventKind::Cancelled => println!("Cancelled {}", name),
            _ => {}
        }
    }
}
