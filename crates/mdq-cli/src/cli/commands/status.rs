//! `mdq status` – show tasks and aggregate statistics.

use anyhow::{bail, Result};
use mdq_core::control::{ControlRequest, ControlResponse};
use mdq_core::model::{DownloadTask, TaskFilter, TaskStatus};
use mdq_core::DownloadConfig;

use super::{dispatch, format_bytes};

pub async fn run_status(cfg: &DownloadConfig, states: Vec<TaskStatus>) -> Result<()> {
    let filter = TaskFilter {
        statuses: states,
        ..TaskFilter::default()
    };
    let tasks = match dispatch(cfg, ControlRequest::List { filter }).await? {
        ControlResponse::Tasks { tasks } => tasks,
        ControlResponse::Error { message } => bail!(message),
        other => bail!("unexpected control response: {:?}", other),
    };

    if tasks.is_empty() {
        println!("No tasks.");
    } else {
        println!(
            "{:<36} {:<10} {:<7} {:>7} {:>11}  {}",
            "ID", "STATE", "PRIO", "DONE", "SIZE", "FILE"
        );
        for t in &tasks {
            println!(
                "{:<36} {:<10} {:<7} {:>6.1}% {:>11}  {}",
                t.id,
                state_label(t),
                t.priority.as_str(),
                t.progress_percent,
                size_label(t),
                t.file_path.display()
            );
            if let Some(err) = t.last_error.as_ref().filter(|_| t.status != TaskStatus::Completed) {
                println!("{:<36} last error: {}", "", err.message);
            }
        }
    }

    if let ControlResponse::Statistics { statistics: s } =
        dispatch(cfg, ControlRequest::Statistics).await?
    {
        println!(
            "\n{} task(s): {} active, {} queued, {} paused, {} completed, {} failed, {} cancelled",
            s.total, s.active, s.queued, s.paused, s.completed, s.failed, s.cancelled
        );
        println!(
            "{} of {} downloaded, {} free",
            format_bytes(s.downloaded_bytes),
            format_bytes(s.total_bytes),
            format_bytes(s.storage_available_bytes)
        );
    }
    Ok(())
}

fn state_label(t: &DownloadTask) -> String {
    match (t.status, t.retry_count) {
        (TaskStatus::Queued, n) if n > 0 => format!("retry {}", n),
        (status, _) => status.as_str().to_string(),
    }
}

fn size_label(t: &DownloadTask) -> String {
    if t.file_size == 0 {
        "-".to_string()
    } else {
        format_bytes(t.file_size)
    }
}
