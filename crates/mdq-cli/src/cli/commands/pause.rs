//! `mdq pause <id>` – pause a task. An active transfer stops and keeps its bytes.

use anyhow::Result;
use mdq_core::control::ControlRequest;
use mdq_core::DownloadConfig;

use super::{dispatch, expect_task};

pub async fn run_pause(cfg: &DownloadConfig, id: String) -> Result<()> {
    let task = expect_task(dispatch(cfg, ControlRequest::Pause { id }).await?)?;
    println!("Paused {} ({:.1}%)", task.id, task.progress_percent);
    Ok(())
}
