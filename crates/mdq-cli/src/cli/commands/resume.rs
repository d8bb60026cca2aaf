//! `mdq resume <id>` – put a paused or failed task back in the queue.

use anyhow::Result;
use mdq_core::control::ControlRequest;
use mdq_core::DownloadConfig;

use super::{dispatch, expect_task};

pub async fn run_resume(cfg: &DownloadConfig, id: String) -> Result<()> {
    let task = expect_task(dispatch(cfg, ControlRequest::Resume { id }).await?)?;
    println!("Resumed {} ({})", task.id, task.status.as_str());
    Ok(())
}
