//! `mdq cancel <id>` – cancel a task; optionally delete its file with --delete-file.

use anyhow::Result;
use mdq_core::control::ControlRequest;
use mdq_core::DownloadConfig;

use super::{dispatch, expect_task};

pub async fn run_cancel(cfg: &DownloadConfig, id: String, delete_file: bool) -> Result<()> {
    let task = expect_task(dispatch(cfg, ControlRequest::Cancel { id, delete_file }).await?)?;
    println!("Cancelled {} ({})", task.id, task.status.as_str());
    Ok(())
}
