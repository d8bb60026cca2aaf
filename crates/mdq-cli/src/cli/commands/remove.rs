//! `mdq remove <id>` – forget a task; optionally delete its file with --delete-file.

use anyhow::Result;
use mdq_core::control::ControlRequest;
use mdq_core::DownloadConfig;

use super::{dispatch, expect_task};

pub async fn run_remove(cfg: &DownloadConfig, id: String, delete_file: bool) -> Result<()> {
    let task = expect_task(dispatch(cfg, ControlRequest::Delete { id, delete_file }).await?)?;
    if delete_file {
        println!("Removed {} and {}", task.id, task.file_path.display());
    } else {
        println!("Removed {}", task.id);
    }
    Ok(())
}
