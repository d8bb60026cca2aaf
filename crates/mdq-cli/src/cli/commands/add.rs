//! `mdq add <url>` – queue a download.

use anyhow::Result;
use mdq_core::control::ControlRequest;
use mdq_core::model::{DownloadRequest, Priority, Quality, TaskMetadata};
use mdq_core::DownloadConfig;
use std::path::PathBuf;

use super::{dispatch, expect_task};

/// Flags of `mdq add`, as parsed.
#[derive(Debug)]
pub struct AddArgs {
    pub url: String,
    pub source_id: Option<String>,
    pub output: Option<PathBuf>,
    pub priority: Priority,
    pub quality: Quality,
    pub size: Option<u64>,
    pub sha256: Option<String>,
    pub title: Option<String>,
}

impl AddArgs {
    pub fn into_request(self) -> DownloadRequest {
        DownloadRequest {
            source_id: self.source_id.unwrap_or_else(|| self.url.clone()),
            url: self.url,
            file_path: self.output,
            quality: self.quality,
            priority: self.priority,
            file_size: self.size,
            metadata: TaskMetadata {
                title: self.title,
                ..TaskMetadata::default()
            },
            expected_sha256: self.sha256,
        }
    }
}

pub async fn run_add(cfg: &DownloadConfig, request: DownloadRequest) -> Result<()> {
    let task = expect_task(dispatch(cfg, ControlRequest::Submit { request }).await?)?;
    println!(
        "Queued {} [{}] -> {}",
        task.id,
        task.priority.as_str(),
        task.file_path.display()
    );
    Ok(())
}
