//! CLI command handlers, one file per command.
//!
//! Every command except `run` goes through the control socket when `mdq run`
//! is active, and otherwise opens the task store directly.

mod add;
mod cancel;
mod config;
mod pause;
mod remove;
mod resume;
mod run;
mod status;

use anyhow::{bail, Result};
use mdq_core::control::{ControlRequest, ControlResponse};
use mdq_core::events::{EventPublisher, TracingSink};
use mdq_core::gate::SystemProbe;
use mdq_core::model::DownloadTask;
use mdq_core::paths;
use mdq_core::store::SqliteStore;
use mdq_core::transfer::CurlExecutor;
use mdq_core::{DownloadConfig, Scheduler};
use std::sync::Arc;

use crate::cli::control_socket;

pub use add::{run_add, AddArgs};
pub use cancel::run_cancel;
pub use config::{run_config_set, run_config_show};
pub use pause::run_pause;
pub use remove::run_remove;
pub use resume::run_resume;
pub use run::run_scheduler;
pub use status::run_status;

/// Open the default store and build a scheduler over it. Not started.
async fn open_scheduler(cfg: DownloadConfig, events: EventPublisher) -> Result<Scheduler> {
    let store = Arc::new(SqliteStore::open_default().await?);
    Scheduler::load(
        store,
        Arc::new(CurlExecutor::default()),
        Arc::new(SystemProbe::new()),
        events,
        cfg,
    )
    .await
}

/// Deliver `request` to the running scheduler, or apply it to the store directly.
async fn dispatch(cfg: &DownloadConfig, request: ControlRequest) -> Result<ControlResponse> {
    let socket = paths::default_control_socket_path()?;
    if let Some(response) = control_socket::send_request(&socket, &request).await? {
        return Ok(response);
    }
    tracing::debug!("no running scheduler; applying to the store directly");
    let events = EventPublisher::new().with_sink(Arc::new(TracingSink));
    let scheduler = open_scheduler(cfg.clone(), events).await?;
    let response = request.apply(&scheduler);
    scheduler.flush().await;
    Ok(response)
}

fn expect_task(response: ControlResponse) -> Result<DownloadTask> {
    match response {
        ControlResponse::Task { task } => Ok(task),
        ControlResponse::Error { message } => bail!(message),
        other => bail!("unexpected control response: {:?}", other),
    }
}

fn format_bytes(bytes: u64) -> String {
    const MIB: f64 = 1_048_576.0;
    if bytes >= 1_048_576 {
        format!("{:.1} MiB", bytes as f64 / MIB)
    } else if bytes >= 1024 {
        format!("{:.1} KiB", bytes as f64 / 1024.0)
    } else {
        format!("{} B", bytes)
    }
}
