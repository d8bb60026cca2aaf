pub mod config;
pub mod control;
pub mod destination;
pub mod error;
pub mod events;
pub mod gate;
pub mod logging;
pub mod model;
pub mod paths;
pub mod queue;
pub mod retry;
pub mod scheduler;
pub mod stats;
pub mod store;
pub mod task_store;
pub mod transfer;

pub use config::{DownloadConfig, DownloadConfigPatch};
pub use error::SchedulerError;
pub use scheduler::Scheduler;
