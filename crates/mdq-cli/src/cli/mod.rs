//! CLI for the MDQ download scheduler.

mod commands;
mod control_socket;

use anyhow::Result;
use clap::{Parser, Subcommand};
use mdq_core::config;
use mdq_core::model::{Priority, Quality, TaskStatus};
use std::path::PathBuf;

use commands::{
    run_add, run_cancel, run_config_set, run_config_show, run_pause, run_remove, run_resume,
    run_scheduler, run_status,
};

/// Top-level CLI for the MDQ download scheduler.
#[derive(Debug, Parser)]
#[command(name = "mdq")]
#[command(about = "MDQ: prioritized media download queue", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Queue a new download.
    Add {
        /// Direct HTTP/HTTPS URL of the media file.
        url: String,

        /// Catalogue identifier of the media item (defaults to the URL).
        #[arg(long, value_name = "ID")]
        source_id: Option<String>,

        /// Destination file; relative paths land under the download directory.
        #[arg(long, short = 'o', value_name = "PATH")]
        output: Option<PathBuf>,

        /// Admission priority: low, normal, high or urgent.
        #[arg(long, default_value = "normal", value_parser = parse_snake::<Priority>)]
        priority: Priority,

        /// Requested quality: low, medium, high, full_hd or uhd.
        #[arg(long, default_value = "medium", value_parser = parse_snake::<Quality>)]
        quality: Quality,

        /// Expected size in bytes, if known.
        #[arg(long, value_name = "BYTES")]
        size: Option<u64>,

        /// Expected SHA-256 (hex) checked after the transfer.
        #[arg(long, value_name = "HEX")]
        sha256: Option<String>,

        /// Human-readable title stored with the task.
        #[arg(long)]
        title: Option<String>,
    },

    /// Run the scheduler until the queue drains (or forever with --watch).
    Run {
        /// Keep running after the queue is empty and accept new tasks over the control socket.
        #[arg(long)]
        watch: bool,
    },

    /// Show tasks and aggregate statistics.
    Status {
        /// Only show tasks in these states (repeatable).
        #[arg(long = "state", value_name = "STATE", value_parser = parse_snake::<TaskStatus>)]
        states: Vec<TaskStatus>,
    },

    /// Pause a queued or active task.
    Pause {
        /// Task identifier.
        id: String,
    },

    /// Resume a paused or failed task.
    Resume {
        /// Task identifier.
        id: String,
    },

    /// Cancel a task; it stays listed as cancelled.
    Cancel {
        /// Task identifier.
        id: String,

        /// Also delete the partially or fully downloaded file.
        #[arg(long)]
        delete_file: bool,
    },

    /// Remove a task from the queue entirely.
    Remove {
        /// Task identifier.
        id: String,

        /// Also delete the downloaded file.
        #[arg(long)]
        delete_file: bool,
    },

    /// Show or change the live scheduler configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the configuration in effect.
    Show,
    /// Change one setting, e.g. `mdq config set max_concurrent_downloads 3`.
    Set { key: String, value: String },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Add {
                url,
                source_id,
                output,
                priority,
                quality,
                size,
                sha256,
                title,
            } => {
                let request = commands::AddArgs {
                    url,
                    source_id,
                    output,
                    priority,
                    quality,
                    size,
                    sha256,
                    title,
                }
                .into_request();
                run_add(&cfg, request).await?
            }
            CliCommand::Run { watch } => run_scheduler(cfg, watch).await?,
            CliCommand::Status { states } => run_status(&cfg, states).await?,
            CliCommand::Pause { id } => run_pause(&cfg, id).await?,
            CliCommand::Resume { id } => run_resume(&cfg, id).await?,
            CliCommand::Cancel { id, delete_file } => run_cancel(&cfg, id, delete_file).await?,
            CliCommand::Remove { id, delete_file } => run_remove(&cfg, id, delete_file).await?,
            CliCommand::Config { action } => match action {
                ConfigAction::Show => run_config_show(&cfg).await?,
                ConfigAction::Set { key, value } => run_config_set(&cfg, &key, &value).await?,
            },
        }

        Ok(())
    }
}

/// Parse a snake_case enum name the same way the store and control socket spell it.
fn parse_snake<T: serde::de::DeserializeOwned>(s: &str) -> Result<T, String> {
    serde_json::from_value(serde_json::Value::String(s.to_ascii_lowercase()))
        .map_err(|_| format!("unrecognized value: {}", s))
}

#[cfg(test)]
mod tests;
