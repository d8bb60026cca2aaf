//! `mdq config show|set` – inspect or change the live configuration.

use anyhow::{bail, Result};
use mdq_core::control::{ControlRequest, ControlResponse};
use mdq_core::{DownloadConfig, DownloadConfigPatch};

use super::dispatch;

pub async fn run_config_show(cfg: &DownloadConfig) -> Result<()> {
    let config = expect_config(dispatch(cfg, ControlRequest::Config).await?)?;
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

pub async fn run_config_set(cfg: &DownloadConfig, key: &str, value: &str) -> Result<()> {
    let patch = DownloadConfigPatch::from_key_value(key, value)?;
    let config = expect_config(dispatch(cfg, ControlRequest::UpdateConfig { patch }).await?)?;
    tracing::info!(key, value, "config updated");
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn expect_config(response: ControlResponse) -> Result<DownloadConfig> {
    match response {
        ControlResponse::Config { config } => Ok(config),
        ControlResponse::Error { message } => bail!(message),
        other => bail!("unexpected control response: {:?}", other),
    }
}
