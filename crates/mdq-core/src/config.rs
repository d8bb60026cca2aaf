use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::error::SchedulerError;

/// Global scheduler configuration loaded from `~/.config/mdq/config.toml`.
///
/// The live copy is also persisted in the task store under `config`, so runtime
/// changes made with `update_config` survive restarts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Maximum number of transfers running at once (at least 1).
    pub max_concurrent_downloads: usize,
    /// Retries allowed after the first failed attempt.
    pub max_retry_count: u32,
    /// Backoff before the first retry, in milliseconds. Doubles per retry.
    pub base_retry_delay_ms: u64,
    /// Directory for destinations derived from the URL.
    pub download_directory: PathBuf,
    /// Re-queue tasks that were active when the process stopped.
    pub auto_resume_on_startup: bool,
    /// Delete a task and its partial file once it ends in Failed.
    pub auto_delete_on_final_failure: bool,
    /// Optional total bandwidth cap in bytes per second, split across slots.
    pub speed_limit_bps: Option<u64>,
    /// Only admit new transfers on Wi-Fi.
    pub wifi_only: bool,
    /// Refuse admission when free storage drops below this many bytes.
    pub min_free_storage_bytes: u64,
    /// Fallback interval for re-checking admission conditions (0 = only on notification).
    pub condition_recheck_secs: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: 3,
            max_retry_count: 3,
            base_retry_delay_ms: 1000,
            download_directory: default_download_directory(),
            auto_resume_on_startup: true,
            auto_delete_on_final_failure: false,
            speed_limit_bps: None,
            wifi_only: false,
            min_free_storage_bytes: 100 * 1024 * 1024,
            condition_recheck_secs: 30,
        }
    }
}

impl DownloadConfig {
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.max_concurrent_downloads == 0 {
            return Err(SchedulerError::InvalidConfig(
                "max_concurrent_downloads must be at least 1".to_string(),
            ));
        }
        if self.speed_limit_bps == Some(0) {
            return Err(SchedulerError::InvalidConfig(
                "speed_limit_bps must be positive when set".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply a partial update, returning the merged config. Does not validate.
    pub fn merged(&self, patch: &DownloadConfigPatch) -> DownloadConfig {
        let mut out = self.clone();
        if let Some(v) = patch.max_concurrent_downloads {
            out.max_concurrent_downloads = v;
        }
        if let Some(v) = patch.max_retry_count {
            out.max_retry_count = v;
        }
        if let Some(v) = patch.base_retry_delay_ms {
            out.base_retry_delay_ms = v;
        }
        if let Some(ref v) = patch.download_directory {
            out.download_directory = v.clone();
        }
        if let Some(v) = patch.auto_resume_on_startup {
            out.auto_resume_on_startup = v;
        }
        if let Some(v) = patch.auto_delete_on_final_failure {
            out.auto_delete_on_final_failure = v;
        }
        if let Some(v) = patch.speed_limit_bps {
            out.speed_limit_bps = v;
        }
        if let Some(v) = patch.wifi_only {
            out.wifi_only = v;
        }
        if let Some(v) = patch.min_free_storage_bytes {
            out.min_free_storage_bytes = v;
        }
        if let Some(v) = patch.condition_recheck_secs {
            out.condition_recheck_secs = v;
        }
        out
    }

    /// Per-transfer speed cap: the total limit split evenly across slots.
    pub fn per_transfer_speed_limit(&self) -> Option<u64> {
        self.speed_limit_bps
            .map(|total| (total / self.max_concurrent_downloads.max(1) as u64).max(1))
    }
}

/// Partial update for `Scheduler::update_config`. `None` leaves a field unchanged.
///
/// `speed_limit_bps` is doubly optional: `Some(None)` clears the cap.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DownloadConfigPatch {
    #[serde(default)]
    pub max_concurrent_downloads: Option<usize>,
    #[serde(default)]
    pub max_retry_count: Option<u32>,
    #[serde(default)]
    pub base_retry_delay_ms: Option<u64>,
    #[serde(default)]
    pub download_directory: Option<PathBuf>,
    #[serde(default)]
    pub auto_resume_on_startup: Option<bool>,
    #[serde(default)]
    pub auto_delete_on_final_failure: Option<bool>,
    #[serde(
        default,
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub speed_limit_bps: Option<Option<u64>>,
    #[serde(default)]
    pub wifi_only: Option<bool>,
    #[serde(default)]
    pub min_free_storage_bytes: Option<u64>,
    #[serde(default)]
    pub condition_recheck_secs: Option<u64>,
}

impl DownloadConfigPatch {
    /// Build a patch from a `key=value` pair as typed on the command line.
    pub fn from_key_value(key: &str, value: &str) -> Result<Self> {
        let mut patch = Self::default();
        let value = value.trim();
        match key.trim() {
            "max_concurrent_downloads" => patch.max_concurrent_downloads = Some(value.parse()?),
            "max_retry_count" => patch.max_retry_count = Some(value.parse()?),
            "base_retry_delay_ms" => patch.base_retry_delay_ms = Some(value.parse()?),
            "download_directory" => patch.download_directory = Some(PathBuf::from(value)),
            "auto_resume_on_startup" => patch.auto_resume_on_startup = Some(value.parse()?),
            "auto_delete_on_final_failure" => {
                patch.auto_delete_on_final_failure = Some(value.parse()?)
            }
            "speed_limit_bps" => {
                patch.speed_limit_bps = Some(match value {
                    "" | "none" | "off" => None,
                    v => Some(v.parse()?),
                })
            }
            "wifi_only" => patch.wifi_only = Some(value.parse()?),
            "min_free_storage_bytes" => patch.min_free_storage_bytes = Some(value.parse()?),
            "condition_recheck_secs" => patch.condition_recheck_secs = Some(value.parse()?),
            other => anyhow::bail!("unknown config key: {}", other),
        }
        Ok(patch)
    }
}

/// A present field (even `null`) becomes `Some`; only an absent one stays `None`.
fn present_or_null<'de, D>(deserializer: D) -> Result<Option<Option<u64>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<u64>::deserialize(deserializer).map(Some)
}

fn default_download_directory() -> PathBuf {
    std::env::var_os("HOME")
        .map(|h| PathBuf::from(h).join("Downloads").join("mdq"))
        .unwrap_or_else(|| PathBuf::from("downloads"))
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("mdq")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<DownloadConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = DownloadConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: DownloadConfig = toml::from_str(&data)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = DownloadConfig::default();
        assert_eq!(cfg.max_concurrent_downloads, 3);
        assert_eq!(cfg.max_retry_count, 3);
        assert_eq!(cfg.base_retry_delay_ms, 1000);
        assert!(cfg.auto_resume_on_startup);
        assert!(!cfg.wifi_only);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = DownloadConfig {
            speed_limit_bps: Some(2_000_000),
            ..DownloadConfig::default()
        };
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: DownloadConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn config_toml_partial_file_uses_defaults() {
        let toml = r#"
            max_concurrent_downloads = 2
            wifi_only = true
        "#;
        let cfg: DownloadConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.max_concurrent_downloads, 2);
        assert!(cfg.wifi_only);
        assert_eq!(cfg.max_retry_count, 3);
        assert!(cfg.speed_limit_bps.is_none());
    }

    #[test]
    fn zero_slots_rejected() {
        let cfg = DownloadConfig {
            max_concurrent_downloads: 0,
            ..DownloadConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(SchedulerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn patch_merges_only_set_fields() {
        let cfg = DownloadConfig::default();
        let patch = DownloadConfigPatch {
            max_concurrent_downloads: Some(5),
            speed_limit_bps: Some(Some(1000)),
            ..DownloadConfigPatch::default()
        };
        let merged = cfg.merged(&patch);
        assert_eq!(merged.max_concurrent_downloads, 5);
        assert_eq!(merged.speed_limit_bps, Some(1000));
        assert_eq!(merged.max_retry_count, cfg.max_retry_count);

        let clear = DownloadConfigPatch {
            speed_limit_bps: Some(None),
            ..DownloadConfigPatch::default()
        };
        assert_eq!(merged.merged(&clear).speed_limit_bps, None);
    }

    #[test]
    fn patch_from_key_value() {
        let p = DownloadConfigPatch::from_key_value("wifi_only", "true").unwrap();
        assert_eq!(p.wifi_only, Some(true));
        let p = DownloadConfigPatch::from_key_value("speed_limit_bps", "none").unwrap();
        assert_eq!(p.speed_limit_bps, Some(None));
        assert!(DownloadConfigPatch::from_key_value("bogus", "1").is_err());
        assert!(DownloadConfigPatch::from_key_value("max_retry_count", "x").is_err());
    }

    #[test]
    fn patch_json_distinguishes_null_from_absent() {
        let clear: DownloadConfigPatch =
            serde_json::from_str(r#"{"speed_limit_bps": null}"#).unwrap();
        assert_eq!(clear.speed_limit_bps, Some(None));
        let untouched: DownloadConfigPatch = serde_json::from_str("{}").unwrap();
        assert_eq!(untouched.speed_limit_bps, None);
        let json = serde_json::to_string(&untouched).unwrap();
        let back: DownloadConfigPatch = serde_json::from_str(&json).unwrap();
        assert_eq!(back.speed_limit_bps, None);
        let json = serde_json::to_string(&clear).unwrap();
        let back: DownloadConfigPatch = serde_json::from_str(&json).unwrap();
        assert_eq!(back.speed_limit_bps, Some(None));
    }

    #[test]
    fn speed_limit_split_across_slots() {
        let cfg = DownloadConfig {
            max_concurrent_downloads: 4,
            speed_limit_bps: Some(4000),
            ..DownloadConfig::default()
        };
        assert_eq!(cfg.per_transfer_speed_limit(), Some(1000));
    }
}
