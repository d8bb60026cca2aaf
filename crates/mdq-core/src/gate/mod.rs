//! Admission conditions: network reachability, Wi-Fi-only policy, free storage.
//!
//! The gate is a synchronous, side-effect-free query. The scheduler consults it
//! before every admission; a refusal leaves queued tasks untouched.

mod static_probe;
mod system;

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::config::DownloadConfig;

pub use static_probe::StaticProbe;
pub use system::SystemProbe;

/// Platform probes the gate depends on. Calls must not block.
pub trait ConditionProbe: Send + Sync {
    fn is_network_reachable(&self) -> bool;
    fn is_wifi(&self) -> bool;
    /// Free bytes on the filesystem holding `dir`.
    fn free_storage_bytes(&self, dir: &Path) -> u64;
}

/// Outcome of one gate evaluation; the first failing check wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allowed,
    NoNetwork,
    NotWifi,
    LowStorage { free: u64, required: u64 },
}

impl GateDecision {
    pub fn is_allowed(self) -> bool {
        self == GateDecision::Allowed
    }
}

impl fmt::Display for GateDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateDecision::Allowed => write!(f, "allowed"),
            GateDecision::NoNetwork => write!(f, "network unreachable"),
            GateDecision::NotWifi => write!(f, "wifi-only and not on wifi"),
            GateDecision::LowStorage { free, required } => {
                write!(f, "low storage: {} bytes free, {} required", free, required)
            }
        }
    }
}

#[derive(Clone)]
pub struct ConditionGate {
    probe: Arc<dyn ConditionProbe>,
}

impl ConditionGate {
    pub fn new(probe: Arc<dyn ConditionProbe>) -> Self {
        Self { probe }
    }

    pub fn evaluate(&self, cfg: &DownloadConfig) -> GateDecision {
        if !self.probe.is_network_reachable() {
            return GateDecision::NoNetwork;
        }
        if cfg.wifi_only && !self.probe.is_wifi() {
            return GateDecision::NotWifi;
        }
        let free = self.free_storage_bytes(cfg);
        if free < cfg.min_free_storage_bytes {
            return GateDecision::LowStorage {
                free,
                required: cfg.min_free_storage_bytes,
            };
        }
        GateDecision::Allowed
    }

    pub fn can_admit(&self, cfg: &DownloadConfig) -> bool {
        self.evaluate(cfg).is_allowed()
    }

    pub fn free_storage_bytes(&self, cfg: &DownloadConfig) -> u64 {
        self.probe.free_storage_bytes(&cfg.download_directory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate(probe: &Arc<StaticProbe>) -> ConditionGate {
        ConditionGate::new(Arc::clone(probe) as Arc<dyn ConditionProbe>)
    }

    #[test]
    fn allowed_when_all_checks_pass() {
        let probe = Arc::new(StaticProbe::new(true, true, u64::MAX));
        assert!(gate(&probe).can_admit(&DownloadConfig::default()));
    }

    #[test]
    fn network_checked_first() {
        let probe = Arc::new(StaticProbe::new(false, false, 0));
        let cfg = DownloadConfig {
            wifi_only: true,
            ..DownloadConfig::default()
        };
        assert_eq!(gate(&probe).evaluate(&cfg), GateDecision::NoNetwork);
    }

    #[test]
    fn wifi_only_on_cellular_refused() {
        let probe = Arc::new(StaticProbe::new(true, false, u64::MAX));
        let mut cfg = DownloadConfig::default();
        assert!(gate(&probe).can_admit(&cfg));
        cfg.wifi_only = true;
        assert_eq!(gate(&probe).evaluate(&cfg), GateDecision::NotWifi);
        probe.set_wifi(true);
        assert!(gate(&probe).can_admit(&cfg));
    }

    #[test]
    fn low_storage_refused() {
        let probe = Arc::new(StaticProbe::new(true, true, 10));
        let cfg = DownloadConfig {
            min_free_storage_bytes: 11,
            ..DownloadConfig::default()
        };
        assert_eq!(
            gate(&probe).evaluate(&cfg),
            GateDecision::LowStorage {
                free: 10,
                required: 11
            }
        );
        probe.set_free_storage(11);
        assert!(gate(&probe).can_admit(&cfg));
    }
}
