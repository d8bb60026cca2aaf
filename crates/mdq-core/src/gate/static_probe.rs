//! Settable probe for tests and hosts without platform detection.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use super::ConditionProbe;

#[derive(Debug)]
pub struct StaticProbe {
    reachable: AtomicBool,
    wifi: AtomicBool,
    free: AtomicU64,
}

impl Default for StaticProbe {
    /// Online, on Wi-Fi, unlimited storage.
    fn default() -> Self {
        Self::new(true, true, u64::MAX)
    }
}

impl StaticProbe {
    pub fn new(reachable: bool, wifi: bool, free_storage_bytes: u64) -> Self {
        Self {
            reachable: AtomicBool::new(reachable),
            wifi: AtomicBool::new(wifi),
            free: AtomicU64::new(free_storage_bytes),
        }
    }

    pub fn set_reachable(&self, v: bool) {
        self.reachable.store(v, Ordering::Relaxed);
    }

    pub fn set_wifi(&self, v: bool) {
        self.wifi.store(v, Ordering::Relaxed);
    }

    pub fn set_free_storage(&self, bytes: u64) {
        self.free.store(bytes, Ordering::Relaxed);
    }
}

impl ConditionProbe for StaticProbe {
    fn is_network_reachable(&self) -> bool {
        self.reachable.load(Ordering::Relaxed)
    }

    fn is_wifi(&self) -> bool {
        self.wifi.load(Ordering::Relaxed)
    }

    fn free_storage_bytes(&self, _dir: &Path) -> u64 {
        self.free.load(Ordering::Relaxed)
    }
}
