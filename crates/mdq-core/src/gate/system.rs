//! Linux probe: interface state from sysfs, free space from statvfs.

use std::fs;
use std::path::{Path, PathBuf};

use super::ConditionProbe;

const SYS_CLASS_NET: &str = "/sys/class/net";

/// Reads `/sys/class/net/*` for link state and Wi-Fi, and `statvfs(3)` for free space.
#[derive(Debug, Clone)]
pub struct SystemProbe {
    net_root: PathBuf,
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self {
            net_root: PathBuf::from(SYS_CLASS_NET),
        }
    }
}

impl SystemProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Probe a different sysfs root (tests).
    pub fn with_net_root(root: impl Into<PathBuf>) -> Self {
        Self {
            net_root: root.into(),
        }
    }

    /// Non-loopback interfaces whose link is up.
    fn up_interfaces(&self) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(&self.net_root) else {
            return Vec::new();
        };
        entries
            .flatten()
            .filter(|e| e.file_name() != "lo")
            .map(|e| e.path())
            .filter(|p| interface_is_up(p))
            .collect()
    }
}

fn interface_is_up(iface: &Path) -> bool {
    let operstate = fs::read_to_string(iface.join("operstate")).unwrap_or_default();
    match operstate.trim() {
        "up" => true,
        // Point-to-point links (VPN, PPP) often report "unknown" while carrying traffic.
        "unknown" => fs::read_to_string(iface.join("carrier"))
            .map(|c| c.trim() == "1")
            .unwrap_or(false),
        _ => false,
    }
}

impl ConditionProbe for SystemProbe {
    fn is_network_reachable(&self) -> bool {
        !self.up_interfaces().is_empty()
    }

    fn is_wifi(&self) -> bool {
        self.up_interfaces()
            .iter()
            .any(|p| p.join("wireless").exists() || p.join("phy80211").exists())
    }

    fn free_storage_bytes(&self, dir: &Path) -> u64 {
        // The download directory may not exist yet; measure its nearest existing ancestor.
        let existing = dir.ancestors().find(|p| p.exists()).unwrap_or(Path::new("/"));
        statvfs_free(existing).unwrap_or_else(|| {
            tracing::debug!(path = %existing.display(), "statvfs failed; treating storage as unlimited");
            u64::MAX
        })
    }
}

#[cfg(unix)]
fn statvfs_free(path: &Path) -> Option<u64> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes()).ok()?;
    let mut st: libc::statvfs = unsafe { std::mem::zeroed() };
    let r = unsafe { libc::statvfs(c_path.as_ptr(), &mut st) };
    if r != 0 {
        return None;
    }
    Some((st.f_bavail as u64).saturating_mul(st.f_frsize as u64))
}

#[cfg(not(unix))]
fn statvfs_free(_path: &Path) -> Option<u64> {
    None
}
