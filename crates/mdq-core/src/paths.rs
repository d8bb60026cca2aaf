//! XDG locations for state files (`~/.local/state/mdq/` on Debian).

use anyhow::Result;
use std::path::PathBuf;

/// Directory holding the task database, log file and control socket.
pub fn state_dir() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("mdq")?;
    Ok(xdg_dirs.get_state_home())
}

/// Default path of the SQLite task store.
pub fn default_store_path() -> Result<PathBuf> {
    Ok(state_dir()?.join("tasks.db"))
}

/// Default path of the control socket used while `mdq run` is active.
pub fn default_control_socket_path() -> Result<PathBuf> {
    Ok(state_dir()?.join("control.sock"))
}
