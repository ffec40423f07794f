//! Centralized path resolution for primer
//!
//! # Environment Variables
//!
//! - `PRIMER_CONFIG_DIR` - Override config directory
//! - `PRIMER_STATE_DIR` - Override state directory
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `PRIMER_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/primer` (if set)
//! 3. `~/.config/primer`
//!
//! For state_dir():
//! 1. `PRIMER_STATE_DIR` environment variable
//! 2. `XDG_STATE_HOME/primer` (if set)
//! 3. `~/.local/state/primer`

use anyhow::{Context, Result};
use std::ffi::{CStr, CString};
use std::path::{Path, PathBuf};

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "PRIMER_CONFIG_DIR";

/// Environment variable for state directory override
pub const ENV_STATE_DIR: &str = "PRIMER_STATE_DIR";

const APP_DIR: &str = "primer";

/// Get the primer config directory path
pub fn config_dir() -> Result<PathBuf> {
    resolve(
        std::env::var(ENV_CONFIG_DIR).ok(),
        std::env::var("XDG_CONFIG_HOME").ok(),
        dirs::home_dir(),
        &[".config"],
    )
}

/// Get the primer state directory path
pub fn state_dir() -> Result<PathBuf> {
    resolve(
        std::env::var(ENV_STATE_DIR).ok(),
        std::env::var("XDG_STATE_HOME").ok(),
        dirs::home_dir(),
        &[".local", "state"],
    )
}

/// Pick a directory from an explicit override, an XDG base, or the home default
fn resolve(
    override_dir: Option<String>,
    xdg_base: Option<String>,
    home: Option<PathBuf>,
    home_default: &[&str],
) -> Result<PathBuf> {
    if let Some(dir) = override_dir.filter(|d| !d.is_empty()) {
        let path = expand(&dir);
        log::debug!("Using dir from environment override: {}", path.display());
        return Ok(path);
    }

    // Relative XDG paths are invalid per the basedir spec and are ignored
    if let Some(base) = xdg_base.filter(|b| Path::new(b).is_absolute()) {
        let path = PathBuf::from(base).join(APP_DIR);
        log::debug!("Using XDG dir: {}", path.display());
        return Ok(path);
    }

    let mut path = home.context("Could not determine home directory")?;
    path.extend(home_default);
    path.push(APP_DIR);
    log::debug!("Using default dir: {}", path.display());
    Ok(path)
}

/// Home directory of a local user, from the passwd database
///
/// Falls back to the current home when the user has no passwd entry.
pub fn home_of(user: &str) -> Result<PathBuf> {
    if let Some(home) = passwd_home(user) {
        return Ok(home);
    }
    log::warn!("No passwd entry for '{user}', using the current home directory");
    dirs::home_dir().context("Could not determine home directory")
}

fn passwd_home(user: &str) -> Option<PathBuf> {
    let name = CString::new(user).ok()?;
    // SAFETY: name is NUL-terminated; the returned record is copied out before
    // any other passwd call can overwrite it
    unsafe {
        let entry = libc::getpwnam(name.as_ptr());
        if entry.is_null() || (*entry).pw_dir.is_null() {
            return None;
        }
        let dir = CStr::from_ptr((*entry).pw_dir).to_string_lossy().into_owned();
        (!dir.is_empty()).then(|| PathBuf::from(dir))
    }
}

/// Expand `~` and environment variables in a path string.
///
/// ```ignore
/// let plugins = paths::expand("~/.zsh/plugins");
/// let rc = paths::expand("$HOME/.zshrc");
/// ```
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

// ============================================================================
// Tests
// ============================================================================
