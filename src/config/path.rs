//! Config file location.
//!
//! Resolves where the viewer config lives across platforms, with support for
//! a CLI override and an environment variable.

use std::path::PathBuf;
use std::sync::OnceLock;

use etcetera::base_strategy::{BaseStrategy, choose_base_strategy};

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "PTVIEW_CONFIG_PATH";

/// Override for the config path, set via --config
static CONFIG_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Set the config path override (called from the CLI --config flag)
pub fn set_config_path(path: PathBuf) {
    CONFIG_PATH.set(path).ok();
}

/// Whether the config path came from --config.
///
/// The environment variable does not count as explicit: it is commonly
/// pointed at files that don't exist yet.
pub fn is_config_path_explicit() -> bool {
    CONFIG_PATH.get().is_some()
}

/// Get the config file path.
///
/// Priority:
/// 1. CLI --config flag (set via `set_config_path`)
/// 2. PTVIEW_CONFIG_PATH environment variable
/// 3. Platform config directory (`~/.config/ptview/config.toml` on Linux and
///    macOS, `%APPDATA%\ptview\config.toml` on Windows)
pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = CONFIG_PATH.get() {
        return Some(path.clone());
    }

    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        return Some(PathBuf::from(path));
    }

    let strategy = choose_base_strategy().ok()?;
    Some(strategy.config_dir().join("ptview").join("config.toml"))
}
