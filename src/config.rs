//! Viewer configuration.
//!
//! An optional TOML file with kebab-case keys, every key optional:
//!
//! ```toml
//! poll-interval-ms = 100     # follow mode: pause when the trace has no new line
//! refresh-interval-ms = 100  # live display: trace time between redraws
//! speedup = 1.0              # real-time playback divisor
//! muted-color = 237          # 256-color index for non-highlighted transactions
//! reserved-colors = [4, 16, 17, 18]
//! min-bar-width = 20
//! ```
//!
//! Command-line flags override these values.

mod path;

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use path::{CONFIG_PATH_ENV, config_path, is_config_path_explicit, set_config_path};

use crate::trace::TraceError;
use crate::trace::color::{DEFAULT_MUTED, DEFAULT_RESERVED};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ViewerConfig {
    pub poll_interval_ms: u64,
    pub refresh_interval_ms: u64,
    pub speedup: f64,
    pub muted_color: u8,
    pub reserved_colors: Vec<u8>,
    pub min_bar_width: usize,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            refresh_interval_ms: 100,
            speedup: 1.0,
            muted_color: DEFAULT_MUTED,
            reserved_colors: DEFAULT_RESERVED.to_vec(),
            min_bar_width: 20,
        }
    }
}

impl ViewerConfig {
    /// Load from the resolved config location.
    ///
    /// A missing file gives defaults. A broken file is fatal when it was
    /// named with --config and otherwise warned about and ignored.
    pub fn load() -> Result<Self, TraceError> {
        let Some(path) = config_path() else {
            log::debug!("No config directory; using defaults");
            return Ok(Self::default());
        };
        match Self::load_from(&path) {
            Ok(config) => Ok(config),
            Err(err) if !is_config_path_explicit() => {
                log::warn!("Ignoring config: {err}");
                Ok(Self::default())
            }
            Err(err) => Err(err),
        }
    }

    /// Load `path`; a file that does not exist gives defaults.
    pub fn load_from(path: &Path) -> Result<Self, TraceError> {
        let invalid = |error: String| TraceError::InvalidConfig {
            path: path.to_path_buf(),
            error,
        };

        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No config at {}", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(invalid(e.to_string())),
        };

        let config: Self = toml::from_str(&contents).map_err(|e| invalid(e.to_string()))?;
        config.validate().map_err(invalid)?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        if !(self.speedup.is_finite() && self.speedup > 0.0) {
            return Err(format!("speedup must be positive, got {}", self.speedup));
        }
        if self.poll_interval_ms == 0 {
            return Err("poll-interval-ms must be at least 1".to_string());
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ViewerConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, ViewerConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let (_dir, path) = write_config("speedup = 4.0\nreserved-colors = [1, 2]\n");
        let config = ViewerConfig::load_from(&path).unwrap();

        assert_eq!(config.speedup, 4.0);
        assert_eq!(config.reserved_colors, vec![1, 2]);
        assert_eq!(config.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.muted_color, 237);
    }

    #[test]
    fn test_malformed_file_is_invalid() {
        let (_dir, path) = write_config("speedup = \"fast\"\n");
        let err = ViewerConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, TraceError::InvalidConfig { .. }), "{err:?}");
    }

    #[test]
    fn test_unknown_key_is_invalid() {
        let (_dir, path) = write_config("poll-interval = 5\n");
        assert!(ViewerConfig::load_from(&path).is_err());
    }

    #[test]
    fn test_non_positive_speedup_rejected() {
        let (_dir, path) = write_config("speedup = 0.0\n");
        let err = ViewerConfig::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("speedup must be positive"), "{err}");
    }

    #[test]
    fn test_default_round_trips_through_toml() {
        let text = toml::to_string(&ViewerConfig::default()).unwrap();
        assert!(text.contains("poll-interval-ms = 100"));
        assert_eq!(toml::from_str::<ViewerConfig>(&text).unwrap(), ViewerConfig::default());
    }
}
