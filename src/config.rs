//! # Host configuration
//!
//! Settings live in `<data_dir>/config.json`; a missing file means defaults.
//! The data directory itself comes from `--data-dir`, then the
//! `VIMIOTP_DATA_DIR` environment variable, then the platform data directory.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use vimi_otp::otp::core;
use vimi_otp::otp::types::{DEFAULT_DIGITS, DEFAULT_PERIOD};

pub const CONFIG_FILE: &str = "config.json";
pub const DATA_DIR_ENV: &str = "VIMIOTP_DATA_DIR";
const APP_DIR_NAME: &str = "vimiotp";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no data directory: pass --data-dir or set VIMIOTP_DATA_DIR")]
    NoDataDir,
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// User-tunable settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// TOTP period in seconds.
    pub period: u32,
    /// Code length, 6 to 8.
    pub digits: u8,
    /// Base log level (`error`, `warn`, `info`, `debug`, `trace`).
    pub log_level: String,
    /// Emit logs as JSON lines.
    pub log_json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            period: DEFAULT_PERIOD,
            digits: DEFAULT_DIGITS,
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

impl AppConfig {
    /// Load `config.json` from `data_dir`, falling back to defaults when the
    /// file does not exist.
    pub fn load(data_dir: &Path) -> Result<Self, ConfigError> {
        let path = data_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let config: AppConfig =
            serde_json::from_str(&text).map_err(|source| ConfigError::Parse { path, source })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        core::validate_period(self.period).map_err(|e| ConfigError::Invalid {
            field: "period",
            reason: e.message,
        })?;
        core::validate_digits(self.digits).map_err(|e| ConfigError::Invalid {
            field: "digits",
            reason: e.message,
        })?;
        Ok(())
    }
}

/// Pick the data directory: explicit flag, then environment, then platform default.
pub fn resolve_data_dir(flag: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
    resolve_data_dir_from(flag, std::env::var_os(DATA_DIR_ENV).map(PathBuf::from))
}

fn resolve_data_dir_from(flag: Option<PathBuf>, env: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
    if let Some(dir) = flag.or(env).filter(|p| !p.as_os_str().is_empty()) {
        return Ok(dir);
    }
    dirs::data_dir()
        .map(|d| d.join(APP_DIR_NAME))
        .ok_or(ConfigError::NoDataDir)
}
