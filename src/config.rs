use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::{mlog_debug, Error, Result};

/// Default number of retries after the first failed attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Default cap on coordinator loop iterations per run.
pub const DEFAULT_MAX_ITERATIONS: u32 = 50;

/// Default backoff between retry attempts, in milliseconds.
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 1000;

/// Tunables for one orchestration run.
///
/// Loaded from `~/.maestro/maestro.toml` when present; every field has a
/// default so a missing file or partial file works.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Retries allowed per subtask after the first failed attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Upper bound on coordinator loop iterations for a single run.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Fixed wait between retry attempts, in milliseconds.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_max_iterations() -> u32 {
    DEFAULT_MAX_ITERATIONS
}

fn default_retry_backoff_ms() -> u64 {
    DEFAULT_RETRY_BACKOFF_MS
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
        }
    }
}

impl OrchestratorConfig {
    pub fn maestro_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".maestro"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::maestro_dir()?.join("maestro.toml"))
    }

    /// The retry backoff as a `Duration`.
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        mlog_debug!("OrchestratorConfig::load path={}", path.display());
        if !path.exists() {
            mlog_debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(&path)?)?;
        mlog_debug!(
            "Config loaded: max_retries={}, max_iterations={}, retry_backoff_ms={}",
            config.max_retries,
            config.max_iterations,
            config.retry_backoff_ms
        );
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let maestro_dir = Self::maestro_dir()?;
        if !maestro_dir.exists() {
            fs::create_dir_all(&maestro_dir)?;
        }
        let path = Self::config_path()?;
        fs::write(&path, toml::to_string_pretty(self)?)?;
        mlog_debug!("Config saved to {}", path.display());
        Ok(())
    }

    pub fn ensure_dirs() -> Result<()> {
        let maestro_dir = Self::maestro_dir()?;
        if !maestro_dir.exists() {
            fs::create_dir_all(&maestro_dir)?;
        }
        Ok(())
    }
}
