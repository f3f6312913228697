use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::sync::{PollIntervals, SyncOptions};

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
  pub backend: BackendConfig,
  pub polling: PollingConfig,
  /// Custom title for header (defaults to the backend host if not set)
  pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackendConfig {
  pub url: String,
  /// Per-request timeout, also applied to every fetch and mutation
  pub timeout_secs: u64,
}

impl Default for BackendConfig {
  fn default() -> Self {
    Self {
      url: DEFAULT_BACKEND_URL.to_string(),
      timeout_secs: 20,
    }
  }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct PollingConfig {
  /// Job and job list interval while a job is pending or running
  pub job_interval_ms: u64,
  pub health_interval_secs: u64,
  /// Retry delay for reference data whose fetch failed
  pub error_retry_secs: u64,
  /// UI tick; also how often landed fetches are applied
  pub tick_rate_ms: u64,
}

impl Default for PollingConfig {
  fn default() -> Self {
    Self {
      job_interval_ms: 2000,
      health_interval_secs: 30,
      error_retry_secs: 10,
      tick_rate_ms: 250,
    }
  }
}

impl PollingConfig {
  pub fn intervals(&self) -> PollIntervals {
    PollIntervals {
      job: Duration::from_millis(self.job_interval_ms.max(100)),
      health: Duration::from_secs(self.health_interval_secs.max(1)),
      error_retry: Duration::from_secs(self.error_retry_secs.max(1)),
    }
  }

  pub fn tick_rate(&self) -> Duration {
    Duration::from_millis(self.tick_rate_ms.clamp(16, 1000))
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./painboard.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/painboard/config.yaml
  ///
  /// Without any file the defaults are used, pointing at a local backend.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("painboard.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("painboard").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  pub fn sync_options(&self) -> SyncOptions {
    let timeout = Duration::from_secs(self.backend.timeout_secs.max(1));
    SyncOptions {
      intervals: self.polling.intervals(),
      fetch_timeout: timeout,
      mutation_timeout: timeout,
    }
  }

  /// Header title: configured, else the backend host
  pub fn display_title(&self) -> String {
    if let Some(title) = &self.title {
      return title.clone();
    }
    url::Url::parse(&self.backend.url)
      .ok()
      .and_then(|u| u.host_str().map(|h| format!("painboard @ {}", h)))
      .unwrap_or_else(|| "painboard".to_string())
  }
}
