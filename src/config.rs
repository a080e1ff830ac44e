use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub remote: RemoteConfig,
  #[serde(default)]
  pub sync: SyncConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub budget: BudgetConfig,
  /// Local database location (defaults to $XDG_DATA_HOME/finsync/local.db)
  pub database_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
  /// Project URL, e.g. https://abc.supabase.co
  pub url: String,
  /// Path of the REST endpoint under the project URL
  #[serde(default = "default_schema_path")]
  pub schema_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
  /// Seconds between automatic drain attempts while online
  #[serde(default = "default_interval_secs")]
  pub interval_secs: u64,
  /// Drop a queued change after this many failed replays. Unset retries forever.
  #[serde(default)]
  pub max_attempts: Option<u32>,
}

impl Default for SyncConfig {
  fn default() -> Self {
    Self {
      interval_secs: default_interval_secs(),
      max_attempts: None,
    }
  }
}

impl SyncConfig {
  pub fn interval(&self) -> Duration {
    Duration::from_secs(self.interval_secs.max(1))
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Maximum number of cached datasets kept in local storage
  #[serde(default = "default_max_entries")]
  pub max_entries: usize,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      max_entries: default_max_entries(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BudgetConfig {
  /// Percentage of a budget at which alerts start
  #[serde(default = "default_threshold_percent")]
  pub threshold_percent: f64,
}

impl Default for BudgetConfig {
  fn default() -> Self {
    Self {
      threshold_percent: default_threshold_percent(),
    }
  }
}

fn default_schema_path() -> String {
  "rest/v1".to_string()
}

fn default_interval_secs() -> u64 {
  30
}

fn default_max_entries() -> usize {
  64
}

fn default_threshold_percent() -> f64 {
  80.0
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./finsync.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/finsync/config.yaml
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
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/finsync/config.yaml\n\
                 It needs at least:\n  remote:\n    url: https://<project>.supabase.co"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("finsync.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("finsync").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn from_yaml(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents).map_err(|e| eyre!("{}", e))?;
    Ok(config)
  }

  /// Directory for the local database and logs.
  pub fn data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("finsync"))
  }

  pub fn database_path(&self) -> Result<PathBuf> {
    match &self.database_path {
      Some(p) => Ok(p.clone()),
      None => Ok(Self::data_dir()?.join("local.db")),
    }
  }

  /// Get the project API key from environment variables.
  ///
  /// Checks FINSYNC_API_KEY first, then SUPABASE_ANON_KEY as fallback.
  pub fn get_api_key() -> Result<String> {
    std::env::var("FINSYNC_API_KEY")
      .or_else(|_| std::env::var("SUPABASE_ANON_KEY"))
      .map_err(|_| {
        eyre!("API key not found. Set FINSYNC_API_KEY or SUPABASE_ANON_KEY environment variable.")
      })
  }

  /// Get the signed-in user's access token, if one is set (FINSYNC_ACCESS_TOKEN).
  pub fn get_access_token() -> Option<String> {
    std::env::var("FINSYNC_ACCESS_TOKEN").ok()
  }
}
