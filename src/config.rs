use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Fixed API prefix appended to the configured origin.
pub const API_PREFIX: &str = "/api/v1";

const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("config file not found: {0}")]
  NotFound(PathBuf),
  #[error(
    "no configuration file found. Create one at ~/.config/libiverse/config.yaml\n\
     See config.example.yaml for the format."
  )]
  NoConfigFile,
  #[error("failed to read config file {path}: {source}")]
  Read {
    path: PathBuf,
    source: std::io::Error,
  },
  #[error("failed to parse config file: {0}")]
  Parse(#[from] serde_yaml::Error),
  #[error("admin password not found. Set LIBIVERSE_PASSWORD environment variable.")]
  MissingPassword,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  /// Whether `login` should persist credentials to the remembered scope
  /// when the CLI is not given an explicit flag.
  #[serde(default)]
  pub remember_me: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Origin of the Libiverse backend, e.g. "https://admin.libiverse.example".
  /// The `/api/v1` prefix is appended by the client.
  pub base_url: String,
  /// Client-side timeout for every request, in seconds.
  #[serde(default = "default_timeout")]
  pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
  DEFAULT_TIMEOUT_SECS
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./libiverse.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/libiverse/config.yaml
  /// 4. ~/.config/libiverse/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(ConfigError::NotFound(p.to_path_buf()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(ConfigError::NoConfigFile),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("libiverse.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("libiverse").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
      path: path.to_path_buf(),
      source: e,
    })?;

    Self::from_yaml(&contents)
  }

  fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
    Ok(serde_yaml::from_str(contents)?)
  }

  /// Get the admin password from the environment.
  ///
  /// Secrets never live in the config file.
  pub fn get_password() -> Result<String, ConfigError> {
    std::env::var("LIBIVERSE_PASSWORD").map_err(|_| ConfigError::MissingPassword)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_minimal_config() {
    let config = Config::from_yaml("api:\n  base_url: https://admin.libiverse.example\n").unwrap();
    assert_eq!(config.api.base_url, "https://admin.libiverse.example");
    assert_eq!(config.api.timeout_secs, 10);
    assert!(!config.remember_me);
  }

  #[test]
  fn parses_overrides() {
    let yaml = "api:\n  base_url: http://localhost:8000\n  timeout_secs: 3\nremember_me: true\n";
    let config = Config::from_yaml(yaml).unwrap();
    assert_eq!(config.api.timeout_secs, 3);
    assert!(config.remember_me);
  }

  #[test]
  fn rejects_missing_base_url() {
    assert!(Config::from_yaml("api: {}\n").is_err());
  }
}
