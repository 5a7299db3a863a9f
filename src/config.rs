//! Daemon configuration.
//!
//! Read from a YAML file (`$DEPLOYWATCH_CONFIG`, or
//! `<config dir>/deploywatch/config.yaml`). The API key may also come from
//! `DEPLOYWATCH_API_KEY`, which wins over the file so containers can
//! inject it without mounting one.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use zeroize::Zeroizing;

use crate::api::{key_preview, DEFAULT_BASE_URL};
use crate::error::ConfigError;

pub const API_KEY_ENV: &str = "DEPLOYWATCH_API_KEY";
pub const CONFIG_PATH_ENV: &str = "DEPLOYWATCH_CONFIG";

pub const DEFAULT_UPDATE_EVERY_SECS: u64 = 60;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Where table queries get their data from. Fixed for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuerySource {
    /// Serve the last completed refresh. Never touches the network.
    #[default]
    Cache,
    /// Run a synchronous refresh per query, then serve and publish it.
    Live,
}

/// On-disk shape. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    api_key: Option<String>,
    base_url: Option<String>,
    update_every: Option<i64>,
    timeout: Option<i64>,
    parallelism: Option<usize>,
    query_source: Option<QuerySource>,
    socket_path: Option<PathBuf>,
}

pub struct Config {
    pub api_key: Zeroizing<String>,
    pub base_url: String,
    pub update_every: Duration,
    pub timeout: Duration,
    /// Max concurrent deployment fetches; `None` = one per model (capped).
    pub parallelism: Option<usize>,
    pub query_source: QuerySource,
    pub socket_path: PathBuf,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &key_preview(&self.api_key))
            .field("base_url", &self.base_url)
            .field("update_every", &self.update_every)
            .field("timeout", &self.timeout)
            .field("parallelism", &self.parallelism)
            .field("query_source", &self.query_source)
            .field("socket_path", &self.socket_path)
            .finish()
    }
}

impl Config {
    /// Load from the default location plus environment.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(default_config_path);
        Self::load_from(&path, std::env::var(API_KEY_ENV).ok())
    }

    /// Load from `path`. A missing file means "all defaults".
    pub fn load_from(path: &Path, env_api_key: Option<String>) -> Result<Self, ConfigError> {
        let file = match std::fs::read_to_string(path) {
            Ok(raw) => serde_yaml::from_str::<Option<FileConfig>>(&raw)
                .map_err(|source| ConfigError::Parse {
                    path: path.display().to_string(),
                    source,
                })?
                .unwrap_or_default(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => FileConfig::default(),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        Self::resolve(file, env_api_key, path)
    }

    fn resolve(file: FileConfig, env_api_key: Option<String>, path: &Path) -> Result<Self, ConfigError> {
        let api_key = env_api_key
            .filter(|k| !k.trim().is_empty())
            .or(file.api_key.filter(|k| !k.trim().is_empty()))
            .map(|k| Zeroizing::new(k.trim().to_string()))
            .ok_or_else(|| ConfigError::MissingApiKey(path.display().to_string()))?;

        Ok(Self {
            api_key,
            base_url: file.base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            update_every: positive_secs(file.update_every, DEFAULT_UPDATE_EVERY_SECS),
            timeout: positive_secs(file.timeout, DEFAULT_TIMEOUT_SECS),
            parallelism: file.parallelism.filter(|&p| p > 0),
            query_source: file.query_source.unwrap_or_default(),
            socket_path: file.socket_path.unwrap_or_else(default_socket_path),
        })
    }
}

/// Non-positive values fall back to the default.
fn positive_secs(value: Option<i64>, default: u64) -> Duration {
    match value {
        Some(v) if v > 0 => Duration::from_secs(v as u64),
        _ => Duration::from_secs(default),
    }
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("deploywatch")
        .join("config.yaml")
}

fn default_socket_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".deploywatch")
        .join("deploywatch.sock")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn test_full_file() {
        let (_dir, path) = write_config(
            "api_key: file-key-123456\n\
             base_url: https://inventory.internal/v1\n\
             update_every: 120\n\
             timeout: 10\n\
             parallelism: 8\n\
             query_source: live\n\
             socket_path: /tmp/dw.sock\n",
        );
        let config = Config::load_from(&path, None).unwrap();
        assert_eq!(config.api_key.as_str(), "file-key-123456");
        assert_eq!(config.base_url, "https://inventory.internal/v1");
        assert_eq!(config.update_every, Duration::from_secs(120));
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.parallelism, Some(8));
        assert_eq!(config.query_source, QuerySource::Live);
        assert_eq!(config.socket_path, PathBuf::from("/tmp/dw.sock"));
    }

    #[test]
    fn test_defaults_apply() {
        let (_dir, path) = write_config("api_key: k\n");
        let config = Config::load_from(&path, None).unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.update_every, Duration::from_secs(DEFAULT_UPDATE_EVERY_SECS));
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(config.parallelism, None);
        assert_eq!(config.query_source, QuerySource::Cache);
    }

    #[test]
    fn test_non_positive_values_fall_back() {
        let (_dir, path) = write_config("api_key: k\nupdate_every: 0\ntimeout: -5\nparallelism: 0\n");
        let config = Config::load_from(&path, None).unwrap();
        assert_eq!(config.update_every, Duration::from_secs(DEFAULT_UPDATE_EVERY_SECS));
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(config.parallelism, None);
    }

    #[test]
    fn test_env_key_wins_over_file() {
        let (_dir, path) = write_config("api_key: from-file\n");
        let config = Config::load_from(&path, Some("from-env".into())).unwrap();
        assert_eq!(config.api_key.as_str(), "from-env");
    }

    #[test]
    fn test_blank_env_key_is_ignored() {
        let (_dir, path) = write_config("api_key: from-file\n");
        let config = Config::load_from(&path, Some("   ".into())).unwrap();
        assert_eq!(config.api_key.as_str(), "from-file");
    }

    #[test]
    fn test_missing_key_is_fatal() {
        let (_dir, path) = write_config("update_every: 30\n");
        let err = Config::load_from(&path, None).unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey(_)));
    }

    #[test]
    fn test_missing_file_uses_env_key() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.yaml"), Some("env-key".into())).unwrap();
        assert_eq!(config.api_key.as_str(), "env-key");
    }

    #[test]
    fn test_empty_file_is_defaults() {
        let (_dir, path) = write_config("");
        let config = Config::load_from(&path, Some("env-key".into())).unwrap();
        assert_eq!(config.query_source, QuerySource::Cache);
    }

    #[test]
    fn test_invalid_yaml_is_reported() {
        let (_dir, path) = write_config("update_every: [not, a, number]\n");
        let err = Config::load_from(&path, Some("k".into())).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_debug_hides_api_key() {
        let (_dir, path) = write_config("api_key: supersecretvalue\n");
        let config = Config::load_from(&path, None).unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("supersecretvalue"));
        assert!(rendered.contains("supersec..."));
    }
}
