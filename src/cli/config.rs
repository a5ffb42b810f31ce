//! Configuration loading
//!
//! Precedence: command-line flags and environment variables, then the JSON
//! config file, then defaults.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::args::StoreArgs;
use super::errors::{CliError, CliResult};
use crate::http_server::HttpServerConfig;

/// Configuration file structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Data directory
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Address the HTTP server binds
    #[serde(default = "default_host")]
    pub host: String,

    /// Port the HTTP server binds
    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origins; empty allows any origin
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("episodes.db")
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8100
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            CliError::config_error(format!("Failed to read config {}: {}", path.display(), e))
        })?;

        let config: Config = serde_json::from_str(&content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Builds the effective configuration for one command.
    pub fn resolve(store: &StoreArgs, host: Option<String>, port: Option<u16>) -> CliResult<Self> {
        let mut config = match &store.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };

        if let Some(dir) = &store.db_path {
            config.data_dir = dir.clone();
        }
        if let Some(host) = host {
            config.host = host;
        }
        if let Some(port) = port {
            config.port = port;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> CliResult<()> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(CliError::config_error("data_dir must not be empty"));
        }
        if self.host.trim().is_empty() {
            return Err(CliError::config_error("host must not be empty"));
        }
        if self.port == 0 {
            return Err(CliError::config_error("port must be > 0"));
        }
        Ok(())
    }

    pub fn http_config(&self) -> HttpServerConfig {
        HttpServerConfig {
            host: self.host.clone(),
            port: self.port,
            cors_origins: self.cors_origins.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_config(temp: &TempDir, value: serde_json::Value) -> PathBuf {
        let path = temp.path().join("ledger.json");
        fs::write(&path, value.to_string()).unwrap();
        path
    }

    #[test]
    fn test_config_defaults() {
        let temp = TempDir::new().unwrap();
        let path = write_config(&temp, json!({}));

        let config = Config::load(&path).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.data_dir, PathBuf::from("episodes.db"));
        assert_eq!(config.port, 8100);
    }

    #[test]
    fn test_config_rejects_zero_port() {
        let temp = TempDir::new().unwrap();
        let path = write_config(&temp, json!({ "port": 0 }));
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_flags_override_file() {
        let temp = TempDir::new().unwrap();
        let path = write_config(
            &temp,
            json!({ "data_dir": "/var/lib/ledger", "port": 9001, "cors_origins": ["http://a.test"] }),
        );
        let store = StoreArgs {
            db_path: Some(PathBuf::from("/tmp/other")),
            config: Some(path),
        };

        let config = Config::resolve(&store, None, Some(9100)).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/other"));
        assert_eq!(config.port, 9100);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.http_config().cors_origins, vec!["http://a.test".to_string()]);
    }

    #[test]
    fn test_missing_config_file_is_config_error() {
        let store = StoreArgs {
            db_path: None,
            config: Some(PathBuf::from("/nonexistent/ledger.json")),
        };
        let err = Config::resolve(&store, None, None).unwrap_err();
        assert_eq!(err.code_str(), "LEDGER_CLI_CONFIG_ERROR");
    }
}
