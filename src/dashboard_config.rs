// Dashboard Configuration Module
// Persistent backend connection settings

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// One gibibyte, the default storage quota shown in the usage summary
pub const DEFAULT_QUOTA_BYTES: u64 = 1024 * 1024 * 1024;

/// Backend connection settings
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct DashboardConfig {
    /// Appwrite API endpoint including the version prefix
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Appwrite project ID
    #[serde(default)]
    pub project_id: String,
    /// Storage bucket holding the dashboard's files
    #[serde(default)]
    pub bucket_id: String,
    /// Session secret of a signed-in user
    #[serde(default)]
    pub session_secret: Option<String>,
    /// Quota the usage summary is measured against
    #[serde(default = "default_quota")]
    pub quota_bytes: u64,
}

fn default_endpoint() -> String {
    "https://cloud.appwrite.io/v1".to_string()
}

fn default_quota() -> u64 {
    DEFAULT_QUOTA_BYTES
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            project_id: String::new(),
            bucket_id: String::new(),
            session_secret: None,
            quota_bytes: DEFAULT_QUOTA_BYTES,
        }
    }
}

impl std::fmt::Debug for DashboardConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardConfig")
            .field("endpoint", &self.endpoint)
            .field("project_id", &self.project_id)
            .field("bucket_id", &self.bucket_id)
            .field("session_secret", &self.session_secret.as_ref().map(|_| "***"))
            .field("quota_bytes", &self.quota_bytes)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing configuration value: {0}")]
    Missing(&'static str),

    #[error("Invalid configuration value for {key}: {value}")]
    Invalid { key: &'static str, value: String },

    #[error("Failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

impl DashboardConfig {
    /// Apply `BUCKETDECK_*` environment overrides
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("BUCKETDECK_ENDPOINT") {
            self.endpoint = v;
        }
        if let Some(v) = lookup("BUCKETDECK_PROJECT") {
            self.project_id = v;
        }
        if let Some(v) = lookup("BUCKETDECK_BUCKET") {
            self.bucket_id = v;
        }
        if let Some(v) = lookup("BUCKETDECK_SESSION") {
            self.session_secret = Some(v);
        }
        if let Some(v) = lookup("BUCKETDECK_QUOTA_BYTES") {
            self.quota_bytes = v
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid { key: "BUCKETDECK_QUOTA_BYTES", value: v })?;
        }
        Ok(())
    }

    /// Check the values every backend call depends on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::Missing("endpoint"));
        }
        if self.project_id.trim().is_empty() {
            return Err(ConfigError::Missing("project_id"));
        }
        if self.bucket_id.trim().is_empty() {
            return Err(ConfigError::Missing("bucket_id"));
        }
        if self.quota_bytes == 0 {
            return Err(ConfigError::Invalid { key: "quota_bytes", value: "0".to_string() });
        }
        Ok(())
    }
}

/// Get the path to the config file
pub fn config_path() -> PathBuf {
    let config_dir = dirs::config_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")));
    config_dir.join("bucketdeck").join("config.json")
}

/// Load configuration from the default location, then apply env overrides
pub fn load_config() -> Result<DashboardConfig, ConfigError> {
    let mut config = load_config_from(&config_path());
    config.apply_env()?;
    Ok(config)
}

/// Load configuration from disk, falling back to defaults when absent or unreadable
pub fn load_config_from(path: &Path) -> DashboardConfig {
    if path.exists() {
        match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to parse dashboard config: {}", e);
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read dashboard config: {}", e);
            }
        }
    }

    DashboardConfig::default()
}

/// Save configuration to disk
pub fn save_config(config: &DashboardConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let content = serde_json::to_string_pretty(config)?;
    fs::write(path, content)?;

    tracing::info!("Dashboard config saved to {:?}", path);
    Ok(())
}

/// Drop the stored session secret, leaving every other setting alone.
/// Returns whether a secret was present.
pub fn clear_session_secret(path: &Path) -> Result<bool, ConfigError> {
    let mut config = load_config_from(path);
    if config.session_secret.take().is_none() {
        return Ok(false);
    }
    save_config(&config, path)?;
    tracing::info!("Session secret removed from {:?}", path);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = DashboardConfig::default();
        assert_eq!(config.endpoint, "https://cloud.appwrite.io/v1");
        assert_eq!(config.quota_bytes, DEFAULT_QUOTA_BYTES);
        assert!(config.session_secret.is_none());
        assert!(matches!(config.validate(), Err(ConfigError::Missing("project_id"))));
    }

    #[test]
    fn test_save_and_load_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = DashboardConfig {
            project_id: "proj".to_string(),
            bucket_id: "files".to_string(),
            session_secret: Some("secret".to_string()),
            ..Default::default()
        };

        save_config(&config, &path).unwrap();
        let loaded = load_config_from(&path);
        assert_eq!(loaded, config);
        assert!(loaded.validate().is_ok());
    }

    #[test]
    fn test_load_falls_back_on_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(load_config_from(&path), DashboardConfig::default());
        assert_eq!(load_config_from(&dir.path().join("missing.json")), DashboardConfig::default());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("BUCKETDECK_PROJECT", "p1"),
            ("BUCKETDECK_BUCKET", "b1"),
            ("BUCKETDECK_QUOTA_BYTES", "2048"),
        ]
        .into_iter()
        .collect();
        let mut config = DashboardConfig::default();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.project_id, "p1");
        assert_eq!(config.bucket_id, "b1");
        assert_eq!(config.quota_bytes, 2048);

        let bad = |k: &str| (k == "BUCKETDECK_QUOTA_BYTES").then(|| "lots".to_string());
        assert!(matches!(
            DashboardConfig::default().apply_overrides(bad),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_clear_session_secret_ignores_incomplete_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = DashboardConfig {
            project_id: "proj".to_string(),
            session_secret: Some("secret".to_string()),
            ..Default::default()
        };
        save_config(&config, &path).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Missing("bucket_id"))));

        assert!(clear_session_secret(&path).unwrap());
        let loaded = load_config_from(&path);
        assert!(loaded.session_secret.is_none());
        assert_eq!(loaded.project_id, "proj");
        assert!(!clear_session_secret(&path).unwrap());
    }

    #[test]
    fn test_debug_hides_secret() {
        let config = DashboardConfig { session_secret: Some("hunter2".to_string()), ..Default::default() };
        let printed = format!("{:?}", config);
        assert!(!printed.contains("hunter2"));
    }
}
