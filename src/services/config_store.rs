// Configuration Storage Service
// Handles config file read/write and version backup

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use super::providers::ProviderKind;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
    pub proxy: Option<ProxyConfig>,
    #[serde(default)]
    pub history: HistoryConfig,
    /// Bearer token -> session subject id
    #[serde(default)]
    pub sessions: HashMap<String, String>,
    #[serde(default)]
    pub api_keys: HashMap<String, String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            server: ServerConfig::default(),
            inference: InferenceConfig::default(),
            proxy: None,
            history: HistoryConfig::default(),
            sessions: HashMap::new(),
            api_keys: HashMap::new(),
        }
    }
}

impl AppConfig {
    /// Proxy URL to route inference traffic through, if enabled.
    pub fn proxy_url(&self) -> Option<String> {
        self.proxy
            .as_ref()
            .filter(|p| p.enabled)
            .and_then(|p| p.https.clone().or_else(|| p.http.clone()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceConfig {
    #[serde(default)]
    pub provider: ProviderKind,
    pub base_url: Option<String>,
    #[serde(default = "default_text_model")]
    pub text_model: String,
    #[serde(default = "default_image_model")]
    pub image_model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            base_url: None,
            text_model: default_text_model(),
            image_model: default_image_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl InferenceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfig {
    pub enabled: bool,
    pub http: Option<String>,
    pub https: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// JSON-lines file; relative paths resolve against the config directory
    #[serde(default = "default_history_path")]
    pub path: PathBuf,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_history_path(),
        }
    }
}

fn default_version() -> String { "1.0.0".to_string() }
fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 3000 }
fn default_text_model() -> String { "gemini-pro".to_string() }
fn default_image_model() -> String { "gemini-pro-vision".to_string() }
fn default_timeout_secs() -> u64 { 60 }
fn default_true() -> bool { true }
fn default_history_path() -> PathBuf { PathBuf::from("detections.jsonl") }

pub struct ConfigStore {
    config_dir: PathBuf,
    config_file: PathBuf,
}

impl ConfigStore {
    pub fn new(config_dir: PathBuf) -> Self {
        let config_file = config_dir.join("config.json");
        Self { config_dir, config_file }
    }

    /// Get default config directory
    pub fn default_config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("neuroscope"))
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Resolve a possibly relative path against the config directory
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config_dir.join(path)
        }
    }

    /// Ensure config directory exists
    pub fn ensure_dir(&self) -> Result<(), ConfigError> {
        fs::create_dir_all(&self.config_dir).map_err(|source| ConfigError::Io {
            action: "create",
            path: self.config_dir.clone(),
            source,
        })
    }

    /// Load configuration from file
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        if !self.config_file.exists() {
            return Ok(AppConfig::default());
        }

        let content = fs::read_to_string(&self.config_file).map_err(|source| ConfigError::Io {
            action: "read",
            path: self.config_file.clone(),
            source,
        })?;

        Ok(serde_json::from_str(&content)?)
    }

    /// Save configuration to file
    pub fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
        self.ensure_dir()?;

        if self.config_file.exists() {
            self.create_backup()?;
        }

        let content = serde_json::to_string_pretty(config)?;

        fs::write(&self.config_file, content).map_err(|source| ConfigError::Io {
            action: "write",
            path: self.config_file.clone(),
            source,
        })
    }

    fn create_backup(&self) -> Result<(), ConfigError> {
        let backup_dir = self.config_dir.join("backups");
        fs::create_dir_all(&backup_dir).map_err(|source| ConfigError::Io {
            action: "create",
            path: backup_dir.clone(),
            source,
        })?;

        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S%3f");
        let backup_file = backup_dir.join(format!("config_{}.json", timestamp));

        fs::copy(&self.config_file, &backup_file).map_err(|source| ConfigError::Io {
            action: "back up",
            path: backup_file.clone(),
            source,
        })?;

        self.cleanup_old_backups(&backup_dir, 10)
    }

    /// Remove old backups, keeping only the most recent N
    fn cleanup_old_backups(&self, backup_dir: &Path, keep: usize) -> Result<(), ConfigError> {
        let mut entries: Vec<_> = fs::read_dir(backup_dir)
            .map_err(|source| ConfigError::Io {
                action: "read",
                path: backup_dir.to_path_buf(),
                source,
            })?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map_or(false, |ext| ext == "json"))
            .collect();

        if entries.len() <= keep {
            return Ok(());
        }

        // Timestamped names sort chronologically
        entries.sort_by_key(|e| e.file_name());

        for entry in entries.iter().take(entries.len() - keep) {
            let _ = fs::remove_file(entry.path());
        }

        Ok(())
    }

    /// Store provider API key in config file
    pub fn set_api_key(&self, provider: &str, key: &str) -> Result<(), ConfigError> {
        let mut config = self.load()?;
        config.api_keys.insert(provider.to_string(), key.to_string());
        self.save(&config)
    }

    /// Delete provider API key from config file
    pub fn delete_api_key(&self, provider: &str) -> Result<(), ConfigError> {
        let mut config = self.load()?;
        config.api_keys.remove(provider);
        self.save(&config)
    }
}
