// ⚙️ Configuration
// Optional TOML file (`EZMONEY_CONFIG`, else `ezmoney.toml` in the working
// directory), then overridden by `EZMONEY_ADDR`, `EZMONEY_DB`, `EZMONEY_MODEL`

use anyhow::{Context, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "EZMONEY_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "ezmoney.toml";

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_address")]
    pub address: SocketAddr,
}

fn default_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 5000))
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { address: default_address() }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StorageConfig {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("ezmoney.db")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { database_path: default_database_path() }
    }
}

/// Location of the pre-trained anomaly model artifact
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ModelConfig {
    #[serde(default = "default_artifact_path")]
    pub artifact_path: PathBuf,
}

fn default_artifact_path() -> PathBuf {
    PathBuf::from("models/anomaly_model.json")
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self { artifact_path: default_artifact_path() }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AnalyticsConfig {
    /// Queue each computed analytics result for the next batch save
    #[serde(default = "default_true")]
    pub buffer_results: bool,
}

fn default_true() -> bool {
    true
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self { buffer_results: true }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
}

impl Config {
    /// Load from the configured file (if any) and apply env overrides
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));

        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml(&content).with_context(|| format!("Invalid config file: {:?}", path))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config TOML")
    }

    /// Env lookups go through `lookup` so tests need not touch process env
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("EZMONEY_ADDR") {
            self.server.address = addr
                .parse()
                .with_context(|| format!("EZMONEY_ADDR is not a socket address: {}", addr))?;
        }
        if let Some(db) = lookup("EZMONEY_DB") {
            self.storage.database_path = PathBuf::from(db);
        }
        if let Some(model) = lookup("EZMONEY_MODEL") {
            self.model.artifact_path = PathBuf::from(model);
        }
        Ok(())
    }
}
