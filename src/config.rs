//! Server configuration, read from `Quill.toml`.
//!
//! Every field has a default, so a missing file or a partial one is fine.
//! `PORT`, `QUILL_HOST` and `QUILL_DATABASE` override the file.

use std::{
    fmt::Display,
    io::ErrorKind,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

/// Default config file name.
pub const CONFIG_FILE: &str = "Quill.toml";

/// Errors raised while reading a config file.
#[derive(Debug, Error)]
pub enum FailToLoadConfig {
    /// The file could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not valid TOML for [`Config`]
    #[error("Invalid config: {0}")]
    InvalidConfig(#[from] toml::de::Error),
}

/// Complete configuration of a Quill server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP listener settings
    pub server: ServerConfig,
    /// Database settings
    pub storage: StorageConfig,
    /// Public listing settings
    pub listing: ListingConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind
    pub host: String,
    /// Port to bind
    pub port: u16,
    /// Largest accepted request body, in bytes
    pub body_limit: usize,
    /// Origins allowed by CORS, `*` allows any
    pub allowed_origins: Vec<String>,
}

/// Database settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path of the redb file
    pub path: PathBuf,
}

/// Page size settings for the public listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingConfig {
    /// Page size when none is requested
    pub default_page_size: usize,
    /// Largest page size a client may request
    pub max_page_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
            body_limit: 10 * 1024 * 1024,
            allowed_origins: vec!["*".to_string()],
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("quill.redb"),
        }
    }
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            default_page_size: 10,
            max_page_size: 100,
        }
    }
}

impl ListingConfig {
    /// Page size for a requested limit. Zero or absent means the default.
    #[must_use]
    pub fn page_size(&self, requested: Option<usize>) -> usize {
        requested
            .filter(|size| *size > 0)
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size.max(1))
    }
}

impl Config {
    /// Parse a config file.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, FailToLoadConfig> {
        let content = tokio::fs::read_to_string(path).await?;
        Ok(toml::from_str(&content)?)
    }

    /// Config file at `path` if present, defaults otherwise, then environment
    /// overrides.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, FailToLoadConfig> {
        let path = path.as_ref();
        let mut config = match Self::open(path).await {
            Ok(config) => config,
            Err(FailToLoadConfig::Io(err)) if err.kind() == ErrorKind::NotFound => {
                info!("{} not found, using defaults", path.display());
                Self::default()
            }
            Err(err) => return Err(err),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply `PORT`, `QUILL_HOST` and `QUILL_DATABASE` from `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(port) = parse_override(&lookup, "PORT") {
            self.server.port = port;
        }
        if let Some(host) = lookup("QUILL_HOST") {
            self.server.host = host;
        }
        if let Some(path) = lookup("QUILL_DATABASE") {
            self.storage.path = PathBuf::from(path);
        }
    }

    /// Render as TOML with every field spelled out.
    #[must_use]
    pub fn to_toml(&self) -> String {
        // Serialization for config never fail, so that we can use `expect` silently.
        toml::to_string_pretty(self).expect("Failed to serialize config to TOML")
    }

    /// Write the config to `path` as TOML.
    pub async fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        tokio::fs::write(path, self.to_toml()).await
    }
}

fn parse_override<T: FromStr>(lookup: impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T::Err: Display,
{
    let value = lookup(key)?;
    value
        .trim()
        .parse()
        .map_err(|err| warn!("Invalid {key} value `{value}`: {err}, ignoring"))
        .ok()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config: Config = toml::from_str("[server]\nport = 8080\n").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.listing, ListingConfig::default());
        assert_eq!(config.storage.path, PathBuf::from("quill.redb"));
    }

    #[test]
    fn defaults_survive_a_toml_round_trip() {
        let config = Config::default();
        let parsed: Config = toml::from_str(&config.to_toml()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn environment_overrides_file_values() {
        let env: HashMap<&str, &str> = [
            ("PORT", "4000"),
            ("QUILL_HOST", "0.0.0.0"),
            ("QUILL_DATABASE", "/var/lib/quill/db.redb"),
        ]
        .into();
        let mut config = Config::default();
        config.apply_overrides(|key| env.get(key).map(ToString::to_string));

        assert_eq!(config.server.port, 4000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.storage.path, PathBuf::from("/var/lib/quill/db.redb"));
    }

    #[test]
    fn invalid_port_override_is_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|key| (key == "PORT").then(|| "not-a-port".to_string()));
        assert_eq!(config.server.port, 3001);
    }

    #[test]
    fn page_size_falls_back_and_is_capped() {
        let listing = ListingConfig::default();
        assert_eq!(listing.page_size(None), 10);
        assert_eq!(listing.page_size(Some(0)), 10);
        assert_eq!(listing.page_size(Some(25)), 25);
        assert_eq!(listing.page_size(Some(1_000)), 100);
    }

    #[tokio::test]
    async fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path().join(CONFIG_FILE)).await.unwrap();
        assert_eq!(config.listing, ListingConfig::default());
    }

    #[tokio::test]
    async fn saved_file_is_opened_again() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        let mut config = Config::default();
        config.listing.default_page_size = 5;
        config.save(&path).await.unwrap();

        assert_eq!(Config::open(&path).await.unwrap(), config);
    }
}
