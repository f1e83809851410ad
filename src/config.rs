//! Exporter configuration
//!
//! Provides configuration management with:
//! - Runtime defaults matching the container layout (`/data/claude`)
//! - Optional TOML config file
//! - Environment variable overrides with silent fallback on bad values

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use tracing::debug;

#[cfg(feature = "basic")]
use anyhow::Context;
#[cfg(feature = "basic")]
use std::{fs, path::Path};

pub const DEFAULT_STATS_FILE: &str = "/data/claude/stats-cache.json";
pub const DEFAULT_CLAUDE_DIR: &str = "/data/claude";
pub const DEFAULT_PORT: u16 = 9101;

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where the stats cache and session logs live
    pub sources: SourcesConfig,

    /// HTTP surface
    pub server: ServerConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub stats_file: PathBuf,
    pub claude_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sources: SourcesConfig::default(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            stats_file: PathBuf::from(DEFAULT_STATS_FILE),
            claude_dir: PathBuf::from(DEFAULT_CLAUDE_DIR),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: DEFAULT_PORT }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from defaults, an optional config file, then the environment.
    ///
    /// Only an unreadable or invalid config file is an error.
    pub fn load() -> Result<Self> {
        let mut config = match Self::find_config_file() {
            #[cfg(feature = "basic")]
            Some(path) => Self::load_from_file(&path)?,
            _ => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// The first existing config file, in lookup order.
    #[cfg(feature = "basic")]
    pub fn find_config_file() -> Option<PathBuf> {
        let config_paths = [
            Some(PathBuf::from("claude-usage-exporter.toml")),
            Some(PathBuf::from(".claude-usage-exporter.toml")),
            dirs::config_dir().map(|d| d.join("claude-usage-exporter").join("config.toml")),
        ];

        config_paths.into_iter().flatten().find(|path| path.exists())
    }

    #[cfg(not(feature = "basic"))]
    pub fn find_config_file() -> Option<PathBuf> {
        None
    }

    /// Load configuration from TOML file
    #[cfg(feature = "basic")]
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// Empty values and ports that do not parse leave the current value in place.
    pub fn apply_env_overrides(&mut self) {
        if let Some(val) = non_empty_var("CLAUDE_STATS_FILE") {
            self.sources.stats_file = PathBuf::from(val);
        }
        if let Some(val) = non_empty_var("CLAUDE_DIR") {
            self.sources.claude_dir = PathBuf::from(val);
        }
        if let Some(val) = non_empty_var("EXPORTER_PORT") {
            match val.trim().parse() {
                Ok(port) => self.server.port = port,
                Err(_) => debug!(value = %val, "Ignoring invalid EXPORTER_PORT"),
            }
        }

        if let Some(val) = non_empty_var("LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Some(val) = non_empty_var("LOG_FORMAT") {
            self.logging.format = val;
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|val| !val.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.sources.stats_file, PathBuf::from(DEFAULT_STATS_FILE));
        assert_eq!(config.sources.claude_dir, PathBuf::from(DEFAULT_CLAUDE_DIR));
        assert_eq!(config.server.port, 9101);
        assert_eq!(config.logging.level, "info");
    }

    #[cfg(feature = "basic")]
    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str("[server]\nport = 9200\n").unwrap();
        assert_eq!(config.server.port, 9200);
        assert_eq!(config.sources, SourcesConfig::default());
        assert_eq!(config.logging, LoggingConfig::default());
    }
}
