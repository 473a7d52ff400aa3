//! Configuration for lantern hosts.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $LANTERN_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/lantern/config.toml
//!   3. ~/.config/lantern/config.toml
//!
//! The discovery engine itself consumes a [`DiscoveryConfig`] by value
//! and never touches files or environment; loading is the host
//! application's job.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::signature::AppIdentity;
use crate::wire::DEFAULT_DISCOVERY_PORT;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub network: NetworkConfig,
    pub identity: AppIdentity,
    /// Free-form label advertised under the reserved "Map" key.
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// UDP port the advertiser binds. All peers must agree on it.
    pub discovery_port: u16,
    /// The service port advertised in responses. This is the port peers
    /// connect to after discovery, not a port this subsystem binds.
    pub advertised_port: u16,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            identity: AppIdentity::default(),
            label: String::new(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            discovery_port: DEFAULT_DISCOVERY_PORT,
            advertised_port: 7777,
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_or_tmp().join(".config"))
        .join("lantern")
}

fn home_or_tmp() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl DiscoveryConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            DiscoveryConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("LANTERN_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&DiscoveryConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text)
                .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply LANTERN_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("LANTERN_NETWORK__DISCOVERY_PORT") {
            if let Ok(p) = v.parse() {
                self.network.discovery_port = p;
            }
        }
        if let Ok(v) = std::env::var("LANTERN_NETWORK__ADVERTISED_PORT") {
            if let Ok(p) = v.parse() {
                self.network.advertised_port = p;
            }
        }
        if let Ok(v) = std::env::var("LANTERN_LABEL") {
            self.label = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_well_known_port() {
        let config = DiscoveryConfig::default();
        assert_eq!(config.network.discovery_port, DEFAULT_DISCOVERY_PORT);
        assert_eq!(config.network.advertised_port, 7777);
        assert!(config.label.is_empty());
    }

    #[test]
    fn toml_round_trip() {
        let mut config = DiscoveryConfig::default();
        config.network.discovery_port = 28418;
        config.label = "Arena".to_string();

        let text = toml::to_string_pretty(&config).unwrap();
        let back: DiscoveryConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.network.discovery_port, 28418);
        assert_eq!(back.label, "Arena");
        assert_eq!(back.identity, config.identity);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let config: DiscoveryConfig = toml::from_str("label = \"Lobby\"").unwrap();
        assert_eq!(config.label, "Lobby");
        assert_eq!(config.network.discovery_port, DEFAULT_DISCOVERY_PORT);
    }

    // Single test for the whole load path: it owns the LANTERN_* env
    // vars, and splitting it up would race under the parallel runner.
    #[test]
    fn load_resolves_env_over_file_over_defaults() {
        let dir = std::env::temp_dir().join(format!("lantern-config-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::env::set_var("LANTERN_CONFIG", &path);

        assert_eq!(DiscoveryConfig::file_path(), path);

        let written = DiscoveryConfig::write_default_if_missing().unwrap();
        assert_eq!(written, path);
        let config = DiscoveryConfig::load().unwrap();
        assert_eq!(config.network.discovery_port, DEFAULT_DISCOVERY_PORT);

        std::fs::write(&path, "label = \"Arena\"\n\n[network]\ndiscovery_port = 28418\n").unwrap();
        std::env::set_var("LANTERN_LABEL", "Lobby");
        std::env::set_var("LANTERN_NETWORK__ADVERTISED_PORT", "9999");

        let config = DiscoveryConfig::load().unwrap();
        assert_eq!(config.label, "Lobby", "env beats file");
        assert_eq!(config.network.discovery_port, 28418, "file beats defaults");
        assert_eq!(config.network.advertised_port, 9999, "env beats defaults");

        std::env::remove_var("LANTERN_CONFIG");
        std::env::remove_var("LANTERN_LABEL");
        std::env::remove_var("LANTERN_NETWORK__ADVERTISED_PORT");
        let _ = std::fs::remove_dir_all(&dir);
    }
}
