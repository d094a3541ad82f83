use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::chain::{DesiredChain, Protocol};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/chainwarden/config.yaml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_timeout_secs")]
    pub command_timeout_secs: u64,
    #[serde(default)]
    pub log_level: Option<String>,
    #[serde(default)]
    pub backends: BackendsConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendsConfig {
    pub ipv4: Option<BackendOverride>,
    pub ipv6: Option<BackendOverride>,
    pub ethernet: Option<BackendOverride>,
}

impl BackendsConfig {
    pub fn get(&self, protocol: Protocol) -> Option<&BackendOverride> {
        match protocol {
            Protocol::IPv4 => self.ipv4.as_ref(),
            Protocol::IPv6 => self.ipv6.as_ref(),
            Protocol::Ethernet => self.ethernet.as_ref(),
        }
    }
}

/// Per-backend tool paths; unset fields keep the standard names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendOverride {
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub save_command: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_enabled() -> bool {
    true
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse chainwarden config YAML")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        Self::from_yaml(&content)
    }

    /// Reads `path` if it exists, otherwise falls back to defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::debug!("No config at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            command_timeout_secs: default_timeout_secs(),
            log_level: None,
            backends: BackendsConfig::default(),
        }
    }
}

/// Batch of desired chains, as read from a chains file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainManifest {
    #[serde(default)]
    pub chains: Vec<DesiredChain>,
}

impl ChainManifest {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse chain manifest YAML")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read chain manifest from {:?}", path))?;
        Self::from_yaml(&content)
    }
}
