use std::collections::BTreeMap;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize)]
pub struct SupervisorConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub ports: PortRange,
    #[serde(default)]
    pub admission: AdmissionConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    /// Plugin id to container image reference.
    #[serde(default = "default_plugins")]
    pub plugins: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub address: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

/// Ports handed to workers. The counter starts at `base`, so the first port
/// issued is `base + 1`; `max` is the last usable port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PortRange {
    pub base: u16,
    pub max: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdmissionConfig {
    pub max_workers: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Reported back to callers in every worker handle.
    pub tag: String,
    pub network: Option<String>,
    pub auto_remove: bool,
    pub start_timeout_secs: u64,
    pub stop_timeout_secs: u64,
    /// Time the runtime gives a worker between SIGTERM and SIGKILL.
    pub stop_grace_secs: u64,
    pub ping_timeout_ms: u64,
    pub settle_delay_ms: u64,
    pub orphans: OrphanPolicy,
    pub stop_workers_on_shutdown: bool,
}

/// What to do with managed containers found on startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrphanPolicy {
    #[default]
    Ignore,
    Stop,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            ports: PortRange::default(),
            admission: AdmissionConfig::default(),
            runtime: RuntimeConfig::default(),
            plugins: default_plugins(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".into(),
            port: 9092,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

impl Default for PortRange {
    fn default() -> Self {
        Self {
            base: 20000,
            max: 29999,
        }
    }
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self { max_workers: 64 }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tag: "docker".into(),
            network: None,
            auto_remove: true,
            start_timeout_secs: 60,
            stop_timeout_secs: 10,
            stop_grace_secs: 5,
            ping_timeout_ms: 2000,
            settle_delay_ms: 2000,
            orphans: OrphanPolicy::Ignore,
            stop_workers_on_shutdown: true,
        }
    }
}

fn default_plugins() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("add_numbers".to_string(), "java-plugin-add:latest".to_string()),
        (
            "multiply_numbers".to_string(),
            "java-plugin-multiply:latest".to_string(),
        ),
        (
            "subtract_numbers".to_string(),
            "python-plugin-subtract:latest".to_string(),
        ),
    ])
}
