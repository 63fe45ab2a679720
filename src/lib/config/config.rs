//! Supervisor configuration loading, validation and logging setup.

use std::{fs, path::Path, time::Duration};

use tracing_subscriber::{EnvFilter, fmt};

use super::types::{ConfigError, LoggingConfig, RuntimeConfig, SupervisorConfig};

impl SupervisorConfig {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config: SupervisorConfig = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ports.max <= self.ports.base {
            return Err(ConfigError::InvalidValue {
                field: "ports.max",
                reason: format!(
                    "must be greater than ports.base ({} <= {})",
                    self.ports.max, self.ports.base
                ),
            });
        }

        if self.admission.max_workers == 0 {
            return Err(ConfigError::InvalidValue {
                field: "admission.max_workers",
                reason: "must be at least 1".into(),
            });
        }

        let timeouts = [
            ("runtime.start_timeout_secs", self.runtime.start_timeout_secs),
            ("runtime.stop_timeout_secs", self.runtime.stop_timeout_secs),
            ("runtime.ping_timeout_ms", self.runtime.ping_timeout_ms),
        ];
        for (field, value) in timeouts {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: "timeout must be non-zero".into(),
                });
            }
        }

        if self.runtime.stop_grace_secs >= self.runtime.stop_timeout_secs {
            return Err(ConfigError::InvalidValue {
                field: "runtime.stop_grace_secs",
                reason: format!(
                    "must be shorter than runtime.stop_timeout_secs ({})",
                    self.runtime.stop_timeout_secs
                ),
            });
        }

        if self.plugins.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "plugins",
                reason: "at least one plugin image must be configured".into(),
            });
        }

        if let Some((id, _)) = self.plugins.iter().find(|(_, image)| image.trim().is_empty()) {
            return Err(ConfigError::InvalidValue {
                field: "plugins",
                reason: format!("plugin {id} has an empty image reference"),
            });
        }

        Ok(())
    }

    pub fn init_logging(&self) {
        self.logging.init();
    }
}

impl RuntimeConfig {
    pub fn start_timeout(&self) -> Duration {
        Duration::from_secs(self.start_timeout_secs)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl LoggingConfig {
    /// Install the global tracing subscriber. `RUST_LOG` wins over the
    /// configured level.
    pub fn init(&self) {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        match self.format.as_str() {
            "json" => {
                fmt().json().with_env_filter(filter).init();
            }
            _ => {
                fmt().with_env_filter(filter).init();
            }
        }
    }
}
