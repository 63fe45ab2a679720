use std::{collections::HashMap, fmt, time::Duration};

use bollard::Docker;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Label carried by every container this supervisor starts.
pub const MANAGED_LABEL: &str = "runtime-supervisor.managed";
/// Label naming the supervisor process that started the container.
pub const INSTANCE_LABEL: &str = "runtime-supervisor.instance";

/// Everything the driver needs to start one worker container.
#[derive(Debug, Clone, Default)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub env: Vec<String>,
    pub labels: HashMap<String, String>,
    pub network: Option<String>,
    pub auto_remove: bool,
}

/// Opaque reference to a container instance (its name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerHandle(pub String);

/// A container found on the runtime carrying [`MANAGED_LABEL`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedContainer {
    pub handle: ContainerHandle,
    pub instance: Option<String>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContainerError {
    #[error("{reason}")]
    StartFailed { reason: String },

    #[error("{reason}")]
    StopFailed { reason: String },

    #[error("container runtime unavailable: {reason}")]
    Unavailable { reason: String },
}

pub struct DockerDriver {
    pub client: Docker,
    /// Seconds docker waits after SIGTERM before killing the container.
    pub stop_grace_secs: i64,
}

/// Wraps a driver so that no runtime call can block longer than its bound.
pub struct TimeoutDriver<D> {
    pub inner: D,
    pub start_timeout: Duration,
    pub stop_timeout: Duration,
    pub probe_timeout: Duration,
}

impl fmt::Display for ContainerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
