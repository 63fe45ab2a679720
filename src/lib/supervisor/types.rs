use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::lib::{
    config::types::RuntimeConfig,
    containers::{driver::ContainerDriver, types::ContainerError},
    plugins::types::{ImageResolver, UnknownPlugin},
    worker::types::{PortRangeExhausted, RegistryError, WorkerRecord, WorkerRegistry},
};

/// Owns the worker registry and brokers every allocation and release.
pub struct Supervisor {
    pub resolver: ImageResolver,
    pub registry: WorkerRegistry,
    pub driver: Arc<dyn ContainerDriver>,
    pub runtime: RuntimeConfig,
    /// Identifies this process on the containers it starts.
    pub instance_id: Uuid,
}

pub struct SupervisorServer {
    pub supervisor: Arc<Supervisor>,
    pub address: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginRef {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginRequest {
    pub plugin: PluginRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PluginState {
    Ready,
    Unknown,
    Unavailable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsurePluginResponse {
    pub state: PluginState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdmissionStatus {
    Admitted,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Admission {
    pub status: AdmissionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerHandle {
    pub worker_id: String,
    pub runtime_tag: String,
    pub port: u16,
    /// Unix seconds.
    pub not_before: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocateWorkerResponse {
    pub admission: Admission,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<WorkerHandle>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReleaseWorkerResponse {}

#[derive(Debug, Clone)]
pub enum ReleaseOutcome {
    Released(WorkerRecord),
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    Ok,
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Healthy,
    Unhealthy(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthCheck {
    pub name: &'static str,
    pub critical: bool,
    pub status: CheckStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub checks: Vec<HealthCheck>,
    pub live_workers: usize,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    #[error(transparent)]
    UnknownPlugin(#[from] UnknownPlugin),

    #[error("Worker capacity exceeded: {limit} workers already live")]
    CapacityExceeded { limit: usize },

    #[error("No worker port available: {0}")]
    PortRangeExhausted(PortRangeExhausted),

    #[error("Failed to start worker: {0}")]
    StartFailed(ContainerError),

    #[error("Failed to register worker: {0}")]
    Registry(RegistryError),
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

impl From<RegistryError> for AdmissionError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::CapacityExceeded { limit } => AdmissionError::CapacityExceeded { limit },
            RegistryError::Ports(ports) => AdmissionError::PortRangeExhausted(ports),
            other => AdmissionError::Registry(other),
        }
    }
}
