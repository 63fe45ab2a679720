use std::{collections::HashMap, time::SystemTime};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::lib::containers::types::ContainerHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkerState {
    Starting,
    Running,
    Releasing,
    Released,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRecord {
    pub worker_id: String,
    pub plugin_id: String,
    pub port: u16,
    pub container_handle: ContainerHandle,
    pub state: WorkerState,
    /// Earliest time the worker is expected to accept connections.
    pub not_before: Option<SystemTime>,
    pub started_at: Option<SystemTime>,
}

/// Monotonic port counter over `(base, max]`.
#[derive(Debug, Clone)]
pub struct PortAllocator {
    pub base: u16,
    pub max: u16,
    pub counter: u16,
}

/// Worker map and port counter. Both live behind one lock so that reserving
/// a port and registering the worker are atomic to other allocators.
pub struct WorkerRegistry {
    pub(crate) inner: Mutex<RegistryState>,
}

pub(crate) struct RegistryState {
    pub workers: HashMap<String, WorkerRecord>,
    /// Allocations whose container start is still in flight.
    pub reserved: HashMap<String, WorkerRecord>,
    pub ports: PortAllocator,
    pub max_workers: usize,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid worker state transition from {from:?} to {to:?}")]
pub struct InvalidTransition {
    pub from: WorkerState,
    pub to: WorkerState,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("port range {base}-{max} exhausted")]
pub struct PortRangeExhausted {
    pub base: u16,
    pub max: u16,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("worker capacity of {limit} reached")]
    CapacityExceeded { limit: usize },

    #[error(transparent)]
    Ports(#[from] PortRangeExhausted),

    #[error("worker {0} has no pending reservation")]
    NotReserved(String),

    #[error(transparent)]
    Transition(#[from] InvalidTransition),
}

impl WorkerState {
    /// `Starting` and `Running` workers hold their port and count against capacity.
    pub fn is_live(&self) -> bool {
        matches!(self, WorkerState::Starting | WorkerState::Running)
    }
}

/// Host resource usage reported next to the live worker count.
#[derive(Debug, Clone, Serialize)]
pub struct HostStats {
    pub host: HostInfo,
    pub cpu: Percent,
    pub memory: MemoryUsage,
    pub disk: Percent,
    pub live_workers: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct HostInfo {
    pub system_name: String,
    pub hostname: String,
    pub cpus: usize,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct MemoryUsage {
    pub total: Megabytes,
    pub used: Megabytes,
}

/// Serialized as `"12.50%"`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Percent(pub f32);

/// Serialized as `"512 MB"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Megabytes(pub u64);
