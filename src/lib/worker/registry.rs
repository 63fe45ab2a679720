use std::{collections::HashMap, time::{Duration, SystemTime}};

use tokio::sync::Mutex;

use super::types::{
    PortAllocator, RegistryError, RegistryState, WorkerRecord, WorkerRegistry, WorkerState,
};
use crate::lib::{config::types::PortRange, containers::types::ContainerHandle};

impl RegistryState {
    fn live_count(&self) -> usize {
        let running = self.workers.values().filter(|w| w.state.is_live()).count();
        running + self.reserved.len()
    }
}

impl WorkerRegistry {
    pub fn new(ports: PortRange, max_workers: usize) -> Self {
        WorkerRegistry {
            inner: Mutex::new(RegistryState {
                workers: HashMap::new(),
                reserved: HashMap::new(),
                ports: PortAllocator::new(ports),
                max_workers,
            }),
        }
    }

    /// Check capacity, take a port and derive the worker id in one critical
    /// section. The returned record is `Starting` and invisible to `get`.
    pub async fn reserve(&self, plugin_id: &str) -> Result<WorkerRecord, RegistryError> {
        let mut state = self.inner.lock().await;

        if state.live_count() >= state.max_workers {
            return Err(RegistryError::CapacityExceeded {
                limit: state.max_workers,
            });
        }

        let port = state.ports.next()?;
        let worker_id = format!("worker-{port}");
        let record = WorkerRecord {
            worker_id: worker_id.clone(),
            plugin_id: plugin_id.to_string(),
            port,
            container_handle: ContainerHandle(worker_id.clone()),
            state: WorkerState::Starting,
            not_before: None,
            started_at: None,
        };
        state.reserved.insert(worker_id, record.clone());

        Ok(record)
    }

    /// Promote a reservation to a `Running` record. This is the only way a
    /// record enters the worker map.
    pub async fn commit(
        &self,
        worker_id: &str,
        container_handle: ContainerHandle,
        started_at: SystemTime,
        settle_delay: Duration,
    ) -> Result<WorkerRecord, RegistryError> {
        let mut state = self.inner.lock().await;

        let mut record = state
            .reserved
            .remove(worker_id)
            .ok_or_else(|| RegistryError::NotReserved(worker_id.to_string()))?;
        record.transition(WorkerState::Running)?;
        record.container_handle = container_handle;
        record.started_at = Some(started_at);
        record.not_before = Some(started_at + settle_delay);

        state.workers.insert(record.worker_id.clone(), record.clone());
        Ok(record)
    }

    /// Drop a reservation whose start failed. Its port is retired: the
    /// container name derived from it may still be held by the runtime.
    pub async fn abort(&self, worker_id: &str) -> Option<WorkerRecord> {
        self.inner.lock().await.reserved.remove(worker_id)
    }

    pub async fn get(&self, worker_id: &str) -> Option<WorkerRecord> {
        self.inner.lock().await.workers.get(worker_id).cloned()
    }

    /// Move a `Running` worker to `Releasing`. Any other state, or an unknown
    /// id, yields `None` so that only one caller goes on to stop the container.
    pub async fn begin_release(&self, worker_id: &str) -> Option<WorkerRecord> {
        let mut state = self.inner.lock().await;
        let record = state.workers.get_mut(worker_id)?;
        record.transition(WorkerState::Releasing).ok()?;
        Some(record.clone())
    }

    pub async fn remove(&self, worker_id: &str) -> Option<WorkerRecord> {
        self.inner.lock().await.workers.remove(worker_id)
    }

    /// All committed records, ordered by port.
    pub async fn list(&self) -> Vec<WorkerRecord> {
        let state = self.inner.lock().await;
        let mut workers: Vec<WorkerRecord> = state.workers.values().cloned().collect();
        workers.sort_by_key(|w| w.port);
        workers
    }

    pub async fn live_count(&self) -> usize {
        self.inner.lock().await.live_count()
    }

    pub async fn running_ids(&self) -> Vec<String> {
        let state = self.inner.lock().await;
        state
            .workers
            .values()
            .filter(|w| w.state == WorkerState::Running)
            .map(|w| w.worker_id.clone())
            .collect()
    }

    /// True when the registry lock can be taken within `wait`.
    pub async fn responsive(&self, wait: Duration) -> bool {
        tokio::time::timeout(wait, self.inner.lock()).await.is_ok()
    }
}
