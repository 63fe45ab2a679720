use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use futures_util::future::join_all;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::types::{
    Admission, AdmissionError, AdmissionStatus, AllocateWorkerResponse, EnsurePluginResponse,
    PluginState, ReleaseOutcome, Supervisor, WorkerHandle,
};
use crate::lib::{
    config::types::{OrphanPolicy, SupervisorConfig},
    containers::{
        driver::ContainerDriver,
        types::{ContainerSpec, INSTANCE_LABEL, MANAGED_LABEL},
    },
    plugins::types::{ImageResolver, PluginDescriptor},
    worker::types::{WorkerRecord, WorkerRegistry, WorkerState},
};

impl Supervisor {
    pub fn new(config: &SupervisorConfig, driver: Arc<dyn ContainerDriver>) -> Self {
        Supervisor {
            resolver: ImageResolver::new(config.plugins.clone()),
            registry: WorkerRegistry::new(config.ports, config.admission.max_workers),
            driver,
            runtime: config.runtime.clone(),
            instance_id: Uuid::new_v4(),
        }
    }

    /// Check that a plugin is known and its image is present on the runtime.
    /// Never starts a worker.
    pub async fn ensure_plugin(&self, plugin_id: &str) -> PluginState {
        let plugin = match self.resolver.resolve(plugin_id) {
            Ok(plugin) => plugin,
            Err(e) => {
                warn!(plugin_id, error = %e, "ensure requested for unknown plugin");
                return PluginState::Unknown;
            }
        };

        match self.driver.image_available(&plugin.image).await {
            Ok(true) => PluginState::Ready,
            Ok(false) => {
                warn!(plugin_id, image = %plugin.image, "plugin image is not present");
                PluginState::Unavailable
            }
            Err(e) => {
                warn!(plugin_id, image = %plugin.image, error = %e, "could not check plugin image");
                PluginState::Unavailable
            }
        }
    }

    /// Admit a new worker for `plugin_id`. On any failure the registry and
    /// port counter are left as if the call never happened.
    pub async fn allocate(&self, plugin_id: &str) -> Result<WorkerRecord, AdmissionError> {
        let plugin = self.resolver.resolve(plugin_id)?;
        let reserved = self.registry.reserve(&plugin.id).await?;
        debug!(worker_id = %reserved.worker_id, port = reserved.port, plugin_id, "port reserved");

        let spec = self.container_spec(&reserved, &plugin);
        let handle = match self.driver.start(&spec).await {
            Ok(handle) => handle,
            Err(e) => {
                error!(
                    worker_id = %reserved.worker_id,
                    image = %plugin.image,
                    error = %e,
                    "worker failed to start"
                );
                self.rollback(reserved).await;
                return Err(AdmissionError::StartFailed(e));
            }
        };

        let committed = self
            .registry
            .commit(
                &reserved.worker_id,
                handle,
                SystemTime::now(),
                self.runtime.settle_delay(),
            )
            .await;

        match committed {
            Ok(record) => {
                info!(
                    worker_id = %record.worker_id,
                    port = record.port,
                    plugin_id,
                    "worker started"
                );
                Ok(record)
            }
            Err(e) => {
                error!(
                    worker_id = %reserved.worker_id,
                    error = %e,
                    "worker could not be registered"
                );
                self.rollback(reserved).await;
                Err(e.into())
            }
        }
    }

    /// Undo a reservation. The port stays retired so the next allocation
    /// never reuses a container name the runtime may still hold.
    async fn rollback(&self, mut reserved: WorkerRecord) {
        if let Err(e) = reserved.transition(WorkerState::Failed) {
            warn!(worker_id = %reserved.worker_id, error = %e, "unexpected reservation state");
        }

        let dropped = self.registry.abort(&reserved.worker_id).await.is_some();
        debug!(
            worker_id = %reserved.worker_id,
            port = reserved.port,
            dropped,
            state = ?reserved.state,
            "allocation rolled back"
        );
    }

    /// Allocation as seen by callers: every failure becomes a rejection.
    pub async fn allocate_worker(&self, plugin_id: &str) -> AllocateWorkerResponse {
        match self.allocate(plugin_id).await {
            Ok(record) => AllocateWorkerResponse {
                admission: Admission {
                    status: AdmissionStatus::Admitted,
                    reason: None,
                },
                handle: Some(self.worker_handle(&record)),
            },
            Err(e) => {
                info!(plugin_id, reason = %e, "allocation rejected");
                AllocateWorkerResponse {
                    admission: Admission {
                        status: AdmissionStatus::Rejected,
                        reason: Some(e.to_string()),
                    },
                    handle: None,
                }
            }
        }
    }

    /// Release a worker. Unknown or already released ids are a no-op. A
    /// failing container stop is logged and never keeps the record alive.
    pub async fn release(&self, worker_id: &str) -> ReleaseOutcome {
        let Some(record) = self.registry.begin_release(worker_id).await else {
            debug!(worker_id, "release of unknown or already released worker");
            return ReleaseOutcome::NotFound;
        };

        if let Err(e) = self.driver.stop(&record.container_handle).await {
            warn!(
                worker_id,
                container = %record.container_handle,
                error = %e,
                "failed to stop worker container"
            );
        }

        match self.registry.remove(worker_id).await {
            Some(mut removed) => {
                if let Err(e) = removed.transition(WorkerState::Released) {
                    warn!(worker_id, error = %e, "unexpected worker state on removal");
                }
                info!(worker_id, port = removed.port, "worker released");
                ReleaseOutcome::Released(removed)
            }
            None => ReleaseOutcome::NotFound,
        }
    }

    /// Look for managed containers left behind by an earlier supervisor
    /// process and apply the configured orphan policy. Returns the number of
    /// orphans found.
    pub async fn reconcile(&self) -> usize {
        let managed = match self.driver.list_managed().await {
            Ok(managed) => managed,
            Err(e) => {
                warn!(error = %e, "could not list managed containers, skipping orphan check");
                return 0;
            }
        };

        let known: HashSet<String> = self
            .registry
            .list()
            .await
            .into_iter()
            .map(|w| w.container_handle.0)
            .collect();
        let own_instance = self.instance_id.to_string();
        let orphans: Vec<_> = managed
            .into_iter()
            .filter(|c| {
                c.instance.as_deref() != Some(own_instance.as_str())
                    || !known.contains(&c.handle.0)
            })
            .collect();

        if orphans.is_empty() {
            return 0;
        }

        match self.runtime.orphans {
            OrphanPolicy::Ignore => {
                for orphan in &orphans {
                    warn!(
                        container = %orphan.handle,
                        instance = ?orphan.instance,
                        "orphaned worker container left running"
                    );
                }
            }
            OrphanPolicy::Stop => {
                let stops = orphans.iter().map(|orphan| async move {
                    match self.driver.stop(&orphan.handle).await {
                        Ok(()) => info!(container = %orphan.handle, "stopped orphan"),
                        Err(e) => warn!(
                            container = %orphan.handle,
                            error = %e,
                            "failed to stop orphan"
                        ),
                    }
                });
                join_all(stops).await;
            }
        }

        orphans.len()
    }

    /// Release every running worker. Returns how many were released.
    pub async fn shutdown(&self) -> usize {
        let ids = self.registry.running_ids().await;
        info!(workers = ids.len(), "releasing workers on shutdown");

        let outcomes = join_all(ids.iter().map(|id| self.release(id))).await;
        let released: Vec<String> = outcomes
            .into_iter()
            .filter_map(|outcome| match outcome {
                ReleaseOutcome::Released(record) => Some(record.worker_id),
                ReleaseOutcome::NotFound => None,
            })
            .collect();
        debug!(?released, "shutdown release complete");
        released.len()
    }

    fn container_spec(&self, worker: &WorkerRecord, plugin: &PluginDescriptor) -> ContainerSpec {
        ContainerSpec {
            name: worker.container_handle.0.clone(),
            image: plugin.image.clone(),
            env: vec![
                format!("WORKER_ID={}", worker.worker_id),
                format!("PLUGIN_ID={}", plugin.id),
                format!("WORKER_PORT={}", worker.port),
            ],
            labels: HashMap::from([
                (MANAGED_LABEL.to_string(), "true".to_string()),
                (INSTANCE_LABEL.to_string(), self.instance_id.to_string()),
            ]),
            network: self.runtime.network.clone(),
            auto_remove: self.runtime.auto_remove,
        }
    }

    fn worker_handle(&self, record: &WorkerRecord) -> WorkerHandle {
        let not_before = record
            .not_before
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or_default();

        WorkerHandle {
            worker_id: record.worker_id.clone(),
            runtime_tag: self.runtime.tag.clone(),
            port: record.port,
            not_before,
        }
    }
}

impl EnsurePluginResponse {
    pub fn new(state: PluginState) -> Self {
        EnsurePluginResponse { state }
    }
}
