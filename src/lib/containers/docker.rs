use std::collections::HashMap;

use async_trait::async_trait;
use bollard::{
    Docker,
    container::{
        Config, CreateContainerOptions, ListContainersOptions, RemoveContainerOptions,
        StartContainerOptions, StopContainerOptions,
    },
    errors::Error as DockerError,
    models::{ContainerSummary, HostConfig},
};
use tracing::{debug, info, warn};

use super::driver::ContainerDriver;
use super::types::{
    ContainerError, ContainerHandle, ContainerSpec, DockerDriver, INSTANCE_LABEL, MANAGED_LABEL,
    ManagedContainer,
};

impl DockerDriver {
    pub fn connect(stop_grace_secs: i64) -> Result<Self, ContainerError> {
        let client = Docker::connect_with_local_defaults().map_err(unavailable)?;

        Ok(DockerDriver {
            client,
            stop_grace_secs,
        })
    }

    /// Force-remove by name or id.
    async fn force_remove(&self, container: &str) -> Result<(), DockerError> {
        let options = Some(RemoveContainerOptions {
            force: true,
            ..Default::default()
        });
        self.client.remove_container(container, options).await
    }

    fn host_config(spec: &ContainerSpec) -> HostConfig {
        HostConfig {
            auto_remove: Some(spec.auto_remove),
            network_mode: spec.network.clone(),
            ..Default::default()
        }
    }
}

fn status_code(err: &DockerError) -> Option<u16> {
    match err {
        DockerError::DockerResponseServerError { status_code, .. } => Some(*status_code),
        _ => None,
    }
}

fn unavailable(err: DockerError) -> ContainerError {
    ContainerError::Unavailable {
        reason: err.to_string(),
    }
}

/// 304 means the container was already stopped, 404 that it is already gone
/// (auto-removed). Both leave the caller where it wanted to be.
fn stop_outcome(
    handle: &ContainerHandle,
    result: Result<(), DockerError>,
) -> Result<(), ContainerError> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if matches!(status_code(&e), Some(304) | Some(404)) => {
            debug!(container = %handle, error = %e, "container was not running");
            Ok(())
        }
        Err(e) => Err(ContainerError::StopFailed {
            reason: format!("stop {}: {}", handle, e),
        }),
    }
}

fn remove_outcome(
    handle: &ContainerHandle,
    result: Result<(), DockerError>,
) -> Result<(), ContainerError> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if status_code(&e) == Some(404) => Ok(()),
        Err(e) => Err(ContainerError::StopFailed {
            reason: format!("remove {}: {}", handle, e),
        }),
    }
}

fn image_outcome<T>(result: Result<T, DockerError>) -> Result<bool, ContainerError> {
    match result {
        Ok(_) => Ok(true),
        Err(e) if status_code(&e) == Some(404) => Ok(false),
        Err(e) => Err(unavailable(e)),
    }
}

fn managed_container(summary: ContainerSummary) -> Option<ManagedContainer> {
    let name = summary
        .names
        .as_ref()
        .and_then(|names| names.first())
        .map(|name| name.trim_start_matches('/').to_string())
        .or(summary.id)?;
    let instance = summary
        .labels
        .and_then(|mut labels| labels.remove(INSTANCE_LABEL));

    Some(ManagedContainer {
        handle: ContainerHandle(name),
        instance,
    })
}

#[async_trait]
impl ContainerDriver for DockerDriver {
    async fn start(&self, spec: &ContainerSpec) -> Result<ContainerHandle, ContainerError> {
        let container_config = Config {
            image: Some(spec.image.clone()),
            env: Some(spec.env.clone()),
            labels: Some(spec.labels.clone()),
            host_config: Some(Self::host_config(spec)),
            ..Default::default()
        };

        let options = Some(CreateContainerOptions {
            name: spec.name.clone(),
            ..Default::default()
        });

        let created = self
            .client
            .create_container(options, container_config)
            .await
            .map_err(|e| ContainerError::StartFailed {
                reason: format!("create {} from {}: {}", spec.name, spec.image, e),
            })?;
        debug!(container_id = %created.id, name = %spec.name, "container created");

        if let Err(e) = self
            .client
            .start_container(&created.id, None::<StartContainerOptions<String>>)
            .await
        {
            if let Err(remove_err) = self.force_remove(&created.id).await {
                warn!(
                    container_id = %created.id,
                    error = %remove_err,
                    "failed to remove container after start failure"
                );
            }
            return Err(ContainerError::StartFailed {
                reason: format!("start {}: {}", spec.name, e),
            });
        }

        info!(
            container_id = %created.id,
            name = %spec.name,
            image = %spec.image,
            "container started"
        );
        Ok(ContainerHandle(spec.name.clone()))
    }

    async fn stop(&self, handle: &ContainerHandle) -> Result<(), ContainerError> {
        let options = Some(StopContainerOptions {
            t: self.stop_grace_secs,
        });

        let result = self.client.stop_container(&handle.0, options).await;
        stop_outcome(handle, result)?;
        info!(container = %handle, "container stopped");
        Ok(())
    }

    async fn remove(&self, handle: &ContainerHandle) -> Result<(), ContainerError> {
        remove_outcome(handle, self.force_remove(&handle.0).await)?;
        info!(container = %handle, "container removed");
        Ok(())
    }

    async fn ping(&self) -> Result<(), ContainerError> {
        self.client.ping().await.map(|_| ()).map_err(unavailable)
    }

    async fn image_available(&self, image: &str) -> Result<bool, ContainerError> {
        image_outcome(self.client.inspect_image(image).await)
    }

    async fn list_managed(&self) -> Result<Vec<ManagedContainer>, ContainerError> {
        let filters = HashMap::from([(
            "label".to_string(),
            vec![format!("{MANAGED_LABEL}=true")],
        )]);
        let options = Some(ListContainersOptions {
            filters,
            ..Default::default()
        });

        let containers = self
            .client
            .list_containers(options)
            .await
            .map_err(unavailable)?;

        Ok(containers.into_iter().filter_map(managed_container).collect())
    }
}
