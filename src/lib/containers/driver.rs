use std::sync::Arc;

use async_trait::async_trait;

use super::types::{ContainerError, ContainerHandle, ContainerSpec, ManagedContainer};

/// Capability interface over the container runtime.
///
/// Implementations translate every runtime failure into a [`ContainerError`];
/// callers never see raw runtime errors.
#[async_trait]
pub trait ContainerDriver: Send + Sync {
    async fn start(&self, spec: &ContainerSpec) -> Result<ContainerHandle, ContainerError>;

    async fn stop(&self, handle: &ContainerHandle) -> Result<(), ContainerError>;

    /// Force-remove a container whether or not it is running. A container that
    /// is already gone counts as removed.
    async fn remove(&self, handle: &ContainerHandle) -> Result<(), ContainerError>;

    /// Cheap reachability probe used by health reporting.
    async fn ping(&self) -> Result<(), ContainerError>;

    async fn image_available(&self, image: &str) -> Result<bool, ContainerError>;

    /// Running containers that carry the managed label.
    async fn list_managed(&self) -> Result<Vec<ManagedContainer>, ContainerError>;
}

#[async_trait]
impl<T> ContainerDriver for Arc<T>
where
    T: ContainerDriver + ?Sized,
{
    async fn start(&self, spec: &ContainerSpec) -> Result<ContainerHandle, ContainerError> {
        (**self).start(spec).await
    }

    async fn stop(&self, handle: &ContainerHandle) -> Result<(), ContainerError> {
        (**self).stop(handle).await
    }

    async fn remove(&self, handle: &ContainerHandle) -> Result<(), ContainerError> {
        (**self).remove(handle).await
    }

    async fn ping(&self) -> Result<(), ContainerError> {
        (**self).ping().await
    }

    async fn image_available(&self, image: &str) -> Result<bool, ContainerError> {
        (**self).image_available(image).await
    }

    async fn list_managed(&self) -> Result<Vec<ManagedContainer>, ContainerError> {
        (**self).list_managed().await
    }
}
