use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;
use tracing::warn;

use super::driver::ContainerDriver;
use super::types::{ContainerError, ContainerHandle, ContainerSpec, ManagedContainer, TimeoutDriver};

impl<D: ContainerDriver> TimeoutDriver<D> {
    pub fn new(
        inner: D,
        start_timeout: Duration,
        stop_timeout: Duration,
        probe_timeout: Duration,
    ) -> Self {
        TimeoutDriver {
            inner,
            start_timeout,
            stop_timeout,
            probe_timeout,
        }
    }

    async fn probe<T>(
        &self,
        what: &str,
        call: impl Future<Output = Result<T, ContainerError>> + Send,
    ) -> Result<T, ContainerError> {
        timeout(self.probe_timeout, call)
            .await
            .unwrap_or_else(|_| {
                Err(ContainerError::Unavailable {
                    reason: format!("{what} did not answer within {:?}", self.probe_timeout),
                })
            })
    }
}

#[async_trait]
impl<D: ContainerDriver> ContainerDriver for TimeoutDriver<D> {
    async fn start(&self, spec: &ContainerSpec) -> Result<ContainerHandle, ContainerError> {
        match timeout(self.start_timeout, self.inner.start(spec)).await {
            Ok(result) => result,
            Err(_) => {
                // The runtime may still bring the container up after we gave up
                // on it, and the name must not stay taken.
                let handle = ContainerHandle(spec.name.clone());
                match timeout(self.stop_timeout, self.inner.remove(&handle)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        warn!(container = %handle, error = %e, "cleanup after start timeout failed")
                    }
                    Err(_) => warn!(container = %handle, "cleanup after start timeout timed out"),
                }

                Err(ContainerError::StartFailed {
                    reason: format!(
                        "container {} did not start within {:?}",
                        spec.name, self.start_timeout
                    ),
                })
            }
        }
    }

    async fn stop(&self, handle: &ContainerHandle) -> Result<(), ContainerError> {
        timeout(self.stop_timeout, self.inner.stop(handle))
            .await
            .unwrap_or_else(|_| {
                Err(ContainerError::StopFailed {
                    reason: format!(
                        "container {} did not stop within {:?}",
                        handle, self.stop_timeout
                    ),
                })
            })
    }

    async fn remove(&self, handle: &ContainerHandle) -> Result<(), ContainerError> {
        timeout(self.stop_timeout, self.inner.remove(handle))
            .await
            .unwrap_or_else(|_| {
                Err(ContainerError::StopFailed {
                    reason: format!(
                        "container {} was not removed within {:?}",
                        handle, self.stop_timeout
                    ),
                })
            })
    }

    async fn ping(&self) -> Result<(), ContainerError> {
        self.probe("ping", self.inner.ping()).await
    }

    async fn image_available(&self, image: &str) -> Result<bool, ContainerError> {
        self.probe("image inspect", self.inner.image_available(image)).await
    }

    async fn list_managed(&self) -> Result<Vec<ManagedContainer>, ContainerError> {
        self.probe("container list", self.inner.list_managed()).await
    }
}
