//! In-memory driver used by the supervisor tests.

use std::{
    collections::{BTreeMap, HashSet},
    sync::Mutex,
    time::Duration,
};

use async_trait::async_trait;

use super::driver::ContainerDriver;
use super::types::{ContainerError, ContainerHandle, ContainerSpec, ManagedContainer};

#[derive(Default)]
pub struct FakeDriver {
    state: Mutex<FakeState>,
}

#[derive(Default)]
struct FakeState {
    running: BTreeMap<String, ContainerSpec>,
    started: Vec<String>,
    stopped: Vec<String>,
    removed: Vec<String>,
    start_failure: Option<String>,
    stop_failure: Option<String>,
    unreachable: bool,
    start_delay: Option<Duration>,
    stop_delay: Option<Duration>,
    ping_delay: Option<Duration>,
    missing_images: HashSet<String>,
    orphans: Vec<ManagedContainer>,
}

impl FakeDriver {
    fn with_state<T>(&self, f: impl FnOnce(&mut FakeState) -> T) -> T {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    pub fn fail_starts(&self, reason: Option<&str>) {
        self.with_state(|s| s.start_failure = reason.map(str::to_string));
    }

    pub fn fail_stops(&self, reason: Option<&str>) {
        self.with_state(|s| s.stop_failure = reason.map(str::to_string));
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.with_state(|s| s.unreachable = unreachable);
    }

    pub fn hang_starts(&self, delay: Duration) {
        self.with_state(|s| s.start_delay = Some(delay));
    }

    pub fn hang_stops(&self, delay: Duration) {
        self.with_state(|s| s.stop_delay = Some(delay));
    }

    pub fn hang_pings(&self, delay: Duration) {
        self.with_state(|s| s.ping_delay = Some(delay));
    }

    pub fn remove_image(&self, image: &str) {
        self.with_state(|s| s.missing_images.insert(image.to_string()));
    }

    pub fn add_orphan(&self, name: &str, instance: Option<&str>) {
        self.with_state(|s| {
            s.orphans.push(ManagedContainer {
                handle: ContainerHandle(name.to_string()),
                instance: instance.map(str::to_string),
            })
        });
    }

    /// Hold a container name as if another process had started it.
    pub fn occupy(&self, name: &str) {
        self.with_state(|s| {
            s.running.insert(
                name.to_string(),
                ContainerSpec {
                    name: name.to_string(),
                    ..Default::default()
                },
            )
        });
    }

    pub fn removed(&self) -> Vec<String> {
        self.with_state(|s| s.removed.clone())
    }

    pub fn started(&self) -> Vec<String> {
        self.with_state(|s| s.started.clone())
    }

    pub fn stopped(&self) -> Vec<String> {
        self.with_state(|s| s.stopped.clone())
    }

    pub fn running(&self) -> Vec<String> {
        self.with_state(|s| s.running.keys().cloned().collect())
    }

    pub fn spec(&self, name: &str) -> Option<ContainerSpec> {
        self.with_state(|s| s.running.get(name).cloned())
    }

    fn unreachable_error(&self) -> Option<ContainerError> {
        self.with_state(|s| {
            s.unreachable.then(|| ContainerError::Unavailable {
                reason: "fake runtime is unreachable".into(),
            })
        })
    }
}

impl ContainerSpec {
    pub fn env_var(&self, key: &str) -> Option<&str> {
        self.env.iter().find_map(|entry| {
            entry
                .split_once('=')
                .filter(|(name, _)| *name == key)
                .map(|(_, value)| value)
        })
    }
}

#[async_trait]
impl ContainerDriver for FakeDriver {
    async fn start(&self, spec: &ContainerSpec) -> Result<ContainerHandle, ContainerError> {
        if let Some(delay) = self.with_state(|s| s.start_delay) {
            tokio::time::sleep(delay).await;
        }
        if let Some(ContainerError::Unavailable { reason }) = self.unreachable_error() {
            return Err(ContainerError::StartFailed { reason });
        }

        self.with_state(|s| {
            if let Some(reason) = &s.start_failure {
                return Err(ContainerError::StartFailed {
                    reason: reason.clone(),
                });
            }
            if s.running.contains_key(&spec.name) {
                return Err(ContainerError::StartFailed {
                    reason: format!("container name {} is already in use", spec.name),
                });
            }
            s.started.push(spec.name.clone());
            s.running.insert(spec.name.clone(), spec.clone());
            Ok(ContainerHandle(spec.name.clone()))
        })
    }

    async fn stop(&self, handle: &ContainerHandle) -> Result<(), ContainerError> {
        if let Some(delay) = self.with_state(|s| s.stop_delay) {
            tokio::time::sleep(delay).await;
        }

        self.with_state(|s| {
            s.stopped.push(handle.0.clone());
            if let Some(reason) = &s.stop_failure {
                return Err(ContainerError::StopFailed {
                    reason: reason.clone(),
                });
            }
            s.running.remove(&handle.0);
            Ok(())
        })
    }

    async fn remove(&self, handle: &ContainerHandle) -> Result<(), ContainerError> {
        if let Some(ContainerError::Unavailable { reason }) = self.unreachable_error() {
            return Err(ContainerError::StopFailed { reason });
        }

        self.with_state(|s| {
            s.removed.push(handle.0.clone());
            s.running.remove(&handle.0);
            Ok(())
        })
    }

    async fn ping(&self) -> Result<(), ContainerError> {
        if let Some(delay) = self.with_state(|s| s.ping_delay) {
            tokio::time::sleep(delay).await;
        }
        match self.unreachable_error() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn image_available(&self, image: &str) -> Result<bool, ContainerError> {
        if let Some(e) = self.unreachable_error() {
            return Err(e);
        }
        Ok(self.with_state(|s| !s.missing_images.contains(image)))
    }

    async fn list_managed(&self) -> Result<Vec<ManagedContainer>, ContainerError> {
        if let Some(e) = self.unreachable_error() {
            return Err(e);
        }
        Ok(self.with_state(|s| s.orphans.clone()))
    }
}
