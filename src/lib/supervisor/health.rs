//! Supervisor health reporting.

use tokio::time::timeout;
use tracing::{debug, warn};

use super::types::{CheckStatus, HealthCheck, HealthReport, HealthStatus, Supervisor};

impl HealthCheck {
    pub fn is_healthy(&self) -> bool {
        matches!(self.status, CheckStatus::Healthy)
    }
}

impl HealthReport {
    pub fn from_checks(checks: Vec<HealthCheck>, live_workers: usize) -> Self {
        let healthy = checks
            .iter()
            .filter(|check| check.critical)
            .all(HealthCheck::is_healthy);

        HealthReport {
            status: if healthy {
                HealthStatus::Ok
            } else {
                HealthStatus::Degraded
            },
            checks,
            live_workers,
        }
    }
}

impl Supervisor {
    /// `Degraded` when the container runtime or the registry does not answer
    /// within the configured probe timeout.
    pub async fn health(&self) -> HealthReport {
        debug!("health check");
        let wait = self.runtime.ping_timeout();

        let runtime_status = match timeout(wait, self.driver.ping()).await {
            Ok(Ok(())) => CheckStatus::Healthy,
            Ok(Err(e)) => CheckStatus::Unhealthy(e.to_string()),
            Err(_) => CheckStatus::Unhealthy(format!("no answer within {wait:?}")),
        };

        let registry_status = if self.registry.responsive(wait).await {
            CheckStatus::Healthy
        } else {
            CheckStatus::Unhealthy(format!("registry lock not acquired within {wait:?}"))
        };

        let checks = vec![
            HealthCheck {
                name: "container_runtime",
                critical: true,
                status: runtime_status,
            },
            HealthCheck {
                name: "registry",
                critical: true,
                status: registry_status,
            },
        ];

        for check in checks.iter().filter(|check| !check.is_healthy()) {
            warn!(check = check.name, status = ?check.status, "health check failing");
        }

        let live_workers = match timeout(wait, self.registry.live_count()).await {
            Ok(count) => count,
            Err(_) => 0,
        };

        HealthReport::from_checks(checks, live_workers)
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::BTreeMap, sync::Arc, time::Duration};

    use super::*;
    use crate::lib::{config::types::SupervisorConfig, containers::fake::FakeDriver};

    fn supervisor() -> (Supervisor, Arc<FakeDriver>) {
        let mut config = SupervisorConfig {
            plugins: BTreeMap::from([("demo".to_string(), "demo:latest".to_string())]),
            ..Default::default()
        };
        config.runtime.ping_timeout_ms = 50;
        let fake = Arc::new(FakeDriver::default());
        (Supervisor::new(&config, fake.clone()), fake)
    }

    #[tokio::test]
    async fn ok_without_known_failures() {
        let (supervisor, _) = supervisor();
        supervisor.allocate("demo").await.unwrap();

        let report = supervisor.health().await;
        assert_eq!(report.status, HealthStatus::Ok);
        assert_eq!(report.live_workers, 1);
        assert!(report.checks.iter().all(HealthCheck::is_healthy));
    }

    #[tokio::test]
    async fn degraded_when_runtime_unreachable() {
        let (supervisor, fake) = supervisor();
        fake.set_unreachable(true);

        let report = supervisor.health().await;
        assert_eq!(report.status, HealthStatus::Degraded);
        let runtime = report
            .checks
            .iter()
            .find(|check| check.name == "container_runtime")
            .unwrap();
        assert!(!runtime.is_healthy());

        fake.set_unreachable(false);
        assert_eq!(supervisor.health().await.status, HealthStatus::Ok);
    }

    #[tokio::test(start_paused = true)]
    async fn degraded_when_runtime_hangs() {
        let (supervisor, fake) = supervisor();
        fake.hang_pings(Duration::from_secs(3600));

        assert_eq!(supervisor.health().await.status, HealthStatus::Degraded);
    }

    #[tokio::test]
    async fn degraded_when_registry_is_stuck() {
        let (supervisor, _) = supervisor();
        let _guard = supervisor.registry.inner.lock().await;

        let report = supervisor.health().await;
        assert_eq!(report.status, HealthStatus::Degraded);
        assert_eq!(report.live_workers, 0);
    }

    #[test]
    fn non_critical_failures_do_not_degrade() {
        let report = HealthReport::from_checks(
            vec![
                HealthCheck {
                    name: "critical_pass",
                    critical: true,
                    status: CheckStatus::Healthy,
                },
                HealthCheck {
                    name: "non_critical_fail",
                    critical: false,
                    status: CheckStatus::Unhealthy("warning".into()),
                },
            ],
            0,
        );

        assert_eq!(report.status, HealthStatus::Ok);
    }

    #[test]
    fn serializes_wire_status() {
        let report = HealthReport::from_checks(Vec::new(), 2);
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["status"], "OK");
        assert_eq!(json["live_workers"], 2);
    }
}
