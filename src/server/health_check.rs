//! Hub health checks
//!
//! A check fetches the device list and the system config and records what
//! worked. Results are reused for `interval` unless a fresh check is forced.

use crate::client::ClientManager;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Outcome of one health check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub is_healthy: bool,
    pub timestamp: DateTime<Utc>,
    pub response_time_ms: f64,
    pub homey_reachable: bool,
    pub homey_version: Option<String>,
    pub device_count: Option<usize>,
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Runs health checks and keeps the latest result
pub struct HealthMonitor {
    interval: Duration,
    last: RwLock<Option<(Instant, HealthStatus)>>,
}

impl HealthMonitor {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: RwLock::new(None),
        }
    }

    /// Latest result, or a new check when it is older than the interval
    pub async fn check(&self, clients: &ClientManager, force: bool) -> HealthStatus {
        if !force {
            if let Some((checked_at, status)) = self.last.read().await.as_ref() {
                if checked_at.elapsed() < self.interval {
                    debug!("Returning cached health status");
                    return status.clone();
                }
            }
        }

        let status = Self::run(clients).await;
        *self.last.write().await = Some((Instant::now(), status.clone()));
        status
    }

    /// Most recent result without checking
    pub async fn last(&self) -> Option<HealthStatus> {
        self.last.read().await.as_ref().map(|(_, status)| status.clone())
    }

    async fn run(clients: &ClientManager) -> HealthStatus {
        info!("Performing health check");
        let started = Instant::now();
        let mut status = HealthStatus {
            is_healthy: true,
            timestamp: Utc::now(),
            response_time_ms: 0.0,
            homey_reachable: false,
            homey_version: None,
            device_count: None,
            errors: Vec::new(),
        };

        match clients.client().await {
            Ok(client) => {
                match client.get_devices().await {
                    Ok(devices) => {
                        debug!("Health check found {} devices", devices.len());
                        status.device_count = Some(devices.len());
                        status.homey_reachable = true;
                    }
                    Err(e) => status.errors.push(format!("Failed to get device count: {e}")),
                }

                match client.get_system_config().await {
                    Ok(system) => status.homey_version = system.version,
                    Err(e) => status.errors.push(format!("Failed to get system version: {e}")),
                }
            }
            Err(e) => {
                warn!("Health check connection failed: {}", e);
                status.errors.push(format!("Connection failed: {e}"));
            }
        }

        status.is_healthy = status.homey_reachable;
        status.response_time_ms = started.elapsed().as_secs_f64() * 1000.0;

        info!(
            "Health check completed: healthy={}, reachable={}, response_time={:.1}ms",
            status.is_healthy, status.homey_reachable, status.response_time_ms
        );
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{device, MockFailure, MockHomeyClient};
    use crate::client::SystemConfig;
    use std::sync::Arc;

    fn hub() -> Arc<MockHomeyClient> {
        Arc::new(
            MockHomeyClient::new()
                .with_devices(vec![device("d1", "Lamp", "z1", "light")])
                .with_system(SystemConfig {
                    version: Some("12.0.1".to_string()),
                    ..SystemConfig::default()
                }),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_result_is_reused_within_interval() {
        let client = hub();
        let clients = ClientManager::with_client(client.clone());
        let monitor = HealthMonitor::new(Duration::from_secs(30));

        let first = monitor.check(&clients, false).await;
        assert!(first.is_healthy);
        assert_eq!(first.device_count, Some(1));
        assert_eq!(first.homey_version.as_deref(), Some("12.0.1"));

        tokio::time::advance(Duration::from_secs(10)).await;
        monitor.check(&clients, false).await;
        assert_eq!(client.call_count("get_devices"), 1);

        monitor.check(&clients, true).await;
        assert_eq!(client.call_count("get_devices"), 2);

        tokio::time::advance(Duration::from_secs(31)).await;
        monitor.check(&clients, false).await;
        assert_eq!(client.call_count("get_devices"), 3);
    }

    #[tokio::test]
    async fn test_unreachable_hub_is_unhealthy() {
        let client = hub();
        client.fail("get_devices", MockFailure::Connection);
        let clients = ClientManager::with_client(client);
        let monitor = HealthMonitor::new(Duration::from_secs(30));

        let status = monitor.check(&clients, false).await;
        assert!(!status.is_healthy);
        assert!(!status.homey_reachable);
        assert_eq!(status.homey_version.as_deref(), Some("12.0.1"));
        assert!(status.errors[0].starts_with("Failed to get device count"));
    }

    #[tokio::test]
    async fn test_version_failure_keeps_hub_healthy() {
        let client = hub();
        client.fail("get_system_config", MockFailure::Timeout);
        let clients = ClientManager::with_client(client);
        let monitor = HealthMonitor::new(Duration::from_secs(30));

        let status = monitor.check(&clients, false).await;
        assert!(status.is_healthy);
        assert_eq!(status.errors.len(), 1);
        assert_eq!(monitor.last().await, Some(status));
    }
}
