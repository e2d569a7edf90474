//! Shared server state handed to every tool and resource handler

use crate::client::{
    ClientManager, Device, Flow, FlowFolder, HomeyClient, InsightsQuery, SystemConfig, Zone,
};
use crate::config::ServerConfig;
use crate::error::Result;
use crate::error_recovery::{CircuitBreakerRegistry, RetryExecutor, RetryStats};
use crate::server::health_check::{HealthMonitor, HealthStatus};
use crate::server::response_cache::ResourceCache;
use crate::services::FlowResolver;
use crate::utils::pagination::CursorCodec;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Breaker guarding device reads
pub const DEVICES_BREAKER: &str = "devices";
/// Breaker guarding zone reads
pub const ZONES_BREAKER: &str = "zones";
/// Breaker guarding flow and folder reads
pub const FLOWS_BREAKER: &str = "flows";
/// Breaker guarding system config reads
pub const SYSTEM_BREAKER: &str = "system";

/// Owning context for one server process
pub struct HubContext {
    config: ServerConfig,
    clients: ClientManager,
    resource_cache: ResourceCache<Value>,
    breakers: CircuitBreakerRegistry,
    retry_stats: Arc<RwLock<RetryStats>>,
    health: HealthMonitor,
    started_at: DateTime<Utc>,
}

impl HubContext {
    /// Context that connects to the hub named in `config` on first use
    pub fn new(config: ServerConfig) -> Self {
        let clients = ClientManager::new(config.hub.clone());
        Self::with_manager(config, clients)
    }

    /// Context around an existing client
    pub fn with_client(config: ServerConfig, client: Arc<dyn HomeyClient>) -> Self {
        Self::with_manager(config, ClientManager::with_client(client))
    }

    fn with_manager(config: ServerConfig, clients: ClientManager) -> Self {
        Self {
            breakers: CircuitBreakerRegistry::new(config.circuit_breaker.clone()),
            health: HealthMonitor::new(config.cache.health_check_interval),
            resource_cache: ResourceCache::new(),
            retry_stats: Arc::new(RwLock::new(RetryStats::default())),
            started_at: Utc::now(),
            clients,
            config,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn codec(&self) -> CursorCodec {
        self.config.pagination.codec()
    }

    pub fn resource_cache(&self) -> &ResourceCache<Value> {
        &self.resource_cache
    }

    pub fn breakers(&self) -> &CircuitBreakerRegistry {
        &self.breakers
    }

    pub async fn retry_stats(&self) -> RetryStats {
        self.retry_stats.read().await.clone()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// The hub client, created on first call
    pub async fn client(&self) -> Result<Arc<dyn HomeyClient>> {
        self.clients.client().await
    }

    /// Resolver for flow ids; mutations are not retried
    pub async fn flow_resolver(&self) -> Result<FlowResolver> {
        Ok(FlowResolver::new(self.client().await?))
    }

    /// Health status, reused for the configured interval unless `force`
    pub async fn health(&self, force: bool) -> HealthStatus {
        self.health.check(&self.clients, force).await
    }

    /// Run a hub read with retries, every attempt gated by breaker `name`
    pub async fn guarded<T, F, Fut>(&self, name: &str, operation: F) -> Result<T>
    where
        F: Fn(Arc<dyn HomeyClient>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let client = self.client().await?;
        let breaker = self.breakers.get_breaker(name).await;
        RetryExecutor::new(self.config.retry.clone())
            .with_breaker(breaker)
            .with_stats(self.retry_stats.clone())
            .execute(|| operation(client.clone()))
            .await
    }

    pub async fn devices(&self) -> Result<Vec<Device>> {
        self.guarded(DEVICES_BREAKER, |client| async move { client.get_devices().await })
            .await
    }

    pub async fn device(&self, device_id: &str) -> Result<Device> {
        self.guarded(DEVICES_BREAKER, |client| async move {
            client.get_device(device_id).await
        })
        .await
    }

    pub async fn device_insights(&self, device_id: &str, query: &InsightsQuery) -> Result<Value> {
        self.guarded(DEVICES_BREAKER, |client| async move {
            client.get_device_insights(device_id, query).await
        })
        .await
    }

    pub async fn zones(&self) -> Result<Vec<Zone>> {
        self.guarded(ZONES_BREAKER, |client| async move { client.get_zones().await })
            .await
    }

    pub async fn flows(&self) -> Result<Vec<Flow>> {
        self.guarded(FLOWS_BREAKER, |client| async move { client.get_flows().await })
            .await
    }

    pub async fn advanced_flows(&self) -> Result<Vec<Flow>> {
        self.guarded(FLOWS_BREAKER, |client| async move {
            client.get_advanced_flows().await
        })
        .await
    }

    pub async fn flow_folders(&self) -> Result<Vec<FlowFolder>> {
        self.guarded(FLOWS_BREAKER, |client| async move {
            client.get_flow_folders().await
        })
        .await
    }

    pub async fn system_config(&self) -> Result<SystemConfig> {
        self.guarded(SYSTEM_BREAKER, |client| async move {
            client.get_system_config().await
        })
        .await
    }

    /// Disconnect the hub client if one was created
    pub async fn shutdown(&self) -> Result<()> {
        info!("Shutting down hub context");
        self.clients.disconnect().await
    }
}
