//! Server module for MCP components
//!
//! [`HubContext`] owns the hub client and the shared resilience state.
//! Resources, the response cache and health checks build on it.

pub mod context;
pub mod health_check;
pub mod resources;
pub mod response_cache;

pub use context::{HubContext, DEVICES_BREAKER, FLOWS_BREAKER, SYSTEM_BREAKER, ZONES_BREAKER};
pub use health_check::{HealthMonitor, HealthStatus};
pub use resources::{list_resources, read_resource, ResourceKind};
pub use response_cache::{CacheLookup, CacheStats, ResourceCache, StaleEnvelope};
