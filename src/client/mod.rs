//! HomeyPro client abstraction
//!
//! [`HomeyClient`] is the seam between the MCP layer and the hub. The HTTP
//! implementation lives in [`http_client`]; tests plug in mocks.

pub mod http_client;

use crate::config::HubConfig;
use crate::error::{HomeyError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{error, info};

/// Device as reported by the hub
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub name: String,
    /// Zone id
    #[serde(default)]
    pub zone: Option<String>,
    /// Device class (`light`, `socket`, `thermostat`, ...)
    #[serde(rename = "class", default)]
    pub class: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Capability id -> capability state object (carries `value`)
    #[serde(rename = "capabilitiesObj", default)]
    pub capabilities_obj: Map<String, Value>,
    #[serde(default)]
    pub available: bool,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub note: Option<String>,
    /// Everything else the hub sends
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Device {
    pub fn is_online(&self) -> bool {
        self.available
    }

    /// Current value of `capability`, if the hub reported one
    pub fn capability_value(&self, capability: &str) -> Option<&Value> {
        self.capabilities_obj
            .get(capability)
            .and_then(|state| state.get("value"))
            .filter(|value| !value.is_null())
    }

    /// Capability id -> current value
    pub fn capability_values(&self) -> Map<String, Value> {
        self.capabilities_obj
            .iter()
            .filter_map(|(id, state)| state.get("value").map(|v| (id.clone(), v.clone())))
            .collect()
    }

    /// Reduced view for list tools
    pub fn to_compact(&self) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
            "zone": self.zone,
            "class": self.class,
            "capabilities": self.capabilities,
            "values": self.capability_values(),
            "available": self.available,
            "note": self.note,
        })
    }

    /// Serialised view, compact or full, with `is_online` added
    pub fn to_view(&self, compact: bool) -> Value {
        let mut view = if compact {
            self.to_compact()
        } else {
            serde_json::to_value(self).unwrap_or_else(|_| self.to_compact())
        };
        if let Value::Object(map) = &mut view {
            map.insert("is_online".to_string(), Value::Bool(self.is_online()));
        }
        view
    }
}

/// Zone (room or area)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_true() -> bool {
    true
}

/// Trigger, condition or action card of a flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FlowCard {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

/// Automation rule; normal and advanced flows share this shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub folder: Option<String>,
    #[serde(default)]
    pub broken: bool,
    #[serde(default)]
    pub trigger: Option<FlowCard>,
    #[serde(default)]
    pub conditions: Vec<FlowCard>,
    #[serde(default)]
    pub actions: Vec<FlowCard>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Flow {
    /// Reduced view for list tools
    pub fn to_compact(&self) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
            "enabled": self.enabled,
            "folder": self.folder,
            "broken": self.broken,
        })
    }

    pub fn to_view(&self, compact: bool) -> Value {
        if compact {
            self.to_compact()
        } else {
            serde_json::to_value(self).unwrap_or_else(|_| self.to_compact())
        }
    }
}

/// Flow folder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowFolder {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Hub-wide settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SystemConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub uptime: Option<f64>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    /// `metric` or `imperial`
    #[serde(default)]
    pub units: Option<String>,
    #[serde(default)]
    pub location: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SystemConfig {
    pub fn is_metric(&self) -> bool {
        self.units.as_deref() == Some("metric")
    }

    pub fn is_imperial(&self) -> bool {
        self.units.as_deref() == Some("imperial")
    }
}

/// Time window of an insights log query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InsightResolution {
    LastHour,
    Last6Hours,
    Last12Hours,
    Last24Hours,
    Last7Days,
    Last14Days,
    Last31Days,
}

impl InsightResolution {
    pub const ALL: [InsightResolution; 7] = [
        InsightResolution::LastHour,
        InsightResolution::Last6Hours,
        InsightResolution::Last12Hours,
        InsightResolution::Last24Hours,
        InsightResolution::Last7Days,
        InsightResolution::Last14Days,
        InsightResolution::Last31Days,
    ];

    /// Wire name used by the hub
    pub fn as_str(&self) -> &'static str {
        match self {
            InsightResolution::LastHour => "lastHour",
            InsightResolution::Last6Hours => "last6Hours",
            InsightResolution::Last12Hours => "last12Hours",
            InsightResolution::Last24Hours => "last24Hours",
            InsightResolution::Last7Days => "last7Days",
            InsightResolution::Last14Days => "last14Days",
            InsightResolution::Last31Days => "last31Days",
        }
    }
}

/// Insights log query for one device capability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightsQuery {
    pub capability: String,
    pub resolution: InsightResolution,
    #[serde(default)]
    pub from_timestamp: Option<i64>,
    #[serde(default)]
    pub to_timestamp: Option<i64>,
}

/// Trait for HomeyPro client implementations.
///
/// Connectivity failures must surface as connection or timeout errors so the
/// resilience layer can tell them apart from everything else. Collections
/// must carry stable `id`s.
#[async_trait]
pub trait HomeyClient: Send + Sync {
    /// All devices
    async fn get_devices(&self) -> Result<Vec<Device>>;

    /// One device by id
    async fn get_device(&self, device_id: &str) -> Result<Device>;

    /// Set a capability value; `false` when the hub refused it
    async fn set_capability_value(
        &self,
        device_id: &str,
        capability: &str,
        value: Value,
    ) -> Result<bool>;

    /// Logged values of one device capability
    async fn get_device_insights(&self, device_id: &str, query: &InsightsQuery) -> Result<Value>;

    /// All zones
    async fn get_zones(&self) -> Result<Vec<Zone>>;

    /// All normal flows
    async fn get_flows(&self) -> Result<Vec<Flow>>;

    /// One normal flow by id
    async fn get_flow(&self, flow_id: &str) -> Result<Flow>;

    /// Run a normal flow
    async fn trigger_flow(&self, flow_id: &str) -> Result<bool>;

    /// Enable or disable a normal flow
    async fn set_flow_enabled(&self, flow_id: &str, enabled: bool) -> Result<bool>;

    /// All advanced flows
    async fn get_advanced_flows(&self) -> Result<Vec<Flow>>;

    /// One advanced flow by id
    async fn get_advanced_flow(&self, flow_id: &str) -> Result<Flow>;

    /// Run an advanced flow
    async fn trigger_advanced_flow(&self, flow_id: &str) -> Result<bool>;

    /// Enable or disable an advanced flow
    async fn set_advanced_flow_enabled(&self, flow_id: &str, enabled: bool) -> Result<bool>;

    /// All flow folders
    async fn get_flow_folders(&self) -> Result<Vec<FlowFolder>>;

    /// Hub-wide settings
    async fn get_system_config(&self) -> Result<SystemConfig>;

    /// Release the connection
    async fn disconnect(&self) -> Result<()>;
}

type ClientFactory = Box<dyn Fn() -> Result<Arc<dyn HomeyClient>> + Send + Sync>;

/// Owns the process-lifetime client handle, created on first use
pub struct ClientManager {
    client: OnceCell<Arc<dyn HomeyClient>>,
    factory: ClientFactory,
}

impl ClientManager {
    /// Manager that builds an HTTP client from `config` on first use
    pub fn new(config: HubConfig) -> Self {
        Self {
            client: OnceCell::new(),
            factory: Box::new(move || {
                let client = http_client::HomeyHttpClient::new(&config)?;
                Ok(Arc::new(client) as Arc<dyn HomeyClient>)
            }),
        }
    }

    /// Manager around an already constructed client
    pub fn with_client(client: Arc<dyn HomeyClient>) -> Self {
        Self {
            client: OnceCell::new_with(Some(client)),
            factory: Box::new(|| {
                Err(HomeyError::config("client manager has no factory"))
            }),
        }
    }

    /// Get the client, creating it on first call
    pub async fn client(&self) -> Result<Arc<dyn HomeyClient>> {
        self.client
            .get_or_try_init(|| async {
                let client = (self.factory)().map_err(|e| {
                    error!("Failed to connect to Homey: {}", e);
                    e
                })?;
                info!("Homey client initialised");
                Ok::<_, HomeyError>(client)
            })
            .await
            .cloned()
    }

    /// Whether a client has been created
    pub fn is_initialized(&self) -> bool {
        self.client.initialized()
    }

    /// Disconnect the client if one was created
    pub async fn disconnect(&self) -> Result<()> {
        if let Some(client) = self.client.get() {
            client.disconnect().await.map_err(|e| {
                error!("Error disconnecting client: {}", e);
                e
            })?;
            info!("Homey client disconnected");
        }
        Ok(())
    }
}
