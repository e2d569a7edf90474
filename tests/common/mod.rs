//! Common test utilities
//!
//! [`FixtureHub`] is an in-memory hub behind the public [`HomeyClient`]
//! trait. Individual operations can be switched to fail with a
//! connection error, and every call is counted.

#![allow(dead_code)]

use async_trait::async_trait;
use homey_mcp_rust::client::{
    Device, Flow, FlowFolder, HomeyClient, InsightsQuery, SystemConfig, Zone,
};
use homey_mcp_rust::error_recovery::RetryPolicy;
use pulseengine_mcp_protocol::Content;
use homey_mcp_rust::{HomeyError, HubContext, Result, ServerConfig};
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct HubState {
    devices: Vec<Device>,
    zones: Vec<Zone>,
    flows: Vec<Flow>,
    advanced_flows: Vec<Flow>,
    folders: Vec<FlowFolder>,
    system: SystemConfig,
    failing: HashSet<String>,
    calls: HashMap<String, usize>,
}

#[derive(Default)]
pub struct FixtureHub {
    state: Mutex<HubState>,
}

impl FixtureHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Living room and kitchen with two lights, one offline sensor and a
    /// mix of normal and advanced flows
    pub fn furnished() -> Self {
        let hub = Self::new();
        {
            let mut state = hub.lock();
            state.zones = vec![
                zone("home", "Home", None),
                zone("living", "Living room", Some("home")),
                zone("kitchen", "Kitchen", Some("home")),
            ];
            state.devices = vec![
                light("lamp-1", "Floor lamp", "living", true),
                light("lamp-2", "Kitchen spots", "kitchen", false),
                thermometer("temp-1", "Living thermometer", "living", 21.5),
            ];
            state.flows = vec![
                flow("flow-morning", "Good morning", true, Some("folder-daily")),
                flow("flow-night", "Good night", false, None),
            ];
            state.advanced_flows = vec![flow("adv-alarm", "Alarm scene", true, None)];
            state.folders = vec![FlowFolder {
                id: "folder-daily".to_string(),
                name: "Daily".to_string(),
                parent: None,
                extra: Map::new(),
            }];
            state.system = SystemConfig {
                name: Some("Homey Pro".to_string()),
                version: Some("12.0.1".to_string()),
                units: Some("metric".to_string()),
                ..SystemConfig::default()
            };
        }
        hub
    }

    pub fn with_devices(self, devices: Vec<Device>) -> Self {
        self.lock().devices = devices;
        self
    }

    /// Make `operation` fail with a connection error
    pub fn break_operation(&self, operation: &str) {
        self.lock().failing.insert(operation.to_string());
    }

    pub fn restore_operation(&self, operation: &str) {
        self.lock().failing.remove(operation);
    }

    pub fn calls(&self, operation: &str) -> usize {
        self.lock().calls.get(operation).copied().unwrap_or(0)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn enter(&self, operation: &str) -> Result<std::sync::MutexGuard<'_, HubState>> {
        let mut state = self.lock();
        *state.calls.entry(operation.to_string()).or_default() += 1;
        if state.failing.contains(operation) {
            return Err(HomeyError::connection(format!("{operation}: hub unreachable")));
        }
        Ok(state)
    }
}

fn lookup<T: Clone>(items: &[T], id: &str, id_of: fn(&T) -> &str) -> Result<T> {
    items
        .iter()
        .find(|item| id_of(item) == id)
        .cloned()
        .ok_or_else(|| HomeyError::not_found(id.to_string()))
}

#[async_trait]
impl HomeyClient for FixtureHub {
    async fn get_devices(&self) -> Result<Vec<Device>> {
        Ok(self.enter("get_devices")?.devices.clone())
    }

    async fn get_device(&self, device_id: &str) -> Result<Device> {
        lookup(&self.enter("get_device")?.devices, device_id, |d| d.id.as_str())
    }

    async fn set_capability_value(
        &self,
        device_id: &str,
        capability: &str,
        value: Value,
    ) -> Result<bool> {
        let mut state = self.enter("set_capability_value")?;
        let device = state
            .devices
            .iter_mut()
            .find(|d| d.id == device_id)
            .ok_or_else(|| HomeyError::not_found(device_id.to_string()))?;
        device
            .capabilities_obj
            .insert(capability.to_string(), json!({ "value": value }));
        Ok(true)
    }

    async fn get_device_insights(&self, device_id: &str, query: &InsightsQuery) -> Result<Value> {
        let state = self.enter("get_device_insights")?;
        let device = lookup(&state.devices, device_id, |d| d.id.as_str())?;
        let value = device
            .capability_value(&query.capability)
            .cloned()
            .ok_or_else(|| HomeyError::not_found(query.capability.clone()))?;
        Ok(json!({
            "resolution": query.resolution,
            "from": query.from_timestamp,
            "to": query.to_timestamp,
            "values": [{ "v": value }],
        }))
    }

    async fn get_zones(&self) -> Result<Vec<Zone>> {
        Ok(self.enter("get_zones")?.zones.clone())
    }

    async fn get_flows(&self) -> Result<Vec<Flow>> {
        Ok(self.enter("get_flows")?.flows.clone())
    }

    async fn get_flow(&self, flow_id: &str) -> Result<Flow> {
        lookup(&self.enter("get_flow")?.flows, flow_id, |f| f.id.as_str())
    }

    async fn trigger_flow(&self, _flow_id: &str) -> Result<bool> {
        self.enter("trigger_flow")?;
        Ok(true)
    }

    async fn set_flow_enabled(&self, flow_id: &str, enabled: bool) -> Result<bool> {
        let mut state = self.enter("set_flow_enabled")?;
        if let Some(flow) = state.flows.iter_mut().find(|f| f.id == flow_id) {
            flow.enabled = enabled;
        }
        Ok(true)
    }

    async fn get_advanced_flows(&self) -> Result<Vec<Flow>> {
        Ok(self.enter("get_advanced_flows")?.advanced_flows.clone())
    }

    async fn get_advanced_flow(&self, flow_id: &str) -> Result<Flow> {
        lookup(&self.enter("get_advanced_flow")?.advanced_flows, flow_id, |f| {
            f.id.as_str()
        })
    }

    async fn trigger_advanced_flow(&self, _flow_id: &str) -> Result<bool> {
        self.enter("trigger_advanced_flow")?;
        Ok(true)
    }

    async fn set_advanced_flow_enabled(&self, flow_id: &str, enabled: bool) -> Result<bool> {
        let mut state = self.enter("set_advanced_flow_enabled")?;
        if let Some(flow) = state.advanced_flows.iter_mut().find(|f| f.id == flow_id) {
            flow.enabled = enabled;
        }
        Ok(true)
    }

    async fn get_flow_folders(&self) -> Result<Vec<FlowFolder>> {
        Ok(self.enter("get_flow_folders")?.folders.clone())
    }

    async fn get_system_config(&self) -> Result<SystemConfig> {
        Ok(self.enter("get_system_config")?.system.clone())
    }

    async fn disconnect(&self) -> Result<()> {
        self.enter("disconnect")?;
        Ok(())
    }
}

pub fn light(id: &str, name: &str, zone: &str, available: bool) -> Device {
    let mut capabilities_obj = Map::new();
    capabilities_obj.insert("onoff".to_string(), json!({ "value": false }));
    capabilities_obj.insert("dim".to_string(), json!({ "value": 0.5 }));
    Device {
        id: id.to_string(),
        name: name.to_string(),
        zone: Some(zone.to_string()),
        class: "light".to_string(),
        capabilities: vec!["onoff".to_string(), "dim".to_string()],
        capabilities_obj,
        available,
        hidden: false,
        note: None,
        extra: Map::new(),
    }
}

pub fn thermometer(id: &str, name: &str, zone: &str, temperature: f64) -> Device {
    let mut capabilities_obj = Map::new();
    capabilities_obj.insert(
        "measure_temperature".to_string(),
        json!({ "value": temperature }),
    );
    Device {
        id: id.to_string(),
        name: name.to_string(),
        zone: Some(zone.to_string()),
        class: "sensor".to_string(),
        capabilities: vec!["measure_temperature".to_string()],
        capabilities_obj,
        available: true,
        hidden: false,
        note: None,
        extra: Map::new(),
    }
}

pub fn zone(id: &str, name: &str, parent: Option<&str>) -> Zone {
    Zone {
        id: id.to_string(),
        name: name.to_string(),
        parent: parent.map(str::to_string),
        active: true,
        icon: None,
        extra: Map::new(),
    }
}

pub fn flow(id: &str, name: &str, enabled: bool, folder: Option<&str>) -> Flow {
    Flow {
        id: id.to_string(),
        name: name.to_string(),
        enabled,
        folder: folder.map(str::to_string),
        broken: false,
        trigger: None,
        conditions: Vec::new(),
        actions: Vec::new(),
        extra: Map::new(),
    }
}

/// Configuration without retries so failures surface immediately
pub fn test_config() -> ServerConfig {
    ServerConfig {
        retry: RetryPolicy::no_retry(),
        ..ServerConfig::default()
    }
}

pub fn context_with(hub: Arc<FixtureHub>, config: ServerConfig) -> Arc<HubContext> {
    Arc::new(HubContext::with_client(config, hub))
}

pub fn context(hub: Arc<FixtureHub>) -> Arc<HubContext> {
    context_with(hub, test_config())
}

/// Decode the JSON text inside an MCP `tools/call` or `resources/read` result
/// JSON document carried by a text content block
pub fn payload_text(content: &Content) -> Value {
    match content {
        Content::Text { text, .. } => serde_json::from_str(text).expect("JSON payload"),
        _ => panic!("expected text content"),
    }
}
