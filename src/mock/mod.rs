//! Mock implementations for testing
//!
//! [`MockHomeyClient`] serves canned devices, zones and flows from memory,
//! records every call, and can be told to fail individual operations.

use crate::client::{Device, Flow, FlowFolder, HomeyClient, InsightsQuery, SystemConfig, Zone};
use crate::error::{HomeyError, Result};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Mutex;

/// How an injected failure surfaces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    Connection,
    Timeout,
    Other,
}

impl MockFailure {
    fn to_error(self, operation: &str) -> HomeyError {
        match self {
            MockFailure::Connection => {
                HomeyError::connection(format!("{operation}: connection refused"))
            }
            MockFailure::Timeout => HomeyError::timeout(format!("{operation}: timed out")),
            MockFailure::Other => {
                HomeyError::external_service(format!("{operation}: internal error"))
            }
        }
    }
}

#[derive(Default)]
struct MockState {
    devices: Vec<Device>,
    zones: Vec<Zone>,
    flows: Vec<Flow>,
    advanced_flows: Vec<Flow>,
    folders: Vec<FlowFolder>,
    system: SystemConfig,
    failures: HashMap<String, MockFailure>,
    refused_mutations: bool,
    calls: Vec<String>,
}

/// Mock Homey client for testing
#[derive(Default)]
pub struct MockHomeyClient {
    state: Mutex<MockState>,
}

impl MockHomeyClient {
    /// Create new mock client with no data
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_devices(self, devices: Vec<Device>) -> Self {
        self.lock().devices = devices;
        self
    }

    pub fn with_zones(self, zones: Vec<Zone>) -> Self {
        self.lock().zones = zones;
        self
    }

    pub fn with_flows(self, flows: Vec<Flow>) -> Self {
        self.lock().flows = flows;
        self
    }

    pub fn with_advanced_flows(self, flows: Vec<Flow>) -> Self {
        self.lock().advanced_flows = flows;
        self
    }

    pub fn with_folders(self, folders: Vec<FlowFolder>) -> Self {
        self.lock().folders = folders;
        self
    }

    pub fn with_system(self, system: SystemConfig) -> Self {
        self.lock().system = system;
        self
    }

    /// Make `operation` (a trait method name) fail until cleared
    pub fn fail(&self, operation: &str, failure: MockFailure) {
        self.lock().failures.insert(operation.to_string(), failure);
    }

    /// Stop failing `operation`
    pub fn recover(&self, operation: &str) {
        self.lock().failures.remove(operation);
    }

    /// Make every mutation report `false`
    pub fn refuse_mutations(&self) {
        self.lock().refused_mutations = true;
    }

    /// Names of the trait methods called so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// How many times `operation` was called
    pub fn call_count(&self, operation: &str) -> usize {
        self.lock().calls.iter().filter(|c| *c == operation).count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, operation: &str) -> Result<std::sync::MutexGuard<'_, MockState>> {
        let mut state = self.lock();
        state.calls.push(operation.to_string());
        if let Some(failure) = state.failures.get(operation).copied() {
            return Err(failure.to_error(operation));
        }
        Ok(state)
    }
}

fn find<T: Clone>(items: &[T], id: &str, id_of: impl Fn(&T) -> &str, kind: &str) -> Result<T> {
    items
        .iter()
        .find(|item| id_of(item) == id)
        .cloned()
        .ok_or_else(|| HomeyError::not_found(format!("{kind} {id}")))
}

#[async_trait]
impl HomeyClient for MockHomeyClient {
    async fn get_devices(&self) -> Result<Vec<Device>> {
        Ok(self.record("get_devices")?.devices.clone())
    }

    async fn get_device(&self, device_id: &str) -> Result<Device> {
        let state = self.record("get_device")?;
        find(&state.devices, device_id, |d| d.id.as_str(), "Device")
    }

    async fn set_capability_value(
        &self,
        device_id: &str,
        capability: &str,
        value: Value,
    ) -> Result<bool> {
        let mut state = self.record("set_capability_value")?;
        if state.refused_mutations {
            return Ok(false);
        }
        let device = state
            .devices
            .iter_mut()
            .find(|d| d.id == device_id)
            .ok_or_else(|| HomeyError::not_found(format!("Device {device_id}")))?;
        device
            .capabilities_obj
            .insert(capability.to_string(), json!({ "value": value }));
        Ok(true)
    }

    /// One entry holding the capability's current value
    async fn get_device_insights(&self, device_id: &str, query: &InsightsQuery) -> Result<Value> {
        let state = self.record("get_device_insights")?;
        let device = find(&state.devices, device_id, |d| d.id.as_str(), "Device")?;
        let value = device
            .capability_value(&query.capability)
            .cloned()
            .ok_or_else(|| HomeyError::not_found(format!("Insights log {}", query.capability)))?;
        Ok(json!({
            "resolution": query.resolution,
            "values": [{ "v": value }],
        }))
    }

    async fn get_zones(&self) -> Result<Vec<Zone>> {
        Ok(self.record("get_zones")?.zones.clone())
    }

    async fn get_flows(&self) -> Result<Vec<Flow>> {
        Ok(self.record("get_flows")?.flows.clone())
    }

    async fn get_flow(&self, flow_id: &str) -> Result<Flow> {
        let state = self.record("get_flow")?;
        find(&state.flows, flow_id, |f| f.id.as_str(), "Flow")
    }

    async fn trigger_flow(&self, _flow_id: &str) -> Result<bool> {
        Ok(!self.record("trigger_flow")?.refused_mutations)
    }

    async fn set_flow_enabled(&self, flow_id: &str, enabled: bool) -> Result<bool> {
        let mut state = self.record("set_flow_enabled")?;
        if state.refused_mutations {
            return Ok(false);
        }
        if let Some(flow) = state.flows.iter_mut().find(|f| f.id == flow_id) {
            flow.enabled = enabled;
        }
        Ok(true)
    }

    async fn get_advanced_flows(&self) -> Result<Vec<Flow>> {
        Ok(self.record("get_advanced_flows")?.advanced_flows.clone())
    }

    async fn get_advanced_flow(&self, flow_id: &str) -> Result<Flow> {
        let state = self.record("get_advanced_flow")?;
        find(&state.advanced_flows, flow_id, |f| f.id.as_str(), "Advanced flow")
    }

    async fn trigger_advanced_flow(&self, _flow_id: &str) -> Result<bool> {
        Ok(!self.record("trigger_advanced_flow")?.refused_mutations)
    }

    async fn set_advanced_flow_enabled(&self, flow_id: &str, enabled: bool) -> Result<bool> {
        let mut state = self.record("set_advanced_flow_enabled")?;
        if state.refused_mutations {
            return Ok(false);
        }
        if let Some(flow) = state.advanced_flows.iter_mut().find(|f| f.id == flow_id) {
            flow.enabled = enabled;
        }
        Ok(true)
    }

    async fn get_flow_folders(&self) -> Result<Vec<FlowFolder>> {
        Ok(self.record("get_flow_folders")?.folders.clone())
    }

    async fn get_system_config(&self) -> Result<SystemConfig> {
        Ok(self.record("get_system_config")?.system.clone())
    }

    async fn disconnect(&self) -> Result<()> {
        self.record("disconnect")?;
        Ok(())
    }
}

/// Device fixture
pub fn device(id: &str, name: &str, zone: &str, class: &str) -> Device {
    Device {
        id: id.to_string(),
        name: name.to_string(),
        zone: Some(zone.to_string()),
        class: class.to_string(),
        capabilities: Vec::new(),
        capabilities_obj: Map::new(),
        available: true,
        hidden: false,
        note: None,
        extra: Map::new(),
    }
}

/// Device fixture with a `measure_temperature` reading
pub fn thermometer(id: &str, name: &str, zone: &str, temperature: f64) -> Device {
    let mut device = device(id, name, zone, "sensor");
    device.capabilities.push("measure_temperature".to_string());
    device
        .capabilities_obj
        .insert("measure_temperature".to_string(), json!({ "value": temperature }));
    device
}

/// Zone fixture
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

/// Flow fixture
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

/// Flow folder fixture
pub fn folder(id: &str, name: &str) -> FlowFolder {
    FlowFolder {
        id: id.to_string(),
        name: name.to_string(),
        parent: None,
        extra: Map::new(),
    }
}
