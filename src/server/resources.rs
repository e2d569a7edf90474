//! MCP Resources: cached read-only documents about the hub
//!
//! Available resource URIs:
//! - `homey://system/overview` - hub info, device and zone summary
//! - `homey://devices/registry` - every device with capability values
//! - `homey://zones/hierarchy` - zones with their devices and children
//! - `homey://flows/catalog` - normal flows with cards and statistics
//!
//! Each document is built from fresh hub reads and served through the
//! [`ResourceCache`](crate::server::response_cache::ResourceCache). When a
//! rebuild fails and an older document exists, the older one is served
//! with `cache_info.is_stale` set.

use crate::client::{Device, FlowCard};
use crate::config::CacheConfig;
use crate::error::{HomeyError, Result};
use crate::server::response_cache::CacheLookup;
use crate::server::HubContext;
use crate::utils::error_helpers::resource_failure;
use chrono::Utc;
use pulseengine_mcp_protocol::Resource;
use serde_json::{json, Map, Value};
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tracing::{debug, info};

const STALE_REASON: &str = "HomeyPro unreachable, using cached data";
const MAX_ZONE_NAMES: usize = 10;

/// The documents this server publishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    SystemOverview,
    DeviceRegistry,
    ZoneHierarchy,
    FlowCatalog,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::SystemOverview,
        ResourceKind::DeviceRegistry,
        ResourceKind::ZoneHierarchy,
        ResourceKind::FlowCatalog,
    ];

    pub fn uri(&self) -> &'static str {
        match self {
            ResourceKind::SystemOverview => "homey://system/overview",
            ResourceKind::DeviceRegistry => "homey://devices/registry",
            ResourceKind::ZoneHierarchy => "homey://zones/hierarchy",
            ResourceKind::FlowCatalog => "homey://flows/catalog",
        }
    }

    pub fn from_uri(uri: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.uri() == uri)
    }

    /// Cache key and `cache_info.data_type`
    pub fn data_type(&self) -> &'static str {
        match self {
            ResourceKind::SystemOverview => "system_overview",
            ResourceKind::DeviceRegistry => "device_registry",
            ResourceKind::ZoneHierarchy => "zone_hierarchy",
            ResourceKind::FlowCatalog => "flow_catalog",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ResourceKind::SystemOverview => "system overview",
            ResourceKind::DeviceRegistry => "device registry",
            ResourceKind::ZoneHierarchy => "zone hierarchy",
            ResourceKind::FlowCatalog => "flow catalog",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            ResourceKind::SystemOverview => {
                "System overview with device and zone counts and health indicators"
            }
            ResourceKind::DeviceRegistry => {
                "Device inventory with current states, capabilities and online status"
            }
            ResourceKind::ZoneHierarchy => "Zones with parent/child links and assigned devices",
            ResourceKind::FlowCatalog => "Flows with status, cards and statistics",
        }
    }

    pub fn ttl(&self, cache: &CacheConfig) -> Duration {
        match self {
            ResourceKind::SystemOverview => cache.system_overview_ttl,
            ResourceKind::DeviceRegistry => cache.device_registry_ttl,
            ResourceKind::ZoneHierarchy => cache.zone_hierarchy_ttl,
            ResourceKind::FlowCatalog => cache.flow_catalog_ttl,
        }
    }

    pub fn describe(&self) -> Resource {
        Resource {
            uri: self.uri().to_string(),
            name: self.label().to_string(),
            description: Some(self.description().to_string()),
            mime_type: Some("application/json".to_string()),
            annotations: None,
            raw: None,
        }
    }
}

/// Every published resource
pub fn list_resources() -> Vec<Resource> {
    ResourceKind::ALL.iter().map(ResourceKind::describe).collect()
}

/// Read a resource document. Unknown URIs are an error; hub failures are
/// reported inside the document.
pub async fn read_resource(ctx: &HubContext, uri: &str) -> Result<Value> {
    let kind = ResourceKind::from_uri(uri)
        .ok_or_else(|| HomeyError::not_found(format!("Resource {uri}")))?;
    Ok(read_kind(ctx, kind).await)
}

async fn read_kind(ctx: &HubContext, kind: ResourceKind) -> Value {
    let ttl = kind.ttl(&ctx.config().cache);
    let lookup = ctx
        .resource_cache()
        .get_or_fetch(kind.data_type(), ttl, || build(ctx, kind, ttl))
        .await;

    match lookup {
        Ok(CacheLookup::Fresh(document)) => {
            debug!("Serving fresh {}", kind.label());
            document
        }
        Ok(CacheLookup::Stale(envelope)) => {
            info!(
                "Returning stale {} data due to {} error",
                kind.label(),
                envelope.error_type
            );
            let mut document = envelope.data;
            if let Some(cache_info) = document.get_mut("cache_info").and_then(Value::as_object_mut) {
                cache_info.insert("is_stale".to_string(), Value::Bool(true));
                cache_info.insert("stale_reason".to_string(), json!(STALE_REASON));
                cache_info.insert("error_type".to_string(), json!(envelope.error_type));
            }
            document
        }
        Err(e) => resource_failure(kind.label(), &e),
    }
}

async fn build(ctx: &HubContext, kind: ResourceKind, ttl: Duration) -> Result<Value> {
    let mut document = match kind {
        ResourceKind::SystemOverview => system_overview(ctx).await?,
        ResourceKind::DeviceRegistry => device_registry(ctx).await?,
        ResourceKind::ZoneHierarchy => zone_hierarchy(ctx).await?,
        ResourceKind::FlowCatalog => flow_catalog(ctx).await?,
    };
    document["timestamp"] = json!(Utc::now().timestamp_millis() as f64 / 1000.0);
    document["cache_info"] = json!({
        "ttl_seconds": ttl.as_secs(),
        "data_type": kind.data_type(),
    });
    Ok(document)
}

fn online_count(devices: &[Device]) -> usize {
    devices.iter().filter(|device| device.available).count()
}

async fn system_overview(ctx: &HubContext) -> Result<Value> {
    let system = ctx.system_config().await?;
    let devices = ctx.devices().await?;
    let zones = ctx.zones().await?;

    let total = devices.len();
    let online = online_count(&devices);
    let device_types: BTreeSet<&str> = devices
        .iter()
        .map(|device| device.class.as_str())
        .filter(|class| !class.is_empty())
        .collect();
    let capabilities: BTreeSet<&str> = devices
        .iter()
        .flat_map(|device| device.capabilities.iter().map(String::as_str))
        .collect();
    let health_percentage = if total == 0 {
        100.0
    } else {
        (online as f64 / total as f64 * 1000.0).round() / 10.0
    };

    info!(
        "System overview generated: {} devices, {} online, {} zones",
        total,
        online,
        zones.len()
    );
    Ok(json!({
        "system_info": {
            "name": system.name.as_deref().unwrap_or("Unknown"),
            "version": system.version.as_deref().unwrap_or("Unknown"),
            "platform": system.platform.as_deref().unwrap_or("Unknown"),
            "uptime": system.uptime.unwrap_or(0.0),
        },
        "device_summary": {
            "total_count": total,
            "online_count": online,
            "offline_count": total - online,
            "device_types_count": device_types.len(),
            "capabilities_count": capabilities.len(),
            "health_percentage": health_percentage,
        },
        "zone_summary": {
            "total_count": zones.len(),
            "zone_names": zones.iter().take(MAX_ZONE_NAMES).map(|zone| &zone.name).collect::<Vec<_>>(),
        },
    }))
}

async fn device_registry(ctx: &HubContext) -> Result<Value> {
    let devices = ctx.devices().await?;
    let mut device_types = BTreeSet::new();
    let mut capabilities = BTreeSet::new();

    let entries: Vec<Value> = devices
        .iter()
        .map(|device| {
            if !device.class.is_empty() {
                device_types.insert(device.class.clone());
            }
            capabilities.extend(device.capabilities.iter().cloned());
            let flags: Map<String, Value> = device
                .capabilities
                .iter()
                .map(|capability| (capability.clone(), Value::Bool(true)))
                .collect();
            json!({
                "id": device.id,
                "name": device.name,
                "zone": device.zone,
                "class": device.class,
                "available": device.available,
                "capabilities": flags,
                "capability_values": device.capability_values(),
            })
        })
        .collect();

    let online = online_count(&devices);
    info!("Device registry generated: {} devices, {} online", devices.len(), online);
    Ok(json!({
        "devices": entries,
        "summary": {
            "total_count": devices.len(),
            "online_count": online,
            "offline_count": devices.len() - online,
            "device_types": device_types,
            "capabilities": capabilities,
        },
    }))
}

/// Zone type from the icon, else from keywords in the name
fn zone_type(name: &str, icon: Option<&str>) -> String {
    if let Some(icon) = icon.filter(|icon| !icon.is_empty()) {
        return icon.to_string();
    }
    let name = name.to_lowercase();
    let has_any = |keywords: &[&str]| keywords.iter().any(|keyword| name.contains(keyword));
    if has_any(&["bedroom", "living", "kitchen", "bathroom"]) {
        "room".to_string()
    } else if has_any(&["outdoor", "garden", "garage"]) {
        "outdoor".to_string()
    } else {
        "general".to_string()
    }
}

async fn zone_hierarchy(ctx: &HubContext) -> Result<Value> {
    let zones = ctx.zones().await?;
    let devices = ctx.devices().await?;

    let mut devices_by_zone: HashMap<&str, Vec<&Device>> = HashMap::new();
    for device in &devices {
        if let Some(zone_id) = device.zone.as_deref() {
            devices_by_zone.entry(zone_id).or_default().push(device);
        }
    }

    let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
    for zone in &zones {
        if let Some(parent) = zone.parent.as_deref() {
            if zones.iter().any(|candidate| candidate.id == parent) {
                children.entry(parent).or_default().push(zone.id.as_str());
            }
        }
    }

    let mut zone_types = BTreeSet::new();
    let mut zones_with_devices = 0;
    let mut total_assigned = 0;

    let entries: Vec<Value> = zones
        .iter()
        .map(|zone| {
            let members = devices_by_zone.get(zone.id.as_str()).map(Vec::as_slice).unwrap_or(&[]);
            if !members.is_empty() {
                zones_with_devices += 1;
                total_assigned += members.len();
            }
            let kind = zone_type(&zone.name, zone.icon.as_deref());
            zone_types.insert(kind.clone());

            let mut entry = json!({
                "id": zone.id,
                "name": zone.name,
                "parent": zone.parent,
                "active": zone.active,
                "icon": zone.icon,
                "devices": members
                    .iter()
                    .map(|device| json!({
                        "id": device.id,
                        "name": device.name,
                        "class": device.class,
                        "available": device.available,
                    }))
                    .collect::<Vec<_>>(),
                "device_count": members.len(),
                "online_device_count": members.iter().filter(|device| device.available).count(),
                "type": kind,
            });
            if let Some(child_ids) = children.get(zone.id.as_str()) {
                entry["children"] = json!(child_ids);
            }
            entry
        })
        .collect();

    info!(
        "Zone hierarchy generated: {} zones, {} with devices",
        zones.len(),
        zones_with_devices
    );
    Ok(json!({
        "zones": entries,
        "summary": {
            "total_zones": zones.len(),
            "zones_with_devices": zones_with_devices,
            "total_devices_assigned": total_assigned,
            "zone_types": zone_types,
        },
    }))
}

fn card(card: &FlowCard) -> Value {
    json!({"id": card.id, "uri": card.uri, "title": card.title})
}

/// Part of a card URI before the first ':' (e.g. `homey` in
/// `homey:manager:cron`)
fn trigger_type(uri: &str) -> &str {
    uri.split_once(':').map_or("unknown", |(prefix, _)| prefix)
}

async fn flow_catalog(ctx: &HubContext) -> Result<Value> {
    let flows = ctx.flows().await?;
    let mut flow_types = BTreeSet::new();
    let mut trigger_types = BTreeSet::new();

    let entries: Vec<Value> = flows
        .iter()
        .map(|flow| {
            let kind = flow
                .extra
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            flow_types.insert(kind.clone());

            if let Some(uri) = flow.trigger.as_ref().and_then(|t| t.uri.as_deref()) {
                trigger_types.insert(trigger_type(uri).to_string());
            }
            let has_trigger = flow.trigger.as_ref().is_some_and(|t| !t.id.is_empty());

            json!({
                "id": flow.id,
                "name": flow.name,
                "enabled": flow.enabled,
                "folder": flow.folder,
                "type": kind,
                "trigger": flow.trigger.as_ref().map_or_else(|| json!({}), card),
                "conditions": flow.conditions.iter().map(card).collect::<Vec<_>>(),
                "actions": flow.actions.iter().map(card).collect::<Vec<_>>(),
                "broken": flow.broken,
                "last_executed": flow.extra.get("lastExecuted").cloned().unwrap_or(Value::Null),
                "statistics": {
                    "condition_count": flow.conditions.len(),
                    "action_count": flow.actions.len(),
                    "has_trigger": has_trigger,
                    "is_broken": flow.broken,
                },
            })
        })
        .collect();

    let enabled = flows.iter().filter(|flow| flow.enabled).count();
    info!("Flow catalog generated: {} flows, {} enabled", flows.len(), enabled);
    Ok(json!({
        "flows": entries,
        "summary": {
            "total_count": flows.len(),
            "enabled_count": enabled,
            "disabled_count": flows.len() - enabled,
            "flow_types": flow_types,
            "trigger_types": trigger_types,
        },
    }))
}
