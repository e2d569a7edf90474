//! Device listing, search and control tools

use crate::client::{Device, InsightResolution, InsightsQuery};
use crate::server::HubContext;
use crate::tools::{cursor_property, no_args_schema, page_response, ToolRegistry};
use crate::utils::error_helpers::{pagination_failure, tool_failure, with_context};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

fn default_compact() -> bool {
    true
}

/// Arguments for `list_devices`
#[derive(Debug, Deserialize)]
pub struct ListDevicesArgs {
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default = "default_compact")]
    pub compact: bool,
}

/// Arguments for `get_device`
#[derive(Debug, Deserialize)]
pub struct GetDeviceArgs {
    pub device_id: String,
    #[serde(default = "default_compact")]
    pub compact: bool,
}

/// Arguments for the search tools
#[derive(Debug, Deserialize)]
pub struct SearchDevicesArgs {
    pub query: String,
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default = "default_compact")]
    pub compact: bool,
}

/// Arguments for `control_device`
#[derive(Debug, Deserialize)]
pub struct ControlDeviceArgs {
    pub device_id: String,
    pub capability: String,
    pub value: Value,
}

/// Arguments for `get_device_insights`
#[derive(Debug, Deserialize)]
pub struct DeviceInsightsArgs {
    pub device_id: String,
    #[serde(flatten)]
    pub query: InsightsQuery,
}

/// Which device field a search matches against
#[derive(Debug, Clone, Copy)]
enum SearchField {
    Name,
    Class,
}

pub(crate) fn register(registry: &mut ToolRegistry) {
    let compact = json!({
        "type": "boolean",
        "description": "Compact results, true by default. Switch only if really needed",
        "default": true
    });

    registry.register(
        "list_devices",
        "List all devices with pagination support",
        json!({
            "type": "object",
            "properties": {"cursor": cursor_property(), "compact": compact},
        }),
        list_devices,
    );
    registry.register(
        "get_device",
        "Get detailed information about a specific device",
        json!({
            "type": "object",
            "properties": {
                "device_id": {"type": "string", "description": "Device identifier"},
                "compact": compact,
            },
            "required": ["device_id"],
        }),
        get_device,
    );
    registry.register(
        "get_devices_classes",
        "List the device classes present on the hub. Query before searching by class",
        no_args_schema(),
        |ctx, _: Value| get_devices_classes(ctx),
    );
    registry.register(
        "get_devices_capabilities",
        "List the capabilities present on the hub",
        no_args_schema(),
        |ctx, _: Value| get_devices_capabilities(ctx),
    );

    let search_schema = json!({
        "type": "object",
        "properties": {
            "query": {"type": "string"},
            "cursor": cursor_property(),
            "compact": compact,
        },
        "required": ["query"],
    });
    registry.register(
        "search_devices_by_name",
        "Search devices by name (case-insensitive substring). The note field can help too",
        search_schema.clone(),
        search_devices_by_name,
    );
    registry.register(
        "search_devices_by_class",
        "Search devices by class (case-insensitive substring)",
        search_schema,
        search_devices_by_class,
    );
    registry.register(
        "control_device",
        "Control a device by setting a capability value",
        json!({
            "type": "object",
            "properties": {
                "device_id": {"type": "string"},
                "capability": {
                    "type": "string",
                    "description": "Capability to set, e.g. onoff, dim, target_temperature"
                },
                "value": {
                    "description": "Value to set; strings holding JSON are decoded first",
                    "type": ["boolean", "number", "string"]
                },
            },
            "required": ["device_id", "capability", "value"],
        }),
        control_device,
    );
    registry.register(
        "get_device_insights",
        "Get logged values of a device capability over a time window",
        json!({
            "type": "object",
            "properties": {
                "device_id": {"type": "string", "description": "Device identifier"},
                "capability": {
                    "type": "string",
                    "description": "Capability to get insights for, e.g. measure_power"
                },
                "resolution": {
                    "type": "string",
                    "description": "Resolution for insights",
                    "enum": InsightResolution::ALL.map(|r| r.as_str()),
                },
                "from_timestamp": {
                    "type": "integer",
                    "description": "Timestamp to start insights from"
                },
                "to_timestamp": {
                    "type": "integer",
                    "description": "Timestamp to end insights on"
                },
            },
            "required": ["device_id", "capability", "resolution"],
        }),
        get_device_insights,
    );
}

fn visible_views(devices: Vec<Device>, compact: bool) -> Vec<Value> {
    devices
        .iter()
        .filter(|device| !device.hidden)
        .map(|device| device.to_view(compact))
        .collect()
}

/// List visible devices, one page at a time
pub async fn list_devices(ctx: Arc<HubContext>, args: ListDevicesArgs) -> Value {
    let codec = ctx.codec();
    let params = match codec.parse(args.cursor.as_deref()) {
        Ok(params) => params,
        Err(e) => return pagination_failure(&e),
    };

    match ctx.devices().await {
        Ok(devices) => {
            let views = visible_views(devices, args.compact);
            page_response("devices", codec.paginate(views, &params), json!({}))
        }
        Err(e) => tool_failure("list devices", &e),
    }
}

/// One device with its capability states
pub async fn get_device(ctx: Arc<HubContext>, args: GetDeviceArgs) -> Value {
    match ctx.device(&args.device_id).await {
        Ok(device) => {
            let mut view = device.to_view(args.compact);
            view["capabilities_detailed"] = Value::Object(device.capabilities_obj.clone());
            json!({ "device": view })
        }
        Err(e) => with_context(
            tool_failure("get device", &e),
            &[("device_id", json!(args.device_id))],
        ),
    }
}

/// Distinct device classes, sorted
pub async fn get_devices_classes(ctx: Arc<HubContext>) -> Value {
    match ctx.devices().await {
        Ok(devices) => {
            let classes: BTreeSet<_> = devices
                .into_iter()
                .map(|device| device.class)
                .filter(|class| !class.is_empty())
                .collect();
            json!({ "classes": classes })
        }
        Err(e) => tool_failure("get device classes", &e),
    }
}

/// Distinct capability ids, sorted
pub async fn get_devices_capabilities(ctx: Arc<HubContext>) -> Value {
    match ctx.devices().await {
        Ok(devices) => {
            let capabilities: BTreeSet<_> = devices
                .into_iter()
                .flat_map(|device| device.capabilities)
                .collect();
            json!({ "capabilities": capabilities })
        }
        Err(e) => tool_failure("get device capabilities", &e),
    }
}

pub async fn search_devices_by_name(ctx: Arc<HubContext>, args: SearchDevicesArgs) -> Value {
    search_devices(ctx, args, SearchField::Name).await
}

pub async fn search_devices_by_class(ctx: Arc<HubContext>, args: SearchDevicesArgs) -> Value {
    search_devices(ctx, args, SearchField::Class).await
}

async fn search_devices(ctx: Arc<HubContext>, args: SearchDevicesArgs, field: SearchField) -> Value {
    let query_context = [("query", json!(args.query))];
    let codec = ctx.codec();
    let params = match codec.parse(args.cursor.as_deref()) {
        Ok(params) => params,
        Err(e) => return with_context(pagination_failure(&e), &query_context),
    };

    let devices = match ctx.devices().await {
        Ok(devices) => devices,
        Err(e) => return with_context(tool_failure("search devices", &e), &query_context),
    };

    let needle = args.query.to_lowercase();
    let matches: Vec<Device> = devices
        .into_iter()
        .filter(|device| {
            let haystack = match field {
                SearchField::Name => &device.name,
                SearchField::Class => &device.class,
            };
            haystack.to_lowercase().contains(&needle)
        })
        .collect();
    debug!(query = %args.query, ?field, "Search matched {} devices", matches.len());

    let views = visible_views(matches, args.compact);
    page_response(
        "devices",
        codec.paginate(views, &params),
        json!({ "query": args.query }),
    )
}

/// Strings that hold a JSON document are decoded; anything else is kept
fn decode_value(value: Value) -> Value {
    match value {
        Value::String(raw) => serde_json::from_str(&raw).unwrap_or(Value::String(raw)),
        other => other,
    }
}

/// Set a capability and report the value the hub now holds
pub async fn control_device(ctx: Arc<HubContext>, args: ControlDeviceArgs) -> Value {
    let value = decode_value(args.value);
    let request_context = [
        ("device_id", json!(args.device_id)),
        ("capability", json!(args.capability)),
        ("requested_value", value.clone()),
    ];

    let client = match ctx.client().await {
        Ok(client) => client,
        Err(e) => return with_context(tool_failure("control device", &e), &request_context),
    };

    let accepted = match client
        .set_capability_value(&args.device_id, &args.capability, value.clone())
        .await
    {
        Ok(accepted) => accepted,
        Err(e) => return with_context(tool_failure("control device", &e), &request_context),
    };

    if !accepted {
        return with_context(
            json!({"success": false, "error": "Failed to set capability value"}),
            &request_context,
        );
    }

    match ctx.device(&args.device_id).await {
        Ok(device) => {
            info!(
                "Set {}.{} on {} to {}",
                args.device_id, args.capability, device.name, value
            );
            json!({
                "success": true,
                "device_id": args.device_id,
                "capability": args.capability,
                "requested_value": value,
                "current_value": device.capability_value(&args.capability),
                "device_name": device.name,
            })
        }
        Err(e) => with_context(tool_failure("control device", &e), &request_context),
    }
}

/// Logged values of one device capability
pub async fn get_device_insights(ctx: Arc<HubContext>, args: DeviceInsightsArgs) -> Value {
    debug!(
        "Insights for {}.{} ({})",
        args.device_id,
        args.query.capability,
        args.query.resolution.as_str()
    );
    match ctx.device_insights(&args.device_id, &args.query).await {
        Ok(insights) => json!({ "insights": insights, "device_id": args.device_id }),
        Err(e) => with_context(
            tool_failure("get device insights", &e),
            &[
                ("device_id", json!(args.device_id)),
                ("capability", json!(args.query.capability)),
            ],
        ),
    }
}
