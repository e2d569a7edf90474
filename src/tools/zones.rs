//! Zone tools

use crate::client::Device;
use crate::server::HubContext;
use crate::tools::{cursor_property, page_response, ToolRegistry};
use crate::utils::error_helpers::{pagination_failure, tool_failure, with_context};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

const TEMPERATURE_CAPABILITY: &str = "measure_temperature";

#[derive(Debug, Deserialize)]
pub struct ListZonesArgs {
    #[serde(default)]
    pub cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ZoneDevicesArgs {
    pub zone_id: String,
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default = "default_compact")]
    pub compact: bool,
}

#[derive(Debug, Deserialize)]
pub struct ZoneTempArgs {
    pub zone_id: String,
}

fn default_compact() -> bool {
    true
}

pub(crate) fn register(registry: &mut ToolRegistry) {
    registry.register(
        "list_zones",
        "List all zones with pagination support",
        json!({"type": "object", "properties": {"cursor": cursor_property()}}),
        list_zones,
    );
    registry.register(
        "get_zone_devices",
        "Get all devices in a zone with pagination support",
        json!({
            "type": "object",
            "properties": {
                "zone_id": {"type": "string"},
                "cursor": cursor_property(),
                "compact": {"type": "boolean", "default": true},
            },
            "required": ["zone_id"],
        }),
        get_zone_devices,
    );
    registry.register(
        "get_zone_temp",
        "Average measure_temperature across the devices in a zone",
        json!({
            "type": "object",
            "properties": {"zone_id": {"type": "string"}},
            "required": ["zone_id"],
        }),
        get_zone_temp,
    );
}

pub async fn list_zones(ctx: Arc<HubContext>, args: ListZonesArgs) -> Value {
    let codec = ctx.codec();
    let params = match codec.parse(args.cursor.as_deref()) {
        Ok(params) => params,
        Err(e) => return pagination_failure(&e),
    };

    match ctx.zones().await {
        Ok(zones) => {
            let views: Vec<Value> = zones
                .iter()
                .filter_map(|zone| serde_json::to_value(zone).ok())
                .collect();
            page_response("zones", codec.paginate(views, &params), json!({}))
        }
        Err(e) => tool_failure("list zones", &e),
    }
}

pub async fn get_zone_devices(ctx: Arc<HubContext>, args: ZoneDevicesArgs) -> Value {
    let zone_context = [("zone_id", json!(args.zone_id))];
    let codec = ctx.codec();
    let params = match codec.parse(args.cursor.as_deref()) {
        Ok(params) => params,
        Err(e) => return with_context(pagination_failure(&e), &zone_context),
    };

    match ctx.devices().await {
        Ok(devices) => {
            let views: Vec<Value> = in_zone(&devices, &args.zone_id)
                .map(|device| device.to_view(args.compact))
                .collect();
            page_response(
                "devices",
                codec.paginate(views, &params),
                json!({ "zone_id": args.zone_id }),
            )
        }
        Err(e) => with_context(tool_failure("get zone devices", &e), &zone_context),
    }
}

pub async fn get_zone_temp(ctx: Arc<HubContext>, args: ZoneTempArgs) -> Value {
    match ctx.devices().await {
        Ok(devices) => json!({
            "zone_id": args.zone_id,
            "temperature": average_temperature(in_zone(&devices, &args.zone_id)),
        }),
        Err(e) => with_context(
            tool_failure("get zone temperature", &e),
            &[("zone_id", json!(args.zone_id))],
        ),
    }
}

fn in_zone<'a>(devices: &'a [Device], zone_id: &'a str) -> impl Iterator<Item = &'a Device> {
    devices
        .iter()
        .filter(move |device| device.zone.as_deref() == Some(zone_id))
}

/// Mean of the numeric temperature readings; `None` without any
fn average_temperature<'a>(devices: impl Iterator<Item = &'a Device>) -> Option<f64> {
    let readings: Vec<f64> = devices
        .filter_map(|device| device.capability_value(TEMPERATURE_CAPABILITY))
        .filter_map(Value::as_f64)
        .collect();
    if readings.is_empty() {
        return None;
    }
    Some(readings.iter().sum::<f64>() / readings.len() as f64)
}
