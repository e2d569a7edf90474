//! Device and zone tools driven through the tool registry

use homey_mcp_rust::config::ToolFilter;
use homey_mcp_rust::ToolRegistry;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;

mod common;
use common::{context, light, FixtureHub};

async fn call(hub: &Arc<FixtureHub>, tool: &str, args: Value) -> Value {
    let registry = ToolRegistry::with_default_tools(&ToolFilter::default());
    registry
        .call(context(hub.clone()), tool, args)
        .await
        .expect("tool is registered")
}

#[tokio::test]
async fn test_cursor_walk_covers_every_device_once() {
    let hub = Arc::new(FixtureHub::furnished());
    let registry = ToolRegistry::with_default_tools(&ToolFilter::default());
    let ctx = context(hub.clone());

    let mut cursor = Value::String(json!({"offset": 0, "page_size": 2}).to_string());
    let mut seen = Vec::new();
    let mut pages = 0;
    loop {
        let page = registry
            .call(ctx.clone(), "list_devices", json!({ "cursor": cursor }))
            .await
            .unwrap();
        pages += 1;
        for device in page["devices"].as_array().unwrap() {
            seen.push(device["id"].as_str().unwrap().to_string());
        }
        assert_eq!(page["pagination"]["total_count"], 3);
        if page["pagination"]["has_next"] == false {
            assert!(page["pagination"]["next_cursor"].is_null());
            break;
        }
        cursor = page["pagination"]["next_cursor"].clone();
    }

    assert_eq!(pages, 2);
    assert_eq!(seen, vec!["lamp-1", "lamp-2", "temp-1"]);
}

#[tokio::test]
async fn test_invalid_cursor_is_reported_not_raised() {
    let hub = Arc::new(FixtureHub::furnished());
    let reply = call(&hub, "list_devices", json!({"cursor": "{not json"})).await;

    assert_eq!(reply["error_type"], "pagination");
    assert_eq!(reply["suggested_action"], "Check cursor parameter format");
    assert_eq!(hub.calls("get_devices"), 0);
}

#[tokio::test]
async fn test_oversized_page_is_rejected() {
    let hub = Arc::new(FixtureHub::furnished());
    let cursor = json!({"offset": 0, "page_size": 500}).to_string();
    let reply = call(&hub, "list_devices", json!({ "cursor": cursor })).await;

    assert!(reply["error"]
        .as_str()
        .unwrap()
        .contains("Page size must be between 1 and 100"));
}

#[tokio::test]
async fn test_offset_past_end_gives_empty_page() {
    let hub = Arc::new(FixtureHub::furnished());
    let cursor = json!({"offset": 50, "page_size": 10}).to_string();
    let reply = call(&hub, "list_devices", json!({ "cursor": cursor })).await;

    assert_eq!(reply["devices"], json!([]));
    assert_eq!(reply["pagination"]["has_next"], false);
}

#[tokio::test]
async fn test_largest_offset_gives_empty_page() {
    let hub = Arc::new(FixtureHub::furnished());
    let cursor = json!({"offset": u64::MAX, "page_size": 10}).to_string();
    let reply = call(&hub, "list_devices", json!({ "cursor": cursor })).await;

    assert_eq!(reply["devices"], json!([]));
    assert_eq!(reply["pagination"]["total_count"], 3);
    assert_eq!(reply["pagination"]["has_next"], false);
    assert!(reply["pagination"]["next_cursor"].is_null());
}

#[tokio::test]
async fn test_twenty_five_devices_in_pages_of_ten() {
    let devices = (0..25)
        .map(|n| light(&format!("lamp-{n:02}"), &format!("Lamp {n:02}"), "living", true))
        .collect();
    let hub = Arc::new(FixtureHub::new().with_devices(devices));

    let cursor = json!({"offset": 0, "page_size": 10}).to_string();
    let first = call(&hub, "list_devices", json!({ "cursor": cursor })).await;
    assert_eq!(first["devices"].as_array().unwrap().len(), 10);
    assert_eq!(first["pagination"]["total_count"], 25);
    assert_eq!(first["pagination"]["has_next"], true);
    let next: Value =
        serde_json::from_str(first["pagination"]["next_cursor"].as_str().unwrap()).unwrap();
    assert_eq!(next, json!({"offset": 10, "page_size": 10}));

    let second = call(&hub, "list_devices", json!({"cursor": next.to_string()})).await;
    assert_eq!(second["devices"].as_array().unwrap().len(), 10);
    let cursor = second["pagination"]["next_cursor"].clone();

    let last = call(&hub, "list_devices", json!({ "cursor": cursor })).await;
    assert_eq!(last["devices"].as_array().unwrap().len(), 5);
    assert_eq!(last["pagination"]["offset"], 20);
    assert_eq!(last["pagination"]["has_next"], false);
    assert!(last["pagination"]["next_cursor"].is_null());
}

#[tokio::test]
async fn test_search_and_catalog_tools() {
    let hub = Arc::new(FixtureHub::furnished());

    let by_name = call(&hub, "search_devices_by_name", json!({"query": "LAMP"})).await;
    assert_eq!(by_name["query"], "LAMP");
    assert_eq!(by_name["devices"].as_array().unwrap().len(), 1);

    let by_class = call(&hub, "search_devices_by_class", json!({"query": "light"})).await;
    assert_eq!(by_class["pagination"]["total_count"], 2);

    let classes = call(&hub, "get_devices_classes", json!({})).await;
    assert_eq!(classes["classes"], json!(["light", "sensor"]));

    let capabilities = call(&hub, "get_devices_capabilities", Value::Null).await;
    assert_eq!(
        capabilities["capabilities"],
        json!(["dim", "measure_temperature", "onoff"])
    );
}

#[tokio::test]
async fn test_control_device_reports_new_value() {
    let hub = Arc::new(FixtureHub::furnished());
    let reply = call(
        &hub,
        "control_device",
        json!({"device_id": "lamp-1", "capability": "onoff", "value": "true"}),
    )
    .await;

    assert_eq!(reply["success"], true);
    assert_eq!(reply["requested_value"], true);
    assert_eq!(reply["current_value"], true);
    assert_eq!(reply["device_name"], "Floor lamp");
}

#[tokio::test]
async fn test_control_device_failure_keeps_request_context() {
    let hub = Arc::new(FixtureHub::furnished());
    hub.break_operation("set_capability_value");
    let reply = call(
        &hub,
        "control_device",
        json!({"device_id": "lamp-1", "capability": "dim", "value": 0.8}),
    )
    .await;

    assert_eq!(reply["error"], "Failed to control device due to connection issues");
    assert_eq!(reply["device_id"], "lamp-1");
    assert_eq!(reply["capability"], "dim");
    assert_eq!(reply["requested_value"], 0.8);
    assert_eq!(hub.calls("set_capability_value"), 1);
}

#[tokio::test]
async fn test_zone_tools() {
    let hub = Arc::new(FixtureHub::furnished());

    let zones = call(&hub, "list_zones", json!({})).await;
    assert_eq!(zones["pagination"]["total_count"], 3);

    let living = call(&hub, "get_zone_devices", json!({"zone_id": "living"})).await;
    assert_eq!(living["zone_id"], "living");
    assert_eq!(living["devices"].as_array().unwrap().len(), 2);

    let temperature = call(&hub, "get_zone_temp", json!({"zone_id": "living"})).await;
    assert_eq!(temperature, json!({"zone_id": "living", "temperature": 21.5}));

    let kitchen = call(&hub, "get_zone_temp", json!({"zone_id": "kitchen"})).await;
    assert!(kitchen["temperature"].is_null());
}

#[tokio::test]
async fn test_missing_required_argument() {
    let hub = Arc::new(FixtureHub::furnished());
    let reply = call(&hub, "get_device", json!({})).await;

    assert_eq!(reply["error_type"], "invalid_input");
    assert_eq!(hub.calls("get_device"), 0);
}

#[tokio::test]
async fn test_device_insights() {
    let hub = Arc::new(FixtureHub::furnished());
    let reply = call(
        &hub,
        "get_device_insights",
        json!({
            "device_id": "temp-1",
            "capability": "measure_temperature",
            "resolution": "last6Hours",
            "from_timestamp": 1_700_000_000,
        }),
    )
    .await;

    assert_eq!(reply["device_id"], "temp-1");
    assert_eq!(reply["insights"]["resolution"], "last6Hours");
    assert_eq!(reply["insights"]["from"], 1_700_000_000);
    assert!(reply["insights"]["to"].is_null());
    assert_eq!(reply["insights"]["values"][0]["v"], 21.5);
}

#[tokio::test]
async fn test_device_insights_rejects_unknown_resolution() {
    let hub = Arc::new(FixtureHub::furnished());
    let reply = call(
        &hub,
        "get_device_insights",
        json!({"device_id": "temp-1", "capability": "measure_temperature", "resolution": "lastYear"}),
    )
    .await;

    assert_eq!(reply["error_type"], "invalid_input");
    assert_eq!(hub.calls("get_device_insights"), 0);
}

#[tokio::test]
async fn test_device_insights_connection_failure() {
    let hub = Arc::new(FixtureHub::furnished());
    hub.break_operation("get_device_insights");
    let reply = call(
        &hub,
        "get_device_insights",
        json!({"device_id": "lamp-1", "capability": "dim", "resolution": "lastHour"}),
    )
    .await;

    assert_eq!(reply["error"], "Failed to get device insights due to connection issues");
    assert_eq!(reply["error_type"], "connection");
    assert_eq!(reply["device_id"], "lamp-1");
    assert_eq!(reply["capability"], "dim");
}
