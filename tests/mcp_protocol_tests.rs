//! MCP backend behaviour as seen by the framework handler

use homey_mcp_rust::config::ToolFilter;
use homey_mcp_rust::HomeyBackend;
use pretty_assertions::assert_eq;
use pulseengine_mcp_protocol::*;
use pulseengine_mcp_server::backend::{BackendError, McpBackend};
use serde_json::json;
use std::sync::Arc;

mod common;
use common::{context, context_with, payload_text, test_config, FixtureHub};

fn backend(hub: FixtureHub) -> HomeyBackend {
    HomeyBackend::with_default_tools(context(Arc::new(hub)))
}

fn first_page() -> PaginatedRequestParam {
    PaginatedRequestParam { cursor: None }
}

fn tool_call(name: &str, arguments: serde_json::Value) -> CallToolRequestParam {
    CallToolRequestParam {
        name: name.to_string(),
        arguments: Some(arguments),
    }
}

#[tokio::test]
async fn test_server_info_and_listing() {
    let backend = backend(FixtureHub::furnished());

    let info = backend.get_server_info();
    assert_eq!(info.server_info.name, "homey-mcp-rust");
    assert_eq!(info.server_info.version, env!("CARGO_PKG_VERSION"));

    let tools = backend.list_tools(first_page()).await.unwrap().tools;
    assert_eq!(tools.len(), 21);
    assert!(tools.iter().all(|tool| tool.input_schema["type"] == "object"));
    assert!(tools.iter().any(|tool| tool.name == "get_device_insights"));

    let resources = backend.list_resources(first_page()).await.unwrap().resources;
    assert_eq!(resources.len(), 4);
    assert_eq!(resources[0].mime_type.as_deref(), Some("application/json"));
}

#[tokio::test]
async fn test_tool_results_carry_json_text() {
    let backend = backend(FixtureHub::furnished());
    let result = backend
        .call_tool(tool_call("list_zones", json!({})))
        .await
        .unwrap();

    assert!(!result.is_error.unwrap_or(false));
    let payload = payload_text(&result.content[0]);
    assert_eq!(payload["pagination"]["total_count"], 3);
}

#[tokio::test]
async fn test_tool_failures_are_flagged() {
    let hub = FixtureHub::furnished();
    hub.break_operation("get_devices");
    let backend = backend(hub);

    let result = backend
        .call_tool(tool_call("list_devices", json!({})))
        .await
        .unwrap();

    assert_eq!(result.is_error, Some(true));
    let payload = payload_text(&result.content[0]);
    assert_eq!(payload["error"], "Failed to list devices due to connection issues");
    assert_eq!(
        payload["suggested_action"],
        "Check HomeyPro connectivity and network settings"
    );
}

#[tokio::test]
async fn test_resource_read_returns_json_text() {
    let backend = backend(FixtureHub::furnished());
    let result = backend
        .read_resource(ReadResourceRequestParam {
            uri: "homey://flows/catalog".to_string(),
        })
        .await
        .unwrap();

    let contents = &result.contents[0];
    assert_eq!(contents.uri, "homey://flows/catalog");
    assert_eq!(contents.mime_type.as_deref(), Some("application/json"));
    let document: serde_json::Value =
        serde_json::from_str(contents.text.as_deref().expect("text body")).unwrap();
    assert_eq!(document["summary"]["total_count"], 2);
}

#[tokio::test]
async fn test_unknown_names_are_rejected() {
    let backend = backend(FixtureHub::furnished());

    let tool = backend.call_tool(tool_call("reboot_hub", json!({}))).await;
    assert!(matches!(tool, Err(BackendError::NotSupported(_))));

    let resource = backend
        .read_resource(ReadResourceRequestParam {
            uri: "homey://nowhere".to_string(),
        })
        .await;
    assert!(matches!(resource, Err(BackendError::NotSupported(_))));
}

#[tokio::test]
async fn test_disabled_tools_are_hidden_and_rejected() {
    let mut config = test_config();
    config.tools = ToolFilter::from_lists(None, Some("control_device, trigger_flow"));
    let backend =
        HomeyBackend::with_default_tools(context_with(Arc::new(FixtureHub::furnished()), config));

    let names: Vec<String> = backend
        .list_tools(first_page())
        .await
        .unwrap()
        .tools
        .into_iter()
        .map(|tool| tool.name)
        .collect();
    assert_eq!(names.len(), 19);
    assert!(!names.iter().any(|name| name == "control_device"));

    let call = backend
        .call_tool(tool_call("trigger_flow", json!({"flow_id": "flow-morning"})))
        .await;
    assert!(matches!(call, Err(BackendError::NotSupported(_))));
}

#[tokio::test]
async fn test_health_check_follows_hub() {
    let hub = Arc::new(FixtureHub::furnished());
    let backend = HomeyBackend::with_default_tools(context(hub.clone()));
    assert!(backend.health_check().await.is_ok());

    hub.break_operation("get_devices");
    assert!(matches!(
        backend.health_check().await,
        Err(BackendError::Connection(_))
    ));
}
