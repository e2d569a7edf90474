//! System overview tool

use crate::server::HubContext;
use crate::tools::{no_args_schema, ToolRegistry};
use crate::utils::error_helpers::tool_failure;
use serde_json::{json, Value};
use std::sync::Arc;

pub(crate) fn register(registry: &mut ToolRegistry) {
    registry.register(
        "get_system_info",
        "Hub location, address, language, units, connection status and counts of \
         devices, zones and flows. Useful before other tools",
        no_args_schema(),
        |ctx, _: Value| get_system_info(ctx),
    );
}

pub async fn get_system_info(ctx: Arc<HubContext>) -> Value {
    match collect(&ctx).await {
        Ok(info) => info,
        Err(e) => tool_failure("get system info", &e),
    }
}

async fn collect(ctx: &HubContext) -> crate::error::Result<Value> {
    let devices = ctx.devices().await?;
    let zones = ctx.zones().await?;
    let flows = ctx.flows().await?;
    let advanced = ctx.advanced_flows().await?;
    let config = ctx.system_config().await?;

    let online = devices.iter().filter(|device| device.is_online()).count();
    let enabled = flows.iter().filter(|flow| flow.enabled).count();
    let enabled_advanced = advanced.iter().filter(|flow| flow.enabled).count();

    Ok(json!({
        "connection_status": "connected",
        "total_devices": devices.len(),
        "online_devices": online,
        "offline_devices": devices.len() - online,
        "total_zones": zones.len(),
        "total_flows": flows.len() + advanced.len(),
        "enabled_flows": enabled,
        "disabled_flows": flows.len() - enabled,
        "enabled_advanced_flows": enabled_advanced,
        "disabled_advanced_flows": advanced.len() - enabled_advanced,
        "address": config.address,
        "language": config.language,
        "units": config.units,
        "units_metric": config.is_metric(),
        "units_imperial": config.is_imperial(),
        "location": config.location,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::SystemConfig;
    use crate::config::ServerConfig;
    use crate::error_recovery::RetryPolicy;
    use crate::mock::{device, flow, zone, MockFailure, MockHomeyClient};

    fn context(client: Arc<MockHomeyClient>) -> Arc<HubContext> {
        let mut config = ServerConfig::default();
        config.retry = RetryPolicy::no_retry();
        Arc::new(HubContext::with_client(config, client))
    }

    #[tokio::test]
    async fn test_counts() {
        let mut offline = device("d2", "Plug", "z1", "socket");
        offline.available = false;
        let client = Arc::new(
            MockHomeyClient::new()
                .with_devices(vec![device("d1", "Lamp", "z1", "light"), offline])
                .with_zones(vec![zone("z1", "Home", None)])
                .with_flows(vec![flow("n1", "A", true, None), flow("n2", "B", false, None)])
                .with_advanced_flows(vec![flow("a1", "C", false, None)])
                .with_system(SystemConfig {
                    units: Some("metric".to_string()),
                    language: Some("en".to_string()),
                    ..SystemConfig::default()
                }),
        );

        let info = get_system_info(context(client)).await;
        assert_eq!(info["online_devices"], 1);
        assert_eq!(info["offline_devices"], 1);
        assert_eq!(info["total_flows"], 3);
        assert_eq!(info["enabled_flows"], 1);
        assert_eq!(info["disabled_advanced_flows"], 1);
        assert_eq!(info["units_metric"], true);
        assert_eq!(info["language"], "en");
    }

    #[tokio::test]
    async fn test_failure() {
        let client = Arc::new(MockHomeyClient::new());
        client.fail("get_zones", MockFailure::Other);
        let info = get_system_info(context(client)).await;
        assert_eq!(info["error"], "Failed to get system info due to unexpected error");
        assert_eq!(info["error_type"], "unknown");
    }
}
