//! Health and metrics tools

use crate::server::HubContext;
use crate::tools::{no_args_schema, ToolRegistry};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
pub struct HealthCheckArgs {
    /// Include configuration and uptime
    #[serde(default)]
    pub detailed: bool,
    /// Ignore a recent cached result
    #[serde(default)]
    pub force: bool,
}

pub(crate) fn register(registry: &mut ToolRegistry) {
    registry.register(
        "health_check",
        "Check connectivity to HomeyPro, response time and basic functionality",
        json!({
            "type": "object",
            "properties": {
                "detailed": {"type": "boolean", "default": false},
                "force": {"type": "boolean", "default": false},
            },
        }),
        health_check,
    );
    registry.register(
        "get_metrics",
        "Performance and usage metrics: health, cache statistics and circuit breakers",
        no_args_schema(),
        |ctx, _: Value| get_metrics(ctx),
    );
}

pub async fn health_check(ctx: Arc<HubContext>, args: HealthCheckArgs) -> Value {
    let status = ctx.health(args.force).await;
    let mut result = json!(status);

    if args.detailed {
        let config = ctx.config();
        result["config"] = json!({
            "api_url": config.hub.api_url.as_ref().map(|url| url.as_str()),
            "timeout": config.hub.timeout.as_secs_f64(),
            "verify_ssl": config.hub.verify_ssl,
            "cache_ttl": config.cache.default_ttl.as_secs(),
        });
        let uptime = Utc::now() - ctx.started_at();
        result["server_info"] = json!({
            "version": env!("CARGO_PKG_VERSION"),
            "uptime_seconds": uptime.num_milliseconds() as f64 / 1000.0,
        });
    }

    result
}

pub async fn get_metrics(ctx: Arc<HubContext>) -> Value {
    let status = ctx.health(false).await;
    let cache = ctx.resource_cache().stats().await;

    let mut metrics = json!({
        "health": {
            "is_healthy": status.is_healthy,
            "response_time_ms": status.response_time_ms,
            "homey_reachable": status.homey_reachable,
            "last_check": status.timestamp,
        },
        "system": {
            "device_count": status.device_count,
            "homey_version": status.homey_version,
        },
        "cache": {
            "hits": cache.hits,
            "misses": cache.misses,
            "hit_ratio": cache.hit_ratio(),
            "stale_served": cache.stale_served,
            "failed_fetches": cache.failed_fetches,
            "entries": cache.entry_count,
        },
        "circuit_breakers": ctx.breakers().all_status().await,
        "retries": ctx.retry_stats().await,
        "timestamp": Utc::now(),
    });

    if !status.errors.is_empty() {
        metrics["errors"] = json!(status.errors);
    }
    metrics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::error_recovery::RetryPolicy;
    use crate::mock::{device, MockFailure, MockHomeyClient};

    fn context(client: Arc<MockHomeyClient>) -> Arc<HubContext> {
        let mut config = ServerConfig::default();
        config.retry = RetryPolicy::no_retry();
        Arc::new(HubContext::with_client(config, client))
    }

    #[tokio::test]
    async fn test_detailed_health() {
        let client = Arc::new(MockHomeyClient::new().with_devices(vec![device(
            "d1", "Lamp", "z1", "light",
        )]));
        let reply = health_check(
            context(client),
            HealthCheckArgs {
                detailed: true,
                force: false,
            },
        )
        .await;

        assert_eq!(reply["is_healthy"], true);
        assert_eq!(reply["device_count"], 1);
        assert_eq!(reply["config"]["verify_ssl"], false);
        assert_eq!(reply["config"]["cache_ttl"], 300);
        assert!(reply["server_info"]["uptime_seconds"].is_number());
    }

    #[tokio::test]
    async fn test_metrics_report_errors_and_breakers() {
        let client = Arc::new(MockHomeyClient::new());
        client.fail("get_devices", MockFailure::Connection);
        let ctx = context(client);
        assert!(ctx.devices().await.is_err());

        let metrics = get_metrics(ctx).await;
        assert_eq!(metrics["health"]["is_healthy"], false);
        assert_eq!(metrics["circuit_breakers"]["devices"]["failure_count"], 1);
        assert_eq!(metrics["retries"]["total_operations"], 1);
        assert!(metrics["errors"][0]
            .as_str()
            .unwrap()
            .starts_with("Failed to get device count"));
    }
}
