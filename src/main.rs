//! Homey MCP Server - Main Entry Point
//!
//! Serves the MCP protocol over stdio through the PulseEngine framework.
//! Each flag falls back to its `HOMEY_*` environment variable; the remaining
//! settings are read by [`ServerConfig::from_env`].

use clap::Parser;
use homey_mcp_rust::{
    logging::{init_logging, LogConfig},
    HomeyBackend, HomeyError, HubContext, Result, ServerConfig,
};
use pulseengine_mcp_auth::AuthenticationManager;
use pulseengine_mcp_server::{middleware::MiddlewareStack, GenericServerHandler};
use pulseengine_mcp_transport::{create_transport, Transport};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use url::Url;

/// Homey MCP Server Configuration
#[derive(Parser, Debug)]
#[command(name = "homey-mcp-server")]
#[command(about = "MCP server exposing HomeyPro devices, zones and flows over stdio")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// HomeyPro base URL
    #[arg(long, env = "HOMEY_API_URL")]
    api_url: Option<Url>,

    /// Personal access token
    #[arg(long, env = "HOMEY_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,

    /// Request timeout in seconds
    #[arg(long, env = "HOMEY_TIMEOUT")]
    timeout: Option<f64>,

    /// Verify TLS certificates
    #[arg(long, env = "HOMEY_VERIFY_SSL", value_parser = parse_switch)]
    verify_ssl: Option<bool>,

    /// Log level
    #[arg(long, env = "HOMEY_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Start without validating hub settings
    #[arg(long)]
    offline: bool,
}

/// Only a case-insensitive `true` enables a switch
fn parse_switch(raw: &str) -> std::result::Result<bool, String> {
    Ok(raw.trim().eq_ignore_ascii_case("true"))
}

impl Args {
    fn apply(self, config: &mut ServerConfig) -> Result<()> {
        if let Some(url) = self.api_url {
            config.hub.api_url = Some(url);
        }
        if let Some(token) = self.api_token {
            config.hub.api_token = token;
        }
        if let Some(secs) = self.timeout {
            config.hub.timeout = Duration::try_from_secs_f64(secs)
                .map_err(|e| HomeyError::config(format!("Invalid --timeout: {e}")))?;
        }
        if let Some(verify) = self.verify_ssl {
            config.hub.verify_ssl = verify;
        }
        if self.debug {
            config.log_level = "DEBUG".to_string();
        } else if let Some(level) = self.log_level {
            config.log_level = level.trim().to_uppercase();
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let offline = args.offline;

    let mut config = ServerConfig::from_env()?;
    args.apply(&mut config)?;

    init_logging(&LogConfig::from_env(&config.log_level))?;

    if offline {
        warn!("Offline mode: hub settings not validated, hub calls will fail");
    } else if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return Err(e);
    }

    info!(
        "Starting Homey MCP server v{} (hub: {})",
        env!("CARGO_PKG_VERSION"),
        config
            .hub
            .api_url
            .as_ref()
            .map(Url::as_str)
            .unwrap_or("<unset>")
    );

    // stdio is a local transport; the framework's API key auth stays off
    let auth_manager = {
        let auth_config = pulseengine_mcp_auth::AuthConfig {
            enabled: false,
            ..Default::default()
        };
        let manager = AuthenticationManager::new(auth_config)
            .await
            .map_err(|e| HomeyError::config(e.to_string()))?;
        Arc::new(manager)
    };

    let ctx = Arc::new(HubContext::new(config));
    let backend = HomeyBackend::with_default_tools(ctx.clone());
    info!("{} tools registered", backend.tools().len());

    let handler = GenericServerHandler::new(Arc::new(backend), auth_manager, MiddlewareStack::new());

    let mut transport = create_transport(pulseengine_mcp_transport::TransportConfig::Stdio)
        .map_err(|e| HomeyError::connection(e.to_string()))?;

    transport
        .start(Box::new(move |req| {
            let handler = handler.clone();
            Box::pin(async move {
                handler.handle_request(req).await.unwrap_or_else(|e| {
                    tracing::error!("Request handling error: {}", e);
                    pulseengine_mcp_protocol::Response {
                        jsonrpc: "2.0".to_string(),
                        id: serde_json::Value::Null,
                        result: None,
                        error: Some(pulseengine_mcp_protocol::Error::internal_error(
                            e.to_string(),
                        )),
                    }
                })
            })
        }))
        .await
        .map_err(|e| HomeyError::connection(e.to_string()))?;

    info!("Server running. Will exit when stdin closes.");

    ctx.shutdown().await?;
    info!("Server stopped");
    Ok(())
}
