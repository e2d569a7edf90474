//! HomeyPro backend for the MCP framework
//!
//! [`HomeyBackend`] implements the framework's `McpBackend` trait on top of
//! the [`HubContext`] and the [`ToolRegistry`]. The framework owns the
//! JSON-RPC framing and the transport; this module only answers tool,
//! resource and health requests.

use async_trait::async_trait;
use pulseengine_mcp_protocol::*;
use pulseengine_mcp_server::backend::{BackendError, McpBackend};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::{
    error::HomeyError,
    server::{list_resources, read_resource, HubContext},
    tools::ToolRegistry,
    ServerConfig,
};

/// Convert HomeyError to BackendError
///
/// Hub failures inside tools and resources never get here; they are
/// reported in the response document. What remains are lookup and
/// request errors.
impl From<HomeyError> for BackendError {
    fn from(err: HomeyError) -> Self {
        use HomeyError::*;
        match err {
            // Connection issues
            Connection(msg) | Timeout(msg) => BackendError::connection(msg),
            CircuitOpen { .. } | Http(_) => BackendError::connection(err.to_string()),

            // Request and configuration issues
            Authentication(msg) | Config(msg) | InvalidInput(msg) | Pagination(msg) => {
                BackendError::configuration(msg)
            }

            // Unknown tools and resources
            NotFound(msg) => BackendError::not_supported(msg),

            _ => BackendError::internal(err.to_string()),
        }
    }
}

/// HomeyPro backend implementation for the MCP framework
#[derive(Clone)]
pub struct HomeyBackend {
    ctx: Arc<HubContext>,
    tools: Arc<ToolRegistry>,
}

impl HomeyBackend {
    pub fn new(ctx: Arc<HubContext>, tools: ToolRegistry) -> Self {
        Self {
            ctx,
            tools: Arc::new(tools),
        }
    }

    /// Backend with every built-in tool the context's filter allows
    pub fn with_default_tools(ctx: Arc<HubContext>) -> Self {
        let tools = ToolRegistry::with_default_tools(&ctx.config().tools);
        Self::new(ctx, tools)
    }

    pub fn context(&self) -> &Arc<HubContext> {
        &self.ctx
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }
}

#[async_trait]
impl McpBackend for HomeyBackend {
    type Error = BackendError;
    type Config = ServerConfig;

    async fn initialize(config: Self::Config) -> std::result::Result<Self, Self::Error> {
        info!("Initializing Homey backend");
        Ok(Self::with_default_tools(Arc::new(HubContext::new(config))))
    }

    fn get_server_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::default(),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .enable_logging()
                .build(),
            server_info: Implementation {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            instructions: Some(
                "HomeyPro home automation via MCP. Use tools to list and control devices, \
                 query zones and run flows; read resources for cached overviews."
                    .to_string(),
            ),
        }
    }

    async fn health_check(&self) -> std::result::Result<(), Self::Error> {
        let status = self.ctx.health(true).await;
        if status.homey_reachable {
            debug!("Homey backend health check passed");
            Ok(())
        } else {
            warn!("Homey backend health check failed: {:?}", status.errors);
            Err(BackendError::connection(format!(
                "HomeyPro unreachable: {}",
                status.errors.join("; ")
            )))
        }
    }

    async fn list_tools(
        &self,
        _params: PaginatedRequestParam,
    ) -> std::result::Result<ListToolsResult, Self::Error> {
        let tools: Vec<Tool> = self.tools.list().into_iter().map(|info| info.to_tool()).collect();

        debug!("Listed {} tools", tools.len());
        Ok(ListToolsResult {
            tools,
            next_cursor: None,
        })
    }

    async fn call_tool(
        &self,
        params: CallToolRequestParam,
    ) -> std::result::Result<CallToolResult, Self::Error> {
        info!("Calling tool: {}", params.name);

        let arguments = params.arguments.unwrap_or(serde_json::Value::Null);
        let Some(payload) = self
            .tools
            .call(self.ctx.clone(), &params.name, arguments)
            .await
        else {
            warn!("Unknown or disabled tool: {}", params.name);
            return Err(HomeyError::not_found(format!("Tool {}", params.name)).into());
        };

        if payload.get("error").is_some() {
            error!("Tool {} failed: {}", params.name, payload["error"]);
            Ok(CallToolResult::error_text(payload.to_string()))
        } else {
            Ok(CallToolResult::success(vec![Content::text(
                payload.to_string(),
            )]))
        }
    }

    async fn list_resources(
        &self,
        _params: PaginatedRequestParam,
    ) -> std::result::Result<ListResourcesResult, Self::Error> {
        Ok(ListResourcesResult {
            resources: list_resources(),
            next_cursor: None,
        })
    }

    async fn read_resource(
        &self,
        params: ReadResourceRequestParam,
    ) -> std::result::Result<ReadResourceResult, Self::Error> {
        info!("Reading resource: {}", params.uri);
        let document = read_resource(&self.ctx, &params.uri).await?;

        Ok(ReadResourceResult {
            contents: vec![ResourceContents {
                uri: params.uri,
                mime_type: Some("application/json".to_string()),
                text: Some(document.to_string()),
                blob: None,
            }],
        })
    }

    async fn list_resource_templates(
        &self,
        _params: PaginatedRequestParam,
    ) -> std::result::Result<ListResourceTemplatesResult, Self::Error> {
        Ok(ListResourceTemplatesResult {
            resource_templates: Vec::new(),
            next_cursor: None,
        })
    }

    async fn list_prompts(
        &self,
        _params: PaginatedRequestParam,
    ) -> std::result::Result<ListPromptsResult, Self::Error> {
        Ok(ListPromptsResult {
            prompts: Vec::new(),
            next_cursor: None,
        })
    }

    async fn get_prompt(
        &self,
        params: GetPromptRequestParam,
    ) -> std::result::Result<GetPromptResult, Self::Error> {
        Err(HomeyError::not_found(format!("Prompt {}", params.name)).into())
    }

    async fn subscribe(
        &self,
        params: SubscribeRequestParam,
    ) -> std::result::Result<(), Self::Error> {
        Err(BackendError::not_supported(format!(
            "Resource subscriptions are not supported: {}",
            params.uri
        )))
    }

    async fn unsubscribe(
        &self,
        params: UnsubscribeRequestParam,
    ) -> std::result::Result<(), Self::Error> {
        Err(BackendError::not_supported(format!(
            "Resource subscriptions are not supported: {}",
            params.uri
        )))
    }

    async fn complete(
        &self,
        _params: CompleteRequestParam,
    ) -> std::result::Result<CompleteResult, Self::Error> {
        Ok(CompleteResult {
            completion: Vec::new(),
        })
    }

    async fn set_level(
        &self,
        params: SetLevelRequestParam,
    ) -> std::result::Result<(), Self::Error> {
        // The filter is fixed at startup; HOMEY_LOG_LEVEL / RUST_LOG decide it
        info!("Ignoring runtime log level change to {}", params.level);
        Ok(())
    }

    async fn handle_custom_method(
        &self,
        method: &str,
        _params: serde_json::Value,
    ) -> std::result::Result<serde_json::Value, Self::Error> {
        warn!("Unknown custom method: {}", method);
        Err(BackendError::not_supported(format!("Unknown method: {method}")))
    }
}
