//! MCP tool implementations for HomeyPro devices, zones, flows and health
//!
//! Tools are registered explicitly in a [`ToolRegistry`]. A handler takes
//! the shared [`HubContext`] and its decoded arguments and always answers
//! with a JSON document; failures are reported inside the document rather
//! than as protocol errors.

pub mod devices;
pub mod flows;
pub mod health;
pub mod system;
pub mod zones;

use crate::config::ToolFilter;
use crate::server::HubContext;
use crate::utils::error_helpers::invalid_arguments;
use crate::utils::pagination::Page;
use futures::future::{BoxFuture, FutureExt};
use pulseengine_mcp_protocol::Tool;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

type ToolHandler = Arc<dyn Fn(Arc<HubContext>, Value) -> BoxFuture<'static, Value> + Send + Sync>;

/// Tool metadata as advertised by `tools/list`
#[derive(Debug, Clone)]
pub struct ToolInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

impl ToolInfo {
    /// Protocol form of this tool
    pub fn to_tool(&self) -> Tool {
        Tool {
            name: self.name.to_string(),
            description: self.description.to_string(),
            input_schema: self.input_schema.clone(),
        }
    }
}

struct RegisteredTool {
    info: ToolInfo,
    handler: ToolHandler,
}

/// Name -> tool table
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<&'static str, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in tool that `filter` allows
    pub fn with_default_tools(filter: &ToolFilter) -> Self {
        let mut registry = Self::new();
        devices::register(&mut registry);
        zones::register(&mut registry);
        flows::register(&mut registry);
        system::register(&mut registry);
        health::register(&mut registry);
        registry.retain(filter);
        registry
    }

    /// Register a tool whose arguments decode into `A`
    pub fn register<A, F, Fut>(
        &mut self,
        name: &'static str,
        description: &'static str,
        input_schema: Value,
        handler: F,
    ) where
        A: DeserializeOwned + Send + 'static,
        F: Fn(Arc<HubContext>, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Value> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let erased: ToolHandler = Arc::new(move |ctx: Arc<HubContext>, raw: Value| {
            let handler = handler.clone();
            async move {
                match parse_args::<A>(raw) {
                    Ok(args) => handler(ctx, args).await,
                    Err(e) => {
                        warn!(tool = name, "Rejected arguments: {}", e);
                        invalid_arguments(name, &e)
                    }
                }
            }
            .boxed()
        });

        self.tools.insert(
            name,
            RegisteredTool {
                info: ToolInfo {
                    name,
                    description,
                    input_schema,
                },
                handler: erased,
            },
        );
    }

    /// Drop the tools `filter` disables
    pub fn retain(&mut self, filter: &ToolFilter) {
        self.tools.retain(|name, _| {
            let keep = filter.is_enabled(name);
            if !keep {
                debug!(tool = name, "Tool disabled by configuration");
            }
            keep
        });
    }

    /// Tool metadata sorted by name
    pub fn list(&self) -> Vec<&ToolInfo> {
        self.tools.values().map(|tool| &tool.info).collect()
    }

    pub fn get(&self, name: &str) -> Option<&ToolInfo> {
        self.tools.get(name).map(|tool| &tool.info)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Run a tool; `None` when no tool has that name
    pub async fn call(&self, ctx: Arc<HubContext>, name: &str, args: Value) -> Option<Value> {
        let handler = self.tools.get(name)?.handler.clone();
        debug!(tool = name, "Calling tool");
        Some(handler(ctx, args).await)
    }
}

/// Decode tool arguments; a missing argument object counts as `{}`
pub fn parse_args<A: DeserializeOwned>(args: Value) -> serde_json::Result<A> {
    match args {
        Value::Null => serde_json::from_value(json!({})),
        other => serde_json::from_value(other),
    }
}

/// `{<items_key>: [...], pagination: {...}}` plus any `extra` fields
pub(crate) fn page_response(items_key: &str, page: Page<Value>, extra: Value) -> Value {
    let pagination = page.pagination_info();
    let mut body = match extra {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    body.insert(items_key.to_string(), Value::Array(page.items));
    body.insert("pagination".to_string(), pagination);
    Value::Object(body)
}

/// Input schema for a tool without arguments
pub(crate) fn no_args_schema() -> Value {
    json!({"type": "object", "properties": {}})
}

/// Schema fragment for the optional pagination cursor
pub(crate) fn cursor_property() -> Value {
    json!({
        "type": "string",
        "description": "Opaque pagination cursor from a previous response"
    })
}
