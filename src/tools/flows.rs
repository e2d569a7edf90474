//! Flow tools
//!
//! Listing merges normal and advanced flows. Trigger and enable/disable
//! take a bare flow id and go through the [`FlowResolver`] to find out
//! which collection it belongs to.
//!
//! [`FlowResolver`]: crate::services::FlowResolver

use crate::client::Flow;
use crate::server::HubContext;
use crate::services::{FlowAction, FlowActionOutcome, FlowType};
use crate::tools::{cursor_property, no_args_schema, page_response, ToolRegistry};
use crate::utils::error_helpers::{pagination_failure, tool_failure};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, warn};

fn default_compact() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct ListFlowsArgs {
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default = "default_compact")]
    pub compact: bool,
}

#[derive(Debug, Deserialize)]
pub struct FlowIdArgs {
    pub flow_id: String,
}

#[derive(Debug, Deserialize)]
pub struct FolderFlowsArgs {
    pub folder_id: String,
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default = "default_compact")]
    pub compact: bool,
}

pub(crate) fn register(registry: &mut ToolRegistry) {
    let listing = json!({
        "type": "object",
        "properties": {
            "cursor": cursor_property(),
            "compact": {"type": "boolean", "default": true},
        },
    });
    let by_id = json!({
        "type": "object",
        "properties": {"flow_id": {"type": "string"}},
        "required": ["flow_id"],
    });

    registry.register(
        "list_flows",
        "List all flows, normal and advanced, tagged with flow_type",
        listing.clone(),
        list_flows,
    );
    registry.register(
        "trigger_flow",
        "Trigger a flow of either type by id",
        by_id.clone(),
        |ctx, args: FlowIdArgs| run_action(ctx, args.flow_id, FlowAction::Trigger),
    );
    registry.register(
        "enable_flow",
        "Enable a flow of either type by id",
        by_id.clone(),
        |ctx, args: FlowIdArgs| run_action(ctx, args.flow_id, FlowAction::Enable),
    );
    registry.register(
        "disable_flow",
        "Disable a flow of either type by id",
        by_id,
        |ctx, args: FlowIdArgs| run_action(ctx, args.flow_id, FlowAction::Disable),
    );
    registry.register(
        "get_flow_folders",
        "List flow folders",
        no_args_schema(),
        |ctx, _: Value| get_flow_folders(ctx),
    );
    registry.register(
        "get_flows_by_folder",
        "List the normal flows in a folder",
        json!({
            "type": "object",
            "properties": {
                "folder_id": {"type": "string"},
                "cursor": cursor_property(),
                "compact": {"type": "boolean", "default": true},
            },
            "required": ["folder_id"],
        }),
        get_flows_by_folder,
    );
    registry.register(
        "get_flows_without_folder",
        "List the normal flows that are not in any folder",
        listing,
        get_flows_without_folder,
    );
}

fn tagged(flows: Vec<Flow>, flow_type: FlowType, compact: bool) -> impl Iterator<Item = Value> {
    flows.into_iter().map(move |flow| {
        let mut view = flow.to_view(compact);
        view["flow_type"] = json!(flow_type);
        view
    })
}

/// Normal and advanced flows in one paginated list. One collection
/// failing is tolerated; both failing is an error.
pub async fn list_flows(ctx: Arc<HubContext>, args: ListFlowsArgs) -> Value {
    let codec = ctx.codec();
    let params = match codec.parse(args.cursor.as_deref()) {
        Ok(params) => params,
        Err(e) => return pagination_failure(&e),
    };

    let normal = ctx.flows().await;
    if let Err(e) = &normal {
        warn!("Error fetching normal flows: {}", e);
    }
    let advanced = ctx.advanced_flows().await;
    if let Err(e) = &advanced {
        warn!("Error fetching advanced flows: {}", e);
    }

    let combined: Vec<Value> = match (normal, advanced) {
        (Err(normal), Err(advanced)) => {
            let message =
                format!("Failed to fetch both normal and advanced flows: {normal}, {advanced}");
            error!("{}", message);
            let kind = advanced.failure_kind();
            return json!({
                "error": message,
                "error_type": kind,
                "suggested_action": kind.suggested_action(),
            });
        }
        (normal, advanced) => tagged(normal.unwrap_or_default(), FlowType::Normal, args.compact)
            .chain(tagged(
                advanced.unwrap_or_default(),
                FlowType::Advanced,
                args.compact,
            ))
            .collect(),
    };

    page_response("flows", codec.paginate(combined, &params), json!({}))
}

/// Trigger, enable or disable a flow of either type
pub async fn run_action(ctx: Arc<HubContext>, flow_id: String, action: FlowAction) -> Value {
    let outcome = match ctx.flow_resolver().await {
        Ok(resolver) => resolver.apply(&flow_id, action).await,
        Err(e) => {
            error!(flow_id = %flow_id, "Hub client unavailable: {}", e);
            FlowActionOutcome::Failed {
                message: e.to_string(),
            }
        }
    };
    outcome.to_json(action)
}

pub async fn get_flow_folders(ctx: Arc<HubContext>) -> Value {
    match ctx.flow_folders().await {
        Ok(folders) => json!({ "folders": folders, "total_count": folders.len() }),
        Err(e) => tool_failure("get flow folders", &e),
    }
}

pub async fn get_flows_by_folder(ctx: Arc<HubContext>, args: FolderFlowsArgs) -> Value {
    let folder_id = args.folder_id.clone();
    folder_page(
        ctx,
        args.cursor,
        args.compact,
        move |flow| flow.folder.as_deref() == Some(folder_id.as_str()),
        json!({ "folder_id": args.folder_id }),
    )
    .await
}

pub async fn get_flows_without_folder(ctx: Arc<HubContext>, args: ListFlowsArgs) -> Value {
    folder_page(
        ctx,
        args.cursor,
        args.compact,
        |flow| flow.folder.as_deref().map_or(true, str::is_empty),
        json!({}),
    )
    .await
}

async fn folder_page(
    ctx: Arc<HubContext>,
    cursor: Option<String>,
    compact: bool,
    keep: impl Fn(&Flow) -> bool,
    extra: Value,
) -> Value {
    let codec = ctx.codec();
    let params = match codec.parse(cursor.as_deref()) {
        Ok(params) => params,
        Err(e) => return pagination_failure(&e),
    };

    match ctx.flows().await {
        Ok(flows) => {
            let views: Vec<Value> = flows
                .iter()
                .filter(|flow| keep(flow))
                .map(|flow| flow.to_view(compact))
                .collect();
            page_response("flows", codec.paginate(views, &params), extra)
        }
        Err(e) => tool_failure("get flows", &e),
    }
}
