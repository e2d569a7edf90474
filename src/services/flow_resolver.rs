//! Flow type resolution and type-aware flow dispatch
//!
//! The hub keeps normal and advanced flows in separate collections and a
//! bare flow id does not say which one it belongs to. The resolver scans
//! the normal collection first, then the advanced one. The type is not
//! cached; every action re-resolves it.

use crate::client::HomeyClient;
use crate::error::{HomeyError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Which collection a flow lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowType {
    Normal,
    Advanced,
}

impl FlowType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowType::Normal => "normal",
            FlowType::Advanced => "advanced",
        }
    }
}

impl std::fmt::Display for FlowType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutation applied to a flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowAction {
    Trigger,
    Enable,
    Disable,
}

impl FlowAction {
    fn verb(&self) -> &'static str {
        match self {
            FlowAction::Trigger => "trigger",
            FlowAction::Enable => "enable",
            FlowAction::Disable => "disable",
        }
    }

    /// Value of the `action` field in responses; triggers carry none
    fn past_tense(&self) -> Option<&'static str> {
        match self {
            FlowAction::Trigger => None,
            FlowAction::Enable => Some("enabled"),
            FlowAction::Disable => Some("disabled"),
        }
    }
}

/// Result of a flow action
#[derive(Debug, Clone, PartialEq)]
pub enum FlowActionOutcome {
    /// Mutation accepted, details fetched
    Done {
        flow_id: String,
        flow_name: String,
        flow_type: FlowType,
    },
    /// The id is in neither collection; nothing was mutated
    NotFound { flow_id: String },
    /// The hub reported the mutation as unsuccessful
    Refused { flow_id: String, flow_type: FlowType },
    /// Detection, mutation or detail fetch raised
    Failed { message: String },
}

impl FlowActionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FlowActionOutcome::Done { .. })
    }

    /// Tool response payload
    pub fn to_json(&self, action: FlowAction) -> Value {
        let mut body = match self {
            FlowActionOutcome::Done {
                flow_id,
                flow_name,
                flow_type,
            } => json!({
                "success": true,
                "flow_id": flow_id,
                "flow_name": flow_name,
                "flow_type": flow_type,
            }),
            FlowActionOutcome::NotFound { flow_id } => json!({
                "success": false,
                "error": format!("Flow not found: {flow_id}"),
                "flow_id": flow_id,
            }),
            FlowActionOutcome::Refused { flow_id, flow_type } => json!({
                "success": false,
                "error": format!("Failed to {} {} flow", action.verb(), flow_type),
                "flow_id": flow_id,
                "flow_type": flow_type,
            }),
            FlowActionOutcome::Failed { message } => {
                return json!({
                    "error": format!("Failed to {} flow: {}", action.verb(), message),
                })
            }
        };

        if let (Some(past), true) = (action.past_tense(), self.is_success()) {
            body["action"] = json!(past);
        }
        body
    }
}

/// Resolves flow ids to their collection and dispatches actions
pub struct FlowResolver {
    client: Arc<dyn HomeyClient>,
}

impl FlowResolver {
    pub fn new(client: Arc<dyn HomeyClient>) -> Self {
        Self { client }
    }

    /// Find which collection `flow_id` belongs to.
    ///
    /// A failing normal-flow lookup is logged and treated as "not there".
    /// A failing advanced-flow lookup is an error, since by then neither
    /// collection could be confirmed. `Ok(None)` means the flow exists in
    /// neither collection.
    pub async fn detect_type(&self, flow_id: &str) -> Result<Option<FlowType>> {
        match self.client.get_flows().await {
            Ok(flows) => {
                if flows.iter().any(|flow| flow.id == flow_id) {
                    return Ok(Some(FlowType::Normal));
                }
            }
            Err(e) => {
                warn!("Error checking normal flows for flow_id {}: {}", flow_id, e);
            }
        }

        match self.client.get_advanced_flows().await {
            Ok(flows) => Ok(flows
                .iter()
                .any(|flow| flow.id == flow_id)
                .then_some(FlowType::Advanced)),
            Err(e) => {
                warn!("Error checking advanced flows for flow_id {}: {}", flow_id, e);
                let message = format!(
                    "Error detecting flow type for flow_id {flow_id}: \
                     Failed to check both normal and advanced flows: {e}"
                );
                error!("{}", message);
                Err(HomeyError::flow_detection(message))
            }
        }
    }

    /// Run a flow of either type
    pub async fn trigger(&self, flow_id: &str) -> FlowActionOutcome {
        self.apply(flow_id, FlowAction::Trigger).await
    }

    /// Enable or disable a flow of either type
    pub async fn set_enabled(&self, flow_id: &str, enabled: bool) -> FlowActionOutcome {
        let action = if enabled {
            FlowAction::Enable
        } else {
            FlowAction::Disable
        };
        self.apply(flow_id, action).await
    }

    /// Detect, mutate, then fetch details; any error becomes `Failed`
    pub async fn apply(&self, flow_id: &str, action: FlowAction) -> FlowActionOutcome {
        match self.try_apply(flow_id, action).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Error trying to {} flow {}: {}", action.verb(), flow_id, e);
                FlowActionOutcome::Failed {
                    message: e.to_string(),
                }
            }
        }
    }

    async fn try_apply(&self, flow_id: &str, action: FlowAction) -> Result<FlowActionOutcome> {
        let Some(flow_type) = self.detect_type(flow_id).await? else {
            return Ok(FlowActionOutcome::NotFound {
                flow_id: flow_id.to_string(),
            });
        };

        let accepted = match (flow_type, action) {
            (FlowType::Normal, FlowAction::Trigger) => self.client.trigger_flow(flow_id).await?,
            (FlowType::Normal, FlowAction::Enable) => {
                self.client.set_flow_enabled(flow_id, true).await?
            }
            (FlowType::Normal, FlowAction::Disable) => {
                self.client.set_flow_enabled(flow_id, false).await?
            }
            (FlowType::Advanced, FlowAction::Trigger) => {
                self.client.trigger_advanced_flow(flow_id).await?
            }
            (FlowType::Advanced, FlowAction::Enable) => {
                self.client.set_advanced_flow_enabled(flow_id, true).await?
            }
            (FlowType::Advanced, FlowAction::Disable) => {
                self.client.set_advanced_flow_enabled(flow_id, false).await?
            }
        };

        if !accepted {
            return Ok(FlowActionOutcome::Refused {
                flow_id: flow_id.to_string(),
                flow_type,
            });
        }

        let flow = match flow_type {
            FlowType::Normal => self.client.get_flow(flow_id).await?,
            FlowType::Advanced => self.client.get_advanced_flow(flow_id).await?,
        };

        info!("Flow {} ({}) {} ok", flow.name, flow_type, action.verb());
        Ok(FlowActionOutcome::Done {
            flow_id: flow_id.to_string(),
            flow_name: flow.name,
            flow_type,
        })
    }
}
