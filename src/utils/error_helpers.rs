//! Error payload helpers
//!
//! Tools and resources never hand raw errors to the MCP client. These
//! helpers turn a [`HomeyError`] into the structured failure documents the
//! agent sees: `error`, `error_type`, `suggested_action` and `details`.

use crate::error::{FailureKind, HomeyError};
use serde_json::{json, Map, Value};
use tracing::error;

/// Failure payload for a tool call, e.g. `failure("list devices", &e)`
/// gives "Failed to list devices due to connection issues".
pub fn tool_failure(action: &str, err: &HomeyError) -> Value {
    let kind = err.failure_kind();
    let reason = match kind {
        FailureKind::Connection => "connection issues",
        FailureKind::Timeout => "timeout",
        FailureKind::Unknown => "unexpected error",
    };
    error!(error_type = %kind, "Failed to {}: {}", action, err);

    json!({
        "error": format!("Failed to {action} due to {reason}"),
        "error_type": kind,
        "suggested_action": kind.suggested_action(),
        "details": details(err),
    })
}

/// Failure payload for a resource read with no cached fallback
pub fn resource_failure(resource: &str, err: &HomeyError) -> Value {
    let mut payload = tool_failure(&format!("retrieve {resource}"), err);
    if let Value::Object(map) = &mut payload {
        map.insert("fallback_available".to_string(), Value::Bool(false));
        map.insert("timestamp".to_string(), json!(chrono::Utc::now().timestamp_millis() as f64 / 1000.0));
    }
    payload
}

/// Payload for a malformed cursor
pub fn pagination_failure(err: &HomeyError) -> Value {
    json!({
        "error": format!("Pagination error: {err}"),
        "error_type": "pagination",
        "suggested_action": "Check cursor parameter format",
    })
}

/// Payload for tool arguments that do not match the input schema
pub fn invalid_arguments(tool: &str, err: &impl std::fmt::Display) -> Value {
    json!({
        "error": format!("Invalid arguments for {tool}: {err}"),
        "error_type": "invalid_input",
        "suggested_action": "Check the tool input schema",
    })
}

/// Add request context (ids, queries) to a failure payload
pub fn with_context(mut payload: Value, context: &[(&str, Value)]) -> Value {
    if let Value::Object(map) = &mut payload {
        extend(map, context);
    }
    payload
}

fn extend(map: &mut Map<String, Value>, context: &[(&str, Value)]) {
    for (key, value) in context {
        map.insert((*key).to_string(), value.clone());
    }
}

/// Unknown errors carry their category so the log line can be found
fn details(err: &HomeyError) -> String {
    match err.failure_kind() {
        FailureKind::Unknown => format!("{}: {}", err.error_type(), err),
        _ => err.to_string(),
    }
}
