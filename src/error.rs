//! Error types for the Homey MCP server
//!
//! Every fallible operation in the crate returns [`HomeyError`]. The error
//! carries enough structure for the resilience layer to tell transient
//! connectivity failures (connection refused, timeouts, an open circuit)
//! apart from everything else: only the former are retried, counted against
//! circuit breakers, or masked by stale cache data.

use crate::error_recovery::CircuitState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for Homey operations
pub type Result<T> = std::result::Result<T, HomeyError>;

/// Error types for Homey MCP operations
#[derive(Error, Debug)]
pub enum HomeyError {
    /// Connection errors
    #[error("Connection error: {0}")]
    Connection(String),

    /// Timeout errors
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// A circuit breaker rejected the call without attempting it
    #[error("Circuit breaker {name} is {state}")]
    CircuitOpen {
        name: String,
        state: CircuitState,
        last_failure: Option<DateTime<Utc>>,
    },

    /// Malformed or out-of-bounds pagination cursor
    #[error("Invalid cursor format: {0}")]
    Pagination(String),

    /// Flow type could not be determined because the lookups failed
    #[error("{0}")]
    FlowDetection(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Not found errors (devices, zones, flows)
    #[error("Not found: {0}")]
    NotFound(String),

    /// The hub answered with an error status
    #[error("External service error: {0}")]
    ExternalService(String),

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing errors
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors
    #[error("Generic error: {0}")]
    Generic(#[from] anyhow::Error),
}

/// Coarse failure classification used by the cache and resilience layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Connection refused, reset, or an open circuit
    Connection,
    /// The call did not finish in time
    Timeout,
    /// Anything that is not a connectivity symptom
    Unknown,
}

impl FailureKind {
    /// Wire name used in `error_type` fields
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Connection => "connection",
            FailureKind::Timeout => "timeout",
            FailureKind::Unknown => "unknown",
        }
    }

    /// Human-readable next step for a user-facing error payload
    pub fn suggested_action(&self) -> &'static str {
        match self {
            FailureKind::Connection => "Check HomeyPro connectivity and network settings",
            FailureKind::Timeout => "HomeyPro may be overloaded, try again in a few moments",
            FailureKind::Unknown => "Check system logs and HomeyPro status",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl HomeyError {
    /// Create a connection error
    pub fn connection<S: Into<String>>(msg: S) -> Self {
        HomeyError::Connection(msg.into())
    }

    /// Create a timeout error
    pub fn timeout<S: Into<String>>(msg: S) -> Self {
        HomeyError::Timeout(msg.into())
    }

    /// Create a pagination error
    pub fn pagination<S: Into<String>>(msg: S) -> Self {
        HomeyError::Pagination(msg.into())
    }

    /// Create a flow detection error
    pub fn flow_detection<S: Into<String>>(msg: S) -> Self {
        HomeyError::FlowDetection(msg.into())
    }

    /// Create an authentication error
    pub fn authentication<S: Into<String>>(msg: S) -> Self {
        HomeyError::Authentication(msg.into())
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        HomeyError::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        HomeyError::InvalidInput(msg.into())
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        HomeyError::NotFound(msg.into())
    }

    /// Create an external service error
    pub fn external_service<S: Into<String>>(msg: S) -> Self {
        HomeyError::ExternalService(msg.into())
    }

    /// Classify this error for cache fallback and resilience decisions
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            HomeyError::Connection(_) | HomeyError::CircuitOpen { .. } => FailureKind::Connection,
            HomeyError::Timeout(_) => FailureKind::Timeout,
            HomeyError::Http(e) if e.is_timeout() => FailureKind::Timeout,
            HomeyError::Http(e) if e.is_connect() => FailureKind::Connection,
            HomeyError::Io(e) => match e.kind() {
                std::io::ErrorKind::TimedOut => FailureKind::Timeout,
                std::io::ErrorKind::ConnectionRefused
                | std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::ConnectionAborted
                | std::io::ErrorKind::NotConnected => FailureKind::Connection,
                _ => FailureKind::Unknown,
            },
            _ => FailureKind::Unknown,
        }
    }

    /// Whether this is a connectivity-class error (connection or timeout)
    pub fn is_connectivity(&self) -> bool {
        !matches!(self.failure_kind(), FailureKind::Unknown)
    }

    /// Check if error indicates authentication issue
    pub fn is_auth_error(&self) -> bool {
        matches!(self, HomeyError::Authentication(_))
    }

    /// Short machine-readable category
    pub fn error_type(&self) -> &'static str {
        match self {
            HomeyError::Connection(_) => "connection_error",
            HomeyError::Timeout(_) => "timeout_error",
            HomeyError::CircuitOpen { .. } => "circuit_open_error",
            HomeyError::Pagination(_) => "pagination_error",
            HomeyError::FlowDetection(_) => "flow_detection_error",
            HomeyError::Authentication(_) => "authentication_error",
            HomeyError::Config(_) => "config_error",
            HomeyError::InvalidInput(_) => "invalid_input_error",
            HomeyError::NotFound(_) => "not_found_error",
            HomeyError::ExternalService(_) => "external_service_error",
            HomeyError::Http(_) => "http_error",
            HomeyError::Json(_) => "json_error",
            HomeyError::Io(_) => "io_error",
            HomeyError::Generic(_) => "generic_error",
        }
    }
}

// Lets the framework logging layer classify our errors
impl pulseengine_mcp_logging::ErrorClassification for HomeyError {
    fn error_type(&self) -> &str {
        HomeyError::error_type(self)
    }

    fn is_retryable(&self) -> bool {
        self.is_connectivity()
    }

    fn is_timeout(&self) -> bool {
        self.failure_kind() == FailureKind::Timeout
    }

    fn is_auth_error(&self) -> bool {
        HomeyError::is_auth_error(self)
    }

    fn is_connection_error(&self) -> bool {
        self.failure_kind() == FailureKind::Connection
    }
}
