//! HomeyPro MCP server in Rust
//!
//! This crate provides a Model Context Protocol (MCP) server that exposes a
//! HomeyPro hub's devices, zones, flows and system settings to LLM agents.
//!
//! # Features
//!
//! - 21 MCP tools for device control, zone queries and flow management
//! - Cursor-based pagination for every list tool
//! - Four read-only resources backed by a TTL cache with stale fallback
//! - Per-collection circuit breakers and retry with exponential backoff
//! - Automatic detection of normal vs. advanced flows
//! - Served over stdio through the PulseEngine MCP framework

// Core modules
pub mod client;
pub mod config;
pub mod error;
pub mod error_recovery;
pub mod framework_integration;
pub mod logging;
pub mod server;
pub mod services;
pub mod tools;
pub mod utils;

// Test support modules - available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

// Re-export main types for convenience
pub use client::{ClientManager, HomeyClient};
pub use config::ServerConfig;
pub use error::{HomeyError, Result};
pub use framework_integration::HomeyBackend;
pub use server::HubContext;
pub use tools::ToolRegistry;
