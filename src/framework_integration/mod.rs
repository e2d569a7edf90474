//! MCP framework integration
//!
//! The framework handles JSON-RPC framing, the stdio transport and the
//! protocol handshake. [`HomeyBackend`] plugs the hub into it.

pub mod backend;

pub use backend::HomeyBackend;
