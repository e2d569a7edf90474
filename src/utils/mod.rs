//! Utility modules for common functionality

pub mod error_helpers;
pub mod pagination;

// Re-export commonly used helpers
pub use error_helpers::{pagination_failure, resource_failure, tool_failure, with_context};
pub use pagination::{CursorCodec, CursorParams, Page};
