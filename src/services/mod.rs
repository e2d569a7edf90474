//! Domain services shared by tools and resources

pub mod flow_resolver;

pub use flow_resolver::{FlowAction, FlowActionOutcome, FlowResolver, FlowType};
