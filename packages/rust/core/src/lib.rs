//! Domain logic and the agent for LinkHunter.
//!
//! The free functions here (discovery, import validation, enrichment,
//! pipeline aggregation, link monitoring, backlink sync, quota checks) take
//! their collaborators explicitly. The [`agent`] module wraps them as model
//! tools and drives the bounded chat loop.

pub mod agent;
pub mod backlinks;
pub mod collaborators;
pub mod discovery;
pub mod enrichment;
pub mod import_validation;
pub mod link_monitor;
pub mod pipeline;
pub mod quota;

#[cfg(test)]
pub(crate) mod testing;

pub use agent::{ChatMessage, ChatRequest, ChatResponse, Identity, Orchestrator, ToolDispatcher};
pub use collaborators::{Collaborators, model_from_config};
