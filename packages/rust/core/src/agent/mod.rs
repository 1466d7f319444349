//! The chat agent: tool catalogue, dispatcher, and the orchestrating loop.

pub mod dispatcher;
mod handlers;
pub mod orchestrator;
pub mod prompt;
pub mod tools;

pub use dispatcher::{DispatcherSettings, ToolDispatcher, is_error_result};
pub use orchestrator::{
    ChatMessage, ChatRequest, ChatResponse, FALLBACK_REPLY, Identity, MAX_TURNS, Orchestrator,
    OrchestratorConfig, RunObserver, SilentObserver, ToolCallSummary,
};
pub use tools::{ToolName, tool_definitions};
