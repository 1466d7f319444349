//! External collaborators used by LinkHunter.
//!
//! Each collaborator is an `async_trait` contract plus one HTTP
//! implementation. Implementations built without credentials degrade to
//! empty or null results instead of failing, so the agent keeps working in
//! a partially configured environment.

mod http;

pub mod anthropic;
pub mod contacts;
pub mod llm;
pub mod metrics;
pub mod outreach;
pub mod search;
pub mod site_analysis;

pub use anthropic::AnthropicClient;
pub use contacts::{ContactFinder, DomainContact, HunterClient};
pub use llm::{
    ContentBlock, LanguageModel, Message, ModelRequest, ModelResponse, Role, StopReason,
    ToolDefinition, extract_json_object,
};
pub use metrics::{BacklinkEntry, DataForSeoClient, MetricsProvider};
pub use outreach::{DraftOptions, EmailDraft, LlmOutreachDrafter, OutreachDrafter, paragraphs_to_html};
pub use search::{GoogleSearchClient, SearchOptions, SearchProvider, SearchResult, search_batch};
pub use site_analysis::{LlmSiteAnalyser, SiteAnalyser, SiteAnalysis};
