//! Shared types, error model, and configuration for LinkHunter.
//!
//! This crate is the foundation depended on by all other LinkHunter crates.
//! It provides:
//! - [`LinkHunterError`], the unified error type
//! - Domain records ([`Project`], [`Prospect`], [`ImportJob`], [`Organisation`], ...)
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AnthropicConfig, AppConfig, DataForSeoConfig, DefaultsConfig, DiscoveryConfig,
    GoogleSearchConfig, HunterConfig, ImportValidationConfig, VerificationConfig, config_dir,
    config_file_path, expand_home, init_config, load_config, load_config_from, resolve_secret,
};
pub use error::{LinkHunterError, Result};
pub use types::{
    AgentMessage, AgentRole, DomainMetrics, EmailStatus, EntryMethod, ExistingBacklink,
    ImportJob, ImportJobPatch, ImportJobStatus, NewAgentMessage, NewOutreachEmail, NewProspect,
    OpportunityType, Organisation, OutreachEmail, OutreachTone, PlanTier, Project, Prospect,
    ProspectStatus, ToolInvocation, is_valid_record_id, new_record_id,
};
