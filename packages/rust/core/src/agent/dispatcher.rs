//! Routes a named tool call to its handler.

use std::sync::Arc;
use std::time::Instant;

use linkhunter_shared::{AppConfig, DiscoveryConfig, ImportValidationConfig, LinkHunterError, Result};
use linkhunter_storage::Storage;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use super::handlers::{imports, outreach, pipeline, research};
use super::tools::ToolName;
use crate::collaborators::Collaborators;

/// Tunables the handlers read.
#[derive(Debug, Clone, Default)]
pub struct DispatcherSettings {
    pub discovery: DiscoveryConfig,
    pub import_validation: ImportValidationConfig,
}

impl From<&AppConfig> for DispatcherSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            discovery: config.discovery.clone(),
            import_validation: config.import_validation.clone(),
        }
    }
}

/// Who a tool call runs for.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ToolContext<'a> {
    pub project_id: &'a str,
    pub org_id: &'a str,
}

impl ToolContext<'_> {
    /// The project named in the input, or the conversation's project.
    pub fn project<'b>(&'b self, requested: &'b Option<String>) -> &'b str {
        requested
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or(self.project_id)
    }
}

pub struct ToolDispatcher {
    storage: Arc<Storage>,
    collaborators: Collaborators,
    settings: DispatcherSettings,
}

impl ToolDispatcher {
    pub fn new(
        storage: Arc<Storage>,
        collaborators: Collaborators,
        settings: DispatcherSettings,
    ) -> Self {
        Self {
            storage,
            collaborators,
            settings,
        }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub(crate) fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    pub(crate) fn settings(&self) -> &DispatcherSettings {
        &self.settings
    }

    /// Run `tool_name` with `input` on behalf of `org_id`.
    ///
    /// Missing records and exhausted quotas come back as `{"error": ...}`
    /// values. An unknown tool or an input that does not match the tool's
    /// schema is an `Err`, as are storage and collaborator failures.
    #[instrument(skip_all, fields(tool = %tool_name, project_id = %project_id))]
    pub async fn execute(
        &self,
        tool_name: &str,
        input: Value,
        project_id: &str,
        org_id: &str,
    ) -> Result<Value> {
        let tool: ToolName = tool_name.parse()?;
        let ctx = ToolContext { project_id, org_id };
        let started = Instant::now();

        let result = match tool {
            ToolName::AnalyseSite => research::analyse_site(self, decode(tool, input)?, &ctx).await,
            ToolName::CheckExistingBacklinks => {
                research::check_existing_backlinks(self, decode(tool, input)?, &ctx).await
            }
            ToolName::RunDiscovery => research::run_discovery(self, decode(tool, input)?, &ctx).await,
            ToolName::ImportProspects => {
                imports::import_prospects(self, decode(tool, input)?, &ctx).await
            }
            ToolName::ValidateImport => {
                imports::validate_import(self, decode(tool, input)?, &ctx).await
            }
            ToolName::ConfirmImport => imports::confirm_import(self, decode(tool, input)?, &ctx).await,
            ToolName::EnrichContacts => {
                outreach::enrich_contacts(self, decode(tool, input)?, &ctx).await
            }
            ToolName::GenerateOutreachEmail => {
                outreach::generate_outreach_email(self, decode(tool, input)?, &ctx).await
            }
            ToolName::GenerateBulkEmails => {
                outreach::generate_bulk_emails(self, decode(tool, input)?, &ctx).await
            }
            ToolName::GetPipelineSummary => {
                pipeline::get_pipeline_summary(self, decode(tool, input)?, &ctx).await
            }
            ToolName::GetProspectsNeedingAttention => {
                pipeline::get_prospects_needing_attention(self, decode(tool, input)?, &ctx).await
            }
            ToolName::UpdateProspectStatus => {
                pipeline::update_prospect_status(self, decode(tool, input)?, &ctx).await
            }
            ToolName::CheckLinkLive => pipeline::check_link_live(self, decode(tool, input)?, &ctx).await,
        };

        debug!(
            tool = %tool,
            mutates = tool.mutates(),
            ok = result.is_ok(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "tool executed"
        );
        result
    }
}

/// Decode a raw tool input into the handler's typed request.
fn decode<T: DeserializeOwned>(tool: ToolName, input: Value) -> Result<T> {
    serde_json::from_value(input)
        .map_err(|e| LinkHunterError::tool_input(tool.as_str(), e.to_string()))
}

/// Structured, model-visible failure.
pub(crate) fn tool_error(message: impl Into<String>) -> Value {
    json!({ "error": message.into() })
}

pub(crate) fn to_value<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| LinkHunterError::parse(e.to_string()))
}

/// Whether a handler result reports a failure.
pub fn is_error_result(value: &Value) -> bool {
    value.get("error").is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fake_collaborators, seeded_storage};

    #[tokio::test]
    async fn unknown_tool_is_raised() {
        let (storage, org, project) = seeded_storage().await;
        let dispatcher = ToolDispatcher::new(
            Arc::new(storage),
            fake_collaborators(),
            DispatcherSettings::default(),
        );

        let err = dispatcher
            .execute("send_email", json!({}), &project.id, &org.id)
            .await
            .unwrap_err();
        assert!(matches!(err, LinkHunterError::UnknownTool(_)));
    }

    #[tokio::test]
    async fn malformed_input_is_a_tool_input_error() {
        let (storage, org, project) = seeded_storage().await;
        let dispatcher = ToolDispatcher::new(
            Arc::new(storage),
            fake_collaborators(),
            DispatcherSettings::default(),
        );

        let err = dispatcher
            .execute("enrich_contacts", json!({ "prospect_ids": "abc" }), &project.id, &org.id)
            .await
            .unwrap_err();
        match err {
            LinkHunterError::ToolInput { tool, .. } => assert_eq!(tool, "enrich_contacts"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn project_defaults_to_the_conversation() {
        let (storage, org, project) = seeded_storage().await;
        let dispatcher = ToolDispatcher::new(
            Arc::new(storage),
            fake_collaborators(),
            DispatcherSettings::default(),
        );

        let result = dispatcher
            .execute("get_pipeline_summary", json!({}), &project.id, &org.id)
            .await
            .unwrap();
        assert_eq!(result["project_id"], json!(project.id));
        assert!(!is_error_result(&result));
    }

    #[tokio::test]
    async fn other_orgs_projects_are_not_found() {
        let (storage, _org, project) = seeded_storage().await;
        let other = storage
            .create_organisation("Rival", linkhunter_shared::PlanTier::Growth)
            .await
            .unwrap();
        let dispatcher = ToolDispatcher::new(
            Arc::new(storage),
            fake_collaborators(),
            DispatcherSettings::default(),
        );

        let result = dispatcher
            .execute(
                "check_existing_backlinks",
                json!({ "project_id": project.id }),
                &project.id,
                &other.id,
            )
            .await
            .unwrap();
        assert_eq!(result, json!({ "error": "Project not found" }));
    }
}
