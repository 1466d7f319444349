//! The tool catalogue handed to the model.
//!
//! [`ToolName`] is the single source of truth: the schema list and the
//! dispatcher's `match` are both driven by it.

use std::fmt;
use std::str::FromStr;

use linkhunter_providers::ToolDefinition;
use linkhunter_shared::{LinkHunterError, ProspectStatus};
use serde_json::{Value, json};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    AnalyseSite,
    CheckExistingBacklinks,
    RunDiscovery,
    ImportProspects,
    ValidateImport,
    ConfirmImport,
    EnrichContacts,
    GenerateOutreachEmail,
    GenerateBulkEmails,
    GetPipelineSummary,
    GetProspectsNeedingAttention,
    UpdateProspectStatus,
    CheckLinkLive,
}

impl ToolName {
    pub const ALL: [ToolName; 13] = [
        Self::AnalyseSite,
        Self::CheckExistingBacklinks,
        Self::RunDiscovery,
        Self::ImportProspects,
        Self::ValidateImport,
        Self::ConfirmImport,
        Self::EnrichContacts,
        Self::GenerateOutreachEmail,
        Self::GenerateBulkEmails,
        Self::GetPipelineSummary,
        Self::GetProspectsNeedingAttention,
        Self::UpdateProspectStatus,
        Self::CheckLinkLive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AnalyseSite => "analyse_site",
            Self::CheckExistingBacklinks => "check_existing_backlinks",
            Self::RunDiscovery => "run_discovery",
            Self::ImportProspects => "import_prospects",
            Self::ValidateImport => "validate_import",
            Self::ConfirmImport => "confirm_import",
            Self::EnrichContacts => "enrich_contacts",
            Self::GenerateOutreachEmail => "generate_outreach_email",
            Self::GenerateBulkEmails => "generate_bulk_emails",
            Self::GetPipelineSummary => "get_pipeline_summary",
            Self::GetProspectsNeedingAttention => "get_prospects_needing_attention",
            Self::UpdateProspectStatus => "update_prospect_status",
            Self::CheckLinkLive => "check_link_live",
        }
    }

    /// Whether the tool may write prospects, emails, or quota usage.
    pub fn mutates(&self) -> bool {
        !matches!(
            self,
            Self::AnalyseSite
                | Self::CheckExistingBacklinks
                | Self::RunDiscovery
                | Self::ValidateImport
                | Self::GetPipelineSummary
                | Self::GetProspectsNeedingAttention
        )
    }

    fn description(&self) -> &'static str {
        match self {
            Self::AnalyseSite => {
                "Fetch the project website and extract its niche, target keywords, audience \
                 and content themes, plus its Domain Rating. Call this first when the project \
                 has no profile yet."
            }
            Self::CheckExistingBacklinks => {
                "List the domains already linking to the project so they are not targeted \
                 again."
            }
            Self::RunDiscovery => {
                "Search for backlink prospects from keywords or a competitor URL. Returns a \
                 scored candidate list and a job_id for user review. Saves no prospects."
            }
            Self::ImportProspects => {
                "Save user-approved discovery candidates as prospects. Requires the job_id \
                 returned by run_discovery. Only call AFTER showing the candidates to the \
                 user and receiving explicit approval."
            }
            Self::ValidateImport => {
                "Check a list of user-supplied URLs for duplicates, exclusions, spam score \
                 and DA. Returns a pass/review/fail breakdown and a job_id. Saves no prospects."
            }
            Self::ConfirmImport => {
                "Save validated, user-approved URLs as prospects. Requires the job_id returned \
                 by validate_import. URLs that failed validation are rejected. Only call after \
                 the user has reviewed the validation results and confirmed."
            }
            Self::EnrichContacts => {
                "Look up a contact (name, email, role) for each prospect's domain."
            }
            Self::GenerateOutreachEmail => {
                "Draft a personalised outreach email for one prospect. Saved as a draft, \
                 never sent."
            }
            Self::GenerateBulkEmails => {
                "Draft outreach emails for several prospects at once. Only call after user \
                 approval. All emails are saved as drafts."
            }
            Self::GetPipelineSummary => {
                "Count prospects at each pipeline stage and report reply rate and win rate."
            }
            Self::GetProspectsNeedingAttention => {
                "List prospects that need action: no contact found, stale for more than 14 \
                 days, follow-ups due, or won links that have gone dead."
            }
            Self::UpdateProspectStatus => "Move a prospect to a new pipeline stage.",
            Self::CheckLinkLive => {
                "Check whether a won link is still live by fetching the page and looking for \
                 a link to the project site."
            }
        }
    }

    fn input_schema(&self) -> Value {
        let string_list = json!({ "type": "array", "items": { "type": "string" } });
        let tone = json!({ "type": "string", "enum": ["professional", "friendly", "concise"] });

        match self {
            Self::AnalyseSite
            | Self::CheckExistingBacklinks
            | Self::GetPipelineSummary
            | Self::GetProspectsNeedingAttention => json!({
                "type": "object",
                "properties": { "project_id": { "type": "string" } },
                "required": ["project_id"]
            }),
            Self::RunDiscovery => json!({
                "type": "object",
                "properties": {
                    "project_id": { "type": "string" },
                    "keywords": string_list,
                    "competitor_url": { "type": "string" },
                    "opportunity_types": {
                        "type": "array",
                        "items": {
                            "type": "string",
                            "enum": [
                                "resource_page",
                                "guest_post",
                                "directory_listing",
                                "competitor_mention",
                                "broken_link"
                            ]
                        }
                    },
                    "limit": { "type": "number" }
                },
                "required": ["project_id"]
            }),
            Self::ImportProspects => json!({
                "type": "object",
                "properties": {
                    "project_id": { "type": "string" },
                    "job_id": { "type": "string" },
                    "selected_prospect_ids": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "URLs (or domains) of the approved candidates"
                    }
                },
                "required": ["project_id", "job_id", "selected_prospect_ids"]
            }),
            Self::ValidateImport => json!({
                "type": "object",
                "properties": {
                    "project_id": { "type": "string" },
                    "urls": string_list
                },
                "required": ["project_id", "urls"]
            }),
            Self::ConfirmImport => json!({
                "type": "object",
                "properties": {
                    "project_id": { "type": "string" },
                    "job_id": { "type": "string" },
                    "urls": string_list
                },
                "required": ["project_id", "job_id", "urls"]
            }),
            Self::EnrichContacts => json!({
                "type": "object",
                "properties": { "prospect_ids": string_list },
                "required": ["prospect_ids"]
            }),
            Self::GenerateOutreachEmail => json!({
                "type": "object",
                "properties": {
                    "prospect_id": { "type": "string" },
                    "tone": tone,
                    "is_followup": { "type": "boolean" },
                    "followup_number": { "type": "number" },
                    "custom_value_prop": { "type": "string" }
                },
                "required": ["prospect_id"]
            }),
            Self::GenerateBulkEmails => json!({
                "type": "object",
                "properties": {
                    "prospect_ids": string_list,
                    "tone": tone,
                    "is_followup": { "type": "boolean" }
                },
                "required": ["prospect_ids"]
            }),
            Self::UpdateProspectStatus => {
                let statuses: Vec<&str> = ProspectStatus::ALL.iter().map(|s| s.as_str()).collect();
                json!({
                    "type": "object",
                    "properties": {
                        "prospect_id": { "type": "string" },
                        "status": { "type": "string", "enum": statuses },
                        "notes": { "type": "string" }
                    },
                    "required": ["prospect_id", "status"]
                })
            }
            Self::CheckLinkLive => json!({
                "type": "object",
                "properties": { "prospect_id": { "type": "string" } },
                "required": ["prospect_id"]
            }),
        }
    }

    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.as_str().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = LinkHunterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|tool| tool.as_str() == s)
            .copied()
            .ok_or_else(|| LinkHunterError::UnknownTool(s.to_string()))
    }
}

/// Schemas for every tool, in catalogue order.
pub fn tool_definitions() -> Vec<ToolDefinition> {
    ToolName::ALL.iter().map(ToolName::definition).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn names_round_trip_and_are_unique() {
        let names: HashSet<&str> = ToolName::ALL.iter().map(ToolName::as_str).collect();
        assert_eq!(names.len(), ToolName::ALL.len());
        for tool in ToolName::ALL {
            assert_eq!(tool.as_str().parse::<ToolName>().unwrap(), tool);
        }
    }

    #[test]
    fn unknown_name_is_an_error() {
        let err = "send_email".parse::<ToolName>().unwrap_err();
        assert!(matches!(err, LinkHunterError::UnknownTool(name) if name == "send_email"));
    }

    #[test]
    fn every_schema_is_an_object_with_required_fields() {
        for def in tool_definitions() {
            assert_eq!(def.input_schema["type"], "object", "{}", def.name);
            let required = def.input_schema["required"].as_array().unwrap();
            assert!(!required.is_empty(), "{}", def.name);
            for field in required {
                let field = field.as_str().unwrap();
                assert!(
                    def.input_schema["properties"].get(field).is_some(),
                    "{} requires undeclared {field}",
                    def.name
                );
            }
        }
    }

    #[test]
    fn commit_tools_require_a_job() {
        for tool in [ToolName::ImportProspects, ToolName::ConfirmImport] {
            let schema = tool.definition().input_schema;
            let required: Vec<&str> = schema["required"]
                .as_array()
                .unwrap()
                .iter()
                .filter_map(Value::as_str)
                .collect();
            assert!(required.contains(&"job_id"));
        }
    }

    #[test]
    fn status_enum_lists_every_stage() {
        let schema = ToolName::UpdateProspectStatus.definition().input_schema;
        let statuses = schema["properties"]["status"]["enum"].as_array().unwrap();
        assert_eq!(statuses.len(), ProspectStatus::ALL.len());
    }

    #[test]
    fn previews_do_not_mutate() {
        assert!(!ToolName::RunDiscovery.mutates());
        assert!(!ToolName::ValidateImport.mutates());
        assert!(ToolName::ConfirmImport.mutates());
        assert!(ToolName::CheckLinkLive.mutates());
    }
}
