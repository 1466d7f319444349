//! Core domain types for LinkHunter outreach campaigns.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LinkHunterError;

/// Generate a new time-sortable record identifier (UUID v7).
pub fn new_record_id() -> String {
    Uuid::now_v7().to_string()
}

/// Whether `id` is a well-formed record identifier.
pub fn is_valid_record_id(id: &str) -> bool {
    Uuid::parse_str(id).is_ok()
}

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// Billing plan of an organisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    Starter,
    Growth,
    Agency,
}

impl PlanTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starter => "starter",
            Self::Growth => "growth",
            Self::Agency => "agency",
        }
    }

    /// Monthly prospect allowance for the plan.
    pub fn monthly_prospect_limit(&self) -> u32 {
        match self {
            Self::Starter => 200,
            Self::Growth => 1000,
            Self::Agency => 5000,
        }
    }
}

impl FromStr for PlanTier {
    type Err = LinkHunterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "starter" => Ok(Self::Starter),
            "growth" => Ok(Self::Growth),
            "agency" => Ok(Self::Agency),
            other => Err(LinkHunterError::parse(format!("unknown plan: {other}"))),
        }
    }
}

/// How a prospect might link to the target site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityType {
    GuestPost,
    ResourceLink,
    BrokenLink,
    LinkExchange,
    Mention,
}

impl OpportunityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GuestPost => "guest_post",
            Self::ResourceLink => "resource_link",
            Self::BrokenLink => "broken_link",
            Self::LinkExchange => "link_exchange",
            Self::Mention => "mention",
        }
    }
}

impl FromStr for OpportunityType {
    type Err = LinkHunterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "guest_post" => Ok(Self::GuestPost),
            "resource_link" => Ok(Self::ResourceLink),
            "broken_link" => Ok(Self::BrokenLink),
            "link_exchange" => Ok(Self::LinkExchange),
            "mention" => Ok(Self::Mention),
            other => Err(LinkHunterError::parse(format!(
                "unknown opportunity type: {other}"
            ))),
        }
    }
}

/// Pipeline stage of a prospect.
///
/// Main path: `identified → enriched → outreach_drafted → contacted →
/// followed_up → won | lost`. Side states are reached from enrichment or
/// verification failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProspectStatus {
    Identified,
    Enriched,
    OutreachDrafted,
    Contacted,
    FollowedUp,
    Won,
    Lost,
    NotRelevant,
    NeedsManualEnrichment,
    VerificationError,
}

impl ProspectStatus {
    pub const ALL: [ProspectStatus; 10] = [
        Self::Identified,
        Self::Enriched,
        Self::OutreachDrafted,
        Self::Contacted,
        Self::FollowedUp,
        Self::Won,
        Self::Lost,
        Self::NotRelevant,
        Self::NeedsManualEnrichment,
        Self::VerificationError,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Identified => "identified",
            Self::Enriched => "enriched",
            Self::OutreachDrafted => "outreach_drafted",
            Self::Contacted => "contacted",
            Self::FollowedUp => "followed_up",
            Self::Won => "won",
            Self::Lost => "lost",
            Self::NotRelevant => "not_relevant",
            Self::NeedsManualEnrichment => "needs_manual_enrichment",
            Self::VerificationError => "verification_error",
        }
    }

    /// Won, lost and not-relevant prospects need no further activity.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Won | Self::Lost | Self::NotRelevant)
    }

    /// Outreach has been sent (contacted or any later outcome).
    pub fn is_contacted_or_later(&self) -> bool {
        matches!(
            self,
            Self::Contacted | Self::FollowedUp | Self::Won | Self::Lost
        )
    }

    /// Still before any outreach draft exists, so enrichment may move it.
    pub fn is_pre_outreach(&self) -> bool {
        matches!(
            self,
            Self::Identified | Self::Enriched | Self::NeedsManualEnrichment
        )
    }
}

impl fmt::Display for ProspectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProspectStatus {
    type Err = LinkHunterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| LinkHunterError::parse(format!("unknown prospect status: {s}")))
    }
}

/// How a prospect entered the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryMethod {
    Discovery,
    Import,
    Manual,
}

impl EntryMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discovery => "discovery",
            Self::Import => "import",
            Self::Manual => "manual",
        }
    }
}

impl FromStr for EntryMethod {
    type Err = LinkHunterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "discovery" => Ok(Self::Discovery),
            "import" => Ok(Self::Import),
            "manual" => Ok(Self::Manual),
            other => Err(LinkHunterError::parse(format!("unknown entry method: {other}"))),
        }
    }
}

/// Import job lifecycle. `Running` means the preview has been computed and
/// is waiting for an explicit confirmation; `Complete` jobs are consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportJobStatus {
    Pending,
    Running,
    Complete,
}

impl ImportJobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Complete => "complete",
        }
    }
}

impl FromStr for ImportJobStatus {
    type Err = LinkHunterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "complete" => Ok(Self::Complete),
            other => Err(LinkHunterError::parse(format!("unknown job status: {other}"))),
        }
    }
}

/// Delivery state of an outreach email. Only drafts are ever created here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailStatus {
    Draft,
    Scheduled,
    Sent,
    Failed,
}

impl EmailStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Scheduled => "scheduled",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for EmailStatus {
    type Err = LinkHunterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "scheduled" => Ok(Self::Scheduled),
            "sent" => Ok(Self::Sent),
            "failed" => Ok(Self::Failed),
            other => Err(LinkHunterError::parse(format!("unknown email status: {other}"))),
        }
    }
}

/// Writing tone for drafted outreach.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutreachTone {
    #[default]
    Professional,
    Friendly,
    Concise,
}

/// Author of a persisted agent message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    User,
    Assistant,
}

impl AgentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl FromStr for AgentRole {
    type Err = LinkHunterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            other => Err(LinkHunterError::parse(format!("unknown role: {other}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A tenant. Owns projects and a monthly prospect quota.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organisation {
    pub id: String,
    pub name: String,
    pub plan: PlanTier,
    pub monthly_prospect_limit: u32,
    pub prospects_used_this_month: u32,
    pub created_at: DateTime<Utc>,
}

/// A site the organisation is building links for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub org_id: String,
    pub name: String,
    pub target_url: String,
    #[serde(default)]
    pub target_keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub niche: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A candidate backlink site tracked through the outreach pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prospect {
    pub id: String,
    pub project_id: String,
    pub org_id: String,
    pub prospect_url: String,
    pub prospect_domain: String,
    pub page_title: Option<String>,
    pub page_url: Option<String>,
    pub snippet: Option<String>,
    pub domain_authority: Option<u32>,
    pub spam_score: Option<u32>,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
    pub contact_role: Option<String>,
    pub contact_source: Option<String>,
    pub opportunity_type: Option<OpportunityType>,
    pub linkability_score: Option<u8>,
    pub relevance_score: Option<u8>,
    pub status: ProspectStatus,
    pub entry_method: EntryMethod,
    pub first_contacted_at: Option<DateTime<Utc>>,
    pub last_contacted_at: Option<DateTime<Utc>>,
    pub link_live: bool,
    pub link_url: Option<String>,
    pub link_verified_at: Option<DateTime<Utc>>,
    pub link_lost_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for bulk prospect creation.
#[derive(Debug, Clone)]
pub struct NewProspect {
    pub prospect_url: String,
    pub prospect_domain: String,
    pub page_title: Option<String>,
    pub page_url: Option<String>,
    pub snippet: Option<String>,
    pub opportunity_type: Option<OpportunityType>,
    pub domain_authority: Option<u32>,
    pub spam_score: Option<u32>,
    pub linkability_score: Option<u8>,
    pub relevance_score: Option<u8>,
    pub entry_method: EntryMethod,
}

impl NewProspect {
    /// A bare prospect with only a URL and domain.
    pub fn bare(url: &str, domain: &str, entry_method: EntryMethod) -> Self {
        Self {
            prospect_url: url.to_string(),
            prospect_domain: domain.to_string(),
            page_title: None,
            page_url: None,
            snippet: None,
            opportunity_type: None,
            domain_authority: None,
            spam_score: None,
            linkability_score: None,
            relevance_score: None,
            entry_method,
        }
    }
}

/// A domain already linking to the project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExistingBacklink {
    pub id: String,
    pub project_id: String,
    pub org_id: String,
    pub linking_domain: String,
    pub linking_url: String,
    pub dr: u32,
    pub first_seen: Option<String>,
}

/// Durable handle for one discovery or validation batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportJob {
    pub id: String,
    pub project_id: String,
    pub org_id: String,
    pub status: ImportJobStatus,
    pub entry_method: EntryMethod,
    pub total_submitted: u32,
    pub total_passed: u32,
    pub total_review: u32,
    pub total_failed: u32,
    pub input_payload: serde_json::Value,
    pub results_payload: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Partial update for an import job; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct ImportJobPatch {
    pub status: Option<ImportJobStatus>,
    pub total_submitted: Option<u32>,
    pub total_passed: Option<u32>,
    pub total_review: Option<u32>,
    pub total_failed: Option<u32>,
    pub results_payload: Option<serde_json::Value>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A drafted (never auto-sent) outreach email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutreachEmail {
    pub id: String,
    pub prospect_id: String,
    pub org_id: String,
    pub project_id: String,
    pub subject: String,
    pub body_html: String,
    pub body_text: String,
    pub ai_generated: bool,
    pub status: EmailStatus,
    pub is_followup: bool,
    pub followup_number: u32,
    pub replied_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for an outreach draft.
#[derive(Debug, Clone)]
pub struct NewOutreachEmail {
    pub prospect_id: String,
    pub org_id: String,
    pub project_id: String,
    pub subject: String,
    pub body_html: String,
    pub body_text: String,
    pub ai_generated: bool,
    pub is_followup: bool,
    pub followup_number: u32,
}

/// Outcome of one tool call within an agent run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub tool_name: String,
    pub input: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub succeeded: bool,
}

/// A persisted chat message for a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMessage {
    pub id: String,
    pub project_id: String,
    pub user_id: String,
    pub role: AgentRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolInvocation>>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for an agent message.
#[derive(Debug, Clone)]
pub struct NewAgentMessage {
    pub project_id: String,
    pub user_id: String,
    pub role: AgentRole,
    pub content: String,
    pub tool_calls: Option<Vec<ToolInvocation>>,
}

/// Domain-level SEO metrics from the metrics provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainMetrics {
    pub domain_rating: u32,
    pub spam_score: u32,
    pub referring_domains: u32,
    pub monthly_traffic: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_ids_are_valid_uuids() {
        let id = new_record_id();
        assert!(is_valid_record_id(&id));
        assert!(!is_valid_record_id("proj-123"));
    }

    #[test]
    fn prospect_status_string_roundtrip() {
        for status in ProspectStatus::ALL {
            let parsed: ProspectStatus = status.as_str().parse().expect("parse status");
            assert_eq!(parsed, status);
        }
        assert!("archived".parse::<ProspectStatus>().is_err());
    }

    #[test]
    fn prospect_status_serde_matches_as_str() {
        let json = serde_json::to_string(&ProspectStatus::NeedsManualEnrichment).unwrap();
        assert_eq!(json, r#""needs_manual_enrichment""#);
    }

    #[test]
    fn terminal_and_contacted_sets() {
        assert!(ProspectStatus::Won.is_terminal());
        assert!(ProspectStatus::NotRelevant.is_terminal());
        assert!(!ProspectStatus::Contacted.is_terminal());
        assert!(ProspectStatus::Lost.is_contacted_or_later());
        assert!(!ProspectStatus::OutreachDrafted.is_contacted_or_later());
    }

    #[test]
    fn plan_limits() {
        assert_eq!(PlanTier::Starter.monthly_prospect_limit(), 200);
        assert_eq!(PlanTier::Growth.monthly_prospect_limit(), 1000);
        assert_eq!(PlanTier::Agency.monthly_prospect_limit(), 5000);
    }

    #[test]
    fn tool_invocation_omits_absent_result() {
        let record = ToolInvocation {
            tool_name: "check_link_live".into(),
            input: serde_json::json!({"prospect_id": "p1"}),
            result: None,
            error: Some("boom".into()),
            succeeded: false,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("\"result\""));
        assert!(json.contains("\"error\":\"boom\""));
    }
}
