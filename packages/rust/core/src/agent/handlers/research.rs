//! Read-only and preview tools: site analysis, backlink profile, discovery.

use chrono::Utc;
use linkhunter_shared::{
    EntryMethod, ImportJobPatch, ImportJobStatus, OpportunityType, Result,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::warn;

use super::{PROJECT_NOT_FOUND, ProjectInput};
use crate::agent::dispatcher::{ToolContext, ToolDispatcher, tool_error};
use crate::discovery::{DiscoveryRequest, discover_opportunities};

pub(crate) async fn analyse_site(
    d: &ToolDispatcher,
    input: ProjectInput,
    ctx: &ToolContext<'_>,
) -> Result<Value> {
    let project_id = ctx.project(&input.project_id);
    let Some(project) = d.storage().get_project(project_id, ctx.org_id).await? else {
        return Ok(tool_error(PROJECT_NOT_FOUND));
    };

    let analysis = d
        .collaborators()
        .site_analyser
        .analyse(&project.target_url)
        .await?;
    Ok(json!({ "project_id": project.id, "analysis": analysis }))
}

pub(crate) async fn check_existing_backlinks(
    d: &ToolDispatcher,
    input: ProjectInput,
    ctx: &ToolContext<'_>,
) -> Result<Value> {
    let project_id = ctx.project(&input.project_id);
    let Some(project) = d.storage().get_project(project_id, ctx.org_id).await? else {
        return Ok(tool_error(PROJECT_NOT_FOUND));
    };

    let backlinks = d
        .storage()
        .list_existing_backlinks(&project.id, ctx.org_id)
        .await?;
    let domains: Vec<Value> = backlinks
        .iter()
        .map(|b| json!({ "domain": b.linking_domain, "url": b.linking_url, "dr": b.dr }))
        .collect();

    Ok(json!({
        "project_id": project.id,
        "count": domains.len(),
        "domains": domains,
    }))
}

/// Opportunity types as the model names them.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum RequestedOpportunity {
    #[serde(alias = "resource_link")]
    ResourcePage,
    GuestPost,
    #[serde(alias = "link_exchange")]
    DirectoryListing,
    #[serde(alias = "mention")]
    CompetitorMention,
    BrokenLink,
}

impl From<RequestedOpportunity> for OpportunityType {
    fn from(requested: RequestedOpportunity) -> Self {
        match requested {
            RequestedOpportunity::ResourcePage => Self::ResourceLink,
            RequestedOpportunity::GuestPost => Self::GuestPost,
            RequestedOpportunity::DirectoryListing => Self::LinkExchange,
            RequestedOpportunity::CompetitorMention => Self::Mention,
            RequestedOpportunity::BrokenLink => Self::BrokenLink,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RunDiscoveryInput {
    project_id: Option<String>,
    #[serde(default)]
    keywords: Vec<String>,
    competitor_url: Option<String>,
    #[serde(default)]
    opportunity_types: Vec<RequestedOpportunity>,
    limit: Option<u32>,
}

/// Run discovery and snapshot the candidates into a running import job.
/// No prospects are written.
pub(crate) async fn run_discovery(
    d: &ToolDispatcher,
    input: RunDiscoveryInput,
    ctx: &ToolContext<'_>,
) -> Result<Value> {
    let project_id = ctx.project(&input.project_id);
    let Some(project) = d.storage().get_project(project_id, ctx.org_id).await? else {
        return Ok(tool_error(PROJECT_NOT_FOUND));
    };

    let mut types: Vec<OpportunityType> = input
        .opportunity_types
        .iter()
        .map(|t| OpportunityType::from(*t))
        .collect();
    if types.is_empty() {
        types = vec![OpportunityType::ResourceLink, OpportunityType::GuestPost];
    }

    let request = DiscoveryRequest {
        keywords: input.keywords,
        competitor_url: input.competitor_url,
        opportunity_types: types,
        limit: input.limit.map(|l| l as usize),
        ..DiscoveryRequest::default()
    };

    let storage = d.storage();
    let job = storage
        .create_import_job(
            &project.id,
            ctx.org_id,
            EntryMethod::Discovery,
            0,
            &json!({
                "keywords": request.keywords,
                "competitor_url": request.competitor_url,
                "opportunity_types": request.opportunity_types,
                "limit": request.limit,
            }),
        )
        .await?;
    storage
        .update_import_job(
            &job.id,
            ctx.org_id,
            &ImportJobPatch {
                status: Some(ImportJobStatus::Running),
                ..ImportJobPatch::default()
            },
        )
        .await?;

    let collaborators = d.collaborators();
    let discovered = discover_opportunities(
        &request,
        &project,
        storage,
        collaborators.search.as_ref(),
        collaborators.metrics.as_ref(),
        &d.settings().discovery,
    )
    .await;

    let candidates = match discovered {
        Ok(candidates) => candidates,
        Err(e) => {
            warn!(job_id = %job.id, error = %e, "discovery failed, closing job");
            storage
                .update_import_job(
                    &job.id,
                    ctx.org_id,
                    &ImportJobPatch {
                        status: Some(ImportJobStatus::Complete),
                        completed_at: Some(Utc::now()),
                        ..ImportJobPatch::default()
                    },
                )
                .await?;
            return Err(e);
        }
    };

    let total = candidates.len() as u32;
    storage
        .update_import_job(
            &job.id,
            ctx.org_id,
            &ImportJobPatch {
                total_submitted: Some(total),
                total_passed: Some(total),
                results_payload: Some(json!({ "opportunities": candidates })),
                ..ImportJobPatch::default()
            },
        )
        .await?;

    let opportunities: Vec<Value> = candidates
        .iter()
        .map(|c| {
            json!({
                "url": c.url,
                "domain": c.domain,
                "title": c.title,
                "type": c.opportunity_type,
                "da": c.domain_authority,
                "spam_score": c.spam_score,
                "linkability_score": c.linkability_score,
                "relevance_score": c.relevance_score,
            })
        })
        .collect();

    Ok(json!({
        "job_id": job.id,
        "total": opportunities.len(),
        "opportunities": opportunities,
    }))
}
