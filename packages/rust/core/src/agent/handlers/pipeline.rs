//! Pipeline reporting, manual status moves and won-link checks.

use chrono::Utc;
use linkhunter_shared::{ProspectStatus, Result};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{PROJECT_NOT_FOUND, PROSPECT_NOT_FOUND, ProjectInput, ProspectInput};
use crate::agent::dispatcher::{ToolContext, ToolDispatcher, to_value, tool_error};
use crate::link_monitor::check_and_record;
use crate::pipeline::{classify_attention, pipeline_summary};

pub(crate) async fn get_pipeline_summary(
    d: &ToolDispatcher,
    input: ProjectInput,
    ctx: &ToolContext<'_>,
) -> Result<Value> {
    let project_id = ctx.project(&input.project_id);
    let Some(project) = d.storage().get_project(project_id, ctx.org_id).await? else {
        return Ok(tool_error(PROJECT_NOT_FOUND));
    };
    let summary = pipeline_summary(&project.id, ctx.org_id, d.storage()).await?;
    to_value(&summary)
}

pub(crate) async fn get_prospects_needing_attention(
    d: &ToolDispatcher,
    input: ProjectInput,
    ctx: &ToolContext<'_>,
) -> Result<Value> {
    let project_id = ctx.project(&input.project_id);
    let Some(project) = d.storage().get_project(project_id, ctx.org_id).await? else {
        return Ok(tool_error(PROJECT_NOT_FOUND));
    };
    let prospects = d
        .storage()
        .list_prospects(&project.id, ctx.org_id, None)
        .await?;
    to_value(&classify_attention(&prospects, Utc::now()))
}

#[derive(Debug, Deserialize)]
pub(crate) struct UpdateStatusInput {
    prospect_id: String,
    status: ProspectStatus,
    notes: Option<String>,
}

/// Any stage may move to any other. Moving to `contacted` or `followed_up`
/// stamps the contact times.
pub(crate) async fn update_prospect_status(
    d: &ToolDispatcher,
    input: UpdateStatusInput,
    ctx: &ToolContext<'_>,
) -> Result<Value> {
    let storage = d.storage();
    let Some(prospect) = storage.get_prospect(&input.prospect_id, ctx.org_id).await? else {
        return Ok(tool_error(PROSPECT_NOT_FOUND));
    };

    let contacted_at = matches!(
        input.status,
        ProspectStatus::Contacted | ProspectStatus::FollowedUp
    )
    .then(Utc::now);
    let notes = input
        .notes
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());

    storage
        .set_prospect_status(&prospect.id, ctx.org_id, input.status, notes, contacted_at)
        .await?;

    Ok(json!({
        "prospect_id": prospect.id,
        "domain": prospect.prospect_domain,
        "old_status": prospect.status,
        "new_status": input.status,
    }))
}

pub(crate) async fn check_link_live(
    d: &ToolDispatcher,
    input: ProspectInput,
    ctx: &ToolContext<'_>,
) -> Result<Value> {
    let storage = d.storage();
    let Some(prospect) = storage.get_prospect(&input.prospect_id, ctx.org_id).await? else {
        return Ok(tool_error(PROSPECT_NOT_FOUND));
    };
    let Some(project) = storage.get_project(&prospect.project_id, ctx.org_id).await? else {
        return Ok(tool_error(PROJECT_NOT_FOUND));
    };

    let verification = check_and_record(
        &prospect,
        &project.target_url,
        storage,
        &d.collaborators().verifier,
    )
    .await?;

    Ok(json!({
        "prospect_id": prospect.id,
        "domain": prospect.prospect_domain,
        "checked_url": verification.checked_url,
        "link_live": verification.link_live,
        "link_url": verification.link_url,
        "verified_at": verification.verified_at,
        "error": verification.error,
    }))
}
