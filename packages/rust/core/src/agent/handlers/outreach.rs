//! Contact enrichment and outreach drafting. Emails are stored as drafts
//! and never sent.

use linkhunter_providers::DraftOptions;
use linkhunter_shared::{NewOutreachEmail, OutreachTone, Result};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::warn;

use super::{PROJECT_NOT_FOUND, PROSPECT_NOT_FOUND};
use crate::agent::dispatcher::{ToolContext, ToolDispatcher, is_error_result, to_value, tool_error};
use crate::enrichment::enrich_prospects;

const PREVIEW_CHARS: usize = 200;

#[derive(Debug, Deserialize)]
pub(crate) struct EnrichContactsInput {
    prospect_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GenerateEmailInput {
    prospect_id: String,
    #[serde(default)]
    tone: OutreachTone,
    #[serde(default)]
    is_followup: bool,
    followup_number: Option<u32>,
    custom_value_prop: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BulkEmailInput {
    prospect_ids: Vec<String>,
    #[serde(default)]
    tone: OutreachTone,
    #[serde(default)]
    is_followup: bool,
}

pub(crate) async fn enrich_contacts(
    d: &ToolDispatcher,
    input: EnrichContactsInput,
    ctx: &ToolContext<'_>,
) -> Result<Value> {
    let report = enrich_prospects(
        &input.prospect_ids,
        ctx.org_id,
        d.storage(),
        d.collaborators().contacts.as_ref(),
    )
    .await;
    to_value(&report)
}

pub(crate) async fn generate_outreach_email(
    d: &ToolDispatcher,
    input: GenerateEmailInput,
    ctx: &ToolContext<'_>,
) -> Result<Value> {
    let opts = DraftOptions {
        tone: input.tone,
        custom_value_prop: input.custom_value_prop,
        is_followup: input.is_followup,
    };
    draft_one(d, ctx, &input.prospect_id, &opts, input.followup_number).await
}

/// Draft for each prospect in turn. One failure does not stop the rest.
pub(crate) async fn generate_bulk_emails(
    d: &ToolDispatcher,
    input: BulkEmailInput,
    ctx: &ToolContext<'_>,
) -> Result<Value> {
    let opts = DraftOptions {
        tone: input.tone,
        custom_value_prop: None,
        is_followup: input.is_followup,
    };

    let mut results = Vec::with_capacity(input.prospect_ids.len());
    let mut drafted = 0;
    for prospect_id in &input.prospect_ids {
        match draft_one(d, ctx, prospect_id, &opts, None).await {
            Ok(value) if is_error_result(&value) => {
                results.push(json!({ "prospect_id": prospect_id, "error": value["error"] }));
            }
            Ok(value) => {
                drafted += 1;
                results.push(value);
            }
            Err(e) => {
                warn!(prospect_id = %prospect_id, error = %e, "bulk draft failed");
                results.push(json!({ "prospect_id": prospect_id, "error": e.to_string() }));
            }
        }
    }

    Ok(json!({
        "total": input.prospect_ids.len(),
        "drafted": drafted,
        "failed": input.prospect_ids.len() - drafted,
        "results": results,
    }))
}

async fn draft_one(
    d: &ToolDispatcher,
    ctx: &ToolContext<'_>,
    prospect_id: &str,
    opts: &DraftOptions,
    followup_number: Option<u32>,
) -> Result<Value> {
    let storage = d.storage();
    let Some(prospect) = storage.get_prospect(prospect_id, ctx.org_id).await? else {
        return Ok(tool_error(PROSPECT_NOT_FOUND));
    };
    let Some(project) = storage.get_project(&prospect.project_id, ctx.org_id).await? else {
        return Ok(tool_error(PROJECT_NOT_FOUND));
    };

    let followup_number = match (opts.is_followup, followup_number) {
        (false, _) => 0,
        (true, Some(n)) => n,
        (true, None) => {
            let sent = storage.list_prospect_emails(&prospect.id, ctx.org_id).await?;
            sent.iter().filter(|e| e.is_followup).count() as u32 + 1
        }
    };

    let draft = d
        .collaborators()
        .drafter
        .draft(&prospect, &project, opts)
        .await?;

    let email = storage
        .insert_outreach_email(&NewOutreachEmail {
            prospect_id: prospect.id.clone(),
            org_id: ctx.org_id.to_string(),
            project_id: project.id.clone(),
            subject: draft.subject,
            body_html: draft.body_html,
            body_text: draft.body_text,
            ai_generated: true,
            is_followup: opts.is_followup,
            followup_number,
        })
        .await?;
    storage.mark_outreach_drafted(&prospect.id, ctx.org_id).await?;

    let preview: String = email.body_text.chars().take(PREVIEW_CHARS).collect();
    Ok(json!({
        "email_id": email.id,
        "prospect_id": prospect.id,
        "domain": prospect.prospect_domain,
        "subject": email.subject,
        "body_preview": preview,
        "is_followup": email.is_followup,
        "followup_number": email.followup_number,
    }))
}
