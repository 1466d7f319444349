//! Commit tools. Prospects are only written here, and only against a job
//! whose preview is still open.

use std::collections::HashSet;

use chrono::Utc;
use linkhunter_scoring::{extract_domain, normalize_host};
use linkhunter_shared::{
    EntryMethod, ImportJob, ImportJobPatch, ImportJobStatus, LinkHunterError, NewProspect, Result,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use super::PROJECT_NOT_FOUND;
use crate::agent::dispatcher::{ToolContext, ToolDispatcher, tool_error};
use crate::discovery::OpportunityCandidate;
use crate::import_validation::{ValidationResult, ValidationSummary, validate_import_urls};
use crate::quota::check_prospect_quota;

#[derive(Debug, Deserialize)]
pub(crate) struct ImportProspectsInput {
    project_id: Option<String>,
    job_id: String,
    #[serde(default)]
    selected_prospect_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ValidateImportInput {
    project_id: Option<String>,
    urls: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConfirmImportInput {
    project_id: Option<String>,
    job_id: String,
    #[serde(default)]
    urls: Vec<String>,
}

/// Load `job_id` if it can still be committed, or explain why not.
async fn open_job(
    d: &ToolDispatcher,
    job_id: &str,
    project_id: &str,
    org_id: &str,
    created_by: EntryMethod,
) -> Result<std::result::Result<ImportJob, String>> {
    let Some(job) = d.storage().get_import_job(job_id, org_id).await? else {
        return Ok(Err("Import job not found".into()));
    };
    if job.project_id != project_id {
        return Ok(Err("Import job belongs to a different project".into()));
    }
    if job.entry_method != created_by {
        let tool = match created_by {
            EntryMethod::Discovery => "run_discovery",
            _ => "validate_import",
        };
        return Ok(Err(format!("Import job was not created by {tool}")));
    }
    match job.status {
        ImportJobStatus::Complete => Ok(Err("Import job has already been completed".into())),
        ImportJobStatus::Pending => Ok(Err("Import job has no results to import yet".into())),
        ImportJobStatus::Running if job.results_payload.is_none() => {
            Ok(Err("Import job has no results to import yet".into()))
        }
        ImportJobStatus::Running => Ok(Ok(job)),
    }
}

/// Items picked from a job, split by what happens to them.
#[derive(Default)]
struct Selection {
    create: Vec<NewProspect>,
    rejected: Vec<Value>,
    skipped: Vec<String>,
}

impl Selection {
    fn reject(&mut self, item: &str, reason: impl Into<String>) {
        self.rejected
            .push(json!({ "item": item, "reason": reason.into() }));
    }
}

fn domain_of(item: &str) -> String {
    extract_domain(item).unwrap_or_else(|| normalize_host(item))
}

/// Enforce the quota, write the prospects, charge the quota and close the
/// job. Nothing is written when the quota is short or nothing survived.
async fn commit(
    d: &ToolDispatcher,
    ctx: &ToolContext<'_>,
    job: &ImportJob,
    selection: Selection,
) -> Result<Value> {
    let storage = d.storage();
    let requested = selection.create.len() as u32;

    if requested == 0 {
        return Ok(json!({
            "imported": 0,
            "prospect_ids": [],
            "rejected": selection.rejected,
            "skipped": selection.skipped,
        }));
    }

    let Some(org) = storage.get_organisation(ctx.org_id).await? else {
        return Ok(tool_error("Organisation not found"));
    };
    let quota = check_prospect_quota(&org, requested);
    if !quota.allowed {
        warn!(
            org_id = %org.id,
            requested,
            remaining = quota.remaining,
            "import refused by quota"
        );
        return Ok(json!({
            "error": format!("Quota exceeded: {} prospects remaining", quota.remaining),
            "remaining": quota.remaining,
            "requested": requested,
        }));
    }

    let created = storage
        .commit_import_job(&job.id, &job.project_id, ctx.org_id, &selection.create)
        .await?;

    info!(job_id = %job.id, imported = created.len(), "import committed");
    let ids: Vec<&str> = created.iter().map(|p| p.id.as_str()).collect();
    Ok(json!({
        "imported": created.len(),
        "prospect_ids": ids,
        "rejected": selection.rejected,
        "skipped": selection.skipped,
    }))
}

/// Commit user-approved candidates from a discovery job.
pub(crate) async fn import_prospects(
    d: &ToolDispatcher,
    input: ImportProspectsInput,
    ctx: &ToolContext<'_>,
) -> Result<Value> {
    let project_id = ctx.project(&input.project_id);
    let Some(project) = d.storage().get_project(project_id, ctx.org_id).await? else {
        return Ok(tool_error(PROJECT_NOT_FOUND));
    };
    let job = match open_job(d, &input.job_id, &project.id, ctx.org_id, EntryMethod::Discovery).await? {
        Ok(job) => job,
        Err(reason) => return Ok(tool_error(reason)),
    };

    let candidates: Vec<OpportunityCandidate> = job
        .results_payload
        .as_ref()
        .and_then(|payload| payload.get("opportunities"))
        .map(|list| serde_json::from_value(list.clone()))
        .transpose()
        .map_err(|e| LinkHunterError::parse(e.to_string()))?
        .unwrap_or_default();

    let mut taken = d.storage().prospect_domains(&project.id, ctx.org_id).await?;
    let mut selection = Selection::default();

    for item in &input.selected_prospect_ids {
        let item = item.trim();
        let domain = domain_of(item);
        let Some(candidate) = candidates
            .iter()
            .find(|c| c.url == item || c.domain == domain)
        else {
            selection.reject(item, "Not part of this discovery job");
            continue;
        };
        if !taken.insert(candidate.domain.clone()) {
            selection.skipped.push(candidate.domain.clone());
            continue;
        }
        selection.create.push(NewProspect {
            prospect_url: candidate.url.clone(),
            prospect_domain: candidate.domain.clone(),
            page_title: Some(candidate.title.clone()),
            page_url: Some(candidate.url.clone()),
            snippet: Some(candidate.snippet.clone()),
            opportunity_type: Some(candidate.opportunity_type),
            domain_authority: candidate.domain_authority,
            spam_score: candidate.spam_score,
            linkability_score: Some(candidate.linkability_score),
            relevance_score: Some(candidate.relevance_score),
            entry_method: EntryMethod::Discovery,
        });
    }

    commit(d, ctx, &job, selection).await
}

/// Validate user-supplied URLs into a running import job. Writes no
/// prospects.
pub(crate) async fn validate_import(
    d: &ToolDispatcher,
    input: ValidateImportInput,
    ctx: &ToolContext<'_>,
) -> Result<Value> {
    let project_id = ctx.project(&input.project_id);
    let Some(project) = d.storage().get_project(project_id, ctx.org_id).await? else {
        return Ok(tool_error(PROJECT_NOT_FOUND));
    };
    if input.urls.is_empty() {
        return Ok(tool_error("No URLs supplied"));
    }

    let storage = d.storage();
    let job = storage
        .create_import_job(
            &project.id,
            ctx.org_id,
            EntryMethod::Import,
            input.urls.len() as u32,
            &json!({ "urls": input.urls }),
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

    let validated = validate_import_urls(
        &input.urls,
        &project.id,
        ctx.org_id,
        storage,
        d.collaborators().metrics.as_ref(),
        &d.settings().import_validation,
    )
    .await;
    let results = match validated {
        Ok(results) => results,
        Err(e) => {
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

    let summary = ValidationSummary::of(&results);
    storage
        .update_import_job(
            &job.id,
            ctx.org_id,
            &ImportJobPatch {
                total_passed: Some(summary.passed),
                total_review: Some(summary.review),
                total_failed: Some(summary.failed),
                results_payload: Some(json!({ "results": results })),
                ..ImportJobPatch::default()
            },
        )
        .await?;

    let rows: Vec<Value> = results
        .iter()
        .map(|r| {
            json!({
                "url": r.url,
                "domain": r.domain,
                "bucket": r.bucket,
                "reason": r.reason,
                "da": r.domain_authority,
                "spam_score": r.spam_score,
            })
        })
        .collect();

    Ok(json!({
        "job_id": job.id,
        "total": summary.total,
        "passed": summary.passed,
        "review": summary.review,
        "failed": summary.failed,
        "results": rows,
    }))
}

/// Commit validated URLs from an import job. Failed URLs never get through.
pub(crate) async fn confirm_import(
    d: &ToolDispatcher,
    input: ConfirmImportInput,
    ctx: &ToolContext<'_>,
) -> Result<Value> {
    let project_id = ctx.project(&input.project_id);
    let Some(project) = d.storage().get_project(project_id, ctx.org_id).await? else {
        return Ok(tool_error(PROJECT_NOT_FOUND));
    };
    let job = match open_job(d, &input.job_id, &project.id, ctx.org_id, EntryMethod::Import).await? {
        Ok(job) => job,
        Err(reason) => return Ok(tool_error(reason)),
    };

    let validated: Vec<ValidationResult> = job
        .results_payload
        .as_ref()
        .and_then(|payload| payload.get("results"))
        .map(|list| serde_json::from_value(list.clone()))
        .transpose()
        .map_err(|e| LinkHunterError::parse(e.to_string()))?
        .unwrap_or_default();

    let mut taken: HashSet<String> = d.storage().prospect_domains(&project.id, ctx.org_id).await?;
    let mut selection = Selection::default();

    for item in &input.urls {
        let item = item.trim();
        let domain = domain_of(item);
        let Some(result) = validated
            .iter()
            .find(|r| r.url == item || (!r.domain.is_empty() && r.domain == domain))
        else {
            selection.reject(item, "Not part of this validation job");
            continue;
        };
        if !result.is_importable() {
            let reason = result.reason.as_deref().unwrap_or("Failed validation");
            selection.reject(item, reason);
            continue;
        }
        if !taken.insert(result.domain.clone()) {
            selection.skipped.push(result.domain.clone());
            continue;
        }
        selection.create.push(NewProspect {
            domain_authority: result.domain_authority,
            spam_score: result.spam_score,
            ..NewProspect::bare(&result.url, &result.domain, EntryMethod::Import)
        });
    }

    commit(d, ctx, &job, selection).await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::agent::dispatcher::{DispatcherSettings, is_error_result};
    use crate::testing::{FakeMetrics, FakeSearch, fake_collaborators, seeded_storage, use_quota};
    use linkhunter_shared::{DomainMetrics, Organisation, PlanTier, Project};
    use linkhunter_storage::Storage;

    const FOUND: [&str; 3] = [
        "https://one.co.uk/resources",
        "https://two.co.uk/links",
        "https://three.co.uk/useful-sites",
    ];

    async fn setup() -> (Arc<Storage>, Organisation, Project, ToolDispatcher) {
        let (storage, org, project) = seeded_storage().await;
        let storage = Arc::new(storage);
        let mut collaborators = fake_collaborators();
        collaborators.search = Arc::new(FakeSearch::with_urls(&FOUND));
        collaborators.metrics = Arc::new(
            FakeMetrics::default()
                .with(
                    "good.co.uk",
                    DomainMetrics { domain_rating: 40, spam_score: 2, referring_domains: 50, monthly_traffic: 0 },
                )
                .with(
                    "spammy.co.uk",
                    DomainMetrics { domain_rating: 30, spam_score: 70, referring_domains: 5, monthly_traffic: 0 },
                ),
        );
        let dispatcher =
            ToolDispatcher::new(storage.clone(), collaborators, DispatcherSettings::default());
        (storage, org, project, dispatcher)
    }

    async fn discovery_job(dispatcher: &ToolDispatcher, project: &Project, org: &Organisation) -> String {
        let result = dispatcher
            .execute(
                "run_discovery",
                json!({ "project_id": project.id, "keywords": ["plumbing"] }),
                &project.id,
                &org.id,
            )
            .await
            .unwrap();
        result["job_id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn import_requires_an_existing_job() {
        let (storage, org, project, dispatcher) = setup().await;

        let result = dispatcher
            .execute(
                "import_prospects",
                json!({ "project_id": project.id, "job_id": "missing", "selected_prospect_ids": [FOUND[0]] }),
                &project.id,
                &org.id,
            )
            .await
            .unwrap();

        assert_eq!(result["error"], json!("Import job not found"));
        assert!(storage.list_prospects(&project.id, &org.id, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn import_commits_selection_and_charges_quota() {
        let (storage, org, project, dispatcher) = setup().await;
        let job_id = discovery_job(&dispatcher, &project, &org).await;

        let result = dispatcher
            .execute(
                "import_prospects",
                json!({
                    "project_id": project.id,
                    "job_id": job_id,
                    "selected_prospect_ids": [FOUND[0], "two.co.uk", "https://elsewhere.co.uk/"]
                }),
                &project.id,
                &org.id,
            )
            .await
            .unwrap();

        assert!(!is_error_result(&result));
        assert_eq!(result["imported"], json!(2));
        assert_eq!(result["rejected"][0]["item"], json!("https://elsewhere.co.uk/"));

        let prospects = storage.list_prospects(&project.id, &org.id, None).await.unwrap();
        assert_eq!(prospects.len(), 2);
        assert!(prospects.iter().all(|p| p.entry_method == EntryMethod::Discovery));

        let org_after = storage.get_organisation(&org.id).await.unwrap().unwrap();
        assert_eq!(org_after.prospects_used_this_month, 2);

        let job = storage.get_import_job(&job_id, &org.id).await.unwrap().unwrap();
        assert_eq!(job.status, ImportJobStatus::Complete);
        assert!(job.completed_at.is_some());
    }

    #[tokio::test]
    async fn completed_job_cannot_be_committed_twice() {
        let (storage, org, project, dispatcher) = setup().await;
        let job_id = discovery_job(&dispatcher, &project, &org).await;
        let input = json!({ "project_id": project.id, "job_id": job_id, "selected_prospect_ids": [FOUND[2]] });

        dispatcher
            .execute("import_prospects", input.clone(), &project.id, &org.id)
            .await
            .unwrap();
        let second = dispatcher
            .execute("import_prospects", input, &project.id, &org.id)
            .await
            .unwrap();

        assert_eq!(second["error"], json!("Import job has already been completed"));
        assert_eq!(storage.list_prospects(&project.id, &org.id, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn another_orgs_job_is_not_found() {
        let (storage, org, project, dispatcher) = setup().await;
        let job_id = discovery_job(&dispatcher, &project, &org).await;
        let rival = storage.create_organisation("Rival", PlanTier::Growth).await.unwrap();
        let rival_project = storage
            .create_project(&rival.id, "Rival", "https://rival.co.uk", &[])
            .await
            .unwrap();

        let result = dispatcher
            .execute(
                "import_prospects",
                json!({ "project_id": rival_project.id, "job_id": job_id, "selected_prospect_ids": [FOUND[0]] }),
                &rival_project.id,
                &rival.id,
            )
            .await
            .unwrap();

        assert_eq!(result["error"], json!("Import job not found"));
    }

    #[tokio::test]
    async fn quota_shortfall_writes_nothing() {
        let (storage, org, project, dispatcher) = setup().await;
        use_quota(&storage, &org, &project, org.monthly_prospect_limit - 1).await;
        let job_id = discovery_job(&dispatcher, &project, &org).await;

        let result = dispatcher
            .execute(
                "import_prospects",
                json!({ "project_id": project.id, "job_id": job_id, "selected_prospect_ids": [FOUND[0], FOUND[1]] }),
                &project.id,
                &org.id,
            )
            .await
            .unwrap();

        assert_eq!(result["error"], json!("Quota exceeded: 1 prospects remaining"));
        assert_eq!(result["remaining"], json!(1));
        assert_eq!(result["requested"], json!(2));
        let domains = storage.prospect_domains(&project.id, &org.id).await.unwrap();
        assert!(!domains.contains("one.co.uk") && !domains.contains("two.co.uk"));

        let org_after = storage.get_organisation(&org.id).await.unwrap().unwrap();
        assert_eq!(org_after.prospects_used_this_month, org.monthly_prospect_limit - 1);
        let job = storage.get_import_job(&job_id, &org.id).await.unwrap().unwrap();
        assert_eq!(job.status, ImportJobStatus::Running);
    }

    #[tokio::test]
    async fn domains_taken_after_discovery_are_skipped_and_not_charged() {
        let (storage, org, project, dispatcher) = setup().await;
        let job_id = discovery_job(&dispatcher, &project, &org).await;
        storage
            .insert_prospects(
                &project.id,
                &org.id,
                &[NewProspect::bare("https://one.co.uk/", "one.co.uk", EntryMethod::Manual)],
            )
            .await
            .unwrap();

        let result = dispatcher
            .execute(
                "import_prospects",
                json!({ "project_id": project.id, "job_id": job_id, "selected_prospect_ids": FOUND }),
                &project.id,
                &org.id,
            )
            .await
            .unwrap();

        assert_eq!(result["imported"], json!(2));
        assert_eq!(result["skipped"], json!(["one.co.uk"]));
        assert_eq!(result["prospect_ids"].as_array().unwrap().len(), 2);

        let org_after = storage.get_organisation(&org.id).await.unwrap().unwrap();
        assert_eq!(org_after.prospects_used_this_month, 2);
        assert_eq!(storage.list_prospects(&project.id, &org.id, None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn confirm_skips_domains_taken_after_validation() {
        let (storage, org, project, dispatcher) = setup().await;
        let urls = ["https://good.co.uk/resources", "https://two.co.uk/links"];
        let validation = dispatcher
            .execute(
                "validate_import",
                json!({ "project_id": project.id, "urls": urls }),
                &project.id,
                &org.id,
            )
            .await
            .unwrap();
        assert_eq!(validation["failed"], json!(0));
        storage
            .insert_prospects(
                &project.id,
                &org.id,
                &[NewProspect::bare("https://two.co.uk/", "two.co.uk", EntryMethod::Manual)],
            )
            .await
            .unwrap();

        let result = dispatcher
            .execute(
                "confirm_import",
                json!({ "project_id": project.id, "job_id": validation["job_id"], "urls": urls }),
                &project.id,
                &org.id,
            )
            .await
            .unwrap();

        assert_eq!(result["imported"], json!(1));
        assert_eq!(result["skipped"], json!(["two.co.uk"]));
        let org_after = storage.get_organisation(&org.id).await.unwrap().unwrap();
        assert_eq!(org_after.prospects_used_this_month, 1);
    }

    #[tokio::test]
    async fn confirm_rejects_urls_that_failed_validation() {
        let (storage, org, project, dispatcher) = setup().await;
        let urls = [
            "https://good.co.uk/resources",
            "https://spammy.co.uk/links",
            "https://www.facebook.com/acme",
        ];

        let validation = dispatcher
            .execute(
                "validate_import",
                json!({ "project_id": project.id, "urls": urls }),
                &project.id,
                &org.id,
            )
            .await
            .unwrap();
        assert_eq!(validation["passed"], json!(1));
        assert_eq!(validation["failed"], json!(2));
        assert!(storage.list_prospects(&project.id, &org.id, None).await.unwrap().is_empty());

        let job_id = validation["job_id"].as_str().unwrap();
        let result = dispatcher
            .execute(
                "confirm_import",
                json!({ "project_id": project.id, "job_id": job_id, "urls": urls }),
                &project.id,
                &org.id,
            )
            .await
            .unwrap();

        assert_eq!(result["imported"], json!(1));
        assert_eq!(result["rejected"].as_array().unwrap().len(), 2);
        assert_eq!(result["rejected"][1]["reason"], json!("Excluded domain"));

        let prospects = storage.list_prospects(&project.id, &org.id, None).await.unwrap();
        assert_eq!(prospects.len(), 1);
        assert_eq!(prospects[0].prospect_domain, "good.co.uk");
        assert_eq!(prospects[0].entry_method, EntryMethod::Import);
        assert_eq!(prospects[0].domain_authority, Some(40));
    }

    #[tokio::test]
    async fn confirm_refuses_a_discovery_job() {
        let (_storage, org, project, dispatcher) = setup().await;
        let job_id = discovery_job(&dispatcher, &project, &org).await;

        let result = dispatcher
            .execute(
                "confirm_import",
                json!({ "project_id": project.id, "job_id": job_id, "urls": [FOUND[0]] }),
                &project.id,
                &org.id,
            )
            .await
            .unwrap();

        assert_eq!(result["error"], json!("Import job was not created by validate_import"));
    }
}
