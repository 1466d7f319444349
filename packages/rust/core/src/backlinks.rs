//! Pull a project's existing backlinks from the metrics provider.

use linkhunter_providers::MetricsProvider;
use linkhunter_scoring::extract_domain;
use linkhunter_shared::{LinkHunterError, Project, Result};
use linkhunter_storage::{NewExistingBacklink, Storage};
use serde::Serialize;
use tracing::{info, instrument};

/// Backlinks requested per sync.
pub const DEFAULT_SYNC_LIMIT: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BacklinkSyncReport {
    pub fetched: usize,
    pub stored: usize,
}

/// Fetch backlinks to the project's domain and upsert them, keyed by
/// linking URL.
#[instrument(skip_all, fields(project_id = %project.id))]
pub async fn sync_existing_backlinks(
    project: &Project,
    storage: &Storage,
    metrics: &dyn MetricsProvider,
    limit: u32,
) -> Result<BacklinkSyncReport> {
    let domain = extract_domain(&project.target_url).ok_or_else(|| {
        LinkHunterError::validation(format!("invalid project URL: {}", project.target_url))
    })?;

    let entries = metrics.backlinks(&domain, limit).await?;
    let links: Vec<NewExistingBacklink> = entries
        .into_iter()
        .filter(|e| !e.linking_url.is_empty())
        .map(|e| NewExistingBacklink {
            linking_domain: e.linking_domain,
            linking_url: e.linking_url,
            dr: e.dr,
            first_seen: e.first_seen,
        })
        .collect();

    let stored = storage
        .upsert_existing_backlinks(&project.id, &project.org_id, &links)
        .await?;

    info!(domain = %domain, fetched = links.len(), stored, "backlink sync complete");
    Ok(BacklinkSyncReport {
        fetched: links.len(),
        stored,
    })
}
