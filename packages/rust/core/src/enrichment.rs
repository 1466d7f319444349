//! Contact enrichment for a batch of prospects.

use linkhunter_providers::ContactFinder;
use linkhunter_shared::{ProspectStatus, Result};
use linkhunter_storage::{ContactUpdate, Storage};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

const SOURCE_MATCH: &str = "hunter";
const SOURCE_NO_MATCH: &str = "hunter_no_match";

/// Per-prospect enrichment outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EnrichmentOutcome {
    Checked {
        prospect_id: String,
        domain: String,
        contact_found: bool,
        contact_email: Option<String>,
        contact_name: Option<String>,
    },
    Failed {
        prospect_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        domain: Option<String>,
        error: String,
    },
}

impl EnrichmentOutcome {
    pub fn contact_found(&self) -> bool {
        matches!(self, Self::Checked { contact_found: true, .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrichmentReport {
    pub total: usize,
    pub contacts_found: usize,
    pub contacts_missing: usize,
    pub results: Vec<EnrichmentOutcome>,
}

/// Look up a contact for each prospect in order.
///
/// A missing prospect or a failing lookup is recorded on that item and the
/// batch continues.
#[instrument(skip_all, fields(prospects = prospect_ids.len()))]
pub async fn enrich_prospects(
    prospect_ids: &[String],
    org_id: &str,
    storage: &Storage,
    contacts: &dyn ContactFinder,
) -> EnrichmentReport {
    let mut results = Vec::with_capacity(prospect_ids.len());

    for id in prospect_ids {
        let outcome = match enrich_one(id, org_id, storage, contacts).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(prospect_id = %id, error = %e, "enrichment failed");
                EnrichmentOutcome::Failed {
                    prospect_id: id.clone(),
                    domain: None,
                    error: e.to_string(),
                }
            }
        };
        results.push(outcome);
    }

    let found = results.iter().filter(|r| r.contact_found()).count();
    info!(total = results.len(), found, "enrichment complete");

    EnrichmentReport {
        total: results.len(),
        contacts_found: found,
        contacts_missing: results.len() - found,
        results,
    }
}

async fn enrich_one(
    prospect_id: &str,
    org_id: &str,
    storage: &Storage,
    contacts: &dyn ContactFinder,
) -> Result<EnrichmentOutcome> {
    let Some(prospect) = storage.get_prospect(prospect_id, org_id).await? else {
        return Ok(EnrichmentOutcome::Failed {
            prospect_id: prospect_id.to_string(),
            domain: None,
            error: "Not found".into(),
        });
    };

    let contact = match contacts.best_contact(&prospect.prospect_domain).await {
        Ok(contact) => contact,
        Err(e) => {
            return Ok(EnrichmentOutcome::Failed {
                prospect_id: prospect.id,
                domain: Some(prospect.prospect_domain),
                error: e.to_string(),
            });
        }
    };

    // Later stages keep their status; only contact fields are refreshed.
    let enrichable = prospect.status.is_pre_outreach();
    let (update, status) = match &contact {
        Some(c) => (
            ContactUpdate {
                name: Some(c.name.clone()).filter(|n| !n.is_empty()),
                email: Some(c.email.clone()),
                role: Some(c.role.clone()).filter(|r| !r.is_empty()),
                source: SOURCE_MATCH.into(),
            },
            enrichable.then_some(ProspectStatus::Enriched),
        ),
        None => (
            ContactUpdate {
                source: SOURCE_NO_MATCH.into(),
                ..ContactUpdate::default()
            },
            enrichable.then_some(ProspectStatus::NeedsManualEnrichment),
        ),
    };

    storage
        .update_prospect_contact(&prospect.id, org_id, &update, status)
        .await?;
    debug!(domain = %prospect.prospect_domain, found = contact.is_some(), "prospect enriched");

    Ok(EnrichmentOutcome::Checked {
        prospect_id: prospect.id,
        domain: prospect.prospect_domain,
        contact_found: update.email.is_some(),
        contact_email: update.email,
        contact_name: update.name,
    })
}
