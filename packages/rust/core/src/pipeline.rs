//! Pipeline aggregation: stage counts, reply/win rates, attention buckets.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use linkhunter_shared::{Prospect, ProspectStatus, Result};
use linkhunter_storage::Storage;
use serde::Serialize;

/// Prospects untouched for longer than this are stale.
pub const STALE_AFTER_DAYS: i64 = 14;

/// Contacted prospects become due for a follow-up after this.
pub const FOLLOWUP_AFTER_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineSummary {
    pub project_id: String,
    pub total_prospects: usize,
    pub stages: BTreeMap<ProspectStatus, usize>,
    /// Percentage of contacted-or-later prospects with a replied email.
    pub reply_rate: u32,
    /// Percentage of contacted-or-later prospects that were won.
    pub win_rate: u32,
}

/// Aggregate a project's pipeline.
pub async fn pipeline_summary(
    project_id: &str,
    org_id: &str,
    storage: &Storage,
) -> Result<PipelineSummary> {
    let prospects = storage.list_prospects(project_id, org_id, None).await?;

    let mut stages = BTreeMap::new();
    let mut contacted = 0;
    let mut won = 0;
    let mut replied = 0;

    for prospect in &prospects {
        *stages.entry(prospect.status).or_insert(0) += 1;
        if prospect.status.is_contacted_or_later() {
            contacted += 1;
        }
        if prospect.status == ProspectStatus::Won {
            won += 1;
        }
        if matches!(
            prospect.status,
            ProspectStatus::Contacted | ProspectStatus::FollowedUp | ProspectStatus::Won
        ) {
            let emails = storage.list_prospect_emails(&prospect.id, org_id).await?;
            if emails.iter().any(|e| e.replied_at.is_some()) {
                replied += 1;
            }
        }
    }

    Ok(PipelineSummary {
        project_id: project_id.to_string(),
        total_prospects: prospects.len(),
        stages,
        reply_rate: percentage(replied, contacted),
        win_rate: percentage(won, contacted),
    })
}

fn percentage(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    (part as f64 / whole as f64 * 100.0).round() as u32
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoContactItem {
    pub id: String,
    pub domain: String,
    pub status: ProspectStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaleItem {
    pub id: String,
    pub domain: String,
    pub status: ProspectStatus,
    pub days_since_update: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FollowupItem {
    pub id: String,
    pub domain: String,
    pub days_since_contact: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeadLinkItem {
    pub id: String,
    pub domain: String,
    pub link_url: Option<String>,
    pub lost_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AttentionCounts {
    pub no_contact: usize,
    pub stale: usize,
    pub followups_due: usize,
    pub dead_links: usize,
}

/// Prospects that need a human, in four independent buckets. A prospect
/// can appear in more than one.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AttentionReport {
    pub no_contact: Vec<NoContactItem>,
    pub stale: Vec<StaleItem>,
    pub followups_due: Vec<FollowupItem>,
    pub dead_links: Vec<DeadLinkItem>,
    pub summary: AttentionCounts,
}

/// Classify `prospects` as of `now`.
pub fn classify_attention(prospects: &[Prospect], now: DateTime<Utc>) -> AttentionReport {
    let mut report = AttentionReport::default();
    let stale_after = Duration::days(STALE_AFTER_DAYS);
    let followup_after = Duration::days(FOLLOWUP_AFTER_DAYS);

    for p in prospects {
        let no_contact = p.status == ProspectStatus::NeedsManualEnrichment
            || (p.status == ProspectStatus::Identified && p.contact_email.is_none());
        if no_contact {
            report.no_contact.push(NoContactItem {
                id: p.id.clone(),
                domain: p.prospect_domain.clone(),
                status: p.status,
            });
        }

        let since_update = now - p.updated_at;
        if !p.status.is_terminal() && since_update > stale_after {
            report.stale.push(StaleItem {
                id: p.id.clone(),
                domain: p.prospect_domain.clone(),
                status: p.status,
                days_since_update: since_update.num_days(),
            });
        }

        if p.status == ProspectStatus::Contacted {
            if let Some(last) = p.last_contacted_at {
                let since_contact = now - last;
                if since_contact > followup_after {
                    report.followups_due.push(FollowupItem {
                        id: p.id.clone(),
                        domain: p.prospect_domain.clone(),
                        days_since_contact: since_contact.num_days(),
                    });
                }
            }
        }

        if p.status == ProspectStatus::Won && !p.link_live {
            report.dead_links.push(DeadLinkItem {
                id: p.id.clone(),
                domain: p.prospect_domain.clone(),
                link_url: p.link_url.clone(),
                lost_at: p.link_lost_at,
            });
        }
    }

    report.summary = AttentionCounts {
        no_contact: report.no_contact.len(),
        stale: report.stale.len(),
        followups_due: report.followups_due.len(),
        dead_links: report.dead_links.len(),
    };
    report
}
