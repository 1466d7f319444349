//! Bulk-import validation: bucket submitted URLs into pass / review / fail.

use std::collections::HashSet;

use linkhunter_providers::MetricsProvider;
use linkhunter_scoring::{extract_domain, is_excluded_domain};
use linkhunter_shared::{ImportValidationConfig, Result};
use linkhunter_storage::Storage;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationBucket {
    Pass,
    Review,
    Fail,
}

/// Verdict for one submitted URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub url: String,
    pub domain: String,
    pub bucket: ValidationBucket,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub domain_authority: Option<u32>,
    #[serde(default)]
    pub spam_score: Option<u32>,
    #[serde(default)]
    pub is_existing_backlink: bool,
    #[serde(default)]
    pub is_existing_prospect: bool,
}

impl ValidationResult {
    fn fail(url: &str, domain: &str, reason: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            domain: domain.to_string(),
            bucket: ValidationBucket::Fail,
            reason: Some(reason.into()),
            domain_authority: None,
            spam_score: None,
            is_existing_backlink: false,
            is_existing_prospect: false,
        }
    }

    /// Whether the URL may be committed by a confirmation.
    pub fn is_importable(&self) -> bool {
        self.bucket != ValidationBucket::Fail
    }
}

/// Bucket counts over a validation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ValidationSummary {
    pub total: u32,
    pub passed: u32,
    pub review: u32,
    pub failed: u32,
}

impl ValidationSummary {
    pub fn of(results: &[ValidationResult]) -> Self {
        let count = |bucket| results.iter().filter(|r| r.bucket == bucket).count() as u32;
        Self {
            total: results.len() as u32,
            passed: count(ValidationBucket::Pass),
            review: count(ValidationBucket::Review),
            failed: count(ValidationBucket::Fail),
        }
    }
}

/// Validate `urls` for import into a project.
///
/// Checks run in order: URL shape, exclusion list, duplicates within the
/// batch, existing backlinks, existing prospects, spam ceiling, DA floor.
/// The first failing check decides the bucket. Metrics failures count as
/// unknown metrics. Nothing is written.
#[instrument(skip_all, fields(project_id = %project_id, urls = urls.len()))]
pub async fn validate_import_urls(
    urls: &[String],
    project_id: &str,
    org_id: &str,
    storage: &Storage,
    metrics: &dyn MetricsProvider,
    thresholds: &ImportValidationConfig,
) -> Result<Vec<ValidationResult>> {
    let backlinks = storage.existing_backlink_domains(project_id, org_id).await?;
    let prospects = storage.prospect_domains(project_id, org_id).await?;
    let mut seen = HashSet::new();
    let mut results = Vec::with_capacity(urls.len());

    for url in urls {
        let url = url.trim();
        let Some(domain) = extract_domain(url) else {
            results.push(ValidationResult::fail(url, "", "Invalid URL"));
            continue;
        };

        if is_excluded_domain(&domain) {
            results.push(ValidationResult::fail(url, &domain, "Excluded domain"));
            continue;
        }

        if !seen.insert(domain.clone()) {
            results.push(ValidationResult::fail(url, &domain, "Duplicate domain in this import"));
            continue;
        }

        if backlinks.contains(&domain) {
            results.push(ValidationResult {
                is_existing_backlink: true,
                ..ValidationResult::fail(url, &domain, "Already an existing backlink")
            });
            continue;
        }

        if prospects.contains(&domain) {
            results.push(ValidationResult {
                is_existing_prospect: true,
                ..ValidationResult::fail(url, &domain, "Already a prospect")
            });
            continue;
        }

        let domain_metrics = match metrics.domain_metrics(&domain).await {
            Ok(m) => m,
            Err(e) => {
                warn!(domain = %domain, error = %e, "metrics lookup failed during validation");
                None
            }
        };
        let da = domain_metrics.map(|m| m.domain_rating).unwrap_or(0);
        let spam = domain_metrics.map(|m| m.spam_score).unwrap_or(0);

        if spam > thresholds.max_spam_score {
            results.push(ValidationResult {
                domain_authority: Some(da),
                spam_score: Some(spam),
                ..ValidationResult::fail(
                    url,
                    &domain,
                    format!(
                        "Spam score {spam} exceeds threshold {}",
                        thresholds.max_spam_score
                    ),
                )
            });
            continue;
        }

        let (bucket, reason) = if da < thresholds.min_da {
            (
                ValidationBucket::Review,
                Some(format!("DA {da} below threshold {}", thresholds.min_da)),
            )
        } else {
            (ValidationBucket::Pass, None)
        };

        results.push(ValidationResult {
            url: url.to_string(),
            domain,
            bucket,
            reason,
            domain_authority: Some(da),
            spam_score: Some(spam),
            is_existing_backlink: false,
            is_existing_prospect: false,
        });
    }

    let summary = ValidationSummary::of(&results);
    info!(
        total = summary.total,
        passed = summary.passed,
        review = summary.review,
        failed = summary.failed,
        "validation complete"
    );
    Ok(results)
}
