//! Opportunity discovery: search queries → deduplicated candidates → scores.
//!
//! Discovery never writes prospects. Its output is a ranked candidate list
//! that the caller snapshots into an import job for later confirmation.

use std::collections::HashSet;

use linkhunter_providers::{MetricsProvider, SearchOptions, SearchProvider, search_batch};
use linkhunter_scoring::{
    extract_domain, guess_opportunity_type, is_excluded_with, linkability_or_neutral,
    relevance_score,
};
use linkhunter_shared::{DiscoveryConfig, OpportunityType, Project, Result};
use linkhunter_storage::Storage;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use url::Url;

/// Hard ceiling on candidates per run, whatever the caller asks for.
pub const MAX_CANDIDATES: usize = 200;

/// Competitor queries use at most this many keywords.
const COMPETITOR_KEYWORDS: usize = 3;

/// Inputs for one discovery run.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryRequest {
    /// Seed keywords; the project's target keywords are used when empty.
    pub keywords: Vec<String>,
    pub competitor_url: Option<String>,
    pub opportunity_types: Vec<OpportunityType>,
    pub limit: Option<usize>,
    pub exclude_domains: Vec<String>,
    pub min_da: Option<u32>,
    pub max_spam_score: Option<u32>,
}

/// A scored search result that could become a prospect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpportunityCandidate {
    pub url: String,
    pub domain: String,
    pub title: String,
    pub snippet: String,
    pub opportunity_type: OpportunityType,
    pub domain_authority: Option<u32>,
    pub spam_score: Option<u32>,
    pub linkability_score: u8,
    pub relevance_score: u8,
}

/// Build search queries for every keyword × opportunity type, plus
/// competitor queries when a competitor URL is given.
pub fn build_queries(
    keywords: &[String],
    types: &[OpportunityType],
    competitor_url: Option<&str>,
    region: &str,
) -> Vec<String> {
    let mut queries = Vec::new();

    for kw in keywords {
        for ty in types {
            queries.extend(queries_for_type(kw, *ty, region));
        }
    }

    let competitor_host = competitor_url
        .and_then(|raw| Url::parse(raw).ok())
        .and_then(|url| url.host_str().map(str::to_string));

    if let Some(host) = competitor_host {
        let top = &keywords[..keywords.len().min(COMPETITOR_KEYWORDS)];
        if !top.is_empty() {
            let terms = top
                .iter()
                .map(|kw| format!("\"{kw}\""))
                .collect::<Vec<_>>()
                .join(" OR ");
            queries.push(format!("site:{host} {terms}"));
        }
        for kw in top {
            queries.push(format!("\"{host}\" \"{kw}\""));
        }
    }

    queries
}

fn queries_for_type(kw: &str, ty: OpportunityType, region: &str) -> Vec<String> {
    match ty {
        OpportunityType::ResourceLink => vec![
            format!("\"{kw}\" \"useful resources\" {region}"),
            format!("\"{kw}\" \"resources\" OR \"links\" {region}"),
        ],
        OpportunityType::GuestPost => vec![
            format!("\"{kw}\" \"write for us\" OR \"contribute\" {region}"),
            format!("\"{kw}\" \"guest post\" OR \"guest article\" {region}"),
        ],
        OpportunityType::BrokenLink => vec![
            format!("\"{kw}\" resources {region} inurl:resources"),
            format!("\"{kw}\" links {region} inurl:links"),
        ],
        OpportunityType::LinkExchange => vec![
            format!("{kw} directory {region} trade association"),
            format!("{kw} {region} blog inurl:resources"),
        ],
        OpportunityType::Mention => vec![format!("\"{kw}\" {region}")],
    }
}

/// Run discovery for `project`.
///
/// Skips excluded domains and domains that already link to or are tracked
/// by the project. A metrics lookup failure is treated as unknown metrics.
/// The result is sorted by linkability, highest first.
#[instrument(skip_all, fields(project_id = %project.id))]
pub async fn discover_opportunities(
    request: &DiscoveryRequest,
    project: &Project,
    storage: &Storage,
    search: &dyn SearchProvider,
    metrics: &dyn MetricsProvider,
    config: &DiscoveryConfig,
) -> Result<Vec<OpportunityCandidate>> {
    let limit = request
        .limit
        .unwrap_or(config.default_limit)
        .min(MAX_CANDIDATES);
    let keywords: &[String] = if request.keywords.is_empty() {
        &project.target_keywords
    } else {
        &request.keywords
    };
    let max_spam = request.max_spam_score.unwrap_or(config.max_spam_score);
    let min_da = request.min_da.unwrap_or(config.min_da);

    let mut queries = build_queries(
        keywords,
        &request.opportunity_types,
        request.competitor_url.as_deref(),
        &config.region_term,
    );
    queries.truncate(config.max_queries);
    info!(queries = queries.len(), limit, "running discovery");

    let opts = SearchOptions {
        country: Some(config.country.clone()),
        ..SearchOptions::default()
    };
    let results = search_batch(search, &queries, &opts).await;
    info!(results = results.len(), "search returned results");

    let backlinks = storage
        .existing_backlink_domains(&project.id, &project.org_id)
        .await?;
    let prospects = storage
        .prospect_domains(&project.id, &project.org_id)
        .await?;
    let user_excludes: Vec<String> = request
        .exclude_domains
        .iter()
        .map(|d| d.trim().to_lowercase())
        .collect();

    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    for result in results {
        if candidates.len() >= limit {
            break;
        }
        let Some(domain) = extract_domain(&result.url) else {
            continue;
        };
        if !seen.insert(domain.clone()) {
            continue;
        }
        if is_excluded_with(&domain, &user_excludes) {
            continue;
        }
        if backlinks.contains(&domain) || prospects.contains(&domain) {
            continue;
        }

        let domain_metrics = match metrics.domain_metrics(&domain).await {
            Ok(m) => m,
            Err(e) => {
                warn!(domain = %domain, error = %e, "metrics lookup failed, scoring as unknown");
                None
            }
        };

        let da = domain_metrics.map(|m| m.domain_rating).unwrap_or(0);
        let spam = domain_metrics.map(|m| m.spam_score).unwrap_or(0);
        if spam > max_spam || da < min_da {
            continue;
        }

        let opportunity_type = guess_opportunity_type(
            &result.title,
            &result.snippet,
            &result.url,
            &request.opportunity_types,
        );

        candidates.push(OpportunityCandidate {
            linkability_score: linkability_or_neutral(domain_metrics.as_ref()),
            relevance_score: relevance_score(&result.title, &result.snippet, keywords),
            domain_authority: domain_metrics.map(|m| m.domain_rating),
            spam_score: domain_metrics.map(|m| m.spam_score),
            opportunity_type,
            url: result.url,
            domain,
            title: result.title,
            snippet: result.snippet,
        });
    }

    candidates.sort_by(|a, b| b.linkability_score.cmp(&a.linkability_score));

    info!(total = candidates.len(), "discovery complete");
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeMetrics, FakeSearch, seeded_storage};
    use linkhunter_shared::{DomainMetrics, EntryMethod, NewProspect};
    use linkhunter_storage::NewExistingBacklink;

    fn kw(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn queries_cover_each_keyword_and_type() {
        let queries = build_queries(
            &kw(&["plumbing", "boilers"]),
            &[OpportunityType::ResourceLink, OpportunityType::GuestPost],
            None,
            "UK",
        );
        assert_eq!(queries.len(), 8);
        assert_eq!(queries[0], "\"plumbing\" \"useful resources\" UK");
        assert!(queries.contains(&"\"boilers\" \"guest post\" OR \"guest article\" UK".to_string()));
    }

    #[test]
    fn competitor_queries_use_top_three_keywords() {
        let queries = build_queries(
            &kw(&["a", "b", "c", "d"]),
            &[],
            Some("https://www.rival.co.uk/blog"),
            "UK",
        );
        assert_eq!(
            queries,
            vec![
                "site:www.rival.co.uk \"a\" OR \"b\" OR \"c\"".to_string(),
                "\"www.rival.co.uk\" \"a\"".to_string(),
                "\"www.rival.co.uk\" \"b\"".to_string(),
                "\"www.rival.co.uk\" \"c\"".to_string(),
            ]
        );
    }

    #[test]
    fn invalid_competitor_url_is_ignored() {
        let queries = build_queries(&kw(&["a"]), &[OpportunityType::Mention], Some("not a url"), "UK");
        assert_eq!(queries, vec!["\"a\" UK".to_string()]);
    }

    #[tokio::test]
    async fn ranks_by_linkability_and_skips_known_domains() {
        let (storage, _org, project) = seeded_storage().await;
        storage
            .upsert_existing_backlinks(
                &project.id,
                &project.org_id,
                &[NewExistingBacklink {
                    linking_domain: "linked.co.uk".into(),
                    linking_url: "https://linked.co.uk/partners".into(),
                    dr: 30,
                    first_seen: None,
                }],
            )
            .await
            .unwrap();
        storage
            .insert_prospects(
                &project.id,
                &project.org_id,
                &[NewProspect::bare("https://tracked.co.uk", "tracked.co.uk", EntryMethod::Manual)],
            )
            .await
            .unwrap();

        let search = FakeSearch::with_urls(&[
            "https://weak.co.uk/resources",
            "https://www.pinterest.com/pin/1",
            "https://linked.co.uk/blog",
            "https://tracked.co.uk/links",
            "https://strong.co.uk/useful-links",
            "https://spammy.co.uk/links",
            "https://unknown.co.uk/links",
        ]);
        let metrics = FakeMetrics::default()
            .with("weak.co.uk", DomainMetrics { domain_rating: 5, spam_score: 0, referring_domains: 2, monthly_traffic: 0 })
            .with("strong.co.uk", DomainMetrics { domain_rating: 60, spam_score: 0, referring_domains: 150, monthly_traffic: 0 })
            .with("spammy.co.uk", DomainMetrics { domain_rating: 40, spam_score: 45, referring_domains: 50, monthly_traffic: 0 });

        let request = DiscoveryRequest {
            opportunity_types: vec![OpportunityType::ResourceLink],
            ..DiscoveryRequest::default()
        };
        let candidates = discover_opportunities(
            &request,
            &project,
            &storage,
            &search,
            &metrics,
            &DiscoveryConfig::default(),
        )
        .await
        .unwrap();

        let domains: Vec<&str> = candidates.iter().map(|c| c.domain.as_str()).collect();
        assert_eq!(domains, vec!["strong.co.uk", "weak.co.uk", "unknown.co.uk"]);
        assert_eq!(candidates[0].linkability_score, 95);
        assert_eq!(candidates[1].linkability_score, 60);
        assert_eq!(candidates[2].linkability_score, 50);
        assert_eq!(candidates[2].domain_authority, None);
        assert!(candidates.iter().all(|c| (5..=95).contains(&c.linkability_score)));
        assert!(candidates.iter().all(|c| (10..=95).contains(&c.relevance_score)));
    }

    #[tokio::test]
    async fn limit_caps_candidates_and_queries() {
        let (storage, _org, project) = seeded_storage().await;
        let urls: Vec<String> = (0..30).map(|i| format!("https://site{i}.co.uk/links")).collect();
        let refs: Vec<&str> = urls.iter().map(String::as_str).collect();
        let search = FakeSearch::with_urls(&refs);

        let request = DiscoveryRequest {
            keywords: (0..30).map(|i| format!("kw{i}")).collect(),
            opportunity_types: vec![OpportunityType::GuestPost],
            limit: Some(7),
            ..DiscoveryRequest::default()
        };
        let candidates = discover_opportunities(
            &request,
            &project,
            &storage,
            &search,
            &FakeMetrics::default(),
            &DiscoveryConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(candidates.len(), 7);
        assert_eq!(search.queries().len(), 20);
    }

    #[tokio::test]
    async fn metrics_failure_scores_as_unknown() {
        let (storage, _org, project) = seeded_storage().await;
        let search = FakeSearch::with_urls(&["https://flaky.co.uk/resources"]);
        let metrics = FakeMetrics::failing();
        let request = DiscoveryRequest {
            opportunity_types: vec![OpportunityType::ResourceLink],
            ..DiscoveryRequest::default()
        };

        let candidates = discover_opportunities(
            &request,
            &project,
            &storage,
            &search,
            &metrics,
            &DiscoveryConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].linkability_score, 50);
        assert_eq!(candidates[0].spam_score, None);
    }
}
