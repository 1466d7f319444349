//! Prospect scoring for LinkHunter.
//!
//! Pure functions only: no I/O, no clock. Discovery and import validation
//! call into this crate for every candidate domain.

mod domain;
mod exclusion;

use linkhunter_shared::{DomainMetrics, OpportunityType};

pub use domain::{extract_domain, normalize_host};
pub use exclusion::{EXCLUDED_DOMAINS, is_excluded_domain, is_excluded_with};

/// Lower and upper bound of a linkability score.
pub const LINKABILITY_RANGE: (u8, u8) = (5, 95);

/// Lower and upper bound of a relevance score.
pub const RELEVANCE_RANGE: (u8, u8) = (10, 95);

/// Score reported when no seed keywords were supplied.
pub const NEUTRAL_RELEVANCE: u8 = 50;

/// Score reported when domain metrics are unknown.
pub const UNKNOWN_LINKABILITY: u8 = 50;

/// Heuristic 5–95 rating of how valuable and attainable a link from a
/// domain is.
///
/// Additive: base 50, a domain-rating tier bonus, a spam penalty, and a
/// referring-domains bonus, clamped to [`LINKABILITY_RANGE`].
pub fn linkability_score(metrics: &DomainMetrics) -> u8 {
    let mut score: i32 = 50;

    score += match metrics.domain_rating {
        dr if dr >= 50 => 30,
        dr if dr >= 30 => 20,
        dr if dr >= 15 => 10,
        _ => 5,
    };

    score -= match metrics.spam_score {
        s if s > 20 => 30,
        s if s > 10 => 15,
        s if s > 5 => 5,
        _ => 0,
    };

    score += match metrics.referring_domains {
        rd if rd >= 100 => 20,
        rd if rd >= 30 => 15,
        rd if rd >= 10 => 10,
        _ => 5,
    };

    let (lo, hi) = LINKABILITY_RANGE;
    score.clamp(i32::from(lo), i32::from(hi)) as u8
}

/// Linkability for an optional metrics lookup; unknown metrics score neutral.
pub fn linkability_or_neutral(metrics: Option<&DomainMetrics>) -> u8 {
    metrics.map_or(UNKNOWN_LINKABILITY, linkability_score)
}

/// Heuristic 10–95 rating of keyword overlap between a page and the seed
/// keywords.
///
/// Each keyword counts when it appears as a case-insensitive substring of
/// `title + " " + snippet`. Score is `ratio * 80 + 20`, rounded.
pub fn relevance_score(title: &str, snippet: &str, keywords: &[String]) -> u8 {
    let keywords: Vec<String> = keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();
    if keywords.is_empty() {
        return NEUTRAL_RELEVANCE;
    }

    let text = format!("{title} {snippet}").to_lowercase();
    let matches = keywords.iter().filter(|k| text.contains(k.as_str())).count();
    let ratio = matches as f64 / keywords.len() as f64;
    let score = (ratio * 80.0 + 20.0).round() as i32;

    let (lo, hi) = RELEVANCE_RANGE;
    score.clamp(i32::from(lo), i32::from(hi)) as u8
}

/// Guess how a page could link to the target from its wording.
///
/// Falls back to the first requested type, then to a resource link.
pub fn guess_opportunity_type(
    title: &str,
    snippet: &str,
    url: &str,
    requested: &[OpportunityType],
) -> OpportunityType {
    let text = format!("{title} {snippet} {url}").to_lowercase();
    let has = |phrases: &[&str]| phrases.iter().any(|p| text.contains(p));

    if has(&["write for us", "guest post", "contribute"]) {
        OpportunityType::GuestPost
    } else if has(&["resource", "useful links"]) {
        OpportunityType::ResourceLink
    } else if has(&["directory", "listing"]) {
        OpportunityType::LinkExchange
    } else if has(&["broken", "404"]) {
        OpportunityType::BrokenLink
    } else {
        requested
            .first()
            .copied()
            .unwrap_or(OpportunityType::ResourceLink)
    }
}
