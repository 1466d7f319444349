use crate::domain::normalize_host;

/// Domains that never make useful outreach targets: aggregators, social
/// networks, marketplaces and review sites.
pub const EXCLUDED_DOMAINS: &[&str] = &[
    "checkatrade.com",
    "bark.com",
    "yell.com",
    "amazon.co.uk",
    "amazon.com",
    "pinterest.com",
    "pinterest.co.uk",
    "facebook.com",
    "twitter.com",
    "x.com",
    "instagram.com",
    "linkedin.com",
    "youtube.com",
    "tiktok.com",
    "reddit.com",
    "tumblr.com",
    "medium.com",
    "quora.com",
    "wikipedia.org",
    "ebay.co.uk",
    "ebay.com",
    "gumtree.com",
    "trustpilot.com",
    "yelp.com",
    "tripadvisor.com",
    "glassdoor.com",
];

/// Whether `domain` is, or is a subdomain of, a built-in excluded domain.
pub fn is_excluded_domain(domain: &str) -> bool {
    let domain = normalize_host(domain);
    EXCLUDED_DOMAINS
        .iter()
        .any(|excluded| matches_domain(&domain, excluded))
}

/// Built-in exclusions plus caller-supplied ones (same suffix rule).
pub fn is_excluded_with(domain: &str, extra: &[String]) -> bool {
    if is_excluded_domain(domain) {
        return true;
    }
    let domain = normalize_host(domain);
    extra
        .iter()
        .map(|e| normalize_host(e))
        .filter(|e| !e.is_empty())
        .any(|excluded| matches_domain(&domain, &excluded))
}

fn matches_domain(domain: &str, excluded: &str) -> bool {
    domain == excluded
        || domain
            .strip_suffix(excluded)
            .is_some_and(|prefix| prefix.ends_with('.'))
}
