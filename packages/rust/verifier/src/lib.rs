//! Backlink liveness verification.
//!
//! Fetches the most specific known page for a prospect and scans its HTML
//! for an outbound link to the project's site. The verdict is returned as a
//! [`LinkVerification`] which callers write back onto the prospect.

mod guard;

use std::time::Duration;

use chrono::{DateTime, Utc};
use linkhunter_scoring::{extract_domain, normalize_host};
use linkhunter_shared::{LinkHunterError, Prospect, Result};
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, instrument, warn};
use url::Url;

use guard::redirect_policy;
pub use guard::{is_blocked_target, is_private_ip};

/// Default timeout in seconds for fetching a prospect page.
const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 5;

/// User-Agent string for verification requests.
const USER_AGENT: &str = concat!(
    "Mozilla/5.0 (compatible; LinkHunterBot/",
    env!("CARGO_PKG_VERSION"),
    ")"
);

// ---------------------------------------------------------------------------
// Options and results
// ---------------------------------------------------------------------------

/// Configuration for the verifier.
#[derive(Debug, Clone)]
pub struct VerifierOptions {
    /// Timeout for the page fetch in seconds.
    pub timeout_secs: u64,
    /// Allow localhost/private addresses (local testing only).
    pub allow_private_hosts: bool,
}

impl Default for VerifierOptions {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            allow_private_hosts: false,
        }
    }
}

impl From<&linkhunter_shared::VerificationConfig> for VerifierOptions {
    fn from(config: &linkhunter_shared::VerificationConfig) -> Self {
        Self {
            timeout_secs: config.timeout_secs,
            allow_private_hosts: config.allow_private_hosts,
        }
    }
}

/// Outcome of one verification, ready to be written onto the prospect.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkVerification {
    /// URL that was fetched.
    pub checked_url: String,
    pub link_live: bool,
    /// Recorded live-link URL after this check.
    pub link_url: Option<String>,
    pub verified_at: DateTime<Utc>,
    /// Set when the link was live before and is gone now; preserved otherwise.
    pub link_lost_at: Option<DateTime<Utc>>,
    /// Fetch failure annotation (`HTTP 404`, network error, blocked URL).
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Verifier
// ---------------------------------------------------------------------------

/// Checks whether prospects still link to a target site.
#[derive(Debug, Clone)]
pub struct LinkVerifier {
    client: Client,
    allow_private_hosts: bool,
}

impl LinkVerifier {
    /// Build a verifier with its own HTTP client.
    pub fn new(opts: &VerifierOptions) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(redirect_policy(MAX_REDIRECTS, opts.allow_private_hosts))
            .timeout(Duration::from_secs(opts.timeout_secs))
            .build()
            .map_err(|e| LinkHunterError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            allow_private_hosts: opts.allow_private_hosts,
        })
    }

    /// Verify that `prospect` links to `target_url`.
    ///
    /// Never fails: fetch problems produce a not-live verdict with an
    /// `error` annotation.
    #[instrument(skip_all, fields(prospect_id = %prospect.id, domain = %prospect.prospect_domain))]
    pub async fn verify(&self, prospect: &Prospect, target_url: &str) -> LinkVerification {
        let checked_url = prospect
            .link_url
            .as_deref()
            .or(prospect.page_url.as_deref())
            .unwrap_or(&prospect.prospect_url)
            .to_string();
        let verified_at = Utc::now();
        let lost_at = if prospect.link_live {
            Some(verified_at)
        } else {
            prospect.link_lost_at
        };

        let not_live = |error: Option<String>| LinkVerification {
            checked_url: checked_url.clone(),
            link_live: false,
            link_url: prospect.link_url.clone(),
            verified_at,
            link_lost_at: lost_at,
            error,
        };

        let html = match self.fetch(&checked_url).await {
            Ok(page) => page,
            Err(message) => {
                warn!(url = %checked_url, error = %message, "link check fetch failed");
                return not_live(Some(message));
            }
        };

        if page_links_to(&html.body, &html.final_url, target_url) {
            debug!(url = %checked_url, "link found");
            LinkVerification {
                link_live: true,
                link_url: Some(
                    prospect
                        .link_url
                        .clone()
                        .unwrap_or_else(|| checked_url.clone()),
                ),
                checked_url,
                verified_at,
                link_lost_at: None,
                error: None,
            }
        } else {
            debug!(url = %checked_url, "link not found");
            not_live(None)
        }
    }

    async fn fetch(&self, raw_url: &str) -> std::result::Result<FetchedHtml, String> {
        let url = Url::parse(raw_url).map_err(|e| format!("invalid URL: {e}"))?;
        if !self.allow_private_hosts && is_blocked_target(&url) {
            return Err("blocked non-public URL".into());
        }

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {}", status.as_u16()));
        }

        let final_url = response.url().clone();
        let body = response
            .text()
            .await
            .map_err(|e| format!("body read failed: {e}"))?;

        Ok(FetchedHtml { final_url, body })
    }
}

struct FetchedHtml {
    final_url: Url,
    body: String,
}

// ---------------------------------------------------------------------------
// HTML scanning
// ---------------------------------------------------------------------------

/// Whether any `href` in `html` points at the target site.
///
/// A link counts when its resolved host (ignoring `www.`) equals the
/// target's domain, or when it is the target URL itself or a path, query or
/// fragment under it (case-insensitive).
pub fn page_links_to(html: &str, base_url: &Url, target_url: &str) -> bool {
    let Some(target_domain) = extract_domain(target_url) else {
        return false;
    };
    let target_lower = target_url.trim().to_lowercase();
    let Ok(selector) = Selector::parse("[href]") else {
        return false;
    };

    let doc = Html::parse_document(html);
    doc.select(&selector)
        .filter_map(|el| el.value().attr("href"))
        .any(|href| {
            let href = href.trim();
            if is_under_target(&href.to_lowercase(), &target_lower) {
                return true;
            }
            base_url
                .join(href)
                .ok()
                .and_then(|resolved| resolved.host_str().map(normalize_host))
                .is_some_and(|host| host == target_domain)
        })
}

fn is_under_target(href: &str, target: &str) -> bool {
    let Some(rest) = href.strip_prefix(target) else {
        return false;
    };
    target.ends_with('/') || rest.is_empty() || rest.starts_with(['/', '?', '#'])
}
