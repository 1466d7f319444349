//! Web search (Google Custom Search).

use std::collections::HashSet;

use async_trait::async_trait;
use linkhunter_scoring::extract_domain;
use linkhunter_shared::{GoogleSearchConfig, LinkHunterError, Result, resolve_secret};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::http::build_client;

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/customsearch/v1";

/// Google returns at most ten results per query.
const MAX_RESULTS_PER_QUERY: u8 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub url: String,
    pub title: String,
    pub snippet: String,
}

#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Two-letter country code, e.g. `GB`.
    pub country: Option<String>,
    pub num: u8,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            country: None,
            num: MAX_RESULTS_PER_QUERY,
        }
    }
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, opts: &SearchOptions) -> Result<Vec<SearchResult>>;
}

/// Run queries in order and keep the first result per domain.
///
/// A failing query is logged and skipped.
#[instrument(skip_all, fields(queries = queries.len()))]
pub async fn search_batch(
    provider: &dyn SearchProvider,
    queries: &[String],
    opts: &SearchOptions,
) -> Vec<SearchResult> {
    let mut seen = HashSet::new();
    let mut results = Vec::new();

    for query in queries {
        let batch = match provider.search(query, opts).await {
            Ok(batch) => batch,
            Err(e) => {
                warn!(query = %query, error = %e, "search query failed");
                continue;
            }
        };
        for result in batch {
            let Some(domain) = extract_domain(&result.url) else {
                continue;
            };
            if seen.insert(domain) {
                results.push(result);
            }
        }
    }

    debug!(unique = results.len(), "search batch complete");
    results
}

/// Google Custom Search JSON API client.
#[derive(Debug, Clone)]
pub struct GoogleSearchClient {
    client: Client,
    credentials: Option<(String, String)>,
    base_url: String,
}

#[derive(Deserialize)]
struct CseResponse {
    #[serde(default)]
    items: Vec<CseItem>,
}

#[derive(Deserialize)]
struct CseItem {
    link: Option<String>,
    title: Option<String>,
    snippet: Option<String>,
}

impl GoogleSearchClient {
    pub fn from_config(config: &GoogleSearchConfig) -> Result<Self> {
        let credentials = resolve_secret(&config.api_key_env).zip(resolve_secret(&config.cse_id_env));
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            credentials,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    pub fn new(
        api_key: impl Into<String>,
        cse_id: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            client: build_client(10)?,
            credentials: Some((api_key.into(), cse_id.into())),
            base_url: base_url.into(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }
}

#[async_trait]
impl SearchProvider for GoogleSearchClient {
    #[instrument(skip(self, opts))]
    async fn search(&self, query: &str, opts: &SearchOptions) -> Result<Vec<SearchResult>> {
        let Some((key, cx)) = &self.credentials else {
            debug!("Google CSE not configured, returning no results");
            return Ok(Vec::new());
        };

        let num = opts.num.clamp(1, MAX_RESULTS_PER_QUERY).to_string();
        let mut params = vec![
            ("key", key.clone()),
            ("cx", cx.clone()),
            ("q", query.to_string()),
            ("num", num),
        ];
        if let Some(country) = &opts.country {
            params.push(("gl", country.clone()));
            params.push(("cr", format!("country{}", country.to_uppercase())));
        }

        let response = self
            .client
            .get(&self.base_url)
            .query(&params)
            .send()
            .await
            .map_err(|e| LinkHunterError::Provider(format!("Google CSE request failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!("Google CSE daily quota exceeded");
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(LinkHunterError::Provider(format!(
                "Google CSE API error: HTTP {}",
                status.as_u16()
            )));
        }

        let body: CseResponse = response
            .json()
            .await
            .map_err(|e| LinkHunterError::parse(format!("Google CSE response: {e}")))?;

        Ok(body
            .items
            .into_iter()
            .map(|item| SearchResult {
                url: item.link.unwrap_or_default(),
                title: item.title.unwrap_or_default(),
                snippet: item.snippet.unwrap_or_default(),
            })
            .collect())
    }
}
