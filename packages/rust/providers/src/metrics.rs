//! Domain metrics and backlink lookups (DataForSEO).

use std::time::Duration;

use async_trait::async_trait;
use linkhunter_scoring::extract_domain;
use linkhunter_shared::{DataForSeoConfig, DomainMetrics, LinkHunterError, Result, resolve_secret};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use crate::http::build_client;

const DEFAULT_BASE_URL: &str = "https://api.dataforseo.com/v3";

/// Retries after the first attempt on rate limits and transport errors.
const MAX_RETRIES: u32 = 3;

const BACKOFF_BASE: Duration = Duration::from_millis(1000);
const BACKOFF_CAP: Duration = Duration::from_secs(8);

/// A page that links to the looked-up domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacklinkEntry {
    pub linking_domain: String,
    pub linking_url: String,
    pub dr: u32,
    pub first_seen: Option<String>,
}

#[async_trait]
pub trait MetricsProvider: Send + Sync {
    /// Domain rating, spam score, referring domains and traffic.
    /// `None` when unconfigured or the provider has no data.
    async fn domain_metrics(&self, domain: &str) -> Result<Option<DomainMetrics>>;

    /// Pages linking to `domain`, strongest first.
    async fn backlinks(&self, domain: &str, limit: u32) -> Result<Vec<BacklinkEntry>>;
}

/// DataForSEO backlinks API client.
#[derive(Debug, Clone)]
pub struct DataForSeoClient {
    client: Client,
    credentials: Option<(String, String)>,
    base_url: String,
    backoff_base: Duration,
}

impl DataForSeoClient {
    pub fn from_config(config: &DataForSeoConfig) -> Result<Self> {
        let credentials =
            resolve_secret(&config.login_env).zip(resolve_secret(&config.password_env));
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            credentials,
            base_url: DEFAULT_BASE_URL.to_string(),
            backoff_base: BACKOFF_BASE,
        })
    }

    pub fn new(
        login: impl Into<String>,
        password: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            client: build_client(15)?,
            credentials: Some((login.into(), password.into())),
            base_url: base_url.into(),
            backoff_base: BACKOFF_BASE,
        })
    }

    /// Override the first retry delay.
    pub fn with_backoff(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }

    /// POST with retries; returns the first task's first result object.
    async fn post_task(&self, path: &str, body: Value) -> Result<Option<Value>> {
        let Some((login, password)) = &self.credentials else {
            return Ok(None);
        };
        let url = format!("{}{path}", self.base_url);
        let mut last_error = LinkHunterError::Provider("DataForSEO request not attempted".into());

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let delay = (self.backoff_base * 2u32.pow(attempt)).min(BACKOFF_CAP);
                debug!(attempt, ?delay, "retrying DataForSEO request");
                tokio::time::sleep(delay).await;
            }

            let response = match self
                .client
                .post(&url)
                .basic_auth(login, Some(password))
                .json(&body)
                .send()
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    last_error = LinkHunterError::Provider(format!("DataForSEO request failed: {e}"));
                    continue;
                }
            };

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                last_error = LinkHunterError::Provider("DataForSEO rate limit exceeded".into());
                continue;
            }
            if !status.is_success() {
                return Err(LinkHunterError::Provider(format!(
                    "DataForSEO API error: HTTP {}",
                    status.as_u16()
                )));
            }

            let payload: Value = response
                .json()
                .await
                .map_err(|e| LinkHunterError::parse(format!("DataForSEO response: {e}")))?;
            return Ok(payload.pointer("/tasks/0/result/0").cloned());
        }

        Err(last_error)
    }
}

fn number(value: &Value, key: &str) -> u64 {
    value
        .get(key)
        .and_then(Value::as_f64)
        .map(|n| n.max(0.0).round() as u64)
        .unwrap_or(0)
}

#[derive(Deserialize)]
struct RawBacklink {
    url_from: Option<String>,
    rank: Option<f64>,
    first_seen: Option<String>,
}

#[async_trait]
impl MetricsProvider for DataForSeoClient {
    #[instrument(skip(self))]
    async fn domain_metrics(&self, domain: &str) -> Result<Option<DomainMetrics>> {
        if !self.is_configured() {
            debug!("DataForSEO not configured, returning no metrics");
            return Ok(None);
        }
        let summary = self
            .post_task("/backlinks/summary/live", json!([{ "target": domain }]))
            .await?;

        Ok(summary.map(|s| DomainMetrics {
            domain_rating: number(&s, "rank") as u32,
            spam_score: number(&s, "spam_score") as u32,
            referring_domains: number(&s, "referring_domains") as u32,
            monthly_traffic: number(&s, "organic_traffic"),
        }))
    }

    #[instrument(skip(self))]
    async fn backlinks(&self, domain: &str, limit: u32) -> Result<Vec<BacklinkEntry>> {
        if !self.is_configured() {
            debug!("DataForSEO not configured, returning no backlinks");
            return Ok(Vec::new());
        }
        let result = self
            .post_task(
                "/backlinks/backlinks/live",
                json!([{
                    "target": domain,
                    "limit": limit,
                    "mode": "as_is",
                    "order_by": ["rank,desc"],
                }]),
            )
            .await?;

        let items = result
            .and_then(|r| r.get("items").cloned())
            .unwrap_or(Value::Null);
        let raw: Vec<RawBacklink> = match items {
            Value::Array(_) => serde_json::from_value(items)
                .map_err(|e| LinkHunterError::parse(format!("DataForSEO backlinks: {e}")))?,
            _ => Vec::new(),
        };

        let entries: Vec<BacklinkEntry> = raw
            .into_iter()
            .filter_map(|b| {
                let linking_url = b.url_from?;
                let Some(linking_domain) = extract_domain(&linking_url) else {
                    warn!(url = %linking_url, "skipping backlink with unparsable URL");
                    return None;
                };
                Some(BacklinkEntry {
                    linking_domain,
                    linking_url,
                    dr: b.rank.map(|r| r.max(0.0).round() as u32).unwrap_or(0),
                    first_seen: b.first_seen,
                })
            })
            .collect();
        debug!(count = entries.len(), "fetched backlinks");
        Ok(entries)
    }
}
