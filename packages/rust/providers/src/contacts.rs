//! Contact lookup (Hunter.io domain search).

use async_trait::async_trait;
use linkhunter_shared::{HunterConfig, LinkHunterError, Result, resolve_secret};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::http::build_client;

const DEFAULT_BASE_URL: &str = "https://api.hunter.io/v2";

/// Emails below this confidence are ignored.
const MIN_CONFIDENCE: u32 = 30;

/// Roles ordered by preference for outreach.
const PREFERRED_ROLES: &[&str] = &[
    "editor",
    "content manager",
    "content",
    "marketing",
    "founder",
    "owner",
    "ceo",
    "managing director",
    "director",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainContact {
    pub name: String,
    pub email: String,
    pub role: String,
    pub confidence: u32,
}

#[async_trait]
pub trait ContactFinder: Send + Sync {
    /// The single best outreach contact for a domain, if any.
    async fn best_contact(&self, domain: &str) -> Result<Option<DomainContact>>;
}

/// Hunter.io API client.
#[derive(Debug, Clone)]
pub struct HunterClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

#[derive(Deserialize)]
struct HunterResponse {
    data: Option<HunterData>,
}

#[derive(Deserialize)]
struct HunterData {
    #[serde(default)]
    emails: Vec<HunterEmail>,
}

#[derive(Deserialize)]
struct HunterEmail {
    value: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    position: Option<String>,
    confidence: Option<u32>,
}

impl HunterClient {
    pub fn from_config(config: &HunterConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            api_key: resolve_secret(&config.api_key_env),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: build_client(10)?,
            api_key: Some(api_key.into()),
            base_url: base_url.into(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// All usable contacts for a domain, best first.
    #[instrument(skip(self))]
    pub async fn domain_contacts(&self, domain: &str) -> Result<Vec<DomainContact>> {
        let Some(api_key) = &self.api_key else {
            debug!("Hunter not configured, returning no contacts");
            return Ok(Vec::new());
        };

        let response = self
            .client
            .get(format!("{}/domain-search", self.base_url))
            .query(&[("domain", domain), ("api_key", api_key.as_str())])
            .send()
            .await
            .map_err(|e| LinkHunterError::Provider(format!("Hunter request failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!("Hunter rate limit exceeded");
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(LinkHunterError::Provider(format!(
                "Hunter API error: HTTP {}",
                status.as_u16()
            )));
        }

        let body: HunterResponse = response
            .json()
            .await
            .map_err(|e| LinkHunterError::parse(format!("Hunter response: {e}")))?;

        let emails = body.data.map(|d| d.emails).unwrap_or_default();
        Ok(rank_contacts(emails))
    }
}

fn rank_contacts(emails: Vec<HunterEmail>) -> Vec<DomainContact> {
    let mut contacts: Vec<DomainContact> = emails
        .into_iter()
        .filter_map(|e| {
            let email = e.value.filter(|v| !v.is_empty())?;
            let confidence = e.confidence.filter(|c| *c >= MIN_CONFIDENCE)?;
            let name = [e.first_name, e.last_name]
                .into_iter()
                .flatten()
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            Some(DomainContact {
                name,
                email,
                role: e.position.unwrap_or_default(),
                confidence,
            })
        })
        .collect();

    contacts.sort_by(|a, b| {
        role_rank(&a.role)
            .cmp(&role_rank(&b.role))
            .then(b.confidence.cmp(&a.confidence))
    });
    contacts
}

fn role_rank(role: &str) -> usize {
    let lower = role.to_lowercase();
    PREFERRED_ROLES
        .iter()
        .position(|preferred| lower.contains(preferred))
        .unwrap_or(PREFERRED_ROLES.len())
}

#[async_trait]
impl ContactFinder for HunterClient {
    async fn best_contact(&self, domain: &str) -> Result<Option<DomainContact>> {
        Ok(self.domain_contacts(domain).await?.into_iter().next())
    }
}
