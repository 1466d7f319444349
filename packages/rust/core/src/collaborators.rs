//! External collaborators the tool handlers depend on.

use std::sync::Arc;

use linkhunter_providers::{
    AnthropicClient, ContactFinder, DataForSeoClient, GoogleSearchClient, HunterClient,
    LanguageModel, LlmOutreachDrafter, LlmSiteAnalyser, MetricsProvider, OutreachDrafter,
    SearchProvider, SiteAnalyser,
};
use linkhunter_shared::{AnthropicConfig, AppConfig, Result};
use linkhunter_verifier::{LinkVerifier, VerifierOptions};
use tracing::{debug, warn};

/// Everything a handler may call out to besides storage.
#[derive(Clone)]
pub struct Collaborators {
    pub metrics: Arc<dyn MetricsProvider>,
    pub search: Arc<dyn SearchProvider>,
    pub contacts: Arc<dyn ContactFinder>,
    pub drafter: Arc<dyn OutreachDrafter>,
    pub site_analyser: Arc<dyn SiteAnalyser>,
    pub verifier: LinkVerifier,
}

impl Collaborators {
    /// Build the HTTP-backed collaborators from config.
    ///
    /// `model` powers drafting and site analysis; without it both fall back
    /// to templates and placeholders.
    pub fn from_config(config: &AppConfig, model: Option<Arc<dyn LanguageModel>>) -> Result<Self> {
        let dataforseo = DataForSeoClient::from_config(&config.dataforseo)?;
        if !dataforseo.is_configured() {
            warn!("DataForSEO credentials not set, domain metrics will be unavailable");
        }
        let google = GoogleSearchClient::from_config(&config.google_search)?;
        if !google.is_configured() {
            warn!("Google CSE credentials not set, discovery will find nothing");
        }
        let hunter = HunterClient::from_config(&config.hunter)?;
        if !hunter.is_configured() {
            warn!("Hunter API key not set, contact enrichment will find nothing");
        }

        let metrics: Arc<dyn MetricsProvider> = Arc::new(dataforseo);
        let site_analyser = LlmSiteAnalyser::new(
            model.clone(),
            metrics.clone(),
            config.dataforseo.timeout_secs,
        )?;

        Ok(Self {
            metrics,
            search: Arc::new(google),
            contacts: Arc::new(hunter),
            drafter: Arc::new(LlmOutreachDrafter::new(model)),
            site_analyser: Arc::new(site_analyser),
            verifier: LinkVerifier::new(&VerifierOptions::from(&config.verification))?,
        })
    }
}

/// The configured language model, or `None` when no API key is set.
pub fn model_from_config(config: &AnthropicConfig) -> Result<Option<Arc<dyn LanguageModel>>> {
    let client = AnthropicClient::from_config(config)?;
    if !client.is_configured() {
        debug!(env = %config.api_key_env, "no Anthropic API key configured");
        return Ok(None);
    }
    debug!(model = client.model(), "language model configured");
    Ok(Some(Arc::new(client)))
}
