//! Target-site analysis: homepage text plus domain metrics, classified by a
//! language model.

use std::sync::Arc;

use async_trait::async_trait;
use linkhunter_scoring::extract_domain;
use linkhunter_shared::{LinkHunterError, Result};
use reqwest::Client;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::http::build_client;
use crate::llm::{LanguageModel, extract_json_object};
use crate::metrics::MetricsProvider;

/// Page text sent to the model is capped at this many characters.
const MAX_TEXT_CHARS: usize = 30_000;

/// Paragraphs this short are navigation noise.
const MIN_PARAGRAPH_CHARS: usize = 20;

const ANALYSIS_MAX_TOKENS: u32 = 1024;

const SYSTEM_PROMPT: &str = "You are an SEO analyst. Analyse the provided website content and \
extract structured information. Respond ONLY with valid JSON matching this schema:
{
  \"niche\": \"string, the site's primary industry/niche\",
  \"description\": \"string, 1-2 sentence description of what the site does\",
  \"target_keywords\": [\"string array, 5-10 target keywords for backlink outreach\"],
  \"target_audience\": \"string, who the site serves\",
  \"content_themes\": [\"string array, 3-5 main content themes\"]
}";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteAnalysis {
    pub niche: String,
    pub description: String,
    #[serde(default)]
    pub target_keywords: Vec<String>,
    pub target_audience: String,
    #[serde(default)]
    pub domain_rating: Option<u32>,
    #[serde(default)]
    pub content_themes: Vec<String>,
}

impl SiteAnalysis {
    fn placeholder(description: impl Into<String>) -> Self {
        Self {
            niche: "Unknown".into(),
            description: description.into(),
            target_keywords: Vec::new(),
            target_audience: "Unknown".into(),
            domain_rating: None,
            content_themes: Vec::new(),
        }
    }
}

#[async_trait]
pub trait SiteAnalyser: Send + Sync {
    async fn analyse(&self, url: &str) -> Result<SiteAnalysis>;
}

/// Site analyser backed by an HTTP fetch, a metrics provider, and a model.
#[derive(Clone)]
pub struct LlmSiteAnalyser {
    client: Client,
    model: Option<Arc<dyn LanguageModel>>,
    metrics: Arc<dyn MetricsProvider>,
}

impl LlmSiteAnalyser {
    pub fn new(
        model: Option<Arc<dyn LanguageModel>>,
        metrics: Arc<dyn MetricsProvider>,
        timeout_secs: u64,
    ) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            model,
            metrics,
        })
    }

    /// Fetch the page and reduce it to text; failures yield an empty string.
    async fn fetch_text(&self, url: &str) -> String {
        let response = match self
            .client
            .get(url)
            .header("Accept", "text/html")
            .send()
            .await
        {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                warn!(status = r.status().as_u16(), "site fetch returned error status");
                return String::new();
            }
            Err(e) => {
                warn!(error = %e, "site fetch failed");
                return String::new();
            }
        };
        match response.text().await {
            Ok(html) => strip_to_text(&html),
            Err(e) => {
                warn!(error = %e, "site body read failed");
                String::new()
            }
        }
    }
}

#[async_trait]
impl SiteAnalyser for LlmSiteAnalyser {
    #[instrument(skip(self))]
    async fn analyse(&self, url: &str) -> Result<SiteAnalysis> {
        let domain = extract_domain(url)
            .ok_or_else(|| LinkHunterError::validation(format!("invalid site URL: {url}")))?;

        let (text, metrics) = tokio::join!(self.fetch_text(url), self.metrics.domain_metrics(&domain));
        let metrics = metrics.unwrap_or_else(|e| {
            warn!(error = %e, "metrics lookup failed during site analysis");
            None
        });

        let mut analysis = match &self.model {
            None => {
                debug!("no language model configured, returning placeholder analysis");
                SiteAnalysis::placeholder("Site analysis unavailable without a language model.")
            }
            Some(model) => {
                let prompt = format!("Analyse this website ({url}):\n\n{text}");
                let reply = model
                    .complete_text(SYSTEM_PROMPT, &prompt, ANALYSIS_MAX_TOKENS)
                    .await?;
                extract_json_object(&reply)
                    .and_then(|json| serde_json::from_str::<SiteAnalysis>(json).ok())
                    .unwrap_or_else(|| {
                        warn!("unparsable site analysis reply");
                        SiteAnalysis::placeholder(reply.chars().take(200).collect::<String>())
                    })
            }
        };

        if let Some(m) = metrics {
            analysis.domain_rating = Some(m.domain_rating);
        }
        Ok(analysis)
    }
}

/// Reduce HTML to title, meta description, h1–h3 headings, and substantial
/// paragraphs, one per line.
pub(crate) fn strip_to_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    let mut parts: Vec<String> = Vec::new();

    let select = |css: &str| Selector::parse(css).ok();

    let title = select("title")
        .and_then(|sel| doc.select(&sel).next().map(|t| clean(&t.text().collect::<String>())))
        .filter(|t| !t.is_empty());
    if let Some(title) = title {
        parts.push(format!("Title: {title}"));
    }

    let description = select(r#"meta[name="description"]"#).and_then(|sel| {
        doc.select(&sel)
            .next()
            .and_then(|m| m.value().attr("content"))
            .map(clean)
    });
    if let Some(description) = description {
        parts.push(format!("Meta description: {description}"));
    }

    if let Some(sel) = select("h1, h2, h3") {
        for heading in doc.select(&sel) {
            let text = clean(&heading.text().collect::<String>());
            if !text.is_empty() {
                parts.push(format!("Heading: {text}"));
            }
        }
    }

    if let Some(sel) = select("p") {
        for paragraph in doc.select(&sel) {
            let text = clean(&paragraph.text().collect::<String>());
            if text.chars().count() > MIN_PARAGRAPH_CHARS {
                parts.push(text);
            }
        }
    }

    parts.join("\n").chars().take(MAX_TEXT_CHARS).collect()
}

fn clean(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ContentBlock, ModelRequest, ModelResponse, StopReason};
    use crate::metrics::BacklinkEntry;
    use linkhunter_shared::DomainMetrics;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct StaticMetrics(Option<DomainMetrics>);

    #[async_trait]
    impl MetricsProvider for StaticMetrics {
        async fn domain_metrics(&self, _domain: &str) -> Result<Option<DomainMetrics>> {
            Ok(self.0)
        }
        async fn backlinks(&self, _domain: &str, _limit: u32) -> Result<Vec<BacklinkEntry>> {
            Ok(Vec::new())
        }
    }

    struct Reply(String);

    #[async_trait]
    impl LanguageModel for Reply {
        async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse> {
            assert!(request.tools.is_empty());
            Ok(ModelResponse {
                content: vec![ContentBlock::Text { text: self.0.clone() }],
                stop_reason: Some(StopReason::EndTurn),
            })
        }
    }

    const PAGE: &str = r#"<html><head><title> Acme   Plumbing </title>
        <meta name="description" content="Emergency plumbers in Leeds"></head>
        <body><nav><p>Home</p></nav><h1>Boiler repair</h1><h3>Areas</h3>
        <p>We fix boilers, radiators and leaking pipes across Yorkshire.</p></body></html>"#;

    #[test]
    fn strips_page_to_key_text() {
        let text = strip_to_text(PAGE);
        assert_eq!(
            text,
            "Title: Acme Plumbing\nMeta description: Emergency plumbers in Leeds\n\
             Heading: Boiler repair\nHeading: Areas\n\
             We fix boilers, radiators and leaking pipes across Yorkshire."
        );
    }

    #[test]
    fn stripped_text_is_capped() {
        let long = format!("<p>{}</p>", "word ".repeat(10_000));
        assert_eq!(strip_to_text(&long).chars().count(), MAX_TEXT_CHARS);
    }

    #[tokio::test]
    async fn placeholder_without_model_keeps_metrics() {
        let metrics = Arc::new(StaticMetrics(Some(DomainMetrics {
            domain_rating: 27,
            ..DomainMetrics::default()
        })));
        let analyser = LlmSiteAnalyser::new(None, metrics, 5).unwrap();
        let analysis = analyser.analyse("https://unreachable.invalid/").await.unwrap();
        assert_eq!(analysis.niche, "Unknown");
        assert_eq!(analysis.domain_rating, Some(27));
    }

    #[tokio::test]
    async fn model_reply_is_used() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .mount(&server)
            .await;

        let model: Arc<dyn LanguageModel> = Arc::new(Reply(
            r#"{"niche": "Plumbing", "description": "Leeds plumbers", "target_keywords": ["boiler repair"],
               "target_audience": "Homeowners", "content_themes": ["heating"]}"#
                .into(),
        ));
        let analyser = LlmSiteAnalyser::new(Some(model), Arc::new(StaticMetrics(None)), 5).unwrap();
        let analysis = analyser.analyse(&server.uri()).await.unwrap();
        assert_eq!(analysis.niche, "Plumbing");
        assert_eq!(analysis.target_keywords, vec!["boiler repair".to_string()]);
        assert_eq!(analysis.domain_rating, None);
    }

    #[tokio::test]
    async fn rejects_invalid_url() {
        let analyser = LlmSiteAnalyser::new(None, Arc::new(StaticMetrics(None)), 5).unwrap();
        assert!(analyser.analyse("not a url").await.is_err());
    }
}
