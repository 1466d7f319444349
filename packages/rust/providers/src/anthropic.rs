//! Anthropic Messages API client.

use async_trait::async_trait;
use linkhunter_shared::{AnthropicConfig, LinkHunterError, Result, resolve_secret};
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::http::build_client;
use crate::llm::{ContentBlock, LanguageModel, Message, ModelRequest, ModelResponse, ToolDefinition};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";

/// Language model backed by the Anthropic Messages API.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    client: Client,
    api_key: Option<String>,
    key_env: String,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "is_blank")]
    system: &'a str,
    #[serde(skip_serializing_if = "has_no_tools")]
    tools: &'a [ToolDefinition],
    messages: Vec<Message>,
}

fn is_blank(system: &&str) -> bool {
    system.trim().is_empty()
}

fn has_no_tools(tools: &&[ToolDefinition]) -> bool {
    tools.is_empty()
}

impl AnthropicClient {
    /// Build from config; the API key is read from the configured env var.
    pub fn from_config(config: &AnthropicConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            api_key: resolve_secret(&config.api_key_env),
            key_env: config.api_key_env.clone(),
            model: config.model.clone(),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Build with an explicit key and endpoint.
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            client: build_client(120)?,
            api_key: Some(api_key.into()),
            key_env: String::new(),
            model: model.into(),
            base_url: base_url.into(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LanguageModel for AnthropicClient {
    #[instrument(skip_all, fields(model = %self.model, messages = request.messages.len()))]
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            LinkHunterError::Model(format!("Anthropic API key not configured (set {})", self.key_env))
        })?;

        // Unsupported blocks came from the API and are not accepted back.
        let messages = request
            .messages
            .iter()
            .map(|m| Message {
                role: m.role,
                content: m
                    .content
                    .iter()
                    .filter(|b| !matches!(b, ContentBlock::Unsupported))
                    .cloned()
                    .collect(),
            })
            .collect();

        let body = WireRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            system: &request.system,
            tools: &request.tools,
            messages,
        };

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| LinkHunterError::Model(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(LinkHunterError::Model(format!(
                "Anthropic API error: HTTP {} {}",
                status.as_u16(),
                detail.chars().take(300).collect::<String>()
            )));
        }

        let parsed: ModelResponse = response
            .json()
            .await
            .map_err(|e| LinkHunterError::Model(format!("invalid response body: {e}")))?;
        debug!(stop_reason = ?parsed.stop_reason, blocks = parsed.content.len(), "model turn complete");
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::StopReason;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> ModelRequest {
        ModelRequest {
            system: "You are helpful.".into(),
            tools: vec![ToolDefinition {
                name: "get_pipeline_summary".into(),
                description: "Summarise".into(),
                input_schema: json!({"type": "object"}),
            }],
            messages: vec![Message::user_text("How is the pipeline?")],
            max_tokens: 512,
        }
    }

    #[tokio::test]
    async fn sends_headers_and_parses_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(header("x-api-key", "sk-test"))
            .and(header("anthropic-version", "2023-06-01"))
            .and(body_partial_json(json!({
                "model": "claude-test",
                "max_tokens": 512,
                "system": "You are helpful.",
                "messages": [{"role": "user", "content": [{"type": "text", "text": "How is the pipeline?"}]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "msg_1",
                "content": [{"type": "text", "text": "All good."}],
                "stop_reason": "end_turn"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = AnthropicClient::new("sk-test", "claude-test", server.uri()).unwrap();
        let response = client.complete(&request()).await.unwrap();
        assert_eq!(response.stop_reason, Some(StopReason::EndTurn));
        assert_eq!(response.text(), "All good.");
    }

    #[tokio::test]
    async fn http_errors_become_model_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(ResponseTemplate::new(529).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let client = AnthropicClient::new("sk-test", "claude-test", server.uri()).unwrap();
        let err = client.complete(&request()).await.unwrap_err();
        assert!(matches!(err, LinkHunterError::Model(_)));
        assert!(err.to_string().contains("529"));
    }

    #[tokio::test]
    async fn missing_key_fails_without_request() {
        let config = AnthropicConfig {
            api_key_env: "LINKHUNTER_TEST_UNSET_ANTHROPIC_KEY".into(),
            ..AnthropicConfig::default()
        };
        let client = AnthropicClient::from_config(&config).unwrap();
        assert!(!client.is_configured());
        let err = client.complete(&request()).await.unwrap_err();
        assert!(err.to_string().contains("LINKHUNTER_TEST_UNSET_ANTHROPIC_KEY"));
    }
}
