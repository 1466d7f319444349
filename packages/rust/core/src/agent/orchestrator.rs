//! The bounded model ↔ tool loop behind one chat turn.

use std::sync::Arc;

use linkhunter_providers::{
    ContentBlock, LanguageModel, Message, ModelRequest, Role, ToolDefinition,
};
use linkhunter_shared::{
    AgentRole, AppConfig, LinkHunterError, NewAgentMessage, Result, ToolInvocation,
    is_valid_record_id,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::dispatcher::{ToolDispatcher, is_error_result};
use super::prompt::system_prompt;
use super::tools::tool_definitions;

/// Hard cap on model calls per run.
pub const MAX_TURNS: usize = 10;

/// Returned when a run ends without any prose from the model.
pub const FALLBACK_REPLY: &str =
    "Sorry, I couldn't finish that request. Please try again in a moment.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    pub max_turns: usize,
    pub max_tokens: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_turns: MAX_TURNS,
            max_tokens: 4096,
        }
    }
}

impl From<&AppConfig> for OrchestratorConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_turns: config.defaults.max_turns,
            max_tokens: config.anthropic.max_tokens,
        }
    }
}

/// The authenticated caller.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: String,
    pub org_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Full conversation so far; the last message is the new user turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub project_id: String,
    pub messages: Vec<ChatMessage>,
}

/// Tool outcome as exposed to the caller. Inputs and results stay server-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolCallSummary {
    pub tool: String,
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatResponse {
    pub message: String,
    pub tool_calls: Vec<ToolCallSummary>,
}

/// Progress hooks for interactive front ends.
pub trait RunObserver: Send + Sync {
    fn turn_started(&self, _turn: usize) {}
    fn tool_started(&self, _tool: &str) {}
    fn tool_finished(&self, _tool: &str, _success: bool) {}
}

/// Observer that ignores every event.
pub struct SilentObserver;

impl RunObserver for SilentObserver {}

pub struct Orchestrator {
    model: Arc<dyn LanguageModel>,
    dispatcher: ToolDispatcher,
    config: OrchestratorConfig,
    tools: Vec<ToolDefinition>,
}

impl Orchestrator {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        dispatcher: ToolDispatcher,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            model,
            dispatcher,
            config,
            tools: tool_definitions(),
        }
    }

    pub fn dispatcher(&self) -> &ToolDispatcher {
        &self.dispatcher
    }

    /// Run one chat turn.
    ///
    /// Persists exactly one user and one assistant message. Tool failures,
    /// model failures, cancellation and an exhausted turn budget all end the
    /// run with the best prose available. Only a malformed request or an
    /// unknown project is an `Err`, and those are raised before any model
    /// call or write.
    #[instrument(skip_all, fields(project_id = %request.project_id, org_id = %identity.org_id))]
    pub async fn run(
        &self,
        identity: &Identity,
        request: &ChatRequest,
        cancel: Option<&CancellationToken>,
        observer: &dyn RunObserver,
    ) -> Result<ChatResponse> {
        let latest = validate_request(request)?;
        let storage = self.dispatcher.storage();
        if storage
            .get_project(&request.project_id, &identity.org_id)
            .await?
            .is_none()
        {
            return Err(LinkHunterError::NotFound(format!(
                "project {}",
                request.project_id
            )));
        }

        storage
            .insert_agent_message(&NewAgentMessage {
                project_id: request.project_id.clone(),
                user_id: identity.user_id.clone(),
                role: AgentRole::User,
                content: latest.to_string(),
                tool_calls: None,
            })
            .await?;

        let system = system_prompt(&request.project_id);
        let mut messages: Vec<Message> = request
            .messages
            .iter()
            .filter(|m| !m.content.trim().is_empty())
            .map(|m| Message {
                role: m.role,
                content: vec![ContentBlock::Text {
                    text: m.content.clone(),
                }],
            })
            .collect();
        let mut reply = String::new();
        let mut invocations: Vec<ToolInvocation> = Vec::new();

        for turn in 1..=self.config.max_turns {
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                info!(turn, "run cancelled");
                break;
            }
            observer.turn_started(turn);

            let model_request = ModelRequest {
                system: system.clone(),
                tools: self.tools.clone(),
                messages: messages.clone(),
                max_tokens: self.config.max_tokens,
            };
            let response = match self.model.complete(&model_request).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(turn, error = %e, "model call failed, ending run");
                    break;
                }
            };

            let text = response.text();
            if !text.is_empty() {
                reply = text;
            }

            let uses: Vec<(String, String, Value)> = response
                .tool_uses()
                .into_iter()
                .map(|(id, name, input)| (id.to_string(), name.to_string(), input.clone()))
                .collect();
            debug!(turn, tool_uses = uses.len(), stop_reason = ?response.stop_reason, "model turn");
            if uses.is_empty() {
                break;
            }

            messages.push(Message {
                role: Role::Assistant,
                content: response
                    .content
                    .into_iter()
                    .filter(|block| !matches!(block, ContentBlock::Unsupported))
                    .collect(),
            });

            let mut results = Vec::with_capacity(uses.len());
            for (id, name, input) in uses {
                observer.tool_started(&name);
                let (block, record) = self
                    .call_tool(id, name, input, &request.project_id, &identity.org_id)
                    .await;
                observer.tool_finished(&record.tool_name, record.succeeded);
                results.push(block);
                invocations.push(record);
            }
            messages.push(Message {
                role: Role::User,
                content: results,
            });
        }

        if reply.is_empty() {
            reply = FALLBACK_REPLY.to_string();
        }

        storage
            .insert_agent_message(&NewAgentMessage {
                project_id: request.project_id.clone(),
                user_id: identity.user_id.clone(),
                role: AgentRole::Assistant,
                content: reply.clone(),
                tool_calls: (!invocations.is_empty()).then(|| invocations.clone()),
            })
            .await?;

        info!(tools = invocations.len(), "run finished");
        Ok(ChatResponse {
            message: reply,
            tool_calls: invocations
                .iter()
                .map(|call| ToolCallSummary {
                    tool: call.tool_name.clone(),
                    success: call.succeeded,
                })
                .collect(),
        })
    }

    /// Execute one tool request. Never fails: errors become `is_error`
    /// results for the model.
    async fn call_tool(
        &self,
        id: String,
        name: String,
        input: Value,
        project_id: &str,
        org_id: &str,
    ) -> (ContentBlock, ToolInvocation) {
        match self
            .dispatcher
            .execute(&name, input.clone(), project_id, org_id)
            .await
        {
            Ok(value) => {
                let succeeded = !is_error_result(&value);
                (
                    ContentBlock::ToolResult {
                        tool_use_id: id,
                        content: value.to_string(),
                        is_error: false,
                    },
                    ToolInvocation {
                        tool_name: name,
                        input,
                        result: Some(value),
                        error: None,
                        succeeded,
                    },
                )
            }
            Err(e) => {
                warn!(tool = %name, error = %e, "tool failed");
                (
                    ContentBlock::ToolResult {
                        tool_use_id: id,
                        content: e.to_string(),
                        is_error: true,
                    },
                    ToolInvocation {
                        tool_name: name,
                        input,
                        result: None,
                        error: Some(e.to_string()),
                        succeeded: false,
                    },
                )
            }
        }
    }
}

/// Check the request shape and return the new user message.
fn validate_request(request: &ChatRequest) -> Result<&str> {
    if !is_valid_record_id(&request.project_id) {
        return Err(LinkHunterError::validation(format!(
            "invalid project id: {}",
            request.project_id
        )));
    }
    let Some(last) = request.messages.last() else {
        return Err(LinkHunterError::validation("no messages supplied"));
    };
    if last.role != Role::User {
        return Err(LinkHunterError::validation(
            "the last message must come from the user",
        ));
    }
    if last.content.trim().is_empty() {
        return Err(LinkHunterError::validation("the last message is empty"));
    }
    Ok(&last.content)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::agent::dispatcher::DispatcherSettings;
    use crate::testing::{ScriptedModel, fake_collaborators, seeded_storage, text_reply, tool_reply};
    use linkhunter_shared::{Organisation, PlanTier, Project};
    use linkhunter_storage::Storage;
    use serde_json::json;

    async fn orchestrator(model: Arc<ScriptedModel>) -> (Orchestrator, Organisation, Project) {
        let (storage, org, project) = seeded_storage().await;
        let dispatcher = ToolDispatcher::new(
            Arc::new(storage),
            fake_collaborators(),
            DispatcherSettings::default(),
        );
        let model: Arc<dyn LanguageModel> = model;
        (
            Orchestrator::new(model, dispatcher, OrchestratorConfig::default()),
            org,
            project,
        )
    }

    fn identity(org: &Organisation) -> Identity {
        Identity {
            user_id: "user-1".into(),
            org_id: org.id.clone(),
        }
    }

    fn ask(project: &Project, text: &str) -> ChatRequest {
        ChatRequest {
            project_id: project.id.clone(),
            messages: vec![ChatMessage::user(text)],
        }
    }

    async fn stored(storage: &Storage, project: &Project) -> Vec<(AgentRole, String)> {
        storage
            .list_agent_messages(&project.id, &project.org_id)
            .await
            .unwrap()
            .into_iter()
            .map(|m| (m.role, m.content))
            .collect()
    }

    #[derive(Default)]
    struct RecordingObserver {
        events: Mutex<Vec<String>>,
    }

    impl RunObserver for RecordingObserver {
        fn turn_started(&self, turn: usize) {
            self.events.lock().unwrap().push(format!("turn {turn}"));
        }

        fn tool_finished(&self, tool: &str, success: bool) {
            self.events.lock().unwrap().push(format!("{tool} {success}"));
        }
    }

    #[tokio::test]
    async fn plain_answer_ends_after_one_call() {
        let model = Arc::new(ScriptedModel::replies(vec![text_reply("Hello! How can I help?")]));
        let (orch, org, project) = orchestrator(model.clone()).await;

        let response = orch
            .run(&identity(&org), &ask(&project, "hi"), None, &SilentObserver)
            .await
            .unwrap();

        assert_eq!(response.message, "Hello! How can I help?");
        assert!(response.tool_calls.is_empty());
        assert_eq!(model.calls(), 1);
        assert_eq!(
            stored(orch.dispatcher().storage(), &project).await,
            vec![
                (AgentRole::User, "hi".to_string()),
                (AgentRole::Assistant, "Hello! How can I help?".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn failing_tool_does_not_block_its_siblings() {
        let model = Arc::new(ScriptedModel::replies(vec![
            tool_reply(
                "Let me look.",
                &[
                    ("t1", "get_pipeline_summary", json!({})),
                    ("t2", "send_email", json!({ "to": "x@y.z" })),
                    ("t3", "check_existing_backlinks", json!({})),
                ],
            ),
            text_reply("Your pipeline is empty."),
        ]));
        let (orch, org, project) = orchestrator(model.clone()).await;
        let observer = RecordingObserver::default();

        let response = orch
            .run(&identity(&org), &ask(&project, "status?"), None, &observer)
            .await
            .unwrap();

        assert_eq!(response.message, "Your pipeline is empty.");
        assert_eq!(
            response.tool_calls,
            vec![
                ToolCallSummary { tool: "get_pipeline_summary".into(), success: true },
                ToolCallSummary { tool: "send_email".into(), success: false },
                ToolCallSummary { tool: "check_existing_backlinks".into(), success: true },
            ]
        );

        let second = &model.requests()[1];
        let results = &second.messages.last().unwrap().content;
        assert_eq!(results.len(), 3);
        match &results[1] {
            ContentBlock::ToolResult { tool_use_id, is_error, content } => {
                assert_eq!(tool_use_id, "t2");
                assert!(*is_error);
                assert!(content.contains("unknown tool"));
            }
            other => panic!("unexpected block: {other:?}"),
        }
        assert!(matches!(&results[0], ContentBlock::ToolResult { is_error: false, .. }));

        assert_eq!(
            *observer.events.lock().unwrap(),
            vec![
                "turn 1",
                "get_pipeline_summary true",
                "send_email false",
                "check_existing_backlinks true",
                "turn 2",
            ]
        );
    }

    #[tokio::test]
    async fn persisted_reply_keeps_full_invocations() {
        let model = Arc::new(ScriptedModel::replies(vec![
            tool_reply("", &[("t1", "get_pipeline_summary", json!({}))]),
            text_reply("Nothing yet."),
        ]));
        let (orch, org, project) = orchestrator(model).await;

        let response = orch
            .run(&identity(&org), &ask(&project, "summary"), None, &SilentObserver)
            .await
            .unwrap();

        let transcript = serde_json::to_value(&response).unwrap();
        assert_eq!(
            transcript["tool_calls"],
            json!([{ "tool": "get_pipeline_summary", "success": true }])
        );

        let messages = orch
            .dispatcher()
            .storage()
            .list_agent_messages(&project.id, &project.org_id)
            .await
            .unwrap();
        let calls = messages[1].tool_calls.as_ref().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].result.as_ref().unwrap()["project_id"], json!(project.id));
    }

    #[tokio::test]
    async fn turn_budget_caps_model_calls() {
        let model = Arc::new(ScriptedModel::replies(vec![tool_reply(
            "Still digging.",
            &[("t", "get_pipeline_summary", json!({}))],
        )]));
        let (orch, org, project) = orchestrator(model.clone()).await;

        let response = orch
            .run(&identity(&org), &ask(&project, "go"), None, &SilentObserver)
            .await
            .unwrap();

        assert_eq!(model.calls(), MAX_TURNS);
        assert_eq!(response.message, "Still digging.");
        assert_eq!(response.tool_calls.len(), MAX_TURNS);
        assert_eq!(stored(orch.dispatcher().storage(), &project).await.len(), 2);
    }

    #[tokio::test]
    async fn model_failure_degrades_to_last_prose() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(tool_reply("Checking your pipeline.", &[("t", "get_pipeline_summary", json!({}))])),
            Err("overloaded".into()),
        ]));
        let (orch, org, project) = orchestrator(model.clone()).await;

        let response = orch
            .run(&identity(&org), &ask(&project, "status"), None, &SilentObserver)
            .await
            .unwrap();

        assert_eq!(model.calls(), 2);
        assert_eq!(response.message, "Checking your pipeline.");
        assert_eq!(response.tool_calls.len(), 1);
    }

    #[tokio::test]
    async fn model_failure_without_prose_returns_fallback() {
        let model = Arc::new(ScriptedModel::new(vec![Err("unauthorised".into())]));
        let (orch, org, project) = orchestrator(model).await;

        let response = orch
            .run(&identity(&org), &ask(&project, "hi"), None, &SilentObserver)
            .await
            .unwrap();

        assert_eq!(response.message, FALLBACK_REPLY);
        let stored = stored(orch.dispatcher().storage(), &project).await;
        assert_eq!(stored[1], (AgentRole::Assistant, FALLBACK_REPLY.to_string()));
    }

    #[tokio::test]
    async fn cancelled_run_makes_no_model_calls() {
        let model = Arc::new(ScriptedModel::replies(vec![text_reply("unused")]));
        let (orch, org, project) = orchestrator(model.clone()).await;
        let token = CancellationToken::new();
        token.cancel();

        let response = orch
            .run(&identity(&org), &ask(&project, "hi"), Some(&token), &SilentObserver)
            .await
            .unwrap();

        assert_eq!(model.calls(), 0);
        assert_eq!(response.message, FALLBACK_REPLY);
        assert_eq!(stored(orch.dispatcher().storage(), &project).await.len(), 2);
    }

    #[tokio::test]
    async fn malformed_requests_fail_before_any_model_call() {
        let model = Arc::new(ScriptedModel::replies(vec![text_reply("unused")]));
        let (orch, org, project) = orchestrator(model.clone()).await;
        let who = identity(&org);

        let bad_id = ChatRequest {
            project_id: "not-a-uuid".into(),
            messages: vec![ChatMessage::user("hi")],
        };
        let empty = ChatRequest {
            project_id: project.id.clone(),
            messages: Vec::new(),
        };
        let ends_with_assistant = ChatRequest {
            project_id: project.id.clone(),
            messages: vec![ChatMessage::user("hi"), ChatMessage::assistant("hello")],
        };

        for request in [bad_id, empty, ends_with_assistant] {
            let err = orch.run(&who, &request, None, &SilentObserver).await.unwrap_err();
            assert!(matches!(err, LinkHunterError::Validation { .. }), "{err}");
        }
        assert_eq!(model.calls(), 0);
        assert!(stored(orch.dispatcher().storage(), &project).await.is_empty());
    }

    #[tokio::test]
    async fn another_orgs_project_is_not_found() {
        let model = Arc::new(ScriptedModel::replies(vec![text_reply("unused")]));
        let (orch, _org, project) = orchestrator(model.clone()).await;
        let rival = orch
            .dispatcher()
            .storage()
            .create_organisation("Rival", PlanTier::Growth)
            .await
            .unwrap();

        let err = orch
            .run(&identity(&rival), &ask(&project, "hi"), None, &SilentObserver)
            .await
            .unwrap_err();

        assert!(matches!(err, LinkHunterError::NotFound(_)));
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn history_is_sent_to_the_model() {
        let model = Arc::new(ScriptedModel::replies(vec![text_reply("Sure.")]));
        let (orch, org, project) = orchestrator(model.clone()).await;
        let request = ChatRequest {
            project_id: project.id.clone(),
            messages: vec![
                ChatMessage::user("find prospects"),
                ChatMessage::assistant("Here are 12 candidates."),
                ChatMessage::user("import the top 3"),
            ],
        };

        orch.run(&identity(&org), &request, None, &SilentObserver)
            .await
            .unwrap();

        let sent = &model.requests()[0];
        assert_eq!(sent.messages.len(), 3);
        assert_eq!(sent.tools.len(), 13);
        assert!(sent.system.contains(&project.id));
        let stored = stored(orch.dispatcher().storage(), &project).await;
        assert_eq!(stored[0], (AgentRole::User, "import the top 3".to_string()));
    }
}
