//! Outreach email drafting.

use std::sync::Arc;

use async_trait::async_trait;
use linkhunter_shared::{OutreachTone, Project, Prospect, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::llm::{LanguageModel, extract_json_object};

const DRAFT_MAX_TOKENS: u32 = 1024;

#[derive(Debug, Clone, Default)]
pub struct DraftOptions {
    pub tone: OutreachTone,
    pub custom_value_prop: Option<String>,
    pub is_followup: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailDraft {
    pub subject: String,
    pub body_text: String,
    pub body_html: String,
}

#[async_trait]
pub trait OutreachDrafter: Send + Sync {
    async fn draft(
        &self,
        prospect: &Prospect,
        project: &Project,
        opts: &DraftOptions,
    ) -> Result<EmailDraft>;
}

/// Drafts emails with a language model, falling back to a fixed template
/// when no model is configured or its reply cannot be parsed.
#[derive(Clone, Default)]
pub struct LlmOutreachDrafter {
    model: Option<Arc<dyn LanguageModel>>,
}

#[derive(Deserialize)]
struct DraftReply {
    subject: String,
    body_text: String,
}

impl LlmOutreachDrafter {
    pub fn new(model: Option<Arc<dyn LanguageModel>>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl OutreachDrafter for LlmOutreachDrafter {
    #[instrument(skip_all, fields(domain = %prospect.prospect_domain, tone = ?opts.tone, followup = opts.is_followup))]
    async fn draft(
        &self,
        prospect: &Prospect,
        project: &Project,
        opts: &DraftOptions,
    ) -> Result<EmailDraft> {
        let Some(model) = &self.model else {
            debug!("no language model configured, using template email");
            return Ok(template_email(prospect, project, opts.is_followup));
        };

        let reply = model
            .complete_text(&system_prompt(opts), &user_prompt(prospect, project), DRAFT_MAX_TOKENS)
            .await?;

        let parsed = extract_json_object(&reply)
            .and_then(|json| serde_json::from_str::<DraftReply>(json).ok())
            .filter(|d| !d.subject.trim().is_empty() && !d.body_text.trim().is_empty());

        match parsed {
            Some(d) => Ok(EmailDraft {
                body_html: paragraphs_to_html(&d.body_text),
                subject: d.subject,
                body_text: d.body_text,
            }),
            None => {
                warn!("unparsable draft reply, using template email");
                Ok(template_email(prospect, project, opts.is_followup))
            }
        }
    }
}

fn tone_guide(tone: OutreachTone) -> &'static str {
    match tone {
        OutreachTone::Professional => {
            "Use a professional, polished tone suitable for trade bodies and established businesses."
        }
        OutreachTone::Friendly => {
            "Use a warm, conversational tone suitable for bloggers and small site owners."
        }
        OutreachTone::Concise => {
            "Be extremely brief and direct. No fluff. Get to the point in 2-3 short paragraphs."
        }
    }
}

fn system_prompt(opts: &DraftOptions) -> String {
    let mut rules = vec![
        "Reference the specific page or article on the prospect's site".to_string(),
        "Explain the value to THEIR readers (not yours)".to_string(),
        "3-4 short paragraphs maximum".to_string(),
        "Clear single call-to-action".to_string(),
        "NEVER use \"I hope this email finds you well\" or similar generic openers".to_string(),
        tone_guide(opts.tone).to_string(),
    ];
    if opts.is_followup {
        rules.push(
            "This is a follow-up email. Be brief, reference the original email, and gently \
             re-state the value proposition."
                .to_string(),
        );
    }
    if let Some(value_prop) = opts.custom_value_prop.as_deref().filter(|v| !v.trim().is_empty()) {
        rules.push(format!("Value proposition to emphasise: {value_prop}"));
    }

    let rules = rules
        .iter()
        .map(|r| format!("- {r}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are an expert outreach email writer for link-building campaigns. \
         Write a personalised email.\n\nRules:\n{rules}\n\n\
         Respond ONLY with valid JSON:\n\
         {{\n  \"subject\": \"string, the email subject line\",\n  \
         \"body_text\": \"string, the plain text email body\"\n}}"
    )
}

fn user_prompt(prospect: &Prospect, project: &Project) -> String {
    let mut lines = vec![
        "Write an outreach email for this scenario:".to_string(),
        String::new(),
        format!(
            "My site: {} ({})",
            project.target_url,
            project.niche.as_deref().unwrap_or("general")
        ),
    ];
    if let Some(description) = &project.description {
        lines.push(format!("About us: {description}"));
    }
    lines.push(String::new());
    lines.push(format!("Prospect domain: {}", prospect.prospect_domain));
    lines.push(format!(
        "Prospect page: {}",
        prospect.page_url.as_deref().unwrap_or(&prospect.prospect_url)
    ));
    lines.push(format!(
        "Page title: {}",
        prospect.page_title.as_deref().unwrap_or("Unknown")
    ));
    lines.push(format!(
        "Page snippet: {}",
        prospect.snippet.as_deref().unwrap_or("N/A")
    ));
    lines.push(format!(
        "Opportunity type: {}",
        prospect
            .opportunity_type
            .map(|t| t.as_str())
            .unwrap_or("resource_link")
    ));
    if let Some(name) = &prospect.contact_name {
        lines.push(format!("Contact name: {name}"));
    }
    if let Some(role) = &prospect.contact_role {
        lines.push(format!("Contact role: {role}"));
    }
    lines.join("\n")
}

/// Deterministic draft used without a model.
fn template_email(prospect: &Prospect, project: &Project, is_followup: bool) -> EmailDraft {
    let name = prospect
        .contact_name
        .as_deref()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or("there");
    let domain = &prospect.prospect_domain;

    let (subject, body) = if is_followup {
        (
            format!("Following up: {} x {domain}", project.name),
            format!(
                "Hi {name},\n\nJust wanted to follow up on my previous email about a potential \
                 collaboration between {} and {domain}.\n\nI'd love to hear your thoughts when \
                 you get a chance.\n\nBest regards",
                project.target_url
            ),
        )
    } else {
        (
            format!("Collaboration opportunity: {} x {domain}", project.name),
            format!(
                "Hi {name},\n\nI came across {} and thought there could be a great fit for \
                 collaboration with {}.\n\nWe focus on {} and I believe our content would add \
                 value for your readers.\n\nWould you be open to discussing this further?\n\n\
                 Best regards",
                prospect.page_title.as_deref().unwrap_or(domain),
                project.name,
                project.niche.as_deref().unwrap_or("relevant content"),
            ),
        )
    };

    EmailDraft {
        body_html: paragraphs_to_html(&body),
        subject,
        body_text: body,
    }
}

/// Wrap blank-line separated paragraphs in escaped `<p>` elements.
pub fn paragraphs_to_html(text: &str) -> String {
    text.split("\n\n")
        .map(|p| format!("<p>{}</p>", escape_html(p)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
