//! Fakes shared by the unit tests of this crate.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use linkhunter_providers::{
    BacklinkEntry, ContactFinder, ContentBlock, DomainContact, DraftOptions, EmailDraft,
    LanguageModel, MetricsProvider, ModelRequest, ModelResponse, OutreachDrafter, SearchOptions,
    SearchProvider, SearchResult, SiteAnalyser, SiteAnalysis, StopReason, paragraphs_to_html,
};
use linkhunter_shared::{
    DomainMetrics, EntryMethod, ImportJobPatch, ImportJobStatus, LinkHunterError, NewProspect,
    Organisation, PlanTier, Project, Prospect, ProspectStatus, Result, new_record_id,
};
use linkhunter_storage::Storage;
use linkhunter_verifier::{LinkVerifier, VerifierOptions};
use serde_json::Value;

use crate::collaborators::Collaborators;

pub(crate) async fn test_storage() -> Storage {
    let tmp = std::env::temp_dir().join(format!("lh_core_test_{}.db", new_record_id()));
    Storage::open(&tmp).await.expect("open test db")
}

/// A fresh database with one starter org and one project targeting
/// `https://acme.co.uk`.
pub(crate) async fn seeded_storage() -> (Storage, Organisation, Project) {
    let storage = test_storage().await;
    let org = storage
        .create_organisation("Acme", PlanTier::Starter)
        .await
        .expect("create org");
    let project = storage
        .create_project(&org.id, "Acme Plumbing", "https://acme.co.uk", &["plumbing".into()])
        .await
        .expect("create project");
    (storage, org, project)
}

/// Spend `count` of the org's monthly quota by committing an import of
/// filler prospects.
pub(crate) async fn use_quota(storage: &Storage, org: &Organisation, project: &Project, count: u32) {
    let job = storage
        .create_import_job(&project.id, &org.id, EntryMethod::Manual, count, &Value::Null)
        .await
        .expect("create job");
    storage
        .update_import_job(
            &job.id,
            &org.id,
            &ImportJobPatch {
                status: Some(ImportJobStatus::Running),
                ..ImportJobPatch::default()
            },
        )
        .await
        .expect("open job");
    let filler: Vec<NewProspect> = (0..count)
        .map(|i| {
            let domain = format!("filler{i}.co.uk");
            NewProspect::bare(&format!("https://{domain}/"), &domain, EntryMethod::Manual)
        })
        .collect();
    storage
        .commit_import_job(&job.id, &project.id, &org.id, &filler)
        .await
        .expect("commit filler");
}

/// An in-memory prospect for pure classification tests.
pub(crate) fn prospect_fixture(domain: &str, status: ProspectStatus) -> Prospect {
    let now = Utc::now();
    Prospect {
        id: new_record_id(),
        project_id: "project".into(),
        org_id: "org".into(),
        prospect_url: format!("https://{domain}/"),
        prospect_domain: domain.into(),
        page_title: None,
        page_url: None,
        snippet: None,
        domain_authority: None,
        spam_score: None,
        contact_name: None,
        contact_email: None,
        contact_role: None,
        contact_source: None,
        opportunity_type: None,
        linkability_score: None,
        relevance_score: None,
        status,
        entry_method: EntryMethod::Manual,
        first_contacted_at: None,
        last_contacted_at: None,
        link_live: false,
        link_url: None,
        link_verified_at: None,
        link_lost_at: None,
        notes: None,
        created_at: now,
        updated_at: now,
    }
}

// ---------------------------------------------------------------------------
// Collaborator fakes
// ---------------------------------------------------------------------------

/// Returns the same result list for every query and records the queries.
#[derive(Default)]
pub(crate) struct FakeSearch {
    results: Vec<SearchResult>,
    queries: Mutex<Vec<String>>,
}

impl FakeSearch {
    pub(crate) fn with_urls(urls: &[&str]) -> Self {
        Self {
            results: urls
                .iter()
                .map(|url| SearchResult {
                    url: url.to_string(),
                    title: format!("Plumbing resources at {url}"),
                    snippet: "A list of useful links for homeowners".into(),
                })
                .collect(),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn queries(&self) -> Vec<String> {
        self.queries.lock().expect("queries lock").clone()
    }
}

#[async_trait]
impl SearchProvider for FakeSearch {
    async fn search(&self, query: &str, _opts: &SearchOptions) -> Result<Vec<SearchResult>> {
        self.queries.lock().expect("queries lock").push(query.to_string());
        Ok(self.results.clone())
    }
}

#[derive(Default)]
pub(crate) struct FakeMetrics {
    metrics: HashMap<String, DomainMetrics>,
    backlinks: Vec<BacklinkEntry>,
    fail: bool,
    backlink_requests: Mutex<Vec<String>>,
}

impl FakeMetrics {
    pub(crate) fn with(mut self, domain: &str, metrics: DomainMetrics) -> Self {
        self.metrics.insert(domain.to_string(), metrics);
        self
    }

    pub(crate) fn with_backlinks(mut self, backlinks: Vec<BacklinkEntry>) -> Self {
        self.backlinks = backlinks;
        self
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(crate) fn backlink_requests(&self) -> Vec<String> {
        self.backlink_requests.lock().expect("requests lock").clone()
    }
}

#[async_trait]
impl MetricsProvider for FakeMetrics {
    async fn domain_metrics(&self, domain: &str) -> Result<Option<DomainMetrics>> {
        if self.fail {
            return Err(LinkHunterError::Provider("metrics service unavailable".into()));
        }
        Ok(self.metrics.get(domain).copied())
    }

    async fn backlinks(&self, domain: &str, _limit: u32) -> Result<Vec<BacklinkEntry>> {
        self.backlink_requests
            .lock()
            .expect("requests lock")
            .push(domain.to_string());
        if self.fail {
            return Err(LinkHunterError::Provider("metrics service unavailable".into()));
        }
        Ok(self.backlinks.clone())
    }
}

#[derive(Default)]
pub(crate) struct FakeContacts {
    contacts: HashMap<String, DomainContact>,
    fail: bool,
}

impl FakeContacts {
    pub(crate) fn with(mut self, domain: &str, name: &str, email: &str) -> Self {
        self.contacts.insert(
            domain.to_string(),
            DomainContact {
                name: name.into(),
                email: email.into(),
                role: "editor".into(),
                confidence: 90,
            },
        );
        self
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl ContactFinder for FakeContacts {
    async fn best_contact(&self, domain: &str) -> Result<Option<DomainContact>> {
        if self.fail {
            return Err(LinkHunterError::Provider("contact lookup timed out".into()));
        }
        Ok(self.contacts.get(domain).cloned())
    }
}

/// Drafts a fixed email; domains listed in `failing_domains` error out.
#[derive(Default)]
pub(crate) struct FakeDrafter {
    failing_domains: Vec<String>,
}

impl FakeDrafter {
    pub(crate) fn failing_for(domains: &[&str]) -> Self {
        Self {
            failing_domains: domains.iter().map(|d| d.to_string()).collect(),
        }
    }
}

#[async_trait]
impl OutreachDrafter for FakeDrafter {
    async fn draft(
        &self,
        prospect: &Prospect,
        project: &Project,
        opts: &DraftOptions,
    ) -> Result<EmailDraft> {
        if self.failing_domains.contains(&prospect.prospect_domain) {
            return Err(LinkHunterError::Model("drafting failed".into()));
        }
        let prefix = if opts.is_followup { "Re: " } else { "" };
        let body_text = format!(
            "Hi there,\n\nI enjoyed {}. {} would make a useful addition.\n\nThanks",
            prospect.prospect_domain, project.name
        );
        Ok(EmailDraft {
            subject: format!("{prefix}A resource for {}", prospect.prospect_domain),
            body_html: paragraphs_to_html(&body_text),
            body_text,
        })
    }
}

pub(crate) struct FakeSiteAnalyser;

#[async_trait]
impl SiteAnalyser for FakeSiteAnalyser {
    async fn analyse(&self, _url: &str) -> Result<SiteAnalysis> {
        Ok(SiteAnalysis {
            niche: "Plumbing".into(),
            description: "Domestic plumbing services".into(),
            target_keywords: vec!["plumbing".into(), "boiler repair".into()],
            target_audience: "Homeowners".into(),
            domain_rating: Some(22),
            content_themes: vec!["heating".into()],
        })
    }
}

/// Collaborators made of fakes and a verifier allowed to reach localhost.
pub(crate) fn fake_collaborators() -> Collaborators {
    Collaborators {
        metrics: Arc::new(FakeMetrics::default()),
        search: Arc::new(FakeSearch::default()),
        contacts: Arc::new(FakeContacts::default()),
        drafter: Arc::new(FakeDrafter::default()),
        site_analyser: Arc::new(FakeSiteAnalyser),
        verifier: LinkVerifier::new(&VerifierOptions {
            timeout_secs: 5,
            allow_private_hosts: true,
        })
        .expect("build verifier"),
    }
}

// ---------------------------------------------------------------------------
// Scripted language model
// ---------------------------------------------------------------------------

/// Plays back a fixed list of replies; `Err` entries become model errors.
/// Once the script runs out the last entry repeats.
pub(crate) struct ScriptedModel {
    script: Mutex<VecDeque<std::result::Result<ModelResponse, String>>>,
    last: Mutex<Option<std::result::Result<ModelResponse, String>>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    pub(crate) fn new(script: Vec<std::result::Result<ModelResponse, String>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn replies(responses: Vec<ModelResponse>) -> Self {
        Self::new(responses.into_iter().map(Ok).collect())
    }

    pub(crate) fn calls(&self) -> usize {
        self.requests.lock().expect("requests lock").len()
    }

    pub(crate) fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.clone());

        let next = self.script.lock().expect("script lock").pop_front();
        let mut last = self.last.lock().expect("last lock");
        let reply = match next {
            Some(reply) => {
                *last = Some(reply.clone());
                reply
            }
            None => last
                .clone()
                .unwrap_or_else(|| Err("script exhausted".to_string())),
        };
        reply.map_err(LinkHunterError::Model)
    }
}

pub(crate) fn text_reply(text: &str) -> ModelResponse {
    ModelResponse {
        content: vec![ContentBlock::Text { text: text.into() }],
        stop_reason: Some(StopReason::EndTurn),
    }
}

/// A reply with optional prose followed by tool requests `(id, name, input)`.
pub(crate) fn tool_reply(text: &str, calls: &[(&str, &str, Value)]) -> ModelResponse {
    let mut content = Vec::new();
    if !text.is_empty() {
        content.push(ContentBlock::Text { text: text.into() });
    }
    for (id, name, input) in calls {
        content.push(ContentBlock::ToolUse {
            id: id.to_string(),
            name: name.to_string(),
            input: input.clone(),
        });
    }
    ModelResponse {
        content,
        stop_reason: Some(StopReason::ToolUse),
    }
}
