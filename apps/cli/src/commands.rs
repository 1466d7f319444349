//! CLI command definitions, routing, and tracing setup.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use linkhunter_core::agent::{
    ChatMessage, ChatRequest, DispatcherSettings, Identity, Orchestrator, OrchestratorConfig,
    RunObserver, ToolDispatcher,
};
use linkhunter_core::backlinks::{DEFAULT_SYNC_LIMIT, sync_existing_backlinks};
use linkhunter_core::link_monitor::verify_project_links;
use linkhunter_core::pipeline::{classify_attention, pipeline_summary};
use linkhunter_core::{Collaborators, model_from_config};
use linkhunter_providers::Role;
use linkhunter_shared::{
    AgentRole, AppConfig, PlanTier, Project, expand_home, init_config, load_config,
};
use linkhunter_storage::Storage;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// LinkHunter: find backlink prospects, draft outreach, track won links.
#[derive(Parser)]
#[command(
    name = "linkhunter",
    version,
    about = "Agent-driven backlink prospecting, outreach drafting and link monitoring.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Talk to the agent about a project.
    Chat {
        #[arg(long, env = "LINKHUNTER_ORG")]
        org: String,

        /// Who is talking; stored with each message.
        #[arg(long, env = "LINKHUNTER_USER", default_value = "cli")]
        user: String,

        #[arg(long)]
        project: String,

        /// The message to send.
        message: String,
    },

    /// Organisation management.
    Org {
        #[command(subcommand)]
        action: OrgAction,
    },

    /// Project management.
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },

    /// Won-link monitoring.
    Links {
        #[command(subcommand)]
        action: LinksAction,
    },

    /// Existing backlink profile.
    Backlinks {
        #[command(subcommand)]
        action: BacklinksAction,
    },

    /// Outreach email bookkeeping.
    Email {
        #[command(subcommand)]
        action: EmailAction,
    },

    /// Print a project's pipeline summary and attention counts.
    Pipeline {
        #[arg(long, env = "LINKHUNTER_ORG")]
        org: String,

        #[arg(long)]
        project: String,
    },

    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub(crate) enum OrgAction {
    /// Create an organisation.
    Create {
        #[arg(long)]
        name: String,

        /// Plan tier: starter, growth or agency.
        #[arg(long, default_value = "starter")]
        plan: String,
    },
}

#[derive(Subcommand)]
pub(crate) enum ProjectAction {
    /// Create a project for a target site.
    Create {
        #[arg(long, env = "LINKHUNTER_ORG")]
        org: String,

        #[arg(long)]
        name: String,

        /// The site backlinks should point to.
        #[arg(long)]
        url: String,

        /// Seed keywords (comma-separated).
        #[arg(long, value_delimiter = ',')]
        keywords: Vec<String>,
    },
    /// List an organisation's projects.
    List {
        #[arg(long, env = "LINKHUNTER_ORG")]
        org: String,
    },
}

#[derive(Subcommand)]
pub(crate) enum LinksAction {
    /// Re-check every won link of a project.
    Verify {
        #[arg(long, env = "LINKHUNTER_ORG")]
        org: String,

        #[arg(long)]
        project: String,
    },
}

#[derive(Subcommand)]
pub(crate) enum BacklinksAction {
    /// Pull the project's current backlinks from the metrics provider.
    Sync {
        #[arg(long, env = "LINKHUNTER_ORG")]
        org: String,

        #[arg(long)]
        project: String,

        #[arg(long, default_value_t = DEFAULT_SYNC_LIMIT)]
        limit: u32,
    },
}

#[derive(Subcommand)]
pub(crate) enum EmailAction {
    /// Record that a prospect replied to an email.
    Replied {
        #[arg(long, env = "LINKHUNTER_ORG")]
        org: String,

        /// Outreach email ID.
        #[arg(long)]
        email: String,
    },
}

#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "linkhunter=info",
        1 => "linkhunter=debug",
        _ => "linkhunter=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Chat {
            org,
            user,
            project,
            message,
        } => cmd_chat(&org, &user, &project, &message).await,
        Command::Org { action } => match action {
            OrgAction::Create { name, plan } => cmd_org_create(&name, &plan).await,
        },
        Command::Project { action } => match action {
            ProjectAction::Create {
                org,
                name,
                url,
                keywords,
            } => cmd_project_create(&org, &name, &url, &keywords).await,
            ProjectAction::List { org } => cmd_project_list(&org).await,
        },
        Command::Links { action } => match action {
            LinksAction::Verify { org, project } => cmd_links_verify(&org, &project).await,
        },
        Command::Backlinks { action } => match action {
            BacklinksAction::Sync {
                org,
                project,
                limit,
            } => cmd_backlinks_sync(&org, &project, limit).await,
        },
        Command::Email { action } => match action {
            EmailAction::Replied { org, email } => cmd_email_replied(&org, &email).await,
        },
        Command::Pipeline { org, project } => cmd_pipeline(&org, &project).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

async fn open_storage(config: &AppConfig) -> Result<Storage> {
    let path = expand_home(&config.defaults.database_path);
    Ok(Storage::open(&path).await?)
}

/// Reporting commands never write, so they open the database read-only.
async fn open_storage_readonly(config: &AppConfig) -> Result<Storage> {
    let path = expand_home(&config.defaults.database_path);
    if !path.exists() {
        return Err(eyre!(
            "no database at {}; create an organisation first",
            path.display()
        ));
    }
    Ok(Storage::open_readonly(&path).await?)
}

async fn require_project(storage: &Storage, project_id: &str, org_id: &str) -> Result<Project> {
    storage
        .get_project(project_id, org_id)
        .await?
        .ok_or_else(|| eyre!("project '{project_id}' not found for organisation '{org_id}'"))
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

async fn cmd_chat(org: &str, user: &str, project_id: &str, message: &str) -> Result<()> {
    let config = load_config()?;
    let model = model_from_config(&config.anthropic)?.ok_or_else(|| {
        eyre!(
            "no language model configured: set the {} environment variable",
            config.anthropic.api_key_env
        )
    })?;
    let storage = Arc::new(open_storage(&config).await?);
    let project = require_project(&storage, project_id, org).await?;

    let mut messages: Vec<ChatMessage> = storage
        .list_agent_messages(&project.id, org)
        .await?
        .into_iter()
        .map(|m| ChatMessage {
            role: match m.role {
                AgentRole::User => Role::User,
                AgentRole::Assistant => Role::Assistant,
            },
            content: m.content,
        })
        .collect();
    messages.push(ChatMessage::user(message));

    let collaborators = Collaborators::from_config(&config, Some(model.clone()))?;
    let dispatcher = ToolDispatcher::new(
        storage,
        collaborators,
        DispatcherSettings::from(&config),
    );
    let orchestrator = Orchestrator::new(model, dispatcher, OrchestratorConfig::from(&config));

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    info!(project_id, history = messages.len() - 1, "starting agent run");
    let identity = Identity {
        user_id: user.to_string(),
        org_id: org.to_string(),
    };
    let request = ChatRequest {
        project_id: project_id.to_string(),
        messages,
    };

    let progress = ChatProgress::new();
    let response = orchestrator
        .run(&identity, &request, Some(&cancel), &progress)
        .await;
    progress.finish();
    let response = response?;

    println!();
    println!("{}", response.message);
    if !response.tool_calls.is_empty() {
        println!();
        for call in &response.tool_calls {
            let mark = if call.success { "ok" } else { "failed" };
            println!("  {:<32} {mark}", call.tool);
        }
    }
    println!();

    Ok(())
}

/// Spinner that follows the agent's turns and tool calls.
struct ChatProgress {
    spinner: ProgressBar,
}

impl ChatProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl RunObserver for ChatProgress {
    fn turn_started(&self, turn: usize) {
        self.spinner.set_message(format!("Thinking (turn {turn})"));
    }

    fn tool_started(&self, tool: &str) {
        self.spinner.set_message(format!("Running {tool}"));
    }

    fn tool_finished(&self, tool: &str, success: bool) {
        if !success {
            self.spinner.println(format!("  {tool} failed"));
        }
    }
}

// ---------------------------------------------------------------------------
// Admin commands
// ---------------------------------------------------------------------------

async fn cmd_org_create(name: &str, plan: &str) -> Result<()> {
    let plan: PlanTier = plan.parse()?;
    let config = load_config()?;
    let storage = open_storage(&config).await?;

    let org = storage.create_organisation(name, plan).await?;
    info!(org_id = %org.id, plan = plan.as_str(), "organisation created");

    println!();
    println!("  Organisation created");
    println!("  ID:     {}", org.id);
    println!("  Name:   {}", org.name);
    println!("  Plan:   {} ({} prospects/month)", plan.as_str(), org.monthly_prospect_limit);
    println!();
    Ok(())
}

async fn cmd_project_create(org: &str, name: &str, url: &str, keywords: &[String]) -> Result<()> {
    let parsed = Url::parse(url).map_err(|e| eyre!("invalid URL '{url}': {e}"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(eyre!("project URL must be http or https: {url}"));
    }

    let config = load_config()?;
    let storage = open_storage(&config).await?;
    if storage.get_organisation(org).await?.is_none() {
        return Err(eyre!("organisation '{org}' not found"));
    }

    let keywords: Vec<String> = keywords
        .iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect();
    let project = storage
        .create_project(org, name, parsed.as_str(), &keywords)
        .await?;
    info!(project_id = %project.id, "project created");

    println!();
    println!("  Project created");
    println!("  ID:       {}", project.id);
    println!("  Name:     {}", project.name);
    println!("  Target:   {}", project.target_url);
    if !project.target_keywords.is_empty() {
        println!("  Keywords: {}", project.target_keywords.join(", "));
    }
    println!();
    Ok(())
}

async fn cmd_project_list(org: &str) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage_readonly(&config).await?;
    let projects = storage.list_projects(org).await?;

    if projects.is_empty() {
        println!("No projects for organisation '{org}'.");
        return Ok(());
    }
    for project in &projects {
        println!("{}  {:<24} {}", project.id, project.name, project.target_url);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Monitoring commands
// ---------------------------------------------------------------------------

async fn cmd_links_verify(org: &str, project_id: &str) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config).await?;
    let project = require_project(&storage, project_id, org).await?;
    let collaborators = Collaborators::from_config(&config, None)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_message(format!("Checking won links for {}", project.name));
    spinner.enable_steady_tick(Duration::from_millis(80));
    let report = verify_project_links(&project, &storage, &collaborators.verifier).await;
    spinner.finish_and_clear();
    let report = report?;

    if report.lost > 0 || report.errors > 0 {
        warn!(lost = report.lost, errors = report.errors, "some won links need attention");
    }

    println!();
    println!("  Checked: {}", report.checked);
    println!("  Live:    {}", report.live);
    println!("  Lost:    {}", report.lost);
    println!("  Errors:  {}", report.errors);
    println!();
    Ok(())
}

async fn cmd_backlinks_sync(org: &str, project_id: &str, limit: u32) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config).await?;
    let project = require_project(&storage, project_id, org).await?;
    let collaborators = Collaborators::from_config(&config, None)?;

    let report = sync_existing_backlinks(
        &project,
        &storage,
        collaborators.metrics.as_ref(),
        limit,
    )
    .await?;

    println!();
    println!("  Fetched: {}", report.fetched);
    println!("  Stored:  {}", report.stored);
    println!();
    Ok(())
}

async fn cmd_email_replied(org: &str, email_id: &str) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config).await?;

    if !storage.mark_email_replied(email_id, org, Utc::now()).await? {
        return Err(eyre!("email '{email_id}' not found for organisation '{org}'"));
    }
    println!("Reply recorded for email {email_id}");
    Ok(())
}

async fn cmd_pipeline(org: &str, project_id: &str) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage_readonly(&config).await?;
    let project = require_project(&storage, project_id, org).await?;

    let summary = pipeline_summary(&project.id, org, &storage).await?;
    let prospects = storage.list_prospects(&project.id, org, None).await?;
    let attention = classify_attention(&prospects, Utc::now());

    println!();
    println!("  {} ({} prospects)", project.name, summary.total_prospects);
    for (status, count) in &summary.stages {
        println!("    {:<26} {count}", status.as_str());
    }
    println!();
    println!("  Reply rate: {}%", summary.reply_rate);
    println!("  Win rate:   {}%", summary.win_rate);
    println!();
    println!("  Needs attention");
    println!("    no contact      {}", attention.summary.no_contact);
    println!("    stale           {}", attention.summary.stale);
    println!("    follow-up due   {}", attention.summary.followups_due);
    println!("    dead links      {}", attention.summary.dead_links);
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// Config commands
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
