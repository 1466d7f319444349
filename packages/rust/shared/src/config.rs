//! Application configuration for LinkHunter.
//!
//! User config lives at `~/.linkhunter/linkhunter.toml`.
//! CLI flags override config file values, which override defaults.
//! Credentials are never stored in the file, only the names of the
//! environment variables that hold them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LinkHunterError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "linkhunter.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".linkhunter";

// ---------------------------------------------------------------------------
// Config structs (matching linkhunter.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Anthropic (language model) settings.
    #[serde(default)]
    pub anthropic: AnthropicConfig,

    /// DataForSEO domain metrics settings.
    #[serde(default)]
    pub dataforseo: DataForSeoConfig,

    /// Google Custom Search settings.
    #[serde(default)]
    pub google_search: GoogleSearchConfig,

    /// Hunter.io contact finder settings.
    #[serde(default)]
    pub hunter: HunterConfig,

    /// Prospect discovery defaults.
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Bulk import validation thresholds.
    #[serde(default)]
    pub import_validation: ImportValidationConfig,

    /// Link verification settings.
    #[serde(default)]
    pub verification: VerificationConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Path to the libSQL database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Maximum model calls per agent run.
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            max_turns: default_max_turns(),
        }
    }
}

fn default_database_path() -> String {
    "~/.linkhunter/linkhunter.db".into()
}
fn default_max_turns() -> usize {
    10
}

/// `[anthropic]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    /// Name of the env var holding the API key.
    #[serde(default = "default_anthropic_key_env")]
    pub api_key_env: String,

    /// Model used for the agent loop, drafting, and site analysis.
    #[serde(default = "default_model")]
    pub model: String,

    /// Maximum output tokens per agent turn.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Per-request timeout in seconds.
    #[serde(default = "default_model_timeout")]
    pub timeout_secs: u64,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_anthropic_key_env(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_model_timeout(),
        }
    }
}

fn default_anthropic_key_env() -> String {
    "ANTHROPIC_API_KEY".into()
}
fn default_model() -> String {
    "claude-sonnet-4-6".into()
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_model_timeout() -> u64 {
    120
}

/// `[dataforseo]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataForSeoConfig {
    #[serde(default = "default_dfs_login_env")]
    pub login_env: String,
    #[serde(default = "default_dfs_password_env")]
    pub password_env: String,
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
}

impl Default for DataForSeoConfig {
    fn default() -> Self {
        Self {
            login_env: default_dfs_login_env(),
            password_env: default_dfs_password_env(),
            timeout_secs: default_provider_timeout(),
        }
    }
}

fn default_dfs_login_env() -> String {
    "DATAFORSEO_LOGIN".into()
}
fn default_dfs_password_env() -> String {
    "DATAFORSEO_PASSWORD".into()
}
fn default_provider_timeout() -> u64 {
    15
}

/// `[google_search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleSearchConfig {
    #[serde(default = "default_cse_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_cse_id_env")]
    pub cse_id_env: String,
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

impl Default for GoogleSearchConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_cse_key_env(),
            cse_id_env: default_cse_id_env(),
            timeout_secs: default_search_timeout(),
        }
    }
}

fn default_cse_key_env() -> String {
    "GOOGLE_CSE_API_KEY".into()
}
fn default_cse_id_env() -> String {
    "GOOGLE_CSE_ID".into()
}
fn default_search_timeout() -> u64 {
    10
}

/// `[hunter]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HunterConfig {
    #[serde(default = "default_hunter_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

impl Default for HunterConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_hunter_key_env(),
            timeout_secs: default_search_timeout(),
        }
    }
}

fn default_hunter_key_env() -> String {
    "HUNTER_API_KEY".into()
}

/// `[discovery]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Candidate limit when the caller gives none.
    #[serde(default = "default_discovery_limit")]
    pub default_limit: usize,

    /// Maximum search queries per discovery run.
    #[serde(default = "default_max_queries")]
    pub max_queries: usize,

    /// Search country code passed to the search provider.
    #[serde(default = "default_country")]
    pub country: String,

    /// Region term appended to generated queries (e.g. "UK").
    #[serde(default = "default_region_term")]
    pub region_term: String,

    /// Candidates with a higher spam score are dropped.
    #[serde(default = "default_max_spam")]
    pub max_spam_score: u32,

    /// Candidates below this domain rating are dropped.
    #[serde(default)]
    pub min_da: u32,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            default_limit: default_discovery_limit(),
            max_queries: default_max_queries(),
            country: default_country(),
            region_term: default_region_term(),
            max_spam_score: default_max_spam(),
            min_da: 0,
        }
    }
}

fn default_discovery_limit() -> usize {
    30
}
fn default_max_queries() -> usize {
    20
}
fn default_country() -> String {
    "GB".into()
}
fn default_region_term() -> String {
    "UK".into()
}
fn default_max_spam() -> u32 {
    30
}

/// `[import_validation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportValidationConfig {
    /// Below this domain rating a URL lands in the review bucket.
    #[serde(default = "default_import_min_da")]
    pub min_da: u32,

    /// Above this spam score a URL fails.
    #[serde(default = "default_max_spam")]
    pub max_spam_score: u32,
}

impl Default for ImportValidationConfig {
    fn default() -> Self {
        Self {
            min_da: default_import_min_da(),
            max_spam_score: default_max_spam(),
        }
    }
}

fn default_import_min_da() -> u32 {
    10
}

/// `[verification]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// Per-page fetch timeout in seconds.
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,

    /// Allow fetching localhost/private addresses (local testing only).
    #[serde(default)]
    pub allow_private_hosts: bool,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_provider_timeout(),
            allow_private_hosts: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.linkhunter/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| LinkHunterError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.linkhunter/linkhunter.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| LinkHunterError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        LinkHunterError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| LinkHunterError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| LinkHunterError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| LinkHunterError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read a credential from the named environment variable.
///
/// Unset or empty variables yield `None`, which callers treat as
/// "provider not configured".
pub fn resolve_secret(env_name: &str) -> Option<String> {
    match std::env::var(env_name) {
        Ok(val) if !val.trim().is_empty() => Some(val),
        _ => None,
    }
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}
