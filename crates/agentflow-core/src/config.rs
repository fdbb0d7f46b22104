use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FlowError, Result};
use crate::types::AgentDefinition;

/// Top-level agentflow configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    /// Local agent definitions used to sync agents missing on the backend.
    #[serde(default)]
    pub agents: Vec<AgentDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub api_keys: Vec<ApiKeyConfig>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            token: None,
            password: None,
            api_keys: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyConfig {
    pub name: String,
    pub key: String,
    #[serde(default)]
    pub role: ApiKeyRole,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyRole {
    /// List and read workflows
    Viewer,
    /// Create, edit, delete and execute
    #[default]
    Operator,
    /// Everything, including legacy migration
    Admin,
}

fn default_bind() -> String { "127.0.0.1:18790".to_string() }

/// Where workflows are persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database path. `~/` is expanded.
    #[serde(default = "default_store_path")]
    pub path: String,
    /// Base URL of a remote persistence gateway. Takes precedence over `path`.
    #[serde(default)]
    pub url: Option<String>,
    /// Bearer token sent to the remote gateway.
    #[serde(default)]
    pub token: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            url: None,
            token: None,
        }
    }
}

fn default_store_path() -> String { "~/.agentflow/workflows.db".to_string() }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
            retry: RetryConfig::default(),
        }
    }
}

fn default_base_url() -> String { "http://localhost:8001".to_string() }
fn default_request_timeout() -> u64 { 60 }

/// Retry configuration for idempotent backend requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

fn default_max_retries() -> u32 { 3 }
fn default_initial_backoff() -> u64 { 500 }
fn default_max_backoff() -> u64 { 10000 }

/// How a run reaches the backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Register the whole workflow and let the backend walk it.
    #[default]
    Remote,
    /// One `invoke` call per plan step, driven locally. Needs a backend that
    /// serves `POST /agents/{id}/invoke`.
    Stepwise,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub mode: ExecutionMode,
    #[serde(default = "default_step_timeout")]
    pub step_timeout_secs: u64,
    #[serde(default = "default_run_timeout")]
    pub run_timeout_secs: u64,
    #[serde(default = "default_sync_agents")]
    pub sync_agents: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::default(),
            step_timeout_secs: default_step_timeout(),
            run_timeout_secs: default_run_timeout(),
            sync_agents: default_sync_agents(),
        }
    }
}

fn default_step_timeout() -> u64 { 120 }
fn default_run_timeout() -> u64 { 600 }
fn default_sync_agents() -> bool { true }

impl AppConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| FlowError::ConfigNotFound(path.display().to_string()))?;
        Self::parse(&content)
    }

    /// Parse TOML text, expanding `${ENV_VAR}` references first.
    pub fn parse(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content);
        toml::from_str(&expanded).map_err(|e| FlowError::Config(e.to_string()))
    }

    /// Default config location: `~/.agentflow/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs_home().map(|home| home.join(".agentflow").join("config.toml"))
    }

    /// Resolve the SQLite path (expand ~).
    pub fn store_path(&self) -> PathBuf {
        expand_tilde(&self.store.path)
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs_home() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                // Unset variables stay literal
                Err(_) => result.push_str(&format!("${{{}}}", var_name)),
            }
        } else {
            result.push(c);
        }
    }
    result
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}
