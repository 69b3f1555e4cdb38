/// `load_config` module: builds the process-wide [`AppConfig`] from an optional static YAML
/// file plus secrets taken from the environment.
///
/// The YAML file never carries credentials. Every YAML field is optional and falls back to
/// the production default, so running without `--config` is valid. Secrets are read from
/// `GITHUB_TOKEN`, `GITHUB_USERNAME` and `LLM_API_TOKEN` (a `.env` file is loaded by
/// `main` before this runs); a missing secret is a load error.
///
/// # Errors
/// All errors use `anyhow::Error` with context and surface at the CLI boundary.
use std::env;
use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use pagesmith_core::settings::PipelineSettings;
use serde::Deserialize;
use tracing::{error, info};

pub const GITHUB_TOKEN_VAR: &str = "GITHUB_TOKEN";
pub const GITHUB_USERNAME_VAR: &str = "GITHUB_USERNAME";
pub const LLM_API_TOKEN_VAR: &str = "LLM_API_TOKEN";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GitHubSection {
    pub api_url: String,
    /// Domain under which `https://<owner>.<pages_domain>/<repo>/` sites are served.
    pub pages_domain: String,
}

impl Default for GitHubSection {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".into(),
            pages_domain: "github.io".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// OpenAI-compatible chat-completions endpoint.
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            endpoint: "https://aipipe.org/openrouter/v1/chat/completions".into(),
            model: "gpt-4o-mini".into(),
            temperature: 0.3,
            max_tokens: 8000,
            timeout_secs: 500,
        }
    }
}

/// Shape of the static YAML file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub github: GitHubSection,
    pub llm: LlmSection,
    pub pipeline: PipelineSettings,
}

#[derive(Clone)]
pub struct Secrets {
    pub github_token: String,
    pub github_username: String,
    pub llm_api_token: String,
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("github_token", &"<redacted>")
            .field("github_username", &self.github_username)
            .field("llm_api_token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub github: GitHubSection,
    pub llm: LlmSection,
    pub pipeline: PipelineSettings,
    pub secrets: Secrets,
}

fn required_env(name: &str) -> Result<String> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => {
            error!(variable = name, "Required secret missing from environment");
            Err(anyhow!("environment variable {name} must be set"))
        }
    }
}

/// Reads secrets from the environment.
pub fn load_secrets() -> Result<Secrets> {
    Ok(Secrets {
        github_token: required_env(GITHUB_TOKEN_VAR)?,
        github_username: required_env(GITHUB_USERNAME_VAR)?,
        llm_api_token: required_env(LLM_API_TOKEN_VAR)?,
    })
}

/// Parses the static YAML file, or returns defaults when no path is given.
pub fn load_file_config(path: Option<&Path>) -> Result<FileConfig> {
    let Some(path) = path else {
        info!("No config file given, using defaults");
        return Ok(FileConfig::default());
    };
    info!(config_path = ?path, "Loading configuration from file");

    let content = fs::read_to_string(path).map_err(|e| {
        error!(error = ?e, config_path = ?path, "Failed to read config file");
        anyhow!("Failed to read config file {:?}: {}", path, e)
    })?;

    // An empty file deserialises as YAML null.
    if content.trim().is_empty() {
        return Ok(FileConfig::default());
    }

    let parsed: FileConfig = serde_yaml::from_str(&content).map_err(|e| {
        error!(error = ?e, config_path = ?path, "Failed to parse config YAML");
        anyhow!("Failed to parse config YAML: {e}")
    })?;
    info!(config_path = ?path, "Parsed config YAML successfully");
    Ok(parsed)
}

/// Static file config plus environment secrets.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let file = load_file_config(path)?;
    let secrets = load_secrets().context("loading secrets")?;
    file.pipeline.trace_loaded();
    info!(
        api_url = %file.github.api_url,
        model = %file.llm.model,
        owner = %secrets.github_username,
        "Configuration loaded"
    );
    Ok(AppConfig {
        github: file.github,
        llm: file.llm,
        pipeline: file.pipeline,
        secrets,
    })
}
