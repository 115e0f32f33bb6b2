//! Configuration loading from coxswain.toml.

use std::path::{Path, PathBuf};
use std::time::Duration;

use runtime::{AnthropicAuth, SessionConfig};
use serde::Deserialize;

/// Top-level configuration. Everything is supplied at session start and
/// immutable thereafter.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Tool host settings.
    pub host: HostConfig,

    /// Decision backend settings.
    pub backend: BackendConfig,

    /// Orchestration settings.
    pub session: SessionSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: HostConfig::default(),
            backend: BackendConfig::default(),
            session: SessionSettings::default(),
        }
    }
}

/// Tool host configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Address the in-process tool host binds to.
    pub bind_addr: String,

    /// Workspace root the filesystem and shell tools operate in.
    pub workspace: PathBuf,

    /// Timeout for the execute_command tool, in seconds.
    pub command_timeout_secs: u64,

    /// Optional allowlist for execute_command (first token of the command).
    pub allowed_commands: Option<Vec<String>>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8731".to_string(),
            workspace: PathBuf::from("."),
            command_timeout_secs: 30,
            allowed_commands: None,
        }
    }
}

/// Decision backend configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Model to use.
    pub model: String,

    /// Standard Anthropic API key (sk-ant-api01-...).
    /// Mutually exclusive with oauth_token.
    pub api_key: Option<String>,

    /// Claude Code OAuth token (sk-ant-oat-...).
    /// Mutually exclusive with api_key.
    pub oauth_token: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-20250514".to_string(),
            api_key: None,
            oauth_token: None,
        }
    }
}

/// Orchestration settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Tool rounds allowed within one user turn.
    pub max_rounds: usize,

    /// Per-invocation tool deadline, in seconds.
    pub tool_timeout_secs: u64,

    /// Decision-policy call deadline, in seconds.
    pub policy_timeout_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_rounds: 8,
            tool_timeout_secs: 60,
            policy_timeout_secs: 120,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Resolve the backend authentication.
    ///
    /// Explicit config fields win; with neither set, the ANTHROPIC_API_KEY
    /// environment variable is classified by its token prefix.
    pub fn auth(&self) -> Result<AnthropicAuth, ConfigError> {
        match (&self.backend.api_key, &self.backend.oauth_token) {
            (Some(key), None) => Ok(AnthropicAuth::ApiKey(key.clone())),
            (None, Some(token)) => Ok(AnthropicAuth::ClaudeCodeOauth(token.clone())),
            (Some(_), Some(_)) => Err(ConfigError::AmbiguousAuth),
            (None, None) => std::env::var("ANTHROPIC_API_KEY")
                .map(AnthropicAuth::from_token)
                .map_err(|_| ConfigError::MissingAuth),
        }
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.session.tool_timeout_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.host.command_timeout_secs)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            max_rounds: self.session.max_rounds,
            policy_timeout: Duration::from_secs(self.session.policy_timeout_secs),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error(
        "authentication not configured: set backend.api_key, backend.oauth_token, or ANTHROPIC_API_KEY"
    )]
    MissingAuth,

    #[error(
        "ambiguous authentication: set either backend.api_key OR backend.oauth_token, not both"
    )]
    AmbiguousAuth,
}
