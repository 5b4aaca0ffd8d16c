//! Configuration types and layered resolution.
//!
//! ```yaml
//! # ~/.config/a700/config.yaml
//! api-base-url: https://api.agent700.ai
//! email: me@example.com
//! agent-uuid: 6f1c2a34-0b7e-4c55-9d0e-2f3a4b5c6d7e
//! streaming: true
//! response-timeout: 300
//! max-history-chars: 300000
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

/// Service used when nothing else is configured.
pub const DEFAULT_API_BASE_URL: &str = "https://api.agent700.ai";
pub const DEFAULT_RESPONSE_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_CONNECT_WAIT_SECS: u64 = 10;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_HISTORY_CHARS: usize = 300_000;
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 5;

/// Environment variables read during resolution.
pub mod env {
    pub const API_BASE_URL: &str = "API_BASE_URL";
    pub const EMAIL: &str = "EMAIL";
    pub const PASSWORD: &str = "PASSWORD";
    pub const AGENT_UUID: &str = "AGENT_UUID";
    pub const STREAMING: &str = "A700_STREAMING";
    pub const TIMEOUT: &str = "A700_TIMEOUT";
}

// ─────────────────────────────────────────────────────────────────────────────
// File layer
// ─────────────────────────────────────────────────────────────────────────────

/// Contents of `config.yaml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// Accepted, but better kept in the environment.
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub agent_uuid: Option<String>,
    #[serde(default)]
    pub streaming: Option<bool>,
    /// Seconds.
    #[serde(default)]
    pub response_timeout: Option<u64>,
    /// Seconds.
    #[serde(default)]
    pub connect_wait: Option<u64>,
    /// Seconds.
    #[serde(default)]
    pub request_timeout: Option<u64>,
    #[serde(default)]
    pub max_history_chars: Option<usize>,
    #[serde(default)]
    pub max_tool_rounds: Option<usize>,
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl FileConfig {
    /// Parse from a YAML string.
    pub fn from_yaml(yaml_str: &str) -> Result<Self> {
        // An empty file is an empty config, not a parse error.
        if yaml_str.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml_str).map_err(|e| ConfigError::ParseYaml(e.to_string()))
    }

    /// Serialize to a YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::ParseYaml(e.to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command-line layer
// ─────────────────────────────────────────────────────────────────────────────

/// Values given on the command line. These win over everything else.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_base_url: Option<String>,
    pub agent_uuid: Option<String>,
    pub streaming: Option<bool>,
    /// Response timeout in seconds.
    pub timeout: Option<u64>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Resolved config
// ─────────────────────────────────────────────────────────────────────────────

/// Fully resolved configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct A700Config {
    pub api_base_url: String,
    pub email: Option<String>,
    pub password: Option<String>,
    pub agent_uuid: Option<String>,
    pub streaming: bool,
    pub response_timeout: Duration,
    pub connect_wait: Duration,
    pub request_timeout: Duration,
    pub max_history_chars: usize,
    pub max_tool_rounds: usize,
    /// Where conversation and session files live.
    pub data_dir: PathBuf,
}

impl Default for A700Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            email: None,
            password: None,
            agent_uuid: None,
            streaming: false,
            response_timeout: Duration::from_secs(DEFAULT_RESPONSE_TIMEOUT_SECS),
            connect_wait: Duration::from_secs(DEFAULT_CONNECT_WAIT_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_history_chars: DEFAULT_MAX_HISTORY_CHARS,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            data_dir: crate::discovery::default_data_dir(),
        }
    }
}

impl A700Config {
    /// Layer file, environment and command-line values over the defaults.
    ///
    /// `lookup` reads one environment variable; passing a closure keeps
    /// resolution independent of the process environment.
    pub fn resolve<F>(file: &FileConfig, lookup: F, overrides: &Overrides) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        // File
        if let Some(url) = &file.api_base_url {
            config.api_base_url = url.clone();
        }
        config.email = file.email.clone();
        config.password = file.password.clone();
        config.agent_uuid = file.agent_uuid.clone();
        if let Some(streaming) = file.streaming {
            config.streaming = streaming;
        }
        if let Some(secs) = file.response_timeout {
            config.response_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = file.connect_wait {
            config.connect_wait = Duration::from_secs(secs);
        }
        if let Some(secs) = file.request_timeout {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(chars) = file.max_history_chars {
            config.max_history_chars = chars;
        }
        if let Some(rounds) = file.max_tool_rounds {
            config.max_tool_rounds = rounds;
        }
        if let Some(dir) = &file.data_dir {
            config.data_dir = dir.clone();
        }

        // Environment
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(url) = non_empty(env::API_BASE_URL) {
            config.api_base_url = url;
        }
        if let Some(email) = non_empty(env::EMAIL) {
            config.email = Some(email);
        }
        if let Some(password) = non_empty(env::PASSWORD) {
            config.password = Some(password);
        }
        if let Some(agent) = non_empty(env::AGENT_UUID) {
            config.agent_uuid = Some(agent);
        }
        if let Some(raw) = non_empty(env::STREAMING) {
            config.streaming = parse_bool(env::STREAMING, &raw)?;
        }
        if let Some(raw) = non_empty(env::TIMEOUT) {
            config.response_timeout = Duration::from_secs(parse_secs(env::TIMEOUT, &raw)?);
        }

        // Command line
        if let Some(url) = &overrides.api_base_url {
            config.api_base_url = url.clone();
        }
        if let Some(agent) = &overrides.agent_uuid {
            config.agent_uuid = Some(agent.clone());
        }
        if let Some(streaming) = overrides.streaming {
            config.streaming = streaming;
        }
        if let Some(secs) = overrides.timeout {
            config.response_timeout = Duration::from_secs(secs);
        }

        config.api_base_url = config.api_base_url.trim_end_matches('/').to_string();
        config.validate()?;
        Ok(config)
    }

    /// Check invariants that every caller relies on.
    pub fn validate(&self) -> Result<()> {
        if !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://"))
        {
            return Err(ConfigError::invalid(
                "api-base-url",
                &self.api_base_url,
                "must start with http:// or https://",
            ));
        }
        if let Some(agent) = &self.agent_uuid {
            validate_agent_uuid(agent)?;
        }
        if self.response_timeout.is_zero() {
            return Err(ConfigError::invalid("response-timeout", "0", "must be positive"));
        }
        if self.max_tool_rounds == 0 {
            return Err(ConfigError::invalid("max-tool-rounds", "0", "must be positive"));
        }
        Ok(())
    }

    /// The agent id, or an error telling the user how to set one.
    pub fn require_agent(&self) -> Result<&str> {
        self.agent_uuid
            .as_deref()
            .ok_or_else(|| ConfigError::MissingField {
                field: "agent-uuid".to_string(),
                hint: "set AGENT_UUID, agent-uuid in config.yaml, or pass --agent".to_string(),
            })
    }
}

/// Accept only the canonical hyphenated form, e.g.
/// `6f1c2a34-0b7e-4c55-9d0e-2f3a4b5c6d7e`.
pub fn validate_agent_uuid(value: &str) -> Result<()> {
    let hyphenated = value.len() == 36
        && value
            .char_indices()
            .all(|(i, c)| matches!(i, 8 | 13 | 18 | 23) == (c == '-'));
    if hyphenated && uuid::Uuid::parse_str(value).is_ok() {
        Ok(())
    } else {
        Err(ConfigError::InvalidAgentUuid(value.to_string()))
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(key, raw, "expected true or false")),
    }
}

fn parse_secs(key: &str, raw: &str) -> Result<u64> {
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::invalid(key, raw, "must be positive")),
        Ok(secs) => Ok(secs),
        Err(_) => Err(ConfigError::invalid(key, raw, "expected whole seconds")),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
