//! Configuration error types.

/// Result type alias for config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur during configuration loading and resolution.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read a config file.
    #[error("failed to read config file '{path}': {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },

    /// Failed to parse YAML.
    #[error("failed to parse YAML config: {0}")]
    ParseYaml(String),

    /// Failed to read a `.env` file.
    #[error("failed to read env file '{path}': {message}")]
    EnvFile { path: String, message: String },

    /// A setting holds a value that cannot be used.
    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    /// Agent id is not a hyphenated UUID.
    #[error("invalid agent UUID '{0}' (expected xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx)")]
    InvalidAgentUuid(String),

    /// Missing required setting.
    #[error("missing required setting '{field}': {hint}")]
    MissingField { field: String, hint: String },
}

impl ConfigError {
    pub(crate) fn invalid(key: &str, value: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}
