//! Client error types.

use thiserror::Error;

/// Error from a plain SDK call (login, agent lookup, ...).
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server returned an error response.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body or server message.
        message: String,
    },

    /// Authentication failed.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_)) || matches!(self, Error::Api { status: 404, .. })
    }

    /// Check if this is an authentication error.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Error::Auth(_)) || matches!(self, Error::Api { status: 401, .. })
    }

    /// Check if this is a server error.
    pub fn is_server_error(&self) -> bool {
        matches!(self, Error::Api { status, .. } if *status >= 500)
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a chat exchange produced no usable reply.
///
/// This is the single error channel of an exchange: every fault inside the
/// streaming session or the blocking call ends up here, and its `Display`
/// text is what the user sees.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExchangeError {
    /// The streaming transport could not be established.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The service rejected the credential.
    #[error("Authentication failed - token invalid or expired")]
    Auth,

    /// The credential is valid but may not use this agent.
    #[error("Agent access error - check agent permissions ({0})")]
    Access(String),

    /// The service reported an error event.
    #[error("WebSocket error: {0}")]
    Protocol(String),

    /// No terminal signal arrived within the response budget.
    #[error("Response timed out")]
    Timeout,

    /// The connection ended before the reply was complete.
    #[error("Response incomplete")]
    Incomplete,

    /// The caller aborted the exchange.
    #[error("Cancelled")]
    Cancelled,

    /// The agent kept requesting tools past the round limit.
    #[error("Tool loop exceeded {0} rounds")]
    ToolLoop(usize),

    /// Blocking call returned a non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Blocking call succeeded but carried an error field.
    #[error("API Error: {0}")]
    Api(String),

    /// Blocking call succeeded but no reply text was found.
    #[error("No content found in response")]
    EmptyResponse,

    /// Request never completed (network, decode, ...).
    #[error("{0}")]
    Transport(String),
}

impl ExchangeError {
    /// Whether the blocking transport should be tried instead.
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, ExchangeError::Connection(_))
    }
}

impl From<reqwest::Error> for ExchangeError {
    fn from(e: reqwest::Error) -> Self {
        ExchangeError::Transport(e.to_string())
    }
}

/// Result of one exchange.
pub type ExchangeResult = std::result::Result<crate::types::AgentReply, ExchangeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exchange_error_display() {
        assert_eq!(ExchangeError::Timeout.to_string(), "Response timed out");
        assert_eq!(
            ExchangeError::Connection("refused".into()).to_string(),
            "Connection failed: refused"
        );
        assert_eq!(
            ExchangeError::Status {
                status: 502,
                body: "bad gateway".into()
            }
            .to_string(),
            "HTTP 502: bad gateway"
        );
    }

    #[test]
    fn test_only_connection_failures_fall_back() {
        assert!(ExchangeError::Connection("x".into()).is_connection_failure());
        assert!(!ExchangeError::Timeout.is_connection_failure());
        assert!(!ExchangeError::Protocol("x".into()).is_connection_failure());
        assert!(!ExchangeError::Auth.is_connection_failure());
    }

    #[test]
    fn test_error_predicates() {
        let err = Error::Api {
            status: 401,
            message: "nope".into(),
        };
        assert!(err.is_auth_error());
        assert!(!err.is_not_found());

        let err = Error::Api {
            status: 503,
            message: "down".into(),
        };
        assert!(err.is_server_error());
    }
}
