//! Main client implementation.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use url::Url;

use crate::api::{AgentsApi, AuthApi, ChatApi};
use crate::error::{Error, Result};
use crate::fingerprint;

/// Default timeout for requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for a blocking chat call.
const DEFAULT_CHAT_TIMEOUT: Duration = Duration::from_secs(300);

/// Agent700 API client.
///
/// Cheap to clone; all clones share one connection pool.
///
/// # Example
///
/// ```no_run
/// use a700_client::A700Client;
///
/// # async fn example() -> a700_client::Result<()> {
/// let client = A700Client::builder()
///     .base_url("https://api.agent700.ai")
///     .access_token("secret")
///     .build()?;
///
/// let agent = client.agents().get("00000000-0000-0000-0000-000000000000").await?;
/// println!("{}", agent.agent_name);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct A700Client {
    inner: Arc<ClientInner>,
}

/// Inner client state (shared across clones).
pub(crate) struct ClientInner {
    pub(crate) http: reqwest::Client,
    /// API root, always ending in `/api/`.
    pub(crate) base_url: Url,
    pub(crate) access_token: Option<String>,
    pub(crate) timeout: Duration,
    pub(crate) chat_timeout: Duration,
}

impl A700Client {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Get the API root URL.
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Bearer token this client authenticates with, if any.
    pub fn access_token(&self) -> Option<&str> {
        self.inner.access_token.as_deref()
    }

    /// Timeout applied to a blocking chat call.
    pub fn chat_timeout(&self) -> Duration {
        self.inner.chat_timeout
    }

    /// Timeout applied to ordinary requests.
    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    /// A new client with the same settings and a different token.
    pub fn with_access_token(&self, token: impl Into<String>) -> Result<Self> {
        ClientBuilder::new()
            .base_url(self.inner.base_url.as_str())
            .access_token(token)
            .timeout(self.inner.timeout)
            .chat_timeout(self.inner.chat_timeout)
            .build()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // API accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Access the auth API.
    pub fn auth(&self) -> AuthApi {
        AuthApi::new(self.clone())
    }

    /// Access the agents API.
    pub fn agents(&self) -> AgentsApi {
        AgentsApi::new(self.clone())
    }

    /// Access the blocking chat API.
    pub fn chat(&self) -> ChatApi {
        ChatApi::new(self.clone())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal HTTP methods
    // ─────────────────────────────────────────────────────────────────────────

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.inner.http
    }

    /// Build a URL for an API path.
    pub(crate) fn url(&self, path: &str) -> Result<Url> {
        let path = path.trim_start_matches('/');
        self.inner.base_url.join(path).map_err(Error::from)
    }

    /// Make a GET request.
    pub(crate) async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path)?;
        let response = self
            .inner
            .http
            .get(url)
            .timeout(self.inner.timeout)
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Make a POST request and send it, without inspecting the status.
    pub(crate) async fn post_raw<B>(
        &self,
        path: &str,
        body: &B,
        timeout: Duration,
    ) -> Result<reqwest::Response>
    where
        B: serde::Serialize + ?Sized,
    {
        let url = self.url(path)?;
        Ok(self
            .inner
            .http
            .post(url)
            .json(body)
            .timeout(timeout)
            .send()
            .await?)
    }

    /// Handle a response, extracting the body or error.
    pub(crate) async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            Err(self.extract_error(response).await)
        }
    }

    /// Extract an error from a failed response.
    pub(crate) async fn extract_error(&self, response: reqwest::Response) -> Error {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();

        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| {
                v.get("error")
                    .or_else(|| v.get("message"))
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| {
                if body.is_empty() {
                    format!("HTTP {}", status)
                } else {
                    body
                }
            });

        match status {
            401 => Error::Auth(message),
            404 => Error::NotFound(message),
            _ => Error::Api { status, message },
        }
    }
}

/// Normalize a user-supplied base URL to the API root (`.../api/`).
pub(crate) fn api_root(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw)?;
    let trimmed = url.path().trim_end_matches('/').to_string();
    let path = if trimmed.ends_with("/api") {
        format!("{}/", trimmed)
    } else {
        format!("{}/api/", trimmed)
    };
    url.set_path(&path);
    Ok(url)
}

/// Builder for creating an A700Client.
#[derive(Debug)]
pub struct ClientBuilder {
    base_url: Option<String>,
    access_token: Option<String>,
    timeout: Duration,
    chat_timeout: Duration,
    user_agent: Option<String>,
}

impl ClientBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            base_url: None,
            access_token: None,
            timeout: DEFAULT_TIMEOUT,
            chat_timeout: DEFAULT_CHAT_TIMEOUT,
            user_agent: None,
        }
    }

    /// Set the service URL. `/api` is appended when missing.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the bearer token.
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the blocking chat timeout.
    pub fn chat_timeout(mut self, timeout: Duration) -> Self {
        self.chat_timeout = timeout;
        self
    }

    /// Set a custom user agent.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<A700Client> {
        let base_url = self
            .base_url
            .ok_or_else(|| Error::Config("base_url is required".to_string()))?;
        let base_url = api_root(&base_url)?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        for (name, value) in fingerprint::device_headers() {
            let value = HeaderValue::from_str(&value)
                .map_err(|_| Error::Config(format!("invalid header value for {}", name)))?;
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| Error::Config(format!("invalid header name {}", name)))?;
            headers.insert(name, value);
        }

        if let Some(token) = &self.access_token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| Error::Config("Invalid access token".to_string()))?;
            headers.insert(AUTHORIZATION, value);
        }

        let user_agent = self
            .user_agent
            .unwrap_or_else(|| format!("A700cli/{}", env!("CARGO_PKG_VERSION")));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(user_agent)
            .build()?;

        Ok(A700Client {
            inner: Arc::new(ClientInner {
                http,
                base_url,
                access_token: self.access_token,
                timeout: self.timeout,
                chat_timeout: self.chat_timeout,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
