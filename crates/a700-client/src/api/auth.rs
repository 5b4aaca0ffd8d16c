//! Auth API: login and token refresh.

use reqwest::header::{COOKIE, HeaderMap, SET_COOKIE};

use crate::client::A700Client;
use crate::error::{Error, Result};
use crate::types::{Credentials, LoginRequest, TokenResponse};

/// Auth API client.
pub struct AuthApi {
    client: A700Client,
}

impl AuthApi {
    pub(crate) fn new(client: A700Client) -> Self {
        Self { client }
    }

    /// Log in with email and password.
    ///
    /// The refresh cookie set by the server is captured alongside the token.
    pub async fn login(&self, email: &str, password: &str) -> Result<Credentials> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let response = self
            .client
            .post_raw("auth/login", &body, self.client.timeout())
            .await?;

        if !response.status().is_success() {
            return Err(self.client.extract_error(response).await);
        }

        let cookies = collect_cookies(response.headers());
        let token: TokenResponse = response.json().await?;
        tracing::debug!(cookies = cookies.len(), "login succeeded");

        Ok(Credentials {
            access_token: token.access_token,
            cookies,
        })
    }

    /// Exchange stored refresh cookies for a new access token.
    pub async fn refresh(&self, cookies: &[String]) -> Result<String> {
        if cookies.is_empty() {
            return Err(Error::Auth("no refresh cookie stored".to_string()));
        }

        let url = self.client.url("auth/refresh")?;
        let response = self
            .client
            .http()
            .post(url)
            .header(COOKIE, cookies.join("; "))
            .timeout(self.client.timeout())
            .send()
            .await?;

        let token: TokenResponse = self.client.handle_response(response).await?;
        tracing::debug!("access token refreshed");
        Ok(token.access_token)
    }
}

/// Keep the `name=value` part of every `Set-Cookie` header.
fn collect_cookies(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}
