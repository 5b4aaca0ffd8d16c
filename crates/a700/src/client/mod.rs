//! Authenticated access to the Agent700 API.
//!
//! Builds an [`A700Client`] from the resolved configuration, reusing the
//! stored session when there is one, logging in when there is not, and
//! refreshing the token once when the service rejects it.

use std::io::{BufRead, Write};

use a700_client::{A700Client, AgentConfig};
use a700_config::A700Config;
use a700_session::{SessionData, SessionStore};
use anyhow::{Context as _, Result, anyhow};

/// An authenticated client bound to one agent.
pub struct Connection {
    pub client: A700Client,
    pub agent_id: String,
    pub agent: AgentConfig,
    /// Same client without credentials, for auth calls.
    pub base: A700Client,
    pub store: SessionStore,
}

impl Connection {
    /// Replace a rejected access token and rebuild the client with the new
    /// one.
    pub async fn reauthenticate(&mut self, config: &A700Config) -> Result<()> {
        let session = self.store.load_or_default();
        let token = renew_token(config, &self.base, &self.store, &session).await?;
        self.client = self.base.with_access_token(token)?;
        Ok(())
    }
}

/// Client without credentials, configured from `config`.
pub fn base_client(config: &A700Config) -> Result<A700Client> {
    A700Client::builder()
        .base_url(&config.api_base_url)
        .timeout(config.request_timeout)
        .chat_timeout(config.response_timeout)
        .build()
        .context("Invalid API configuration")
}

/// Authenticate and load the configured agent.
pub async fn connect(config: &A700Config) -> Result<Connection> {
    let agent_id = config.require_agent()?.to_string();
    let base = base_client(config)?;
    let store = SessionStore::new(&config.data_dir);

    let mut session = store.load_or_default();
    if !session.is_authenticated() {
        session = login(config, &base, &store).await?;
    }

    let token = session.access_token.clone().unwrap_or_default();
    let mut client = base.with_access_token(token)?;

    let agent = match client.agents().get(&agent_id).await {
        Ok(agent) => agent,
        Err(e) if e.is_auth_error() => {
            tracing::info!("access token rejected, refreshing");
            let token = renew_token(config, &base, &store, &session).await?;
            client = base.with_access_token(token)?;
            client
                .agents()
                .get(&agent_id)
                .await
                .with_context(|| format!("Failed to load agent {}", agent_id))?
        }
        Err(e) => {
            return Err(anyhow::Error::new(e))
                .with_context(|| format!("Failed to load agent {}", agent_id));
        }
    };

    store.update(SessionData {
        agent_uuid: Some(agent_id.clone()),
        ..Default::default()
    })?;
    tracing::debug!(agent = %agent.agent_name, model = %agent.model, "agent loaded");

    Ok(Connection {
        client,
        agent_id,
        agent,
        base,
        store,
    })
}

/// Log in with the configured credentials (prompting for what is missing)
/// and store the new session.
pub async fn login(
    config: &A700Config,
    base: &A700Client,
    store: &SessionStore,
) -> Result<SessionData> {
    let email = match &config.email {
        Some(email) => email.clone(),
        None => prompt_line("Email: ")?,
    };
    let password = match &config.password {
        Some(password) => password.clone(),
        None => rpassword::prompt_password("Password: ").context("Failed to read password")?,
    };
    if email.is_empty() || password.is_empty() {
        return Err(anyhow!("Email and password are required to log in"));
    }

    let credentials = base
        .auth()
        .login(&email, &password)
        .await
        .context("Login failed")?;
    tracing::info!(email = %email, "logged in");

    let session = SessionData::from_credentials(credentials);
    store.save(&session).context("Failed to save session")?;
    Ok(session)
}

/// New access token: refresh with the stored cookies, else log in again.
async fn renew_token(
    config: &A700Config,
    base: &A700Client,
    store: &SessionStore,
    session: &SessionData,
) -> Result<String> {
    match base.auth().refresh(&session.cookies).await {
        Ok(token) => {
            store.update(SessionData {
                access_token: Some(token.clone()),
                ..Default::default()
            })?;
            Ok(token)
        }
        Err(e) => {
            tracing::debug!(error = %e, "token refresh failed, logging in again");
            let session = login(config, base, store).await?;
            session
                .access_token
                .ok_or_else(|| anyhow!("Login returned no access token"))
        }
    }
}

fn prompt_line(prompt: &str) -> Result<String> {
    print!("{}", prompt);
    std::io::stdout().flush()?;
    let mut input = String::new();
    std::io::stdin().lock().read_line(&mut input)?;
    Ok(input.trim().to_string())
}
