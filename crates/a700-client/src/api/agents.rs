//! Agents API.

use crate::client::A700Client;
use crate::error::Result;
use crate::types::{AgentConfig, AgentDetail};

/// Agents API client.
pub struct AgentsApi {
    client: A700Client,
}

impl AgentsApi {
    pub(crate) fn new(client: A700Client) -> Self {
        Self { client }
    }

    /// Fetch an agent and derive its configuration from the latest revision.
    pub async fn get(&self, agent_id: &str) -> Result<AgentConfig> {
        let detail: AgentDetail = self.client.get(&format!("agents/{}", agent_id)).await?;

        match detail.latest_revision() {
            Some(revision) => Ok(AgentConfig::from(revision)),
            None => {
                tracing::warn!(agent_id, "agent has no revisions, using default configuration");
                Ok(AgentConfig::default())
            }
        }
    }
}
