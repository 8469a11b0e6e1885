use crate::supabase::{SupabaseClient, SupabaseError};
use async_trait::async_trait;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AgentVerification {
    Verified,
    Pending,
    Unknown,
}

impl AgentVerification {
    pub fn from_status(status: Option<&str>) -> Self {
        match status.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("verified") | Some("approved") => AgentVerification::Verified,
            Some(_) => AgentVerification::Pending,
            None => AgentVerification::Unknown,
        }
    }
}

/// Answers whether an account may open the listing wizard.
#[async_trait]
pub trait AgentDirectory: Send + Sync {
    async fn verification(&self, account_id: &str) -> Result<AgentVerification, SupabaseError>;
}

pub struct SupabaseAgentDirectory {
    client: SupabaseClient,
}

impl SupabaseAgentDirectory {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AgentDirectory for SupabaseAgentDirectory {
    async fn verification(&self, account_id: &str) -> Result<AgentVerification, SupabaseError> {
        let profile = self.client.fetch_agent_profile(account_id).await?;
        Ok(match profile {
            Some(row) => AgentVerification::from_status(row.verification_status.as_deref()),
            None => AgentVerification::Unknown,
        })
    }
}

/// Used when no profile store is configured: everyone counts as verified.
pub struct OpenAgentDirectory;

#[async_trait]
impl AgentDirectory for OpenAgentDirectory {
    async fn verification(&self, _account_id: &str) -> Result<AgentVerification, SupabaseError> {
        Ok(AgentVerification::Verified)
    }
}
