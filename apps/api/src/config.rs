use anyhow::{Context, Result};

use crate::agent_client::AgentRole;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub agent_api_url: String,
    pub agent_api_key: String,
    pub research_agent_id: String,
    pub documents_agent_id: String,
    pub preparation_agent_id: String,
    pub copilot_agent_id: String,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            agent_api_url: require_env("AGENT_API_URL")?,
            agent_api_key: require_env("AGENT_API_KEY")?,
            research_agent_id: require_env("AGENT_RESEARCH_ID")?,
            documents_agent_id: require_env("AGENT_DOCUMENTS_ID")?,
            preparation_agent_id: require_env("AGENT_PREPARATION_ID")?,
            copilot_agent_id: require_env("AGENT_COPILOT_ID")?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Endpoint identifier for a logical agent role.
    /// The role-to-endpoint table is fixed at process start.
    pub fn agent_id(&self, role: AgentRole) -> &str {
        match role {
            AgentRole::Research => &self.research_agent_id,
            AgentRole::Documents => &self.documents_agent_id,
            AgentRole::Preparation => &self.preparation_agent_id,
            AgentRole::Copilot => &self.copilot_agent_id,
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}
