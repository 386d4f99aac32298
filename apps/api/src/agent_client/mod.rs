/// Agent client — the single point of entry for all remote agent calls.
///
/// ARCHITECTURAL RULE: no other module may talk to the agent service
/// directly. Pipeline stages and the copilot go through `AgentGateway`;
/// attachment uploads go through `AttachmentStore`.
///
/// Calls are issued without a local timeout and are never retried here:
/// callers convert failures into local error state and move on.
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub mod envelope;
#[cfg(test)]
pub mod testing;

pub use envelope::{artifact_files, normalize, ArtifactFile, Envelope};

use crate::config::Config;

/// Logical roles of the remote agents. Each maps to one opaque endpoint
/// identifier fixed at process start (see `Config::agent_id`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentRole {
    Research,
    Documents,
    Preparation,
    Copilot,
}

impl AgentRole {
    pub fn label(&self) -> &'static str {
        match self {
            AgentRole::Research => "research",
            AgentRole::Documents => "documents",
            AgentRole::Preparation => "preparation",
            AgentRole::Copilot => "copilot",
        }
    }
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("prompt must not be empty")]
    EmptyPrompt,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("agent service returned status {status}: {message}")]
    Api { status: u16, message: String },
}

/// The sole boundary for invoking a remote agent.
///
/// Carried in `AppState` as `Arc<dyn AgentGateway>` so tests can substitute a
/// scripted in-memory implementation for the remote side.
#[async_trait]
pub trait AgentGateway: Send + Sync {
    /// Invokes the agent for `role` with a prompt and previously-uploaded
    /// asset references. Returns the service's envelope verbatim; the caller
    /// decides what a `success=false` envelope means for its own state.
    async fn invoke(
        &self,
        role: AgentRole,
        prompt: &str,
        asset_refs: &[String],
    ) -> Result<Envelope, AgentError>;
}

/// One attachment submitted at launch, forwarded opaquely to the agent
/// service. The service hands back asset identifiers; content is never
/// inspected locally.
#[derive(Debug, Clone, Deserialize)]
pub struct AttachmentUpload {
    pub file_name: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadReceipt {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub asset_ids: Vec<String>,
}

/// Best-effort upload collaborator. A failure here never aborts a run; the
/// caller degrades to zero attachments.
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    async fn upload(&self, files: &[AttachmentUpload]) -> Result<UploadReceipt, AgentError>;
}

#[derive(Debug, Serialize)]
struct InvokeRequest<'a> {
    agent_id: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<InvokeOptions<'a>>,
}

#[derive(Debug, Serialize)]
struct InvokeOptions<'a> {
    assets: &'a [String],
}

/// HTTP client for the agent service. Implements both collaborator traits so
/// one client instance backs the gateway and the upload store.
#[derive(Clone)]
pub struct HttpAgentClient {
    client: Client,
    config: Config,
}

impl HttpAgentClient {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            config: config.clone(),
        }
    }

    async fn read_error_body(response: reqwest::Response) -> AgentError {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        AgentError::Api { status, message }
    }
}

#[async_trait]
impl AgentGateway for HttpAgentClient {
    async fn invoke(
        &self,
        role: AgentRole,
        prompt: &str,
        asset_refs: &[String],
    ) -> Result<Envelope, AgentError> {
        if prompt.trim().is_empty() {
            return Err(AgentError::EmptyPrompt);
        }

        let body = InvokeRequest {
            agent_id: self.config.agent_id(role),
            message: prompt,
            options: (!asset_refs.is_empty()).then_some(InvokeOptions { assets: asset_refs }),
        };

        let response = self
            .client
            .post(format!("{}/v1/agents/invoke", self.config.agent_api_url))
            .header("x-api-key", &self.config.agent_api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::read_error_body(response).await);
        }

        let envelope: Envelope = response.json().await?;
        debug!(
            role = role.label(),
            success = envelope.success,
            "agent call resolved"
        );
        Ok(envelope)
    }
}

#[async_trait]
impl AttachmentStore for HttpAgentClient {
    async fn upload(&self, files: &[AttachmentUpload]) -> Result<UploadReceipt, AgentError> {
        let mut form = reqwest::multipart::Form::new();
        for file in files {
            let part = reqwest::multipart::Part::text(file.content.clone())
                .file_name(file.file_name.clone());
            form = form.part("files", part);
        }

        let response = self
            .client
            .post(format!("{}/v1/files", self.config.agent_api_url))
            .header("x-api-key", &self.config.agent_api_key)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::read_error_body(response).await);
        }

        Ok(response.json().await?)
    }
}
