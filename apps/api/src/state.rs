use std::sync::Arc;

use crate::agent_client::{AgentGateway, AttachmentStore};
use crate::pipeline::models::RunRegistry;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// The sole boundary to the remote agents. A trait object so tests can
    /// script the remote side.
    pub gateway: Arc<dyn AgentGateway>,
    /// Best-effort upload collaborator; failures degrade to zero attachments.
    pub attachments: Arc<dyn AttachmentStore>,
    /// In-memory run registry. Nothing persists beyond process lifetime.
    pub runs: RunRegistry,
}
