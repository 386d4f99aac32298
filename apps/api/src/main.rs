mod agent_client;
mod config;
mod copilot;
mod errors;
mod pipeline;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::agent_client::{AgentGateway, AttachmentStore, HttpAgentClient};
use crate::config::Config;
use crate::pipeline::models::RunRegistry;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting InterviewEdge API v{}", env!("CARGO_PKG_VERSION"));

    // One HTTP client backs both the agent gateway and the upload store
    let client = HttpAgentClient::new(&config);
    let gateway: Arc<dyn AgentGateway> = Arc::new(client.clone());
    let attachments: Arc<dyn AttachmentStore> = Arc::new(client);
    info!("Agent client initialized ({})", config.agent_api_url);

    let state = AppState {
        gateway,
        attachments,
        runs: RunRegistry::default(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
