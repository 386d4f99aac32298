//! Axum route handlers for the copilot chat API.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::copilot::prompts::CopilotMode;
use crate::copilot::session::{ChatMessage, ResultsSnapshot, SendOutcome};
use crate::errors::AppError;
use crate::pipeline::models::RunHandle;
use crate::state::AppState;

use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub message: String,
    #[serde(default)]
    pub mode: CopilotMode,
}

#[derive(Debug, Serialize)]
pub struct SendResponse {
    pub message: ChatMessage,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct TranscriptResponse {
    pub messages: Vec<ChatMessage>,
    pub suggestions: Vec<String>,
}

async fn run_handle(state: &AppState, run_id: Uuid) -> Result<Arc<RunHandle>, AppError> {
    state
        .runs
        .get(run_id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Run {run_id} not found")))
}

/// POST /api/v1/runs/:id/copilot
///
/// One chat turn against whatever stage results exist right now. Returns 409
/// when a prior turn is still in flight — the send is dropped, not queued.
pub async fn handle_send(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
    Json(request): Json<SendRequest>,
) -> Result<Json<SendResponse>, AppError> {
    if request.message.trim().is_empty() {
        return Err(AppError::Validation("message cannot be empty".to_string()));
    }

    let handle = run_handle(&state, run_id).await?;

    let snapshot = {
        let run = handle.state.read().await;
        ResultsSnapshot {
            research: run.research.clone(),
            documents: run.documents.clone(),
            preparation: run.preparation.clone(),
        }
    };

    let outcome = handle
        .copilot
        .send(
            state.gateway.as_ref(),
            &handle.context,
            &snapshot,
            request.mode,
            &request.message,
        )
        .await;

    match outcome {
        SendOutcome::Ignored => Err(AppError::TurnInFlight),
        SendOutcome::Replied {
            message,
            suggestions,
        } => Ok(Json(SendResponse {
            message,
            suggestions,
        })),
    }
}

/// GET /api/v1/runs/:id/copilot
///
/// The full transcript plus the current quick-reply suggestions.
pub async fn handle_transcript(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> Result<Json<TranscriptResponse>, AppError> {
    let handle = run_handle(&state, run_id).await?;
    let (messages, suggestions) = handle.copilot.transcript().await;
    Ok(Json(TranscriptResponse {
        messages,
        suggestions,
    }))
}

/// POST /api/v1/runs/:id/copilot/reset
pub async fn handle_reset(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let handle = run_handle(&state, run_id).await?;
    handle.copilot.reset().await;
    Ok(Json(json!({ "status": "reset" })))
}
