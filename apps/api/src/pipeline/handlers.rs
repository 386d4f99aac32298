//! Axum route handlers for the pipeline run API.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agent_client::{ArtifactFile, AttachmentUpload};
use crate::errors::AppError;
use crate::pipeline::deliverables::{self, Deliverable};
use crate::pipeline::models::{PhaseBoard, StageResult};
use crate::pipeline::orchestrator;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LaunchRequest {
    pub organization: String,
    pub target_role: String,
    #[serde(default)]
    pub attachments: Vec<AttachmentUpload>,
}

#[derive(Debug, Serialize)]
pub struct LaunchResponse {
    pub run_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct PerStage<T> {
    pub research: T,
    pub documents: T,
    pub preparation: T,
}

/// Full read-only view of one run for the presentation layer.
#[derive(Debug, Serialize)]
pub struct RunSnapshot {
    pub run_id: Uuid,
    pub organization: String,
    pub target_role: String,
    pub phases: PhaseBoard,
    pub results: PerStage<StageResult>,
    pub artifact_files: PerStage<Vec<ArtifactFile>>,
    pub error: Option<String>,
    pub finished: bool,
    pub deliverable_count: usize,
    pub deliverables: Vec<Deliverable>,
}

/// POST /api/v1/runs
///
/// Validates inputs, uploads attachments best-effort, and launches the
/// three-stage pipeline in the background. Returns the run id immediately.
pub async fn handle_launch(
    State(state): State<AppState>,
    Json(request): Json<LaunchRequest>,
) -> Result<Json<LaunchResponse>, AppError> {
    let handle = orchestrator::launch(
        state.gateway.clone(),
        state.attachments.clone(),
        &state.runs,
        request.organization,
        request.target_role,
        request.attachments,
    )
    .await?;

    Ok(Json(LaunchResponse { run_id: handle.id }))
}

/// GET /api/v1/runs/:id
///
/// Per-stage status, normalized results, artifact files, the run-level error
/// (first-occurring only), and the generated deliverables.
pub async fn handle_get_run(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> Result<Json<RunSnapshot>, AppError> {
    let handle = state
        .runs
        .get(run_id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Run {run_id} not found")))?;

    let run = handle.state.read().await;
    let deliverables = deliverables::collect(&run);

    Ok(Json(RunSnapshot {
        run_id: handle.id,
        organization: handle.context.organization.clone(),
        target_role: handle.context.target_role.clone(),
        phases: run.phases,
        results: PerStage {
            research: run.research.clone(),
            documents: run.documents.clone(),
            preparation: run.preparation.clone(),
        },
        artifact_files: PerStage {
            research: run.research_files.clone(),
            documents: run.documents_files.clone(),
            preparation: run.preparation_files.clone(),
        },
        error: run.error.clone(),
        finished: run.finished,
        deliverable_count: deliverables.len(),
        deliverables,
    }))
}
