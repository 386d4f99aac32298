//! The phase state machine — drives the three-stage pipeline.
//!
//! Flow per run: validate inputs → best-effort attachment upload →
//! research → documents → preparation → finished.
//!
//! Stages execute strictly in sequence because each stage's prompt embeds
//! the previous stage's normalized output. A stage failure is contained to
//! that stage: its status flips to error, the first such message is retained
//! as the run-level banner, and the next stage still runs with whatever
//! context exists. There is no retry and no early exit.

use std::sync::Arc;

use tracing::{info, warn};

use crate::agent_client::{
    artifact_files, normalize, AgentGateway, AttachmentStore, AttachmentUpload,
};
use crate::errors::AppError;
use crate::pipeline::models::{
    PhaseStatus, RunContext, RunHandle, RunRegistry, Stage, StageResult,
};
use crate::pipeline::prompts::build_stage_prompt;

/// Validates launch inputs, uploads attachments, registers the run, and
/// spawns the pipeline. Returns the handle immediately; progress is exposed
/// through the run snapshot.
pub async fn launch(
    gateway: Arc<dyn AgentGateway>,
    store: Arc<dyn AttachmentStore>,
    registry: &RunRegistry,
    organization: String,
    target_role: String,
    attachments: Vec<AttachmentUpload>,
) -> Result<Arc<RunHandle>, AppError> {
    let handle = prepare_run(store, registry, organization, target_role, attachments).await?;
    tokio::spawn(run_pipeline(gateway, handle.clone()));
    Ok(handle)
}

/// Launch steps up to (but not including) the first agent call. Split from
/// [`launch`] so tests can drive the pipeline to completion deterministically.
pub async fn prepare_run(
    store: Arc<dyn AttachmentStore>,
    registry: &RunRegistry,
    organization: String,
    target_role: String,
    attachments: Vec<AttachmentUpload>,
) -> Result<Arc<RunHandle>, AppError> {
    if organization.trim().is_empty() {
        return Err(AppError::Validation(
            "organization cannot be empty".to_string(),
        ));
    }
    if target_role.trim().is_empty() {
        return Err(AppError::Validation(
            "target_role cannot be empty".to_string(),
        ));
    }

    let asset_refs = upload_attachments(store.as_ref(), &attachments).await;

    let handle = Arc::new(RunHandle::new(RunContext {
        organization,
        target_role,
        asset_refs,
    }));
    registry.insert(handle.clone()).await;

    info!(
        run_id = %handle.id,
        organization = %handle.context.organization,
        target_role = %handle.context.target_role,
        assets = handle.context.asset_refs.len(),
        "pipeline run registered"
    );
    Ok(handle)
}

/// Uploads launch attachments through the collaborator. Best-effort: any
/// failure degrades to zero asset references and the run proceeds.
async fn upload_attachments(store: &dyn AttachmentStore, files: &[AttachmentUpload]) -> Vec<String> {
    if files.is_empty() {
        return Vec::new();
    }
    match store.upload(files).await {
        Ok(receipt) if receipt.success => receipt.asset_ids,
        Ok(_) => {
            warn!("attachment upload rejected, continuing without assets");
            Vec::new()
        }
        Err(err) => {
            warn!(error = %err, "attachment upload failed, continuing without assets");
            Vec::new()
        }
    }
}

/// Runs all three stages in order, then marks the run finished
/// unconditionally — partial results are still results.
pub async fn run_pipeline(gateway: Arc<dyn AgentGateway>, handle: Arc<RunHandle>) {
    for stage in Stage::ALL {
        run_stage(gateway.as_ref(), &handle, stage).await;
    }

    let mut state = handle.state.write().await;
    state.finished = true;
    info!(
        run_id = %handle.id,
        error = state.error.as_deref().unwrap_or(""),
        "pipeline run finished"
    );
}

async fn run_stage(gateway: &dyn AgentGateway, handle: &RunHandle, stage: Stage) {
    {
        let mut state = handle.state.write().await;
        state.phases.advance(stage, PhaseStatus::Active);
    }
    info!(run_id = %handle.id, stage = stage.title(), "stage started");

    // Snapshot prior results before the call; no lock is held across the await.
    let prompt = {
        let state = handle.state.read().await;
        build_stage_prompt(stage, &handle.context, &state.research, &state.documents)
    };

    match gateway
        .invoke(stage.role(), &prompt, &handle.context.asset_refs)
        .await
    {
        Ok(envelope) if envelope.success => {
            let result = StageResult::from(normalize(&envelope));
            let files = artifact_files(&envelope);
            let fields = result.0.len();

            let mut state = handle.state.write().await;
            state.set_result(stage, result, files);
            state.phases.advance(stage, PhaseStatus::Completed);
            info!(
                run_id = %handle.id,
                stage = stage.title(),
                fields,
                "stage completed"
            );
        }
        Ok(envelope) => {
            let message = envelope
                .error
                .unwrap_or_else(|| stage.failure_message());
            warn!(run_id = %handle.id, stage = stage.title(), %message, "stage failed");

            let mut state = handle.state.write().await;
            state.phases.advance(stage, PhaseStatus::Error);
            state.record_error(message);
        }
        Err(err) => {
            warn!(
                run_id = %handle.id,
                stage = stage.title(),
                error = %err,
                "stage call faulted"
            );

            let mut state = handle.state.write().await;
            state.phases.advance(stage, PhaseStatus::Error);
            state.record_error(stage.fault_message());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_client::testing::{ScriptedAgent, ScriptedReply, ScriptedUpload};
    use crate::agent_client::AgentRole;
    use crate::pipeline::deliverables;
    use serde_json::json;

    fn attachment() -> AttachmentUpload {
        AttachmentUpload {
            file_name: "resume.pdf".to_string(),
            content: "resume body".to_string(),
        }
    }

    async fn run_to_completion(
        agent: Arc<ScriptedAgent>,
        attachments: Vec<AttachmentUpload>,
    ) -> Arc<RunHandle> {
        let registry = RunRegistry::default();
        let handle = prepare_run(
            agent.clone(),
            &registry,
            "stripe.com".to_string(),
            "Senior Product Manager".to_string(),
            attachments,
        )
        .await
        .unwrap();
        run_pipeline(agent, handle.clone()).await;
        handle
    }

    #[tokio::test]
    async fn test_blank_target_role_rejected_before_any_remote_call() {
        let agent = Arc::new(ScriptedAgent::default());
        let registry = RunRegistry::default();

        let result = prepare_run(
            agent.clone(),
            &registry,
            "stripe.com".to_string(),
            "   ".to_string(),
            vec![attachment()],
        )
        .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(agent.call_count(), 0);
        assert_eq!(*agent.uploads.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_blank_organization_rejected() {
        let agent = Arc::new(ScriptedAgent::default());
        let registry = RunRegistry::default();

        let result = prepare_run(
            agent.clone(),
            &registry,
            "".to_string(),
            "Senior Product Manager".to_string(),
            vec![],
        )
        .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_failed_stage_never_blocks_later_stages() {
        let agent = Arc::new(ScriptedAgent::default());
        agent.script(
            AgentRole::Research,
            ScriptedReply::Failure(Some("research agent unavailable")),
        );
        agent.script(
            AgentRole::Documents,
            ScriptedReply::Success(json!({ "cover_letter": "Dear team" })),
        );
        agent.script(
            AgentRole::Preparation,
            ScriptedReply::Success(json!({ "question_bank": "1. Why us?" })),
        );

        let handle = run_to_completion(agent.clone(), vec![]).await;
        let state = handle.state.read().await;

        assert_eq!(state.phases.research, PhaseStatus::Error);
        assert_eq!(state.phases.documents, PhaseStatus::Completed);
        assert_eq!(state.phases.preparation, PhaseStatus::Completed);
        assert_eq!(state.error.as_deref(), Some("research agent unavailable"));
        assert!(state.finished);
        assert_eq!(agent.call_count(), 3);
    }

    #[tokio::test]
    async fn test_first_stage_error_message_is_retained() {
        let agent = Arc::new(ScriptedAgent::default());
        agent.script(AgentRole::Research, ScriptedReply::Failure(None));
        agent.script(
            AgentRole::Documents,
            ScriptedReply::Failure(Some("documents agent unavailable")),
        );

        let handle = run_to_completion(agent, vec![]).await;
        let state = handle.state.read().await;

        assert_eq!(state.error.as_deref(), Some("Research phase failed"));
        assert_eq!(state.phases.documents, PhaseStatus::Error);
        assert_eq!(state.phases.preparation, PhaseStatus::Completed);
    }

    #[tokio::test]
    async fn test_transport_fault_is_contained_to_its_stage() {
        let agent = Arc::new(ScriptedAgent::default());
        agent.script(AgentRole::Documents, ScriptedReply::Fault);

        let handle = run_to_completion(agent, vec![]).await;
        let state = handle.state.read().await;

        assert_eq!(state.phases.research, PhaseStatus::Completed);
        assert_eq!(state.phases.documents, PhaseStatus::Error);
        assert_eq!(state.phases.preparation, PhaseStatus::Completed);
        assert_eq!(
            state.error.as_deref(),
            Some("Documents phase encountered an error")
        );
        assert!(state.finished);
    }

    #[tokio::test]
    async fn test_stage_output_feeds_next_stage_prompt() {
        let agent = Arc::new(ScriptedAgent::default());
        agent.script(
            AgentRole::Research,
            ScriptedReply::Success(json!({ "executive_dossier": "Stripe is a fintech" })),
        );
        agent.script(
            AgentRole::Documents,
            ScriptedReply::Success(json!({ "cover_letter": "Dear team" })),
        );

        let handle = run_to_completion(agent.clone(), vec![]).await;
        drop(handle);

        let documents_prompt = &agent.prompts_for(AgentRole::Documents)[0];
        assert!(documents_prompt.contains("Stripe is a fintech"));

        let preparation_prompt = &agent.prompts_for(AgentRole::Preparation)[0];
        assert!(preparation_prompt.contains("Stripe is a fintech"));
        assert!(preparation_prompt.contains("Dear team"));
    }

    #[tokio::test]
    async fn test_failed_stage_feeds_empty_context_forward() {
        let agent = Arc::new(ScriptedAgent::default());
        agent.script(AgentRole::Research, ScriptedReply::Fault);

        let handle = run_to_completion(agent.clone(), vec![]).await;
        drop(handle);

        let documents_prompt = &agent.prompts_for(AgentRole::Documents)[0];
        assert!(documents_prompt.starts_with("Using the following research context: \n\n"));
    }

    #[tokio::test]
    async fn test_uploaded_assets_reused_across_all_stages() {
        let agent = Arc::new(ScriptedAgent::default());
        agent.script_upload(ScriptedUpload::Receipt {
            success: true,
            asset_ids: vec!["asset-1".to_string()],
        });

        let handle = run_to_completion(agent.clone(), vec![attachment()]).await;
        assert_eq!(handle.context.asset_refs, vec!["asset-1".to_string()]);

        let calls = agent.calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        for call in calls.iter() {
            assert_eq!(call.asset_refs, vec!["asset-1".to_string()]);
        }
    }

    #[tokio::test]
    async fn test_upload_failure_degrades_to_zero_assets() {
        let agent = Arc::new(ScriptedAgent::default());
        agent.script_upload(ScriptedUpload::Fault);

        let handle = run_to_completion(agent.clone(), vec![attachment()]).await;
        let state = handle.state.read().await;

        assert!(handle.context.asset_refs.is_empty());
        // Upload failure is not a pipeline error
        assert!(state.error.is_none());
        assert_eq!(state.phases.research, PhaseStatus::Completed);
    }

    #[tokio::test]
    async fn test_rejected_upload_receipt_degrades_to_zero_assets() {
        let agent = Arc::new(ScriptedAgent::default());
        agent.script_upload(ScriptedUpload::Receipt {
            success: false,
            asset_ids: vec!["ignored".to_string()],
        });

        let handle = run_to_completion(agent, vec![attachment()]).await;
        assert!(handle.context.asset_refs.is_empty());
    }

    #[tokio::test]
    async fn test_no_upload_call_without_attachments() {
        let agent = Arc::new(ScriptedAgent::default());
        run_to_completion(agent.clone(), vec![]).await;
        assert_eq!(*agent.uploads.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_deliverable_count_matches_non_empty_content_fields() {
        let agent = Arc::new(ScriptedAgent::default());
        agent.script(
            AgentRole::Research,
            ScriptedReply::Success(json!({
                "executive_dossier": "# Dossier",
                "competitive_brief": "# Brief",
                "summary": "research done"
            })),
        );
        agent.script(
            AgentRole::Documents,
            ScriptedReply::Success(json!({
                "optimized_resume": "# Resume",
                "cover_letter": "",
                "summary": "documents done"
            })),
        );
        agent.script(
            AgentRole::Preparation,
            ScriptedReply::Success(json!({ "tactical_plan": "# Plan" })),
        );

        let handle = run_to_completion(agent, vec![]).await;
        let state = handle.state.read().await;

        let deliverables = deliverables::collect(&state);
        assert_eq!(deliverables.len(), 4);
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn test_string_encoded_result_still_completes_stage() {
        let agent = Arc::new(ScriptedAgent::default());
        agent.script(
            AgentRole::Research,
            ScriptedReply::Success(json!(
                "{\"executive_dossier\": \"decoded from string\"}"
            )),
        );

        let handle = run_to_completion(agent, vec![]).await;
        let state = handle.state.read().await;

        assert_eq!(state.phases.research, PhaseStatus::Completed);
        assert_eq!(
            state.research.text_field("executive_dossier"),
            Some("decoded from string")
        );
    }
}
