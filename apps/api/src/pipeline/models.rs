//! Run data model — per-stage status, normalized stage results, and the
//! in-memory registry of pipeline runs.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

use crate::agent_client::{AgentRole, ArtifactFile};
use crate::copilot::session::CopilotSession;

/// The three pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Research,
    Documents,
    Preparation,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Research, Stage::Documents, Stage::Preparation];

    pub fn role(&self) -> AgentRole {
        match self {
            Stage::Research => AgentRole::Research,
            Stage::Documents => AgentRole::Documents,
            Stage::Preparation => AgentRole::Preparation,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Stage::Research => "Research",
            Stage::Documents => "Documents",
            Stage::Preparation => "Preparation",
        }
    }

    /// Run-level message when the agent returns a failure envelope without
    /// its own error string.
    pub fn failure_message(&self) -> String {
        format!("{} phase failed", self.title())
    }

    /// Run-level message when the call itself faults (transport error).
    pub fn fault_message(&self) -> String {
        format!("{} phase encountered an error", self.title())
    }
}

/// Lifecycle of a single stage. Transitions are monotonic within a run:
/// pending → active → {completed | error}. A terminal status never reverts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseStatus {
    #[default]
    Pending,
    Active,
    Completed,
    Error,
}

impl PhaseStatus {
    fn rank(&self) -> u8 {
        match self {
            PhaseStatus::Pending => 0,
            PhaseStatus::Active => 1,
            PhaseStatus::Completed | PhaseStatus::Error => 2,
        }
    }
}

/// One status slot per stage. Owned exclusively by the orchestrator;
/// exposed read-only to the presentation layer.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PhaseBoard {
    pub research: PhaseStatus,
    pub documents: PhaseStatus,
    pub preparation: PhaseStatus,
}

impl PhaseBoard {
    /// Applies a status transition. A transition that would revert or repeat
    /// a status is ignored and logged, keeping the per-stage lifecycle
    /// monotonic no matter what the caller does.
    pub fn advance(&mut self, stage: Stage, next: PhaseStatus) {
        let slot = match stage {
            Stage::Research => &mut self.research,
            Stage::Documents => &mut self.documents,
            Stage::Preparation => &mut self.preparation,
        };
        if next.rank() <= slot.rank() {
            warn!(
                stage = stage.title(),
                from = ?*slot,
                to = ?next,
                "ignoring non-monotonic phase transition"
            );
            return;
        }
        *slot = next;
    }
}

/// Normalized output of one stage: named long-form text fields keyed by
/// deliverable name. Absent fields are tolerated; replaced wholesale on
/// re-run, never incrementally mutated.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct StageResult(pub Map<String, Value>);

impl StageResult {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// String content of a named field, if present and textual.
    pub fn text_field(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    /// Size-bounded serialization of this result for embedding into the next
    /// stage's prompt. The cut is a hard character truncation, not a
    /// semantic summarization. An empty result serializes to an empty string.
    pub fn context_window(&self, budget: usize) -> String {
        if self.is_empty() {
            return String::new();
        }
        let serialized = Value::Object(self.0.clone()).to_string();
        serialized.chars().take(budget).collect()
    }
}

impl From<Map<String, Value>> for StageResult {
    fn from(fields: Map<String, Value>) -> Self {
        StageResult(fields)
    }
}

/// Immutable inputs of one pipeline run, fixed at launch.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Organization identifier as entered — typically a company website URL.
    pub organization: String,
    pub target_role: String,
    /// Opaque asset ids from the upload collaborator, reused unchanged
    /// across all three stage calls. Empty when upload was skipped or failed.
    pub asset_refs: Vec<String>,
}

impl RunContext {
    /// Display name derived from the organization identifier: host without
    /// scheme, `www.` prefix, path, or TLD.
    pub fn organization_name(&self) -> &str {
        let host = self
            .organization
            .trim()
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_start_matches("www.");
        let host = host.split('/').next().unwrap_or(host);
        let name = host.split('.').next().unwrap_or(host);
        if name.is_empty() {
            "Company"
        } else {
            name
        }
    }
}

/// Mutable state of one pipeline run. Results are whole-value swapped per
/// stage; the run-level error keeps only the first message recorded.
#[derive(Debug, Default)]
pub struct RunState {
    pub phases: PhaseBoard,
    pub research: StageResult,
    pub documents: StageResult,
    pub preparation: StageResult,
    pub research_files: Vec<ArtifactFile>,
    pub documents_files: Vec<ArtifactFile>,
    pub preparation_files: Vec<ArtifactFile>,
    pub error: Option<String>,
    pub finished: bool,
}

impl RunState {
    pub fn result(&self, stage: Stage) -> &StageResult {
        match stage {
            Stage::Research => &self.research,
            Stage::Documents => &self.documents,
            Stage::Preparation => &self.preparation,
        }
    }

    pub fn set_result(&mut self, stage: Stage, result: StageResult, files: Vec<ArtifactFile>) {
        match stage {
            Stage::Research => {
                self.research = result;
                self.research_files = files;
            }
            Stage::Documents => {
                self.documents = result;
                self.documents_files = files;
            }
            Stage::Preparation => {
                self.preparation = result;
                self.preparation_files = files;
            }
        }
    }

    /// Retains the first run-level error only. Later stage errors still flip
    /// their own status but do not overwrite the banner message.
    pub fn record_error(&mut self, message: String) {
        if self.error.is_none() {
            self.error = Some(message);
        }
    }
}

/// One launched run: immutable context plus lock-guarded mutable state and
/// the run's copilot session.
#[derive(Debug)]
pub struct RunHandle {
    pub id: Uuid,
    pub context: RunContext,
    pub state: RwLock<RunState>,
    pub copilot: CopilotSession,
}

impl RunHandle {
    pub fn new(context: RunContext) -> Self {
        Self {
            id: Uuid::new_v4(),
            context,
            state: RwLock::new(RunState::default()),
            copilot: CopilotSession::new(),
        }
    }
}

/// In-memory registry of runs. State does not persist beyond process
/// lifetime; a restart discards all runs.
#[derive(Clone, Default)]
pub struct RunRegistry {
    inner: Arc<RwLock<HashMap<Uuid, Arc<RunHandle>>>>,
}

impl RunRegistry {
    pub async fn insert(&self, handle: Arc<RunHandle>) {
        self.inner.write().await.insert(handle.id, handle);
    }

    pub async fn get(&self, id: Uuid) -> Option<Arc<RunHandle>> {
        self.inner.read().await.get(&id).cloned()
    }
}
