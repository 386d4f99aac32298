//! Copilot prompt template, conversational modes, and fallback strings.

use serde::{Deserialize, Serialize};

use crate::pipeline::models::{RunContext, StageResult};

/// Each stage's serialized result embedded into a copilot turn, capped
/// independently. A stage that has not completed contributes an empty string.
pub const COPILOT_STAGE_CONTEXT_BUDGET: usize = 1500;

/// Copilot turn. Replace: {mode}, {company_name}, {target_role},
/// {research_context}, {documents_context}, {preparation_context}, {message}
pub const COPILOT_PROMPT_TEMPLATE: &str = "Mode: {mode}\nContext: Company={company_name}, \
    Role={target_role}.\nResearch Summary: {research_context}\nDocuments Summary: \
    {documents_context}\nPrep Summary: {preparation_context}\n\nUser: {message}";

/// Shown when a successful envelope carries no usable response body.
pub const EMPTY_REPLY_FALLBACK: &str =
    "I received your message but could not generate a proper response.";

/// Shown when the agent returns a failure envelope.
pub const FAILED_TURN_FALLBACK: &str =
    "Sorry, I encountered an error processing your request. Please try again.";

/// Shown when the call itself faults.
pub const TRANSPORT_FALLBACK: &str =
    "A network error occurred. Please check your connection and try again.";

/// The four fixed conversational modes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CopilotMode {
    #[default]
    Coaching,
    Critique,
    Simulation,
    #[serde(rename = "Q&A")]
    QA,
}

impl CopilotMode {
    pub fn label(&self) -> &'static str {
        match self {
            CopilotMode::Coaching => "Coaching",
            CopilotMode::Critique => "Critique",
            CopilotMode::Simulation => "Simulation",
            CopilotMode::QA => "Q&A",
        }
    }
}

/// Builds one copilot turn prompt from the mode, run context, a snapshot of
/// all three stage results, and the user's message.
pub fn build_copilot_prompt(
    mode: CopilotMode,
    context: &RunContext,
    research: &StageResult,
    documents: &StageResult,
    preparation: &StageResult,
    message: &str,
) -> String {
    COPILOT_PROMPT_TEMPLATE
        .replace("{mode}", mode.label())
        .replace("{company_name}", context.organization_name())
        .replace("{target_role}", &context.target_role)
        .replace(
            "{research_context}",
            &research.context_window(COPILOT_STAGE_CONTEXT_BUDGET),
        )
        .replace(
            "{documents_context}",
            &documents.context_window(COPILOT_STAGE_CONTEXT_BUDGET),
        )
        .replace(
            "{preparation_context}",
            &preparation.context_window(COPILOT_STAGE_CONTEXT_BUDGET),
        )
        .replace("{message}", message)
}
