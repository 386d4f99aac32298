//! Prompt templates for the three pipeline stages.
//!
//! Each stage's prompt embeds a size-bounded serialization of the prior
//! stage's output. The budgets are hard character cuts, not semantic
//! summarization.

use crate::pipeline::models::{RunContext, Stage, StageResult};

/// Serialized research context embedded into the documents-stage prompt.
pub const DOCUMENTS_STAGE_CONTEXT_BUDGET: usize = 3000;

/// Serialized research and documents context embedded into the
/// preparation-stage prompt, applied to each independently.
pub const PREPARATION_STAGE_CONTEXT_BUDGET: usize = 2000;

/// Research stage. Replace: {organization}, {target_role}
pub const RESEARCH_PROMPT_TEMPLATE: &str = "Research the company at {organization} for the role \
    of {target_role}. Provide comprehensive analysis including executive dossier, competitive \
    brief, skill matrix, and culture map.";

/// Documents stage. Replace: {research_context}, {target_role}, {company_name}
pub const DOCUMENTS_PROMPT_TEMPLATE: &str = "Using the following research context: \
    {research_context}\n\nCreate strategic documents for the role of {target_role} at \
    {company_name}. Include optimized resume, cover letter, HR outreach email, positioning \
    summary, and behavioral answer bank.";

/// Preparation stage. Replace: {research_context}, {documents_context},
/// {target_role}, {company_name}
pub const PREPARATION_PROMPT_TEMPLATE: &str = "Using research: {research_context}\nDocuments: \
    {documents_context}\n\nCreate comprehensive preparation materials for {target_role} at \
    {company_name}. Include question bank, technical guide, case walkthroughs, and tactical plan.";

/// Builds the prompt for a stage from the run context and the prior stages'
/// normalized results. A failed or empty prior stage contributes an empty
/// context string.
pub fn build_stage_prompt(
    stage: Stage,
    context: &RunContext,
    research: &StageResult,
    documents: &StageResult,
) -> String {
    match stage {
        Stage::Research => RESEARCH_PROMPT_TEMPLATE
            .replace("{organization}", &context.organization)
            .replace("{target_role}", &context.target_role),
        Stage::Documents => DOCUMENTS_PROMPT_TEMPLATE
            .replace(
                "{research_context}",
                &research.context_window(DOCUMENTS_STAGE_CONTEXT_BUDGET),
            )
            .replace("{target_role}", &context.target_role)
            .replace("{company_name}", context.organization_name()),
        Stage::Preparation => PREPARATION_PROMPT_TEMPLATE
            .replace(
                "{research_context}",
                &research.context_window(PREPARATION_STAGE_CONTEXT_BUDGET),
            )
            .replace(
                "{documents_context}",
                &documents.context_window(PREPARATION_STAGE_CONTEXT_BUDGET),
            )
            .replace("{target_role}", &context.target_role)
            .replace("{company_name}", context.organization_name()),
    }
}
