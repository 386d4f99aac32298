//! The fixed catalog of deliverables — the named content fields of each
//! stage that are surfaced individually to the user. Stage `summary` fields
//! feed downstream prompt context but are not deliverables.

use serde::Serialize;

use crate::pipeline::models::{RunState, Stage};

pub struct DeliverableSpec {
    /// Field name inside the stage's normalized result.
    pub field: &'static str,
    pub title: &'static str,
    pub stage: Stage,
}

pub const CATALOG: &[DeliverableSpec] = &[
    DeliverableSpec {
        field: "executive_dossier",
        title: "Executive Company Dossier",
        stage: Stage::Research,
    },
    DeliverableSpec {
        field: "competitive_brief",
        title: "Competitive Positioning Brief",
        stage: Stage::Research,
    },
    DeliverableSpec {
        field: "skill_matrix",
        title: "Skill Matrix & Gap Analysis",
        stage: Stage::Research,
    },
    DeliverableSpec {
        field: "culture_map",
        title: "Culture Fit Risk Map",
        stage: Stage::Research,
    },
    DeliverableSpec {
        field: "optimized_resume",
        title: "Optimized Resume",
        stage: Stage::Documents,
    },
    DeliverableSpec {
        field: "cover_letter",
        title: "Cover Letter",
        stage: Stage::Documents,
    },
    DeliverableSpec {
        field: "hr_outreach_email",
        title: "HR Outreach Email",
        stage: Stage::Documents,
    },
    DeliverableSpec {
        field: "positioning_summary",
        title: "Executive Positioning Summary",
        stage: Stage::Documents,
    },
    DeliverableSpec {
        field: "behavioral_answer_bank",
        title: "Behavioral Answer Bank",
        stage: Stage::Documents,
    },
    DeliverableSpec {
        field: "question_bank",
        title: "Question Bank",
        stage: Stage::Preparation,
    },
    DeliverableSpec {
        field: "technical_guide",
        title: "Technical Mastery Guide",
        stage: Stage::Preparation,
    },
    DeliverableSpec {
        field: "case_walkthroughs",
        title: "Case Study Walkthroughs",
        stage: Stage::Preparation,
    },
    DeliverableSpec {
        field: "tactical_plan",
        title: "Tactical Preparation Plan",
        stage: Stage::Preparation,
    },
];

/// One generated deliverable, ready for display.
#[derive(Debug, Clone, Serialize)]
pub struct Deliverable {
    pub id: &'static str,
    pub title: &'static str,
    pub stage: Stage,
    pub content: String,
}

/// Collects the deliverables that have non-empty content, in catalog order.
/// The deliverable count of a run is the length of this collection.
pub fn collect(state: &RunState) -> Vec<Deliverable> {
    CATALOG
        .iter()
        .filter_map(|spec| {
            let content = state.result(spec.stage).text_field(spec.field)?;
            if content.is_empty() {
                return None;
            }
            Some(Deliverable {
                id: spec.field,
                title: spec.title,
                stage: spec.stage,
                content: content.to_string(),
            })
        })
        .collect()
}
