// Phase orchestration — the three-stage Research → Documents → Preparation
// pipeline. All agent calls go through agent_client — no direct HTTP here.

pub mod deliverables;
pub mod handlers;
pub mod models;
pub mod orchestrator;
pub mod prompts;
