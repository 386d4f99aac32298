//! The copilot chat session: an append-only transcript, a replaceable
//! follow-up suggestion list, and a busy flag that drops (not queues)
//! concurrent sends.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::agent_client::{normalize, AgentGateway, AgentRole};
use crate::copilot::prompts::{
    build_copilot_prompt, CopilotMode, EMPTY_REPLY_FALLBACK, FAILED_TURN_FALLBACK,
    TRANSPORT_FALLBACK,
};
use crate::pipeline::models::{RunContext, StageResult};

/// Suggestions shorter than this many characters are dropped.
const SUGGESTION_MIN_CHARS: usize = 6;
/// At most this many suggestions are kept per turn.
const SUGGESTION_LIMIT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One transcript entry. Never mutated after append.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub references: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    fn user(content: String) -> Self {
        Self {
            role: ChatRole::User,
            content,
            mode: None,
            references: None,
            suggestions: None,
            created_at: Utc::now(),
        }
    }

    fn assistant(content: String) -> Self {
        Self {
            role: ChatRole::Assistant,
            content,
            mode: None,
            references: None,
            suggestions: None,
            created_at: Utc::now(),
        }
    }
}

/// Cloned view of the three stage results at send-time. The session reads
/// whatever exists when the turn starts; it never locks the pipeline.
#[derive(Debug, Clone, Default)]
pub struct ResultsSnapshot {
    pub research: StageResult,
    pub documents: StageResult,
    pub preparation: StageResult,
}

/// Outcome of a send attempt.
#[derive(Debug)]
pub enum SendOutcome {
    /// A prior turn is still in flight; the transcript was not touched.
    Ignored,
    /// The turn resolved. The assistant message is already appended and the
    /// suggestion list replaced.
    Replied {
        message: ChatMessage,
        suggestions: Vec<String>,
    },
}

#[derive(Debug, Default)]
struct SessionState {
    transcript: Vec<ChatMessage>,
    suggestions: Vec<String>,
}

/// Per-run conversational session.
#[derive(Debug, Default)]
pub struct CopilotSession {
    state: Mutex<SessionState>,
    busy: AtomicBool,
}

impl CopilotSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends one user turn. The user message is appended before the remote
    /// call begins; exactly one assistant message (structured reply or
    /// fallback) is appended after the call resolves. While a turn is in
    /// flight, further sends are dropped, not queued.
    pub async fn send(
        &self,
        gateway: &dyn AgentGateway,
        context: &RunContext,
        snapshot: &ResultsSnapshot,
        mode: CopilotMode,
        user_text: &str,
    ) -> SendOutcome {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            info!("copilot turn dropped, previous turn still in flight");
            return SendOutcome::Ignored;
        }

        let user_text = user_text.trim().to_string();
        self.state
            .lock()
            .await
            .transcript
            .push(ChatMessage::user(user_text.clone()));

        let prompt = build_copilot_prompt(
            mode,
            context,
            &snapshot.research,
            &snapshot.documents,
            &snapshot.preparation,
            &user_text,
        );

        // No lock is held across the agent call.
        let (message, new_suggestions) =
            match gateway.invoke(AgentRole::Copilot, &prompt, &[]).await {
                Ok(envelope) if envelope.success => {
                    let fields = normalize(&envelope);
                    let content = response_body(&fields)
                        .or_else(|| {
                            envelope.response.as_ref().and_then(|r| r.message.clone())
                        })
                        .unwrap_or_else(|| EMPTY_REPLY_FALLBACK.to_string());

                    let raw_suggestions = fields
                        .get("follow_up_suggestions")
                        .and_then(Value::as_str)
                        .map(str::to_string);

                    let mut message = ChatMessage::assistant(content);
                    message.mode = Some(
                        fields
                            .get("mode")
                            .and_then(Value::as_str)
                            .unwrap_or(mode.label())
                            .to_string(),
                    );
                    message.references = fields
                        .get("references")
                        .and_then(Value::as_str)
                        .map(str::to_string);
                    message.suggestions = raw_suggestions.clone();

                    // Replaced every successful turn; no suggestions clears the list.
                    let suggestions = raw_suggestions
                        .as_deref()
                        .map(parse_suggestions)
                        .unwrap_or_default();
                    (message, Some(suggestions))
                }
                Ok(_) => (
                    ChatMessage::assistant(FAILED_TURN_FALLBACK.to_string()),
                    None,
                ),
                Err(err) => {
                    warn!(error = %err, "copilot turn faulted");
                    (ChatMessage::assistant(TRANSPORT_FALLBACK.to_string()), None)
                }
            };

        let suggestions = {
            let mut state = self.state.lock().await;
            state.transcript.push(message.clone());
            if let Some(new_suggestions) = new_suggestions {
                state.suggestions = new_suggestions;
            }
            state.suggestions.clone()
        };

        self.busy.store(false, Ordering::SeqCst);
        SendOutcome::Replied {
            message,
            suggestions,
        }
    }

    /// Transcript and current suggestions, as plain snapshots.
    pub async fn transcript(&self) -> (Vec<ChatMessage>, Vec<String>) {
        let state = self.state.lock().await;
        (state.transcript.clone(), state.suggestions.clone())
    }

    /// Clears transcript and suggestions. The only way either shrinks.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.transcript.clear();
        state.suggestions.clear();
    }
}

/// Response body resolution, in priority order: the structured `response`
/// field, then the generic `text` fallback field. A non-string value is
/// stringified rather than dropped; an explicit null falls through.
fn response_body(fields: &Map<String, Value>) -> Option<String> {
    body_field(fields, "response").or_else(|| body_field(fields, "text"))
}

fn body_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    match fields.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Splits a delimited suggestions string into quick-reply affordances:
/// split on comma, semicolon, or newline; trim; drop short entries; keep at
/// most the first three.
pub fn parse_suggestions(raw: &str) -> Vec<String> {
    raw.split([',', ';', '\n'])
        .map(str::trim)
        .filter(|s| s.chars().count() >= SUGGESTION_MIN_CHARS)
        .take(SUGGESTION_LIMIT)
        .map(str::to_string)
        .collect()
}
