//! Wire types for the remote agent service and the lenient decoding layer
//! that turns its loosely-shaped responses into typed results.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Uniform success/failure wrapper returned by every agent invocation.
///
/// `response.result` is agent-defined and not contractually fixed: it may be a
/// JSON object, a JSON-encoded string, or absent entirely. Nothing downstream
/// may assume its shape; all reads go through [`normalize`] or
/// [`artifact_files`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub response: Option<AgentResponse>,
    #[serde(default)]
    pub module_outputs: Option<ModuleOutputs>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentResponse {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModuleOutputs {
    #[serde(default)]
    pub artifact_files: Option<Value>,
}

/// A downloadable file attached to an agent response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactFile {
    pub file_url: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub format_type: Option<String>,
}

/// The agent result payload, classified once at the boundary.
///
/// Keeping the three shapes in a closed union means the rest of the pipeline
/// never inspects raw JSON: a payload is empty, a string still to be decoded,
/// or an already-structured field map.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentPayload {
    Empty,
    Raw(String),
    Decoded(Map<String, Value>),
}

impl AgentPayload {
    /// Classifies `envelope.response.result`. Anything that cannot carry
    /// named fields (null, empty string, arrays, numbers) is `Empty`.
    pub fn classify(envelope: &Envelope) -> Self {
        let result = envelope.response.as_ref().and_then(|r| r.result.as_ref());
        match result {
            Some(Value::String(s)) if !s.is_empty() => AgentPayload::Raw(s.clone()),
            Some(Value::Object(map)) => AgentPayload::Decoded(map.clone()),
            _ => AgentPayload::Empty,
        }
    }

    /// Resolves the payload into a field map. A raw string is decoded as
    /// JSON; when it does not decode to an object, the text is kept under a
    /// single `text` field rather than discarded.
    pub fn into_fields(self) -> Map<String, Value> {
        match self {
            AgentPayload::Empty => Map::new(),
            AgentPayload::Decoded(map) => map,
            AgentPayload::Raw(text) => match serde_json::from_str::<Value>(&text) {
                Ok(Value::Object(map)) => map,
                _ => {
                    let mut map = Map::new();
                    map.insert("text".to_string(), Value::String(text));
                    map
                }
            },
        }
    }
}

/// Extracts the result payload of an agent envelope into a field map.
///
/// Total: no input raises; the worst case is an empty map.
pub fn normalize(envelope: &Envelope) -> Map<String, Value> {
    AgentPayload::classify(envelope).into_fields()
}

/// Extracts the downloadable files attached to an agent response.
///
/// Returns an empty list when the files collection is absent or not an
/// array; entries that do not carry a `file_url` are skipped. Never fails.
pub fn artifact_files(envelope: &Envelope) -> Vec<ArtifactFile> {
    let files = envelope
        .module_outputs
        .as_ref()
        .and_then(|m| m.artifact_files.as_ref());
    let Some(Value::Array(items)) = files else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| serde_json::from_value(item.clone()).ok())
        .collect()
}
