//! Scripted in-memory agent fakes for orchestrator and copilot tests.
//! Replies are queued per role and popped in invocation order.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{
    AgentError, AgentGateway, AgentRole, AttachmentStore, AttachmentUpload, Envelope,
    UploadReceipt,
};

/// One scripted outcome for an agent invocation.
pub enum ScriptedReply {
    /// success=true envelope carrying the given result payload.
    Success(Value),
    /// success=false envelope with an optional error string.
    Failure(Option<&'static str>),
    /// Transport-level fault: the call itself errors.
    Fault,
}

impl ScriptedReply {
    fn resolve(&self) -> Result<Envelope, AgentError> {
        match self {
            ScriptedReply::Success(result) => Ok(serde_json::from_value(json!({
                "success": true,
                "response": { "result": result }
            }))
            .unwrap()),
            ScriptedReply::Failure(error) => Ok(serde_json::from_value(json!({
                "success": false,
                "error": error
            }))
            .unwrap()),
            ScriptedReply::Fault => Err(AgentError::Api {
                status: 502,
                message: "upstream unavailable".to_string(),
            }),
        }
    }
}

/// Scripted outcome for the attachment upload collaborator.
pub enum ScriptedUpload {
    Receipt { success: bool, asset_ids: Vec<String> },
    Fault,
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub role: AgentRole,
    pub prompt: String,
    pub asset_refs: Vec<String>,
}

/// In-memory stand-in for the remote agent service, implementing both
/// collaborator traits. Unscripted invocations succeed with an empty result.
pub struct ScriptedAgent {
    replies: Mutex<HashMap<AgentRole, Vec<ScriptedReply>>>,
    upload: Mutex<Option<ScriptedUpload>>,
    pub calls: Mutex<Vec<RecordedCall>>,
    pub uploads: Mutex<usize>,
}

impl Default for ScriptedAgent {
    fn default() -> Self {
        Self {
            replies: Mutex::new(HashMap::new()),
            upload: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            uploads: Mutex::new(0),
        }
    }
}

impl ScriptedAgent {
    pub fn script(&self, role: AgentRole, reply: ScriptedReply) {
        self.replies.lock().unwrap().entry(role).or_default().push(reply);
    }

    pub fn script_upload(&self, upload: ScriptedUpload) {
        *self.upload.lock().unwrap() = Some(upload);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn prompts_for(&self, role: AgentRole) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.role == role)
            .map(|c| c.prompt.clone())
            .collect()
    }
}

#[async_trait]
impl AgentGateway for ScriptedAgent {
    async fn invoke(
        &self,
        role: AgentRole,
        prompt: &str,
        asset_refs: &[String],
    ) -> Result<Envelope, AgentError> {
        if prompt.trim().is_empty() {
            return Err(AgentError::EmptyPrompt);
        }
        self.calls.lock().unwrap().push(RecordedCall {
            role,
            prompt: prompt.to_string(),
            asset_refs: asset_refs.to_vec(),
        });
        let reply = {
            let mut replies = self.replies.lock().unwrap();
            let queue = replies.entry(role).or_default();
            if queue.is_empty() {
                None
            } else {
                Some(queue.remove(0))
            }
        };
        match reply {
            Some(reply) => reply.resolve(),
            None => ScriptedReply::Success(json!({})).resolve(),
        }
    }
}

#[async_trait]
impl AttachmentStore for ScriptedAgent {
    async fn upload(&self, _files: &[AttachmentUpload]) -> Result<UploadReceipt, AgentError> {
        *self.uploads.lock().unwrap() += 1;
        match &*self.upload.lock().unwrap() {
            Some(ScriptedUpload::Receipt { success, asset_ids }) => Ok(UploadReceipt {
                success: *success,
                asset_ids: asset_ids.clone(),
            }),
            Some(ScriptedUpload::Fault) => Err(AgentError::Api {
                status: 500,
                message: "upload service unavailable".to_string(),
            }),
            None => Ok(UploadReceipt {
                success: true,
                asset_ids: vec![],
            }),
        }
    }
}
