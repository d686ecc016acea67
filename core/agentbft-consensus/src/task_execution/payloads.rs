//! Payloads of the task execution app

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{ParticipantId, Payload};

/// Content submitted by an agent whose task failed
pub const ERROR_PAYLOAD: &str = "error";

/// Payload carrying an agent's task outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskExecutionPayload {
    pub sender: ParticipantId,
    /// Either [`ERROR_PAYLOAD`] or a JSON encoded [`TaskResultEnvelope`]
    pub content: String,
}

impl TaskExecutionPayload {
    pub fn new(sender: impl Into<ParticipantId>, content: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            content: content.into(),
        }
    }

    /// Error marker payload
    pub fn error(sender: impl Into<ParticipantId>) -> Self {
        Self::new(sender, ERROR_PAYLOAD)
    }

    /// Payload encoding a task result
    pub fn from_envelope(
        sender: impl Into<ParticipantId>,
        envelope: &TaskResultEnvelope,
    ) -> serde_json::Result<Self> {
        Ok(Self::new(sender, serde_json::to_string(envelope)?))
    }

    pub fn is_error(&self) -> bool {
        self.content == ERROR_PAYLOAD
    }
}

impl Payload for TaskExecutionPayload {
    fn sender(&self) -> &str {
        &self.sender
    }

    fn content(&self) -> &str {
        &self.content
    }
}

/// Result envelope produced by the task executor.
///
/// Extra keys are ignored; both fields are required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResultEnvelope {
    pub request_id: Value,
    pub task_result: Value,
}

impl TaskResultEnvelope {
    pub fn new(request_id: impl Into<Value>, task_result: impl Into<Value>) -> Self {
        Self {
            request_id: request_id.into(),
            task_result: task_result.into(),
        }
    }
}
