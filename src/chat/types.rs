//! Chat pipeline request/response types

use crate::store::models::{Priority, TaskStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

/// Slimmed task row the UI sends as conversation context. Carries the
/// `organization_id` so the backend can infer which environment an action
/// plan executes against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskContext {
    pub id: Uuid,
    pub title: String,
    pub priority: Priority,
    pub status: TaskStatus,
    pub organization_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub tasks: Vec<TaskContext>,
    #[serde(rename = "userToken", default)]
    pub user_token: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_action: Option<String>,
}
