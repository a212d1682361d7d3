//! Action plan parse boundary
//!
//! Model output is untrusted input. It is parsed into the fixed plan shape
//! with a fallible step; anything malformed comes back as
//! `Error::UpstreamParse` and the pipeline degrades to a conversational
//! reply instead of executing a partial plan.

use crate::error::{Error, Result};
use serde::Deserialize;
use uuid::Uuid;

/// Identifier the prompt allows for the single supported mutating action.
pub const ACTION_ORGANIZE: &str = "organize_tasks";

#[derive(Debug, Clone, Deserialize)]
pub struct ActionPlan {
    pub action: String,
    #[serde(default)]
    pub folders: Vec<FolderGroup>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FolderGroup {
    pub name: String,
    #[serde(default)]
    pub task_ids: Vec<Uuid>,
}

/// Parse raw model output into an [`ActionPlan`].
///
/// Models wrap JSON in markdown fences often enough that the payload is
/// extracted between the first `{` and the last `}` before parsing.
pub fn parse_plan(raw: &str) -> Result<ActionPlan> {
    let start = raw.find('{');
    let end = raw.rfind('}');
    let body = match (start, end) {
        (Some(start), Some(end)) if start < end => &raw[start..=end],
        _ => return Err(Error::UpstreamParse("no JSON object in model output".into())),
    };
    serde_json::from_str(body).map_err(|e| Error::UpstreamParse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_bare_plan() {
        let raw = r#"{"action":"organize_tasks","folders":[{"name":"Dev","task_ids":["7b1f6e6e-8d1a-4c5b-9d5e-111111111111"]}],"message":""}"#;
        let plan = parse_plan(raw).unwrap();
        assert_eq!(plan.action, ACTION_ORGANIZE);
        assert_eq!(plan.folders.len(), 1);
        assert_eq!(plan.folders[0].name, "Dev");
        assert_eq!(plan.folders[0].task_ids.len(), 1);
    }

    #[test]
    fn strips_markdown_fences() {
        let raw = "```json\n{\"action\":\"reply\",\"message\":\"olá\"}\n```";
        let plan = parse_plan(raw).unwrap();
        assert_eq!(plan.action, "reply");
        assert_eq!(plan.message.as_deref(), Some("olá"));
    }

    #[test]
    fn free_text_is_a_parse_error() {
        let err = parse_plan("Claro! Vou organizar suas tarefas.").unwrap_err();
        assert!(matches!(err, Error::UpstreamParse(_)));
    }

    #[test]
    fn malformed_ids_are_a_parse_error() {
        let raw = r#"{"action":"organize_tasks","folders":[{"name":"Dev","task_ids":["t1"]}]}"#;
        let err = parse_plan(raw).unwrap_err();
        assert!(matches!(err, Error::UpstreamParse(_)));
    }
}
