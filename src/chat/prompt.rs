//! System prompt for the chat agent
//!
//! The model is an untrusted text oracle: the prompt constrains it to emit
//! one of a fixed set of action identifiers inside a strict JSON payload,
//! no free text around it, so the executor can parse deterministically.
//! Output that violates the shape is degraded to a plain reply by the
//! parse boundary in `plan.rs`.

use crate::chat::types::TaskContext;

pub const SYSTEM_PROMPT: &str = r#"Você é um assistente dentro de um sistema de tarefas.
Responda de forma clara, objetiva e amigável.

Você DEVE responder SEMPRE com um único objeto JSON, sem nenhum texto fora dele.

Formato:
{"action": "<identificador>", "folders": [...], "message": "<texto para o usuário>"}

Ações suportadas:
- "organize_tasks": agrupar tarefas em pastas. Preencha "folders" com
  [{"name": "<nome da pasta>", "task_ids": ["<id>", ...]}] usando apenas os
  ids listados no contexto de tarefas abaixo. Deixe "message" vazio; o
  sistema gera o resumo da execução.
- "reply": qualquer outro pedido (resumir, reformular, responder perguntas).
  Deixe "folders" vazio e coloque sua resposta em "message".

Nunca invente ids de tarefas. Nunca use outra ação além das listadas."#;

/// Full system instruction: fixed protocol plus the caller's task context
/// serialized as JSON so the model can reference real ids.
pub fn build_system_prompt(tasks: &[TaskContext]) -> String {
    let context = serde_json::to_string_pretty(tasks).unwrap_or_else(|_| "[]".into());
    format!("{SYSTEM_PROMPT}\n\nContexto de tarefas do usuário:\n{context}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::models::{Priority, TaskStatus};
    use uuid::Uuid;

    #[test]
    fn prompt_embeds_the_task_context() {
        let id = Uuid::new_v4();
        let tasks = vec![TaskContext {
            id,
            title: "Fix bug".into(),
            priority: Priority::High,
            status: TaskStatus::Pending,
            organization_id: None,
        }];
        let prompt = build_system_prompt(&tasks);
        assert!(prompt.contains(&id.to_string()));
        assert!(prompt.contains("organize_tasks"));
    }
}
