//! Conversational intent router
//!
//! Cheap pre-filter in front of the model: plain greetings get a canned
//! reply without paying for a completion, messages mentioning a supported
//! action are marked actionable, everything else is ambiguous and goes to
//! the model for interpretation.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Exact greeting, no actionable keyword → canned reply, no model call
    Greeting,
    /// Mentions a supported action (organize / summarize / rewrite)
    Actionable,
    /// Everything else; the model decides
    Ambiguous,
}

const GREETINGS: &[&str] = &[
    "oi",
    "olá",
    "ola",
    "bom dia",
    "boa tarde",
    "boa noite",
    "e aí",
    "eai",
    "hello",
    "hi",
    "hey",
];

/// Stems covering the supported actions in Portuguese and English.
const ACTION_KEYWORDS: &[&str] = &[
    "organiz", "pasta", "separ", "agrup", "resum", "summar", "reescrev", "reformul", "rewrite",
];

pub const GREETING_REPLY: &str =
    "Olá! Sou seu assistente de tarefas. Posso organizar suas tarefas em pastas, resumir ou reformular textos. Como posso ajudar?";

pub fn classify(message: &str) -> Intent {
    let normalized = message
        .trim()
        .trim_end_matches(['!', '?', '.'])
        .trim()
        .to_lowercase();

    let has_keyword = ACTION_KEYWORDS.iter().any(|k| normalized.contains(k));
    if !has_keyword && GREETINGS.contains(&normalized.as_str()) {
        return Intent::Greeting;
    }
    if has_keyword {
        return Intent::Actionable;
    }
    Intent::Ambiguous
}
