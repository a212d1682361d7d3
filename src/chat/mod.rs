//! Conversational assistant over the task store
//!
//! `pipeline` is the entry point; the other modules are its stages:
//! `router` classifies intent, `prompt`/`model` produce a completion,
//! `plan` parses it, `executor` applies it, `rate_limit` throttles callers.

pub mod executor;
pub mod model;
pub mod pipeline;
pub mod plan;
pub mod prompt;
pub mod rate_limit;
pub mod router;
pub mod types;

pub use executor::{ExecutionResult, PlanExecutor};
pub use model::{MockModel, ModelClient, OpenAiClient};
pub use pipeline::ChatPipeline;
pub use plan::{parse_plan, ActionPlan, FolderGroup};
pub use rate_limit::RateLimiter;
pub use router::{classify, Intent};
pub use types::{ChatMessage, ChatRequest, ChatResponse, TaskContext};
