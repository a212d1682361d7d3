//! Chat pipeline
//!
//! The end-to-end path behind `POST /api/chat`: rate limit, intent routing,
//! model completion, plan parsing, plan execution. Every downstream failure
//! that has a conversational answer is degraded to one here; only the rate
//! limit and malformed requests surface as HTTP errors.

use crate::auth::IdentityProvider;
use crate::chat::executor::PlanExecutor;
use crate::chat::model::ModelClient;
use crate::chat::plan::{self, ACTION_ORGANIZE};
use crate::chat::prompt::build_system_prompt;
use crate::chat::rate_limit::RateLimiter;
use crate::chat::router::{self, Intent, GREETING_REPLY};
use crate::chat::types::{ChatRequest, ChatResponse};
use crate::error::{Error, Result};
use crate::store::models::{Actor, Environment};
use crate::store::traits::EntityStore;
use crate::tenant::TenantResolver;
use std::sync::Arc;
use tracing::{debug, info};

/// Bucket shared by every request that carries no token. Anonymous callers
/// rate-limit each other; authenticated callers each get their own window.
const ANONYMOUS_KEY: &str = "anonymous";

const AUTH_REQUIRED_REPLY: &str =
    "Para organizar suas tarefas você precisa estar logado. Entre na sua conta e tente novamente.";

const NOT_A_MEMBER_REPLY: &str =
    "Você não faz parte da organização dessas tarefas, então não posso alterá-las.";

pub struct ChatPipeline {
    store: Arc<dyn EntityStore>,
    model: Arc<dyn ModelClient>,
    identity: Arc<dyn IdentityProvider>,
    limiter: RateLimiter,
}

impl ChatPipeline {
    pub fn new(
        store: Arc<dyn EntityStore>,
        model: Arc<dyn ModelClient>,
        identity: Arc<dyn IdentityProvider>,
        limiter: RateLimiter,
    ) -> Self {
        Self {
            store,
            model,
            identity,
            limiter,
        }
    }

    pub async fn handle(&self, request: ChatRequest) -> Result<ChatResponse> {
        let limiter_key = request.user_token.as_deref().unwrap_or(ANONYMOUS_KEY);
        self.limiter.check(limiter_key)?;

        let last_user = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .ok_or_else(|| Error::Validation("no user message in conversation".into()))?;

        if router::classify(&last_user.content) == Intent::Greeting {
            debug!("greeting short-circuit, no completion");
            return Ok(ChatResponse {
                reply: GREETING_REPLY.into(),
                success: true,
                debug_action: Some("greeting".into()),
            });
        }

        let system = build_system_prompt(&request.tasks);
        let raw = self.model.complete(&system, &request.messages).await?;

        let plan = match plan::parse_plan(&raw) {
            Ok(plan) => plan,
            Err(e) => {
                // Off-protocol output still reads like an answer; hand it
                // to the user instead of failing the request.
                debug!(error = %e, "model output off-protocol, degrading to plain reply");
                return Ok(ChatResponse {
                    reply: raw,
                    success: true,
                    debug_action: Some("reply".into()),
                });
            }
        };

        if plan.action != ACTION_ORGANIZE {
            return Ok(ChatResponse {
                reply: plan
                    .message
                    .unwrap_or_else(|| "Desculpe, não entendi. Pode reformular?".into()),
                success: true,
                debug_action: Some("reply".into()),
            });
        }

        let actor = self.resolve_actor(request.user_token.as_deref()).await;
        let env = infer_environment(&request);

        // The task context names the environment; the actor's memberships
        // decide whether they may mutate it
        if let (Environment::Organization(org), Some(actor)) = (&env, &actor) {
            let resolver = TenantResolver::new(self.store.clone());
            match resolver.switch(actor, env).await {
                Ok(_) => {}
                Err(Error::NotAMember(_)) => {
                    info!(%org, actor = %actor.id, "organize refused, not a member");
                    return Ok(ChatResponse {
                        reply: NOT_A_MEMBER_REPLY.into(),
                        success: false,
                        debug_action: Some("not_a_member".into()),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        // Execute with the actor's credential so the store's row-level
        // enforcement evaluates as them, not as the service
        let store = match request.user_token.as_deref() {
            Some(token) if actor.is_some() => self.store.clone().scoped_to_actor(token),
            _ => self.store.clone(),
        };
        let executor = PlanExecutor::new(store);
        match executor.organize(actor.as_ref(), &env, &plan).await {
            Ok(result) => {
                info!(
                    lists_created = result.lists_created,
                    tasks_moved = result.tasks_moved,
                    failed = result.failed_groups.len(),
                    "organize plan executed"
                );
                Ok(ChatResponse {
                    reply: result.message,
                    success: result.success,
                    debug_action: Some(ACTION_ORGANIZE.into()),
                })
            }
            Err(Error::AuthenticationRequired) => Ok(ChatResponse {
                reply: AUTH_REQUIRED_REPLY.into(),
                success: false,
                debug_action: Some("auth_required".into()),
            }),
            Err(e) => Err(e),
        }
    }

    /// An invalid token is treated as no token: the executor decides
    /// whether the action actually needs an identity.
    async fn resolve_actor(&self, token: Option<&str>) -> Option<Actor> {
        let token = token?;
        match self.identity.resolve(token).await {
            Ok(actor) => Some(actor),
            Err(e) => {
                debug!(error = %e, "token did not resolve to an actor");
                None
            }
        }
    }
}

/// The plan executes in the environment the task context came from: the
/// first row carrying an organization id decides, otherwise Personal.
fn infer_environment(request: &ChatRequest) -> Environment {
    request
        .tasks
        .iter()
        .find_map(|t| t.organization_id)
        .map(Environment::Organization)
        .unwrap_or(Environment::Personal)
}
