//! Identity provider boundary
//!
//! Credentials live with an external identity provider; this core only
//! resolves an opaque bearer token to an [`Actor`]. The REST implementation
//! asks the provider's user endpoint; the mock backs the test suite.

use crate::error::{Error, Result};
use crate::store::models::Actor;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::Deserialize;

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve a bearer token to the actor it authenticates.
    /// Unknown or rejected tokens → `Error::AuthenticationRequired`.
    async fn resolve(&self, token: &str) -> Result<Actor>;
}

/// Supabase-shaped identity endpoint: `GET {base}/auth/v1/user` with the
/// token as bearer credential.
pub struct RestIdentity {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct UserResponse {
    id: uuid::Uuid,
    email: String,
    #[serde(default)]
    user_metadata: UserMetadata,
}

#[derive(Deserialize, Default)]
struct UserMetadata {
    #[serde(default)]
    name: Option<String>,
}

impl RestIdentity {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl IdentityProvider for RestIdentity {
    async fn resolve(&self, token: &str) -> Result<Actor> {
        let resp = self
            .http
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.api_key)
            .bearer_auth(token)
            .send()
            .await?;
        if !resp.status().is_success() {
            tracing::debug!(status = %resp.status(), "token rejected by identity provider");
            return Err(Error::AuthenticationRequired);
        }
        let user: UserResponse = resp
            .json()
            .await
            .map_err(|e| Error::Store(format!("malformed identity response: {e}")))?;
        Ok(Actor {
            id: user.id,
            name: user.user_metadata.name.unwrap_or_else(|| user.email.clone()),
            email: user.email,
        })
    }
}

/// In-memory token → actor map for tests and local mode.
#[derive(Default)]
pub struct MockIdentity {
    actors: DashMap<String, Actor>,
}

impl MockIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, token: &str, actor: Actor) -> Self {
        self.actors.insert(token.to_string(), actor);
        self
    }
}

#[async_trait]
impl IdentityProvider for MockIdentity {
    async fn resolve(&self, token: &str) -> Result<Actor> {
        self.actors
            .get(token)
            .map(|a| a.clone())
            .ok_or(Error::AuthenticationRequired)
    }
}
