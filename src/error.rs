//! Domain error taxonomy
//!
//! Every fallible core operation returns `Result<T, Error>`. User-visible
//! failures carry a short natural-language message; transport detail stays
//! in the `Store` variant and is logged, never shown to clients.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Bad input shape or empty required field
    #[error("validation error: {0}")]
    Validation(String),

    /// A write would mix rows from different environments
    #[error("cross-tenant violation: {0}")]
    CrossTenant(String),

    /// Environment switch to an organization the actor does not belong to
    #[error("not a member of organization {0}")]
    NotAMember(uuid::Uuid),

    /// The action needs a logged-in actor
    #[error("authentication required")]
    AuthenticationRequired,

    /// Referenced list/task/organization is absent
    #[error("not found: {0}")]
    NotFound(String),

    /// Chat pipeline cooldown window not yet elapsed
    #[error("rate limited, retry in {0} seconds")]
    RateLimited(u64),

    /// Model output was not in the expected action-plan shape
    #[error("upstream parse error: {0}")]
    UpstreamParse(String),

    /// Store backend transport or query failure
    #[error("store error: {0}")]
    Store(String),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Store(err.to_string())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
