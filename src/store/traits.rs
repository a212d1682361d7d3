//! EntityStore trait definition
//!
//! Abstract interface over the persistence service. Every scoped read and
//! write takes the caller-resolved [`Environment`] as an explicit parameter;
//! this is the isolation invariant's enforcement point. Implemented by the
//! PostgREST backend (`RestStore`) and the in-memory backend (`MemoryStore`).

use crate::error::Result;
use crate::store::models::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Handle whose requests carry the actor's bearer credential, so
    /// backends with row-level enforcement evaluate as that actor.
    /// Backends without per-actor credentials return themselves.
    fn scoped_to_actor(self: Arc<Self>, token: &str) -> Arc<dyn EntityStore>;

    // ========================================================================
    // Lists
    // ========================================================================

    /// Create a list stamped with the environment and acting actor,
    /// atomically with the insert. Empty title → `Error::Validation`.
    async fn create_list(&self, env: &Environment, actor: &Actor, title: &str) -> Result<List>;

    /// Lists visible in the environment, oldest first.
    async fn list_lists(&self, env: &Environment, actor: &Actor) -> Result<Vec<List>>;

    /// Exact, case-sensitive title lookup within the environment.
    /// First match wins; no fuzzy matching.
    async fn find_list_by_title(
        &self,
        env: &Environment,
        actor: &Actor,
        title: &str,
    ) -> Result<Option<List>>;

    /// Get a list by id, scoped to the environment.
    async fn get_list(&self, env: &Environment, id: Uuid) -> Result<Option<List>>;

    /// Hard-delete a list. Tasks referencing it keep their `list_id` until
    /// updated (the store boundary cascades or nulls, backend-dependent).
    async fn delete_list(&self, env: &Environment, id: Uuid) -> Result<()>;

    // ========================================================================
    // Tasks
    // ========================================================================

    /// Create a task stamped with the environment and acting actor.
    /// Empty title → `Error::Validation`; `list_id` pointing into another
    /// environment → `Error::CrossTenant`, rejected before persisting.
    async fn create_task(&self, env: &Environment, actor: &Actor, fields: NewTask) -> Result<Task>;

    /// Get a task by id, scoped to the environment.
    async fn get_task(&self, env: &Environment, id: Uuid) -> Result<Option<Task>>;

    /// Tasks matching the query within the environment. Normal view: newest
    /// first, trashed rows excluded. Trash view: most recently trashed
    /// first, rows past the retention window lazily filtered out.
    async fn list_tasks(
        &self,
        env: &Environment,
        actor: &Actor,
        query: &TaskQuery,
    ) -> Result<Vec<Task>>;

    /// Partial update. Setting `list_id` to a list of another environment
    /// → `Error::CrossTenant`, rejected before persisting.
    async fn update_task(&self, env: &Environment, id: Uuid, patch: TaskPatch) -> Result<()>;

    /// Bulk re-assignment of `list_id`, regardless of the tasks' current
    /// list. Only rows stamped with this environment are matched; returns
    /// the number of tasks actually moved.
    async fn move_tasks_to_list(
        &self,
        env: &Environment,
        list_id: Uuid,
        task_ids: &[Uuid],
    ) -> Result<usize>;

    // ========================================================================
    // Soft-delete lifecycle
    // ========================================================================

    /// Active → Trashed: stamps `deleted_at` with the current time.
    async fn soft_delete_task(&self, env: &Environment, id: Uuid) -> Result<()>;

    /// Trashed → Active: clears `deleted_at`.
    async fn restore_task(&self, env: &Environment, id: Uuid) -> Result<()>;

    /// Trashed → Purged: explicit hard delete ("delete forever").
    async fn purge_task(&self, env: &Environment, id: Uuid) -> Result<()>;

    /// Remove every trashed task past the retention window, across all
    /// environments. Run by the `sweep` job; returns the purge count.
    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize>;

    // ========================================================================
    // Participants
    // ========================================================================

    async fn add_participant(&self, env: &Environment, task_id: Uuid, actor_id: Uuid)
        -> Result<()>;

    async fn remove_participant(
        &self,
        env: &Environment,
        task_id: Uuid,
        actor_id: Uuid,
    ) -> Result<()>;

    // ========================================================================
    // Organizations & memberships
    // ========================================================================

    async fn create_organization(&self, org: &Organization) -> Result<()>;

    async fn get_organization(&self, id: Uuid) -> Result<Option<Organization>>;

    async fn find_organization_by_code(&self, code: &str) -> Result<Option<Organization>>;

    async fn delete_organization(&self, id: Uuid) -> Result<()>;

    async fn add_membership(&self, membership: &Membership) -> Result<()>;

    async fn remove_membership(&self, organization_id: Uuid, actor_id: Uuid) -> Result<()>;

    /// Organizations the actor belongs to, with their role, in join order.
    async fn list_memberships(&self, actor_id: Uuid) -> Result<Vec<(Organization, Role)>>;

    async fn get_membership_role(
        &self,
        organization_id: Uuid,
        actor_id: Uuid,
    ) -> Result<Option<Role>>;
}
