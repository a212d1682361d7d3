//! In-memory implementation of EntityStore
//!
//! Backed by `tokio::sync::RwLock<HashMap<K, V>>` collections. Serves two
//! purposes: the backend for local (storeless) mode, and the seedable
//! backend used throughout the test suite.

use crate::error::{Error, Result};
use crate::store::models::*;
use crate::store::traits::EntityStore;
use crate::trash;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryStore {
    pub lists: RwLock<HashMap<Uuid, List>>,
    pub tasks: RwLock<HashMap<Uuid, Task>>,
    pub organizations: RwLock<HashMap<Uuid, Organization>>,
    pub memberships: RwLock<Vec<Membership>>,
    /// Test hook: list-title lookups for these titles fail with a store
    /// error, exercising the executor's partial-failure containment.
    fail_list_lookups: RwLock<HashSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Builder / seeding methods for tests and local mode
    // ========================================================================

    pub async fn with_organization(self, org: Organization) -> Self {
        self.organizations.write().await.insert(org.id, org);
        self
    }

    pub async fn with_membership(self, membership: Membership) -> Self {
        self.memberships.write().await.push(membership);
        self
    }

    pub async fn with_list(self, list: List) -> Self {
        self.lists.write().await.insert(list.id, list);
        self
    }

    pub async fn with_task(self, task: Task) -> Self {
        self.tasks.write().await.insert(task.id, task);
        self
    }

    /// Make `find_list_by_title` fail for the given title.
    pub async fn fail_list_lookup(&self, title: &str) {
        self.fail_list_lookups.write().await.insert(title.to_string());
    }

    /// Resolve a referenced list, distinguishing "absent" from "exists in
    /// another environment" — the latter is the cross-tenant case and must
    /// be rejected before anything is persisted.
    async fn check_list_scope(&self, env: &Environment, list_id: Uuid) -> Result<()> {
        let lists = self.lists.read().await;
        match lists.get(&list_id) {
            None => Err(Error::NotFound(format!("list {list_id}"))),
            Some(list) if env.matches(list.organization_id) => Ok(()),
            Some(_) => Err(Error::CrossTenant(format!(
                "list {list_id} belongs to another environment"
            ))),
        }
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    /// No per-actor credentials in memory; the handle is already scoped.
    fn scoped_to_actor(self: Arc<Self>, _token: &str) -> Arc<dyn EntityStore> {
        self
    }

    // ========================================================================
    // Lists
    // ========================================================================

    async fn create_list(&self, env: &Environment, actor: &Actor, title: &str) -> Result<List> {
        if title.trim().is_empty() {
            return Err(Error::Validation("list title must not be empty".into()));
        }
        let list = List {
            id: Uuid::new_v4(),
            title: title.to_string(),
            owner_id: actor.id,
            organization_id: env.organization_id(),
            created_at: Utc::now(),
        };
        self.lists.write().await.insert(list.id, list.clone());
        Ok(list)
    }

    async fn list_lists(&self, env: &Environment, actor: &Actor) -> Result<Vec<List>> {
        let lists = self.lists.read().await;
        let mut visible: Vec<List> = lists
            .values()
            .filter(|l| match env {
                Environment::Personal => {
                    l.organization_id.is_none() && l.owner_id == actor.id
                }
                Environment::Organization(org) => l.organization_id == Some(*org),
            })
            .cloned()
            .collect();
        visible.sort_by_key(|l| l.created_at);
        Ok(visible)
    }

    async fn find_list_by_title(
        &self,
        env: &Environment,
        actor: &Actor,
        title: &str,
    ) -> Result<Option<List>> {
        if self.fail_list_lookups.read().await.contains(title) {
            return Err(Error::Store(format!("lookup failed for '{title}'")));
        }
        let visible = self.list_lists(env, actor).await?;
        Ok(visible.into_iter().find(|l| l.title == title))
    }

    async fn get_list(&self, env: &Environment, id: Uuid) -> Result<Option<List>> {
        let lists = self.lists.read().await;
        Ok(lists
            .get(&id)
            .filter(|l| env.matches(l.organization_id))
            .cloned())
    }

    async fn delete_list(&self, env: &Environment, id: Uuid) -> Result<()> {
        let mut lists = self.lists.write().await;
        match lists.get(&id) {
            Some(l) if env.matches(l.organization_id) => {
                lists.remove(&id);
                // Orphaned tasks fall back to the inbox
                let mut tasks = self.tasks.write().await;
                for task in tasks.values_mut() {
                    if task.list_id == Some(id) {
                        task.list_id = None;
                    }
                }
                Ok(())
            }
            _ => Err(Error::NotFound(format!("list {id}"))),
        }
    }

    // ========================================================================
    // Tasks
    // ========================================================================

    async fn create_task(&self, env: &Environment, actor: &Actor, fields: NewTask) -> Result<Task> {
        if fields.title.trim().is_empty() {
            return Err(Error::Validation("task title must not be empty".into()));
        }
        if let Some(list_id) = fields.list_id {
            self.check_list_scope(env, list_id).await?;
        }
        let task = Task {
            id: Uuid::new_v4(),
            title: fields.title,
            description: fields.description,
            priority: fields.priority,
            status: TaskStatus::Pending,
            owner_id: actor.id,
            organization_id: env.organization_id(),
            list_id: fields.list_id,
            created_at: Utc::now(),
            deleted_at: None,
            participants: Vec::new(),
        };
        self.tasks.write().await.insert(task.id, task.clone());
        Ok(task)
    }

    async fn get_task(&self, env: &Environment, id: Uuid) -> Result<Option<Task>> {
        let tasks = self.tasks.read().await;
        Ok(tasks
            .get(&id)
            .filter(|t| env.matches(t.organization_id))
            .cloned())
    }

    async fn list_tasks(
        &self,
        env: &Environment,
        actor: &Actor,
        query: &TaskQuery,
    ) -> Result<Vec<Task>> {
        let now = Utc::now();
        let tasks = self.tasks.read().await;
        let mut visible: Vec<Task> = tasks
            .values()
            .filter(|t| match env {
                Environment::Personal => {
                    t.organization_id.is_none() && t.owner_id == actor.id
                }
                Environment::Organization(org) => t.organization_id == Some(*org),
            })
            .filter(|t| match query.view {
                TaskView::Normal => {
                    t.deleted_at.is_none()
                        && query.status.map_or(true, |s| t.status == s)
                        && query.priority.map_or(true, |p| t.priority == p)
                }
                TaskView::Trash => t
                    .deleted_at
                    .map_or(false, |deleted| !trash::is_expired(deleted, now)),
            })
            .cloned()
            .collect();
        match query.view {
            TaskView::Normal => visible.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            TaskView::Trash => visible.sort_by(|a, b| b.deleted_at.cmp(&a.deleted_at)),
        }
        Ok(visible)
    }

    async fn update_task(&self, env: &Environment, id: Uuid, patch: TaskPatch) -> Result<()> {
        if let Some(Some(list_id)) = patch.list_id {
            self.check_list_scope(env, list_id).await?;
        }
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(&id)
            .filter(|t| env.matches(t.organization_id))
            .ok_or_else(|| Error::NotFound(format!("task {id}")))?;
        if let Some(title) = patch.title {
            if title.trim().is_empty() {
                return Err(Error::Validation("task title must not be empty".into()));
            }
            task.title = title;
        }
        if let Some(description) = patch.description {
            task.description = description;
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        if let Some(status) = patch.status {
            task.status = status;
        }
        if let Some(list_id) = patch.list_id {
            task.list_id = list_id;
        }
        Ok(())
    }

    async fn move_tasks_to_list(
        &self,
        env: &Environment,
        list_id: Uuid,
        task_ids: &[Uuid],
    ) -> Result<usize> {
        self.check_list_scope(env, list_id).await?;
        let mut tasks = self.tasks.write().await;
        let mut moved = 0;
        for id in task_ids {
            if let Some(task) = tasks
                .get_mut(id)
                .filter(|t| env.matches(t.organization_id))
            {
                task.list_id = Some(list_id);
                moved += 1;
            }
        }
        Ok(moved)
    }

    // ========================================================================
    // Soft-delete lifecycle
    // ========================================================================

    async fn soft_delete_task(&self, env: &Environment, id: Uuid) -> Result<()> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(&id)
            .filter(|t| env.matches(t.organization_id))
            .ok_or_else(|| Error::NotFound(format!("task {id}")))?;
        task.deleted_at = Some(Utc::now());
        Ok(())
    }

    async fn restore_task(&self, env: &Environment, id: Uuid) -> Result<()> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(&id)
            .filter(|t| env.matches(t.organization_id))
            .ok_or_else(|| Error::NotFound(format!("task {id}")))?;
        task.deleted_at = None;
        Ok(())
    }

    async fn purge_task(&self, env: &Environment, id: Uuid) -> Result<()> {
        let mut tasks = self.tasks.write().await;
        match tasks.get(&id) {
            Some(t) if env.matches(t.organization_id) => {
                tasks.remove(&id);
                Ok(())
            }
            _ => Err(Error::NotFound(format!("task {id}"))),
        }
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut tasks = self.tasks.write().await;
        let before = tasks.len();
        tasks.retain(|_, t| {
            t.deleted_at
                .map_or(true, |deleted| !trash::is_expired(deleted, now))
        });
        Ok(before - tasks.len())
    }

    // ========================================================================
    // Participants
    // ========================================================================

    async fn add_participant(
        &self,
        env: &Environment,
        task_id: Uuid,
        actor_id: Uuid,
    ) -> Result<()> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(&task_id)
            .filter(|t| env.matches(t.organization_id))
            .ok_or_else(|| Error::NotFound(format!("task {task_id}")))?;
        if !task.participants.contains(&actor_id) {
            task.participants.push(actor_id);
        }
        Ok(())
    }

    async fn remove_participant(
        &self,
        env: &Environment,
        task_id: Uuid,
        actor_id: Uuid,
    ) -> Result<()> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(&task_id)
            .filter(|t| env.matches(t.organization_id))
            .ok_or_else(|| Error::NotFound(format!("task {task_id}")))?;
        task.participants.retain(|p| *p != actor_id);
        Ok(())
    }

    // ========================================================================
    // Organizations & memberships
    // ========================================================================

    async fn create_organization(&self, org: &Organization) -> Result<()> {
        self.organizations
            .write()
            .await
            .insert(org.id, org.clone());
        Ok(())
    }

    async fn get_organization(&self, id: Uuid) -> Result<Option<Organization>> {
        Ok(self.organizations.read().await.get(&id).cloned())
    }

    async fn find_organization_by_code(&self, code: &str) -> Result<Option<Organization>> {
        let orgs = self.organizations.read().await;
        Ok(orgs.values().find(|o| o.code == code).cloned())
    }

    async fn delete_organization(&self, id: Uuid) -> Result<()> {
        self.organizations.write().await.remove(&id);
        self.memberships
            .write()
            .await
            .retain(|m| m.organization_id != id);
        Ok(())
    }

    async fn add_membership(&self, membership: &Membership) -> Result<()> {
        let mut memberships = self.memberships.write().await;
        if memberships
            .iter()
            .any(|m| m.organization_id == membership.organization_id && m.actor_id == membership.actor_id)
        {
            return Err(Error::Validation(
                "actor is already a member of this organization".into(),
            ));
        }
        memberships.push(membership.clone());
        Ok(())
    }

    async fn remove_membership(&self, organization_id: Uuid, actor_id: Uuid) -> Result<()> {
        self.memberships
            .write()
            .await
            .retain(|m| !(m.organization_id == organization_id && m.actor_id == actor_id));
        Ok(())
    }

    async fn list_memberships(&self, actor_id: Uuid) -> Result<Vec<(Organization, Role)>> {
        let memberships = self.memberships.read().await;
        let orgs = self.organizations.read().await;
        Ok(memberships
            .iter()
            .filter(|m| m.actor_id == actor_id)
            .filter_map(|m| orgs.get(&m.organization_id).map(|o| (o.clone(), m.role)))
            .collect())
    }

    async fn get_membership_role(
        &self,
        organization_id: Uuid,
        actor_id: Uuid,
    ) -> Result<Option<Role>> {
        let memberships = self.memberships.read().await;
        Ok(memberships
            .iter()
            .find(|m| m.organization_id == organization_id && m.actor_id == actor_id)
            .map(|m| m.role))
    }
}
