//! PostgREST-backed implementation of EntityStore
//!
//! Talks to a PostgREST-compatible persistence service (Supabase-style):
//! row filters go in the query string, inserts return the created row via
//! `Prefer: return=representation`. The Personal environment is always
//! expressed as an explicit `organization_id=is.null` filter — never by
//! omitting the parameter — so an organization row can never satisfy a
//! personal query.
//!
//! The service is expected to enforce row-level security mirroring the
//! permission evaluator; when an actor token is attached it is forwarded as
//! the bearer credential so that enforcement applies per-actor.

use crate::error::{Error, Result};
use crate::store::models::*;
use crate::store::traits::EntityStore;
use crate::trash;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct RestStore {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    /// Actor bearer token; falls back to the service key when absent
    actor_token: Option<String>,
}

impl RestStore {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            actor_token: None,
        }
    }

    /// Scope subsequent requests to an actor's credential so the service's
    /// row-level security evaluates as that actor.
    pub fn with_actor_token(&self, token: &str) -> Self {
        let mut scoped = self.clone();
        scoped.actor_token = Some(token.to_string());
        scoped
    }

    fn url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn bearer(&self) -> &str {
        self.actor_token.as_deref().unwrap_or(&self.api_key)
    }

    fn get(&self, table: &str) -> reqwest::RequestBuilder {
        self.http
            .get(self.url(table))
            .header("apikey", &self.api_key)
            .bearer_auth(self.bearer())
    }

    fn write(&self, method: reqwest::Method, table: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, self.url(table))
            .header("apikey", &self.api_key)
            .header("Prefer", "return=representation")
            .bearer_auth(self.bearer())
    }

    /// Environment filter for listing queries. Personal is the pair
    /// `organization_id=is.null` + `owner_id=eq.{actor}`; the null filter is
    /// always explicit.
    fn scope(env: &Environment, actor: Option<&Actor>) -> Vec<(String, String)> {
        match env {
            Environment::Personal => {
                let mut params = vec![("organization_id".into(), "is.null".into())];
                if let Some(actor) = actor {
                    params.push(("owner_id".into(), format!("eq.{}", actor.id)));
                }
                params
            }
            Environment::Organization(org) => {
                vec![("organization_id".into(), format!("eq.{org}"))]
            }
        }
    }

    async fn expect_ok(resp: reqwest::Response) -> Result<reqwest::Response> {
        let status = resp.status();
        if status.is_success() {
            Ok(resp)
        } else {
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(%status, %body, "store request failed");
            Err(Error::Store(format!("store returned {status}")))
        }
    }

    async fn rows<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> Result<Vec<T>> {
        Self::expect_ok(resp)
            .await?
            .json::<Vec<T>>()
            .await
            .map_err(|e| Error::Store(format!("malformed store response: {e}")))
    }

    async fn single<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
        Self::rows::<T>(resp)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Store("insert returned no representation".into()))
    }

    /// Unscoped list fetch used to tell "absent" apart from "belongs to
    /// another environment" before a write touches anything.
    async fn check_list_scope(&self, env: &Environment, list_id: Uuid) -> Result<()> {
        let resp = self
            .get("lists")
            .query(&[("id", format!("eq.{list_id}")), ("select", "*".into())])
            .send()
            .await?;
        let rows: Vec<List> = Self::rows(resp).await?;
        match rows.into_iter().next() {
            None => Err(Error::NotFound(format!("list {list_id}"))),
            Some(list) if env.matches(list.organization_id) => Ok(()),
            Some(_) => Err(Error::CrossTenant(format!(
                "list {list_id} belongs to another environment"
            ))),
        }
    }

    async fn patch_task(
        &self,
        env: &Environment,
        id: Uuid,
        body: serde_json::Value,
    ) -> Result<Vec<Task>> {
        let mut params = vec![("id".to_string(), format!("eq.{id}"))];
        params.extend(Self::scope(env, None));
        let resp = self
            .write(reqwest::Method::PATCH, "tasks")
            .query(&params)
            .json(&body)
            .send()
            .await?;
        Self::rows(resp).await
    }
}

#[async_trait]
impl EntityStore for RestStore {
    fn scoped_to_actor(self: Arc<Self>, token: &str) -> Arc<dyn EntityStore> {
        Arc::new(self.with_actor_token(token))
    }

    // ========================================================================
    // Lists
    // ========================================================================

    async fn create_list(&self, env: &Environment, actor: &Actor, title: &str) -> Result<List> {
        if title.trim().is_empty() {
            return Err(Error::Validation("list title must not be empty".into()));
        }
        // Environment and owner stamped atomically with the insert
        let payload = json!({
            "title": title,
            "owner_id": actor.id,
            "organization_id": env.organization_id(),
        });
        let resp = self
            .write(reqwest::Method::POST, "lists")
            .json(&payload)
            .send()
            .await?;
        Self::single(resp).await
    }

    async fn list_lists(&self, env: &Environment, actor: &Actor) -> Result<Vec<List>> {
        let mut params = vec![
            ("select".to_string(), "*".to_string()),
            ("order".to_string(), "created_at.asc".to_string()),
        ];
        params.extend(Self::scope(env, Some(actor)));
        let resp = self.get("lists").query(&params).send().await?;
        Self::rows(resp).await
    }

    async fn find_list_by_title(
        &self,
        env: &Environment,
        actor: &Actor,
        title: &str,
    ) -> Result<Option<List>> {
        let mut params = vec![
            ("select".to_string(), "*".to_string()),
            ("title".to_string(), format!("eq.{title}")),
            ("order".to_string(), "created_at.asc".to_string()),
            ("limit".to_string(), "1".to_string()),
        ];
        params.extend(Self::scope(env, Some(actor)));
        let resp = self.get("lists").query(&params).send().await?;
        Ok(Self::rows::<List>(resp).await?.into_iter().next())
    }

    async fn get_list(&self, env: &Environment, id: Uuid) -> Result<Option<List>> {
        let mut params = vec![
            ("select".to_string(), "*".to_string()),
            ("id".to_string(), format!("eq.{id}")),
        ];
        params.extend(Self::scope(env, None));
        let resp = self.get("lists").query(&params).send().await?;
        Ok(Self::rows::<List>(resp).await?.into_iter().next())
    }

    async fn delete_list(&self, env: &Environment, id: Uuid) -> Result<()> {
        // Orphaned tasks fall back to the inbox before the list goes away
        let mut task_params = vec![("list_id".to_string(), format!("eq.{id}"))];
        task_params.extend(Self::scope(env, None));
        let resp = self
            .write(reqwest::Method::PATCH, "tasks")
            .query(&task_params)
            .json(&json!({ "list_id": null }))
            .send()
            .await?;
        Self::expect_ok(resp).await?;

        let mut params = vec![("id".to_string(), format!("eq.{id}"))];
        params.extend(Self::scope(env, None));
        let resp = self
            .write(reqwest::Method::DELETE, "lists")
            .query(&params)
            .send()
            .await?;
        let deleted: Vec<List> = Self::rows(resp).await?;
        if deleted.is_empty() {
            return Err(Error::NotFound(format!("list {id}")));
        }
        Ok(())
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
        let payload = json!({
            "title": fields.title,
            "description": fields.description,
            "priority": fields.priority,
            "status": TaskStatus::Pending,
            "owner_id": actor.id,
            "organization_id": env.organization_id(),
            "list_id": fields.list_id,
            "participants": [],
        });
        let resp = self
            .write(reqwest::Method::POST, "tasks")
            .json(&payload)
            .send()
            .await?;
        Self::single(resp).await
    }

    async fn get_task(&self, env: &Environment, id: Uuid) -> Result<Option<Task>> {
        let mut params = vec![
            ("select".to_string(), "*".to_string()),
            ("id".to_string(), format!("eq.{id}")),
        ];
        params.extend(Self::scope(env, None));
        let resp = self.get("tasks").query(&params).send().await?;
        Ok(Self::rows::<Task>(resp).await?.into_iter().next())
    }

    async fn list_tasks(
        &self,
        env: &Environment,
        actor: &Actor,
        query: &TaskQuery,
    ) -> Result<Vec<Task>> {
        let mut params = vec![("select".to_string(), "*".to_string())];
        params.extend(Self::scope(env, Some(actor)));
        match query.view {
            TaskView::Normal => {
                params.push(("deleted_at".into(), "is.null".into()));
                params.push(("order".into(), "created_at.desc".into()));
                if let Some(status) = query.status {
                    params.push(("status".into(), format!("eq.{}", status_slug(status))));
                }
                if let Some(priority) = query.priority {
                    params.push(("priority".into(), format!("eq.{}", priority_slug(priority))));
                }
            }
            TaskView::Trash => {
                // Lazy expiry: rows past the retention window are hidden by
                // the query, not removed from storage. gte keeps a row
                // trashed exactly RETENTION_DAYS ago visible, matching
                // trash::is_expired
                let cutoff = Utc::now() - Duration::days(trash::RETENTION_DAYS);
                params.push(("deleted_at".into(), format!("gte.{}", cutoff.to_rfc3339())));
                params.push(("order".into(), "deleted_at.desc".into()));
            }
        }
        let resp = self.get("tasks").query(&params).send().await?;
        Self::rows(resp).await
    }

    async fn update_task(&self, env: &Environment, id: Uuid, patch: TaskPatch) -> Result<()> {
        if let Some(Some(list_id)) = patch.list_id {
            self.check_list_scope(env, list_id).await?;
        }
        let mut body = serde_json::Map::new();
        if let Some(title) = patch.title {
            if title.trim().is_empty() {
                return Err(Error::Validation("task title must not be empty".into()));
            }
            body.insert("title".into(), json!(title));
        }
        if let Some(description) = patch.description {
            body.insert("description".into(), json!(description));
        }
        if let Some(priority) = patch.priority {
            body.insert("priority".into(), json!(priority));
        }
        if let Some(status) = patch.status {
            body.insert("status".into(), json!(status));
        }
        if let Some(list_id) = patch.list_id {
            body.insert("list_id".into(), json!(list_id));
        }
        if body.is_empty() {
            return Ok(());
        }
        let updated = self.patch_task(env, id, serde_json::Value::Object(body)).await?;
        if updated.is_empty() {
            return Err(Error::NotFound(format!("task {id}")));
        }
        Ok(())
    }

    async fn move_tasks_to_list(
        &self,
        env: &Environment,
        list_id: Uuid,
        task_ids: &[Uuid],
    ) -> Result<usize> {
        if task_ids.is_empty() {
            return Ok(0);
        }
        self.check_list_scope(env, list_id).await?;
        let ids = task_ids
            .iter()
            .map(Uuid::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let mut params = vec![("id".to_string(), format!("in.({ids})"))];
        params.extend(Self::scope(env, None));
        let resp = self
            .write(reqwest::Method::PATCH, "tasks")
            .query(&params)
            .json(&json!({ "list_id": list_id }))
            .send()
            .await?;
        let moved: Vec<Task> = Self::rows(resp).await?;
        Ok(moved.len())
    }

    // ========================================================================
    // Soft-delete lifecycle
    // ========================================================================

    async fn soft_delete_task(&self, env: &Environment, id: Uuid) -> Result<()> {
        let updated = self
            .patch_task(env, id, json!({ "deleted_at": Utc::now() }))
            .await?;
        if updated.is_empty() {
            return Err(Error::NotFound(format!("task {id}")));
        }
        Ok(())
    }

    async fn restore_task(&self, env: &Environment, id: Uuid) -> Result<()> {
        let updated = self.patch_task(env, id, json!({ "deleted_at": null })).await?;
        if updated.is_empty() {
            return Err(Error::NotFound(format!("task {id}")));
        }
        Ok(())
    }

    async fn purge_task(&self, env: &Environment, id: Uuid) -> Result<()> {
        let mut params = vec![("id".to_string(), format!("eq.{id}"))];
        params.extend(Self::scope(env, None));
        let resp = self
            .write(reqwest::Method::DELETE, "tasks")
            .query(&params)
            .send()
            .await?;
        let deleted: Vec<Task> = Self::rows(resp).await?;
        if deleted.is_empty() {
            return Err(Error::NotFound(format!("task {id}")));
        }
        Ok(())
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let cutoff = now - Duration::days(trash::RETENTION_DAYS);
        let resp = self
            .write(reqwest::Method::DELETE, "tasks")
            .query(&[("deleted_at", format!("lt.{}", cutoff.to_rfc3339()))])
            .send()
            .await?;
        let purged: Vec<Task> = Self::rows(resp).await?;
        Ok(purged.len())
    }

    // ========================================================================
    // Participants (read-modify-write; last write wins, as everywhere else)
    // ========================================================================

    async fn add_participant(
        &self,
        env: &Environment,
        task_id: Uuid,
        actor_id: Uuid,
    ) -> Result<()> {
        let task = self
            .get_task(env, task_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("task {task_id}")))?;
        let mut participants = task.participants;
        if !participants.contains(&actor_id) {
            participants.push(actor_id);
        }
        self.patch_task(env, task_id, json!({ "participants": participants }))
            .await?;
        Ok(())
    }

    async fn remove_participant(
        &self,
        env: &Environment,
        task_id: Uuid,
        actor_id: Uuid,
    ) -> Result<()> {
        let task = self
            .get_task(env, task_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("task {task_id}")))?;
        let participants: Vec<Uuid> = task
            .participants
            .into_iter()
            .filter(|p| *p != actor_id)
            .collect();
        self.patch_task(env, task_id, json!({ "participants": participants }))
            .await?;
        Ok(())
    }

    // ========================================================================
    // Organizations & memberships
    // ========================================================================

    async fn create_organization(&self, org: &Organization) -> Result<()> {
        let resp = self
            .write(reqwest::Method::POST, "organizations")
            .json(&json!({
                "id": org.id,
                "name": org.name,
                "code": org.code,
                "created_by": org.created_by,
            }))
            .send()
            .await?;
        Self::expect_ok(resp).await?;
        Ok(())
    }

    async fn get_organization(&self, id: Uuid) -> Result<Option<Organization>> {
        let resp = self
            .get("organizations")
            .query(&[("select", "*".to_string()), ("id", format!("eq.{id}"))])
            .send()
            .await?;
        Ok(Self::rows::<Organization>(resp).await?.into_iter().next())
    }

    async fn find_organization_by_code(&self, code: &str) -> Result<Option<Organization>> {
        let resp = self
            .get("organizations")
            .query(&[
                ("select", "*".to_string()),
                ("code", format!("eq.{code}")),
            ])
            .send()
            .await?;
        Ok(Self::rows::<Organization>(resp).await?.into_iter().next())
    }

    async fn delete_organization(&self, id: Uuid) -> Result<()> {
        let resp = self
            .write(reqwest::Method::DELETE, "organization_members")
            .query(&[("organization_id", format!("eq.{id}"))])
            .send()
            .await?;
        Self::expect_ok(resp).await?;
        let resp = self
            .write(reqwest::Method::DELETE, "organizations")
            .query(&[("id", format!("eq.{id}"))])
            .send()
            .await?;
        Self::expect_ok(resp).await?;
        Ok(())
    }

    async fn add_membership(&self, membership: &Membership) -> Result<()> {
        let resp = self
            .write(reqwest::Method::POST, "organization_members")
            .json(&membership)
            .send()
            .await?;
        // The unique (organization, actor) constraint surfaces as a 409
        if resp.status() == reqwest::StatusCode::CONFLICT {
            return Err(Error::Validation(
                "actor is already a member of this organization".into(),
            ));
        }
        Self::expect_ok(resp).await?;
        Ok(())
    }

    async fn remove_membership(&self, organization_id: Uuid, actor_id: Uuid) -> Result<()> {
        let resp = self
            .write(reqwest::Method::DELETE, "organization_members")
            .query(&[
                ("organization_id", format!("eq.{organization_id}")),
                ("actor_id", format!("eq.{actor_id}")),
            ])
            .send()
            .await?;
        Self::expect_ok(resp).await?;
        Ok(())
    }

    async fn list_memberships(&self, actor_id: Uuid) -> Result<Vec<(Organization, Role)>> {
        let resp = self
            .get("organization_members")
            .query(&[
                ("select", "*".to_string()),
                ("actor_id", format!("eq.{actor_id}")),
            ])
            .send()
            .await?;
        let memberships: Vec<Membership> = Self::rows(resp).await?;
        if memberships.is_empty() {
            return Ok(Vec::new());
        }
        let ids = memberships
            .iter()
            .map(|m| m.organization_id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let resp = self
            .get("organizations")
            .query(&[
                ("select", "*".to_string()),
                ("id", format!("in.({ids})")),
                ("order", "created_at.asc".to_string()),
            ])
            .send()
            .await?;
        let orgs: Vec<Organization> = Self::rows(resp).await?;
        Ok(orgs
            .into_iter()
            .filter_map(|org| {
                memberships
                    .iter()
                    .find(|m| m.organization_id == org.id)
                    .map(|m| (org, m.role))
            })
            .collect())
    }

    async fn get_membership_role(
        &self,
        organization_id: Uuid,
        actor_id: Uuid,
    ) -> Result<Option<Role>> {
        let resp = self
            .get("organization_members")
            .query(&[
                ("select", "*".to_string()),
                ("organization_id", format!("eq.{organization_id}")),
                ("actor_id", format!("eq.{actor_id}")),
            ])
            .send()
            .await?;
        Ok(Self::rows::<Membership>(resp)
            .await?
            .into_iter()
            .next()
            .map(|m| m.role))
    }
}

fn status_slug(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "pending",
        TaskStatus::Completed => "completed",
    }
}

fn priority_slug(priority: Priority) -> &'static str {
    match priority {
        Priority::None => "none",
        Priority::Low => "low",
        Priority::High => "high",
    }
}
