//! Entity types shared across the store backends
//!
//! Rows are fixed-shape records with nullable fields made explicit —
//! `organization_id: Option<Uuid>` where `None` means the Personal
//! environment, never an absent key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An authenticated identity. Created by the external identity provider;
/// referenced, never mutated, by this core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub email: String,
    pub name: String,
}

/// The tenant scope a data operation is evaluated against.
///
/// Resolved once per request and passed down explicitly — there is no
/// ambient "current organization" global.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// The actor's private space (`organization_id IS NULL` rows)
    Personal,
    /// A shared multi-actor tenant
    Organization(Uuid),
}

impl Environment {
    /// The nullable foreign key this environment stamps on rows.
    pub fn organization_id(&self) -> Option<Uuid> {
        match self {
            Environment::Personal => None,
            Environment::Organization(id) => Some(*id),
        }
    }

    pub fn from_organization_id(id: Option<Uuid>) -> Self {
        match id {
            None => Environment::Personal,
            Some(id) => Environment::Organization(id),
        }
    }

    /// Exact scope test: `None == None` for Personal, id equality for
    /// organizations. Never a falsy/absent-value shortcut.
    pub fn matches(&self, organization_id: Option<Uuid>) -> bool {
        self.organization_id() == organization_id
    }
}

/// A shared multi-actor tenant with a human-readable join code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    /// Unique join code, immutable once set
    pub code: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Member,
}

/// Links an actor to an organization. Unique per (organization, actor).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    pub organization_id: Uuid,
    pub actor_id: Uuid,
    pub role: Role,
}

/// A user-defined folder grouping tasks within one environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct List {
    pub id: Uuid,
    pub title: String,
    pub owner_id: Uuid,
    /// `None` = Personal environment
    pub organization_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    None,
    Low,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    /// Rich-text blob, opaque to the core (may embed inline images)
    #[serde(default)]
    pub description: String,
    pub priority: Priority,
    pub status: TaskStatus,
    pub owner_id: Uuid,
    /// `None` = Personal environment
    pub organization_id: Option<Uuid>,
    /// `None` = unassigned (inbox)
    pub list_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    /// Set = trashed; cleared on restore
    pub deleted_at: Option<DateTime<Utc>>,
    /// Non-creator actors granted edit visibility
    #[serde(default)]
    pub participants: Vec<Uuid>,
}

impl Task {
    pub fn is_trashed(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Which slice of the task table a listing targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskView {
    /// Only `deleted_at IS NULL` rows, newest first
    #[default]
    Normal,
    /// Only `deleted_at IS NOT NULL` rows, most recently trashed first.
    /// Rows past the retention window are filtered out lazily at read time.
    Trash,
}

/// Filter for `list_tasks`. Status/priority filters apply to the normal
/// view only; the trash view ignores them.
#[derive(Debug, Clone, Default)]
pub struct TaskQuery {
    pub view: TaskView,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
}

/// Fields supplied at task creation. Environment and owner are stamped by
/// the store atomically with the insert, never as a follow-up update.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub list_id: Option<Uuid>,
}

impl NewTask {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            priority: Priority::None,
            list_id: None,
        }
    }
}

/// Partial task update. `None` fields are skipped; the nested option on
/// `list_id` distinguishes "leave as-is" from "clear the assignment".
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<TaskStatus>,
    pub list_id: Option<Option<Uuid>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_matches_is_exact() {
        let org = Uuid::new_v4();
        assert!(Environment::Personal.matches(None));
        assert!(!Environment::Personal.matches(Some(org)));
        assert!(Environment::Organization(org).matches(Some(org)));
        assert!(!Environment::Organization(org).matches(None));
        assert!(!Environment::Organization(org).matches(Some(Uuid::new_v4())));
    }

    #[test]
    fn environment_round_trips_through_organization_id() {
        let org = Uuid::new_v4();
        for env in [Environment::Personal, Environment::Organization(org)] {
            assert_eq!(Environment::from_organization_id(env.organization_id()), env);
        }
    }

    #[test]
    fn priority_and_status_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&Priority::High).unwrap(), "\"high\"");
        assert_eq!(serde_json::to_string(&Priority::None).unwrap(), "\"none\"");
        assert_eq!(
            serde_json::to_string(&TaskStatus::Pending).unwrap(),
            "\"pending\""
        );
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
    }

    #[test]
    fn task_deserializes_with_missing_optional_fields() {
        let json = r#"{
            "id": "7b1f6e6e-8d1a-4c5b-9d5e-111111111111",
            "title": "Fix bug",
            "priority": "high",
            "status": "pending",
            "owner_id": "7b1f6e6e-8d1a-4c5b-9d5e-222222222222",
            "organization_id": null,
            "list_id": null,
            "created_at": "2025-01-01T00:00:00Z",
            "deleted_at": null
        }"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.description, "");
        assert!(task.participants.is_empty());
        assert!(!task.is_trashed());
    }
}
