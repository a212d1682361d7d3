//! Shared factories for unit tests

use crate::store::models::{Actor, Organization, Priority, Task, TaskStatus};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Actor with a fresh id; the local part of the email doubles as the name.
pub fn actor(email: &str) -> Actor {
    let name = email.split('@').next().unwrap_or(email).to_string();
    Actor {
        id: Uuid::new_v4(),
        email: email.to_string(),
        name,
    }
}

pub fn organization(name: &str, created_by: Uuid) -> Organization {
    Organization {
        id: Uuid::new_v4(),
        name: name.to_string(),
        code: format!("{name}-test"),
        created_by,
        created_at: Utc::now(),
    }
}

/// Personal-environment task already in the trash.
pub fn trashed_task(owner: &Actor, deleted_at: DateTime<Utc>) -> Task {
    Task {
        id: Uuid::new_v4(),
        title: "trashed".into(),
        description: String::new(),
        priority: Priority::None,
        status: TaskStatus::Pending,
        owner_id: owner.id,
        organization_id: None,
        list_id: None,
        created_at: deleted_at,
        deleted_at: Some(deleted_at),
        participants: Vec::new(),
    }
}
