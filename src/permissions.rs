//! Participant/permission evaluator
//!
//! Pure functions deriving an actor's rights on a task from its creator,
//! the actor's membership role, and the explicit participant list. Rules
//! evaluate in order, first match wins. These checks gate mutating actions
//! in this core; the store boundary re-enforces them via row-level security.

use crate::store::models::{Environment, Role, Task};
use uuid::Uuid;

/// Creator, org admin, or participant may edit. In the Personal
/// environment query-level isolation already hides the task from everyone
/// but the creator, who always has full rights.
pub fn can_edit(task: &Task, actor_id: Uuid, env: &Environment, role: Option<Role>) -> bool {
    match env {
        Environment::Personal => task.owner_id == actor_id,
        Environment::Organization(_) => {
            task.owner_id == actor_id
                || role == Some(Role::Admin)
                || task.participants.contains(&actor_id)
        }
    }
}

/// Only the creator or an org admin may delete; participants cannot.
pub fn can_delete(task: &Task, actor_id: Uuid, env: &Environment, role: Option<Role>) -> bool {
    match env {
        Environment::Personal => task.owner_id == actor_id,
        Environment::Organization(_) => task.owner_id == actor_id || role == Some(Role::Admin),
    }
}

/// Same rule as deletion: creator or org admin.
pub fn can_manage_participants(
    task: &Task,
    actor_id: Uuid,
    env: &Environment,
    role: Option<Role>,
) -> bool {
    can_delete(task, actor_id, env, role)
}
