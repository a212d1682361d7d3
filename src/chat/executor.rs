//! Action plan executor
//!
//! Applies a parsed [`ActionPlan`] against the store. Folder groups are
//! independent units of work: one group failing never aborts the others,
//! and re-running the same plan reuses existing lists instead of creating
//! duplicates.

use crate::chat::plan::ActionPlan;
use crate::error::{Error, Result};
use crate::permissions;
use crate::store::models::{Actor, Environment, Role};
use crate::store::traits::EntityStore;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct PlanExecutor {
    store: Arc<dyn EntityStore>,
}

#[derive(Debug)]
pub struct ExecutionResult {
    pub success: bool,
    pub message: String,
    pub lists_created: usize,
    pub tasks_moved: usize,
    /// Folder names that could not be processed, with the reason.
    pub failed_groups: Vec<(String, String)>,
}

impl PlanExecutor {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// Execute an organize plan. Requires a resolved actor; anonymous
    /// callers get `Error::AuthenticationRequired` before any write. Each
    /// move is gated by the permission evaluator with the actor's role.
    pub async fn organize(
        &self,
        actor: Option<&Actor>,
        env: &Environment,
        plan: &ActionPlan,
    ) -> Result<ExecutionResult> {
        let actor = actor.ok_or(Error::AuthenticationRequired)?;
        let role = match env {
            Environment::Organization(org) => {
                self.store.get_membership_role(*org, actor.id).await?
            }
            Environment::Personal => None,
        };

        let mut lists_created = 0;
        let mut tasks_moved = 0;
        let mut failed_groups: Vec<(String, String)> = Vec::new();

        for group in &plan.folders {
            match self
                .apply_group(actor, env, role, &group.name, &group.task_ids)
                .await
            {
                Ok((created, moved)) => {
                    if created {
                        lists_created += 1;
                    }
                    tasks_moved += moved;
                }
                Err(e) => {
                    warn!(folder = %group.name, error = %e, "folder group failed");
                    failed_groups.push((group.name.clone(), e.to_string()));
                }
            }
        }

        let all_failed =
            !plan.folders.is_empty() && failed_groups.len() == plan.folders.len() && tasks_moved == 0;

        let mut message = format!("Criei {lists_created} pastas e movi {tasks_moved} tarefas.");
        if !failed_groups.is_empty() {
            let names: Vec<&str> = failed_groups.iter().map(|(n, _)| n.as_str()).collect();
            message.push_str(&format!(" Não consegui processar: {}.", names.join(", ")));
        }

        Ok(ExecutionResult {
            success: !all_failed,
            message,
            lists_created,
            tasks_moved,
            failed_groups,
        })
    }

    /// One folder group: reuse the list if a same-titled one exists in the
    /// environment, create it otherwise, then bulk-move the tasks into it.
    /// Moving a task is an edit; ids the actor cannot edit are skipped.
    async fn apply_group(
        &self,
        actor: &Actor,
        env: &Environment,
        role: Option<Role>,
        name: &str,
        task_ids: &[uuid::Uuid],
    ) -> Result<(bool, usize)> {
        let (list, created) = match self.store.find_list_by_title(env, actor, name).await? {
            Some(existing) => (existing, false),
            None => (self.store.create_list(env, actor, name).await?, true),
        };
        let mut permitted = Vec::with_capacity(task_ids.len());
        for id in task_ids {
            match self.store.get_task(env, *id).await? {
                Some(task) if permissions::can_edit(&task, actor.id, env, role) => {
                    permitted.push(*id);
                }
                Some(task) => {
                    debug!(task = %task.id, actor = %actor.id, "move denied, actor cannot edit task");
                }
                None => {}
            }
        }
        let moved = self.store.move_tasks_to_list(env, list.id, &permitted).await?;
        Ok((created, moved))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::plan::{ActionPlan, FolderGroup};
    use crate::store::memory::MemoryStore;
    use crate::store::models::{Membership, NewTask};
    use crate::test_helpers::{actor, organization};
    use uuid::Uuid;

    fn plan(folders: Vec<FolderGroup>) -> ActionPlan {
        ActionPlan {
            action: "organize_tasks".into(),
            folders,
            message: None,
        }
    }

    fn group(name: &str, task_ids: Vec<Uuid>) -> FolderGroup {
        FolderGroup {
            name: name.into(),
            task_ids,
        }
    }

    async fn seeded_store(
        alice: &crate::store::models::Actor,
        titles: &[&str],
    ) -> (Arc<MemoryStore>, Vec<Uuid>) {
        let store = Arc::new(MemoryStore::new());
        let mut ids = Vec::new();
        for title in titles {
            let task = store
                .create_task(&Environment::Personal, alice, NewTask::titled(*title))
                .await
                .unwrap();
            ids.push(task.id);
        }
        (store, ids)
    }

    #[tokio::test]
    async fn organizes_tasks_into_new_lists() {
        let alice = actor("alice@example.com");
        let (store, ids) = seeded_store(&alice, &["fix bug", "write docs", "buy milk"]).await;
        let executor = PlanExecutor::new(store.clone());

        let result = executor
            .organize(
                Some(&alice),
                &Environment::Personal,
                &plan(vec![
                    group("Dev", vec![ids[0], ids[1]]),
                    group("Errands", vec![ids[2]]),
                ]),
            )
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.lists_created, 2);
        assert_eq!(result.tasks_moved, 3);
        assert_eq!(result.message, "Criei 2 pastas e movi 3 tarefas.");

        let dev = store
            .find_list_by_title(&Environment::Personal, &alice, "Dev")
            .await
            .unwrap()
            .unwrap();
        let moved = store
            .get_task(&Environment::Personal, ids[0])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(moved.list_id, Some(dev.id));
    }

    #[tokio::test]
    async fn rerunning_the_same_plan_creates_no_duplicates() {
        let alice = actor("alice@example.com");
        let (store, ids) = seeded_store(&alice, &["fix bug"]).await;
        let executor = PlanExecutor::new(store.clone());
        let plan = plan(vec![group("Dev", vec![ids[0]])]);

        let first = executor
            .organize(Some(&alice), &Environment::Personal, &plan)
            .await
            .unwrap();
        let second = executor
            .organize(Some(&alice), &Environment::Personal, &plan)
            .await
            .unwrap();

        assert_eq!(first.lists_created, 1);
        assert_eq!(second.lists_created, 0);
        assert_eq!(second.tasks_moved, 1);
        let lists = store
            .list_lists(&Environment::Personal, &alice)
            .await
            .unwrap();
        assert_eq!(lists.len(), 1);
    }

    #[tokio::test]
    async fn one_failing_group_does_not_abort_the_rest() {
        let alice = actor("alice@example.com");
        let (store, ids) = seeded_store(&alice, &["a", "b", "c"]).await;
        store.fail_list_lookup("Broken").await;
        let executor = PlanExecutor::new(store.clone());

        let result = executor
            .organize(
                Some(&alice),
                &Environment::Personal,
                &plan(vec![
                    group("Ok1", vec![ids[0]]),
                    group("Broken", vec![ids[1]]),
                    group("Ok2", vec![ids[2]]),
                ]),
            )
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.tasks_moved, 2);
        assert_eq!(result.failed_groups.len(), 1);
        assert_eq!(result.failed_groups[0].0, "Broken");
        assert_eq!(
            result.message,
            "Criei 2 pastas e movi 2 tarefas. Não consegui processar: Broken."
        );
        // The task from the failed group stayed put
        let untouched = store
            .get_task(&Environment::Personal, ids[1])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(untouched.list_id, None);
    }

    #[tokio::test]
    async fn all_groups_failing_is_a_failure() {
        let alice = actor("alice@example.com");
        let (store, ids) = seeded_store(&alice, &["a"]).await;
        store.fail_list_lookup("Broken").await;
        let executor = PlanExecutor::new(store);

        let result = executor
            .organize(
                Some(&alice),
                &Environment::Personal,
                &plan(vec![group("Broken", vec![ids[0]])]),
            )
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.tasks_moved, 0);
    }

    #[tokio::test]
    async fn moves_are_gated_by_edit_permission() {
        let alice = actor("alice@example.com");
        let bob = actor("bob@example.com");
        let org = organization("acme", bob.id);
        let env = Environment::Organization(org.id);
        let store = Arc::new(
            MemoryStore::new()
                .with_organization(org.clone())
                .await
                .with_membership(Membership {
                    organization_id: org.id,
                    actor_id: alice.id,
                    role: Role::Member,
                })
                .await,
        );
        let task = store
            .create_task(&env, &bob, NewTask::titled("deploy"))
            .await
            .unwrap();
        let executor = PlanExecutor::new(store.clone());
        let plan = plan(vec![group("Dev", vec![task.id])]);

        // Plain member, not creator/admin/participant: the task stays put
        let result = executor.organize(Some(&alice), &env, &plan).await.unwrap();
        assert_eq!(result.tasks_moved, 0);
        let untouched = store.get_task(&env, task.id).await.unwrap().unwrap();
        assert_eq!(untouched.list_id, None);

        // Participants may edit, so the same plan now moves the task
        store.add_participant(&env, task.id, alice.id).await.unwrap();
        let result = executor.organize(Some(&alice), &env, &plan).await.unwrap();
        assert_eq!(result.tasks_moved, 1);
    }

    #[tokio::test]
    async fn anonymous_callers_cannot_execute() {
        let store = Arc::new(MemoryStore::new());
        let executor = PlanExecutor::new(store.clone());

        let err = executor
            .organize(
                None,
                &Environment::Personal,
                &plan(vec![group("Dev", vec![Uuid::new_v4()])]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AuthenticationRequired));
        let alice = actor("alice@example.com");
        assert!(store
            .list_lists(&Environment::Personal, &alice)
            .await
            .unwrap()
            .is_empty());
    }
}
