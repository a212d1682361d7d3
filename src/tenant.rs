//! Tenant context resolver
//!
//! Determines which environment (Personal or a specific organization) the
//! current actor's data operations are scoped to, and manages organization
//! membership. The resolved [`Environment`] is returned to the caller and
//! passed down explicitly to every store call — it is never stashed in
//! shared mutable state, so scoping stays auditable at each call site.

use crate::error::{Error, Result};
use crate::store::models::{Actor, Environment, Membership, Organization, Role};
use crate::store::EntityStore;
use chrono::Utc;
use rand::Rng;
use std::sync::Arc;
use uuid::Uuid;

const CODE_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

pub struct TenantResolver {
    store: Arc<dyn EntityStore>,
}

impl TenantResolver {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// Environment selection on login: the previously-active organization if
    /// the actor is still a member, otherwise the first organization they
    /// belong to, otherwise Personal.
    pub async fn resolve(&self, actor: &Actor, last_active: Option<Uuid>) -> Result<Environment> {
        let memberships = self.store.list_memberships(actor.id).await?;
        if let Some(last) = last_active {
            if memberships.iter().any(|(org, _)| org.id == last) {
                return Ok(Environment::Organization(last));
            }
        }
        Ok(memberships
            .first()
            .map(|(org, _)| Environment::Organization(org.id))
            .unwrap_or(Environment::Personal))
    }

    /// Validate a switch target. Personal is always allowed; an organization
    /// target requires a current membership.
    pub async fn switch(&self, actor: &Actor, target: Environment) -> Result<Environment> {
        match target {
            Environment::Personal => Ok(target),
            Environment::Organization(org_id) => {
                let role = self.store.get_membership_role(org_id, actor.id).await?;
                if role.is_some() {
                    Ok(target)
                } else {
                    Err(Error::NotAMember(org_id))
                }
            }
        }
    }

    /// Create an organization with a generated join code; the creator is
    /// added as admin. If the membership insert fails the organization is
    /// rolled back so no admin-less tenant is left behind.
    pub async fn create_organization(&self, actor: &Actor, name: &str) -> Result<Organization> {
        if name.trim().is_empty() {
            return Err(Error::Validation("organization name must not be empty".into()));
        }
        let org = Organization {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            code: generate_join_code(name),
            created_by: actor.id,
            created_at: Utc::now(),
        };
        self.store.create_organization(&org).await?;

        let membership = Membership {
            organization_id: org.id,
            actor_id: actor.id,
            role: Role::Admin,
        };
        if let Err(err) = self.store.add_membership(&membership).await {
            tracing::warn!(org = %org.id, %err, "rolling back organization without admin");
            self.store.delete_organization(org.id).await?;
            return Err(err);
        }
        Ok(org)
    }

    /// Join an organization by its code. Unknown codes and duplicate joins
    /// are rejected.
    pub async fn join_organization(&self, actor: &Actor, code: &str) -> Result<Organization> {
        let org = self
            .store
            .find_organization_by_code(code)
            .await?
            .ok_or_else(|| {
                Error::NotFound("Organização não encontrada com este código.".into())
            })?;
        let existing = self.store.get_membership_role(org.id, actor.id).await?;
        if existing.is_some() {
            return Err(Error::Validation(
                "Você já faz parte desta organização.".into(),
            ));
        }
        self.store
            .add_membership(&Membership {
                organization_id: org.id,
                actor_id: actor.id,
                role: Role::Member,
            })
            .await?;
        Ok(org)
    }
}

/// Join code: lowercased alphanumeric slug of the name (at most 10 chars)
/// plus a 4-character random suffix, e.g. `acmecorp-x7k2`.
fn generate_join_code(name: &str) -> String {
    let slug: String = name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(10)
        .collect();
    let mut rng = rand::thread_rng();
    let suffix: String = (0..4)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect();
    format!("{slug}-{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::test_helpers::{actor, organization};

    fn resolver_over(store: MemoryStore) -> TenantResolver {
        TenantResolver::new(Arc::new(store))
    }

    #[tokio::test]
    async fn resolve_prefers_the_previously_active_organization() {
        let alice = actor("alice@example.com");
        let first = organization("first", alice.id);
        let second = organization("second", alice.id);
        let second_id = second.id;
        let store = MemoryStore::new()
            .with_organization(first.clone())
            .await
            .with_organization(second)
            .await
            .with_membership(Membership {
                organization_id: first.id,
                actor_id: alice.id,
                role: Role::Member,
            })
            .await
            .with_membership(Membership {
                organization_id: second_id,
                actor_id: alice.id,
                role: Role::Member,
            })
            .await;
        let resolver = resolver_over(store);

        let env = resolver.resolve(&alice, Some(second_id)).await.unwrap();
        assert_eq!(env, Environment::Organization(second_id));
    }

    #[tokio::test]
    async fn resolve_falls_back_to_first_membership_then_personal() {
        let alice = actor("alice@example.com");
        let org = organization("acme", alice.id);
        let org_id = org.id;
        let gone = Uuid::new_v4();
        let store = MemoryStore::new()
            .with_organization(org)
            .await
            .with_membership(Membership {
                organization_id: org_id,
                actor_id: alice.id,
                role: Role::Admin,
            })
            .await;
        let resolver = resolver_over(store);

        // Previously-active org the actor was removed from → first available
        let env = resolver.resolve(&alice, Some(gone)).await.unwrap();
        assert_eq!(env, Environment::Organization(org_id));

        // No memberships at all → Personal
        let lonely = resolver_over(MemoryStore::new());
        let env = lonely.resolve(&alice, None).await.unwrap();
        assert_eq!(env, Environment::Personal);
    }

    #[tokio::test]
    async fn switching_to_a_foreign_organization_fails() {
        let alice = actor("alice@example.com");
        let org = organization("acme", Uuid::new_v4());
        let org_id = org.id;
        let resolver = resolver_over(MemoryStore::new().with_organization(org).await);

        let err = resolver
            .switch(&alice, Environment::Organization(org_id))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotAMember(id) if id == org_id));

        // Personal is always reachable
        let env = resolver.switch(&alice, Environment::Personal).await.unwrap();
        assert_eq!(env, Environment::Personal);
    }

    #[tokio::test]
    async fn create_organization_makes_the_creator_admin() {
        let alice = actor("alice@example.com");
        let store = Arc::new(MemoryStore::new());
        let resolver = TenantResolver::new(store.clone());

        let org = resolver.create_organization(&alice, "Acme Corp").await.unwrap();
        assert_eq!(org.created_by, alice.id);
        let role = store.get_membership_role(org.id, alice.id).await.unwrap();
        assert_eq!(role, Some(Role::Admin));
    }

    #[tokio::test]
    async fn join_is_rejected_for_unknown_codes_and_duplicates() {
        let alice = actor("alice@example.com");
        let store = Arc::new(MemoryStore::new());
        let resolver = TenantResolver::new(store.clone());
        let org = resolver.create_organization(&alice, "Acme").await.unwrap();

        let err = resolver
            .join_organization(&alice, "missing-0000")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        // The creator is already a member
        let err = resolver.join_organization(&alice, &org.code).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let bob = actor("bob@example.com");
        let joined = resolver.join_organization(&bob, &org.code).await.unwrap();
        assert_eq!(joined.id, org.id);
        let role = store.get_membership_role(org.id, bob.id).await.unwrap();
        assert_eq!(role, Some(Role::Member));
    }

    #[test]
    fn join_codes_have_the_slug_dash_suffix_shape() {
        let code = generate_join_code("Acme Corp 2000!");
        let (slug, suffix) = code.split_once('-').unwrap();
        assert_eq!(slug, "acmecorp20");
        assert_eq!(suffix.len(), 4);
        assert!(suffix.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }
}
