//! Integration tests for the full engine over the in-memory store.
//!
//! Tests: services → store → resolver, with a recording audit sink.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use opsforge_core::{PermissionId, UserId};
    use opsforge_rbac::{
        AuditAction, PermissionDraft, PermissionPatch, RbacError, RoleDraft, RolePatch,
    };

    use crate::collaborators::{
        AllowAllDirectory, IdentityDirectory, RecordingAuditSink, StaticDirectory,
    };
    use crate::engine::{AssociationManager, PermissionResolver, PermissionStore, RoleStore};
    use crate::store::InMemoryRbacStore;

    struct Harness {
        permissions: PermissionStore<InMemoryRbacStore>,
        roles: RoleStore<InMemoryRbacStore>,
        associations: AssociationManager<InMemoryRbacStore>,
        resolver: PermissionResolver<InMemoryRbacStore>,
        audit: Arc<RecordingAuditSink>,
        actor: UserId,
    }

    fn harness() -> Harness {
        harness_with_directory(Arc::new(AllowAllDirectory))
    }

    fn harness_with_directory(identity: Arc<dyn IdentityDirectory>) -> Harness {
        let store = Arc::new(InMemoryRbacStore::new());
        let audit = Arc::new(RecordingAuditSink::new());
        Harness {
            permissions: PermissionStore::new(store.clone(), audit.clone()),
            roles: RoleStore::new(store.clone(), audit.clone()),
            associations: AssociationManager::new(store.clone(), audit.clone(), identity),
            resolver: PermissionResolver::new(store),
            audit,
            actor: UserId::new(),
        }
    }

    fn perm_draft(name: &str, resource: &str, action: &str) -> PermissionDraft {
        PermissionDraft {
            name: name.to_string(),
            description: None,
            resource_type: resource.to_string(),
            action: action.to_string(),
        }
    }

    fn role_draft(name: &str) -> RoleDraft {
        RoleDraft {
            name: name.to_string(),
            description: None,
        }
    }

    #[tokio::test]
    async fn duplicate_permission_name_rejected() {
        let h = harness();
        h.permissions
            .create(h.actor, perm_draft("read:documents", "DOCUMENT", "READ"))
            .await
            .unwrap();

        let err = h
            .permissions
            .create(h.actor, perm_draft("read:documents", "INVOICE", "READ"))
            .await
            .unwrap_err();
        assert!(matches!(err, RbacError::DuplicateName { .. }));
    }

    #[tokio::test]
    async fn duplicate_role_name_rejected() {
        let h = harness();
        h.roles.create(h.actor, role_draft("editor")).await.unwrap();
        let err = h
            .roles
            .create(h.actor, role_draft("editor"))
            .await
            .unwrap_err();
        assert!(matches!(err, RbacError::DuplicateName { .. }));
    }

    #[tokio::test]
    async fn rename_collision_rejected_but_self_rename_allowed() {
        let h = harness();
        let p1 = h
            .permissions
            .create(h.actor, perm_draft("a", "DOCUMENT", "READ"))
            .await
            .unwrap();
        h.permissions
            .create(h.actor, perm_draft("b", "DOCUMENT", "WRITE"))
            .await
            .unwrap();

        // Renaming to another permission's name collides.
        let err = h
            .permissions
            .update(
                h.actor,
                p1.id,
                PermissionPatch {
                    name: Some("b".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RbacError::DuplicateName { .. }));

        // Renaming to its own current name is fine.
        let same = h
            .permissions
            .update(
                h.actor,
                p1.id,
                PermissionPatch {
                    name: Some("a".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(same.name, "a");
    }

    #[tokio::test]
    async fn update_missing_permission_is_not_found() {
        let h = harness();
        let err = h
            .permissions
            .update(h.actor, PermissionId::new(), PermissionPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RbacError::NotFound { .. }));
    }

    #[tokio::test]
    async fn double_assignment_fails_and_keeps_one_link() {
        let h = harness();
        let perm = h
            .permissions
            .create(h.actor, perm_draft("read:documents", "DOCUMENT", "READ"))
            .await
            .unwrap();
        let role = h.roles.create(h.actor, role_draft("editor")).await.unwrap();

        h.associations
            .assign_permission_to_role(h.actor, role.id, perm.id)
            .await
            .unwrap();

        let err = h
            .associations
            .assign_permission_to_role(h.actor, role.id, perm.id)
            .await
            .unwrap_err();
        assert!(matches!(err, RbacError::AlreadyAssigned(_)));

        let granted = h
            .associations
            .list_permissions_for_role(role.id)
            .await
            .unwrap();
        assert_eq!(granted.len(), 1);
    }

    #[tokio::test]
    async fn assignment_to_unknown_entities_is_not_found() {
        let h = harness();
        let role = h.roles.create(h.actor, role_draft("editor")).await.unwrap();

        let err = h
            .associations
            .assign_permission_to_role(h.actor, role.id, PermissionId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RbacError::NotFound { .. }));
    }

    #[tokio::test]
    async fn removing_never_assigned_pair_is_not_assigned() {
        let h = harness();
        let role = h.roles.create(h.actor, role_draft("editor")).await.unwrap();

        let err = h
            .associations
            .remove_role_from_user(h.actor, UserId::new(), role.id)
            .await
            .unwrap_err();
        assert!(matches!(err, RbacError::NotAssigned(_)));
    }

    #[tokio::test]
    async fn unconfirmable_user_is_referential_error() {
        let known = UserId::new();
        let h = harness_with_directory(Arc::new(StaticDirectory::new([known])));
        let role = h.roles.create(h.actor, role_draft("editor")).await.unwrap();

        h.associations
            .assign_role_to_user(h.actor, known, role.id)
            .await
            .unwrap();

        let err = h
            .associations
            .assign_role_to_user(h.actor, UserId::new(), role.id)
            .await
            .unwrap_err();
        assert!(matches!(err, RbacError::Referential(_)));
    }

    #[tokio::test]
    async fn effective_set_is_deduplicated_union() {
        let h = harness();
        let user = UserId::new();

        let a = h
            .permissions
            .create(h.actor, perm_draft("a", "DOCUMENT", "READ"))
            .await
            .unwrap();
        let b = h
            .permissions
            .create(h.actor, perm_draft("b", "DOCUMENT", "WRITE"))
            .await
            .unwrap();
        let c = h
            .permissions
            .create(h.actor, perm_draft("c", "INVOICE", "READ"))
            .await
            .unwrap();

        // R1 grants {A, B}, R2 grants {B, C}.
        let r1 = h.roles.create(h.actor, role_draft("r1")).await.unwrap();
        let r2 = h.roles.create(h.actor, role_draft("r2")).await.unwrap();
        for (role, perm) in [(r1.id, a.id), (r1.id, b.id), (r2.id, b.id), (r2.id, c.id)] {
            h.associations
                .assign_permission_to_role(h.actor, role, perm)
                .await
                .unwrap();
        }
        h.associations
            .assign_role_to_user(h.actor, user, r1.id)
            .await
            .unwrap();
        h.associations
            .assign_role_to_user(h.actor, user, r2.id)
            .await
            .unwrap();

        let effective = h.resolver.effective_permissions(user).await.unwrap();
        assert_eq!(effective.len(), 3);
        for id in [a.id, b.id, c.id] {
            assert!(effective.contains(id));
        }

        // And it matches the union over list_roles_for_user.
        let roles = h.associations.list_roles_for_user(user).await.unwrap();
        let union: std::collections::HashSet<_> = roles
            .iter()
            .flat_map(|r| r.permissions.iter().map(|p| p.id))
            .collect();
        let resolved: std::collections::HashSet<_> =
            effective.permissions().iter().map(|p| p.id).collect();
        assert_eq!(union, resolved);
    }

    #[tokio::test]
    async fn denied_action_comes_with_reason() {
        let h = harness();
        let user = UserId::new();

        let decision = h
            .resolver
            .has_permission_by_action(user, "DOCUMENT", "DELETE")
            .await
            .unwrap();
        assert!(!decision.granted);
        assert!(!decision.reason.unwrap().is_empty());
    }

    #[tokio::test]
    async fn deleting_role_revokes_it_everywhere() {
        let h = harness();
        let user = UserId::new();

        let perm = h
            .permissions
            .create(h.actor, perm_draft("read:documents", "DOCUMENT", "READ"))
            .await
            .unwrap();
        let role = h.roles.create(h.actor, role_draft("editor")).await.unwrap();
        h.associations
            .assign_permission_to_role(h.actor, role.id, perm.id)
            .await
            .unwrap();
        h.associations
            .assign_role_to_user(h.actor, user, role.id)
            .await
            .unwrap();

        // effectivePermissions("u1") is a one-element set with that permission.
        let effective = h.resolver.effective_permissions(user).await.unwrap();
        assert_eq!(effective.len(), 1);
        assert!(effective.contains(perm.id));
        assert!(
            h.resolver
                .has_permission(user, perm.id)
                .await
                .unwrap()
                .granted
        );
        assert!(
            h.resolver
                .has_permission_by_action(user, "document", "read")
                .await
                .unwrap()
                .granted
        );

        h.roles.delete(h.actor, role.id).await.unwrap();

        assert!(h
            .associations
            .list_roles_for_user(user)
            .await
            .unwrap()
            .is_empty());
        assert!(h.resolver.effective_permissions(user).await.unwrap().is_empty());
        // The permission record itself survives the role deletion.
        assert_eq!(h.permissions.get(perm.id).await.unwrap().id, perm.id);
    }

    #[tokio::test]
    async fn deleting_permission_removes_role_links() {
        let h = harness();
        let perm = h
            .permissions
            .create(h.actor, perm_draft("read:documents", "DOCUMENT", "READ"))
            .await
            .unwrap();
        let role = h.roles.create(h.actor, role_draft("editor")).await.unwrap();
        h.associations
            .assign_permission_to_role(h.actor, role.id, perm.id)
            .await
            .unwrap();

        h.permissions.delete(h.actor, perm.id).await.unwrap();

        assert!(h
            .associations
            .list_permissions_for_role(role.id)
            .await
            .unwrap()
            .is_empty());
        assert!(matches!(
            h.permissions.get(perm.id).await.unwrap_err(),
            RbacError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn successful_mutations_are_audited_with_snapshots() {
        let h = harness();
        let user = UserId::new();

        let perm = h
            .permissions
            .create(h.actor, perm_draft("read:documents", "DOCUMENT", "READ"))
            .await
            .unwrap();
        let role = h.roles.create(h.actor, role_draft("editor")).await.unwrap();
        h.associations
            .assign_permission_to_role(h.actor, role.id, perm.id)
            .await
            .unwrap();
        h.associations
            .assign_role_to_user(h.actor, user, role.id)
            .await
            .unwrap();
        h.permissions
            .update(
                h.actor,
                perm.id,
                PermissionPatch {
                    description: Some(Some("documents, read-only".to_string())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        h.roles.delete(h.actor, role.id).await.unwrap();

        let events = h.audit.events();
        let actions: Vec<_> = events.iter().map(|e| e.action).collect();
        assert_eq!(
            actions,
            vec![
                AuditAction::PermissionCreated,
                AuditAction::RoleCreated,
                AuditAction::RolePermissionAssigned,
                AuditAction::UserRoleAssigned,
                AuditAction::PermissionUpdated,
                AuditAction::RoleDeleted,
            ]
        );
        assert!(events.iter().all(|e| e.actor == h.actor));

        let update = &events[4];
        assert!(update.before.is_some());
        assert!(update.after.is_some());

        let delete = &events[5];
        assert!(delete.before.is_some());
        assert!(delete.after.is_none());
    }

    #[tokio::test]
    async fn failed_mutations_are_not_audited() {
        let h = harness();
        h.permissions
            .create(h.actor, perm_draft("p", "DOCUMENT", "READ"))
            .await
            .unwrap();
        let recorded = h.audit.events().len();

        let _ = h
            .permissions
            .create(h.actor, perm_draft("p", "DOCUMENT", "READ"))
            .await
            .unwrap_err();
        let _ = h
            .roles
            .delete(h.actor, opsforge_core::RoleId::new())
            .await
            .unwrap_err();

        assert_eq!(h.audit.events().len(), recorded);
    }

    #[tokio::test]
    async fn role_update_and_listing() {
        let h = harness();
        let role = h.roles.create(h.actor, role_draft("editor")).await.unwrap();

        let renamed = h
            .roles
            .update(
                h.actor,
                role.id,
                RolePatch {
                    name: Some("reviewer".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.name, "reviewer");

        let all = h.roles.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "reviewer");
    }

    #[tokio::test]
    async fn list_by_resource_type_normalizes_the_selector() {
        let h = harness();
        h.permissions
            .create(h.actor, perm_draft("read:documents", "document", "read"))
            .await
            .unwrap();
        h.permissions
            .create(h.actor, perm_draft("read:invoices", "INVOICE", "READ"))
            .await
            .unwrap();

        let docs = h
            .permissions
            .list_by_resource_type("Document")
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].name, "read:documents");
    }
}
