//! Role CRUD service.

use std::sync::Arc;

use tracing::instrument;

use opsforge_core::{RoleId, UserId};
use opsforge_rbac::{
    AuditAction, AuditEvent, RbacError, RbacResult, ResourceKind, Role, RoleDraft, RolePatch,
};

use super::{snapshot, storage_error};
use crate::collaborators::AuditSink;
use crate::store::{RbacStore, StoreError};

/// Create/read/update/delete for role records.
pub struct RoleStore<S: ?Sized> {
    store: Arc<S>,
    audit: Arc<dyn AuditSink>,
}

impl<S: RbacStore + ?Sized> RoleStore<S> {
    pub fn new(store: Arc<S>, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, audit }
    }

    #[instrument(skip(self, draft), fields(actor = %actor))]
    pub async fn create(&self, actor: UserId, draft: RoleDraft) -> RbacResult<Role> {
        let role = Role::new(draft)?;

        self.store.insert_role(&role).await.map_err(|e| match e {
            StoreError::UniqueViolation { .. } => {
                RbacError::duplicate_name(ResourceKind::Role, role.name.clone())
            }
            other => storage_error(other),
        })?;

        self.audit.record(
            AuditEvent::new(AuditAction::RoleCreated, "role", role.id.to_string(), actor)
                .with_after(snapshot(&role)),
        );

        Ok(role)
    }

    pub async fn get(&self, id: RoleId) -> RbacResult<Role> {
        self.store
            .fetch_role(id)
            .await
            .map_err(storage_error)?
            .ok_or_else(|| RbacError::not_found(ResourceKind::Role, id))
    }

    pub async fn list_all(&self) -> RbacResult<Vec<Role>> {
        self.store.list_roles().await.map_err(storage_error)
    }

    #[instrument(skip(self, patch), fields(actor = %actor, role_id = %id))]
    pub async fn update(&self, actor: UserId, id: RoleId, patch: RolePatch) -> RbacResult<Role> {
        let mut role = self.get(id).await?;
        let before = snapshot(&role);

        role.apply(patch)?;

        let updated = self.store.update_role(&role).await.map_err(|e| match e {
            StoreError::UniqueViolation { .. } => {
                RbacError::duplicate_name(ResourceKind::Role, role.name.clone())
            }
            other => storage_error(other),
        })?;
        if !updated {
            return Err(RbacError::not_found(ResourceKind::Role, id));
        }

        self.audit.record(
            AuditEvent::new(AuditAction::RoleUpdated, "role", id.to_string(), actor)
                .with_before(before)
                .with_after(snapshot(&role)),
        );

        Ok(role)
    }

    /// Delete a role. Every role↔permission and user↔role link referencing
    /// it is removed first, in the same atomic unit, so no user retains a
    /// link to a role that no longer exists.
    #[instrument(skip(self), fields(actor = %actor, role_id = %id))]
    pub async fn delete(&self, actor: UserId, id: RoleId) -> RbacResult<()> {
        let existing = self.get(id).await?;

        let deleted = self.store.delete_role(id).await.map_err(storage_error)?;
        if !deleted {
            return Err(RbacError::not_found(ResourceKind::Role, id));
        }

        self.audit.record(
            AuditEvent::new(AuditAction::RoleDeleted, "role", id.to_string(), actor)
                .with_before(snapshot(&existing)),
        );

        Ok(())
    }
}
