//! Permission CRUD service.

use std::sync::Arc;

use tracing::instrument;

use opsforge_core::{PermissionId, UserId};
use opsforge_rbac::{
    normalize_selector, AuditAction, AuditEvent, Permission, PermissionDraft, PermissionPatch,
    RbacError, RbacResult, ResourceKind,
};

use super::{snapshot, storage_error};
use crate::collaborators::AuditSink;
use crate::store::{RbacStore, StoreError};

/// Create/read/update/delete for permission records.
pub struct PermissionStore<S: ?Sized> {
    store: Arc<S>,
    audit: Arc<dyn AuditSink>,
}

impl<S: RbacStore + ?Sized> PermissionStore<S> {
    pub fn new(store: Arc<S>, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, audit }
    }

    /// Create a permission. The store's unique name index is the authority on
    /// collisions; its violation is translated to `DuplicateName`.
    #[instrument(skip(self, draft), fields(actor = %actor))]
    pub async fn create(&self, actor: UserId, draft: PermissionDraft) -> RbacResult<Permission> {
        let permission = Permission::new(draft)?;

        self.store
            .insert_permission(&permission)
            .await
            .map_err(|e| match e {
                StoreError::UniqueViolation { .. } => {
                    RbacError::duplicate_name(ResourceKind::Permission, permission.name.clone())
                }
                other => storage_error(other),
            })?;

        self.audit.record(
            AuditEvent::new(
                AuditAction::PermissionCreated,
                "permission",
                permission.id.to_string(),
                actor,
            )
            .with_after(snapshot(&permission)),
        );

        Ok(permission)
    }

    pub async fn get(&self, id: PermissionId) -> RbacResult<Permission> {
        self.store
            .fetch_permission(id)
            .await
            .map_err(storage_error)?
            .ok_or_else(|| RbacError::not_found(ResourceKind::Permission, id))
    }

    pub async fn list_all(&self) -> RbacResult<Vec<Permission>> {
        self.store.list_permissions().await.map_err(storage_error)
    }

    pub async fn list_by_resource_type(&self, resource_type: &str) -> RbacResult<Vec<Permission>> {
        let resource_type = normalize_selector("resource_type", resource_type)?;
        self.store
            .list_permissions_by_resource(&resource_type)
            .await
            .map_err(storage_error)
    }

    /// Apply a partial update.
    #[instrument(skip(self, patch), fields(actor = %actor, permission_id = %id))]
    pub async fn update(
        &self,
        actor: UserId,
        id: PermissionId,
        patch: PermissionPatch,
    ) -> RbacResult<Permission> {
        let mut permission = self.get(id).await?;
        let before = snapshot(&permission);

        permission.apply(patch)?;

        let updated = self
            .store
            .update_permission(&permission)
            .await
            .map_err(|e| match e {
                StoreError::UniqueViolation { .. } => {
                    RbacError::duplicate_name(ResourceKind::Permission, permission.name.clone())
                }
                other => storage_error(other),
            })?;

        // The row can vanish between the fetch and the update under a
        // concurrent delete; that is a NotFound, not a storage failure.
        if !updated {
            return Err(RbacError::not_found(ResourceKind::Permission, id));
        }

        self.audit.record(
            AuditEvent::new(
                AuditAction::PermissionUpdated,
                "permission",
                id.to_string(),
                actor,
            )
            .with_before(before)
            .with_after(snapshot(&permission)),
        );

        Ok(permission)
    }

    /// Delete a permission, removing every role link referencing it first,
    /// as a single atomic unit.
    #[instrument(skip(self), fields(actor = %actor, permission_id = %id))]
    pub async fn delete(&self, actor: UserId, id: PermissionId) -> RbacResult<()> {
        let existing = self.get(id).await?;

        let deleted = self
            .store
            .delete_permission(id)
            .await
            .map_err(storage_error)?;
        if !deleted {
            return Err(RbacError::not_found(ResourceKind::Permission, id));
        }

        self.audit.record(
            AuditEvent::new(
                AuditAction::PermissionDeleted,
                "permission",
                id.to_string(),
                actor,
            )
            .with_before(snapshot(&existing)),
        );

        Ok(())
    }
}
