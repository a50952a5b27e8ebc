//! Association management: role↔permission and user↔role links.
//!
//! Existence checks before inserts exist to produce precise errors, not for
//! correctness: two concurrent assignments can both observe "absent". The
//! composite unique key in the store is the authority on duplication, and its
//! violation is translated to `AlreadyAssigned` here.

use std::sync::Arc;

use tracing::instrument;

use opsforge_core::{PermissionId, RoleId, UserId};
use opsforge_rbac::{
    AuditAction, AuditEvent, Permission, RbacError, RbacResult, ResourceKind, RoleWithPermissions,
};

use super::storage_error;
use crate::collaborators::{AuditSink, IdentityDirectory};
use crate::store::{RbacStore, StoreError};

/// Manages the two link tables, validating referenced entities exist.
pub struct AssociationManager<S: ?Sized> {
    store: Arc<S>,
    audit: Arc<dyn AuditSink>,
    identity: Arc<dyn IdentityDirectory>,
}

impl<S: RbacStore + ?Sized> AssociationManager<S> {
    pub fn new(
        store: Arc<S>,
        audit: Arc<dyn AuditSink>,
        identity: Arc<dyn IdentityDirectory>,
    ) -> Self {
        Self {
            store,
            audit,
            identity,
        }
    }

    async fn require_role(&self, role_id: RoleId) -> RbacResult<()> {
        self.store
            .fetch_role(role_id)
            .await
            .map_err(storage_error)?
            .map(|_| ())
            .ok_or_else(|| RbacError::not_found(ResourceKind::Role, role_id))
    }

    async fn require_permission(&self, permission_id: PermissionId) -> RbacResult<()> {
        self.store
            .fetch_permission(permission_id)
            .await
            .map_err(storage_error)?
            .map(|_| ())
            .ok_or_else(|| RbacError::not_found(ResourceKind::Permission, permission_id))
    }

    /// Link a permission to a role.
    #[instrument(skip(self), fields(actor = %actor, role_id = %role_id, permission_id = %permission_id))]
    pub async fn assign_permission_to_role(
        &self,
        actor: UserId,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> RbacResult<()> {
        self.require_role(role_id).await?;
        self.require_permission(permission_id).await?;

        self.store
            .insert_role_permission(role_id, permission_id)
            .await
            .map_err(|e| match e {
                StoreError::UniqueViolation { .. } => RbacError::AlreadyAssigned(format!(
                    "role {role_id} already grants permission {permission_id}"
                )),
                // Endpoint vanished between the existence check and the insert.
                StoreError::ForeignKeyViolation { constraint } => RbacError::referential(format!(
                    "role {role_id} / permission {permission_id}: {constraint}"
                )),
                other => storage_error(other),
            })?;

        self.audit.record(AuditEvent::new(
            AuditAction::RolePermissionAssigned,
            "role_permission",
            format!("{role_id}:{permission_id}"),
            actor,
        ));

        Ok(())
    }

    /// Unlink a permission from a role.
    #[instrument(skip(self), fields(actor = %actor, role_id = %role_id, permission_id = %permission_id))]
    pub async fn remove_permission_from_role(
        &self,
        actor: UserId,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> RbacResult<()> {
        let removed = self
            .store
            .delete_role_permission(role_id, permission_id)
            .await
            .map_err(storage_error)?;
        if !removed {
            return Err(RbacError::NotAssigned(format!(
                "role {role_id} does not grant permission {permission_id}"
            )));
        }

        self.audit.record(AuditEvent::new(
            AuditAction::RolePermissionRemoved,
            "role_permission",
            format!("{role_id}:{permission_id}"),
            actor,
        ));

        Ok(())
    }

    /// Link a role to a user. The role must exist; the user must be
    /// confirmable by the identity collaborator.
    #[instrument(skip(self), fields(actor = %actor, user_id = %user_id, role_id = %role_id))]
    pub async fn assign_role_to_user(
        &self,
        actor: UserId,
        user_id: UserId,
        role_id: RoleId,
    ) -> RbacResult<()> {
        self.require_role(role_id).await?;

        if !self.identity.user_exists(user_id).await {
            return Err(RbacError::referential(format!(
                "user {user_id} cannot be confirmed by the identity collaborator"
            )));
        }

        self.store
            .insert_user_role(user_id, role_id)
            .await
            .map_err(|e| match e {
                StoreError::UniqueViolation { .. } => RbacError::AlreadyAssigned(format!(
                    "user {user_id} already holds role {role_id}"
                )),
                StoreError::ForeignKeyViolation { constraint } => RbacError::referential(
                    format!("user {user_id} / role {role_id}: {constraint}"),
                ),
                other => storage_error(other),
            })?;

        self.audit.record(AuditEvent::new(
            AuditAction::UserRoleAssigned,
            "user_role",
            format!("{user_id}:{role_id}"),
            actor,
        ));

        Ok(())
    }

    /// Unlink a role from a user.
    #[instrument(skip(self), fields(actor = %actor, user_id = %user_id, role_id = %role_id))]
    pub async fn remove_role_from_user(
        &self,
        actor: UserId,
        user_id: UserId,
        role_id: RoleId,
    ) -> RbacResult<()> {
        let removed = self
            .store
            .delete_user_role(user_id, role_id)
            .await
            .map_err(storage_error)?;
        if !removed {
            return Err(RbacError::NotAssigned(format!(
                "user {user_id} does not hold role {role_id}"
            )));
        }

        self.audit.record(AuditEvent::new(
            AuditAction::UserRoleRemoved,
            "user_role",
            format!("{user_id}:{role_id}"),
            actor,
        ));

        Ok(())
    }

    pub async fn list_permissions_for_role(
        &self,
        role_id: RoleId,
    ) -> RbacResult<Vec<Permission>> {
        self.require_role(role_id).await?;
        self.store
            .permissions_for_role(role_id)
            .await
            .map_err(storage_error)
    }

    /// Roles held by a user, each populated with its permission list. An
    /// unknown user simply holds no roles.
    pub async fn list_roles_for_user(
        &self,
        user_id: UserId,
    ) -> RbacResult<Vec<RoleWithPermissions>> {
        self.store
            .roles_for_user(user_id)
            .await
            .map_err(storage_error)
    }
}
