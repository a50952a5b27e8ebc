//! Effective-permission resolution.
//!
//! Stateless query over current relational state; no caching layer, so every
//! call reflects the latest committed associations.

use std::sync::Arc;

use opsforge_core::{PermissionId, UserId};
use opsforge_rbac::{normalize_selector, AccessDecision, EffectivePermissionSet, RbacResult};

use super::storage_error;
use crate::store::RbacStore;

/// Computes a user's effective permission set and answers point queries.
pub struct PermissionResolver<S: ?Sized> {
    store: Arc<S>,
}

impl<S: RbacStore + ?Sized> PermissionResolver<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// The deduplicated union of permissions across all roles the user
    /// holds. Empty if the user holds no roles.
    pub async fn effective_permissions(
        &self,
        user_id: UserId,
    ) -> RbacResult<EffectivePermissionSet> {
        let roles = self
            .store
            .roles_for_user(user_id)
            .await
            .map_err(storage_error)?;
        Ok(EffectivePermissionSet::from_roles(&roles))
    }

    /// True iff the permission is in the user's effective set.
    pub async fn has_permission(
        &self,
        user_id: UserId,
        permission_id: PermissionId,
    ) -> RbacResult<AccessDecision> {
        let effective = self.effective_permissions(user_id).await?;
        Ok(effective.check_id(permission_id))
    }

    /// True iff some effective permission matches both selectors exactly.
    /// No wildcard matching, no partial matches.
    pub async fn has_permission_by_action(
        &self,
        user_id: UserId,
        resource_type: &str,
        action: &str,
    ) -> RbacResult<AccessDecision> {
        let resource_type = normalize_selector("resource_type", resource_type)?;
        let action = normalize_selector("action", action)?;

        let effective = self.effective_permissions(user_id).await?;
        Ok(effective.check_action(&resource_type, &action))
    }
}
