use async_trait::async_trait;
use thiserror::Error;

use opsforge_core::{PermissionId, RoleId, UserId};
use opsforge_rbac::{Permission, Role, RoleWithPermissions};

/// Low-level storage failure, translated exactly once at the backend
/// boundary.
///
/// This is the closed set the engine branches on; datastore-specific error
/// codes never leak past a backend implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A unique index rejected an insert/update (duplicate name, duplicate
    /// composite link key).
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    /// A foreign key rejected an insert (link endpoint vanished).
    #[error("foreign key constraint violated: {constraint}")]
    ForeignKeyViolation { constraint: String },

    /// Anything else: connectivity, pool exhaustion, poisoned lock.
    #[error("backend failure: {0}")]
    Backend(String),
}

/// Relational storage port for the RBAC engine.
///
/// Contract notes:
/// - Inserts rely on the backend's unique constraints as the **authority** on
///   duplication; callers must not treat a prior read as a guarantee.
/// - `delete_permission` / `delete_role` remove every link referencing the
///   entity and the entity row as a **single atomic unit**; no observable
///   state may contain dangling links.
/// - Delete/update methods return `false` when the target row does not exist
///   instead of erroring; the engine owns the domain-level NotFound decision.
#[async_trait]
pub trait RbacStore: Send + Sync {
    // ── permissions ──────────────────────────────────────────────────────

    async fn insert_permission(&self, permission: &Permission) -> Result<(), StoreError>;

    async fn fetch_permission(&self, id: PermissionId) -> Result<Option<Permission>, StoreError>;

    /// All permissions, ordered by name.
    async fn list_permissions(&self) -> Result<Vec<Permission>, StoreError>;

    /// Permissions for one resource type, ordered by name.
    async fn list_permissions_by_resource(
        &self,
        resource_type: &str,
    ) -> Result<Vec<Permission>, StoreError>;

    async fn update_permission(&self, permission: &Permission) -> Result<bool, StoreError>;

    /// Cascading delete: removes all role↔permission links referencing the
    /// permission, then the permission row, atomically.
    async fn delete_permission(&self, id: PermissionId) -> Result<bool, StoreError>;

    // ── roles ────────────────────────────────────────────────────────────

    async fn insert_role(&self, role: &Role) -> Result<(), StoreError>;

    async fn fetch_role(&self, id: RoleId) -> Result<Option<Role>, StoreError>;

    /// All roles, ordered by name.
    async fn list_roles(&self) -> Result<Vec<Role>, StoreError>;

    async fn update_role(&self, role: &Role) -> Result<bool, StoreError>;

    /// Cascading delete: removes all role↔permission **and** user↔role links
    /// referencing the role, then the role row, atomically.
    async fn delete_role(&self, id: RoleId) -> Result<bool, StoreError>;

    // ── associations ─────────────────────────────────────────────────────

    async fn insert_role_permission(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> Result<(), StoreError>;

    async fn delete_role_permission(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> Result<bool, StoreError>;

    async fn insert_user_role(&self, user_id: UserId, role_id: RoleId)
        -> Result<(), StoreError>;

    async fn delete_user_role(&self, user_id: UserId, role_id: RoleId)
        -> Result<bool, StoreError>;

    /// Permissions granted by a role, ordered by name.
    async fn permissions_for_role(
        &self,
        role_id: RoleId,
    ) -> Result<Vec<Permission>, StoreError>;

    /// Roles held by a user, each populated with its permission list,
    /// ordered by role name.
    async fn roles_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<RoleWithPermissions>, StoreError>;
}
