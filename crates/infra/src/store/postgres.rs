//! Postgres-backed RBAC store.
//!
//! ## Error Mapping
//!
//! SQLx errors are translated to `StoreError` in exactly one place
//! (`map_sqlx_error`):
//!
//! | PostgreSQL Error Code | StoreError | Scenario |
//! |----------------------|------------|----------|
//! | `23505` | `UniqueViolation` | Duplicate name, duplicate composite link key |
//! | `23503` | `ForeignKeyViolation` | Link insert referencing a vanished entity |
//! | Any other | `Backend` | Connectivity, pool, unexpected database errors |
//!
//! The rest of the engine never inspects datastore error codes.
//!
//! ## Atomicity
//!
//! Cascading deletes (links first, then the entity row) run inside a single
//! transaction, so a crash between the two steps cannot leave dangling links
//! at any observable point.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use opsforge_core::{PermissionId, RoleId, UserId};
use opsforge_rbac::{Permission, Role, RoleWithPermissions};

use super::r#trait::{RbacStore, StoreError};
use async_trait::async_trait;

/// Schema for the four relational tables.
///
/// `ON DELETE` behavior is deliberately **not** delegated to the database:
/// the application performs explicit pre-deletion cleanup inside a
/// transaction, so the FKs here exist purely as a safety net.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS permissions (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    resource_type TEXT NOT NULL,
    action TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL,
    CONSTRAINT permissions_name_key UNIQUE (name)
);

CREATE TABLE IF NOT EXISTS roles (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL,
    CONSTRAINT roles_name_key UNIQUE (name)
);

CREATE TABLE IF NOT EXISTS role_permissions (
    role_id UUID NOT NULL,
    permission_id UUID NOT NULL,
    CONSTRAINT role_permissions_pkey PRIMARY KEY (role_id, permission_id),
    CONSTRAINT role_permissions_role_id_fkey
        FOREIGN KEY (role_id) REFERENCES roles (id),
    CONSTRAINT role_permissions_permission_id_fkey
        FOREIGN KEY (permission_id) REFERENCES permissions (id)
);

CREATE TABLE IF NOT EXISTS user_roles (
    user_id UUID NOT NULL,
    role_id UUID NOT NULL,
    CONSTRAINT user_roles_pkey PRIMARY KEY (user_id, role_id),
    CONSTRAINT user_roles_role_id_fkey
        FOREIGN KEY (role_id) REFERENCES roles (id)
);
"#;

/// Postgres-backed RBAC store.
///
/// Thread-safe: all operations go through the SQLx connection pool.
#[derive(Debug, Clone)]
pub struct PostgresRbacStore {
    pool: Arc<PgPool>,
}

impl PostgresRbacStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create the four RBAC tables if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA.split(';').filter(|s| !s.trim().is_empty()) {
            sqlx::query(statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        Ok(())
    }
}

#[derive(Debug, FromRow)]
struct PermissionRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    resource_type: String,
    action: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PermissionRow> for Permission {
    fn from(row: PermissionRow) -> Self {
        Permission {
            id: PermissionId::from_uuid(row.id),
            name: row.name,
            description: row.description,
            resource_type: row.resource_type,
            action: row.action,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct RoleRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<RoleRow> for Role {
    fn from(row: RoleRow) -> Self {
        Role {
            id: RoleId::from_uuid(row.id),
            name: row.name,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// One row of the user→role→permission join. Permission columns are NULL for
/// roles that grant nothing.
#[derive(Debug, FromRow)]
struct UserRoleJoinRow {
    role_id: Uuid,
    role_name: String,
    role_description: Option<String>,
    role_created_at: DateTime<Utc>,
    role_updated_at: DateTime<Utc>,
    permission_id: Option<Uuid>,
    permission_name: Option<String>,
    permission_description: Option<String>,
    resource_type: Option<String>,
    action: Option<String>,
    permission_created_at: Option<DateTime<Utc>>,
    permission_updated_at: Option<DateTime<Utc>>,
}

#[async_trait]
impl RbacStore for PostgresRbacStore {
    #[instrument(skip(self, permission), fields(permission_id = %permission.id), err)]
    async fn insert_permission(&self, permission: &Permission) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO permissions (id, name, description, resource_type, action, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(permission.id.as_uuid())
        .bind(&permission.name)
        .bind(&permission.description)
        .bind(&permission.resource_type)
        .bind(&permission.action)
        .bind(permission.created_at)
        .bind(permission.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_permission", e))?;
        Ok(())
    }

    async fn fetch_permission(&self, id: PermissionId) -> Result<Option<Permission>, StoreError> {
        let row = sqlx::query_as::<_, PermissionRow>(
            "SELECT id, name, description, resource_type, action, created_at, updated_at
             FROM permissions WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_permission", e))?;
        Ok(row.map(Permission::from))
    }

    async fn list_permissions(&self) -> Result<Vec<Permission>, StoreError> {
        let rows = sqlx::query_as::<_, PermissionRow>(
            "SELECT id, name, description, resource_type, action, created_at, updated_at
             FROM permissions ORDER BY name",
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_permissions", e))?;
        Ok(rows.into_iter().map(Permission::from).collect())
    }

    async fn list_permissions_by_resource(
        &self,
        resource_type: &str,
    ) -> Result<Vec<Permission>, StoreError> {
        let rows = sqlx::query_as::<_, PermissionRow>(
            "SELECT id, name, description, resource_type, action, created_at, updated_at
             FROM permissions WHERE resource_type = $1 ORDER BY name",
        )
        .bind(resource_type)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_permissions_by_resource", e))?;
        Ok(rows.into_iter().map(Permission::from).collect())
    }

    #[instrument(skip(self, permission), fields(permission_id = %permission.id), err)]
    async fn update_permission(&self, permission: &Permission) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE permissions
            SET name = $2, description = $3, resource_type = $4, action = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(permission.id.as_uuid())
        .bind(&permission.name)
        .bind(&permission.description)
        .bind(&permission.resource_type)
        .bind(&permission.action)
        .bind(permission.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_permission", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(permission_id = %id), err)]
    async fn delete_permission(&self, id: PermissionId) -> Result<bool, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        // Links first, entity second, one atomic unit.
        sqlx::query("DELETE FROM role_permissions WHERE permission_id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_permission_links", e))?;

        let result = sqlx::query("DELETE FROM permissions WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_permission", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, role), fields(role_id = %role.id), err)]
    async fn insert_role(&self, role: &Role) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO roles (id, name, description, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(role.id.as_uuid())
        .bind(&role.name)
        .bind(&role.description)
        .bind(role.created_at)
        .bind(role.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_role", e))?;
        Ok(())
    }

    async fn fetch_role(&self, id: RoleId) -> Result<Option<Role>, StoreError> {
        let row = sqlx::query_as::<_, RoleRow>(
            "SELECT id, name, description, created_at, updated_at FROM roles WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_role", e))?;
        Ok(row.map(Role::from))
    }

    async fn list_roles(&self) -> Result<Vec<Role>, StoreError> {
        let rows = sqlx::query_as::<_, RoleRow>(
            "SELECT id, name, description, created_at, updated_at FROM roles ORDER BY name",
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_roles", e))?;
        Ok(rows.into_iter().map(Role::from).collect())
    }

    #[instrument(skip(self, role), fields(role_id = %role.id), err)]
    async fn update_role(&self, role: &Role) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE roles SET name = $2, description = $3, updated_at = $4 WHERE id = $1
            "#,
        )
        .bind(role.id.as_uuid())
        .bind(&role.name)
        .bind(&role.description)
        .bind(role.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_role", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(role_id = %id), err)]
    async fn delete_role(&self, id: RoleId) -> Result<bool, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        // Both link tables must be cleaned before the role row goes away:
        // no user may retain a link to a role that no longer exists.
        sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_role_permission_links", e))?;

        sqlx::query("DELETE FROM user_roles WHERE role_id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_user_role_links", e))?;

        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_role", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(role_id = %role_id, permission_id = %permission_id), err)]
    async fn insert_role_permission(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO role_permissions (role_id, permission_id) VALUES ($1, $2)")
            .bind(role_id.as_uuid())
            .bind(permission_id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_role_permission", e))?;
        Ok(())
    }

    async fn delete_role_permission(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "DELETE FROM role_permissions WHERE role_id = $1 AND permission_id = $2",
        )
        .bind(role_id.as_uuid())
        .bind(permission_id.as_uuid())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("delete_role_permission", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(user_id = %user_id, role_id = %role_id), err)]
    async fn insert_user_role(
        &self,
        user_id: UserId,
        role_id: RoleId,
    ) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2)")
            .bind(user_id.as_uuid())
            .bind(role_id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_user_role", e))?;
        Ok(())
    }

    async fn delete_user_role(
        &self,
        user_id: UserId,
        role_id: RoleId,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM user_roles WHERE user_id = $1 AND role_id = $2")
            .bind(user_id.as_uuid())
            .bind(role_id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_user_role", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn permissions_for_role(
        &self,
        role_id: RoleId,
    ) -> Result<Vec<Permission>, StoreError> {
        let rows = sqlx::query_as::<_, PermissionRow>(
            r#"
            SELECT p.id, p.name, p.description, p.resource_type, p.action, p.created_at, p.updated_at
            FROM permissions p
            JOIN role_permissions rp ON rp.permission_id = p.id
            WHERE rp.role_id = $1
            ORDER BY p.name
            "#,
        )
        .bind(role_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("permissions_for_role", e))?;
        Ok(rows.into_iter().map(Permission::from).collect())
    }

    async fn roles_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<RoleWithPermissions>, StoreError> {
        let rows = sqlx::query_as::<_, UserRoleJoinRow>(
            r#"
            SELECT
                r.id AS role_id,
                r.name AS role_name,
                r.description AS role_description,
                r.created_at AS role_created_at,
                r.updated_at AS role_updated_at,
                p.id AS permission_id,
                p.name AS permission_name,
                p.description AS permission_description,
                p.resource_type AS resource_type,
                p.action AS action,
                p.created_at AS permission_created_at,
                p.updated_at AS permission_updated_at
            FROM user_roles ur
            JOIN roles r ON r.id = ur.role_id
            LEFT JOIN role_permissions rp ON rp.role_id = r.id
            LEFT JOIN permissions p ON p.id = rp.permission_id
            WHERE ur.user_id = $1
            ORDER BY r.name, p.name
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("roles_for_user", e))?;

        Ok(aggregate_user_roles(rows))
    }
}

/// Fold join rows (one per role×permission, NULLs for permission-less roles)
/// into populated roles, preserving the query's role ordering.
fn aggregate_user_roles(rows: Vec<UserRoleJoinRow>) -> Vec<RoleWithPermissions> {
    let mut roles: Vec<RoleWithPermissions> = Vec::new();

    for row in rows {
        let role_id = RoleId::from_uuid(row.role_id);
        if roles.last().map(|r| r.role.id) != Some(role_id) {
            roles.push(RoleWithPermissions {
                role: Role {
                    id: role_id,
                    name: row.role_name.clone(),
                    description: row.role_description.clone(),
                    created_at: row.role_created_at,
                    updated_at: row.role_updated_at,
                },
                permissions: Vec::new(),
            });
        }

        if let (
            Some(id),
            Some(name),
            Some(resource_type),
            Some(action),
            Some(created_at),
            Some(updated_at),
        ) = (
            row.permission_id,
            row.permission_name,
            row.resource_type,
            row.action,
            row.permission_created_at,
            row.permission_updated_at,
        ) {
            // `last` is the role this row belongs to: rows arrive role-ordered.
            if let Some(current) = roles.last_mut() {
                current.permissions.push(Permission {
                    id: PermissionId::from_uuid(id),
                    name,
                    description: row.permission_description,
                    resource_type,
                    action,
                    created_at,
                    updated_at,
                });
            }
        }
    }

    roles
}

/// Single translation boundary from SQLx errors to the closed `StoreError`
/// set. No other code inspects datastore error codes.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let constraint = db_err
                .constraint()
                .map(str::to_string)
                .unwrap_or_else(|| format!("{operation}: {}", db_err.message()));

            match db_err.code().as_deref() {
                Some("23505") => StoreError::UniqueViolation { constraint },
                Some("23503") => StoreError::ForeignKeyViolation { constraint },
                _ => StoreError::Backend(format!(
                    "database error in {operation}: {}",
                    db_err.message()
                )),
            }
        }
        other => StoreError::Backend(format!("{operation}: {other}")),
    }
}
