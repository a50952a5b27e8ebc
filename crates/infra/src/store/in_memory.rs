//! In-memory RBAC store.
//!
//! Intended for tests/dev. Mirrors the Postgres backend's constraint
//! semantics: duplicate names and duplicate composite link keys surface as
//! `StoreError::UniqueViolation`, missing link endpoints as
//! `StoreError::ForeignKeyViolation`, so engine translation paths are
//! exercised without a database. Every mutation runs under a single write
//! lock, which makes cascading deletes atomic.

use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;

use opsforge_core::{PermissionId, RoleId, UserId};
use opsforge_rbac::{Permission, Role, RoleWithPermissions};

use super::r#trait::{RbacStore, StoreError};

#[derive(Debug, Default)]
struct Tables {
    permissions: HashMap<PermissionId, Permission>,
    roles: HashMap<RoleId, Role>,
    role_permissions: BTreeSet<(RoleId, PermissionId)>,
    user_roles: BTreeSet<(UserId, RoleId)>,
}

/// In-memory relational tables behind the `RbacStore` port.
#[derive(Debug, Default)]
pub struct InMemoryRbacStore {
    tables: RwLock<Tables>,
}

impl InMemoryRbacStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }
}

fn by_name<T: Clone>(mut items: Vec<T>, name: impl Fn(&T) -> String) -> Vec<T> {
    items.sort_by_key(|i| name(i));
    items
}

#[async_trait]
impl RbacStore for InMemoryRbacStore {
    async fn insert_permission(&self, permission: &Permission) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        if tables
            .permissions
            .values()
            .any(|p| p.name == permission.name)
        {
            return Err(StoreError::UniqueViolation {
                constraint: "permissions_name_key".to_string(),
            });
        }
        tables.permissions.insert(permission.id, permission.clone());
        Ok(())
    }

    async fn fetch_permission(&self, id: PermissionId) -> Result<Option<Permission>, StoreError> {
        Ok(self.read()?.permissions.get(&id).cloned())
    }

    async fn list_permissions(&self) -> Result<Vec<Permission>, StoreError> {
        let tables = self.read()?;
        Ok(by_name(
            tables.permissions.values().cloned().collect(),
            |p: &Permission| p.name.clone(),
        ))
    }

    async fn list_permissions_by_resource(
        &self,
        resource_type: &str,
    ) -> Result<Vec<Permission>, StoreError> {
        let tables = self.read()?;
        Ok(by_name(
            tables
                .permissions
                .values()
                .filter(|p| p.resource_type == resource_type)
                .cloned()
                .collect(),
            |p: &Permission| p.name.clone(),
        ))
    }

    async fn update_permission(&self, permission: &Permission) -> Result<bool, StoreError> {
        let mut tables = self.write()?;
        if tables
            .permissions
            .values()
            .any(|p| p.name == permission.name && p.id != permission.id)
        {
            return Err(StoreError::UniqueViolation {
                constraint: "permissions_name_key".to_string(),
            });
        }
        match tables.permissions.get_mut(&permission.id) {
            Some(existing) => {
                *existing = permission.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_permission(&self, id: PermissionId) -> Result<bool, StoreError> {
        // Single write-lock critical section: links and entity go together.
        let mut tables = self.write()?;
        tables.role_permissions.retain(|(_, pid)| *pid != id);
        Ok(tables.permissions.remove(&id).is_some())
    }

    async fn insert_role(&self, role: &Role) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        if tables.roles.values().any(|r| r.name == role.name) {
            return Err(StoreError::UniqueViolation {
                constraint: "roles_name_key".to_string(),
            });
        }
        tables.roles.insert(role.id, role.clone());
        Ok(())
    }

    async fn fetch_role(&self, id: RoleId) -> Result<Option<Role>, StoreError> {
        Ok(self.read()?.roles.get(&id).cloned())
    }

    async fn list_roles(&self) -> Result<Vec<Role>, StoreError> {
        let tables = self.read()?;
        Ok(by_name(
            tables.roles.values().cloned().collect(),
            |r: &Role| r.name.clone(),
        ))
    }

    async fn update_role(&self, role: &Role) -> Result<bool, StoreError> {
        let mut tables = self.write()?;
        if tables
            .roles
            .values()
            .any(|r| r.name == role.name && r.id != role.id)
        {
            return Err(StoreError::UniqueViolation {
                constraint: "roles_name_key".to_string(),
            });
        }
        match tables.roles.get_mut(&role.id) {
            Some(existing) => {
                *existing = role.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_role(&self, id: RoleId) -> Result<bool, StoreError> {
        let mut tables = self.write()?;
        tables.role_permissions.retain(|(rid, _)| *rid != id);
        tables.user_roles.retain(|(_, rid)| *rid != id);
        Ok(tables.roles.remove(&id).is_some())
    }

    async fn insert_role_permission(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        if !tables.roles.contains_key(&role_id) {
            return Err(StoreError::ForeignKeyViolation {
                constraint: "role_permissions_role_id_fkey".to_string(),
            });
        }
        if !tables.permissions.contains_key(&permission_id) {
            return Err(StoreError::ForeignKeyViolation {
                constraint: "role_permissions_permission_id_fkey".to_string(),
            });
        }
        if !tables.role_permissions.insert((role_id, permission_id)) {
            return Err(StoreError::UniqueViolation {
                constraint: "role_permissions_pkey".to_string(),
            });
        }
        Ok(())
    }

    async fn delete_role_permission(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> Result<bool, StoreError> {
        Ok(self.write()?.role_permissions.remove(&(role_id, permission_id)))
    }

    async fn insert_user_role(
        &self,
        user_id: UserId,
        role_id: RoleId,
    ) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        if !tables.roles.contains_key(&role_id) {
            return Err(StoreError::ForeignKeyViolation {
                constraint: "user_roles_role_id_fkey".to_string(),
            });
        }
        if !tables.user_roles.insert((user_id, role_id)) {
            return Err(StoreError::UniqueViolation {
                constraint: "user_roles_pkey".to_string(),
            });
        }
        Ok(())
    }

    async fn delete_user_role(
        &self,
        user_id: UserId,
        role_id: RoleId,
    ) -> Result<bool, StoreError> {
        Ok(self.write()?.user_roles.remove(&(user_id, role_id)))
    }

    async fn permissions_for_role(
        &self,
        role_id: RoleId,
    ) -> Result<Vec<Permission>, StoreError> {
        let tables = self.read()?;
        Ok(by_name(
            tables
                .role_permissions
                .iter()
                .filter(|(rid, _)| *rid == role_id)
                .filter_map(|(_, pid)| tables.permissions.get(pid).cloned())
                .collect(),
            |p: &Permission| p.name.clone(),
        ))
    }

    async fn roles_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<RoleWithPermissions>, StoreError> {
        let tables = self.read()?;
        let mut roles: Vec<RoleWithPermissions> = tables
            .user_roles
            .iter()
            .filter(|(uid, _)| *uid == user_id)
            .filter_map(|(_, rid)| tables.roles.get(rid).cloned())
            .map(|role| {
                let permissions = by_name(
                    tables
                        .role_permissions
                        .iter()
                        .filter(|(rid, _)| *rid == role.id)
                        .filter_map(|(_, pid)| tables.permissions.get(pid).cloned())
                        .collect(),
                    |p: &Permission| p.name.clone(),
                );
                RoleWithPermissions { role, permissions }
            })
            .collect();
        roles.sort_by(|a, b| a.role.name.cmp(&b.role.name));
        Ok(roles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsforge_rbac::{PermissionDraft, RoleDraft};

    fn perm(name: &str) -> Permission {
        Permission::new(PermissionDraft {
            name: name.to_string(),
            description: None,
            resource_type: "DOCUMENT".to_string(),
            action: "READ".to_string(),
        })
        .unwrap()
    }

    fn role(name: &str) -> Role {
        Role::new(RoleDraft {
            name: name.to_string(),
            description: None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn duplicate_permission_name_is_unique_violation() {
        let store = InMemoryRbacStore::new();
        store.insert_permission(&perm("p")).await.unwrap();
        let err = store.insert_permission(&perm("p")).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn duplicate_link_is_unique_violation() {
        let store = InMemoryRbacStore::new();
        let p = perm("p");
        let r = role("r");
        store.insert_permission(&p).await.unwrap();
        store.insert_role(&r).await.unwrap();

        store.insert_role_permission(r.id, p.id).await.unwrap();
        let err = store
            .insert_role_permission(r.id, p.id)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation { .. }));

        // Still exactly one row for the pair.
        assert_eq!(store.permissions_for_role(r.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn link_to_missing_endpoint_is_fk_violation() {
        let store = InMemoryRbacStore::new();
        let r = role("r");
        store.insert_role(&r).await.unwrap();

        let err = store
            .insert_role_permission(r.id, PermissionId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ForeignKeyViolation { .. }));
    }

    #[tokio::test]
    async fn delete_role_cascades_both_link_tables() {
        let store = InMemoryRbacStore::new();
        let p = perm("p");
        let r = role("r");
        let user = UserId::new();
        store.insert_permission(&p).await.unwrap();
        store.insert_role(&r).await.unwrap();
        store.insert_role_permission(r.id, p.id).await.unwrap();
        store.insert_user_role(user, r.id).await.unwrap();

        assert!(store.delete_role(r.id).await.unwrap());
        assert!(store.roles_for_user(user).await.unwrap().is_empty());
        // Permission survives, only the links are gone.
        assert!(store.fetch_permission(p.id).await.unwrap().is_some());
    }
}
