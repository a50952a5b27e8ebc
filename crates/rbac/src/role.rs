//! Role entity: a named, reusable bundle of permissions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use opsforge_core::{Entity, RoleId};

use crate::error::RbacResult;
use crate::permission::{validate_name, Permission};

/// A named bundle of permissions. Users acquire permissions by holding roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to create a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDraft {
    pub name: String,
    pub description: Option<String>,
}

/// Partial update: `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
}

/// A role populated with the permissions it grants.
///
/// This is the query shape `list_roles_for_user` returns and the resolver
/// consumes; it is derived, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleWithPermissions {
    pub role: Role,
    pub permissions: Vec<Permission>,
}

impl Role {
    /// Validate a draft and mint a new role with a fresh id.
    pub fn new(draft: RoleDraft) -> RbacResult<Self> {
        let now = Utc::now();
        Ok(Self {
            id: RoleId::new(),
            name: validate_name(&draft.name)?,
            description: draft.description,
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply a partial update, bumping `updated_at`.
    ///
    /// Name uniqueness is enforced by the store's unique index, not here.
    pub fn apply(&mut self, patch: RolePatch) -> RbacResult<()> {
        if let Some(name) = patch.name {
            self.name = validate_name(&name)?;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}

impl Entity for Role {
    type Id = RoleId;

    fn id(&self) -> &RoleId {
        &self.id
    }
}
