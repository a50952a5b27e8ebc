//! RBAC error taxonomy.
//!
//! This is a **closed set**: every failure the engine can surface is one of
//! these kinds. Lower-level datastore failures are translated exactly once at
//! the storage boundary and arrive here as `Storage`, never disguised as a
//! domain validation failure.

use thiserror::Error;

/// Result type used across the RBAC engine.
pub type RbacResult<T> = Result<T, RbacError>;

/// Kind of entity an operation referenced.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ResourceKind {
    Permission,
    Role,
    User,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Permission => "permission",
            ResourceKind::Role => "role",
            ResourceKind::User => "user",
        }
    }
}

impl core::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain-level RBAC error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RbacError {
    /// The operation referenced a permission, role, or link that does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: ResourceKind, id: String },

    /// Create/update collided with an existing unique name.
    #[error("{kind} name already in use: '{name}'")]
    DuplicateName { kind: ResourceKind, name: String },

    /// Assignment targeted a link that already exists.
    #[error("association already exists: {0}")]
    AlreadyAssigned(String),

    /// Removal targeted a link that does not exist.
    #[error("association does not exist: {0}")]
    NotAssigned(String),

    /// An association referenced a permission/role/user that cannot be found.
    #[error("referential integrity: {0}")]
    Referential(String),

    /// A field failed domain validation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Unexpected lower-level failure (datastore connectivity etc).
    ///
    /// Deliberately distinct from every domain kind above; callers must not
    /// treat this as a validation outcome.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl RbacError {
    pub fn not_found(kind: ResourceKind, id: impl core::fmt::Display) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn duplicate_name(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self::DuplicateName {
            kind,
            name: name.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn referential(msg: impl Into<String>) -> Self {
        Self::Referential(msg.into())
    }
}

impl From<opsforge_core::DomainError> for RbacError {
    fn from(err: opsforge_core::DomainError) -> Self {
        match err {
            opsforge_core::DomainError::Validation(msg) => RbacError::Validation(msg),
            opsforge_core::DomainError::InvalidId(msg) => RbacError::Validation(msg),
        }
    }
}
