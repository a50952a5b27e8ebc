//! RBAC engine services.
//!
//! Each service orchestrates domain types over the storage port and reports
//! successful mutations to the injected audit sink. The services hold no
//! mutable state of their own; every call reflects the latest committed
//! associations.

pub mod associations;
pub mod permissions;
pub mod resolver;
pub mod roles;

pub use associations::AssociationManager;
pub use permissions::PermissionStore;
pub use resolver::PermissionResolver;
pub use roles::RoleStore;

use opsforge_rbac::RbacError;
use serde::Serialize;

use crate::store::StoreError;

/// Fallback translation for store failures no domain kind claims.
pub(crate) fn storage_error(err: StoreError) -> RbacError {
    RbacError::Storage(err.to_string())
}

/// Audit snapshot of an entity; serialization failure degrades to null
/// rather than failing the mutation that already committed.
pub(crate) fn snapshot<T: Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}
