//! `opsforge-rbac` — pure RBAC domain model (entities, invariants, set math).
//!
//! This crate is intentionally decoupled from HTTP and storage: it defines
//! permissions, roles, the domain error taxonomy, the audit event model, and
//! the effective-permission computation. All IO lives in `opsforge-infra`.

pub mod audit;
pub mod error;
pub mod permission;
pub mod resolve;
pub mod role;

pub use audit::{AuditAction, AuditEvent};
pub use error::{RbacError, RbacResult, ResourceKind};
pub use permission::{normalize_selector, Permission, PermissionDraft, PermissionPatch};
pub use resolve::{AccessDecision, EffectivePermissionSet};
pub use role::{Role, RoleDraft, RolePatch, RoleWithPermissions};
