//! Infrastructure layer: storage adapters, engine services, collaborator ports.
//!
//! The RBAC engine itself lives here: `engine::*` orchestrates the domain
//! types from `opsforge-rbac` over a `store::RbacStore` backend, reporting
//! successful mutations to an injected audit sink.

pub mod collaborators;
pub mod engine;
pub mod store;

mod integration_tests;

pub use collaborators::{
    AllowAllDirectory, AuditSink, IdentityDirectory, NoopAuditSink, RecordingAuditSink,
    StaticDirectory, TracingAuditSink,
};
pub use engine::{AssociationManager, PermissionResolver, PermissionStore, RoleStore};
pub use store::{InMemoryRbacStore, PostgresRbacStore, RbacStore, StoreError};
