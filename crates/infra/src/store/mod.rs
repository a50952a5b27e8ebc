//! Storage backends for the RBAC engine.
//!
//! All constraint knowledge (unique indexes, foreign keys, transactions)
//! lives behind the `RbacStore` trait; backends surface violations through
//! the closed `StoreError` set and nothing else.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryRbacStore;
pub use postgres::PostgresRbacStore;
pub use r#trait::{RbacStore, StoreError};
