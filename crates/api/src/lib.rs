//! HTTP API: server, routing, and request/response mapping.
//!
//! Authentication is an external collaborator: requests arrive with an
//! already-authenticated actor id in the `x-actor-id` header, and this layer
//! only extracts and forwards it.

pub mod app;
pub mod context;
pub mod middleware;
