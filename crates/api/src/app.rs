use std::sync::Arc;

use axum::{middleware as axum_middleware, routing::get, Extension, Router};

use opsforge_infra::{
    AllowAllDirectory, AssociationManager, AuditSink, IdentityDirectory, InMemoryRbacStore,
    PermissionResolver, PermissionStore, RbacStore, RoleStore, TracingAuditSink,
};

use crate::middleware;

pub mod errors;
pub mod routes;

/// Engine services shared by all handlers.
///
/// The storage backend is type-erased so the same router serves the
/// in-memory wiring (dev/test) and Postgres (prod).
pub struct AppServices {
    pub permissions: PermissionStore<dyn RbacStore>,
    pub roles: RoleStore<dyn RbacStore>,
    pub associations: AssociationManager<dyn RbacStore>,
    pub resolver: PermissionResolver<dyn RbacStore>,
}

impl AppServices {
    pub fn new(
        store: Arc<dyn RbacStore>,
        audit: Arc<dyn AuditSink>,
        identity: Arc<dyn IdentityDirectory>,
    ) -> Self {
        Self {
            permissions: PermissionStore::new(store.clone(), audit.clone()),
            roles: RoleStore::new(store.clone(), audit.clone()),
            associations: AssociationManager::new(store.clone(), audit, identity),
            resolver: PermissionResolver::new(store),
        }
    }

    /// In-memory wiring: log-only audit, trust-all identity.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryRbacStore::new()),
            Arc::new(TracingAuditSink),
            Arc::new(AllowAllDirectory),
        )
    }
}

/// Build the full application router.
///
/// Everything except `/healthz` requires an authenticated actor id.
pub fn build_app(services: Arc<AppServices>) -> Router {
    let engine = Router::new()
        .merge(routes::permissions::router())
        .merge(routes::roles::router())
        .merge(routes::users::router())
        .layer(axum_middleware::from_fn(middleware::actor_middleware))
        .layer(Extension(services));

    Router::new()
        .route("/healthz", get(routes::system::healthz))
        .merge(engine)
}
