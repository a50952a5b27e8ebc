use std::sync::Arc;

use opsforge_api::app::{build_app, AppServices};
use opsforge_infra::{AllowAllDirectory, PostgresRbacStore, TracingAuditSink};

#[tokio::main]
async fn main() {
    opsforge_observability::init();

    let services = match std::env::var("DATABASE_URL") {
        Ok(url) => {
            let pool = sqlx::PgPool::connect(&url)
                .await
                .expect("failed to connect to DATABASE_URL");
            let store = PostgresRbacStore::new(pool);
            store
                .ensure_schema()
                .await
                .expect("failed to ensure database schema");
            Arc::new(AppServices::new(
                Arc::new(store),
                Arc::new(TracingAuditSink),
                Arc::new(AllowAllDirectory),
            ))
        }
        Err(_) => {
            tracing::warn!("DATABASE_URL not set; using in-memory store");
            Arc::new(AppServices::in_memory())
        }
    };

    let app = build_app(services);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:8080")
        .await
        .expect("failed to bind 0.0.0.0:8080");

    tracing::info!("listening on {}", listener.local_addr().unwrap());

    axum::serve(listener, app).await.unwrap();
}
