//! Permission CRUD endpoints.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Deserializer};

use opsforge_core::PermissionId;
use opsforge_rbac::{PermissionDraft, PermissionPatch};

use crate::app::{errors, AppServices};
use crate::context::ActorContext;

#[derive(Debug, Deserialize)]
pub struct CreatePermissionRequest {
    pub name: String,
    pub description: Option<String>,
    pub resource_type: String,
    pub action: String,
}

/// Distinguishes an absent field from an explicit `null` (which clears the
/// description).
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdatePermissionRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub resource_type: Option<String>,
    pub action: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListPermissionsQuery {
    pub resource_type: Option<String>,
}

pub fn router() -> Router {
    Router::new()
        .route(
            "/permissions",
            get(list_permissions).post(create_permission),
        )
        .route(
            "/permissions/:id",
            get(get_permission)
                .patch(update_permission)
                .delete(delete_permission),
        )
}

fn parse_id(raw: &str) -> Result<PermissionId, axum::response::Response> {
    raw.parse::<PermissionId>().map_err(|_| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid permission id")
    })
}

pub async fn create_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<CreatePermissionRequest>,
) -> axum::response::Response {
    let draft = PermissionDraft {
        name: body.name,
        description: body.description,
        resource_type: body.resource_type,
        action: body.action,
    };

    match services.permissions.create(actor.actor(), draft).await {
        Ok(permission) => (StatusCode::CREATED, Json(permission)).into_response(),
        Err(e) => errors::rbac_error_to_response(e),
    }
}

pub async fn list_permissions(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<ListPermissionsQuery>,
) -> axum::response::Response {
    let result = match query.resource_type {
        Some(resource_type) => {
            services
                .permissions
                .list_by_resource_type(&resource_type)
                .await
        }
        None => services.permissions.list_all().await,
    };

    match result {
        Ok(permissions) => (
            StatusCode::OK,
            Json(serde_json::json!({ "permissions": permissions })),
        )
            .into_response(),
        Err(e) => errors::rbac_error_to_response(e),
    }
}

pub async fn get_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.permissions.get(id).await {
        Ok(permission) => (StatusCode::OK, Json(permission)).into_response(),
        Err(e) => errors::rbac_error_to_response(e),
    }
}

pub async fn update_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<UpdatePermissionRequest>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let patch = PermissionPatch {
        name: body.name,
        description: body.description,
        resource_type: body.resource_type,
        action: body.action,
    };

    match services.permissions.update(actor.actor(), id, patch).await {
        Ok(permission) => (StatusCode::OK, Json(permission)).into_response(),
        Err(e) => errors::rbac_error_to_response(e),
    }
}

pub async fn delete_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.permissions.delete(actor.actor(), id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::rbac_error_to_response(e),
    }
}
