//! Role CRUD and role↔permission association endpoints.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Deserializer};

use opsforge_core::{PermissionId, RoleId};
use opsforge_rbac::{RoleDraft, RolePatch};

use crate::app::{errors, AppServices};
use crate::context::ActorContext;

#[derive(Debug, Deserialize)]
pub struct CreateRoleRequest {
    pub name: String,
    pub description: Option<String>,
}

fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateRoleRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
}

#[derive(Debug, Deserialize)]
pub struct AssignPermissionRequest {
    pub permission_id: String,
}

pub fn router() -> Router {
    Router::new()
        .route("/roles", get(list_roles).post(create_role))
        .route(
            "/roles/:id",
            get(get_role).patch(update_role).delete(delete_role),
        )
        .route(
            "/roles/:id/permissions",
            get(list_role_permissions).post(assign_permission),
        )
        .route(
            "/roles/:id/permissions/:permission_id",
            axum::routing::delete(remove_permission),
        )
}

fn parse_role_id(raw: &str) -> Result<RoleId, axum::response::Response> {
    raw.parse::<RoleId>()
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid role id"))
}

fn parse_permission_id(raw: &str) -> Result<PermissionId, axum::response::Response> {
    raw.parse::<PermissionId>().map_err(|_| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid permission id")
    })
}

pub async fn create_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<CreateRoleRequest>,
) -> axum::response::Response {
    let draft = RoleDraft {
        name: body.name,
        description: body.description,
    };

    match services.roles.create(actor.actor(), draft).await {
        Ok(role) => (StatusCode::CREATED, Json(role)).into_response(),
        Err(e) => errors::rbac_error_to_response(e),
    }
}

pub async fn list_roles(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.roles.list_all().await {
        Ok(roles) => (StatusCode::OK, Json(serde_json::json!({ "roles": roles }))).into_response(),
        Err(e) => errors::rbac_error_to_response(e),
    }
}

pub async fn get_role(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_role_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.roles.get(id).await {
        Ok(role) => (StatusCode::OK, Json(role)).into_response(),
        Err(e) => errors::rbac_error_to_response(e),
    }
}

pub async fn update_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<UpdateRoleRequest>,
) -> axum::response::Response {
    let id = match parse_role_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let patch = RolePatch {
        name: body.name,
        description: body.description,
    };

    match services.roles.update(actor.actor(), id, patch).await {
        Ok(role) => (StatusCode::OK, Json(role)).into_response(),
        Err(e) => errors::rbac_error_to_response(e),
    }
}

pub async fn delete_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_role_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.roles.delete(actor.actor(), id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::rbac_error_to_response(e),
    }
}

pub async fn list_role_permissions(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_role_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.associations.list_permissions_for_role(id).await {
        Ok(permissions) => (
            StatusCode::OK,
            Json(serde_json::json!({ "permissions": permissions })),
        )
            .into_response(),
        Err(e) => errors::rbac_error_to_response(e),
    }
}

pub async fn assign_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<AssignPermissionRequest>,
) -> axum::response::Response {
    let role_id = match parse_role_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let permission_id = match parse_permission_id(&body.permission_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services
        .associations
        .assign_permission_to_role(actor.actor(), role_id, permission_id)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::rbac_error_to_response(e),
    }
}

pub async fn remove_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path((id, permission_id)): Path<(String, String)>,
) -> axum::response::Response {
    let role_id = match parse_role_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let permission_id = match parse_permission_id(&permission_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services
        .associations
        .remove_permission_from_role(actor.actor(), role_id, permission_id)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::rbac_error_to_response(e),
    }
}
