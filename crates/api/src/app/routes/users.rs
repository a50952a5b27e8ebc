//! User↔role associations and effective-permission queries.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use opsforge_core::{RoleId, UserId};

use crate::app::{errors, AppServices};
use crate::context::ActorContext;

#[derive(Debug, Deserialize)]
pub struct AssignRoleRequest {
    pub role_id: String,
}

/// Either a permission id, or a (resource type, action) pair.
#[derive(Debug, Deserialize)]
pub struct CheckQuery {
    pub permission_id: Option<String>,
    pub resource_type: Option<String>,
    pub action: Option<String>,
}

pub fn router() -> Router {
    Router::new()
        .route("/users/:id/roles", get(list_user_roles).post(assign_role))
        .route(
            "/users/:id/roles/:role_id",
            axum::routing::delete(remove_role),
        )
        .route("/users/:id/permissions", get(effective_permissions))
        .route("/users/:id/permissions/check", get(check_permission))
}

fn parse_user_id(raw: &str) -> Result<UserId, axum::response::Response> {
    raw.parse::<UserId>()
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid user id"))
}

fn parse_role_id(raw: &str) -> Result<RoleId, axum::response::Response> {
    raw.parse::<RoleId>()
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid role id"))
}

pub async fn assign_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<AssignRoleRequest>,
) -> axum::response::Response {
    let user_id = match parse_user_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let role_id = match parse_role_id(&body.role_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services
        .associations
        .assign_role_to_user(actor.actor(), user_id, role_id)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::rbac_error_to_response(e),
    }
}

pub async fn remove_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path((id, role_id)): Path<(String, String)>,
) -> axum::response::Response {
    let user_id = match parse_user_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let role_id = match parse_role_id(&role_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services
        .associations
        .remove_role_from_user(actor.actor(), user_id, role_id)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::rbac_error_to_response(e),
    }
}

pub async fn list_user_roles(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let user_id = match parse_user_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.associations.list_roles_for_user(user_id).await {
        Ok(roles) => (StatusCode::OK, Json(serde_json::json!({ "roles": roles }))).into_response(),
        Err(e) => errors::rbac_error_to_response(e),
    }
}

pub async fn effective_permissions(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let user_id = match parse_user_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.resolver.effective_permissions(user_id).await {
        Ok(effective) => (
            StatusCode::OK,
            Json(serde_json::json!({ "permissions": effective.permissions() })),
        )
            .into_response(),
        Err(e) => errors::rbac_error_to_response(e),
    }
}

pub async fn check_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Query(query): Query<CheckQuery>,
) -> axum::response::Response {
    let user_id = match parse_user_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let decision = match (query.permission_id, query.resource_type, query.action) {
        (Some(permission_id), None, None) => {
            let permission_id = match permission_id.parse() {
                Ok(id) => id,
                Err(_) => {
                    return errors::json_error(
                        StatusCode::BAD_REQUEST,
                        "invalid_id",
                        "invalid permission id",
                    )
                }
            };
            services.resolver.has_permission(user_id, permission_id).await
        }
        (None, Some(resource_type), Some(action)) => {
            services
                .resolver
                .has_permission_by_action(user_id, &resource_type, &action)
                .await
        }
        _ => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_query",
                "provide either permission_id or resource_type+action",
            )
        }
    };

    match decision {
        Ok(decision) => (StatusCode::OK, Json(decision)).into_response(),
        Err(e) => errors::rbac_error_to_response(e),
    }
}
