use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use opsforge_core::UserId;

use crate::app::errors;
use crate::context::ActorContext;

const ACTOR_HEADER: &str = "x-actor-id";

/// Extract the authenticated actor id supplied by the identity collaborator.
///
/// The engine trusts this value; it does not authenticate. Missing or
/// malformed ids are rejected before any handler runs.
pub async fn actor_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let actor = extract_actor(req.headers())?;
    req.extensions_mut().insert(ActorContext::new(actor));
    Ok(next.run(req).await)
}

fn extract_actor(headers: &HeaderMap) -> Result<UserId, Response> {
    let header = headers.get(ACTOR_HEADER).ok_or_else(|| {
        errors::json_error(
            StatusCode::UNAUTHORIZED,
            "no_identity",
            "missing x-actor-id header",
        )
    })?;

    let header = header.to_str().map_err(|_| {
        errors::json_error(
            StatusCode::UNAUTHORIZED,
            "no_identity",
            "x-actor-id header is not valid text",
        )
    })?;

    header.trim().parse::<UserId>().map_err(|_| {
        errors::json_error(
            StatusCode::UNAUTHORIZED,
            "no_identity",
            "x-actor-id header is not a valid user id",
        )
    })
}
