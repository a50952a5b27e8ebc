use axum::{http::StatusCode, response::IntoResponse, Json};

pub async fn healthz() -> axum::response::Response {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" }))).into_response()
}
