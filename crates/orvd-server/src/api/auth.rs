//! Operator token extraction.

use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::dispatch::Params;

/// Token from the `token` parameter, falling back to `Authorization: Bearer <token>`.
pub fn request_token(params: &Params, headers: &HeaderMap) -> Option<String> {
    params
        .get("token")
        .map(str::to_string)
        .or_else(|| extract_bearer(headers))
}

pub fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// JSON 401 used by the zone file endpoints.
pub fn unauthorized_json() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "error": "Unauthorized" })),
    )
        .into_response()
}
