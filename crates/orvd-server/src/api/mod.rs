//! HTTP adapter over the relay operations.

pub mod admin;
pub mod auth;
pub mod logs;
pub mod mission_sender;
pub mod request_id;
mod routes;
pub mod vehicle;
pub mod ws;

use axum::http::HeaderMap;
use axum::Router;
use orvd_core::models::KeyGroup;
use orvd_core::wire::canonical_request;
use std::future::Future;
use std::sync::Arc;

use crate::dispatch::{self, Answer, FromParams, IdParams, Params, Reply};
use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    routes::create_router()
}

/// Signed vehicle call: parameters first, then the `kos{id}` signature over `path?query`.
pub(crate) async fn signed_vehicle<P, F, Fut>(
    state: Arc<AppState>,
    path: &str,
    query: Option<String>,
    op: F,
) -> Reply
where
    P: FromParams,
    F: FnOnce(Arc<AppState>, P) -> Fut,
    Fut: Future<Output = Result<Answer, ApiError>>,
{
    let raw = query.unwrap_or_default();
    let params = Params::from_query(&raw);
    let id = match dispatch::parse::<IdParams>(&params) {
        Ok(p) => p.id,
        Err(reply) => return reply,
    };
    let p = match dispatch::parse::<P>(&params) {
        Ok(p) => p,
        Err(reply) => return reply,
    };
    let canonical = canonical_request(path, &raw);
    dispatch::signed(
        &state,
        KeyGroup::vehicle(id),
        &canonical,
        params.get("sig"),
        || op(state.clone(), p),
    )
    .await
}

/// Operator call authorized by token.
pub(crate) async fn with_token<P, F, Fut>(
    state: Arc<AppState>,
    headers: &HeaderMap,
    params: Params,
    op: F,
) -> Reply
where
    P: FromParams,
    F: FnOnce(Arc<AppState>, P) -> Fut,
    Fut: Future<Output = Result<Answer, ApiError>>,
{
    let p = match dispatch::parse::<P>(&params) {
        Ok(p) => p,
        Err(reply) => return reply,
    };
    let token = auth::request_token(&params, headers);
    dispatch::authorized(&state, token.as_deref(), || op(state.clone(), p)).await
}

/// Unauthenticated call.
pub(crate) async fn open<P, F, Fut>(state: Arc<AppState>, params: Params, op: F) -> Reply
where
    P: FromParams,
    F: FnOnce(Arc<AppState>, P) -> Fut,
    Fut: Future<Output = Result<Answer, ApiError>>,
{
    let p = match dispatch::parse::<P>(&params) {
        Ok(p) => p,
        Err(reply) => return reply,
    };
    dispatch::regular(|| op(state, p)).await
}

#[cfg(test)]
mod tests;
