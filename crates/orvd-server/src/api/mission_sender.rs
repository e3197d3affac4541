//! Mission sender endpoints.

use axum::{
    extract::{RawQuery, State},
    response::IntoResponse,
};
use std::sync::Arc;

use crate::dispatch::{self, IdParams, Params};
use crate::ops::mission_sender;
use crate::state::AppState;

pub async fn key(State(state): State<Arc<AppState>>, RawQuery(query): RawQuery) -> impl IntoResponse {
    let params = Params::from_query(query.as_deref().unwrap_or_default());
    super::open(state, params, |state, p: IdParams| async move {
        mission_sender::key_exchange(&state, &p.id).await
    })
    .await
}

/// WPL upload. The body is the mission file; the reply is server-signed.
pub async fn fmission_ms(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
    body: String,
) -> impl IntoResponse {
    let params = Params::from_query(query.as_deref().unwrap_or_default());
    let p = match dispatch::parse::<IdParams>(&params) {
        Ok(p) => p,
        Err(reply) => return reply,
    };
    dispatch::signed_unverified(&state, params.get("sig"), || {
        mission_sender::upload_mission(&state, &p.id, &body)
    })
    .await
}
