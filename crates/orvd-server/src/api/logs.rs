//! Unauthenticated log and telemetry export endpoints.

use axum::{
    extract::{RawQuery, State},
    response::IntoResponse,
};
use std::sync::Arc;

use crate::dispatch::{IdParams, Params};
use crate::ops::logs;
use crate::state::AppState;

pub async fn get_logs(State(state): State<Arc<AppState>>, RawQuery(query): RawQuery) -> impl IntoResponse {
    let params = Params::from_query(query.as_deref().unwrap_or_default());
    super::open(state, params, |state, p: IdParams| async move {
        logs::get_logs(&state, &p.id).await
    })
    .await
}

/// `record_time,lat,lon,alt,azimuth,dop,sats,speed` rows, oldest first.
pub async fn get_telemetry_csv(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    let params = Params::from_query(query.as_deref().unwrap_or_default());
    super::open(state, params, |state, p: IdParams| async move {
        logs::telemetry_csv(&state, &p.id).await
    })
    .await
}

pub async fn health() -> &'static str {
    "OK"
}
