//! Vehicle endpoints. Everything except `/api/key` is signed with the vehicle's key.

use axum::{
    extract::{RawQuery, State},
    response::IntoResponse,
};
use std::sync::Arc;

use super::signed_vehicle;
use crate::dispatch::{self, Answer, IdParams, KeyParams, LogParams, Params, ReviseParams, TelemetryParams};
use crate::error::ApiError;
use crate::ops::{logs, vehicle};
use crate::state::AppState;

/// Key exchange: store the vehicle key, answer with the server key.
pub async fn key(State(state): State<Arc<AppState>>, RawQuery(query): RawQuery) -> impl IntoResponse {
    let params = Params::from_query(query.as_deref().unwrap_or_default());
    super::open(state, params, |state, p: KeyParams| async move {
        let reply = state.keys.exchange_vehicle_key(&p.id, &p.n, &p.e).await?;
        Ok(Answer::Text(reply))
    })
    .await
}

pub async fn auth(State(state): State<Arc<AppState>>, RawQuery(query): RawQuery) -> impl IntoResponse {
    signed_vehicle(state, "/api/auth", query, |state, p: IdParams| async move {
        vehicle::auth(&state, &p.id).await
    })
    .await
}

/// Blocks until an operator decides or the decision timeout passes.
pub async fn arm(State(state): State<Arc<AppState>>, RawQuery(query): RawQuery) -> impl IntoResponse {
    signed_vehicle(state, "/api/arm", query, |state, p: IdParams| async move {
        vehicle::arm(&state, &p.id).await
    })
    .await
}

pub async fn fly_accept(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    signed_vehicle(state, "/api/fly_accept", query, |state, p: IdParams| async move {
        vehicle::fly_accept(&state, &p.id).await
    })
    .await
}

/// Disabled flight info answers 403 before any parameter or signature check.
pub async fn flight_info(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    if !state.flight_info_response() {
        return dispatch::Reply::from_error(ApiError::Forbidden);
    }
    signed_vehicle(state, "/api/flight_info", query, |state, p: IdParams| async move {
        vehicle::flight_info(&state, &p.id).await
    })
    .await
}

pub async fn telemetry(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    signed_vehicle(state, "/api/telemetry", query, |state, p: TelemetryParams| async move {
        vehicle::telemetry(&state, &p.id, &p.report).await
    })
    .await
}

pub async fn kill_switch(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    signed_vehicle(state, "/api/kill_switch", query, |state, p: IdParams| async move {
        vehicle::kill_switch(&state, &p.id).await
    })
    .await
}

pub async fn fmission_kos(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    signed_vehicle(state, "/api/fmission_kos", query, |state, p: IdParams| async move {
        vehicle::fmission_kos(&state, &p.id).await
    })
    .await
}

pub async fn get_all_forbidden_zones(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    signed_vehicle(
        state,
        "/api/get_all_forbidden_zones",
        query,
        |state, _: IdParams| async move { vehicle::get_all_forbidden_zones(&state).await },
    )
    .await
}

pub async fn get_forbidden_zones_delta(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    signed_vehicle(
        state,
        "/api/get_forbidden_zones_delta",
        query,
        |state, _: IdParams| async move { vehicle::get_forbidden_zones_delta(&state).await },
    )
    .await
}

pub async fn forbidden_zones_hash(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    signed_vehicle(
        state,
        "/api/forbidden_zones_hash",
        query,
        |state, _: IdParams| async move { vehicle::forbidden_zones_hash(&state).await },
    )
    .await
}

/// Mission revision. Blocks like `/api/arm`.
pub async fn nmission(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    signed_vehicle(state, "/api/nmission", query, |state, p: ReviseParams| async move {
        vehicle::revise_mission(&state, &p.id, &p.mission).await
    })
    .await
}

pub async fn log(State(state): State<Arc<AppState>>, RawQuery(query): RawQuery) -> impl IntoResponse {
    signed_vehicle(state, "/api/logs", query, |state, p: LogParams| async move {
        logs::append_log(&state, &p.id, &p.log).await
    })
    .await
}
