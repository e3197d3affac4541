//! Operator endpoints.

use axum::{
    extract::{RawQuery, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;

use super::auth;
use crate::dispatch::{
    self, Answer, DecisionParams, DelayParams, FromParams, IdParams, LoginParams, NameParams,
    NoParams, Params, Reply,
};
use crate::error::ApiError;
use crate::ops::admin;
use crate::state::AppState;

fn query_params(query: Option<String>) -> Params {
    Params::from_query(query.as_deref().unwrap_or_default())
}

async fn token_query<P, F, Fut>(
    state: Arc<AppState>,
    headers: HeaderMap,
    query: Option<String>,
    op: F,
) -> Reply
where
    P: FromParams,
    F: FnOnce(Arc<AppState>, P) -> Fut,
    Fut: Future<Output = Result<Answer, ApiError>>,
{
    super::with_token(state, &headers, query_params(query), op).await
}

/// Token check for the zone file endpoints, which answer a JSON 401.
async fn zone_token_ok(state: &AppState, params: &Params, headers: &HeaderMap) -> Result<(), Response> {
    let token = auth::request_token(params, headers);
    match dispatch::check_token(state, token.as_deref()).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(auth::unauthorized_json()),
        Err(err) => Err(Reply::from_error(err).into_response()),
    }
}

pub async fn login(State(state): State<Arc<AppState>>, RawQuery(query): RawQuery) -> impl IntoResponse {
    super::open(state, query_params(query), |state, p: LoginParams| async move {
        admin::login(&state, &p.login, &p.password).await
    })
    .await
}

pub async fn arm_decision(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    token_query(state, headers, query, |state, p: DecisionParams| async move {
        admin::arm_decision(&state, &p.id, p.decision).await
    })
    .await
}

pub async fn mission_decision(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    token_query(state, headers, query, |state, p: DecisionParams| async move {
        admin::mission_decision(&state, &p.id, p.decision).await
    })
    .await
}

pub async fn force_disarm(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    token_query(state, headers, query, |state, p: IdParams| async move {
        admin::force_disarm(&state, &p.id).await
    })
    .await
}

pub async fn force_disarm_all(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    token_query(state, headers, query, |state, _: NoParams| async move {
        admin::force_disarm_all(&state).await
    })
    .await
}

pub async fn kill_switch(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    token_query(state, headers, query, |state, p: IdParams| async move {
        admin::kill_switch(&state, &p.id).await
    })
    .await
}

pub async fn get_state(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    token_query(state, headers, query, |state, p: IdParams| async move {
        admin::get_state(&state, &p.id).await
    })
    .await
}

pub async fn get_mission_state(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    token_query(state, headers, query, |state, p: IdParams| async move {
        admin::get_mission_state(&state, &p.id).await
    })
    .await
}

pub async fn get_mission(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    token_query(state, headers, query, |state, p: IdParams| async move {
        admin::get_mission(&state, &p.id).await
    })
    .await
}

pub async fn get_telemetry(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    token_query(state, headers, query, |state, p: IdParams| async move {
        admin::get_telemetry(&state, &p.id).await
    })
    .await
}

pub async fn get_waiter_number(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    token_query(state, headers, query, |state, _: NoParams| async move {
        admin::get_waiter_number(&state).await
    })
    .await
}

pub async fn get_id_list(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    token_query(state, headers, query, |state, _: NoParams| async move {
        admin::get_id_list(&state).await
    })
    .await
}

pub async fn change_fly_accept(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    token_query(state, headers, query, |state, p: DecisionParams| async move {
        admin::change_fly_accept(&state, &p.id, p.decision).await
    })
    .await
}

pub async fn get_delay(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    token_query(state, headers, query, |state, p: IdParams| async move {
        admin::get_delay(&state, &p.id).await
    })
    .await
}

pub async fn set_delay(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    token_query(state, headers, query, |state, p: DelayParams| async move {
        admin::set_delay(&state, &p.id, p.delay).await
    })
    .await
}

pub async fn revise_mission_decision(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    token_query(state, headers, query, |state, p: DecisionParams| async move {
        admin::revise_mission_decision(&state, &p.id, p.decision).await
    })
    .await
}

pub async fn get_display_mode(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    token_query(state, headers, query, |state, _: NoParams| async move {
        admin::get_display_mode(&state).await
    })
    .await
}

pub async fn toggle_display_mode(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    token_query(state, headers, query, |state, _: NoParams| async move {
        admin::toggle_display_mode(&state).await
    })
    .await
}

pub async fn get_flight_info_response_mode(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    token_query(state, headers, query, |state, _: NoParams| async move {
        admin::get_flight_info_response_mode(&state).await
    })
    .await
}

pub async fn toggle_flight_info_response_mode(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    token_query(state, headers, query, |state, _: NoParams| async move {
        admin::toggle_flight_info_response_mode(&state).await
    })
    .await
}

pub async fn get_all_data(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    token_query(state, headers, query, |state, _: NoParams| async move {
        admin::get_all_data(&state).await
    })
    .await
}

pub async fn get_forbidden_zone(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    token_query(state, headers, query, |state, p: NameParams| async move {
        admin::get_forbidden_zone(&state, &p.name).await
    })
    .await
}

pub async fn get_forbidden_zones_names(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    token_query(state, headers, query, |state, _: NoParams| async move {
        admin::get_forbidden_zones_names(&state).await
    })
    .await
}

/// `{"name": ..., "geometry": {...}, "token": ...}`; the token may also come from the query or header.
pub async fn set_forbidden_zone(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: String,
) -> impl IntoResponse {
    let body: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
    let mut params = query_params(query);
    params.extend_json(&body);
    let geometry = body.get("geometry").cloned().unwrap_or(Value::Null);
    super::with_token(state, &headers, params, |state, p: NameParams| async move {
        admin::set_forbidden_zone(&state, &p.name, &geometry).await
    })
    .await
}

pub async fn delete_forbidden_zone(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    token_query(state, headers, query, |state, p: NameParams| async move {
        admin::delete_forbidden_zone(&state, &p.name).await
    })
    .await
}

pub async fn get_forbidden_zones(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Response {
    let params = query_params(query);
    if let Err(response) = zone_token_ok(&state, &params, &headers).await {
        return response;
    }
    match admin::get_forbidden_zones(&state).await {
        Ok(answer) => Reply::ok(answer).into_response(),
        Err(err) => Reply::from_error(err).into_response(),
    }
}

/// Download of the zone file as `forbidden_zones.json`.
pub async fn export_forbidden_zones(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Response {
    let params = query_params(query);
    if let Err(response) = zone_token_ok(&state, &params, &headers).await {
        return response;
    }
    match admin::export_forbidden_zones(&state).await {
        Ok(answer) => Reply::ok(answer).into_response(),
        Err(err) => Reply::from_error(err).into_response(),
    }
}

/// Replace the zone file with an uploaded FeatureCollection. Errors are JSON.
pub async fn import_forbidden_zones(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: String,
) -> Response {
    let params = query_params(query);
    if let Err(response) = zone_token_ok(&state, &params, &headers).await {
        return response;
    }
    match admin::import_forbidden_zones(&state, &body).await {
        Ok(answer) => Reply::ok(answer).into_response(),
        Err(ApiError::BadRequest(message)) => {
            (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
        }
        Err(err) => Reply::from_error(err).into_response(),
    }
}
