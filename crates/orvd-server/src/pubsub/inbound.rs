//! Handlers for topics published by vehicles and mission senders.

use anyhow::{bail, Context, Result};
use orvd_core::models::KeyGroup;
use std::sync::Arc;

use super::router::TopicRouter;
use super::{outbound, topics};
use crate::dispatch::{
    self, FromParams, IdParams, LogParams, MissionUploadParams, Params, Reply, ReviseParams,
    TelemetryParams,
};
use crate::ops::{logs, mission_sender, vehicle};
use crate::state::AppState;

/// The relay's inbound routes, in matching order.
pub fn router() -> Result<TopicRouter, orvd_core::topic::TopicError> {
    TopicRouter::new()
        .route(topics::TELEMETRY, telemetry)?
        .route(topics::MISSION, mission)?
        .route(topics::ARM_REQUEST, arm_request)?
        .route(topics::NMISSION_REQUEST, nmission_request)?
        .route(topics::LOGS, vehicle_log)
}

fn ensure_success(what: &str, reply: &Reply) -> Result<()> {
    if !reply.is_success() {
        bail!("{} answered {} {}", what, reply.status, reply.body());
    }
    Ok(())
}

/// `api/telemetry/{id}` with an urlencoded body.
async fn telemetry(state: Arc<AppState>, mut params: Params, payload: String) -> Result<()> {
    params.extend_urlencoded(&payload);
    let p = TelemetryParams::from_params(&params)?;
    let reply = dispatch::regular(|| vehicle::telemetry(&state, &p.id, &p.report)).await;
    ensure_success("telemetry", &reply)
}

/// `api/mission/{id}` with `{"mission_str": "<WPL>"}`.
async fn mission(state: Arc<AppState>, mut params: Params, payload: String) -> Result<()> {
    let body: serde_json::Value =
        serde_json::from_str(&payload).context("mission payload is not JSON")?;
    params.extend_json(&body);
    let p = MissionUploadParams::from_params(&params)?;
    let reply =
        dispatch::regular(|| mission_sender::upload_mission(&state, &p.id, &p.mission)).await;
    tracing::info!("Mission upload for {} over pub/sub: {}", p.id, reply.body());
    ensure_success("mission upload", &reply)
}

/// `api/arm/request/{id}` with `sig=...`; the answer goes to `api/arm/response/{id}`.
async fn arm_request(state: Arc<AppState>, mut params: Params, payload: String) -> Result<()> {
    params.extend_urlencoded(&payload);
    let p = IdParams::from_params(&params)?;
    let canonical = format!("/api/arm?id={}", p.id);
    let reply = dispatch::signed(
        &state,
        KeyGroup::vehicle(&p.id),
        &canonical,
        params.get("sig"),
        || vehicle::arm(&state, &p.id),
    )
    .await;
    outbound::publish_reply(&state, &topics::arm_response(&p.id), reply.body());
    Ok(())
}

/// `api/nmission/request/{id}` with `mission=...&sig=...`.
async fn nmission_request(state: Arc<AppState>, mut params: Params, payload: String) -> Result<()> {
    params.extend_urlencoded(&payload);
    let p = ReviseParams::from_params(&params)?;
    let canonical = format!("/api/nmission?id={}&mission={}", p.id, p.mission);
    let reply = dispatch::signed(
        &state,
        KeyGroup::vehicle(&p.id),
        &canonical,
        params.get("sig"),
        || vehicle::revise_mission(&state, &p.id, &p.mission),
    )
    .await;
    outbound::publish_reply(&state, &topics::nmission_response(&p.id), reply.body());
    Ok(())
}

/// `api/logs/{id}` with the raw log line as payload.
async fn vehicle_log(state: Arc<AppState>, mut params: Params, payload: String) -> Result<()> {
    params.insert("log", payload);
    let p = LogParams::from_params(&params)?;
    let reply = dispatch::regular(|| logs::append_log(&state, &p.id, &p.log)).await;
    ensure_success("log append", &reply)
}
