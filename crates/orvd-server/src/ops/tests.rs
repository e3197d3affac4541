use std::time::Duration;

use orvd_core::models::{Decision, TelemetryReport, VehicleState};
use orvd_core::zones::ZoneSet;
use serde_json::json;

use super::{admin, logs, mission_sender, vehicle};
use crate::dispatch::Answer;
use crate::error::ApiError;
use crate::persistence::{missions, telemetry, vehicles};
use crate::pubsub::PubSub;
use crate::state::test_support::test_state;
use crate::state::AppState;

const PLAN: &str = "QGC WPL 110\n\
0\t1\t0\t16\t0\t0\t0\t0\t55.75\t37.61\t150\t1\n\
1\t0\t3\t22\t0\t0\t0\t0\t0\t0\t10\t1\n";

fn text(s: &str) -> Answer {
    Answer::text(s)
}

async fn wait_until(check: impl Fn() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

async fn accepted_mission(state: &AppState, id: &str) {
    missions::replace_mission(state.db.pool(), id, &["H55.75_37.61_150.0".to_string()])
        .await
        .unwrap();
    assert_eq!(admin::mission_decision(state, id, 0).await.unwrap(), Answer::ok());
}

#[tokio::test]
async fn auth_registers_and_publishes() {
    let state = test_state().await;
    let mut flight = state.broker.subscribe("api/flight_status/{id}").unwrap();
    let mut acks = state.broker.subscribe("api/auth/{id}").unwrap();

    assert_eq!(vehicle::auth(&state, "V1").await.unwrap(), text("$Auth id=V1"));
    assert!(state.scheduler.is_scheduled("ping_V1"));

    let status = flight.recv().await.unwrap();
    assert_eq!(status.topic, "api/flight_status/V1");
    assert!(status.payload.starts_with("$Flight 1#"));
    assert!(acks.recv().await.unwrap().payload.starts_with("$Auth id=V1#"));

    assert_eq!(admin::get_state(&state, "V1").await.unwrap(), text("Online"));
    assert_eq!(admin::get_id_list(&state).await.unwrap(), text("['V1']"));
}

#[tokio::test]
async fn arm_without_accepted_mission_is_refused() {
    let state = test_state().await;
    assert_eq!(vehicle::arm(&state, "V1").await.unwrap(), Answer::not_found());
    vehicle::auth(&state, "V1").await.unwrap();
    assert_eq!(vehicle::arm(&state, "V1").await.unwrap(), text("$Arm 1$Delay 1"));
}

#[tokio::test]
async fn arm_waits_for_operator_decision() {
    let state = test_state().await;
    vehicle::auth(&state, "V1").await.unwrap();
    accepted_mission(&state, "V1").await;

    let waiter = state.clone();
    let handle = tokio::spawn(async move { vehicle::arm(&waiter, "V1").await.unwrap() });
    wait_until(|| state.arm_queue.contains("V1")).await;

    assert_eq!(admin::get_state(&state, "V1").await.unwrap(), text("Waiting"));
    assert_eq!(admin::get_waiter_number(&state).await.unwrap(), text("1"));
    // A second request while queued is refused at once.
    assert_eq!(vehicle::arm(&state, "V1").await.unwrap(), text("$Arm 1$Delay 1"));
    assert!(!handle.is_finished());

    assert_eq!(admin::arm_decision(&state, "V1", 0).await.unwrap(), text("$Arm: 0"));
    assert_eq!(handle.await.unwrap(), text("$Arm 0$Delay 1"));
    assert_eq!(admin::get_state(&state, "V1").await.unwrap(), text("Flying"));
    assert_eq!(vehicle::fly_accept(&state, "V1").await.unwrap(), text("$Arm: 0"));
    assert_eq!(admin::arm_decision(&state, "V1", 0).await.unwrap(), text("$Arm: -1"));

    // Already armed answers immediately.
    assert_eq!(vehicle::arm(&state, "V1").await.unwrap(), text("$Arm 0$Delay 1"));
}

#[tokio::test]
async fn revise_flow_end_to_end() {
    let state = test_state().await;
    vehicle::auth(&state, "V1").await.unwrap();
    let mut missions_out = state.broker.subscribe("api/fmission_kos/{id}").unwrap();

    let waiter = state.clone();
    let handle = tokio::spawn(async move {
        vehicle::revise_mission(&waiter, "V1", "H1.0_2.0_3.0*T5.0*L1.0_2.0_0.0")
            .await
            .unwrap()
    });
    wait_until(|| state.revise_queue.contains("V1")).await;

    assert_eq!(admin::get_mission_state(&state, "V1").await.unwrap(), text("2"));
    assert_eq!(
        admin::get_mission(&state, "V1").await.unwrap(),
        text("H1.0_2.0_3.0&T5.0&L1.0_2.0_0.0")
    );
    assert_eq!(admin::get_state(&state, "V1").await.unwrap(), text("Waiting"));
    assert_eq!(
        vehicle::revise_mission(&state, "V1", "H0_0_0").await.unwrap(),
        text("$Approve 1")
    );

    assert_eq!(
        admin::revise_mission_decision(&state, "V1", 0).await.unwrap(),
        text("$Arm: 0")
    );
    assert_eq!(handle.await.unwrap(), text("$Approve 0"));
    assert_eq!(admin::get_state(&state, "V1").await.unwrap(), text("Flying"));
    assert_eq!(admin::get_mission_state(&state, "V1").await.unwrap(), text("0"));

    let pushed = missions_out.recv().await.unwrap();
    assert!(pushed
        .payload
        .starts_with("$FlightMission H1.0_2.0_3.0&T5.0&L1.0_2.0_0.0#"));
    assert_eq!(
        vehicle::fmission_kos(&state, "V1").await.unwrap(),
        text("$FlightMission H1.0_2.0_3.0&T5.0&L1.0_2.0_0.0")
    );
}

#[tokio::test]
async fn revise_rejection_disarms() {
    let state = test_state().await;
    vehicle::auth(&state, "V1").await.unwrap();
    let waiter = state.clone();
    let handle =
        tokio::spawn(async move { vehicle::revise_mission(&waiter, "V1", "T5.0").await.unwrap() });
    wait_until(|| state.revise_queue.contains("V1")).await;

    assert_eq!(
        admin::revise_mission_decision(&state, "V1", 1).await.unwrap(),
        text("$Arm: 1")
    );
    assert_eq!(handle.await.unwrap(), text("$Approve 1"));
    assert_eq!(admin::get_state(&state, "V1").await.unwrap(), text("Online"));
    assert_eq!(admin::get_mission_state(&state, "V1").await.unwrap(), text("1"));
    assert_eq!(
        admin::revise_mission_decision(&state, "V1", 0).await.unwrap(),
        text("$Arm: -1")
    );
}

#[tokio::test]
async fn revise_without_vehicle_row_still_queues() {
    let state = test_state().await;
    let waiter = state.clone();
    let handle = tokio::spawn(async move {
        vehicle::revise_mission(&waiter, "GHOST", "H1.0_2.0_3.0*T5.0")
            .await
            .unwrap()
    });
    wait_until(|| state.revise_queue.contains("GHOST")).await;
    assert!(!handle.is_finished());

    let stored = missions::get_mission(state.db.pool(), "GHOST").await.unwrap().unwrap();
    assert_eq!(stored.steps, ["H1.0_2.0_3.0", "T5.0"]);
    assert!(!stored.is_accepted);
    assert!(vehicles::get_vehicle(state.db.pool(), "GHOST").await.unwrap().is_none());

    assert!(state.revise_queue.release("GHOST", Decision::Approve));
    assert_eq!(handle.await.unwrap(), text("$Approve 1"));
}

#[tokio::test]
async fn kill_switch_and_flight_info() {
    let state = test_state().await;
    vehicle::auth(&state, "V1").await.unwrap();
    let hash = ZoneSet::default().hash_message();

    assert_eq!(
        vehicle::flight_info(&state, "V1").await.unwrap(),
        text(&format!("$Flight 1{}$Delay 1", hash))
    );
    assert_eq!(vehicle::kill_switch(&state, "V1").await.unwrap(), text("$KillSwitch: 1"));

    assert_eq!(admin::kill_switch(&state, "V1").await.unwrap(), Answer::ok());
    assert_eq!(admin::get_state(&state, "V1").await.unwrap(), text("Kill switch ON"));
    assert_eq!(vehicle::kill_switch(&state, "V1").await.unwrap(), text("$KillSwitch: 0"));
    assert_eq!(
        vehicle::flight_info(&state, "V1").await.unwrap(),
        text(&format!("$Flight -1{}$Delay 1", hash))
    );

    admin::toggle_flight_info_response_mode(&state).await.unwrap();
    assert_eq!(
        admin::get_flight_info_response_mode(&state).await.unwrap(),
        text("1")
    );
    assert!(matches!(
        vehicle::flight_info(&state, "V1").await,
        Err(ApiError::Forbidden)
    ));
}

#[tokio::test]
async fn fly_accept_and_force_disarm() {
    let state = test_state().await;
    assert_eq!(admin::change_fly_accept(&state, "V1", 0).await.unwrap(), Answer::not_found());
    vehicle::auth(&state, "V1").await.unwrap();
    vehicle::auth(&state, "V2").await.unwrap();

    assert_eq!(admin::change_fly_accept(&state, "V1", 0).await.unwrap(), Answer::ok());
    assert_eq!(admin::get_state(&state, "V1").await.unwrap(), text("Flying"));
    assert_eq!(admin::force_disarm(&state, "V1").await.unwrap(), Answer::ok());
    assert_eq!(vehicle::fly_accept(&state, "V1").await.unwrap(), text("$Arm: 1"));

    admin::change_fly_accept(&state, "V1", 0).await.unwrap();
    admin::change_fly_accept(&state, "V2", 0).await.unwrap();
    assert_eq!(admin::force_disarm_all(&state).await.unwrap(), Answer::ok());
    assert_eq!(admin::get_state(&state, "V2").await.unwrap(), text("Online"));
    assert_eq!(admin::get_id_list(&state).await.unwrap(), text("['V1', 'V2']"));
}

#[tokio::test]
async fn force_disarm_all_waits_for_vehicle_lock() {
    let state = test_state().await;
    vehicle::auth(&state, "V1").await.unwrap();
    vehicle::auth(&state, "V2").await.unwrap();

    let guard = state.lock_vehicle("V1").await;
    let other = state.clone();
    let handle = tokio::spawn(async move { admin::force_disarm_all(&other).await.unwrap() });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!handle.is_finished());

    // Write made while holding the lock, as a concurrent arm would.
    let mut armed = vehicles::get_vehicle(state.db.pool(), "V1").await.unwrap().unwrap();
    armed.is_armed = true;
    armed.state = VehicleState::Flying;
    vehicles::upsert_vehicle(state.db.pool(), &armed).await.unwrap();
    drop(guard);

    assert_eq!(handle.await.unwrap(), Answer::ok());
    for id in ["V1", "V2"] {
        let v = vehicles::get_vehicle(state.db.pool(), id).await.unwrap().unwrap();
        assert!(!v.is_armed);
        assert_eq!(v.state, VehicleState::Online);
    }
}

#[tokio::test]
async fn telemetry_is_scaled_and_gated_by_display_mode() {
    let state = test_state().await;
    let report = TelemetryReport {
        lat: Some("100000000".into()),
        alt: Some("500".into()),
        sats: Some("9".into()),
        ..Default::default()
    };
    assert_eq!(
        vehicle::telemetry(&state, "V1", &report).await.unwrap(),
        Answer::not_found()
    );

    admin::toggle_display_mode(&state).await.unwrap();
    assert_eq!(admin::get_display_mode(&state).await.unwrap(), text("0"));
    assert_eq!(vehicle::telemetry(&state, "V1", &report).await.unwrap(), text("$Arm: 1"));

    let sample = telemetry::latest_sample(state.db.pool(), "V1").await.unwrap().unwrap();
    assert_eq!(sample.lat, Some(10.0));
    assert_eq!(sample.alt, Some(5.0));
    assert_eq!(sample.lon, None);

    let Answer::Json(value) = admin::get_telemetry(&state, "V1").await.unwrap() else {
        panic!("expected json");
    };
    assert_eq!(value["lat"], json!(10.0));
    assert_eq!(value["sats"], json!(9));
    assert_eq!(value["lon"], serde_json::Value::Null);

    let Answer::Json(missing) = admin::get_telemetry(&state, "V9").await.unwrap() else {
        panic!("expected json");
    };
    assert_eq!(missing, json!({"error": "NOT_FOUND"}));
}

#[tokio::test]
async fn mission_upload_statuses() {
    let state = test_state().await;
    assert_eq!(
        mission_sender::upload_mission(&state, "V1", "garbage").await.unwrap(),
        text("Error: File is not supported WP version")
    );
    assert_eq!(
        mission_sender::upload_mission(&state, "V1", PLAN).await.unwrap(),
        text("Mission accepted.")
    );
    // Stored even without the vehicle, but not visible until it registers.
    assert_eq!(admin::get_mission(&state, "V1").await.unwrap(), Answer::not_found());

    admin::toggle_display_mode(&state).await.unwrap();
    mission_sender::upload_mission(&state, "V2", PLAN).await.unwrap();
    assert_eq!(
        admin::get_mission(&state, "V2").await.unwrap(),
        text("H55.75_37.61_150.0&T10.0")
    );
    assert_eq!(admin::get_mission_state(&state, "V2").await.unwrap(), text("1"));
}

#[tokio::test]
async fn delay_updates_reschedule_ping() {
    let state = test_state().await;
    assert_eq!(admin::set_delay(&state, "V1", 5).await.unwrap(), Answer::not_found());
    vehicle::auth(&state, "V1").await.unwrap();
    assert_eq!(admin::set_delay(&state, "V1", 5).await.unwrap(), Answer::ok());
    assert_eq!(admin::get_delay(&state, "V1").await.unwrap(), text("5"));
    assert!(state.scheduler.is_scheduled("ping_V1"));
}

#[tokio::test]
async fn operator_login() {
    let state = test_state().await;
    let Answer::Text(token) = admin::login(&state, &state.config.admin_login, &state.config.admin_password)
        .await
        .unwrap()
    else {
        panic!("expected text");
    };
    assert_eq!(token.len(), 32);
    assert_eq!(
        admin::login(&state, &state.config.admin_login, "nope").await.unwrap(),
        text("")
    );
    assert_eq!(admin::login(&state, "ghost", "x").await.unwrap(), Answer::not_found());
}

#[tokio::test]
async fn zone_lifecycle() {
    let state = test_state().await;
    let mut zones_out = state.broker.subscribe("api/forbidden_zones").unwrap();

    assert_eq!(
        admin::set_forbidden_zone(&state, "A", &json!([[1.0, 2.0, 3.0]])).await.unwrap(),
        text("Bad geometry")
    );
    assert_eq!(
        admin::set_forbidden_zone(&state, "A", &json!([[37.123456789, 55.1], [37.2, 55.2]]))
            .await
            .unwrap(),
        Answer::ok()
    );
    let published = zones_out.recv().await.unwrap();
    assert!(published.payload.starts_with("$ForbiddenZones 1&A&2&"));

    assert_eq!(
        admin::get_forbidden_zone(&state, "A").await.unwrap(),
        Answer::Json(json!([[37.1234568, 55.1], [37.2, 55.2]]))
    );
    assert_eq!(
        admin::get_forbidden_zones_names(&state).await.unwrap(),
        Answer::Json(json!(["A"]))
    );
    assert_eq!(
        vehicle::get_forbidden_zones_delta(&state).await.unwrap(),
        text("$ForbiddenZonesDelta 1&A&added&2&55.1000000_37.1234568&55.2000000_37.2000000")
    );

    let current = state.zones.load().await.unwrap();
    assert_eq!(
        vehicle::forbidden_zones_hash(&state).await.unwrap(),
        text(&current.hash_message())
    );
    assert_eq!(
        vehicle::get_all_forbidden_zones(&state).await.unwrap(),
        text(&current.canonical())
    );

    assert_eq!(admin::delete_forbidden_zone(&state, "A").await.unwrap(), Answer::ok());
    assert_eq!(admin::delete_forbidden_zone(&state, "missing").await.unwrap(), Answer::ok());
    assert_eq!(admin::get_forbidden_zone(&state, "A").await.unwrap(), Answer::not_found());
}

#[tokio::test]
async fn zone_import_and_export() {
    let state = test_state().await;
    assert!(matches!(
        admin::import_forbidden_zones(&state, "{not json").await,
        Err(ApiError::BadRequest(_))
    ));

    let mut incoming = ZoneSet::default();
    incoming
        .features
        .push(orvd_core::zones::ZoneFeature::new("B", vec![vec![1.0, 2.0]]));
    let body = incoming.to_json_pretty().unwrap();
    assert_eq!(
        admin::import_forbidden_zones(&state, &body).await.unwrap(),
        Answer::Json(json!({"status": "success"}))
    );

    let Answer::Attachment { filename, content } =
        admin::export_forbidden_zones(&state).await.unwrap()
    else {
        panic!("expected attachment");
    };
    assert_eq!(filename, "forbidden_zones.json");
    assert_eq!(ZoneSet::from_json(&content).unwrap(), incoming);
}

#[tokio::test]
async fn vehicle_logs_append() {
    let state = test_state().await;
    assert_eq!(logs::get_logs(&state, "V1").await.unwrap(), Answer::not_found());
    assert_eq!(logs::append_log(&state, "V1", "boot").await.unwrap(), Answer::ok());
    logs::append_log(&state, "V1", "takeoff").await.unwrap();
    assert_eq!(logs::get_logs(&state, "V1").await.unwrap(), text("\nboot\ntakeoff"));
}

#[tokio::test]
async fn all_data_snapshot() {
    let state = test_state().await;
    vehicle::auth(&state, "V1").await.unwrap();
    let Answer::Json(data) = admin::get_all_data(&state).await.unwrap() else {
        panic!("expected json");
    };
    assert_eq!(data["ids"], json!(["V1"]));
    assert_eq!(data["waiters"], json!("0"));
    assert_eq!(data["uav_data"]["V1"]["state"], json!("Online"));
    assert_eq!(data["uav_data"]["V1"]["telemetry"], serde_json::Value::Null);
    assert_eq!(data["uav_data"]["V1"]["mission_state"], json!("$-1"));
    assert_eq!(data["uav_data"]["V1"]["delay"], json!("1"));
}
