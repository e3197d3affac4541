use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
};
use orvd_core::crypto::KeyPair;
use orvd_core::wire::Message;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use crate::{api, ops::admin, persistence::missions, state::test_support::test_state, state::AppState};

async fn setup_app() -> (axum::Router, Arc<AppState>) {
    let state = test_state().await;
    let app = api::routes().with_state(state.clone());
    (app, state)
}

async fn get(app: &axum::Router, uri: &str) -> Response {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.clone().oneshot(req).await.unwrap()
}

async fn read_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    String::from_utf8(bytes.to_vec()).expect("utf8 body")
}

async fn read_json(response: Response) -> Value {
    serde_json::from_str(&read_text(response).await).expect("parse json")
}

/// Exchange keys for `id` over HTTP and return the vehicle's pair.
async fn register_key(app: &axum::Router, id: &str) -> KeyPair {
    let pair = KeyPair::generate(512).unwrap();
    let uri = format!(
        "/api/key?id={}&n={}&e={}",
        id,
        pair.public().n_hex(),
        pair.public().e_hex()
    );
    let res = get(app, &uri).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(read_text(res).await.starts_with("$Key: "));
    pair
}

fn signed_uri(pair: &KeyPair, path: &str, query: &str) -> String {
    let sig = pair.sign_hex(&format!("{}?{}", path, query));
    format!("{}?{}&sig=0x{}", path, query, sig)
}

async fn operator_token(app: &axum::Router, state: &AppState) -> String {
    let uri = format!(
        "/admin/auth?login={}&password={}",
        state.config.admin_login, state.config.admin_password
    );
    let token = read_text(get(app, &uri).await).await;
    assert_eq!(token.len(), 32);
    token
}

#[tokio::test]
async fn health_and_request_id() {
    let (app, _state) = setup_app().await;
    let req = Request::builder()
        .uri("/health")
        .header("x-request-id", "abc-123")
        .body(Body::empty())
        .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["x-request-id"], "abc-123");
    assert_eq!(read_text(res).await, "OK");

    let res = get(&app, "/health").await;
    assert!(res.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn signed_auth_roundtrip() {
    let (app, state) = setup_app().await;
    let pair = register_key(&app, "V1").await;

    let res = get(&app, &signed_uri(&pair, "/api/auth", "id=V1")).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = read_text(res).await;
    let message = Message::parse(&body);
    assert_eq!(message.body, "$Auth id=V1");
    assert!(message.verify(state.keys.server_public()));
}

#[tokio::test]
async fn bad_signature_is_rejected_signed() {
    let (app, state) = setup_app().await;
    register_key(&app, "V1").await;

    let res = get(&app, "/api/auth?id=V1&sig=0x1234").await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let message = Message::parse(&read_text(res).await);
    assert_eq!(message.body, "$Signature verification fail");
    assert!(message.verify(state.keys.server_public()));

    // Unknown vehicle has no key to verify against.
    let res = get(&app, "/api/arm?id=V9&sig=0x1234").await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn missing_parameters_are_bad_requests() {
    let (app, _state) = setup_app().await;

    let res = get(&app, "/api/auth?sig=0x1").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_text(res).await, "Wrong id");

    let res = get(&app, "/api/nmission?id=V1&sig=0x1").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_text(res).await, "Wrong id/mission");

    let res = get(&app, "/logs/get_logs").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_requires_token() {
    let (app, state) = setup_app().await;

    let res = get(&app, "/admin/get_state?id=V1").await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(read_text(res).await, "$Unauthorized");

    let res = get(&app, "/admin/get_forbidden_zones?token=nope").await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(read_json(res).await, json!({"error": "Unauthorized"}));

    let res = get(&app, "/admin/auth?login=admin&password=wrong-password").await;
    assert_eq!(read_text(res).await, "");

    let token = operator_token(&app, &state).await;
    let req = Request::builder()
        .uri("/admin/get_state?id=V1")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(read_text(res).await, "$-1");
}

#[tokio::test]
async fn arm_waits_for_operator_over_http() {
    let (app, state) = setup_app().await;
    let pair = register_key(&app, "V1").await;
    let res = get(&app, &signed_uri(&pair, "/api/auth", "id=V1")).await;
    assert_eq!(res.status(), StatusCode::OK);
    missions::replace_mission(state.db.pool(), "V1", &["H55.75_37.61_150.0".to_string()])
        .await
        .unwrap();
    admin::mission_decision(&state, "V1", 0).await.unwrap();

    let arm_app = app.clone();
    let arm_uri = signed_uri(&pair, "/api/arm", "id=V1");
    let pending = tokio::spawn(async move { read_text(get(&arm_app, &arm_uri).await).await });

    for _ in 0..200 {
        if state.arm_queue.contains("V1") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let token = operator_token(&app, &state).await;
    assert_eq!(
        read_text(get(&app, &format!("/admin/get_state?id=V1&token={}", token)).await).await,
        "Waiting"
    );
    let res = get(
        &app,
        &format!("/admin/arm_decision?id=V1&decision=0&token={}", token),
    )
    .await;
    assert_eq!(read_text(res).await, "$Arm: 0");

    let reply = Message::parse(&pending.await.unwrap());
    assert_eq!(reply.body, "$Arm 0$Delay 1");
    assert!(reply.verify(state.keys.server_public()));
}

#[tokio::test]
async fn flight_info_can_be_disabled() {
    let (app, state) = setup_app().await;
    let pair = register_key(&app, "V1").await;
    get(&app, &signed_uri(&pair, "/api/auth", "id=V1")).await;

    let res = get(&app, &signed_uri(&pair, "/api/flight_info", "id=V1")).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(read_text(res).await.starts_with("$Flight 1$ForbiddenZonesHash "));

    state.toggle_flight_info_response();
    let res = get(&app, &signed_uri(&pair, "/api/flight_info", "id=V1")).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(read_text(res).await, "");
}

#[tokio::test]
async fn mission_sender_upload() {
    let (app, state) = setup_app().await;
    let res = get(&app, "/mission_sender/key?id=M1").await;
    assert!(read_text(res).await.starts_with("$Key: "));

    let plan = "QGC WPL 110\n\
0\t1\t0\t16\t0\t0\t0\t0\t55.75\t37.61\t150\t1\n\
1\t0\t3\t22\t0\t0\t0\t0\t0\t0\t10\t1\n";
    let req = Request::builder()
        .method("POST")
        .uri("/mission_sender/fmission_ms?id=V1&sig=0x00")
        .body(Body::from(plan))
        .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let reply = Message::parse(&read_text(res).await);
    assert_eq!(reply.body, "Mission accepted.");
    assert!(reply.verify(state.keys.server_public()));

    let stored = missions::get_mission(state.db.pool(), "V1").await.unwrap().unwrap();
    assert_eq!(stored.steps.len(), 2);
}

#[tokio::test]
async fn mission_sender_upload_requires_signature() {
    let (app, state) = setup_app().await;
    let req = Request::builder()
        .method("POST")
        .uri("/mission_sender/fmission_ms?id=V1")
        .body(Body::from("QGC WPL 110\n"))
        .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let reply = Message::parse(&read_text(res).await);
    assert_eq!(reply.body, "$Signature verification fail");
    assert!(reply.verify(state.keys.server_public()));
    assert!(missions::get_mission(state.db.pool(), "V1").await.unwrap().is_none());
}

#[tokio::test]
async fn zone_endpoints() {
    let (app, state) = setup_app().await;
    let token = operator_token(&app, &state).await;

    let req = Request::builder()
        .method("POST")
        .uri("/admin/set_forbidden_zone")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({
                "name": "A",
                "geometry": [[37.1, 55.1], [37.2, 55.2], [37.3, 55.1]],
                "token": token,
            })
            .to_string(),
        ))
        .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(read_text(res).await, "$OK");

    let res = get(&app, &format!("/admin/get_forbidden_zones_names?token={}", token)).await;
    assert_eq!(read_json(res).await, json!(["A"]));

    let res = get(&app, &format!("/admin/get_forbidden_zones?token={}", token)).await;
    assert_eq!(res.status(), StatusCode::OK);
    let zones = read_json(res).await;
    assert_eq!(zones["features"].as_array().unwrap().len(), 1);

    let res = get(&app, &format!("/admin/export_forbidden_zones?token={}", token)).await;
    assert_eq!(
        res.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"forbidden_zones.json\""
    );

    let req = Request::builder()
        .method("POST")
        .uri(format!("/admin/import_forbidden_zones?token={}", token))
        .body(Body::from("{broken"))
        .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(res).await, json!({"error": "Failed to save file"}));

    let req = Request::builder()
        .method("DELETE")
        .uri(format!("/admin/delete_forbidden_zone?name=A&token={}", token))
        .body(Body::empty())
        .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(read_text(res).await, "$OK");
    let res = get(&app, &format!("/admin/get_forbidden_zone?name=A&token={}", token)).await;
    assert_eq!(read_text(res).await, "$-1");
}
