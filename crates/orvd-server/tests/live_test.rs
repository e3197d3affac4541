//! Live relay tests.
//!
//! Run with: cargo test --test live_test -- --ignored
//!
//! Note: Requires a running ORVD server at http://localhost:8080
//! or set ORVD_TEST_URL environment variable.

use orvd_core::crypto::KeyPair;
use orvd_core::wire::Message;
use reqwest::Client;

fn base_url() -> String {
    std::env::var("ORVD_TEST_URL").unwrap_or_else(|_| "http://localhost:8080".to_string())
}

fn signed_query(pair: &KeyPair, path: &str, query: &str) -> String {
    let sig = pair.sign_hex(&format!("{}?{}", path, query));
    format!("{}{}?{}&sig=0x{}", base_url(), path, query, sig)
}

#[tokio::test]
#[ignore] // Run only when server is running
async fn test_health() {
    let resp = Client::new()
        .get(format!("{}/health", base_url()))
        .send()
        .await
        .expect("Failed to reach server");
    assert!(resp.status().is_success());
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
#[ignore]
async fn test_key_exchange_and_auth() {
    let client = Client::new();
    let base = base_url();
    let id = format!("LIVE-{}", std::process::id());
    let pair = KeyPair::generate(1024).unwrap();

    let resp = client
        .get(format!(
            "{}/api/key?id={}&n={}&e={}",
            base,
            id,
            pair.public().n_hex(),
            pair.public().e_hex()
        ))
        .send()
        .await
        .expect("Failed to exchange keys");
    let key_reply = resp.text().await.unwrap();
    assert!(key_reply.starts_with("$Key: "));

    let resp = client
        .get(signed_query(&pair, "/api/auth", &format!("id={}", id)))
        .send()
        .await
        .expect("Failed to authenticate");
    assert!(resp.status().is_success());
    let reply = Message::parse(&resp.text().await.unwrap());
    assert_eq!(reply.body, format!("$Auth id={}", id));
    assert!(reply.signature.is_some());

    // Tampered query no longer verifies
    let resp = client
        .get(format!("{}/api/auth?id={}&sig=0x1", base, id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore]
async fn test_operator_login() {
    let login = std::env::var("ADMIN_LOGIN").unwrap_or_else(|_| "admin".to_string());
    let password = std::env::var("ADMIN_PASSW").unwrap_or_else(|_| "passw".to_string());
    let client = Client::new();
    let base = base_url();

    let token = client
        .get(format!("{}/admin/auth?login={}&password={}", base, login, password))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(!token.is_empty());

    let resp = client
        .get(format!("{}/admin/get_waiter_number", base))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    assert!(resp.text().await.unwrap().parse::<usize>().is_ok());

    let resp = client
        .get(format!("{}/admin/get_forbidden_zones", base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);
}
