//! End-to-end exercise of the signing HTTP API (spec §6) through the real
//! `axum` router, as the teacher's `wallet_remote_signer` example tests its
//! own transport: no mocked broker/keystore, just a real stack driven with
//! `tower::ServiceExt::oneshot`.

use apsigner_broker::{spawn, ApprovalPolicy};
use apsigner_keystore::Keystore;
use apsigner_lsig::LsigRegistry;
use apsigner_planner::Txn;
use apsigner_providers::ProviderRegistry;
use apsigner_transport_http::{router, AppState};
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const TOKEN: &str = "test-bearer-token";

async fn state_with_one_key(auto_approve: bool) -> (tempfile::TempDir, AppState, String) {
    let dir = tempfile::tempdir().unwrap();
    let keystore = Arc::new(Keystore::new(dir.path(), "default"));
    keystore.initialize_or_unlock(b"pw").await.unwrap();
    let (address, _) = keystore.generate("ed25519", Default::default()).await.unwrap();

    let policy = ApprovalPolicy { txn_auto_approve: auto_approve, ..Default::default() };
    let broker = spawn(keystore.clone(), policy);

    let state = AppState {
        keystore,
        providers: Arc::new(ProviderRegistry::new()),
        lsig: Arc::new(LsigRegistry::new()),
        broker,
        allow_group_modification: true,
        bearer_token: Arc::from(TOKEN),
    };
    (dir, state, address)
}

fn payment_hex(sender: &str) -> String {
    let sender_bytes = apsigner_crypto::address::decode_address(sender).unwrap();
    let txn = Txn {
        asset_close_to: None,
        amount: 1_000_000,
        asset_sender: None,
        close_remainder_to: None,
        fee: apsigner_planner::MIN_FEE,
        first_valid: 10,
        genesis_id: "testnet-v1.0".to_string(),
        genesis_hash: vec![9u8; 32],
        group: None,
        last_valid: 1010,
        lease: None,
        note: Vec::new(),
        receiver: Some(sender_bytes.to_vec()),
        rekey_to: None,
        sender: sender_bytes.to_vec(),
        txn_type: "pay".to_string(),
    };
    hex::encode(txn.canonical_encode().unwrap())
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_needs_no_token() {
    let (_dir, state, _address) = state_with_one_key(true).await;
    let app = router(state);
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn protected_routes_reject_missing_or_wrong_scheme_token() {
    let (_dir, state, _address) = state_with_one_key(true).await;
    let app = router(state);

    let no_auth = app
        .clone()
        .oneshot(Request::builder().uri("/keys").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(no_auth.status(), StatusCode::UNAUTHORIZED);

    let wrong_scheme = app
        .oneshot(
            Request::builder()
                .uri("/keys")
                .header("authorization", format!("Bearer {TOKEN}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(wrong_scheme.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn keys_checksum_enables_conditional_304() {
    let (_dir, state, address) = state_with_one_key(true).await;
    let app = router(state);

    let first = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/keys")
                .header("authorization", format!("aplane {TOKEN}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let checksum = first.headers().get("x-keys-checksum").unwrap().to_str().unwrap().to_string();
    let body = body_json(first).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["keys"][0]["address"], address);

    let conditional = app
        .oneshot(
            Request::builder()
                .uri("/keys")
                .header("authorization", format!("AplAnE {TOKEN}"))
                .header("x-keys-checksum", checksum)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(conditional.status(), StatusCode::NOT_MODIFIED);
}

#[tokio::test]
async fn sign_with_auto_approve_returns_one_signed_blob() {
    let (_dir, state, address) = state_with_one_key(true).await;
    let app = router(state);

    let txn_hex = payment_hex(&address);
    let request_body = json!({
        "requests": [{
            "txn_bytes_hex": txn_hex,
            "auth_address": address,
        }]
    });

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/sign")
                .header("authorization", format!("aplane {TOKEN}"))
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&request_body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["transactions"].as_array().unwrap().len(), 1);
    assert_eq!(body["mutations"]["original_count"], 1);
    assert_eq!(body["mutations"]["final_count"], 1);
    assert_eq!(body["mutations"]["dummies_added"], 0);
}

#[tokio::test]
async fn sign_without_admin_or_auto_approve_is_rejected() {
    let (_dir, state, address) = state_with_one_key(false).await;
    let app = router(state);

    let txn_hex = payment_hex(&address);
    let request_body = json!({
        "requests": [{
            "txn_bytes_hex": txn_hex,
            "auth_address": address,
        }]
    });

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/sign")
                .header("authorization", format!("aplane {TOKEN}"))
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&request_body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn keys_forbidden_while_locked() {
    let (_dir, state, _address) = state_with_one_key(true).await;
    state.keystore.lock().await;
    let app = router(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/keys")
                .header("authorization", format!("aplane {TOKEN}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
