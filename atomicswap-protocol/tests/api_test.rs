// HTTP round trips for the control-plane surface, driven through the
// router with tower's oneshot so no listener is needed.

use atomicswap_protocol::api::{router, AppState};
use atomicswap_protocol::config::CoordinatorConfig;
use atomicswap_protocol::coordinator::SwapCoordinator;
use atomicswap_protocol::identity::{IdentityResolver, IdentityStore};
use atomicswap_protocol::test_utils::test_identity_store;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn test_app() -> Router {
    let store: Arc<IdentityStore> = Arc::new(test_identity_store());
    let coordinator = SwapCoordinator::new(CoordinatorConfig::default(), IdentityResolver::new(store));
    router(AppState::new(coordinator))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = match body {
        Some(json_body) => Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json_body.to_string()))
            .unwrap(),
        None => Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn initiate_body() -> Value {
    json!({
        "initiator": "alice@example",
        "responder": "bob@example",
        "initiatorAsset": { "chain": "chain-a", "amount": 5, "assetRef": "TOK-chain-a" },
        "responderAsset": { "chain": "chain-b", "amount": 10, "assetRef": "TOK-chain-b" },
    })
}

#[tokio::test]
async fn swap_lifecycle_over_http() {
    let app = test_app();

    let (status, body) = send(&app, Method::POST, "/atomic-swaps", Some(initiate_body())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["state"], "INITIATED");
    let swap_id = body["swapId"].as_str().unwrap().to_string();
    assert!(body["expiresAt"].is_string());

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/atomic-swaps/{}/lock", swap_id),
        Some(json!({ "chain": "chain-a", "txRef": "0xlockA" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "INITIATOR_LOCKED");

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/atomic-swaps/{}/lock", swap_id),
        Some(json!({ "chain": "chain-b", "txRef": "0xlockB" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "COMPLETED");

    let (status, body) = send(&app, Method::GET, &format!("/atomic-swaps/{}", swap_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "COMPLETED");
    assert_eq!(body["initiatorLeg"]["lockProof"], "0xlockA");
    assert_eq!(body["responderLeg"]["lockProof"], "0xlockB");
    assert_eq!(body["initiatorLeg"]["resolvedAddress"], "0xA11CE");
}

#[tokio::test]
async fn unknown_swap_returns_not_found() {
    let app = test_app();

    let (status, body) = send(&app, Method::GET, "/atomic-swaps/deadbeef", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], 404);
    assert!(body["error"]["message"].as_str().unwrap().contains("deadbeef"));

    let (status, _) = send(
        &app,
        Method::POST,
        "/atomic-swaps/deadbeef/lock",
        Some(json!({ "chain": "chain-a", "txRef": "0xlock" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn same_chain_swap_is_rejected() {
    let app = test_app();
    let mut body = initiate_body();
    body["responderAsset"]["chain"] = json!("chain-a");

    let (status, response) = send(&app, Method::POST, "/atomic-swaps", Some(body)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response["error"]["code"], 422);
}

#[tokio::test]
async fn unknown_identity_fails_initiation() {
    let app = test_app();
    let mut body = initiate_body();
    body["responder"] = json!("mallory@example");

    let (status, response) = send(&app, Method::POST, "/atomic-swaps", Some(body)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(response["error"]["message"]
        .as_str()
        .unwrap()
        .contains("mallory@example"));
}

#[tokio::test]
async fn conflicting_lock_proof_is_a_conflict() {
    let app = test_app();
    let (_, body) = send(&app, Method::POST, "/atomic-swaps", Some(initiate_body())).await;
    let swap_id = body["swapId"].as_str().unwrap().to_string();

    let uri = format!("/atomic-swaps/{}/lock", swap_id);
    let (status, _) = send(
        &app,
        Method::POST,
        &uri,
        Some(json!({ "chain": "chain-a", "txRef": "0xfirst" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Same chain, different tx ref.
    let (status, body) = send(
        &app,
        Method::POST,
        &uri,
        Some(json!({ "chain": "chain-a", "txRef": "0xsecond" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], 409);

    // Exact redelivery stays fine.
    let (status, _) = send(
        &app,
        Method::POST,
        &uri,
        Some(json!({ "chain": "chain-a", "txRef": "0xfirst" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn abort_then_unlock_rolls_the_swap_back() {
    let app = test_app();
    let (_, body) = send(&app, Method::POST, "/atomic-swaps", Some(initiate_body())).await;
    let swap_id = body["swapId"].as_str().unwrap().to_string();

    send(
        &app,
        Method::POST,
        &format!("/atomic-swaps/{}/lock", swap_id),
        Some(json!({ "chain": "chain-a", "txRef": "0xlockA" })),
    )
    .await;

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/atomic-swaps/{}/abort", swap_id),
        Some(json!({ "reason": "operator intervention" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "EXPIRED");

    // A lock landing after the abort is refused.
    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/atomic-swaps/{}/lock", swap_id),
        Some(json!({ "chain": "chain-b", "txRef": "0xlate" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/atomic-swaps/{}/unlock", swap_id),
        Some(json!({ "chain": "chain-a", "txRef": "0xunlockA" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "ROLLED_BACK");

    let (_, body) = send(&app, Method::GET, &format!("/atomic-swaps/{}", swap_id), None).await;
    assert_eq!(body["initiatorLeg"]["rollbackProof"], "0xunlockA");
    assert_eq!(
        body["failureReason"].as_str().unwrap(),
        "operator abort: operator intervention"
    );
}

#[tokio::test]
async fn lock_failure_with_nothing_locked_rolls_back_directly() {
    let app = test_app();
    let (_, body) = send(&app, Method::POST, "/atomic-swaps", Some(initiate_body())).await;
    let swap_id = body["swapId"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/atomic-swaps/{}/lock-failure", swap_id),
        Some(json!({ "chain": "chain-b", "reason": "insufficient balance" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "ROLLED_BACK");
}

#[tokio::test]
async fn unlock_failure_parks_the_swap() {
    let app = test_app();
    let (_, body) = send(&app, Method::POST, "/atomic-swaps", Some(initiate_body())).await;
    let swap_id = body["swapId"].as_str().unwrap().to_string();

    send(
        &app,
        Method::POST,
        &format!("/atomic-swaps/{}/lock", swap_id),
        Some(json!({ "chain": "chain-a", "txRef": "0xlockA" })),
    )
    .await;
    send(
        &app,
        Method::POST,
        &format!("/atomic-swaps/{}/lock-failure", swap_id),
        Some(json!({ "chain": "chain-b", "reason": "nonce gap" })),
    )
    .await;

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/atomic-swaps/{}/unlock-failure", swap_id),
        Some(json!({ "chain": "chain-a", "reason": "escrow reverted" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "ROLLBACK_FAILED");
}

#[tokio::test]
async fn identity_resolution_endpoint() {
    let app = test_app();

    let (status, body) = send(
        &app,
        Method::GET,
        "/identity/alice@example?chain=chain-b",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["identifier"], "alice@example");
    assert_eq!(body["chain"], "chain-b");
    assert_eq!(body["address"], "0xA11CE-B");

    let (status, _) = send(
        &app,
        Method::GET,
        "/identity/alice@example?chain=chain-z",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn idempotency_key_returns_the_same_swap() {
    let app = test_app();
    let mut body = initiate_body();
    body["idempotencyKey"] = json!("retry-key-1");

    let (status, first) = send(&app, Method::POST, "/atomic-swaps", Some(body.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, second) = send(&app, Method::POST, "/atomic-swaps", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["swapId"], second["swapId"]);
}
