//! In-process scenario tests for subrec-daemon HTTP endpoints.
//!
//! These tests spin up the Axum router **without** binding a TCP socket.
//! Each test calls `routes::build_router` and drives it via
//! `tower::ServiceExt::oneshot`; no network I/O required.
//!
//! # Invariants under test
//! 1. Health reports the service name.
//! 2. A fresh state directory reads as tier NONE, mismatch false.
//! 3. Unknown and unconfigured categories are 404 on every category route.
//! 4. Account updates are partial: absent fields keep their value.
//! 5. Billing availability and receipt updates are reflected immediately.
//! 6. A reconcile request is accepted with 202; a second request while the
//!    first is still in flight reports `accepted=false`.

use std::sync::Arc;

use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use subrec_config::ReconcilerSettings;
use subrec_daemon::{remote::UnconfiguredSubscriptionClient, routes, state};
use tower::ServiceExt; // oneshot

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Build a fresh AppState over a temp state dir (backup category only).
fn make_state(dir: &tempfile::TempDir) -> Arc<state::AppState> {
    let settings = ReconcilerSettings {
        state_dir: dir.path().to_path_buf(),
        ..ReconcilerSettings::default()
    };
    Arc::new(state::AppState::new(
        &settings,
        Arc::new(UnconfiguredSubscriptionClient),
    ))
}

/// Drive the router with a single request and return (status, body_bytes).
async fn call(router: axum::Router, req: Request<axum::body::Body>) -> (StatusCode, bytes::Bytes) {
    let resp = router.oneshot(req).await.expect("oneshot failed");
    let status = resp.status();
    let body = resp
        .into_body()
        .collect()
        .await
        .expect("body collect failed")
        .to_bytes();
    (status, body)
}

fn get(uri: &str) -> Request<axum::body::Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<axum::body::Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(body.to_string()))
        .unwrap()
}

fn post_empty(uri: &str) -> Request<axum::body::Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap()
}

/// Parse body bytes as a `serde_json::Value`.
fn parse_json(b: bytes::Bytes) -> serde_json::Value {
    serde_json::from_slice(&b).expect("body is not valid JSON")
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_returns_200_ok_true() {
    let dir = tempfile::tempdir().unwrap();
    let router = routes::build_router(make_state(&dir));

    let (status, body) = call(router, get("/v1/health")).await;
    assert_eq!(status, StatusCode::OK);

    let json = parse_json(body);
    assert_eq!(json["ok"], true);
    assert_eq!(json["service"], "subrec-daemon");
}

// ---------------------------------------------------------------------------
// GET /v1/entitlement/:category
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fresh_entitlement_is_none_and_clean() {
    let dir = tempfile::tempdir().unwrap();
    let router = routes::build_router(make_state(&dir));

    let (status, body) = call(router, get("/v1/entitlement/backup")).await;
    assert_eq!(status, StatusCode::OK);

    let json = parse_json(body);
    assert_eq!(json["category"], "backup");
    assert_eq!(json["tier"], "NONE");
    assert_eq!(json["mismatch_detected"], false);
}

#[tokio::test]
async fn unknown_or_unconfigured_category_is_404() {
    let dir = tempfile::tempdir().unwrap();
    let router = routes::build_router(make_state(&dir));

    for req in [
        get("/v1/entitlement/storage"),
        get("/v1/entitlement/donation"),
        post_empty("/v1/reconcile/storage"),
        post_empty("/v1/reconcile/donation"),
    ] {
        let (status, body) = call(router.clone(), req).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(parse_json(body)["error"].as_str().is_some());
    }
}

// ---------------------------------------------------------------------------
// POST /v1/account
// ---------------------------------------------------------------------------

#[tokio::test]
async fn account_update_is_partial() {
    let dir = tempfile::tempdir().unwrap();
    let router = routes::build_router(make_state(&dir));

    let (status, body) = call(
        router.clone(),
        post_json("/v1/account", serde_json::json!({ "registered": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let json = parse_json(body);
    assert_eq!(json["registered"], true);
    assert_eq!(json["remote_backups_enabled"], false);
    assert_eq!(json["backups_enabled"], false);

    let (_, body) = call(
        router,
        post_json(
            "/v1/account",
            serde_json::json!({ "backups_enabled": true, "remote_backups_enabled": true }),
        ),
    )
    .await;
    let json = parse_json(body);
    assert_eq!(json["registered"], true, "untouched field keeps its value");
    assert_eq!(json["remote_backups_enabled"], true);
    assert_eq!(json["backups_enabled"], true);
}

// ---------------------------------------------------------------------------
// POST /v1/billing/*
// ---------------------------------------------------------------------------

#[tokio::test]
async fn billing_updates_are_reflected() {
    let dir = tempfile::tempdir().unwrap();
    let router = routes::build_router(make_state(&dir));

    let (status, body) = call(
        router.clone(),
        post_json("/v1/billing/availability", serde_json::json!({ "available": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let json = parse_json(body);
    assert_eq!(json["available"], true);
    assert_eq!(json["purchase"]["kind"], "none");

    let (status, body) = call(
        router.clone(),
        post_json(
            "/v1/billing/purchase",
            serde_json::json!({
                "kind": "success",
                "acknowledged": true,
                "purchase_time": "2026-03-01T10:00:00Z"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let json = parse_json(body);
    assert_eq!(json["purchase"]["kind"], "success");
    assert_eq!(json["purchase"]["acknowledged"], true);

    let (status, _) = call(
        router,
        post_json("/v1/billing/purchase", serde_json::json!({ "kind": "refunded" })),
    )
    .await;
    assert!(status.is_client_error(), "unknown receipt kind must be rejected");
}

// ---------------------------------------------------------------------------
// POST /v1/network  /v1/reconcile/:category
// ---------------------------------------------------------------------------

#[tokio::test]
async fn network_flag_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let st = make_state(&dir);
    let router = routes::build_router(Arc::clone(&st));

    let (status, body) = call(
        router,
        post_json("/v1/network", serde_json::json!({ "available": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_json(body)["available"], true);
    assert!(*st.network.borrow());
}

#[tokio::test]
async fn reconcile_is_accepted_then_deduped_while_offline() {
    let dir = tempfile::tempdir().unwrap();
    let router = routes::build_router(make_state(&dir));

    // Network is down at boot, so the first pass parks in the scheduler.
    let (status, body) = call(router.clone(), post_empty("/v1/reconcile/backup")).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let json = parse_json(body);
    assert_eq!(json["category"], "backup");
    assert_eq!(json["accepted"], true);

    let (status, body) = call(router, post_empty("/v1/reconcile/backup")).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(parse_json(body)["accepted"], false);
}
