//! Axum router and all HTTP handlers for subrec-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Scenario tests in `tests/` compose the bare router.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use subrec_reconcile::{BillingPurchaseResult, SubscriberCategory};
use subrec_runtime::{BillingClient, EntitlementStore};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};

use crate::{
    api_types::{
        AccountRequest, AccountResponse, BillingAvailabilityRequest, BillingStateResponse,
        EntitlementResponse, ErrorResponse, HealthResponse, NetworkRequest, NetworkResponse,
        ReconcileAcceptedResponse,
    },
    state::{AppState, BusMsg, CategoryRuntime},
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/stream", get(stream))
        .route("/v1/entitlement/:category", get(entitlement))
        .route("/v1/reconcile/:category", post(reconcile))
        .route("/v1/network", post(network))
        .route("/v1/account", post(account))
        .route("/v1/billing/purchase", post(billing_purchase))
        .route("/v1/billing/availability", post(billing_availability))
        .with_state(state)
}

fn error(status: StatusCode, msg: impl Into<String>) -> Response {
    (status, Json(ErrorResponse { error: msg.into() })).into_response()
}

/// Resolve a path segment to a configured category.
fn configured_category<'a>(
    st: &'a AppState,
    raw: &str,
) -> Result<(SubscriberCategory, &'a CategoryRuntime), Response> {
    match SubscriberCategory::parse(raw) {
        Some(c) => match st.categories.get(&c) {
            Some(rt) => Ok((c, rt)),
            None => Err(error(
                StatusCode::NOT_FOUND,
                format!("category not configured: {c}"),
            )),
        },
        None => Err(error(
            StatusCode::NOT_FOUND,
            format!("unknown category: {raw}"),
        )),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/entitlement/:category
// ---------------------------------------------------------------------------

pub(crate) async fn entitlement(
    State(st): State<Arc<AppState>>,
    Path(raw): Path<String>,
) -> Response {
    let (category, rt) = match configured_category(&st, &raw) {
        Ok(found) => found,
        Err(resp) => return resp,
    };

    let tier = rt.store.tier().await;
    let flag = rt.store.mismatch_flag().await;
    match (tier, flag) {
        (Ok(tier), Ok(mismatch_detected)) => (
            StatusCode::OK,
            Json(EntitlementResponse {
                category,
                tier,
                mismatch_detected,
            }),
        )
            .into_response(),
        (Err(e), _) | (_, Err(e)) => {
            warn!(%category, error = %format!("{e:#}"), "entitlement read failed");
            error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("entitlement read failed: {e:#}"),
            )
        }
    }
}

// ---------------------------------------------------------------------------
// POST /v1/reconcile/:category
// ---------------------------------------------------------------------------

pub(crate) async fn reconcile(
    State(st): State<Arc<AppState>>,
    Path(raw): Path<String>,
) -> Response {
    let (category, rt) = match configured_category(&st, &raw) {
        Ok(found) => found,
        Err(resp) => return resp,
    };
    let accepted = st.scheduler.enqueue(rt.job.clone()).is_some();

    info!(%category, accepted, "reconcile/enqueue");
    (
        StatusCode::ACCEPTED,
        Json(ReconcileAcceptedResponse { category, accepted }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// POST /v1/network
// ---------------------------------------------------------------------------

pub(crate) async fn network(
    State(st): State<Arc<AppState>>,
    Json(req): Json<NetworkRequest>,
) -> impl IntoResponse {
    // send_replace never fails, even with no receivers.
    st.network.send_replace(req.available);
    info!(available = req.available, "network");
    st.log_line("INFO", format!("network available={}", req.available));
    (
        StatusCode::OK,
        Json(NetworkResponse {
            available: *st.network.borrow(),
        }),
    )
}

// ---------------------------------------------------------------------------
// POST /v1/account
// ---------------------------------------------------------------------------

pub(crate) async fn account(
    State(st): State<Arc<AppState>>,
    Json(req): Json<AccountRequest>,
) -> impl IntoResponse {
    let g = st.gates.apply(&req);
    info!(
        registered = g.registered,
        remote_backups_enabled = g.remote_feature_enabled,
        backups_enabled = g.local_feature_enabled,
        "account/update"
    );
    (
        StatusCode::OK,
        Json(AccountResponse {
            registered: g.registered,
            remote_backups_enabled: g.remote_feature_enabled,
            backups_enabled: g.local_feature_enabled,
        }),
    )
}

// ---------------------------------------------------------------------------
// POST /v1/billing/purchase  /v1/billing/availability
// ---------------------------------------------------------------------------

pub(crate) async fn billing_purchase(
    State(st): State<Arc<AppState>>,
    Json(result): Json<BillingPurchaseResult>,
) -> impl IntoResponse {
    st.billing.set_latest(result).await;
    billing_state(&st).await
}

pub(crate) async fn billing_availability(
    State(st): State<Arc<AppState>>,
    Json(req): Json<BillingAvailabilityRequest>,
) -> impl IntoResponse {
    st.billing.set_available(req.available);
    info!(available = req.available, "billing/availability");
    billing_state(&st).await
}

async fn billing_state(st: &AppState) -> (StatusCode, Json<BillingStateResponse>) {
    (
        StatusCode::OK,
        Json(BillingStateResponse {
            available: st.billing.is_available().await,
            purchase: st.billing.query_purchases().await,
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let event_name = match &m {
                    BusMsg::Heartbeat { .. } => "heartbeat",
                    BusMsg::Pass(_) => "pass",
                    BusMsg::LogLine { .. } => "log",
                };
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(event_name).data(data)))
            }
            Err(_) => None, // lagged / closed
        }
    })
}
