//! Shared runtime state for subrec-daemon.
//!
//! All types here are `Clone`-able (via `Arc` or copy). Handlers receive
//! `State<Arc<AppState>>` from Axum. Background tasks (heartbeat, pass
//! forwarding, triggers) are spawned by the helpers at the bottom.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use subrec_config::ReconcilerSettings;
use subrec_reconcile::{
    AccountGateInputs, BillingPurchaseResult, PassDecision, PassReport, SubscriberCategory,
};
use subrec_runtime::{
    spawn_on_network_available, spawn_periodic, AccountGates, BillingClient, CategoryLocks,
    EntitlementStore, ReconcileDeps, RetryPolicy, Scheduler, SubscriptionCheckJob,
    SubscriptionClient, SystemClock,
};
use subrec_store::{JsonFileEntitlementStore, JsonFilePaymentRegistry};
use tokio::sync::{broadcast, watch, RwLock};
use tracing::{info, warn};

use crate::api_types::AccountRequest;

// ---------------------------------------------------------------------------
// BusMsg: SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat { ts_millis: i64 },
    Pass(PassReport),
    LogLine { level: String, msg: String },
}

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// Runtime account gates
// ---------------------------------------------------------------------------

/// Gate inputs the daemon boots with (from config) and operators update via
/// `POST /v1/account`.
#[derive(Debug)]
pub struct RuntimeGates {
    registered: AtomicBool,
    remote_feature_enabled: AtomicBool,
    local_feature_enabled: AtomicBool,
}

impl RuntimeGates {
    pub fn new(initial: AccountGateInputs) -> Self {
        Self {
            registered: AtomicBool::new(initial.registered),
            remote_feature_enabled: AtomicBool::new(initial.remote_feature_enabled),
            local_feature_enabled: AtomicBool::new(initial.local_feature_enabled),
        }
    }

    /// Apply the fields present in `req`; absent fields are left alone.
    pub fn apply(&self, req: &AccountRequest) -> AccountGateInputs {
        if let Some(v) = req.registered {
            self.registered.store(v, Ordering::SeqCst);
        }
        if let Some(v) = req.remote_backups_enabled {
            self.remote_feature_enabled.store(v, Ordering::SeqCst);
        }
        if let Some(v) = req.backups_enabled {
            self.local_feature_enabled.store(v, Ordering::SeqCst);
        }
        self.snapshot()
    }
}

impl AccountGates for RuntimeGates {
    fn is_registered(&self) -> bool {
        self.registered.load(Ordering::SeqCst)
    }

    fn remote_feature_enabled(&self) -> bool {
        self.remote_feature_enabled.load(Ordering::SeqCst)
    }

    fn local_feature_enabled(&self) -> bool {
        self.local_feature_enabled.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Billing receipt cache
// ---------------------------------------------------------------------------

/// Billing client backed by the most recent receipt pushed to the daemon by
/// the platform billing layer. Starts unavailable with no purchase.
#[derive(Debug)]
pub struct ReceiptCacheBilling {
    available: AtomicBool,
    latest: RwLock<BillingPurchaseResult>,
}

impl Default for ReceiptCacheBilling {
    fn default() -> Self {
        Self {
            available: AtomicBool::new(false),
            latest: RwLock::new(BillingPurchaseResult::None),
        }
    }
}

impl ReceiptCacheBilling {
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub async fn set_latest(&self, result: BillingPurchaseResult) {
        *self.latest.write().await = result;
    }
}

#[async_trait::async_trait]
impl BillingClient for ReceiptCacheBilling {
    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn query_purchases(&self) -> BillingPurchaseResult {
        self.latest.read().await.clone()
    }
}

// ---------------------------------------------------------------------------
// Per-category wiring
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct CategoryRuntime {
    pub store: Arc<dyn EntitlementStore>,
    pub job: SubscriptionCheckJob,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Cloneable (Arc) handle shared across all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    /// Completed pass reports, published by every category's job.
    pub passes: broadcast::Sender<PassReport>,
    pub build: BuildInfo,
    pub gates: Arc<RuntimeGates>,
    pub billing: Arc<ReceiptCacheBilling>,
    /// Connectivity as last reported via `POST /v1/network`.
    pub network: watch::Sender<bool>,
    pub scheduler: Scheduler,
    pub categories: BTreeMap<SubscriberCategory, CategoryRuntime>,
    pub periodic_interval: Option<Duration>,
}

impl AppState {
    /// Wire file-backed stores under `settings.state_dir` and one
    /// subscription-check job per configured category.
    pub fn new(settings: &ReconcilerSettings, subscriptions: Arc<dyn SubscriptionClient>) -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);
        let (passes, _rx) = broadcast::channel::<PassReport>(256);
        let (network, network_rx) = watch::channel(false);

        let gates = Arc::new(RuntimeGates::new(settings.initial_gates));
        let billing = Arc::new(ReceiptCacheBilling::default());
        let payments = Arc::new(JsonFilePaymentRegistry::new(&settings.state_dir));
        let locks = Arc::new(CategoryLocks::new());

        let scheduler = Scheduler::new(RetryPolicy {
            initial_backoff: settings.scheduler.retry_initial_backoff,
            max_backoff: settings.scheduler.retry_max_backoff,
        })
        .with_network_constraint(network_rx);

        let categories = settings
            .categories
            .iter()
            .map(|&category| {
                let store: Arc<dyn EntitlementStore> =
                    Arc::new(JsonFileEntitlementStore::new(&settings.state_dir, category));
                let deps = ReconcileDeps {
                    gates: gates.clone(),
                    store: Arc::clone(&store),
                    subscriptions: Arc::clone(&subscriptions),
                    billing: billing.clone(),
                    payments: payments.clone(),
                    clock: Arc::new(SystemClock),
                };
                let job = SubscriptionCheckJob::new(
                    category,
                    deps,
                    Arc::clone(&locks),
                    settings.purchase_window,
                    settings.lock_timeout,
                )
                .with_observer(passes.clone());
                (category, CategoryRuntime { store, job })
            })
            .collect();

        Self {
            bus,
            passes,
            build: BuildInfo {
                service: "subrec-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            gates,
            billing,
            network,
            scheduler,
            categories,
            periodic_interval: settings.scheduler.periodic_interval,
        }
    }

    /// Enqueue a pass for `category`.
    ///
    /// `None` when the category is not configured; `Some(false)` when a pass
    /// for it is already in flight.
    pub fn trigger(&self, category: SubscriberCategory) -> Option<bool> {
        let rt = self.categories.get(&category)?;
        Some(self.scheduler.enqueue(rt.job.clone()).is_some())
    }

    /// Enqueue a pass for every configured category.
    pub fn trigger_all(&self) {
        for category in self.categories.keys() {
            let _ = self.trigger(*category);
        }
    }

    pub fn log_line(&self, level: &str, msg: impl Into<String>) {
        let _ = self.bus.send(BusMsg::LogLine {
            level: level.to_string(),
            msg: msg.into(),
        });
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}

/// Spawn a background task that republishes pass reports on the SSE bus.
///
/// A mismatch additionally emits a WARN log line.
pub fn spawn_pass_forwarder(state: Arc<AppState>) {
    let mut rx = state.passes.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(report) => {
                    match &report.decision {
                        PassDecision::Evaluated { verdict, .. } if verdict.is_mismatch() => {
                            state.log_line(
                                "WARN",
                                format!("entitlement mismatch detected (category={})", report.category),
                            );
                        }
                        PassDecision::SubscriptionUnknown => {
                            state.log_line(
                                "WARN",
                                format!(
                                    "remote subscription unavailable; mismatch flag unchanged (category={})",
                                    report.category
                                ),
                            );
                        }
                        _ => {}
                    }
                    let _ = state.bus.send(BusMsg::Pass(report));
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "pass forwarder lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

/// Spawn the network-availability trigger and, if configured, the periodic
/// trigger. Both enqueue a pass for every configured category.
pub fn spawn_triggers(state: Arc<AppState>) {
    let on_network = Arc::clone(&state);
    spawn_on_network_available(state.network.subscribe(), move || {
        info!("network available; enqueueing reconcile passes");
        on_network.trigger_all();
    });

    if let Some(interval) = state.periodic_interval {
        let on_tick = Arc::clone(&state);
        spawn_periodic(interval, move || {
            on_tick.trigger_all();
        });
    }
}
