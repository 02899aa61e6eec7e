//! Deterministic stand-ins for every external collaborator.
//!
//! Each fake is scriptable at runtime (flip a gate, swap a billing result,
//! make a query fail), counts its calls, and optionally records into a shared
//! [`EventLog`] so tests can assert the exact order of reads and writes.
//! No network, no disk, no wall clock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use subrec_reconcile::{
    ActiveSubscription, BillingPurchaseResult, EntitlementTier, PendingPayment, SubscriberCategory,
};
use subrec_runtime::{
    AccountGates, BillingClient, Clock, EntitlementStore, PaymentRegistry, SubscriptionClient,
};
use subrec_store::{MemoryEntitlementStore, MemoryPaymentRegistry};

fn locked<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

// ---------------------------------------------------------------------------
// Event log
// ---------------------------------------------------------------------------

/// Append-only record of collaborator calls, shared across fakes.
#[derive(Clone, Debug, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<String>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: impl Into<String>) {
        locked(&self.events).push(event.into());
    }

    pub fn snapshot(&self) -> Vec<String> {
        locked(&self.events).clone()
    }

    pub fn clear(&self) {
        locked(&self.events).clear();
    }
}

fn record(log: &Option<(EventLog, String)>, what: &str) {
    if let Some((log, label)) = log {
        log.push(format!("{label}:{what}"));
    }
}

// ---------------------------------------------------------------------------
// Gates
// ---------------------------------------------------------------------------

/// Account gates backed by atomics. All open by default.
#[derive(Debug)]
pub struct FakeGates {
    pub registered: AtomicBool,
    pub remote_feature_enabled: AtomicBool,
    pub local_feature_enabled: AtomicBool,
}

impl Default for FakeGates {
    fn default() -> Self {
        Self::open()
    }
}

impl FakeGates {
    pub fn open() -> Self {
        Self {
            registered: AtomicBool::new(true),
            remote_feature_enabled: AtomicBool::new(true),
            local_feature_enabled: AtomicBool::new(true),
        }
    }
}

impl AccountGates for FakeGates {
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
// Billing
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct FakeBilling {
    available: AtomicBool,
    result: Mutex<BillingPurchaseResult>,
    delay: Mutex<Option<Duration>>,
    queries: AtomicU32,
    log: Option<(EventLog, String)>,
}

impl Default for FakeBilling {
    fn default() -> Self {
        Self {
            available: AtomicBool::new(true),
            result: Mutex::new(BillingPurchaseResult::None),
            delay: Mutex::new(None),
            queries: AtomicU32::new(0),
            log: None,
        }
    }
}

impl FakeBilling {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log(mut self, log: EventLog, label: impl Into<String>) -> Self {
        self.log = Some((log, label.into()));
        self
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn set_result(&self, result: BillingPurchaseResult) {
        *locked(&self.result) = result;
    }

    /// Suspend inside every `query_purchases` call for `delay`.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *locked(&self.delay) = delay;
    }

    pub fn query_count(&self) -> u32 {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl BillingClient for FakeBilling {
    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn query_purchases(&self) -> BillingPurchaseResult {
        self.queries.fetch_add(1, Ordering::SeqCst);
        record(&self.log, "billing");
        let delay = *locked(&self.delay);
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        locked(&self.result).clone()
    }
}

// ---------------------------------------------------------------------------
// Remote subscriptions
// ---------------------------------------------------------------------------

/// Remote ledger fake. A `None` tier or `fail_subscription` makes the
/// corresponding query return an error.
#[derive(Debug)]
pub struct FakeSubscriptions {
    tier: Mutex<Option<EntitlementTier>>,
    active: Mutex<HashMap<SubscriberCategory, ActiveSubscription>>,
    fail_subscription: AtomicBool,
    tier_queries: AtomicU32,
    subscription_queries: AtomicU32,
    log: Option<(EventLog, String)>,
}

impl Default for FakeSubscriptions {
    fn default() -> Self {
        Self {
            tier: Mutex::new(Some(EntitlementTier::None)),
            active: Mutex::new(HashMap::new()),
            fail_subscription: AtomicBool::new(false),
            tier_queries: AtomicU32::new(0),
            subscription_queries: AtomicU32::new(0),
            log: None,
        }
    }
}

impl FakeSubscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log(mut self, log: EventLog, label: impl Into<String>) -> Self {
        self.log = Some((log, label.into()));
        self
    }

    /// `None` makes the tier query fail.
    pub fn set_tier(&self, tier: Option<EntitlementTier>) {
        *locked(&self.tier) = tier;
    }

    /// Mark `category` active or remove its subscription.
    pub fn set_active(&self, category: SubscriberCategory, active: bool) {
        let mut map = locked(&self.active);
        if active {
            map.insert(
                category,
                ActiveSubscription {
                    category,
                    is_active: true,
                    ends_at: None,
                    will_cancel_at_period_end: false,
                },
            );
        } else {
            map.remove(&category);
        }
    }

    pub fn set_subscription(&self, view: ActiveSubscription) {
        locked(&self.active).insert(view.category, view);
    }

    pub fn fail_subscription_queries(&self, fail: bool) {
        self.fail_subscription.store(fail, Ordering::SeqCst);
    }

    pub fn tier_query_count(&self) -> u32 {
        self.tier_queries.load(Ordering::SeqCst)
    }

    pub fn subscription_query_count(&self) -> u32 {
        self.subscription_queries.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SubscriptionClient for FakeSubscriptions {
    async fn active_subscription(
        &self,
        category: SubscriberCategory,
    ) -> Result<Option<ActiveSubscription>> {
        self.subscription_queries.fetch_add(1, Ordering::SeqCst);
        record(&self.log, "subscription");
        if self.fail_subscription.load(Ordering::SeqCst) {
            return Err(anyhow!("subscription service unavailable"));
        }
        Ok(locked(&self.active).get(&category).cloned())
    }

    async fn tier(&self) -> Result<EntitlementTier> {
        self.tier_queries.fetch_add(1, Ordering::SeqCst);
        record(&self.log, "tier");
        let tier = *locked(&self.tier);
        tier.ok_or_else(|| anyhow!("tier endpoint unavailable"))
    }
}

// ---------------------------------------------------------------------------
// Store / registry wrappers
// ---------------------------------------------------------------------------

/// Memory entitlement store that logs writes and can be made to fail.
#[derive(Debug, Default)]
pub struct RecordingStore {
    inner: MemoryEntitlementStore,
    fail: AtomicBool,
    writes: AtomicU32,
    log: Option<(EventLog, String)>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(tier: EntitlementTier, mismatch_detected: bool) -> Self {
        Self {
            inner: MemoryEntitlementStore::with_state(tier, mismatch_detected),
            ..Self::default()
        }
    }

    pub fn with_log(mut self, log: EventLog, label: impl Into<String>) -> Self {
        self.log = Some((log, label.into()));
        self
    }

    /// Make every read and write fail until cleared.
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn write_count(&self) -> u32 {
        self.writes.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("entitlement storage unavailable"));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl EntitlementStore for RecordingStore {
    async fn tier(&self) -> Result<EntitlementTier> {
        self.check()?;
        self.inner.tier().await
    }

    async fn set_tier(&self, tier: EntitlementTier) -> Result<()> {
        self.check()?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        record(&self.log, "set_tier");
        self.inner.set_tier(tier).await
    }

    async fn mismatch_flag(&self) -> Result<bool> {
        self.check()?;
        self.inner.mismatch_flag().await
    }

    async fn set_mismatch_flag(&self, detected: bool) -> Result<()> {
        self.check()?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        record(&self.log, "set_mismatch");
        self.inner.set_mismatch_flag(detected).await
    }
}

/// Memory payment registry that logs lookups.
#[derive(Debug, Default)]
pub struct RecordingPayments {
    inner: MemoryPaymentRegistry,
    log: Option<(EventLog, String)>,
}

impl RecordingPayments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log(mut self, log: EventLog, label: impl Into<String>) -> Self {
        self.log = Some((log, label.into()));
        self
    }

    pub async fn upsert(&self, payment: PendingPayment) {
        self.inner.upsert(payment).await;
    }
}

#[async_trait::async_trait]
impl PaymentRegistry for RecordingPayments {
    async fn latest(&self, category: SubscriberCategory) -> Result<Option<PendingPayment>> {
        record(&self.log, "payments");
        self.inner.latest(category).await
    }
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Settable clock.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *locked(&self.now) = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut g = locked(&self.now);
        *g += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *locked(&self.now)
    }
}
