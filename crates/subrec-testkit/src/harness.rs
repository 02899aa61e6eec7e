use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use subrec_reconcile::{BillingPurchaseResult, EntitlementTier, PurchaseWindow, SubscriberCategory};
use subrec_runtime::{CategoryLocks, EntitlementStore, ReconcileDeps, SubscriptionCheckJob};

use crate::fakes::{
    EventLog, FakeBilling, FakeGates, FakeSubscriptions, FixedClock, RecordingPayments,
    RecordingStore,
};

/// Reference "now" for scenarios: 2026-03-15T12:00:00Z.
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

/// One category's fully-faked wiring. Gates open, billing available, no
/// subscription, no purchase, remote tier NONE.
pub struct Harness {
    pub category: SubscriberCategory,
    pub gates: Arc<FakeGates>,
    pub store: Arc<RecordingStore>,
    pub subscriptions: Arc<FakeSubscriptions>,
    pub billing: Arc<FakeBilling>,
    pub payments: Arc<RecordingPayments>,
    pub clock: Arc<FixedClock>,
    pub locks: Arc<CategoryLocks>,
    pub log: EventLog,
    pub window: PurchaseWindow,
    pub lock_timeout: Duration,
}

impl Harness {
    pub fn new(category: SubscriberCategory) -> Self {
        Self::with_locks(category, Arc::new(CategoryLocks::new()), EventLog::new())
    }

    /// Share `locks` and `log` with other harnesses to model one process.
    pub fn with_locks(category: SubscriberCategory, locks: Arc<CategoryLocks>, log: EventLog) -> Self {
        let label = category.as_str();
        Self {
            category,
            gates: Arc::new(FakeGates::open()),
            store: Arc::new(RecordingStore::new().with_log(log.clone(), label)),
            subscriptions: Arc::new(FakeSubscriptions::new().with_log(log.clone(), label)),
            billing: Arc::new(FakeBilling::new().with_log(log.clone(), label)),
            payments: Arc::new(RecordingPayments::new().with_log(log.clone(), label)),
            clock: Arc::new(FixedClock::new(fixed_now())),
            locks,
            log,
            window: PurchaseWindow::default(),
            lock_timeout: Duration::from_secs(5),
        }
    }

    pub fn deps(&self) -> ReconcileDeps {
        ReconcileDeps {
            gates: self.gates.clone(),
            store: self.store.clone(),
            subscriptions: self.subscriptions.clone(),
            billing: self.billing.clone(),
            payments: self.payments.clone(),
            clock: self.clock.clone(),
        }
    }

    pub fn job(&self) -> SubscriptionCheckJob {
        SubscriptionCheckJob::new(
            self.category,
            self.deps(),
            Arc::clone(&self.locks),
            self.window,
            self.lock_timeout,
        )
    }

    /// Configure the three signals directly.
    pub fn set_signals(&self, paid_tier: bool, remote_active: bool, purchase_active: bool) {
        self.subscriptions.set_tier(Some(if paid_tier {
            EntitlementTier::Paid
        } else {
            EntitlementTier::None
        }));
        self.subscriptions.set_active(self.category, remote_active);
        self.billing.set_result(if purchase_active {
            BillingPurchaseResult::Success {
                acknowledged: true,
                purchase_time: fixed_now() - chrono::Duration::days(3),
            }
        } else {
            BillingPurchaseResult::None
        });
    }

    pub async fn persisted(&self) -> (EntitlementTier, bool) {
        let tier = self.store.tier().await.unwrap_or_default();
        let flag = self.store.mismatch_flag().await.unwrap_or(false);
        (tier, flag)
    }
}
