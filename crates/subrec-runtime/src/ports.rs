//! Dependency boundary for the reconciliation job.
//!
//! Every external collaborator the job touches is expressed as a trait here
//! and injected through [`ReconcileDeps`]; the job reads no globals. Concrete
//! implementations live elsewhere (`subrec-store`, `subrec-daemon`) and test
//! doubles live in `subrec-testkit`.
//!
//! All traits are object-safe and `Send + Sync` so callers can hold
//! `Arc<dyn Trait>` across task boundaries.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use subrec_reconcile::{
    AccountGateInputs, ActiveSubscription, BillingPurchaseResult, EntitlementTier,
    PendingPayment, SubscriberCategory,
};

// ---------------------------------------------------------------------------
// Local entitlement store
// ---------------------------------------------------------------------------

/// Durable key/value holding the cached tier and the mismatch flag.
///
/// The two fields are written independently; readers must not assume they
/// change atomically as a pair.
#[async_trait::async_trait]
pub trait EntitlementStore: Send + Sync {
    async fn tier(&self) -> Result<EntitlementTier>;

    async fn set_tier(&self, tier: EntitlementTier) -> Result<()>;

    async fn mismatch_flag(&self) -> Result<bool>;

    async fn set_mismatch_flag(&self, detected: bool) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Remote subscription client
// ---------------------------------------------------------------------------

/// Server-side subscription ledger.
#[async_trait::async_trait]
pub trait SubscriptionClient: Send + Sync {
    /// Currently active subscription for `category`, if any.
    async fn active_subscription(
        &self,
        category: SubscriberCategory,
    ) -> Result<Option<ActiveSubscription>>;

    /// Best-effort tier query. Failures must not abort a pass.
    async fn tier(&self) -> Result<EntitlementTier>;
}

// ---------------------------------------------------------------------------
// Billing provider client
// ---------------------------------------------------------------------------

/// Platform billing layer. Its own caching is opaque to the job.
#[async_trait::async_trait]
pub trait BillingClient: Send + Sync {
    async fn is_available(&self) -> bool;

    async fn query_purchases(&self) -> BillingPurchaseResult;
}

// ---------------------------------------------------------------------------
// Pending-payment registry
// ---------------------------------------------------------------------------

/// Read-only view of in-flight payment records.
#[async_trait::async_trait]
pub trait PaymentRegistry: Send + Sync {
    /// Most recently updated payment for `category`.
    async fn latest(&self, category: SubscriberCategory) -> Result<Option<PendingPayment>>;
}

// ---------------------------------------------------------------------------
// Ambient gates + clock
// ---------------------------------------------------------------------------

/// Registration and feature flags. Cheap, synchronous reads.
pub trait AccountGates: Send + Sync {
    fn is_registered(&self) -> bool;

    fn remote_feature_enabled(&self) -> bool;

    fn local_feature_enabled(&self) -> bool;

    fn snapshot(&self) -> AccountGateInputs {
        AccountGateInputs {
            registered: self.is_registered(),
            remote_feature_enabled: self.remote_feature_enabled(),
            local_feature_enabled: self.local_feature_enabled(),
        }
    }
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// ---------------------------------------------------------------------------
// Bundle
// ---------------------------------------------------------------------------

/// Everything one category's job needs, injected at construction.
#[derive(Clone)]
pub struct ReconcileDeps {
    pub gates: Arc<dyn AccountGates>,
    pub store: Arc<dyn EntitlementStore>,
    pub subscriptions: Arc<dyn SubscriptionClient>,
    pub billing: Arc<dyn BillingClient>,
    pub payments: Arc<dyn PaymentRegistry>,
    pub clock: Arc<dyn Clock>,
}
