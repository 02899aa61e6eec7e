//! The subscription-check job: one reconciliation pass per invocation.
//!
//! Pass order (fixed):
//! 1. Account gates, then billing availability. Outside the lock.
//! 2. Acquire the category lock (bounded wait).
//! 3. Latest pending payment. PENDING short-circuits.
//! 4. Billing purchase query.
//! 5. Remote tier query, falling back to the cached tier.
//! 6. Remote active-subscription query. On failure, write the tier and
//!    leave the mismatch flag as it was.
//! 7. Combine, then write tier and mismatch flag.
//! 8. Release the lock (guard drop).
//!
//! All writes happen after all reads, so a pass torn down mid-flight leaves
//! previously persisted state untouched.

use std::sync::Arc;
use std::time::Duration;

use subrec_reconcile::{
    check_account_gates, decide, evaluate, is_payment_in_flight, signals_from, EntitlementTier, GateBlock,
    PassDecision, PassReport, PurchaseWindow, SubscriberCategory,
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::error::ReconcileError;
use crate::locks::CategoryLocks;
use crate::ports::ReconcileDeps;
use crate::scheduler::{Job, JobKey};

/// Tri-state result reported to the scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobOutcome {
    Success,
    /// Transient failure; the scheduler should run the job again.
    Retry,
    /// Permanent failure; never produced by the subscription-check job.
    Failure,
}

impl JobOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            JobOutcome::Success => "success",
            JobOutcome::Retry => "retry",
            JobOutcome::Failure => "failure",
        }
    }
}

impl std::fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reconciles one category's entitlement against the remote ledger and the
/// billing receipt. The category is fixed at construction.
#[derive(Clone)]
pub struct SubscriptionCheckJob {
    category: SubscriberCategory,
    deps: ReconcileDeps,
    locks: Arc<CategoryLocks>,
    window: PurchaseWindow,
    lock_timeout: Duration,
    observer: Option<broadcast::Sender<PassReport>>,
}

impl SubscriptionCheckJob {
    pub fn new(
        category: SubscriberCategory,
        deps: ReconcileDeps,
        locks: Arc<CategoryLocks>,
        window: PurchaseWindow,
        lock_timeout: Duration,
    ) -> Self {
        Self {
            category,
            deps,
            locks,
            window,
            lock_timeout,
            observer: None,
        }
    }

    /// Publish every completed pass's report on `tx`.
    pub fn with_observer(mut self, tx: broadcast::Sender<PassReport>) -> Self {
        self.observer = Some(tx);
        self
    }

    pub fn category(&self) -> SubscriberCategory {
        self.category
    }

    /// Stable identity used by the scheduler's in-flight registry.
    pub fn job_key(category: SubscriberCategory) -> JobKey {
        JobKey::new(format!("subscription-check:{category}"))
    }

    /// Run one pass and report how it concluded.
    pub async fn run_pass(&self) -> Result<PassReport, ReconcileError> {
        let category = self.category;

        if let Some(reason) = self.gate_block().await {
            info!(%category, reason = reason.as_str(), "reconcile gated; clearing mismatch flag");
            self.deps
                .store
                .set_mismatch_flag(false)
                .await
                .map_err(ReconcileError::store("set_mismatch_flag"))?;
            return Ok(self.publish(PassReport {
                category,
                decision: PassDecision::Gated { reason },
                tier: None,
                mismatch_detected: false,
            }));
        }

        let _guard = self.locks.acquire(category, self.lock_timeout).await?;
        debug!(%category, "reconcile lock acquired");

        let latest = self
            .deps
            .payments
            .latest(category)
            .await
            .map_err(|source| ReconcileError::PaymentRegistry { category, source })?;
        if is_payment_in_flight(latest.as_ref()) {
            info!(%category, "payment in flight; clearing mismatch flag");
            self.deps
                .store
                .set_mismatch_flag(false)
                .await
                .map_err(ReconcileError::store("set_mismatch_flag"))?;
            return Ok(self.publish(PassReport {
                category,
                decision: PassDecision::PaymentInFlight,
                tier: None,
                mismatch_detected: false,
            }));
        }

        let purchase = self.deps.billing.query_purchases().await;
        let tier = self.refreshed_tier().await?;

        let subscription = match self.deps.subscriptions.active_subscription(category).await {
            Ok(view) => view,
            Err(err) => {
                warn!(
                    %category,
                    error = %format!("{err:#}"),
                    "active subscription query failed; keeping previous mismatch flag"
                );
                return self.finish_without_verdict(tier).await;
            }
        };

        let now = self.deps.clock.now();
        let signals = signals_from(tier, subscription.as_ref(), &purchase, &self.window, now);
        let decision = decide(signals);
        let mismatch = evaluate(&signals).is_mismatch();

        self.deps
            .store
            .set_tier(tier)
            .await
            .map_err(ReconcileError::store("set_tier"))?;
        self.deps
            .store
            .set_mismatch_flag(mismatch)
            .await
            .map_err(ReconcileError::store("set_mismatch_flag"))?;

        if mismatch {
            warn!(%category, ?signals, tier = tier.as_str(), "entitlement mismatch detected");
        } else {
            info!(%category, ?signals, tier = tier.as_str(), "entitlement consistent");
        }

        Ok(self.publish(PassReport {
            category,
            decision,
            tier: Some(tier),
            mismatch_detected: mismatch,
        }))
    }

    /// Persist the refreshed tier and report the flag as it stands. Without
    /// the remote subscription signal there is nothing to compare.
    async fn finish_without_verdict(
        &self,
        tier: EntitlementTier,
    ) -> Result<PassReport, ReconcileError> {
        self.deps
            .store
            .set_tier(tier)
            .await
            .map_err(ReconcileError::store("set_tier"))?;
        let previous = self
            .deps
            .store
            .mismatch_flag()
            .await
            .map_err(ReconcileError::store("mismatch_flag"))?;

        Ok(self.publish(PassReport {
            category: self.category,
            decision: PassDecision::SubscriptionUnknown,
            tier: Some(tier),
            mismatch_detected: previous,
        }))
    }

    async fn gate_block(&self) -> Option<GateBlock> {
        if let Some(block) = check_account_gates(&self.deps.gates.snapshot()) {
            return Some(block);
        }
        if !self.deps.billing.is_available().await {
            return Some(GateBlock::BillingUnavailable);
        }
        None
    }

    /// Remote tier, or the cached tier when the remote query fails.
    async fn refreshed_tier(&self) -> Result<EntitlementTier, ReconcileError> {
        match self.deps.subscriptions.tier().await {
            Ok(tier) => Ok(tier),
            Err(err) => {
                let cached = self
                    .deps
                    .store
                    .tier()
                    .await
                    .map_err(ReconcileError::store("tier"))?;
                warn!(
                    category = %self.category,
                    error = %format!("{err:#}"),
                    cached = cached.as_str(),
                    "remote tier query failed; keeping cached tier"
                );
                Ok(cached)
            }
        }
    }

    fn publish(&self, report: PassReport) -> PassReport {
        if let Some(tx) = &self.observer {
            // No subscribers is fine.
            let _ = tx.send(report.clone());
        }
        report
    }
}

#[async_trait::async_trait]
impl Job for SubscriptionCheckJob {
    fn key(&self) -> JobKey {
        Self::job_key(self.category)
    }

    async fn run(&self) -> JobOutcome {
        match self.run_pass().await {
            Ok(_) => JobOutcome::Success,
            Err(err) => {
                warn!(category = %self.category, error = %err, "reconcile pass failed; will retry");
                JobOutcome::Retry
            }
        }
    }
}
