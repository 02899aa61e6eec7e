//! Scenario: Gating preconditions clear the mismatch flag.
//!
//! # Invariants under test
//!
//! 1. Unregistered, remote feature disabled, local feature disabled and
//!    billing unavailable each short-circuit the pass with a `Gated` decision.
//! 2. A gated pass writes mismatch=false even when the signals would
//!    otherwise disagree and the flag was previously true.
//! 3. A gated pass reports success to the scheduler.
//! 4. A gated pass queries neither billing purchases nor the remote ledger,
//!    never touches the category lock, and leaves the cached tier untouched.
//! 5. Gates are evaluated in a fixed order; the first closed gate is reported.

use std::sync::atomic::Ordering;
use std::time::Duration;

use subrec_reconcile::{EntitlementTier, GateBlock, PassDecision, SubscriberCategory};
use subrec_runtime::{EntitlementStore, Job, JobOutcome};
use subrec_testkit::Harness;

async fn harness_with_stale_mismatch() -> Harness {
    let h = Harness::new(SubscriberCategory::Backup);
    // Would be a mismatch if evaluated.
    h.set_signals(true, false, false);
    h.store.set_tier(EntitlementTier::Free).await.unwrap();
    h.store.set_mismatch_flag(true).await.unwrap();
    h.log.clear();
    h
}

async fn assert_gated(h: &Harness, expected: GateBlock) {
    let report = h.job().run_pass().await.unwrap();
    assert_eq!(report.decision, PassDecision::Gated { reason: expected });
    assert!(!report.mismatch_detected);
    assert_eq!(report.tier, None);

    assert_eq!(h.persisted().await, (EntitlementTier::Free, false));
    assert_eq!(h.billing.query_count(), 0);
    assert_eq!(h.subscriptions.tier_query_count(), 0);
    assert_eq!(h.subscriptions.subscription_query_count(), 0);
    assert!(
        h.log.snapshot().iter().all(|e| !e.ends_with(":payments")),
        "gated pass must not read the payment registry: {:?}",
        h.log.snapshot()
    );
}

#[tokio::test]
async fn unregistered_user_is_gated() {
    let h = harness_with_stale_mismatch().await;
    h.gates.registered.store(false, Ordering::SeqCst);
    assert_gated(&h, GateBlock::Unregistered).await;
}

#[tokio::test]
async fn remote_feature_disabled_is_gated() {
    let h = harness_with_stale_mismatch().await;
    h.gates.remote_feature_enabled.store(false, Ordering::SeqCst);
    assert_gated(&h, GateBlock::RemoteFeatureDisabled).await;
}

#[tokio::test]
async fn local_feature_disabled_is_gated() {
    let h = harness_with_stale_mismatch().await;
    h.gates.local_feature_enabled.store(false, Ordering::SeqCst);
    assert_gated(&h, GateBlock::LocalFeatureDisabled).await;
}

#[tokio::test]
async fn billing_unavailable_is_gated() {
    let h = harness_with_stale_mismatch().await;
    h.billing.set_available(false);
    assert_gated(&h, GateBlock::BillingUnavailable).await;
}

#[tokio::test]
async fn first_closed_gate_wins() {
    let h = harness_with_stale_mismatch().await;
    h.gates.local_feature_enabled.store(false, Ordering::SeqCst);
    h.billing.set_available(false);
    h.gates.remote_feature_enabled.store(false, Ordering::SeqCst);
    assert_gated(&h, GateBlock::RemoteFeatureDisabled).await;
}

#[tokio::test]
async fn gated_pass_ignores_a_held_lock_and_succeeds() {
    let h = harness_with_stale_mismatch().await;
    h.gates.registered.store(false, Ordering::SeqCst);

    let _held = h
        .locks
        .acquire(SubscriberCategory::Backup, Duration::from_millis(10))
        .await
        .unwrap();

    let outcome = tokio::time::timeout(Duration::from_secs(1), h.job().run())
        .await
        .expect("gated pass must not wait on the lock");
    assert_eq!(outcome, JobOutcome::Success);
    assert!(!h.store.mismatch_flag().await.unwrap());
}
