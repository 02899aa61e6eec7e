//! Scenario: three-way verdict truth table
//!
//! # Invariants under test
//!
//! 1. A pass is consistent only when tier, remote subscription and purchase
//!    agree unanimously (all active or all inactive).
//! 2. Any partial agreement is a mismatch.
//! 3. Short-circuit decisions (gated, payment in flight) never set the flag.
//! 4. The verdict is a pure function of its inputs (same inputs, same verdict).
//! 5. A pass that never observed the remote subscription writes no flag.
//!
//! All tests are pure in-process; no IO.

use chrono::{Duration, TimeZone, Utc};
use subrec_reconcile::*;

fn signals(paid: bool, remote: bool, purchase: bool) -> ReconcileSignals {
    ReconcileSignals::new(paid, remote, purchase)
}

#[test]
fn unanimous_active_is_consistent() {
    assert_eq!(evaluate(&signals(true, true, true)), Verdict::Consistent);
}

#[test]
fn unanimous_inactive_is_consistent() {
    assert_eq!(evaluate(&signals(false, false, false)), Verdict::Consistent);
}

#[test]
fn paid_tier_without_remote_subscription_is_mismatch() {
    assert_eq!(evaluate(&signals(true, false, true)), Verdict::Mismatch);
}

#[test]
fn remote_subscription_alone_is_mismatch() {
    assert_eq!(evaluate(&signals(false, true, false)), Verdict::Mismatch);
}

#[test]
fn lapsed_payment_with_paid_tier_is_mismatch() {
    // Purchase aged out of the window while tier and server still say active.
    let now = Utc.with_ymd_and_hms(2026, 6, 1, 9, 30, 0).unwrap();
    let stale = BillingPurchaseResult::Success {
        acknowledged: true,
        purchase_time: now - Duration::days(45),
    };
    let view = ActiveSubscription {
        category: SubscriberCategory::Backup,
        is_active: true,
        ends_at: None,
        will_cancel_at_period_end: false,
    };

    let s = signals_from(
        EntitlementTier::Paid,
        Some(&view),
        &stale,
        &PurchaseWindow::default(),
        now,
    );
    assert_eq!(s, signals(true, true, false));

    let d = decide(s);
    assert_eq!(d.mismatch_flag(), Some(true));
    assert_eq!(
        d,
        PassDecision::Evaluated {
            signals: s,
            verdict: Verdict::Mismatch
        }
    );
}

#[test]
fn short_circuit_decisions_clear_the_flag() {
    for reason in [
        GateBlock::Unregistered,
        GateBlock::RemoteFeatureDisabled,
        GateBlock::LocalFeatureDisabled,
        GateBlock::BillingUnavailable,
    ] {
        assert_eq!(PassDecision::Gated { reason }.mismatch_flag(), Some(false));
    }
    assert_eq!(PassDecision::PaymentInFlight.mismatch_flag(), Some(false));
}

#[test]
fn unobserved_subscription_leaves_the_flag_alone() {
    assert_eq!(PassDecision::SubscriptionUnknown.mismatch_flag(), None);
}

#[test]
fn verdict_is_stable_across_repeated_evaluation() {
    for bits in 0u8..8 {
        let s = signals(bits & 1 != 0, bits & 2 != 0, bits & 4 != 0);
        assert_eq!(evaluate(&s), evaluate(&s));
        assert_eq!(decide(s), decide(s));
    }
}

#[test]
fn pass_report_serializes_with_stable_tags() {
    let report = PassReport {
        category: SubscriberCategory::Backup,
        decision: PassDecision::Gated {
            reason: GateBlock::BillingUnavailable,
        },
        tier: None,
        mismatch_detected: false,
    };
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["category"], "backup");
    assert_eq!(json["decision"]["decision"], "gated");
    assert_eq!(json["decision"]["reason"], "billing_unavailable");
    assert_eq!(json["mismatch_detected"], false);
}
