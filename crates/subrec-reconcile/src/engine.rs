use chrono::{DateTime, Utc};

use crate::window::PurchaseWindow;
use crate::{
    ActiveSubscription, BillingPurchaseResult, EntitlementTier, PassDecision, PaymentState,
    PendingPayment, ReconcileSignals, Verdict,
};

/// `true` when the latest payment for the category is still PENDING.
///
/// An in-flight payment transiently desynchronizes all three sources, so the
/// pass records no mismatch while it resolves.
pub fn is_payment_in_flight(latest: Option<&PendingPayment>) -> bool {
    matches!(latest, Some(p) if p.state == PaymentState::Pending)
}

/// A missing view and an inactive view are both "inactive".
pub fn is_subscription_active(view: Option<&ActiveSubscription>) -> bool {
    view.map(|v| v.is_active).unwrap_or(false)
}

/// Reduce the raw per-pass observations to the three boolean signals.
pub fn signals_from(
    tier: EntitlementTier,
    subscription: Option<&ActiveSubscription>,
    purchase: &BillingPurchaseResult,
    window: &PurchaseWindow,
    now: DateTime<Utc>,
) -> ReconcileSignals {
    ReconcileSignals::new(
        tier.is_paid(),
        is_subscription_active(subscription),
        window.is_active_purchase(purchase, now),
    )
}

/// Deterministic verdict:
/// - all three active   => consistent
/// - all three inactive => consistent
/// - anything else      => mismatch
pub fn evaluate(signals: &ReconcileSignals) -> Verdict {
    if signals.all_active() || signals.all_inactive() {
        Verdict::Consistent
    } else {
        Verdict::Mismatch
    }
}

/// Full decision for an evaluated pass.
pub fn decide(signals: ReconcileSignals) -> PassDecision {
    PassDecision::Evaluated {
        verdict: evaluate(&signals),
        signals,
    }
}
