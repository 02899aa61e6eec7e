use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::gate::GateBlock;

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// Entitlement class being reconciled.
///
/// The set is closed so per-category state (locks, stores, jobs) can live in
/// fixed arenas indexed by [`SubscriberCategory::index`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriberCategory {
    /// Recurring paid backup subscription.
    Backup,
    /// Recurring donation subscription.
    Donation,
}

impl SubscriberCategory {
    /// Number of categories; size of every per-category arena.
    pub const COUNT: usize = 2;

    /// All categories in arena order.
    pub const ALL: [SubscriberCategory; Self::COUNT] =
        [SubscriberCategory::Backup, SubscriberCategory::Donation];

    /// Stable arena slot for this category.
    pub fn index(self) -> usize {
        match self {
            SubscriberCategory::Backup => 0,
            SubscriberCategory::Donation => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SubscriberCategory::Backup => "backup",
            SubscriberCategory::Donation => "donation",
        }
    }

    /// Parse the stable string form (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "backup" => Some(SubscriberCategory::Backup),
            "donation" => Some(SubscriberCategory::Donation),
            _ => None,
        }
    }
}

impl std::fmt::Display for SubscriberCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Entitlement tier
// ---------------------------------------------------------------------------

/// Locally believed subscription tier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntitlementTier {
    /// No tier known yet (first-run default).
    #[default]
    None,
    Free,
    Paid,
}

impl EntitlementTier {
    /// Only `Paid` counts as an active entitlement signal.
    pub fn is_paid(self) -> bool {
        matches!(self, EntitlementTier::Paid)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntitlementTier::None => "NONE",
            EntitlementTier::Free => "FREE",
            EntitlementTier::Paid => "PAID",
        }
    }
}

// ---------------------------------------------------------------------------
// Pending payments
// ---------------------------------------------------------------------------

/// Lifecycle state of a payment record owned by the payment subsystem.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentState {
    Created,
    Pending,
    RequiresAction,
    Complete,
    Failed,
    Cancelled,
}

impl PaymentState {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentState::Created => "CREATED",
            PaymentState::Pending => "PENDING",
            PaymentState::RequiresAction => "REQUIRES_ACTION",
            PaymentState::Complete => "COMPLETE",
            PaymentState::Failed => "FAILED",
            PaymentState::Cancelled => "CANCELLED",
        }
    }
}

/// Payment record as read from the pending-payment registry.
///
/// Read-only to the reconciler; never created, transitioned or deleted here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPayment {
    pub id: Uuid,
    pub category: SubscriberCategory,
    pub state: PaymentState,
    /// Last lifecycle transition; the registry's "latest" is the max of this.
    pub updated_at: DateTime<Utc>,
}

impl PendingPayment {
    pub fn new(category: SubscriberCategory, state: PaymentState, updated_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            category,
            state,
            updated_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Remote subscription
// ---------------------------------------------------------------------------

/// Per-pass view of the server's active subscription for a category.
/// Never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveSubscription {
    pub category: SubscriberCategory,
    pub is_active: bool,
    /// End of the current billing period, if the server reports one.
    pub ends_at: Option<DateTime<Utc>>,
    pub will_cancel_at_period_end: bool,
}

// ---------------------------------------------------------------------------
// Billing provider
// ---------------------------------------------------------------------------

/// Most recent purchase as reported by the platform billing layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BillingPurchaseResult {
    Success {
        acknowledged: bool,
        purchase_time: DateTime<Utc>,
    },
    None,
    Error {
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Signals and verdict
// ---------------------------------------------------------------------------

/// The three independent "is active" signals combined by a pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileSignals {
    /// Refreshed (or retained) tier is `Paid`.
    pub paid_tier: bool,
    /// Server reports an active subscription for the category.
    pub remote_subscription_active: bool,
    /// Billing provider reports an acknowledged purchase inside the window.
    pub purchase_active: bool,
}

impl ReconcileSignals {
    pub fn new(paid_tier: bool, remote_subscription_active: bool, purchase_active: bool) -> Self {
        Self {
            paid_tier,
            remote_subscription_active,
            purchase_active,
        }
    }

    /// All three agree "active".
    pub fn all_active(&self) -> bool {
        self.paid_tier && self.remote_subscription_active && self.purchase_active
    }

    /// All three agree "inactive".
    pub fn all_inactive(&self) -> bool {
        !self.paid_tier && !self.remote_subscription_active && !self.purchase_active
    }
}

/// Binary consistency verdict.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Consistent,
    Mismatch,
}

impl Verdict {
    pub fn is_mismatch(self) -> bool {
        matches!(self, Verdict::Mismatch)
    }
}

// ---------------------------------------------------------------------------
// Pass decision / report
// ---------------------------------------------------------------------------

/// How a pass concluded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum PassDecision {
    /// A gating precondition made reconciliation inapplicable.
    Gated { reason: GateBlock },
    /// Latest payment for the category is still PENDING.
    PaymentInFlight,
    /// Signals were gathered and combined.
    Evaluated {
        signals: ReconcileSignals,
        verdict: Verdict,
    },
    /// The remote active-subscription query failed, so one of the three
    /// signals was never observed. The tier is still refreshed.
    SubscriptionUnknown,
}

impl PassDecision {
    /// Value this pass writes to the mismatch flag.
    ///
    /// An evaluated mismatch sets it and the short-circuits clear it.
    /// `None` leaves the persisted flag as the last conclusive pass left it.
    pub fn mismatch_flag(&self) -> Option<bool> {
        match self {
            PassDecision::Evaluated { verdict, .. } => Some(verdict.is_mismatch()),
            PassDecision::Gated { .. } | PassDecision::PaymentInFlight => Some(false),
            PassDecision::SubscriptionUnknown => None,
        }
    }
}

/// Result of one completed pass, as persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassReport {
    pub category: SubscriberCategory,
    pub decision: PassDecision,
    /// Tier written by the pass. `None` when the pass short-circuited before
    /// refreshing the tier.
    pub tier: Option<EntitlementTier>,
    pub mismatch_detected: bool,
}
