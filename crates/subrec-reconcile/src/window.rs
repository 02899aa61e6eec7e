//! Purchase recency window.
//!
//! A billing receipt only counts as an active purchase when it is
//! acknowledged and was made recently enough to still cover the current
//! billing period.
//!
//! # Invariants
//!
//! - **Exclusive lower bound**: a purchase exactly `window` old is outside.
//! - **Future timestamps are inside**: clock skew between the billing layer
//!   and this host never disqualifies a purchase.
//! - **Pure, no clock**: the caller supplies `now`.

use chrono::{DateTime, Duration, Utc};

use crate::BillingPurchaseResult;

/// Default recency window: one month, rounded up.
pub const DEFAULT_PURCHASE_WINDOW_DAYS: u32 = 31;

/// Configurable recency window for purchase receipts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PurchaseWindow {
    days: u32,
}

impl Default for PurchaseWindow {
    fn default() -> Self {
        Self::days(DEFAULT_PURCHASE_WINDOW_DAYS)
    }
}

impl PurchaseWindow {
    pub fn days(days: u32) -> Self {
        Self { days }
    }

    pub fn as_days(&self) -> u32 {
        self.days
    }

    pub fn duration(&self) -> Duration {
        Duration::days(i64::from(self.days))
    }

    /// `true` if `purchase_time` is strictly newer than `now - window`.
    pub fn contains(&self, purchase_time: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        purchase_time > now - self.duration()
    }

    /// `true` iff the result is an acknowledged success inside the window.
    pub fn is_active_purchase(&self, result: &BillingPurchaseResult, now: DateTime<Utc>) -> bool {
        match result {
            BillingPurchaseResult::Success {
                acknowledged,
                purchase_time,
            } => *acknowledged && self.contains(*purchase_time, now),
            BillingPurchaseResult::None | BillingPurchaseResult::Error { .. } => false,
        }
    }
}
