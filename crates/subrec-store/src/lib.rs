//! subrec-store
//!
//! Concrete local entitlement stores and pending-payment registries.
//!
//! - `memory`: process-lifetime implementations for tests and embedding.
//! - `file`: JSON files under a state directory, one entitlement file per
//!   category plus a shared `pending-payments.json`.
//!
//! Both implement the `subrec-runtime` port traits.

mod file;
mod memory;

pub use file::{
    entitlement_path, payments_path, read_entitlement_record, read_payments, EntitlementRecord,
    JsonFileEntitlementStore, JsonFilePaymentRegistry, PAYMENTS_FILE,
};
pub use memory::{MemoryEntitlementStore, MemoryPaymentRegistry};

use subrec_reconcile::{PendingPayment, SubscriberCategory};

/// Most recently updated payment for `category`, by `updated_at`.
///
/// The registries answer `PaymentRegistry::latest` with this, and the CLI
/// `pending` command reads the same file through it, so both agree on which
/// record is current.
pub fn latest_for<'a, I>(payments: I, category: SubscriberCategory) -> Option<PendingPayment>
where
    I: IntoIterator<Item = &'a PendingPayment>,
{
    payments
        .into_iter()
        .filter(|p| p.category == category)
        .max_by_key(|p| p.updated_at)
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use subrec_reconcile::PaymentState;

    #[test]
    fn latest_is_per_category_and_by_update_time() {
        let t0 = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let old = PendingPayment::new(SubscriberCategory::Backup, PaymentState::Complete, t0);
        let new = PendingPayment::new(
            SubscriberCategory::Backup,
            PaymentState::RequiresAction,
            t0 + Duration::hours(2),
        );
        let other = PendingPayment::new(
            SubscriberCategory::Donation,
            PaymentState::Pending,
            t0 + Duration::hours(5),
        );
        let all = vec![new.clone(), other.clone(), old];

        assert_eq!(latest_for(&all, SubscriberCategory::Backup).map(|p| p.id), Some(new.id));
        assert_eq!(latest_for(&all, SubscriberCategory::Donation).map(|p| p.id), Some(other.id));
        assert!(latest_for(&all[..0], SubscriberCategory::Backup).is_none());
    }
}
