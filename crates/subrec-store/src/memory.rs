use anyhow::Result;
use subrec_reconcile::{EntitlementTier, PendingPayment, SubscriberCategory};
use subrec_runtime::{EntitlementStore, PaymentRegistry};
use tokio::sync::RwLock;

use crate::latest_for;

/// In-memory entitlement store. Starts at `None` / `false`.
#[derive(Debug, Default)]
pub struct MemoryEntitlementStore {
    tier: RwLock<EntitlementTier>,
    mismatch: RwLock<bool>,
}

impl MemoryEntitlementStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(tier: EntitlementTier, mismatch_detected: bool) -> Self {
        Self {
            tier: RwLock::new(tier),
            mismatch: RwLock::new(mismatch_detected),
        }
    }
}

#[async_trait::async_trait]
impl EntitlementStore for MemoryEntitlementStore {
    async fn tier(&self) -> Result<EntitlementTier> {
        Ok(*self.tier.read().await)
    }

    async fn set_tier(&self, tier: EntitlementTier) -> Result<()> {
        *self.tier.write().await = tier;
        Ok(())
    }

    async fn mismatch_flag(&self) -> Result<bool> {
        Ok(*self.mismatch.read().await)
    }

    async fn set_mismatch_flag(&self, detected: bool) -> Result<()> {
        *self.mismatch.write().await = detected;
        Ok(())
    }
}

/// In-memory payment registry. Payment-initiation flows (or tests) insert
/// and replace records; the reconciler only reads.
#[derive(Debug, Default)]
pub struct MemoryPaymentRegistry {
    payments: RwLock<Vec<PendingPayment>>,
}

impl MemoryPaymentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert, or replace the record with the same id.
    pub async fn upsert(&self, payment: PendingPayment) {
        let mut guard = self.payments.write().await;
        match guard.iter_mut().find(|p| p.id == payment.id) {
            Some(slot) => *slot = payment,
            None => guard.push(payment),
        }
    }

    pub async fn clear(&self) {
        self.payments.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.payments.read().await.len()
    }
}

#[async_trait::async_trait]
impl PaymentRegistry for MemoryPaymentRegistry {
    async fn latest(&self, category: SubscriberCategory) -> Result<Option<PendingPayment>> {
        Ok(latest_for(self.payments.read().await.iter(), category))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use subrec_reconcile::PaymentState;

    #[tokio::test]
    async fn store_round_trips_fields_independently() {
        let s = MemoryEntitlementStore::new();
        assert_eq!(s.tier().await.unwrap(), EntitlementTier::None);
        assert!(!s.mismatch_flag().await.unwrap());

        s.set_tier(EntitlementTier::Paid).await.unwrap();
        assert_eq!(s.tier().await.unwrap(), EntitlementTier::Paid);
        assert!(!s.mismatch_flag().await.unwrap());

        s.set_mismatch_flag(true).await.unwrap();
        assert!(s.mismatch_flag().await.unwrap());
    }

    #[tokio::test]
    async fn latest_picks_newest_for_category() {
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let reg = MemoryPaymentRegistry::new();

        let old = PendingPayment::new(SubscriberCategory::Backup, PaymentState::Pending, t0);
        let mut newer = PendingPayment::new(
            SubscriberCategory::Backup,
            PaymentState::Complete,
            t0 + Duration::hours(1),
        );
        let other = PendingPayment::new(
            SubscriberCategory::Donation,
            PaymentState::Pending,
            t0 + Duration::hours(2),
        );
        reg.upsert(old).await;
        reg.upsert(newer.clone()).await;
        reg.upsert(other).await;

        let latest = reg.latest(SubscriberCategory::Backup).await.unwrap().unwrap();
        assert_eq!(latest, newer);

        newer.state = PaymentState::Failed;
        reg.upsert(newer.clone()).await;
        assert_eq!(reg.len().await, 3, "upsert replaces by id");
        assert_eq!(
            reg.latest(SubscriberCategory::Backup).await.unwrap().unwrap().state,
            PaymentState::Failed
        );
    }

    #[tokio::test]
    async fn empty_registry_has_no_latest() {
        let reg = MemoryPaymentRegistry::new();
        assert!(reg.latest(SubscriberCategory::Backup).await.unwrap().is_none());
    }
}
