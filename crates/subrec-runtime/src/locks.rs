//! Per-category reconciliation locks.
//!
//! # Invariants
//!
//! - **One lock per category**: a fixed arena indexed by
//!   [`SubscriberCategory::index`]; no locks are created on demand.
//! - **Categories are independent**: holding one category's lock never
//!   blocks another category.
//! - **Bounded wait**: acquisition takes a timeout; expiry is reported as
//!   [`ReconcileError::LockTimeout`] so the scheduler can retry.
//! - **Release on every exit path**: the guard is an owned tokio guard, so
//!   early returns, `?` and panics inside the guarded region all unlock.

use std::sync::Arc;
use std::time::Duration;

use subrec_reconcile::SubscriberCategory;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::ReconcileError;

/// Held for the duration of one pass's read-combine-write sequence.
pub struct CategoryGuard {
    category: SubscriberCategory,
    _guard: OwnedMutexGuard<()>,
}

impl CategoryGuard {
    pub fn category(&self) -> SubscriberCategory {
        self.category
    }
}

/// Lock arena shared by every job (and any other writer of a category's
/// payment state) in the process.
#[derive(Debug)]
pub struct CategoryLocks {
    slots: [Arc<Mutex<()>>; SubscriberCategory::COUNT],
}

impl Default for CategoryLocks {
    fn default() -> Self {
        Self::new()
    }
}

impl CategoryLocks {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| Arc::new(Mutex::new(()))),
        }
    }

    /// Acquire `category`'s lock, waiting at most `timeout`.
    pub async fn acquire(
        &self,
        category: SubscriberCategory,
        timeout: Duration,
    ) -> Result<CategoryGuard, ReconcileError> {
        let slot = Arc::clone(&self.slots[category.index()]);
        match tokio::time::timeout(timeout, slot.lock_owned()).await {
            Ok(guard) => Ok(CategoryGuard {
                category,
                _guard: guard,
            }),
            Err(_) => Err(ReconcileError::LockTimeout {
                category,
                waited: timeout,
            }),
        }
    }

    /// Non-blocking check; `true` if someone currently holds the lock.
    pub fn is_held(&self, category: SubscriberCategory) -> bool {
        self.slots[category.index()].try_lock().is_err()
    }
}
