use std::time::Duration;

use subrec_reconcile::SubscriberCategory;

/// Unexpected failures that abort a pass.
///
/// None of these are permanent: reconciliation is always safe to retry, so
/// every variant maps to [`crate::JobOutcome::Retry`]. Transient client query
/// failures are not represented here because the job absorbs them.
#[derive(Debug)]
pub enum ReconcileError {
    /// The category lock could not be acquired within the configured bound.
    LockTimeout {
        category: SubscriberCategory,
        waited: Duration,
    },
    /// The local entitlement store failed a read or write.
    Store {
        op: &'static str,
        source: anyhow::Error,
    },
    /// The pending-payment registry could not be read.
    PaymentRegistry {
        category: SubscriberCategory,
        source: anyhow::Error,
    },
}

impl ReconcileError {
    pub(crate) fn store(op: &'static str) -> impl FnOnce(anyhow::Error) -> Self {
        move |source| ReconcileError::Store { op, source }
    }
}

impl std::fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconcileError::LockTimeout { category, waited } => write!(
                f,
                "reconcile lock for category={category} not acquired within {}ms",
                waited.as_millis()
            ),
            ReconcileError::Store { op, source } => {
                write!(f, "entitlement store {op} failed: {source:#}")
            }
            ReconcileError::PaymentRegistry { category, source } => write!(
                f,
                "pending-payment lookup for category={category} failed: {source:#}"
            ),
        }
    }
}

impl std::error::Error for ReconcileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReconcileError::LockTimeout { .. } => None,
            ReconcileError::Store { source, .. } | ReconcileError::PaymentRegistry { source, .. } => {
                Some(source.as_ref())
            }
        }
    }
}
