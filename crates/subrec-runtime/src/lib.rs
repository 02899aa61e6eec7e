//! subrec-runtime
//!
//! Async orchestration around the pure decision core:
//! - injected collaborator interfaces (`ports`)
//! - per-category lock arena (`locks`)
//! - the subscription-check job (`job`)
//! - the retry harness with in-flight dedupe (`scheduler`)
//! - network and periodic triggers (`trigger`)
//!
//! No concrete storage or transport lives here.

mod error;
mod job;
mod locks;
mod ports;
mod scheduler;
mod trigger;

pub use error::ReconcileError;
pub use job::{JobOutcome, SubscriptionCheckJob};
pub use locks::{CategoryGuard, CategoryLocks};
pub use ports::{
    AccountGates, BillingClient, Clock, EntitlementStore, PaymentRegistry, ReconcileDeps,
    SubscriptionClient, SystemClock,
};
pub use scheduler::{Job, JobKey, JobRunSummary, RetryPolicy, Scheduler};
pub use trigger::{spawn_on_network_available, spawn_periodic};
