//! subrec-reconcile
//!
//! Entitlement reconciliation decision core.
//!
//! Three sources of truth are compared on every pass:
//! - the locally cached entitlement tier
//! - the remote subscription ledger
//! - the billing provider's most recent purchase receipt
//!
//! Rules:
//! - Gating preconditions short-circuit to a clean (non-mismatch) verdict
//! - An in-flight (PENDING) payment short-circuits to a clean verdict
//! - Otherwise the pass is consistent only when all three signals agree
//!
//! Deterministic, pure logic. No IO. No clock. No client calls.

mod engine;
mod gate;
mod types;
mod window;

pub use engine::{decide, evaluate, is_payment_in_flight, is_subscription_active, signals_from};
pub use gate::{check_account_gates, AccountGateInputs, GateBlock};
pub use types::*;
pub use window::{PurchaseWindow, DEFAULT_PURCHASE_WINDOW_DAYS};
