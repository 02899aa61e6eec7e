//! subrec-testkit
//!
//! Fakes and a wiring harness for scenario tests of the subscription-check
//! job and its scheduler. Not linked into any production binary.

mod fakes;
mod harness;

pub use fakes::{
    EventLog, FakeBilling, FakeGates, FakeSubscriptions, FixedClock, RecordingPayments,
    RecordingStore,
};
pub use harness::{fixed_now, Harness};
