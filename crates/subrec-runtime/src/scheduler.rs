//! Retry harness with single-instance dedupe.
//!
//! # Guarantees
//!
//! - **At most one live instance per [`JobKey`]**: `enqueue` registers an
//!   in-flight marker; a second enqueue while the marker is held is dropped.
//! - **Unlimited attempts**: a job returning [`JobOutcome::Retry`] is run
//!   again after an exponential backoff (doubling from the initial delay,
//!   capped at the max delay). Only `Success` and `Failure` end the run.
//! - **Marker always released**: the marker is owned by a drop guard inside
//!   the spawned task, so it clears on completion, panic, or abort.
//! - **Optional network constraint**: when configured, every attempt waits
//!   until the watched value reads `true`.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::job::JobOutcome;

// ---------------------------------------------------------------------------
// Job contract
// ---------------------------------------------------------------------------

/// Identity used for in-flight dedupe.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobKey(String);

impl JobKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A zero-argument unit of work the scheduler can run and retry.
#[async_trait::async_trait]
pub trait Job: Send + Sync + 'static {
    fn key(&self) -> JobKey;

    async fn run(&self) -> JobOutcome;
}

// ---------------------------------------------------------------------------
// Retry policy
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(300),
        }
    }
}

impl RetryPolicy {
    /// Delay after the `failed_attempts`-th consecutive retry (1-based).
    pub fn delay_after(&self, failed_attempts: u32) -> Duration {
        let exp = failed_attempts.saturating_sub(1).min(31);
        self.initial_backoff
            .checked_mul(1u32 << exp)
            .map_or(self.max_backoff, |d| d.min(self.max_backoff))
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// What a finished run looked like.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobRunSummary {
    pub key: JobKey,
    pub attempts: u32,
    pub outcome: JobOutcome,
}

#[derive(Clone)]
pub struct Scheduler {
    in_flight: Arc<Mutex<HashSet<JobKey>>>,
    policy: RetryPolicy,
    network: Option<watch::Receiver<bool>>,
}

impl Scheduler {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            policy,
            network: None,
        }
    }

    /// Require `network` to read `true` before every attempt.
    pub fn with_network_constraint(mut self, network: watch::Receiver<bool>) -> Self {
        self.network = Some(network);
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn is_in_flight(&self, key: &JobKey) -> bool {
        lock_set(&self.in_flight).contains(key)
    }

    /// Start `job` unless an instance with the same key is already live.
    ///
    /// Returns `None` when the enqueue was deduplicated.
    pub fn enqueue<J: Job>(&self, job: J) -> Option<JoinHandle<JobRunSummary>> {
        let key = job.key();
        let marker = InFlightMarker::register(Arc::clone(&self.in_flight), key.clone())?;

        let policy = self.policy;
        let network = self.network.clone();
        Some(tokio::spawn(async move {
            let _marker = marker;
            run_with_retry(job, key, policy, network).await
        }))
    }
}

async fn run_with_retry<J: Job>(
    job: J,
    key: JobKey,
    policy: RetryPolicy,
    mut network: Option<watch::Receiver<bool>>,
) -> JobRunSummary {
    let mut attempts: u32 = 0;
    loop {
        if let Some(rx) = network.as_mut() {
            // A dropped sender leaves the last value in place; proceed rather
            // than park forever.
            let _ = rx.wait_for(|up| *up).await;
        }

        attempts = attempts.saturating_add(1);
        debug!(job = %key, attempt = attempts, "job attempt starting");
        let outcome = job.run().await;

        match outcome {
            JobOutcome::Retry => {
                let delay = policy.delay_after(attempts);
                info!(
                    job = %key,
                    attempt = attempts,
                    backoff_ms = delay.as_millis() as u64,
                    "job requested retry"
                );
                tokio::time::sleep(delay).await;
            }
            JobOutcome::Success | JobOutcome::Failure => {
                debug!(job = %key, attempts, %outcome, "job finished");
                return JobRunSummary {
                    key,
                    attempts,
                    outcome,
                };
            }
        }
    }
}

fn lock_set(set: &Mutex<HashSet<JobKey>>) -> std::sync::MutexGuard<'_, HashSet<JobKey>> {
    // The set holds plain keys; a poisoned lock leaves it usable.
    set.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct InFlightMarker {
    set: Arc<Mutex<HashSet<JobKey>>>,
    key: JobKey,
}

impl InFlightMarker {
    fn register(set: Arc<Mutex<HashSet<JobKey>>>, key: JobKey) -> Option<Self> {
        let inserted = lock_set(&set).insert(key.clone());
        if !inserted {
            debug!(job = %key, "job already in flight; enqueue dropped");
            return None;
        }
        Some(Self { set, key })
    }
}

impl Drop for InFlightMarker {
    fn drop(&mut self) {
        lock_set(&self.set).remove(&self.key);
    }
}
