//! Typed reconciler settings extracted from canonical config JSON.
//!
//! Every key is optional. Absent keys take the defaults below; present keys
//! with the wrong type or out-of-range values are rejected so a typo never
//! silently falls back to a default.
//!
//! | Pointer                                | Default   |
//! |----------------------------------------|-----------|
//! | /reconcile/purchase_window_days        | 31        |
//! | /reconcile/lock_timeout_ms             | 30000     |
//! | /reconcile/categories                  | [backup]  |
//! | /scheduler/retry_initial_backoff_ms    | 1000      |
//! | /scheduler/retry_max_backoff_ms        | 300000    |
//! | /scheduler/periodic_interval_secs      | 86400 (0 disables, max 30 days) |
//! | /features/remote_backups_enabled       | false     |
//! | /account/registered                    | false     |
//! | /account/backups_enabled               | false     |
//! | /state/dir                             | ./state   |
//! | /remote/base_url                       | (none)    |
//! | /remote/auth_token_env                 | SUBREC_REMOTE_TOKEN |
//! | /daemon/bind                           | (none)    |

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use serde_json::Value;
use subrec_reconcile::{
    AccountGateInputs, PurchaseWindow, SubscriberCategory, DEFAULT_PURCHASE_WINDOW_DAYS,
};

use crate::{LoadedConfig, DEFAULT_REMOTE_TOKEN_ENV};

const MAX_PURCHASE_WINDOW_DAYS: u64 = 366;
/// Thirty days. Longer cadences belong to an external cron, not this loop.
const MAX_PERIODIC_INTERVAL_SECS: u64 = 30 * 86_400;

/// Retry and trigger cadence for the scheduler harness.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchedulerSettings {
    pub retry_initial_backoff: Duration,
    /// Cap on the delay between attempts. Attempts themselves are unlimited.
    pub retry_max_backoff: Duration,
    /// `None` disables the periodic trigger.
    pub periodic_interval: Option<Duration>,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            retry_initial_backoff: Duration::from_millis(1_000),
            retry_max_backoff: Duration::from_millis(300_000),
            periodic_interval: Some(Duration::from_secs(86_400)),
        }
    }
}

/// Remote subscription server endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteSettings {
    pub base_url: String,
    /// NAME of the env var holding the bearer token.
    pub auth_token_env: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconcilerSettings {
    pub purchase_window: PurchaseWindow,
    pub lock_timeout: Duration,
    pub categories: Vec<SubscriberCategory>,
    pub scheduler: SchedulerSettings,
    /// Gate values the daemon boots with; updated at runtime afterwards.
    pub initial_gates: AccountGateInputs,
    pub state_dir: PathBuf,
    pub remote: Option<RemoteSettings>,
    pub daemon_bind: Option<String>,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            purchase_window: PurchaseWindow::default(),
            lock_timeout: Duration::from_millis(30_000),
            categories: vec![SubscriberCategory::Backup],
            scheduler: SchedulerSettings::default(),
            initial_gates: AccountGateInputs {
                registered: false,
                remote_feature_enabled: false,
                local_feature_enabled: false,
            },
            state_dir: PathBuf::from("./state"),
            remote: None,
            daemon_bind: None,
        }
    }
}

impl ReconcilerSettings {
    /// Build from canonical config JSON (produced by [`crate::load_layered_yaml`]).
    pub fn from_config_json(cfg: &Value) -> Result<Self> {
        let d = Self::default();

        let window_days = read_u64(
            cfg,
            "/reconcile/purchase_window_days",
            u64::from(DEFAULT_PURCHASE_WINDOW_DAYS),
        )?;
        if !(1..=MAX_PURCHASE_WINDOW_DAYS).contains(&window_days) {
            bail!(
                "reconcile.purchase_window_days out of bounds (1..={MAX_PURCHASE_WINDOW_DAYS}): {window_days}"
            );
        }

        let lock_timeout_ms = read_u64(cfg, "/reconcile/lock_timeout_ms", 30_000)?;
        if lock_timeout_ms == 0 {
            bail!("reconcile.lock_timeout_ms must be > 0");
        }

        let categories = read_categories(cfg)?.unwrap_or(d.categories);

        let initial_ms = read_u64(cfg, "/scheduler/retry_initial_backoff_ms", 1_000)?;
        let max_ms = read_u64(cfg, "/scheduler/retry_max_backoff_ms", 300_000)?;
        if initial_ms == 0 {
            bail!("scheduler.retry_initial_backoff_ms must be > 0");
        }
        if max_ms < initial_ms {
            bail!(
                "scheduler.retry_max_backoff_ms ({max_ms}) must be >= retry_initial_backoff_ms ({initial_ms})"
            );
        }
        let periodic_secs = read_u64(cfg, "/scheduler/periodic_interval_secs", 86_400)?;
        if periodic_secs > MAX_PERIODIC_INTERVAL_SECS {
            bail!(
                "scheduler.periodic_interval_secs out of bounds (0..={MAX_PERIODIC_INTERVAL_SECS}, 0 disables): {periodic_secs}"
            );
        }

        let initial_gates = AccountGateInputs {
            registered: read_bool(cfg, "/account/registered", false)?,
            remote_feature_enabled: read_bool(cfg, "/features/remote_backups_enabled", false)?,
            local_feature_enabled: read_bool(cfg, "/account/backups_enabled", false)?,
        };

        let state_dir = read_str(cfg, "/state/dir")?
            .map(PathBuf::from)
            .unwrap_or(d.state_dir);

        let remote = match read_str(cfg, "/remote/base_url")? {
            Some(base_url) => Some(RemoteSettings {
                base_url,
                auth_token_env: read_str(cfg, "/remote/auth_token_env")?
                    .unwrap_or_else(|| DEFAULT_REMOTE_TOKEN_ENV.to_string()),
            }),
            None => None,
        };

        Ok(Self {
            purchase_window: PurchaseWindow::days(window_days as u32),
            lock_timeout: Duration::from_millis(lock_timeout_ms),
            categories,
            scheduler: SchedulerSettings {
                retry_initial_backoff: Duration::from_millis(initial_ms),
                retry_max_backoff: Duration::from_millis(max_ms),
                periodic_interval: (periodic_secs > 0).then_some(Duration::from_secs(periodic_secs)),
            },
            initial_gates,
            state_dir,
            remote,
            daemon_bind: read_str(cfg, "/daemon/bind")?,
        })
    }
}

impl LoadedConfig {
    pub fn settings(&self) -> Result<ReconcilerSettings> {
        ReconcilerSettings::from_config_json(&self.config_json)
    }
}

fn read_u64(cfg: &Value, pointer: &str, default: u64) -> Result<u64> {
    match cfg.pointer(pointer) {
        None | Some(Value::Null) => Ok(default),
        Some(v) => v
            .as_u64()
            .ok_or_else(|| anyhow!("config {pointer} must be a non-negative integer (got {v})")),
    }
}

fn read_bool(cfg: &Value, pointer: &str, default: bool) -> Result<bool> {
    match cfg.pointer(pointer) {
        None | Some(Value::Null) => Ok(default),
        Some(v) => v
            .as_bool()
            .ok_or_else(|| anyhow!("config {pointer} must be a boolean (got {v})")),
    }
}

fn read_str(cfg: &Value, pointer: &str) -> Result<Option<String>> {
    match cfg.pointer(pointer) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
        Some(v) => bail!("config {pointer} must be a string (got {v})"),
    }
}

fn read_categories(cfg: &Value) -> Result<Option<Vec<SubscriberCategory>>> {
    let v = match cfg.pointer("/reconcile/categories") {
        None | Some(Value::Null) => return Ok(None),
        Some(v) => v,
    };
    let arr = v
        .as_array()
        .ok_or_else(|| anyhow!("config /reconcile/categories must be a list"))?;

    let mut out: Vec<SubscriberCategory> = Vec::new();
    for item in arr {
        let raw = item
            .as_str()
            .ok_or_else(|| anyhow!("config /reconcile/categories entries must be strings"))?;
        let c = SubscriberCategory::parse(raw).ok_or_else(|| {
            anyhow!("unknown category '{raw}' in reconcile.categories. expected: backup | donation")
        })?;
        if !out.contains(&c) {
            out.push(c);
        }
    }
    if out.is_empty() {
        bail!("reconcile.categories must name at least one category");
    }
    Ok(Some(out))
}
