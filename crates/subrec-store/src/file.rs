//! JSON-file persistence under a state directory.
//!
//! Layout:
//! - `entitlement-<category>.json` -> `{ "tier": "PAID", "mismatch_detected": false }`
//! - `pending-payments.json`       -> `[ PendingPayment, ... ]`
//!
//! A missing file reads as defaults (`NONE` / `false`, no payments). Writes go
//! to a uniquely named, fsynced sibling temp file that is then renamed over
//! the target, so readers never observe a half-written document.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use subrec_reconcile::{EntitlementTier, PendingPayment, SubscriberCategory};
use subrec_runtime::{EntitlementStore, PaymentRegistry};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::latest_for;

pub const PAYMENTS_FILE: &str = "pending-payments.json";

pub fn entitlement_path(state_dir: &Path, category: SubscriberCategory) -> PathBuf {
    state_dir.join(format!("entitlement-{category}.json"))
}

pub fn payments_path(state_dir: &Path) -> PathBuf {
    state_dir.join(PAYMENTS_FILE)
}

// ---------------------------------------------------------------------------
// Entitlement store
// ---------------------------------------------------------------------------

/// On-disk shape of one category's entitlement state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitlementRecord {
    #[serde(default)]
    pub tier: EntitlementTier,
    #[serde(default)]
    pub mismatch_detected: bool,
}

/// Read a record; a missing file yields the default record.
pub async fn read_entitlement_record(path: &Path) -> Result<EntitlementRecord> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(EntitlementRecord::default())
        }
        Err(e) => {
            return Err(e).with_context(|| format!("read entitlement failed: {}", path.display()))
        }
    };
    serde_json::from_str(&raw)
        .with_context(|| format!("parse entitlement failed: {}", path.display()))
}

/// One category's entitlement state in its own JSON file.
///
/// Each setter is a read-modify-write of the whole record; an internal mutex
/// serializes those within the process.
#[derive(Debug)]
pub struct JsonFileEntitlementStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileEntitlementStore {
    pub fn new(state_dir: &Path, category: SubscriberCategory) -> Self {
        Self::at_path(entitlement_path(state_dir, category))
    }

    pub fn at_path(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn record(&self) -> Result<EntitlementRecord> {
        read_entitlement_record(&self.path).await
    }

    async fn update(&self, apply: impl FnOnce(&mut EntitlementRecord)) -> Result<()> {
        let _w = self.write_lock.lock().await;
        let mut rec = self.record().await?;
        apply(&mut rec);
        write_json_atomic(&self.path, &rec).await
    }
}

#[async_trait::async_trait]
impl EntitlementStore for JsonFileEntitlementStore {
    async fn tier(&self) -> Result<EntitlementTier> {
        Ok(self.record().await?.tier)
    }

    async fn set_tier(&self, tier: EntitlementTier) -> Result<()> {
        self.update(|r| r.tier = tier).await
    }

    async fn mismatch_flag(&self) -> Result<bool> {
        Ok(self.record().await?.mismatch_detected)
    }

    async fn set_mismatch_flag(&self, detected: bool) -> Result<()> {
        self.update(|r| r.mismatch_detected = detected).await
    }
}

// ---------------------------------------------------------------------------
// Payment registry
// ---------------------------------------------------------------------------

/// Read every payment record; a missing file yields an empty list.
pub async fn read_payments(path: &Path) -> Result<Vec<PendingPayment>> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(e).with_context(|| format!("read payments failed: {}", path.display()))
        }
    };
    serde_json::from_str(&raw).with_context(|| format!("parse payments failed: {}", path.display()))
}

/// Read-only view over `pending-payments.json`. The file is owned by the
/// payment-initiation flows and is re-read on every lookup.
#[derive(Clone, Debug)]
pub struct JsonFilePaymentRegistry {
    path: PathBuf,
}

impl JsonFilePaymentRegistry {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: payments_path(state_dir),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl PaymentRegistry for JsonFilePaymentRegistry {
    async fn latest(&self, category: SubscriberCategory) -> Result<Option<PendingPayment>> {
        let all = read_payments(&self.path).await?;
        Ok(latest_for(all.iter(), category))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Write `value` so readers see either the old document or the new one.
///
/// The document goes to a uniquely named hidden sibling (concurrent writers
/// from other processes never share a temp file), is fsynced, then renamed
/// over `path`. A failed rename removes the temp file. The directory is
/// fsynced last so the rename itself survives a crash.
async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let dir = match path.parent().filter(|d| !d.as_os_str().is_empty()) {
        Some(dir) => dir,
        None => Path::new("."),
    };
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("create state dir failed: {}", dir.display()))?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("state path has no file name: {}", path.display()))?;
    let tmp = dir.join(format!(".{file_name}.tmp.{}", Uuid::new_v4().simple()));

    let json = serde_json::to_string_pretty(value).context("serialize state failed")?;
    if let Err(err) = write_synced(&tmp, format!("{json}\n").as_bytes()).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(err).with_context(|| format!("write temp state failed: {}", tmp.display()));
    }

    if let Err(err) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(err).with_context(|| format!("replace state failed: {}", path.display()));
    }

    // Best effort: not every platform can open a directory for sync.
    if let Ok(d) = tokio::fs::File::open(dir).await {
        let _ = d.sync_all().await;
    }

    debug!(path = %path.display(), "state written");
    Ok(())
}

async fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut f = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    f.write_all(bytes).await?;
    f.sync_all().await
}
