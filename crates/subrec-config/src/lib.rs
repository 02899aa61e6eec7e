//! subrec-config
//!
//! Layered YAML configuration for the reconciler.
//!
//! - YAML layers overlay in order (later layers override earlier ones; empty
//!   layers and `null` values override nothing)
//! - The merged document is canonicalized to JSON and hashed (SHA-256) so a
//!   running daemon can log exactly which configuration it was started with
//! - Literal secrets are rejected; config carries env var NAMES only
//! - Typed settings are extracted with defaults by [`ReconcilerSettings`]

use anyhow::{Context, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};

mod guard;
mod layers;
mod pointers;
mod secrets;
mod settings;
mod surface;

pub use secrets::{resolve_secrets, ResolvedSecrets, DEFAULT_REMOTE_TOKEN_ENV};
pub use settings::{ReconcilerSettings, RemoteSettings, SchedulerSettings};
pub use surface::{report_unused_keys, ConfigSurface, UnusedKeyPolicy, UnusedKeyReport};

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// SHA-256 hex of `canonical_json`.
    pub config_hash: String,
    /// Key-sorted, whitespace-free JSON of the merged layers.
    pub canonical_json: String,
    pub config_json: Value,
}

/// Read and merge YAML files in the given order.
pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let docs = paths
        .iter()
        .map(|p| std::fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}")))
        .collect::<Result<Vec<String>>>()?;

    let doc_refs: Vec<&str> = docs.iter().map(String::as_str).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let merged = layers::merge_layers(yaml_docs)?;
    guard::reject_secret_literals(&merged)?;

    // serde_json::Map is BTreeMap-backed (no preserve_order feature), so keys
    // serialize sorted regardless of YAML source ordering.
    let canonical_json = serde_json::to_string(&merged).context("canonical json serialize failed")?;
    let config_hash = hex::encode(Sha256::digest(canonical_json.as_bytes()));

    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}
