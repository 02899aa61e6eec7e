//! Per-surface unused-key report.
//!
//! Each binary declares which JSON-pointer prefixes it reads. A configured
//! leaf outside every prefix is dead config: a typo, a renamed key, or a
//! daemon-only setting handed to the CLI.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::pointers::{covers, leaves};

/// Binaries that read the layered config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSurface {
    Daemon,
    Cli,
}

impl ConfigSurface {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigSurface::Daemon => "DAEMON",
            ConfigSurface::Cli => "CLI",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daemon" => Some(ConfigSurface::Daemon),
            "cli" => Some(ConfigSurface::Cli),
            _ => None,
        }
    }

    /// Pointer prefixes this surface reads. Must track the readers:
    /// - `ReconcilerSettings::from_config_json` reads /reconcile, /scheduler,
    ///   /features, /account, /state, /remote
    /// - the daemon binary reads /daemon/bind
    /// - the CLI reads /state/dir and /reconcile/categories only
    pub fn consumed_prefixes(&self) -> &'static [&'static str] {
        match self {
            ConfigSurface::Daemon => &[
                "/account",
                "/daemon",
                "/features",
                "/reconcile",
                "/remote",
                "/scheduler",
                "/state",
            ],
            ConfigSurface::Cli => &["/reconcile/categories", "/state/dir"],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnusedKeyReport {
    pub surface: String,
    /// Sorted pointers of configured leaves no reader consumes.
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

/// How many pointers a `Fail` error message lists before truncating.
const FAIL_PREVIEW: usize = 12;

/// Report leaves of `config_json` that `surface` never reads.
///
/// `Warn` always returns the report; `Fail` errors when it is not clean.
pub fn report_unused_keys(
    surface: ConfigSurface,
    config_json: &Value,
    policy: UnusedKeyPolicy,
) -> Result<UnusedKeyReport> {
    let consumed = surface.consumed_prefixes();

    let mut unused: Vec<String> = leaves(config_json)
        .into_iter()
        .map(|l| l.pointer)
        .filter(|p| !consumed.iter().any(|prefix| covers(prefix, p)))
        .collect();
    unused.sort();

    let report = UnusedKeyReport {
        surface: surface.as_str().to_string(),
        unused_leaf_pointers: unused,
    };

    if policy == UnusedKeyPolicy::Fail && !report.is_clean() {
        let preview: Vec<&str> = report
            .unused_leaf_pointers
            .iter()
            .take(FAIL_PREVIEW)
            .map(String::as_str)
            .collect();
        bail!(
            "CONFIG_UNUSED_KEYS (surface={}): {} unused key(s): {}",
            report.surface,
            report.unused_leaf_pointers.len(),
            preview.join(", ")
        );
    }

    Ok(report)
}
