//! Command handler modules for subrec-cli.
//!
//! Shared utilities used by multiple command paths live here.
//! Command-specific logic lives in the submodules.

pub mod config;
pub mod state;

use std::path::PathBuf;

use anyhow::{Context, Result};
use subrec_config::{
    load_layered_yaml, report_unused_keys, ConfigSurface, ReconcilerSettings, UnusedKeyPolicy,
};
use subrec_reconcile::SubscriberCategory;
use tracing::warn;

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Fully resolved inputs for the state-inspection commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub state_dir: PathBuf,
    pub categories: Vec<SubscriberCategory>,
}

/// Parse a CLI `--category` string.
pub fn parse_category(raw: &str) -> Result<SubscriberCategory> {
    SubscriberCategory::parse(raw).ok_or_else(|| {
        anyhow::anyhow!("invalid --category '{raw}'. expected one of: backup | donation")
    })
}

/// Merge flags over config over defaults.
pub fn resolve_target(
    state_dir: Option<PathBuf>,
    category: Option<&str>,
    config_paths: &[String],
) -> Result<ResolvedTarget> {
    let settings = if config_paths.is_empty() {
        ReconcilerSettings::default()
    } else {
        let refs: Vec<&str> = config_paths.iter().map(|s| s.as_str()).collect();
        let loaded = load_layered_yaml(&refs).context("load --config failed")?;
        let report = report_unused_keys(ConfigSurface::Cli, &loaded.config_json, UnusedKeyPolicy::Warn)?;
        if !report.is_clean() {
            warn!(unused = ?report.unused_leaf_pointers, "config keys ignored by the CLI");
        }
        loaded.settings()?
    };

    let categories = match category {
        Some(raw) => vec![parse_category(raw)?],
        None => settings.categories,
    };

    Ok(ResolvedTarget {
        state_dir: state_dir.unwrap_or(settings.state_dir),
        categories,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_flag_is_validated() {
        assert_eq!(parse_category("donation").unwrap(), SubscriberCategory::Donation);
        let err = parse_category("storage").unwrap_err().to_string();
        assert!(err.contains("backup | donation"), "{err}");
    }

    #[test]
    fn flags_override_defaults() {
        let t = resolve_target(Some(PathBuf::from("/tmp/x")), Some("donation"), &[]).unwrap();
        assert_eq!(t.state_dir, PathBuf::from("/tmp/x"));
        assert_eq!(t.categories, vec![SubscriberCategory::Donation]);

        let t = resolve_target(None, None, &[]).unwrap();
        assert_eq!(t.state_dir, PathBuf::from("./state"));
        assert_eq!(t.categories, vec![SubscriberCategory::Backup]);
    }
}
