use anyhow::{bail, Result};
use subrec_config::{load_layered_yaml, report_unused_keys, ConfigSurface, UnusedKeyPolicy};

pub fn config_hash(paths: &[String]) -> Result<()> {
    let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
    let loaded = load_layered_yaml(&path_refs)?;
    println!("config_hash={}", loaded.config_hash);
    println!("{}", loaded.canonical_json);
    Ok(())
}

pub fn config_check(surface: &str, fail: bool, paths: &[String]) -> Result<()> {
    let Some(surface) = ConfigSurface::parse(surface) else {
        bail!("invalid --surface '{surface}'. expected one of: DAEMON | CLI");
    };
    let policy = if fail {
        UnusedKeyPolicy::Fail
    } else {
        UnusedKeyPolicy::Warn
    };

    let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
    let loaded = load_layered_yaml(&path_refs)?;
    let report = report_unused_keys(surface, &loaded.config_json, policy)?;

    println!("surface={}", report.surface);
    println!("config_hash={}", loaded.config_hash);
    println!("unused_keys={}", report.unused_leaf_pointers.len());
    for p in &report.unused_leaf_pointers {
        println!("unused={p}");
    }
    Ok(())
}
