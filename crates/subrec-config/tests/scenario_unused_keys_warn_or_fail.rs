use subrec_config::{
    load_layered_yaml_from_strings, report_unused_keys, ConfigSurface, UnusedKeyPolicy,
};

/// scenario_unused_keys_warn_or_fail
///
/// Validates:
/// 1) Unused keys are detected in WARN policy but do not error.
/// 2) Unused keys cause failure in FAIL policy.
/// 3) Keys under consumed prefixes are not flagged.
/// 4) The CLI surface consumes far less than the daemon.
/// 5) Deterministic ordering of unused pointers.

const DAEMON_YAML: &str = r#"
reconcile:
  purchase_window_days: 31
scheduler:
  retry_initial_backoff_ms: 1000
account:
  registered: true
daemon:
  bind: "127.0.0.1:8898"
"#;

#[test]
fn warn_policy_reports_unused_keys_without_error() {
    let yaml = r#"
reconcile:
  purchase_window_days: 31
legacy:
  monthly_grace_days: 3
  retry_forever: true
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();

    let report = report_unused_keys(
        ConfigSurface::Daemon,
        &loaded.config_json,
        UnusedKeyPolicy::Warn,
    )
    .expect("warn policy must not error");

    assert!(!report.is_clean());
    assert_eq!(report.surface, "DAEMON");
    assert_eq!(
        report.unused_leaf_pointers,
        vec![
            "/legacy/monthly_grace_days".to_string(),
            "/legacy/retry_forever".to_string()
        ]
    );
}

#[test]
fn fail_policy_errors_on_unused_keys() {
    let yaml = r#"
reconcile:
  purchase_window_days: 31
billing:
  provider: "play"
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();

    let result = report_unused_keys(
        ConfigSurface::Daemon,
        &loaded.config_json,
        UnusedKeyPolicy::Fail,
    );
    let msg = format!("{:?}", result.expect_err("fail policy must error"));
    assert!(msg.contains("CONFIG_UNUSED_KEYS"), "{msg}");
    assert!(msg.contains("/billing/provider"), "{msg}");
}

#[test]
fn daemon_surface_consumes_all_known_sections() {
    let loaded = load_layered_yaml_from_strings(&[DAEMON_YAML]).unwrap();
    let report = report_unused_keys(
        ConfigSurface::Daemon,
        &loaded.config_json,
        UnusedKeyPolicy::Fail,
    )
    .expect("daemon config should be fully consumed");
    assert!(report.is_clean());
}

#[test]
fn cli_surface_flags_daemon_only_keys() {
    let loaded = load_layered_yaml_from_strings(&[DAEMON_YAML]).unwrap();
    let report = report_unused_keys(
        ConfigSurface::Cli,
        &loaded.config_json,
        UnusedKeyPolicy::Warn,
    )
    .unwrap();

    assert_eq!(
        report.unused_leaf_pointers,
        vec![
            "/account/registered".to_string(),
            "/daemon/bind".to_string(),
            "/reconcile/purchase_window_days".to_string(),
            "/scheduler/retry_initial_backoff_ms".to_string(),
        ]
    );
}
