//! Scenario: status and pending read persisted state without mutating it.
//!
//! # Invariants under test
//! 1. An empty state directory reports tier NONE and no mismatch.
//! 2. A persisted record is printed verbatim per category.
//! 3. `pending` prints the most recently updated record per category, or
//!    `pending=none` when the category has no records.
//! 4. Categories default to the configured list; `--category` narrows it.
//! 5. Neither command creates files in the state directory.

use assert_cmd::prelude::*;
use chrono::{Duration, TimeZone, Utc};
use predicates::prelude::*;
use std::process::Command;

fn subrec() -> Command {
    Command::cargo_bin("subrec").unwrap()
}

#[test]
fn empty_state_dir_reports_defaults_without_writing() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().to_string_lossy().to_string();

    subrec()
        .args(["status", "--state-dir", &state])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "category=backup tier=NONE mismatch_detected=false",
        ));

    subrec()
        .args(["pending", "--state-dir", &state])
        .assert()
        .success()
        .stdout(predicate::str::contains("category=backup pending=none"));

    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn status_prints_persisted_record_for_configured_categories() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("entitlement-backup.json"),
        r#"{"tier":"PAID","mismatch_detected":true}"#,
    )
    .unwrap();
    let cfg = dir.path().join("cfg.yaml");
    std::fs::write(
        &cfg,
        format!(
            "state:\n  dir: {}\nreconcile:\n  categories: [backup, donation]\n",
            dir.path().display()
        ),
    )
    .unwrap();

    subrec()
        .args(["status", "--config", &cfg.to_string_lossy()])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "category=backup tier=PAID mismatch_detected=true",
        ))
        .stdout(predicate::str::contains(
            "category=donation tier=NONE mismatch_detected=false",
        ));

    subrec()
        .args([
            "status",
            "--config",
            &cfg.to_string_lossy(),
            "--category",
            "donation",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("category=backup").not());
}

#[test]
fn pending_prints_latest_record_per_category() {
    let dir = tempfile::tempdir().unwrap();
    let t0 = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
    let payments = serde_json::json!([
        {
            "id": "00000000-0000-0000-0000-00000000000a",
            "category": "backup",
            "state": "COMPLETE",
            "updated_at": t0.to_rfc3339()
        },
        {
            "id": "00000000-0000-0000-0000-00000000000b",
            "category": "backup",
            "state": "REQUIRES_ACTION",
            "updated_at": (t0 + Duration::hours(2)).to_rfc3339()
        },
        {
            "id": "00000000-0000-0000-0000-00000000000c",
            "category": "donation",
            "state": "PENDING",
            "updated_at": (t0 - Duration::hours(1)).to_rfc3339()
        }
    ]);
    std::fs::write(
        dir.path().join("pending-payments.json"),
        payments.to_string(),
    )
    .unwrap();
    let state = dir.path().to_string_lossy().to_string();

    subrec()
        .args(["pending", "--state-dir", &state])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "category=backup id=00000000-0000-0000-0000-00000000000b state=REQUIRES_ACTION",
        ))
        .stdout(predicate::str::contains("state=COMPLETE").not());

    subrec()
        .args(["pending", "--state-dir", &state, "--category", "donation"])
        .assert()
        .success()
        .stdout(predicate::str::contains("state=PENDING"));
}

#[test]
fn unknown_category_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    subrec()
        .args([
            "status",
            "--state-dir",
            &dir.path().to_string_lossy(),
            "--category",
            "storage",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid --category"));
}
