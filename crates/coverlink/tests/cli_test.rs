//! Integration tests for the `coverlink` CLI binary.
//!
//! These run against temporary configuration files and simulated devices;
//! nothing touches the network or the user's real configuration.
#![allow(clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

const TWO_DEVICES: &str = r#"
[defaults]
settle_delay_ms = 0
retry_delay_ms = 0

[devices.guests]
friendly_name = "Cover guests"
host = "192.168.0.123"
device_id = "guestsdev"
local_key = "1234567891234567"

[[devices.guests.covers]]
id = 1
name = "cover_guests"
get_position = 3
set_position = 2
last_movement = 7

[devices.office]
host = "192.168.0.124"
device_id = "officedev"
local_key_env = "OFFICE_LOCAL_KEY"
protocol_version = "3.1"

[[devices.office.covers]]
id = 1
name = "office_blind"
"#;

/// Build a [`Command`] for the `coverlink` binary with env isolation.
///
/// Clears all `COVERLINK_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn coverlink_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("coverlink");
    cmd.env("HOME", "/tmp/coverlink-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/coverlink-cli-test-nonexistent")
        .env_remove("COVERLINK_CONFIG")
        .env_remove("COVERLINK_OUTPUT")
        .env_remove("RUST_LOG")
        .env_remove("OFFICE_LOCAL_KEY");
    cmd
}

fn write_config(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join("config.toml");
    std::fs::write(&path, contents).unwrap();
    path
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = coverlink_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_lists_commands() {
    coverlink_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("covers")
            .and(predicate::str::contains("simulate"))
            .and(predicate::str::contains("config")),
    );
}

#[test]
fn test_completions_zsh() {
    coverlink_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_honours_flag() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("custom.toml");
    coverlink_cmd()
        .args(["config", "path", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("custom.toml"));
}

#[test]
fn test_config_init_then_refuses_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    coverlink_cmd()
        .args(["config", "init", "--config"])
        .arg(&path)
        .assert()
        .success();
    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("GUESTS_LOCAL_KEY"), "{written}");

    let output = coverlink_cmd()
        .args(["config", "init", "--config"])
        .arg(&path)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(6));
    assert!(combined_output(&output).contains("--force"));

    coverlink_cmd()
        .args(["config", "init", "--force", "--config"])
        .arg(&path)
        .assert()
        .success();
}

#[test]
fn test_config_show_masks_local_key() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), TWO_DEVICES);

    for format in ["table", "json"] {
        coverlink_cmd()
            .args(["config", "show", "-o", format, "--config"])
            .arg(&path)
            .assert()
            .success()
            .stdout(
                predicate::str::contains("****")
                    .and(predicate::str::contains("1234567891234567").not()),
            );
    }
}

#[test]
fn test_zero_attempt_timeout_is_a_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        dir.path(),
        r#"
[defaults]
attempt_timeout_ms = 0

[devices.d]
host = "10.0.0.2"
device_id = "abc"

[[devices.d.covers]]
id = 1
name = "blind"
"#,
    );

    for args in [&["covers", "list"][..], &["simulate", "--ticks", "1"][..]] {
        let output = coverlink_cmd()
            .args(args)
            .arg("--config")
            .arg(&path)
            .output()
            .unwrap();
        assert_eq!(output.status.code(), Some(2));
        assert!(combined_output(&output).contains("attempt_timeout_ms"));
    }
}

#[test]
fn test_invalid_config_is_a_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        dir.path(),
        r#"
[devices.bad]
host = "10.0.0.9"
device_id = "bad"
protocol_version = "9.9"
"#,
    );

    let output = coverlink_cmd()
        .args(["covers", "list", "--config"])
        .arg(&path)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("protocol_version"));
}

// ── Covers ──────────────────────────────────────────────────────────

#[test]
fn test_covers_list_without_devices() {
    let dir = tempfile::tempdir().unwrap();
    let output = coverlink_cmd()
        .args(["covers", "list", "--config"])
        .arg(dir.path().join("absent.toml"))
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(combined_output(&output).contains("config init"));
}

#[test]
fn test_covers_list_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), TWO_DEVICES);

    let output = coverlink_cmd()
        .args(["covers", "list", "-o", "json", "--config"])
        .arg(&path)
        .output()
        .unwrap();
    assert!(output.status.success());

    let covers: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let covers = covers.as_array().unwrap();
    assert_eq!(covers.len(), 2);
    assert_eq!(covers[0]["unique_id"], "local_guestsdev_1");
    assert_eq!(covers[0]["friendly_name"], "Cover guests");
    assert_eq!(covers[1]["friendly_name"], "office");
    assert_eq!(covers[1]["protocol_version"], "3.1");
    assert_eq!(covers[0]["local_key"], "plaintext");
    assert_eq!(covers[1]["local_key"], "missing");
}

#[test]
fn test_covers_list_resolves_key_from_env() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), TWO_DEVICES);

    let output = coverlink_cmd()
        .env("OFFICE_LOCAL_KEY", "abcdefabcdefabcd")
        .args(["covers", "list", "-o", "json", "--device", "office", "--config"])
        .arg(&path)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));

    let covers: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(covers[0]["local_key"], "env");
    assert_eq!(covers[0]["address"], "192.168.0.124:6668");
    assert!(!combined_output(&output).contains("abcdefabcdefabcd"));
}

#[test]
fn test_covers_list_plain_filtered_by_device() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), TWO_DEVICES);

    coverlink_cmd()
        .args(["covers", "list", "-o", "plain", "--device", "office", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::eq("local_officedev_1\n"));
}

#[test]
fn test_covers_list_unknown_device() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), TWO_DEVICES);

    let output = coverlink_cmd()
        .args(["covers", "list", "--device", "garage", "--config"])
        .arg(&path)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
    assert!(combined_output(&output).contains("garage"));
}

// ── Simulate ────────────────────────────────────────────────────────

#[test]
fn test_simulate_open_reports_motion() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), TWO_DEVICES);

    let output = coverlink_cmd()
        .args([
            "simulate",
            "--device",
            "guests",
            "--open",
            "--ticks",
            "2",
            "--interval-ms",
            "1",
            "--staleness-ms",
            "0",
            "-o",
            "json",
            "--config",
        ])
        .arg(&path)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));

    let records: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let records = records.as_array().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["position"], 25);
    assert_eq!(records[0]["movement"], "opening");
    assert_eq!(records[0]["last_command"], "open");
    assert_eq!(records[1]["position"], 50);
    assert_eq!(records[1]["available"], true);
}

#[test]
fn test_simulate_rejects_out_of_range_position() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), TWO_DEVICES);

    let output = coverlink_cmd()
        .args(["simulate", "--position", "150", "--ticks", "1", "--config"])
        .arg(&path)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("between 0 and 100"));
}

#[test]
fn test_simulate_action_flags_conflict() {
    coverlink_cmd()
        .args(["simulate", "--open", "--close"])
        .assert()
        .failure()
        .code(2);
}
