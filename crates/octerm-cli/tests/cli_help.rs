use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

#[test]
fn test_help_shows_all_commands() {
    cargo_bin_cmd!("octerm")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("exec"))
        .stdout(predicate::str::contains("headless"))
        .stdout(predicate::str::contains("session"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_help_lists_override_flags() {
    cargo_bin_cmd!("octerm")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--session"))
        .stdout(predicate::str::contains("--hide-thinking"))
        .stdout(predicate::str::contains("--max-output-lines"));
}

#[test]
fn test_session_help_shows_subcommands() {
    cargo_bin_cmd!("octerm")
        .args(["session", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("resolve"));
}

#[test]
fn test_exec_requires_prompt() {
    cargo_bin_cmd!("octerm")
        .arg("exec")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--prompt"));
}

#[test]
fn test_invalid_mode_is_rejected() {
    cargo_bin_cmd!("octerm")
        .args(["--mode", "sideways", "config", "path"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid UI mode"));
}

#[test]
fn test_version_flag() {
    cargo_bin_cmd!("octerm")
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.1"));
}
