//! Argument-surface checks for the vaultsync binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

#[test]
fn fails_without_arguments() {
    Command::cargo_bin("vaultsync")
        .unwrap()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn fails_with_a_single_argument() {
    Command::cargo_bin("vaultsync")
        .unwrap()
        .arg("vault.kdbx")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn reports_unreadable_client_secret() {
    let temp = TempDir::new().unwrap();
    let local = temp.path().join("vault.kdbx");
    std::fs::write(&local, b"not empty").unwrap();

    Command::cargo_bin("vaultsync")
        .unwrap()
        .arg(&local)
        .arg(temp.path().join("missing_secret.json"))
        .assert()
        .failure()
        .stdout(predicate::str::contains("Unable to read client secret file"));
}

#[test]
fn prints_version() {
    Command::cargo_bin("vaultsync")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("vaultsync"));
}
