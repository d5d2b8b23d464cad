use std::fs;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn bootstrapper_cmd() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("bootstrapper"));
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_lists_manage_deployment_repo() {
    bootstrapper_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("manage-deployment-repo"))
        .stdout(contains("--log-level"));
}

#[test]
fn subcommand_help_lists_pipeline_flags() {
    bootstrapper_cmd()
        .args(["manage-deployment-repo", "--help"])
        .assert()
        .success()
        .stdout(contains("--git-config"))
        .stdout(contains("--dry-run"))
        .stdout(contains("--print-kustomized"))
        .stdout(contains("[default: apply templates]"));
}

#[test]
fn git_config_is_required() {
    let dir = TempDir::new().expect("tempdir");
    let config = dir.path().join("config.yaml");
    fs::write(&config, "environment: dev\n").expect("write config");

    bootstrapper_cmd()
        .arg("manage-deployment-repo")
        .arg(&config)
        .assert()
        .failure()
        .stderr(contains("--git-config"));
}

#[test]
fn missing_config_file_is_reported() {
    let dir = TempDir::new().expect("tempdir");
    let config = dir.path().join("missing.yaml");

    bootstrapper_cmd()
        .arg("manage-deployment-repo")
        .arg(&config)
        .args(["--git-config", "git.yaml"])
        .assert()
        .failure()
        .stderr(contains("invalid bootstrapper config"))
        .stderr(contains("missing.yaml"));
}

#[test]
fn validation_errors_are_all_reported() {
    let dir = TempDir::new().expect("tempdir");
    let config = dir.path().join("config.yaml");
    fs::write(&config, "component:\n  location: ghcr.io/openmcp//github.com/openmcp-project/openmcp:v0.1.0\n")
        .expect("write config");

    bootstrapper_cmd()
        .arg("manage-deployment-repo")
        .arg(&config)
        .args(["--git-config", "git.yaml", "--dry-run"])
        .assert()
        .failure()
        .stderr(contains("environment"))
        .stderr(contains("repository.url"))
        .stderr(contains("repository.branch"));
}
