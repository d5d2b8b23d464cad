//! Loading the deployment config and git credentials from disk.

use assert_fs::prelude::*;
use bootstrapper_core::{BootstrapperConfig, ConfigError, GitCredentials};
use predicates::prelude::predicate;

// ---------------------------------------------------------------------------
// 1. Deployment config
// ---------------------------------------------------------------------------

const CONFIG: &str = r#"
component:
  location: ghcr.io/openmcp//github.com/openmcp-project/openmcp:v0.1.0
repository:
  url: https://github.com/acme/deployment
  branch: dev
environment: dev
providers:
  clusterProviders:
    - name: kind
      config: |
        verbosity: debug
openmcpOperator:
  config:
    managedControlPlane:
      mcpClusterPurpose: mcp
"#;

#[test]
fn load_applies_defaults_and_decodes_string_config() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("config.yaml");
    file.write_str(CONFIG).expect("write");
    file.assert(predicate::path::is_file());

    let config = BootstrapperConfig::load(file.path()).expect("load");
    assert_eq!(config.component.fluxcd_template_resource_path, "gitops-templates/fluxcd");
    assert_eq!(config.component.openmcp_operator_template_resource_path, "gitops-templates/openmcp");

    let kind = config.providers.cluster_providers[0].config.decoded();
    assert_eq!(kind.get("verbosity").and_then(|v| v.as_str()), Some("debug"));
}

#[test]
fn load_missing_file_reports_path() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let missing = dir.child("nope.yaml");
    let err = BootstrapperConfig::load(missing.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }), "got: {err}");
    assert!(err.to_string().contains("nope.yaml"));
}

#[test]
fn load_corrupt_yaml_returns_parse_error_with_path() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("config.yaml");
    file.write_str(": : corrupt : yaml : !!!\n  - broken: [unclosed").expect("write");

    let err = BootstrapperConfig::load(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("config.yaml"));
}

#[test]
fn load_collects_every_missing_field() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("config.yaml");
    file.write_str("imagePullSecrets: []\n").expect("write");

    let err = BootstrapperConfig::load(file.path()).unwrap_err();
    let errs = match err {
        ConfigError::Invalid(errs) => errs,
        other => panic!("expected Invalid, got {other}"),
    };
    let paths: Vec<&str> = errs.iter().map(|e| e.path.as_str()).collect();
    for expected in [
        "environment",
        "component.location",
        "repository.url",
        "repository.branch",
        "openmcpOperator.config",
    ] {
        assert!(paths.contains(&expected), "missing {expected} in {paths:?}");
    }
}

// ---------------------------------------------------------------------------
// 2. Git credentials
// ---------------------------------------------------------------------------

#[test]
fn credentials_with_two_methods_fail_to_load() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("git.yaml");
    file.write_str("auth:\n  bearerToken:\n    token: t\n  sshPrivateKey:\n    privateKey: YQ==\n")
        .expect("write");

    let err = GitCredentials::load(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::MultipleAuthMethods), "got: {err}");
}

#[test]
fn credentials_with_basic_auth_load() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("git.yaml");
    file.write_str("auth:\n  basic:\n    username: bot\n    password: pw\n").expect("write");

    GitCredentials::load(file.path()).expect("load");
}
