//! Deployment configuration: load, defaults, validation.
//!
//! # File shape
//!
//! ```yaml
//! component:
//!   location: ghcr.io/openmcp//github.com/openmcp-project/openmcp:v0.1.0
//! repository:
//!   url: https://github.com/acme/deployment
//!   branch: dev
//! environment: dev
//! providers:
//!   clusterProviders:
//!     - name: kind
//!       config: { ... }
//! imagePullSecrets: [pull-secret]
//! openmcpOperator:
//!   config: { ... }
//! templateInput: { ... }
//! ```
//!
//! Opaque configs are held as a [`RawConfig`]: the YAML node as written plus
//! its decoded mapping, which is produced exactly once by [`BootstrapperConfig::validate`].

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{io_err, ConfigError, FieldError, FieldErrors};

pub const DEFAULT_FLUXCD_TEMPLATE_RESOURCE_PATH: &str = "gitops-templates/fluxcd";
pub const DEFAULT_OPENMCP_OPERATOR_TEMPLATE_RESOURCE_PATH: &str = "gitops-templates/openmcp";

// ---------------------------------------------------------------------------
// 1. Raw provider-defined configuration
// ---------------------------------------------------------------------------

/// An opaque configuration node plus its validated decoded view.
///
/// The node may be written inline as a mapping or as a string holding YAML.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Option<serde_yaml::Value>", into = "Option<serde_yaml::Value>")]
pub struct RawConfig {
    raw: Option<serde_yaml::Value>,
    decoded: Option<Map<String, Value>>,
}

impl From<Option<serde_yaml::Value>> for RawConfig {
    fn from(raw: Option<serde_yaml::Value>) -> Self {
        let raw = raw.filter(|v| !v.is_null());
        Self { raw, decoded: None }
    }
}

impl From<RawConfig> for Option<serde_yaml::Value> {
    fn from(c: RawConfig) -> Self {
        c.raw
    }
}

impl RawConfig {
    pub fn is_present(&self) -> bool {
        self.raw.is_some()
    }

    pub fn raw(&self) -> Option<&serde_yaml::Value> {
        self.raw.as_ref()
    }

    /// The decoded mapping; empty when the config is absent.
    pub fn decoded(&self) -> Map<String, Value> {
        self.decoded.clone().unwrap_or_default()
    }

    fn decode(&mut self) -> Result<(), String> {
        let Some(raw) = &self.raw else {
            return Ok(());
        };
        let node = match raw {
            serde_yaml::Value::String(text) => {
                serde_yaml::from_str::<serde_yaml::Value>(text).map_err(|e| e.to_string())?
            }
            other => other.clone(),
        };
        match serde_json::to_value(&node).map_err(|e| e.to_string())? {
            Value::Object(map) => {
                self.decoded = Some(map);
                Ok(())
            }
            Value::Null => {
                self.decoded = Some(Map::new());
                Ok(())
            }
            _ => Err("expected a mapping".to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// 2. Document types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapperConfig {
    #[serde(default)]
    pub component: ComponentConfig,
    #[serde(default)]
    pub repository: DeploymentRepository,
    #[serde(default)]
    pub providers: Providers,
    #[serde(default)]
    pub image_pull_secrets: Vec<String>,
    #[serde(default)]
    pub openmcp_operator: OperatorConfig,
    #[serde(default)]
    pub environment: String,
    #[serde(default)]
    pub template_input: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentConfig {
    /// Root component location, `<repo>//<name>:<version>`.
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub openmcp_operator_template_resource_path: String,
    #[serde(default)]
    pub fluxcd_template_resource_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRepository {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub branch: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Providers {
    #[serde(default)]
    pub cluster_providers: Vec<Provider>,
    #[serde(default)]
    pub service_providers: Vec<Provider>,
    #[serde(default)]
    pub platform_services: Vec<Provider>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub config: RawConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperatorConfig {
    #[serde(default)]
    pub config: RawConfig,
}

// ---------------------------------------------------------------------------
// 3. Load / defaults / validate
// ---------------------------------------------------------------------------

impl BootstrapperConfig {
    /// Read `path`, apply defaults and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        let mut config: Self = serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.set_defaults();
        config.validate()?;
        Ok(config)
    }

    pub fn set_defaults(&mut self) {
        if self.component.fluxcd_template_resource_path.is_empty() {
            self.component.fluxcd_template_resource_path =
                DEFAULT_FLUXCD_TEMPLATE_RESOURCE_PATH.to_string();
        }
        if self.component.openmcp_operator_template_resource_path.is_empty() {
            self.component.openmcp_operator_template_resource_path =
                DEFAULT_OPENMCP_OPERATOR_TEMPLATE_RESOURCE_PATH.to_string();
        }
    }

    /// Check required fields and decode every raw config.
    ///
    /// All problems are collected before returning.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        let mut errs = FieldErrors::default();

        if self.environment.is_empty() {
            errs.push(FieldError::required("environment", "environment is required"));
        }
        if self.component.location.is_empty() {
            errs.push(FieldError::required("component.location", "component location is required"));
        }
        if self.repository.url.is_empty() {
            errs.push(FieldError::required("repository.url", "repository url is required"));
        }
        if self.repository.branch.is_empty() {
            errs.push(FieldError::required("repository.branch", "repository branch is required"));
        }

        if !self.openmcp_operator.config.is_present() {
            errs.push(FieldError::required(
                "openmcpOperator.config",
                "openmcp operator config is required",
            ));
        } else if let Err(e) = self.openmcp_operator.config.decode() {
            errs.push(FieldError::invalid(
                "openmcpOperator.config",
                format!("openmcp operator config is not valid yaml: {e}"),
            ));
        }

        let groups = [
            ("providers.clusterProviders", "cluster provider", &mut self.providers.cluster_providers),
            ("providers.serviceProviders", "service provider", &mut self.providers.service_providers),
            ("providers.platformServices", "platform service", &mut self.providers.platform_services),
        ];
        for (path, label, providers) in groups {
            for (i, provider) in providers.iter_mut().enumerate() {
                if provider.name.is_empty() {
                    errs.push(FieldError::required(
                        format!("{path}[{i}].name"),
                        format!("{label} name is required"),
                    ));
                }
                if let Err(e) = provider.config.decode() {
                    errs.push(FieldError::invalid(
                        format!("{path}[{i}].config"),
                        format!("{label} config is not valid yaml: {e}"),
                    ));
                }
            }
        }

        if errs.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errs))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
component:
  location: ghcr.io/openmcp//github.com/openmcp-project/openmcp:v0.1.0
repository:
  url: https://github.com/acme/deployment
  branch: dev
environment: dev
providers:
  clusterProviders:
    - name: kind
      config:
        verbosity: debug
  serviceProviders:
    - name: landscaper
imagePullSecrets: [pull-secret]
openmcpOperator:
  config:
    managedControlPlane:
      mcpClusterPurpose: mcp
templateInput:
  domain: example.org
"#;

    fn parse(yaml: &str) -> BootstrapperConfig {
        serde_yaml::from_str(yaml).expect("deserialize")
    }

    #[test]
    fn valid_config_decodes_raw_configs() {
        let mut config = parse(VALID);
        config.set_defaults();
        config.validate().expect("valid");

        let operator = config.openmcp_operator.config.decoded();
        assert!(operator.contains_key("managedControlPlane"));

        let kind = &config.providers.cluster_providers[0];
        assert_eq!(kind.config.decoded()["verbosity"], "debug");

        let landscaper = &config.providers.service_providers[0];
        assert!(!landscaper.config.is_present());
        assert!(landscaper.config.decoded().is_empty());

        assert_eq!(config.template_input["domain"], "example.org");
    }

    #[test]
    fn defaults_fill_template_resource_paths() {
        let mut config = parse(VALID);
        config.set_defaults();
        assert_eq!(config.component.fluxcd_template_resource_path, "gitops-templates/fluxcd");
        assert_eq!(
            config.component.openmcp_operator_template_resource_path,
            "gitops-templates/openmcp"
        );
    }

    #[test]
    fn defaults_keep_explicit_paths() {
        let mut config = parse(VALID);
        config.component.fluxcd_template_resource_path = "custom/flux".into();
        config.set_defaults();
        assert_eq!(config.component.fluxcd_template_resource_path, "custom/flux");
    }

    #[test]
    fn string_config_is_parsed_as_yaml() {
        let mut config = parse(VALID);
        config.openmcp_operator.config =
            RawConfig::from(Some(serde_yaml::Value::String("a: 1\nb: [x]\n".into())));
        config.validate().expect("valid");
        let decoded = config.openmcp_operator.config.decoded();
        assert_eq!(decoded["a"], 1);
        assert_eq!(decoded["b"][0], "x");
    }

    #[test]
    fn empty_document_reports_every_required_field() {
        let mut config = parse("{}");
        let errs = match config.validate().unwrap_err() {
            ConfigError::Invalid(errs) => errs,
            other => panic!("expected Invalid, got {other}"),
        };
        let paths: Vec<&str> = errs.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "environment",
                "component.location",
                "repository.url",
                "repository.branch",
                "openmcpOperator.config",
            ]
        );
    }

    #[test]
    fn non_mapping_config_is_invalid() {
        let mut config = parse(VALID);
        config.providers.cluster_providers[0].config =
            RawConfig::from(Some(serde_yaml::Value::String("- just\n- a list\n".into())));
        config.providers.service_providers[0].name.clear();

        let err = config.validate().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("providers.clusterProviders[0].config"), "got: {msg}");
        assert!(msg.contains("providers.serviceProviders[0].name"), "got: {msg}");
    }

    #[test]
    fn load_reports_path_on_parse_error() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "component: [unclosed").expect("write");
        let err = BootstrapperConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
        assert!(err.to_string().contains("config.yaml"));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let err = BootstrapperConfig::load(&dir.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }), "got: {err}");
    }
}
