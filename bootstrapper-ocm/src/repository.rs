//! Access to the component repository.
//!
//! [`ComponentRepository`] is the seam between graph traversal and the tool
//! that actually talks to the registry. [`OcmCli`] drives the `ocm` executable.

use std::path::{Path, PathBuf};

use bootstrapper_core::{ComponentLocation, ComponentVersion, ToolCommand};
use serde::Deserialize;

use crate::error::ResolveError;

/// Fetches component version descriptors and resource contents.
pub trait ComponentRepository: Send + Sync {
    fn get_component_version(&self, location: &ComponentLocation) -> Result<ComponentVersion, ResolveError>;

    /// Materialize the directory tree of `resource` below `dest`.
    fn download_resource(
        &self,
        location: &ComponentLocation,
        resource: &str,
        dest: &Path,
    ) -> Result<(), ResolveError>;

    /// Every version of component `name` published in `repository`.
    fn list_component_versions(&self, repository: &str, name: &str) -> Result<Vec<String>, ResolveError>;
}

// ---------------------------------------------------------------------------
// ocm executable
// ---------------------------------------------------------------------------

/// [`ComponentRepository`] backed by the `ocm` command line tool.
#[derive(Debug, Clone)]
pub struct OcmCli {
    program: String,
    config: Option<PathBuf>,
}

impl OcmCli {
    /// `config` is forwarded to every invocation as `--config <path>`.
    pub fn new(config: Option<PathBuf>) -> Self {
        Self { program: "ocm".to_string(), config }
    }

    /// Use a different executable, e.g. an absolute path.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn command<I, S>(&self, args: I) -> ToolCommand
    where
        I: IntoIterator<Item = S>,
        S: Into<std::ffi::OsString>,
    {
        let cmd = ToolCommand::new(&self.program).args(args);
        match &self.config {
            Some(config) => cmd.arg("--config").arg(config),
            None => cmd,
        }
    }
}

impl ComponentRepository for OcmCli {
    fn get_component_version(&self, location: &ComponentLocation) -> Result<ComponentVersion, ResolveError> {
        let location = location.to_string();
        tracing::debug!("fetching component version {location}");
        let output = self
            .command(["get", "componentversion", "--output", "yaml", location.as_str()])
            .run_checked()
            .map_err(|source| ResolveError::Fetch { location: location.clone(), source })?;
        serde_yaml::from_str(&output.stdout).map_err(|source| ResolveError::Parse { location, source })
    }

    fn download_resource(
        &self,
        location: &ComponentLocation,
        resource: &str,
        dest: &Path,
    ) -> Result<(), ResolveError> {
        let loc = location.to_string();
        tracing::info!("downloading resource {resource} of {loc} to {}", dest.display());
        self.command(["download", "resources", loc.as_str(), resource, "--downloader", "ocm/dirtree", "--outfile"])
            .arg(dest)
            .run_checked()
            .map_err(|source| ResolveError::Download {
                location: loc,
                resource: resource.to_string(),
                dest: dest.to_path_buf(),
                source,
            })?;
        Ok(())
    }

    fn list_component_versions(&self, repository: &str, name: &str) -> Result<Vec<String>, ResolveError> {
        let location = format!("{repository}//{name}");
        let output = self
            .command(["get", "componentversions", "--output", "yaml", location.as_str()])
            .run_checked()
            .map_err(|source| ResolveError::List { location: location.clone(), source })?;
        parse_version_list(&output.stdout).map_err(|source| ResolveError::Parse { location, source })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum VersionListDocument {
    List { items: Vec<ComponentVersion> },
    Single(ComponentVersion),
}

/// Versions from either an `items:` list or a stream of descriptor documents.
fn parse_version_list(stdout: &str) -> Result<Vec<String>, serde_yaml::Error> {
    let mut versions = Vec::new();
    for document in serde_yaml::Deserializer::from_str(stdout) {
        let value = serde_yaml::Value::deserialize(document)?;
        if value.is_null() {
            continue;
        }
        match serde_yaml::from_value(value)? {
            VersionListDocument::List { items } => {
                versions.extend(items.into_iter().map(|cv| cv.component.version));
            }
            VersionListDocument::Single(cv) => versions.push(cv.component.version),
        }
    }
    Ok(versions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_list_accepts_items_document() {
        let yaml = "items:\n  - component: {name: a, version: v1}\n  - component: {name: a, version: v2}\n";
        assert_eq!(parse_version_list(yaml).expect("parse"), vec!["v1", "v2"]);
    }

    #[test]
    fn version_list_accepts_document_stream() {
        let yaml = "---\ncomponent: {name: a, version: v1}\n---\ncomponent: {name: a, version: v3}\n";
        assert_eq!(parse_version_list(yaml).expect("parse"), vec!["v1", "v3"]);
    }

    #[test]
    fn version_list_of_empty_output_is_empty() {
        assert!(parse_version_list("").expect("parse").is_empty());
    }

    #[test]
    fn ocm_config_is_appended() {
        let cli = OcmCli::new(Some(PathBuf::from("/etc/ocm.yaml")));
        let cmd = cli.command(["get", "componentversion"]);
        assert_eq!(cmd.display_args(), "get componentversion --config /etc/ocm.yaml");
        assert_eq!(OcmCli::new(None).command(["get"]).display_args(), "get");
    }
}
