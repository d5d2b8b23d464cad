//! Kustomization documents written into the deployment repository.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_yaml::Mapping;

use crate::error::{io_err, RepoError};

pub const KUSTOMIZATION_API_VERSION: &str = "kustomize.config.k8s.io/v1beta1";
pub const FLUX_KUSTOMIZATION_API_VERSION: &str = "kustomize.toolkit.fluxcd.io/v1";
pub const KUSTOMIZATION_KIND: &str = "Kustomization";

/// A `kustomization.yaml`. Fields other than `resources` and `patches` are
/// carried through unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Kustomization {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patches: Vec<Patch>,
    #[serde(flatten)]
    pub other: Mapping,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(flatten)]
    pub other: Mapping,
}

fn default_api_version() -> String {
    KUSTOMIZATION_API_VERSION.to_string()
}

fn default_kind() -> String {
    KUSTOMIZATION_KIND.to_string()
}

impl Kustomization {
    /// A document with the given resources and one file patch per entry in `patch_paths`.
    pub fn new<R, P>(resources: R, patch_paths: P) -> Self
    where
        R: IntoIterator,
        R::Item: Into<String>,
        P: IntoIterator,
        P::Item: Into<String>,
    {
        Self {
            api_version: default_api_version(),
            kind: default_kind(),
            resources: resources.into_iter().map(Into::into).collect(),
            patches: patch_paths
                .into_iter()
                .map(|p| Patch { path: Some(p.into()), other: Mapping::new() })
                .collect(),
            other: Mapping::new(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, RepoError> {
        let text = fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        serde_yaml::from_str(&text).map_err(|source| RepoError::Yaml { path: path.to_path_buf(), source })
    }

    pub fn save(&self, path: &Path) -> Result<(), RepoError> {
        write_yaml(path, self)
    }

    /// Append `resources` as they are. Entries already present are not
    /// deduplicated, so applying the same list twice lists everything twice.
    pub fn add_resources<I>(&mut self, resources: I)
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.resources.extend(resources.into_iter().map(Into::into));
    }
}

/// Serialize `value` as YAML into `path`, creating parent directories.
pub(crate) fn write_yaml<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), RepoError> {
    let text = serde_yaml::to_string(value).map_err(|source| RepoError::Serialize {
        what: path.display().to_string(),
        source,
    })?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    fs::write(path, text).map_err(|e| io_err(path, e))
}
