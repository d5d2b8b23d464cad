//! Custom resource definitions shipped alongside the operator and providers.
//!
//! Every component may carry a `<short-name>-crds` directory resource. All of
//! them are downloaded into one directory, then only the definitions labelled
//! for the platform cluster are kept.

use std::fs;
use std::path::Path;

use bootstrapper_core::ComponentVersion;
use bootstrapper_ocm::ComponentResolver;

use crate::error::{io_err, RepoError};

pub const CLUSTER_LABEL: &str = "openmcp.cloud/cluster";
pub const PLATFORM_CLUSTER: &str = "platform";

/// `acme.org/openmcp-operator` -> `openmcp-operator-crds`.
pub fn crd_resource_name(cv: &ComponentVersion) -> Result<String, RepoError> {
    match cv.name().rsplit_once('/') {
        Some((_, short)) => Ok(format!("{short}-crds")),
        None => Err(RepoError::InvalidComponentName(cv.name().to_string())),
    }
}

/// Download the CRD resource of `cv` into `dir`.
pub fn download_crds(resolver: &ComponentResolver, cv: &ComponentVersion, dir: &Path) -> Result<(), RepoError> {
    let resource = crd_resource_name(cv)?;
    tracing::debug!("downloading CRDs of {} from resource {resource} to {}", cv.name(), dir.display());
    resolver.download_resource(cv, &resource, dir)?;
    Ok(())
}

/// Whether `manifest` carries `openmcp.cloud/cluster: platform`.
pub fn is_for_platform_cluster(manifest: &serde_yaml::Value) -> bool {
    manifest
        .get("metadata")
        .and_then(|m| m.get("labels"))
        .and_then(|l| l.get(CLUSTER_LABEL))
        .and_then(|v| v.as_str())
        == Some(PLATFORM_CLUSTER)
}

/// Delete every top-level manifest in `dir` not meant for the platform
/// cluster. Returns the names of the files that remain.
pub fn retain_platform_crds(dir: &Path) -> Result<Vec<String>, RepoError> {
    let mut kept = Vec::new();
    for name in manifest_files(dir)? {
        let path = dir.join(&name);
        let text = fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        let manifest: serde_yaml::Value =
            serde_yaml::from_str(&text).map_err(|source| RepoError::Yaml { path: path.clone(), source })?;
        if is_for_platform_cluster(&manifest) {
            tracing::trace!("keeping CRD file {}", path.display());
            kept.push(name);
        } else {
            tracing::trace!("removing CRD file {} as it is not for the platform cluster", path.display());
            fs::remove_file(&path).map_err(|e| io_err(&path, e))?;
        }
    }
    Ok(kept)
}

/// Names of the `.yaml`/`.yml` files directly inside `dir`, sorted.
pub(crate) fn manifest_files(dir: &Path) -> Result<Vec<String>, RepoError> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| io_err(dir, e))? {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let file_type = entry.file_type().map_err(|e| io_err(entry.path(), e))?;
        if file_type.is_dir() {
            continue;
        }
        let path = entry.path();
        let is_yaml = matches!(path.extension().and_then(|e| e.to_str()), Some("yaml" | "yml"));
        if is_yaml {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}
