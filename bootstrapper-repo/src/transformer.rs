//! Rearranges the downloaded template resources into the repository layout.
//!
//! ```text
//! <target>/
//!   envs/<env>/fluxcd/            <- fluxcd   templates/overlays
//!   envs/<env>/openmcp/           <- openmcp  templates/overlays
//!   envs/<env>/kustomization.yaml
//!   envs/<env>/root-kustomization.yaml
//!   resources/fluxcd/             <- fluxcd   templates/resources
//!   resources/openmcp/            <- openmcp  templates/resources
//!   resources/kustomization.yaml
//!   resources/root-kustomization.yaml
//! ```

use std::fs;
use std::path::Path;

use bootstrapper_ocm::ComponentResolver;
use serde_json::json;

use crate::error::{io_err, RepoError};
use crate::kustomization::{write_yaml, Kustomization, FLUX_KUSTOMIZATION_API_VERSION, KUSTOMIZATION_KIND};
use crate::workspace::copy_dir;

pub const ENVS_DIR: &str = "envs";
pub const RESOURCES_DIR: &str = "resources";
pub const OPENMCP_DIR: &str = "openmcp";
pub const FLUXCD_DIR: &str = "fluxcd";
pub const CRDS_DIR: &str = "crds";
pub const EXTRA_MANIFESTS_DIR: &str = "extra";

const TEMPLATES_DIR: &str = "templates";
const OVERLAYS_DIR: &str = "overlays";
const ROOT_KUSTOMIZATION: &str = "root-kustomization.yaml";
pub(crate) const KUSTOMIZATION_FILE: &str = "kustomization.yaml";

/// Where the two template resources live in the component graph.
#[derive(Debug, Clone)]
pub struct TemplateTransformer<'a> {
    resolver: &'a ComponentResolver,
    fluxcd_template_path: &'a str,
    openmcp_template_path: &'a str,
}

impl<'a> TemplateTransformer<'a> {
    pub fn new(resolver: &'a ComponentResolver, fluxcd_template_path: &'a str, openmcp_template_path: &'a str) -> Self {
        Self { resolver, fluxcd_template_path, openmcp_template_path }
    }

    /// Download both template resources into `download_dir` and lay them out
    /// below `target_dir`, which is emptied first.
    pub fn transform(&self, env: &str, download_dir: &Path, target_dir: &Path) -> Result<(), RepoError> {
        if target_dir.exists() {
            fs::remove_dir_all(target_dir).map_err(|e| io_err(target_dir, e))?;
        }
        fs::create_dir_all(target_dir).map_err(|e| io_err(target_dir, e))?;

        tracing::info!("downloading template resources");
        let root = self.resolver.root();
        let fluxcd_download = download_dir.join(FLUXCD_DIR);
        tracing::debug!("downloading fluxcd template resource to {}", fluxcd_download.display());
        self.resolver.download_by_path(root, self.fluxcd_template_path, &fluxcd_download)?;

        let openmcp_download = download_dir.join(OPENMCP_DIR);
        tracing::debug!("downloading openmcp template resource to {}", openmcp_download.display());
        self.resolver.download_by_path(root, self.openmcp_template_path, &openmcp_download)?;

        tracing::info!("transforming templates into deployment repository structure");
        let env_dir = target_dir.join(ENVS_DIR).join(env);
        let resources_dir = target_dir.join(RESOURCES_DIR);
        for (download, name) in [(&fluxcd_download, FLUXCD_DIR), (&openmcp_download, OPENMCP_DIR)] {
            let templates = download.join(TEMPLATES_DIR);
            copy_dir(&templates.join(OVERLAYS_DIR), &env_dir.join(name))?;
            copy_dir(&templates.join(RESOURCES_DIR), &resources_dir.join(name))?;
        }

        write_env_documents(env, &env_dir)?;
        write_resources_documents(&resources_dir)?;
        Ok(())
    }
}

/// `envs/<env>/kustomization.yaml` and the patch pointing the root Flux
/// Kustomization at the environment.
fn write_env_documents(env: &str, env_dir: &Path) -> Result<(), RepoError> {
    let kustomization = Kustomization::new([format!("../../{RESOURCES_DIR}"), OPENMCP_DIR.to_string()], [ROOT_KUSTOMIZATION]);
    kustomization.save(&env_dir.join(KUSTOMIZATION_FILE))?;

    let patch = json!({
        "apiVersion": FLUX_KUSTOMIZATION_API_VERSION,
        "kind": KUSTOMIZATION_KIND,
        "metadata": {"name": "bootstrap", "namespace": "default"},
        "spec": {"path": format!("./{ENVS_DIR}/{env}")},
    });
    write_yaml(&env_dir.join(ROOT_KUSTOMIZATION), &patch)
}

/// `resources/kustomization.yaml` and the root Flux Kustomization it lists.
fn write_resources_documents(resources_dir: &Path) -> Result<(), RepoError> {
    Kustomization::new([ROOT_KUSTOMIZATION], Vec::<String>::new()).save(&resources_dir.join(KUSTOMIZATION_FILE))?;

    let root = json!({
        "apiVersion": FLUX_KUSTOMIZATION_API_VERSION,
        "kind": KUSTOMIZATION_KIND,
        "metadata": {"name": "bootstrap", "namespace": "default"},
        "spec": {
            "interval": "10m",
            "path": "<templated>",
            "prune": true,
            "sourceRef": {"kind": "GitRepository", "name": "environments", "namespace": "flux-system"},
            "dependsOn": [{"name": "flux-system", "namespace": "flux-system"}],
        },
    });
    write_yaml(&resources_dir.join(ROOT_KUSTOMIZATION), &root)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_documents_point_at_environment() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        write_env_documents("dev", dir.path()).expect("write");

        let k = Kustomization::load(&dir.path().join(KUSTOMIZATION_FILE)).expect("load");
        assert_eq!(k.resources, vec!["../../resources", "openmcp"]);
        assert_eq!(k.patches[0].path.as_deref(), Some(ROOT_KUSTOMIZATION));

        let patch: serde_yaml::Value =
            serde_yaml::from_str(&fs::read_to_string(dir.path().join(ROOT_KUSTOMIZATION)).expect("read"))
                .expect("yaml");
        assert_eq!(patch["spec"]["path"].as_str(), Some("./envs/dev"));
        assert_eq!(patch["apiVersion"].as_str(), Some("kustomize.toolkit.fluxcd.io/v1"));
    }

    #[test]
    fn root_kustomization_syncs_from_environments_repository() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        write_resources_documents(dir.path()).expect("write");

        let root: serde_yaml::Value =
            serde_yaml::from_str(&fs::read_to_string(dir.path().join(ROOT_KUSTOMIZATION)).expect("read"))
                .expect("yaml");
        assert_eq!(root["metadata"]["name"].as_str(), Some("bootstrap"));
        assert_eq!(root["spec"]["interval"].as_str(), Some("10m"));
        assert_eq!(root["spec"]["prune"].as_bool(), Some(true));
        assert_eq!(root["spec"]["sourceRef"]["name"].as_str(), Some("environments"));
        assert_eq!(root["spec"]["dependsOn"][0]["namespace"].as_str(), Some("flux-system"));

        let k = Kustomization::load(&dir.path().join(KUSTOMIZATION_FILE)).expect("load");
        assert_eq!(k.resources, vec![ROOT_KUSTOMIZATION]);
    }
}
