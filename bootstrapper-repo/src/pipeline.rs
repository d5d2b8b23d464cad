//! Phase runner shared by the CLI and the integration tests.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use bootstrapper_core::BootstrapperConfig;
use bootstrapper_ocm::{ComponentRepository, OcmCli};

use crate::cluster::{to_yaml_stream, ClusterClient, KubectlClient};
use crate::error::{in_phase, Phase, RepoError};
use crate::manager::DeploymentRepoManager;
use crate::overlay::{KustomizeCli, OverlayBuilder};

pub const DEFAULT_COMMIT_MESSAGE: &str = "apply templates";

/// Inputs of a run that do not come from the deployment config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOptions {
    pub git_credentials: PathBuf,
    pub ocm_config: Option<PathBuf>,
    pub kubeconfig: Option<PathBuf>,
    pub extra_manifest_dir: Option<PathBuf>,
    pub kustomization_patches: Option<PathBuf>,
    pub disable_git_push: bool,
    pub disable_kustomization_apply: bool,
    /// Implies both disables.
    pub dry_run: bool,
    pub print_kustomized: bool,
    pub commit_message: String,
    /// Apply every built object instead of only the sync-controller Kustomizations.
    pub apply_all_manifests: bool,
}

impl PipelineOptions {
    pub fn new(git_credentials: impl Into<PathBuf>) -> Self {
        Self {
            git_credentials: git_credentials.into(),
            ocm_config: None,
            kubeconfig: None,
            extra_manifest_dir: None,
            kustomization_patches: None,
            disable_git_push: false,
            disable_kustomization_apply: false,
            dry_run: false,
            print_kustomized: false,
            commit_message: DEFAULT_COMMIT_MESSAGE.to_string(),
            apply_all_manifests: false,
        }
    }

    pub fn push_enabled(&self) -> bool {
        !(self.dry_run || self.disable_git_push)
    }

    pub fn apply_enabled(&self) -> bool {
        !(self.dry_run || self.disable_kustomization_apply)
    }
}

/// The external systems a run talks to.
pub struct Collaborators {
    pub repository: Arc<dyn ComponentRepository>,
    pub overlay: Box<dyn OverlayBuilder>,
    pub cluster: Box<dyn ClusterClient>,
}

impl Collaborators {
    /// `ocm`, `kustomize` and `kubectl` executables configured from `options`.
    pub fn from_options(options: &PipelineOptions) -> Self {
        Self {
            repository: Arc::new(OcmCli::new(options.ocm_config.clone())),
            overlay: Box::new(KustomizeCli::new()),
            cluster: Box::new(KubectlClient::new(options.kubeconfig.clone())),
        }
    }
}

/// Run every phase in order. The workspace is removed whatever the outcome.
///
/// With `print_kustomized` the built manifests are written to `out`.
pub fn run(
    config: BootstrapperConfig,
    options: &PipelineOptions,
    collaborators: &Collaborators,
    out: &mut dyn Write,
) -> Result<(), RepoError> {
    if options.dry_run {
        tracing::info!("running in dry-run mode: no changes will be pushed or applied");
    }

    let mut manager = in_phase(
        Phase::Initialize,
        DeploymentRepoManager::initialize(config, Arc::clone(&collaborators.repository), options),
    )?;
    let result = run_phases(&mut manager, options, collaborators, out);
    manager.cleanup();
    result
}

fn run_phases(
    manager: &mut DeploymentRepoManager,
    options: &PipelineOptions,
    collaborators: &Collaborators,
    out: &mut dyn Write,
) -> Result<(), RepoError> {
    in_phase(Phase::ApplyTemplates, manager.apply_templates())?;
    in_phase(Phase::ApplyProviders, manager.apply_providers())?;
    in_phase(Phase::ApplyCustomResourceDefinitions, manager.apply_custom_resource_definitions())?;
    in_phase(Phase::ApplyExtraManifests, manager.apply_extra_manifests())?;
    in_phase(Phase::UpdateResourcesKustomization, manager.update_resources_kustomization())?;

    if options.push_enabled() {
        in_phase(Phase::CommitAndPushChanges, manager.commit_and_push_changes(&options.commit_message))?;
    } else {
        tracing::info!("skipping pushing changes to git repository");
    }

    let manifests = in_phase(Phase::RunOverlayBuild, manager.run_overlay_build(collaborators.overlay.as_ref()))?;

    if options.apply_enabled() {
        in_phase(
            Phase::ApplyToCluster,
            manager.apply_to_cluster(collaborators.cluster.as_ref(), &manifests, options.apply_all_manifests),
        )?;
    } else {
        tracing::info!("skipping applying kustomization to target cluster");
    }

    if options.print_kustomized {
        tracing::info!("kustomized manifests:");
        out.write_all(to_yaml_stream(&manifests)?.as_bytes()).map_err(RepoError::Output)?;
    }
    Ok(())
}
