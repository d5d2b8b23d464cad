//! Deployment repository manager: one method per pipeline phase.
//!
//! [`DeploymentRepoManager::initialize`] owns everything a run needs: the
//! workspace, the resolver, the resolved operator and sync-controller
//! components and the checked-out working tree. The remaining phases are
//! called in order by [`crate::pipeline::run`].

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bootstrapper_core::{BootstrapperConfig, ComponentVersion, GitCredentials};
use bootstrapper_ocm::{ComponentRepository, ComponentResolver};
use bootstrapper_renderer::TemplateEngine;
use serde_json::Value;

use crate::cluster::{create_or_update, is_sync_controller_kustomization, parse_manifests, ClusterClient};
use crate::crds::{download_crds, manifest_files, retain_platform_crds};
use crate::error::{io_err, RepoError};
use crate::git::{GitAuth, GitRepo};
use crate::kustomization::Kustomization;
use crate::overlay::OverlayBuilder;
use crate::pipeline::PipelineOptions;
use crate::providers::{apply_providers, provider_groups};
use crate::template_input::{
    add_fluxcd_images, add_user_patches, base_input, first_image, input_formatter, FLUXCD_SOURCE_CONTROLLER_RESOURCE,
    OPENMCP_OPERATOR_COMPONENT_NAME,
};
use crate::transformer::{
    TemplateTransformer, CRDS_DIR, ENVS_DIR, EXTRA_MANIFESTS_DIR, KUSTOMIZATION_FILE, OPENMCP_DIR, RESOURCES_DIR,
};
use crate::workspace::{copy_dir, Workspace};

#[derive(Debug)]
pub struct DeploymentRepoManager {
    config: BootstrapperConfig,
    workspace: Workspace,
    resolver: Arc<ComponentResolver>,
    engine: TemplateEngine,
    operator: ComponentVersion,
    fluxcd: ComponentVersion,
    repo: GitRepo,
    extra_manifest_dir: Option<PathBuf>,
    patches_file: Option<PathBuf>,
    crd_files: Vec<String>,
    extra_manifests: Vec<String>,
}

impl DeploymentRepoManager {
    /// Prepare the workspace, resolve components, lay out the templates and
    /// check out the deployment branch. On failure the workspace is removed.
    pub fn initialize(
        config: BootstrapperConfig,
        repository: Arc<dyn ComponentRepository>,
        options: &PipelineOptions,
    ) -> Result<Self, RepoError> {
        let workspace = Workspace::create()?;

        tracing::info!("downloading component {}", config.component.location);
        let resolver = Arc::new(ComponentResolver::initialize(
            repository,
            &config.component.location,
            &config.component.fluxcd_template_resource_path,
        )?);

        TemplateTransformer::new(
            &resolver,
            &config.component.fluxcd_template_resource_path,
            &config.component.openmcp_operator_template_resource_path,
        )
        .transform(&config.environment, &workspace.download_dir(), &workspace.templates_dir())?;

        tracing::info!("fetching {OPENMCP_OPERATOR_COMPONENT_NAME} component version");
        let operator = resolver.resolve_reference(resolver.root(), OPENMCP_OPERATOR_COMPONENT_NAME)?;
        let fluxcd = resolver.resolve_resource_owner(resolver.root(), FLUXCD_SOURCE_CONTROLLER_RESOURCE)?;
        tracing::debug!("operator {operator}, sync controller {fluxcd}");

        let credentials = GitCredentials::load(&options.git_credentials)?;
        let auth = GitAuth::prepare(&credentials, &workspace.auth_dir())?;

        tracing::info!("cloning deployment repository {}", config.repository.url);
        let repo = GitRepo::clone_from(&config.repository.url, &workspace.repo_dir(), auth)?;
        tracing::info!("checking out or creating branch {}", config.repository.branch);
        repo.checkout_or_create_branch(&config.repository.branch)?;

        let engine = TemplateEngine::new()
            .with_input_formatter(input_formatter())
            .with_resolver(Arc::clone(&resolver));
        Ok(Self {
            config,
            workspace,
            resolver,
            engine,
            operator,
            fluxcd,
            repo,
            extra_manifest_dir: options.extra_manifest_dir.clone(),
            patches_file: options.kustomization_patches.clone(),
            crd_files: Vec::new(),
            extra_manifests: Vec::new(),
        })
    }

    pub fn repo_dir(&self) -> &Path {
        self.repo.dir()
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// CRD paths relative to `resources/openmcp`, set by the CRD phase.
    pub fn crd_files(&self) -> &[String] {
        &self.crd_files
    }

    /// Extra manifest file names, set by the extra manifests phase.
    pub fn extra_manifests(&self) -> &[String] {
        &self.extra_manifests
    }

    // -----------------------------------------------------------------------
    // Phases
    // -----------------------------------------------------------------------

    /// Build the template input and render the templates into the working tree.
    pub fn apply_templates(&mut self) -> Result<(), RepoError> {
        tracing::info!(
            "applying templates from {:?}/{:?} to deployment repository",
            self.config.component.fluxcd_template_resource_path,
            self.config.component.openmcp_operator_template_resource_path
        );
        let (_, operator_image) = first_image(&self.operator)?;
        let mut input = base_input(&self.config, &self.operator, &operator_image);
        if let Some(path) = &self.patches_file {
            add_user_patches(&self.engine, path, &mut input)?;
        }
        add_fluxcd_images(&self.fluxcd, &mut input)?;

        let templates = self.workspace.templates_dir();
        if let Some(dir) = &self.extra_manifest_dir {
            copy_dir(dir, &templates.join(openmcp_resources()).join(EXTRA_MANIFESTS_DIR))?;
        }

        let written = self.engine.render_directory(&templates, &input, &mut self.repo)?;
        tracing::debug!("rendered {} files", written.len());
        Ok(())
    }

    pub fn apply_providers(&mut self) -> Result<(), RepoError> {
        tracing::info!(
            "templating providers: clusterProviders={}, serviceProviders={}, platformServices={}",
            self.config.providers.cluster_providers.len(),
            self.config.providers.service_providers.len(),
            self.config.providers.platform_services.len()
        );
        let repo_dir = self.repo.dir().to_path_buf();
        let providers = provider_groups(&self.config.providers);
        apply_providers(&self.resolver, &providers, &self.config.image_pull_secrets, &repo_dir, &mut self.repo)
    }

    /// Download CRDs of the operator and every provider, keeping only the
    /// platform cluster's. A provider without CRDs is logged and skipped.
    pub fn apply_custom_resource_definitions(&mut self) -> Result<(), RepoError> {
        tracing::info!("applying custom resource definitions to deployment repository");
        let relative = openmcp_resources().join(CRDS_DIR);
        let crd_dir = self.repo.dir().join(&relative);
        fs::create_dir_all(&crd_dir).map_err(|e| io_err(&crd_dir, e))?;

        download_crds(&self.resolver, &self.operator, &crd_dir)?;
        for (kind, entries) in provider_groups(&self.config.providers) {
            for provider in entries {
                let cv = self.resolver.resolve_reference(self.resolver.root(), &kind.component_name(&provider.name))?;
                if let Err(e) = download_crds(&self.resolver, &cv, &crd_dir) {
                    tracing::warn!("failed to apply CRDs for {kind} {}: {e}", provider.name);
                }
            }
        }

        self.crd_files = retain_platform_crds(&crd_dir)?
            .into_iter()
            .map(|name| format!("{CRDS_DIR}/{name}"))
            .collect();
        self.repo.add(&relative)
    }

    /// Record the extra manifest files; their content was rendered with the templates.
    pub fn apply_extra_manifests(&mut self) -> Result<(), RepoError> {
        let Some(dir) = &self.extra_manifest_dir else {
            tracing::info!("no extra manifest directory specified, skipping");
            return Ok(());
        };
        tracing::info!("applying extra manifests from {}", dir.display());
        self.extra_manifests = manifest_files(dir)?;
        for name in &self.extra_manifests {
            tracing::trace!("added extra manifest {name}");
        }
        Ok(())
    }

    /// Paths appended to `resources/openmcp/kustomization.yaml`, in order.
    pub fn resource_files(&self) -> Vec<String> {
        let mut files = self.crd_files.clone();
        for (kind, entries) in provider_groups(&self.config.providers) {
            files.extend(entries.iter().map(|p| kind.manifest_path(&p.name)));
        }
        files.extend(self.extra_manifests.iter().map(|name| format!("{EXTRA_MANIFESTS_DIR}/{name}")));
        files
    }

    pub fn update_resources_kustomization(&mut self) -> Result<(), RepoError> {
        let relative = openmcp_resources().join(KUSTOMIZATION_FILE);
        let path = self.repo.dir().join(&relative);
        let mut kustomization = Kustomization::load(&path)?;

        let files = self.resource_files();
        tracing::debug!("adding files to resources root kustomization: {files:?}");
        kustomization.add_resources(files);
        kustomization.save(&path)?;
        self.repo.add(&relative)
    }

    pub fn commit_and_push_changes(&mut self, message: &str) -> Result<(), RepoError> {
        tracing::info!("committing and pushing changes to deployment repository");
        self.repo.commit(message)?;
        self.repo.push(&self.config.repository.branch)
    }

    /// Build the environment overlay into a list of objects.
    pub fn run_overlay_build(&self, builder: &dyn OverlayBuilder) -> Result<Vec<Value>, RepoError> {
        let env_dir = self.repo.dir().join(ENVS_DIR).join(&self.config.environment);
        tracing::info!("running kustomize on {}", env_dir.display());
        parse_manifests(&builder.build(&env_dir)?)
    }

    /// Apply the sync-controller Kustomizations, or every object when `all` is set.
    pub fn apply_to_cluster(&self, client: &dyn ClusterClient, manifests: &[Value], all: bool) -> Result<(), RepoError> {
        for manifest in manifests.iter().filter(|m| all || is_sync_controller_kustomization(m)) {
            let name = manifest.pointer("/metadata/name").and_then(Value::as_str).unwrap_or_default();
            tracing::info!("applying manifest {name}");
            create_or_update(client, manifest)?;
        }
        Ok(())
    }

    /// Remove the workspace. Never fails.
    pub fn cleanup(&mut self) {
        self.workspace.cleanup();
    }
}

/// `resources/openmcp`, relative to the working tree.
fn openmcp_resources() -> PathBuf {
    Path::new(RESOURCES_DIR).join(OPENMCP_DIR)
}
