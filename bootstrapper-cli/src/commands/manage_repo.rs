//! `bootstrapper manage-deployment-repo <config>`

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use bootstrapper_core::BootstrapperConfig;
use bootstrapper_repo::pipeline::{self, Collaborators, PipelineOptions, DEFAULT_COMMIT_MESSAGE};

/// Arguments for `bootstrapper manage-deployment-repo`.
#[derive(Args, Debug)]
pub struct ManageRepoArgs {
    /// Path to the bootstrapper configuration file.
    pub config: PathBuf,

    /// Git credentials file used to clone and push the deployment repository.
    #[arg(long = "git-config", value_name = "FILE")]
    pub git_config: PathBuf,

    /// Configuration file forwarded to every `ocm` invocation.
    #[arg(long, value_name = "FILE")]
    pub ocm_config: Option<PathBuf>,

    /// Kubeconfig of the target cluster.
    #[arg(long, value_name = "FILE")]
    pub kubeconfig: Option<PathBuf>,

    /// Directory of additional manifests, rendered and added to the openmcp resources.
    #[arg(long, value_name = "DIR")]
    pub extra_manifest_dir: Option<PathBuf>,

    /// Templated file with a top-level `patches` list for the environment kustomization.
    #[arg(long, value_name = "FILE")]
    pub kustomization_patches: Option<PathBuf>,

    /// Do not commit and push the rendered changes.
    #[arg(long)]
    pub disable_git_push: bool,

    /// Do not apply the built Kustomizations to the target cluster.
    #[arg(long)]
    pub disable_kustomization_apply: bool,

    /// Render and build only; implies both disable flags.
    #[arg(long)]
    pub dry_run: bool,

    /// Print the built manifests to stdout.
    #[arg(long)]
    pub print_kustomized: bool,

    #[arg(long, default_value = DEFAULT_COMMIT_MESSAGE, value_name = "MSG")]
    pub commit_message: String,

    /// Apply every built object instead of only the sync controller Kustomizations.
    #[arg(long)]
    pub apply_all_manifests: bool,
}

impl ManageRepoArgs {
    pub fn run(self) -> Result<()> {
        let config = BootstrapperConfig::load(&self.config)
            .with_context(|| format!("invalid bootstrapper config '{}'", self.config.display()))?;
        let environment = config.environment.clone();
        let branch = config.repository.branch.clone();

        let options = self.options();
        tracing::debug!("pipeline options: {options:?}");
        let collaborators = Collaborators::from_options(&options);
        let stdout = io::stdout();
        pipeline::run(config, &options, &collaborators, &mut stdout.lock())
            .with_context(|| format!("failed to manage deployment repository for environment '{environment}'"))?;

        let prefix = if options.dry_run { "[dry-run] " } else { "" };
        eprintln!("{prefix}{} environment '{environment}' rendered on branch '{branch}'", "✓".green().bold());
        Ok(())
    }

    fn options(&self) -> PipelineOptions {
        PipelineOptions {
            ocm_config: self.ocm_config.clone(),
            kubeconfig: self.kubeconfig.clone(),
            extra_manifest_dir: self.extra_manifest_dir.clone(),
            kustomization_patches: self.kustomization_patches.clone(),
            disable_git_push: self.disable_git_push,
            disable_kustomization_apply: self.disable_kustomization_apply,
            dry_run: self.dry_run,
            print_kustomized: self.print_kustomized,
            commit_message: self.commit_message.clone(),
            apply_all_manifests: self.apply_all_manifests,
            ..PipelineOptions::new(&self.git_config)
        }
    }
}
