//! # bootstrapper-repo
//!
//! Synthesizes the GitOps deployment repository for one environment and
//! bootstraps the sync controller in the target cluster.
//!
//! Call [`pipeline::run`] with a validated [`bootstrapper_core::BootstrapperConfig`]
//! to execute every phase, or drive a [`DeploymentRepoManager`] directly.
//!
//! ```text
//! Initialize -> ApplyTemplates -> ApplyProviders -> ApplyCustomResourceDefinitions
//!   -> ApplyExtraManifests -> UpdateResourcesKustomization -> CommitAndPushChanges
//!   -> RunOverlayBuild [-> ApplyToCluster] -> Cleanup
//! ```

pub mod cluster;
pub mod crds;
pub mod error;
pub mod git;
pub mod kustomization;
pub mod manager;
pub mod overlay;
pub mod pipeline;
pub mod providers;
pub mod template_input;
pub mod transformer;
pub mod workspace;

pub use cluster::{create_or_update, ClusterClient, KubectlClient, ObjectKey};
pub use error::{Phase, RepoError};
pub use git::{GitAuth, GitRepo};
pub use kustomization::Kustomization;
pub use manager::DeploymentRepoManager;
pub use overlay::{KustomizeCli, OverlayBuilder};
pub use pipeline::{run, Collaborators, PipelineOptions};
pub use providers::ProviderKind;
pub use workspace::Workspace;
