//! Error types for bootstrapper-repo.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use bootstrapper_core::{ConfigError, ImageRefError, ToolError};
use bootstrapper_ocm::ResolveError;
use bootstrapper_renderer::RenderError;

/// Pipeline phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initialize,
    ApplyTemplates,
    ApplyProviders,
    ApplyCustomResourceDefinitions,
    ApplyExtraManifests,
    UpdateResourcesKustomization,
    CommitAndPushChanges,
    RunOverlayBuild,
    ApplyToCluster,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Initialize => "initialize deployment repository",
            Phase::ApplyTemplates => "apply templates",
            Phase::ApplyProviders => "apply providers",
            Phase::ApplyCustomResourceDefinitions => "apply custom resource definitions",
            Phase::ApplyExtraManifests => "apply extra manifests",
            Phase::UpdateResourcesKustomization => "update resources kustomization",
            Phase::CommitAndPushChanges => "commit and push changes",
            Phase::RunOverlayBuild => "run kustomize",
            Phase::ApplyToCluster => "apply manifests to cluster",
        };
        f.write_str(name)
    }
}

/// All errors that can arise while synthesizing the deployment repository.
#[derive(Debug, Error)]
pub enum RepoError {
    /// A phase failed; `source` is the underlying cause.
    #[error("failed to {phase}: {source}")]
    Phase {
        phase: Phase,
        #[source]
        source: Box<RepoError>,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("git {operation} failed: {source}")]
    Git {
        operation: &'static str,
        #[source]
        source: ToolError,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to serialize {what}: {source}")]
    Serialize {
        what: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("image resource not found for component {component}")]
    MissingImage { component: String },

    #[error("failed to parse image reference {reference}: {source}")]
    InvalidImage {
        reference: String,
        #[source]
        source: ImageRefError,
    },

    #[error("resource {resource} not found in component version {component}")]
    MissingResource { resource: String, component: String },

    #[error("invalid component name: {0}")]
    InvalidComponentName(String),

    #[error("no patches found in user patches file {0}")]
    NoPatches(PathBuf),

    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("failed to print kustomized manifests: {0}")]
    Output(#[source] std::io::Error),

    #[error("failed to {action} {object}: {source}")]
    Cluster {
        action: &'static str,
        object: String,
        #[source]
        source: ToolError,
    },
}

impl RepoError {
    /// The phase that failed, if this error was raised by the phase runner.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            RepoError::Phase { phase, .. } => Some(*phase),
            _ => None,
        }
    }
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RepoError {
    RepoError::Io { path: path.into(), source }
}

/// Wraps a phase result so the message names the phase.
pub(crate) fn in_phase<T>(phase: Phase, result: Result<T, RepoError>) -> Result<T, RepoError> {
    result.map_err(|e| RepoError::Phase { phase, source: Box::new(e) })
}
