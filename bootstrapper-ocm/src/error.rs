//! Error types for bootstrapper-ocm.

use std::path::PathBuf;

use bootstrapper_core::{LocationError, ToolError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Location(#[from] LocationError),

    #[error("error getting component version {location}: {source}")]
    Fetch {
        location: String,
        #[source]
        source: ToolError,
    },

    #[error("error downloading resource {resource} of {location} to {dest}: {source}")]
    Download {
        location: String,
        resource: String,
        dest: PathBuf,
        #[source]
        source: ToolError,
    },

    #[error("error listing component versions of {location}: {source}")]
    List {
        location: String,
        #[source]
        source: ToolError,
    },

    /// Tool output that is not a component version descriptor.
    #[error("error unmarshalling component version {location}: {source}")]
    Parse {
        location: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("component reference {reference} not found in component version {component} or its references")]
    ReferenceNotFound { reference: String, component: String },

    #[error("resource {resource} not found in component version {component} or its references")]
    ResourceNotFound { resource: String, component: String },

    /// A reference leads back to a component version already on the search path.
    #[error("component reference cycle detected: {path}")]
    Cycle { path: String },

    #[error(
        "resource path must contain a resource name or component references and a resource name \
         separated by slashes (ref1/.../refN/resource): {0:?}"
    )]
    InvalidPath(String),
}
