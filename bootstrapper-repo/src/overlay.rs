//! Flattening an environment overlay into a manifest stream.

use std::path::Path;

use bootstrapper_core::ToolCommand;

use crate::error::RepoError;

pub trait OverlayBuilder {
    /// Build the overlay rooted at `dir` into a multi-document YAML stream.
    fn build(&self, dir: &Path) -> Result<String, RepoError>;
}

/// [`OverlayBuilder`] backed by the `kustomize` executable.
#[derive(Debug, Clone)]
pub struct KustomizeCli {
    program: String,
}

impl Default for KustomizeCli {
    fn default() -> Self {
        Self { program: "kustomize".to_string() }
    }
}

impl KustomizeCli {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

impl OverlayBuilder for KustomizeCli {
    fn build(&self, dir: &Path) -> Result<String, RepoError> {
        tracing::trace!("running {} build {}", self.program, dir.display());
        let output = ToolCommand::new(&self.program).arg("build").arg(dir).run_checked()?;
        Ok(output.stdout)
    }
}
