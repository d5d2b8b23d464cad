//! Error types for bootstrapper-core.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// One rejected field of a configuration document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Dotted path of the field, e.g. `providers.clusterProviders[0].name`.
    pub path: String,
    pub kind: FieldErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldErrorKind {
    Required,
    Invalid,
}

impl FieldError {
    pub fn required(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self { path: path.into(), kind: FieldErrorKind::Required, message: message.into() }
    }

    pub fn invalid(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self { path: path.into(), kind: FieldErrorKind::Invalid, message: message.into() }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            FieldErrorKind::Required => "Required value",
            FieldErrorKind::Invalid => "Invalid value",
        };
        write!(f, "{}: {}: {}", self.path, kind, self.message)
    }
}

/// Every field error found in a single validation pass.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldErrors(pub Vec<FieldError>);

impl FieldErrors {
    pub fn push(&mut self, err: FieldError) {
        self.0.push(err);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "[{}]", joined.join(", "))
    }
}

/// Errors raised while loading the deployment config or the git credentials.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load, with the file path for context.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(FieldErrors),

    #[error("multiple authentication methods provided, only one is allowed")]
    MultipleAuthMethods,

    #[error("no authentication method provided, at least one is required")]
    NoAuthMethod,

    #[error("invalid {method}: {message}")]
    InvalidAuth { method: &'static str, message: String },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io { path: path.into(), source }
}

// ---------------------------------------------------------------------------
// Parsing errors for location and image strings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("invalid component location format, expected '<repo>//<component>:<version>': {0}")]
    InvalidFormat(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageRefError {
    #[error("image reference is empty")]
    Empty,

    #[error("invalid image reference {0:?}: missing image name")]
    MissingName(String),
}

// ---------------------------------------------------------------------------
// External tool errors
// ---------------------------------------------------------------------------

/// Failure of an external executable (`ocm`, `git`, `kustomize`, `kubectl`).
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("executable {program:?} not found on PATH: {source}")]
    NotFound {
        program: String,
        #[source]
        source: which::Error,
    },

    #[error("error starting {program} command: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Non-zero exit. `output` holds stdout followed by stderr.
    #[error("{program} {args} failed with exit code {exit}: {output}", exit = display_code(.code))]
    Failed {
        program: String,
        args: String,
        code: Option<i32>,
        output: String,
    },
}

fn display_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "<signal>".to_string(), |c| c.to_string())
}
