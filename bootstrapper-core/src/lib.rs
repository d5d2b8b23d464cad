//! Bootstrapper core library: configuration, component model, shared errors.
//!
//! - [`config`]: deployment config load, defaults and validation
//! - [`credentials`]: git credentials file
//! - [`types`]: component locations and version descriptors
//! - [`image`]: container image reference parsing
//! - [`process`]: runner for external executables
//! - [`error`]: error enums shared by the other crates

pub mod config;
pub mod credentials;
pub mod error;
pub mod image;
pub mod process;
pub mod types;

pub use config::{BootstrapperConfig, Provider, RawConfig};
pub use credentials::{AuthMethod, GitCredentials, SECRET_FIELDS};
pub use error::{ConfigError, FieldError, FieldErrors, ImageRefError, LocationError, ToolError};
pub use image::ImageRef;
pub use process::{ToolCommand, ToolOutput};
pub use types::{
    build_location, ComponentLocation, ComponentReference, ComponentVersion, Resource,
    OCI_IMAGE_RESOURCE_TYPE,
};
