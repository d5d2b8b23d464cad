//! Component Resolver: traversal of the component reference graph.
//!
//! - [`repository`]: the [`ComponentRepository`] seam and the `ocm`-backed [`OcmCli`]
//! - [`resolver`]: [`ComponentResolver`] lookups and downloads
//! - [`error`]: [`ResolveError`]

pub mod error;
pub mod repository;
pub mod resolver;

pub use error::ResolveError;
pub use repository::{ComponentRepository, OcmCli};
pub use resolver::ComponentResolver;
