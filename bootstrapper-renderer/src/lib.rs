//! # bootstrapper-renderer
//!
//! Tera-based renderer for deployment manifests.
//!
//! Templates may switch delimiters with a first-line directive, reference
//! input fields with or without a leading dot, and query the component graph
//! through helper functions when the engine carries a resolver.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use bootstrapper_renderer::{DirectorySink, MissingKey, TemplateEngine};
//! use serde_json::{json, Map, Value};
//!
//! fn render(out: &std::path::Path) -> Result<(), bootstrapper_renderer::RenderError> {
//!     let mut input = Map::new();
//!     input.insert("values".into(), json!({"name": "demo"}));
//!     let engine = TemplateEngine::new().with_missing_key(MissingKey::Zero);
//!     let text = engine.render("inline", "name: {{ .values.name }}", &input)?;
//!     assert_eq!(text, "name: demo");
//!
//!     let mut sink = DirectorySink::new(out);
//!     engine.render_directory(std::path::Path::new("templates"), &input, &mut sink)?;
//!     Ok(())
//! }
//! ```

pub mod delimiter;
pub mod diagnostics;
pub mod directory;
pub mod engine;
pub mod error;
mod functions;
pub mod input_formatter;
pub mod translate;

pub use delimiter::{parse_directive, Delimiters, DIRECTIVE_PREFIX};
pub use diagnostics::{create_source_snippet, find_no_value, NO_VALUE};
pub use directory::{DirectorySink, TemplateSink};
pub use engine::{MissingKey, TemplateEngine};
pub use error::{RenderError, SinkError};
pub use input_formatter::TemplateInputFormatter;
