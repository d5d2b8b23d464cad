//! Rendering a whole template tree into a [`TemplateSink`].

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use walkdir::WalkDir;

use crate::engine::{MissingKey, TemplateEngine};
use crate::error::{io_err, RenderError, SinkError};

/// Destination of rendered files, addressed by path relative to its root.
pub trait TemplateSink {
    fn write_file(&mut self, relative: &Path, content: &[u8]) -> Result<(), SinkError>;

    /// Mark a written file for the next commit. No-op for plain directories.
    fn stage(&mut self, relative: &Path) -> Result<(), SinkError>;
}

/// Writes into a plain directory, creating parents as needed.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    root: PathBuf,
}

impl DirectorySink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl TemplateSink for DirectorySink {
    fn write_file(&mut self, relative: &Path, content: &[u8]) -> Result<(), SinkError> {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        Ok(())
    }

    fn stage(&mut self, _relative: &Path) -> Result<(), SinkError> {
        Ok(())
    }
}

impl TemplateEngine {
    /// Render every file below `src` into `sink` under the same relative path.
    ///
    /// Templates see the input as `.Values` and always run with
    /// [`MissingKey::Zero`]. Files that are not UTF-8 are copied unchanged.
    /// The first failure aborts the walk. Returns the
    /// relative paths written, in walk order.
    pub fn render_directory(
        &self,
        src: &Path,
        input: &Map<String, Value>,
        sink: &mut dyn TemplateSink,
    ) -> Result<Vec<PathBuf>, RenderError> {
        let engine = self.clone().with_missing_key(MissingKey::Zero);
        let mut values = Map::new();
        values.insert("Values".to_string(), Value::Object(input.clone()));

        let mut written = Vec::new();
        for entry in WalkDir::new(src).sort_by_file_name() {
            let entry = entry?;
            if entry.file_type().is_dir() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(src)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| entry.path().to_path_buf());

            let bytes = fs::read(entry.path()).map_err(|e| io_err(entry.path(), e))?;
            let content = match String::from_utf8(bytes) {
                Ok(template) => {
                    let name = relative.to_string_lossy();
                    let rendered = engine
                        .render(&name, &template, &values)
                        .map_err(|e| RenderError::File { path: relative.clone(), source: Box::new(e) })?;
                    tracing::debug!("rendered template {}", relative.display());
                    rendered.into_bytes()
                }
                Err(e) => {
                    tracing::debug!("copying non-text file {} unchanged", relative.display());
                    e.into_bytes()
                }
            };

            sink.write_file(&relative, &content)
                .and_then(|()| sink.stage(&relative))
                .map_err(|source| RenderError::Sink { path: relative.clone(), source })?;
            written.push(relative);
        }
        Ok(written)
    }
}
