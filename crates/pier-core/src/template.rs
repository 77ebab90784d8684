//! In-place rendering of config file templates.
//!
//! Each configured file is both the template and the output: it is rendered
//! against the runtime context and atomically replaced by the result, keeping
//! its permissions and ownership.

use std::error::Error as _;
use std::io::Write;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use pier_common::error::ExitClass;
use pier_common::types::RuntimeContext;
use thiserror::Error;

/// Errors raised while rendering templates.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The template could not be read or the output could not be written.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The template engine rejected the template or the context.
    #[error("failed to render {path}: {message}")]
    Render {
        /// Template path.
        path: PathBuf,
        /// Engine error, including its causes.
        message: String,
    },
}

impl TemplateError {
    /// Exit classification when this error aborts a run.
    #[must_use]
    pub const fn exit_class(&self) -> ExitClass {
        match self {
            Self::Io { .. } | Self::Render { .. } => ExitClass::Template,
        }
    }
}

/// Convenience alias for template results.
pub type Result<T> = std::result::Result<T, TemplateError>;

/// Renders one template file to text.
pub trait Renderer {
    /// Renders the template at `template` with `context`.
    ///
    /// # Errors
    ///
    /// Returns an error if the template cannot be read or rendered.
    fn render(&self, template: &Path, context: &RuntimeContext) -> Result<String>;
}

/// Jinja2-style rendering with Tera. Autoescaping is off: the output is
/// config files, not HTML.
#[derive(Debug, Clone, Copy, Default)]
pub struct TeraRenderer;

impl Renderer for TeraRenderer {
    fn render(&self, template: &Path, context: &RuntimeContext) -> Result<String> {
        let source = std::fs::read_to_string(template).map_err(|e| TemplateError::Io {
            path: template.to_path_buf(),
            source: e,
        })?;
        let render_err = |e: tera::Error| TemplateError::Render {
            path: template.to_path_buf(),
            message: error_chain(&e),
        };
        let context = tera::Context::from_value(serde_json::Value::Object(context.clone()))
            .map_err(render_err)?;
        tera::Tera::one_off(&source, &context, false).map_err(render_err)
    }
}

/// Tera reports the useful detail in the error's sources.
fn error_chain(err: &tera::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Renders every file in order, replacing each with its output.
///
/// Stops at the first failure; files rendered before it stay rendered.
///
/// # Errors
///
/// Returns the first render or write failure.
pub fn render_files(
    files: &[PathBuf],
    context: &RuntimeContext,
    renderer: &dyn Renderer,
) -> Result<usize> {
    for file in files {
        let output = renderer.render(file, context)?;
        replace_file(file, &output)?;
        tracing::info!(path = %file.display(), "rendered template");
    }
    Ok(files.len())
}

fn replace_file(path: &Path, content: &str) -> Result<()> {
    let io_err = |source| TemplateError::Io {
        path: path.to_path_buf(),
        source,
    };
    let meta = std::fs::metadata(path).map_err(io_err)?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(content.as_bytes()).map_err(io_err)?;
    tmp.as_file()
        .set_permissions(meta.permissions())
        .map_err(io_err)?;
    std::os::unix::fs::fchown(tmp.as_file(), Some(meta.uid()), Some(meta.gid())).map_err(io_err)?;
    let _ = tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}
