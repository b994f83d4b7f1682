//! Destinations: where an object is written and how its
//! structured value becomes file content.

use std::fmt;
use std::path::{Path, PathBuf};

use minijinja::{AutoEscape, Environment};
use serde_json::Value;

use crate::error::{ConfigError, RenderError};
use crate::format::Format;

/// A template compiled once from a file and reused for every render.
#[derive(Debug)]
pub struct CompiledTemplate {
    env: Environment<'static>,
    name: String,
    path: PathBuf,
}

impl CompiledTemplate {
    /// Reads and compiles the template at `path`. Its directory is the
    /// search path for `{% include %}` and `{% extends %}`.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let source = std::fs::read_to_string(&path).map_err(|source| ConfigError::TemplateRead {
            path: path.clone(),
            source,
        })?;

        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mut env = template_env();
        env.set_loader(minijinja::path_loader(template_dir(&path)));
        Self::compile(env, name, path, source)
    }

    /// Compiles `source` without a search path, remembering `path` for display.
    pub fn from_source(path: impl Into<PathBuf>, source: String) -> Result<Self, ConfigError> {
        let path = path.into();
        let name = path.display().to_string();
        Self::compile(template_env(), name, path, source)
    }

    fn compile(
        mut env: Environment<'static>,
        name: String,
        path: PathBuf,
        source: String,
    ) -> Result<Self, ConfigError> {
        env.add_template_owned(name.clone(), source)
            .map_err(|source| ConfigError::TemplateSyntax {
                path: path.clone(),
                source,
            })?;

        Ok(Self { env, name, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Renders with the top-level keys of `data` as template variables.
    pub fn render(&self, data: &Value) -> Result<String, RenderError> {
        let template = self.env.get_template(&self.name)?;
        Ok(template.render(data)?)
    }
}

// Every template is HTML-escaped whatever its extension; `|safe` opts a value out.
fn template_env() -> Environment<'static> {
    let mut env = Environment::new();
    env.set_auto_escape_callback(|_| AutoEscape::Html);
    env
}

fn template_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// How a destination turns a structured value into content.
#[derive(Debug)]
pub enum DestFormat {
    Serializer(Format),
    Template(CompiledTemplate),
}

/// An output path plus its rendering.
#[derive(Debug)]
pub struct DestSpec {
    path: PathBuf,
    format: DestFormat,
}

impl DestSpec {
    /// Resolves `format`: a serializer tag if it names one, otherwise the
    /// path of a template to compile.
    pub fn new(path: impl Into<PathBuf>, format: &str) -> Result<Self, ConfigError> {
        let format = match Format::from_tag(format) {
            Some(tag) => DestFormat::Serializer(tag),
            None => DestFormat::Template(CompiledTemplate::load(format)?),
        };
        Ok(Self::with_format(path, format))
    }

    pub fn with_format(path: impl Into<PathBuf>, format: DestFormat) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> &DestFormat {
        &self.format
    }

    pub fn render(&self, data: &Value) -> Result<String, RenderError> {
        match &self.format {
            DestFormat::Serializer(format) => format.dumps(data),
            DestFormat::Template(template) => template.render(data),
        }
    }
}

impl fmt::Display for DestSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.format {
            DestFormat::Serializer(format) => write!(f, "{} ({})", self.path.display(), format),
            DestFormat::Template(template) => write!(
                f,
                "{} (template: {})",
                self.path.display(),
                template.path().display()
            ),
        }
    }
}
