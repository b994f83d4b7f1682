//! Parsing of a single configuration object entry.
//!
//! Entries are read with explicit key lookups rather than a derived
//! `Deserialize` so a missing key is reported by its full dotted path,
//! e.g. `objects.app.dest.path`.

use std::path::PathBuf;
use std::time::Duration;

use serde_yaml::{Mapping, Value};

use crate::backend::BackendKind;
use crate::error::ConfigError;
use crate::format::Format;

/// A configuration object: where it comes from and where it goes.
#[derive(Debug, Clone)]
pub struct ObjectEntry {
    pub key: String,
    pub source: SourceEntry,
    pub dest: DestEntry,
}

#[derive(Debug, Clone)]
pub struct SourceEntry {
    pub backend: BackendKind,
    /// How to decode the backend's raw string; defaults to `raw`.
    pub format: Format,
    /// Poll interval override.
    pub interval: Option<Duration>,
    pub construct: Construct,
}

/// How the backend should be constructed.
#[derive(Debug, Clone)]
pub enum Construct {
    /// Direct construction from internal identifiers.
    Init(Params),
    /// Name-based construction that resolves identifiers remotely.
    New(Params),
}

impl Construct {
    pub fn params(&self) -> &Params {
        match self {
            Construct::Init(params) | Construct::New(params) => params,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DestEntry {
    pub path: PathBuf,
    /// A serializer tag or a template path.
    pub format: String,
}

/// Constructor parameters with the key path they were read from.
#[derive(Debug, Clone, Default)]
pub struct Params {
    context: String,
    values: Mapping,
}

impl Params {
    pub fn new(context: impl Into<String>, values: Mapping) -> Self {
        Self {
            context: context.into(),
            values,
        }
    }

    /// Builds parameters from string pairs.
    pub fn from_pairs<'a>(
        context: impl Into<String>,
        pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        let values = pairs
            .into_iter()
            .map(|(k, v)| (Value::from(k), Value::from(v)))
            .collect();
        Self::new(context, values)
    }

    /// Dotted path of `key` within the settings file.
    pub fn key_path(&self, key: &str) -> String {
        join_key(&self.context, key)
    }

    pub fn require_str(&self, key: &str) -> Result<String, ConfigError> {
        self.optional_str(key)?
            .ok_or_else(|| ConfigError::MissingKey {
                key: self.key_path(key),
            })
    }

    pub fn optional_str(&self, key: &str) -> Result<Option<String>, ConfigError> {
        match self.values.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => scalar_string(value)
                .map(Some)
                .ok_or_else(|| ConfigError::InvalidValue {
                    key: self.key_path(key),
                    reason: "expected a string".to_string(),
                }),
        }
    }
}

impl ObjectEntry {
    /// Parses the entry stored under `objects.<key>`.
    pub fn parse(key: &str, value: &Value) -> Result<Self, ConfigError> {
        let context = join_key("objects", key);
        let entry = as_mapping(value, &context)?;

        let source = require_mapping(entry, &context, "source")?;
        let source_ctx = join_key(&context, "source");
        let dest = require_mapping(entry, &context, "dest")?;
        let dest_ctx = join_key(&context, "dest");

        let backend: BackendKind = require_scalar(source, &source_ctx, "backend")?.parse()?;
        let format = match optional_scalar(source, &source_ctx, "format")? {
            Some(tag) => tag.parse()?,
            None => Format::Raw,
        };
        let interval = match source.get("interval") {
            None | Some(Value::Null) => None,
            Some(value) => Some(parse_interval(value, &join_key(&source_ctx, "interval"))?),
        };

        let construct = if let Some(new) = non_null(source.get("new")) {
            let ctx = join_key(&source_ctx, "new");
            Construct::New(constructor_params(as_mapping(new, &ctx)?, ctx)?)
        } else {
            let init = require_mapping(source, &source_ctx, "init")?;
            Construct::Init(constructor_params(init, join_key(&source_ctx, "init"))?)
        };

        Ok(Self {
            key: key.to_string(),
            source: SourceEntry {
                backend,
                format,
                interval,
                construct,
            },
            dest: DestEntry {
                path: PathBuf::from(require_scalar(dest, &dest_ctx, "path")?),
                format: require_scalar(dest, &dest_ctx, "format")?,
            },
        })
    }
}

/// Parameters are either the mapping itself or its `kwargs` sub-mapping.
fn constructor_params(mapping: &Mapping, context: String) -> Result<Params, ConfigError> {
    match non_null(mapping.get("kwargs")) {
        Some(kwargs) => {
            let context = join_key(&context, "kwargs");
            let values = as_mapping(kwargs, &context)?.clone();
            Ok(Params::new(context, values))
        }
        None => Ok(Params::new(context, mapping.clone())),
    }
}

fn join_key(context: &str, key: &str) -> String {
    if context.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", context, key)
    }
}

fn non_null(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

fn as_mapping<'a>(value: &'a Value, context: &str) -> Result<&'a Mapping, ConfigError> {
    value.as_mapping().ok_or_else(|| ConfigError::InvalidValue {
        key: context.to_string(),
        reason: "expected a mapping".to_string(),
    })
}

fn require_mapping<'a>(
    parent: &'a Mapping,
    context: &str,
    key: &str,
) -> Result<&'a Mapping, ConfigError> {
    let path = join_key(context, key);
    let value = non_null(parent.get(key)).ok_or_else(|| ConfigError::MissingKey {
        key: path.clone(),
    })?;
    as_mapping(value, &path)
}

fn optional_scalar(
    parent: &Mapping,
    context: &str,
    key: &str,
) -> Result<Option<String>, ConfigError> {
    match non_null(parent.get(key)) {
        None => Ok(None),
        Some(value) => scalar_string(value)
            .map(Some)
            .ok_or_else(|| ConfigError::InvalidValue {
                key: join_key(context, key),
                reason: "expected a string".to_string(),
            }),
    }
}

fn require_scalar(parent: &Mapping, context: &str, key: &str) -> Result<String, ConfigError> {
    optional_scalar(parent, context, key)?.ok_or_else(|| ConfigError::MissingKey {
        key: join_key(context, key),
    })
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn parse_interval(value: &Value, key: &str) -> Result<Duration, ConfigError> {
    value
        .as_f64()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .ok_or_else(|| ConfigError::InvalidValue {
            key: key.to_string(),
            reason: "expected a non-negative number of seconds within range".to_string(),
        })
}
