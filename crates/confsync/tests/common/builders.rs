//! Builders for settings files.

#![allow(dead_code)]

use std::path::Path;

use serde_yaml::{Mapping, Value};

/// One configuration object entry.
#[derive(Debug, Clone)]
pub struct ObjectBuilder {
    key: String,
    backend: String,
    format: Option<String>,
    interval: Option<f64>,
    construct: &'static str,
    kwargs: bool,
    params: Vec<(String, String)>,
    dest_path: Option<String>,
    dest_format: Option<String>,
}

impl ObjectBuilder {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            backend: "local".to_string(),
            format: None,
            interval: None,
            construct: "init",
            kwargs: false,
            params: Vec::new(),
            dest_path: None,
            dest_format: None,
        }
    }

    /// A local-file object reading `source`.
    pub fn local(key: &str, source: &Path) -> Self {
        Self::new(key).param("path", &source.display().to_string())
    }

    pub fn backend(mut self, backend: &str) -> Self {
        self.backend = backend.to_string();
        self
    }

    pub fn format(mut self, format: &str) -> Self {
        self.format = Some(format.to_string());
        self
    }

    pub fn interval(mut self, seconds: f64) -> Self {
        self.interval = Some(seconds);
        self
    }

    /// Switch to name-based construction.
    pub fn by_name(mut self) -> Self {
        self.construct = "new";
        self
    }

    /// Nest the parameters under a `kwargs` key.
    pub fn with_kwargs(mut self) -> Self {
        self.kwargs = true;
        self
    }

    pub fn param(mut self, key: &str, value: &str) -> Self {
        self.params.push((key.to_string(), value.to_string()));
        self
    }

    pub fn dest(mut self, path: &Path, format: &str) -> Self {
        self.dest_path = Some(path.display().to_string());
        self.dest_format = Some(format.to_string());
        self
    }

    /// Keep the dest format but drop the path.
    pub fn without_dest_path(mut self) -> Self {
        self.dest_path = None;
        self
    }

    fn to_value(&self) -> Value {
        let mut params = Mapping::new();
        for (k, v) in &self.params {
            params.insert(Value::from(k.as_str()), Value::from(v.as_str()));
        }

        let mut source = Mapping::new();
        source.insert("backend".into(), Value::from(self.backend.as_str()));
        if let Some(format) = &self.format {
            source.insert("format".into(), Value::from(format.as_str()));
        }
        if let Some(interval) = self.interval {
            source.insert("interval".into(), Value::from(interval));
        }
        let params = if self.kwargs {
            let mut wrapper = Mapping::new();
            wrapper.insert("kwargs".into(), Value::Mapping(params));
            wrapper
        } else {
            params
        };
        source.insert(self.construct.into(), Value::Mapping(params));

        let mut dest = Mapping::new();
        if let Some(path) = &self.dest_path {
            dest.insert("path".into(), Value::from(path.as_str()));
        }
        if let Some(format) = &self.dest_format {
            dest.insert("format".into(), Value::from(format.as_str()));
        }

        let mut entry = Mapping::new();
        entry.insert("source".into(), Value::Mapping(source));
        entry.insert("dest".into(), Value::Mapping(dest));
        Value::Mapping(entry)
    }
}

/// A whole settings file.
#[derive(Debug, Clone, Default)]
pub struct SettingsBuilder {
    objects: Vec<ObjectBuilder>,
}

impl SettingsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object(mut self, object: ObjectBuilder) -> Self {
        self.objects.push(object);
        self
    }

    pub fn to_yaml(&self) -> String {
        let mut objects = Mapping::new();
        for object in &self.objects {
            objects.insert(Value::from(object.key.as_str()), object.to_value());
        }
        let mut root = Mapping::new();
        root.insert("objects".into(), Value::Mapping(objects));
        serde_yaml::to_string(&root).expect("Failed to serialize settings")
    }
}
