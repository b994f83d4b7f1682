use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};

use crate::error::ConfigError;
use crate::settings::entry::ObjectEntry;

/// File name looked up in the working and home directories.
pub const SETTINGS_FILE_NAME: &str = "confsync-settings.yaml";

/// System-wide settings location.
pub const SYSTEM_SETTINGS_PATH: &str = "/etc/confsync/settings.yaml";

/// Environment variable overriding settings discovery.
pub const SETTINGS_ENV_VAR: &str = "CONFSYNC_SETTINGS";

const OBJECTS_KEY: &str = "objects";

/// The tool's own settings: a named set of configuration objects.
#[derive(Debug, Clone)]
pub struct Settings {
    path: PathBuf,
    objects: Mapping,
}

impl Settings {
    /// Reads and parses the settings file at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::from_yaml_str(&content, path)
    }

    /// Parses settings from YAML text; `path` is only used for error messages.
    pub fn from_yaml_str<P: AsRef<Path>>(content: &str, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let parse_err = |message: String| ConfigError::ParseYaml {
            path: path.to_path_buf(),
            message,
        };

        let root: Value = serde_yaml::from_str(content).map_err(|e| parse_err(e.to_string()))?;
        let Value::Mapping(mut root) = root else {
            return Err(parse_err("expected a mapping at the document root".to_string()));
        };

        let objects = match root.remove(OBJECTS_KEY) {
            Some(Value::Mapping(objects)) => objects,
            Some(Value::Null) => Mapping::new(),
            Some(_) => {
                return Err(ConfigError::InvalidValue {
                    key: OBJECTS_KEY.to_string(),
                    reason: "expected a mapping of object names to entries".to_string(),
                })
            }
            None => {
                return Err(ConfigError::MissingKey {
                    key: OBJECTS_KEY.to_string(),
                })
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            objects,
        })
    }

    /// Path the settings were loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The raw `objects` mapping, in file order.
    pub fn objects(&self) -> &Mapping {
        &self.objects
    }

    /// Object names, in file order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.objects.keys().filter_map(Value::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.contains_key(key)
    }

    /// Parses the entry for the named object.
    pub fn object(&self, key: &str) -> Result<ObjectEntry, ConfigError> {
        let value = self
            .objects
            .get(key)
            .ok_or_else(|| ConfigError::UnknownObject(key.to_string()))?;
        ObjectEntry::parse(key, value)
    }

    /// Serializes the `objects` mapping back to YAML.
    pub fn objects_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(&self.objects).map_err(|e| ConfigError::ParseYaml {
            path: self.path.clone(),
            message: e.to_string(),
        })
    }
}

/// Default settings locations, in lookup order.
pub fn default_settings_paths() -> Vec<PathBuf> {
    let mut paths = Vec::with_capacity(3);
    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join(SETTINGS_FILE_NAME));
    }
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(SETTINGS_FILE_NAME));
    }
    paths.push(PathBuf::from(SYSTEM_SETTINGS_PATH));
    paths
}

/// Locates the settings file among the default locations.
pub fn resolve_settings_path() -> Result<PathBuf, ConfigError> {
    resolve_from(default_settings_paths())
}

fn resolve_from(candidates: Vec<PathBuf>) -> Result<PathBuf, ConfigError> {
    match candidates.iter().find(|p| p.is_file()) {
        Some(path) => Ok(path.clone()),
        None => Err(ConfigError::SettingsNotFound {
            searched: candidates,
        }),
    }
}
