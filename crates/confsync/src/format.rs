//! Serializer tags and the decode/encode functions behind them.
//!
//! Every structured value passing through the sync pipeline is a
//! `serde_json::Value`. Object keys are kept sorted, so encoding the same
//! value always produces the same bytes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ConfigError, RenderError};

/// Key holding the text of a `raw` document.
pub const RAW_CONTENT_KEY: &str = "content";

/// A recognized serializer tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Json,
    Raw,
    Toml,
    Yaml,
    Yml,
}

impl Format {
    /// All recognized tags.
    pub const ALL: [Format; 5] = [
        Format::Json,
        Format::Raw,
        Format::Toml,
        Format::Yaml,
        Format::Yml,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Raw => "raw",
            Format::Toml => "toml",
            Format::Yaml => "yaml",
            Format::Yml => "yml",
        }
    }

    /// Returns the tag for `name`, or `None` if it is not a serializer tag.
    pub fn from_tag(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == name)
    }

    /// Decodes a raw backend string into a structured value.
    ///
    /// `raw` passes the text through untouched as `{"content": <text>}`.
    pub fn loads(self, raw: &str) -> Result<Value, RenderError> {
        let decode_err = |message: String| RenderError::Decode {
            format: self,
            message,
        };

        match self {
            Format::Raw => {
                let mut map = Map::new();
                map.insert(RAW_CONTENT_KEY.to_string(), Value::String(raw.to_string()));
                Ok(Value::Object(map))
            }
            Format::Json => serde_json::from_str(raw).map_err(|e| decode_err(e.to_string())),
            Format::Yaml | Format::Yml => {
                serde_yaml::from_str(raw).map_err(|e| decode_err(e.to_string()))
            }
            Format::Toml => {
                let table: toml::Table = toml::from_str(raw).map_err(|e| decode_err(e.to_string()))?;
                serde_json::to_value(table).map_err(|e| decode_err(e.to_string()))
            }
        }
    }

    /// Encodes a structured value into file content.
    pub fn dumps(self, data: &Value) -> Result<String, RenderError> {
        let encode_err = |message: String| RenderError::Encode {
            format: self,
            message,
        };

        match self {
            Format::Raw => data
                .get(RAW_CONTENT_KEY)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or(RenderError::MissingContent),
            Format::Json => {
                serde_json::to_string_pretty(data).map_err(|e| encode_err(e.to_string()))
            }
            Format::Yaml | Format::Yml => {
                serde_yaml::to_string(data).map_err(|e| encode_err(e.to_string()))
            }
            Format::Toml => toml::to_string(data).map_err(|e| encode_err(e.to_string())),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_tag(s).ok_or_else(|| ConfigError::UnknownFormat(s.to_string()))
    }
}
