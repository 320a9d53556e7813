use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Host → record type token → presentation values, in declaration order
pub type HostRecords = BTreeMap<String, BTreeMap<String, Vec<String>>>;

/// The declarative zone set served by the workbench.
///
/// ```yaml
/// zones:
///   example.com:
///     example.com:
///       a: ["1.2.3.4"]
///     mail.example.com:
///       mx: ["10 mx.example.com"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneDefinition {
    #[serde(default)]
    pub zones: BTreeMap<String, HostRecords>,
}

#[derive(Error, Debug)]
pub enum DefinitionError {
    #[error("Failed to read zone file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode YAML zone definition: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to decode JSON zone definition: {0}")]
    Json(#[from] serde_json::Error),
}

impl ZoneDefinition {
    pub fn from_yaml_str(content: &str) -> Result<Self, DefinitionError> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn from_json_str(content: &str) -> Result<Self, DefinitionError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Load a zone file; `.json` files are read as JSON, anything else as YAML
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, DefinitionError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| DefinitionError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_yaml_str(&content)
        }
    }

    pub fn to_json(&self) -> Result<String, DefinitionError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Builder-style helper, mostly for tests and tooling
    pub fn with_record(mut self, zone: &str, host: &str, rtype: &str, value: &str) -> Self {
        self.zones
            .entry(zone.to_string())
            .or_default()
            .entry(host.to_string())
            .or_default()
            .entry(rtype.to_string())
            .or_default()
            .push(value.to_string());
        self
    }

    pub fn zone_count(&self) -> usize {
        self.zones.len()
    }
}
