use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::{Result, ZoneError};
use crate::dns::common::{MAX_LABEL_LENGTH, MAX_NAME_LENGTH};

/// A domain name in canonical form: ASCII-lowercased and fully qualified.
///
/// Every key of a snapshot goes through [`ZoneName::parse`], so two spellings
/// that differ only by case or by the trailing dot map to the same entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ZoneName(String);

impl ZoneName {
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = |reason: &str| ZoneError::InvalidName {
            name: raw.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(invalid("empty name"));
        }
        if trimmed == "." {
            return Ok(Self::root());
        }

        let body = trimmed.strip_suffix('.').unwrap_or(trimmed);
        let mut encoded_len = 1;
        for label in body.split('.') {
            if label.is_empty() {
                return Err(invalid("empty label"));
            }
            if label.len() > MAX_LABEL_LENGTH {
                return Err(invalid("label longer than 63 bytes"));
            }
            if !label.bytes().all(|b| b.is_ascii_graphic()) {
                return Err(invalid("label contains whitespace or non-ASCII characters"));
            }
            encoded_len += label.len() + 1;
        }
        if encoded_len > MAX_NAME_LENGTH {
            return Err(invalid("name longer than 255 bytes"));
        }

        let mut canonical = body.to_ascii_lowercase();
        canonical.push('.');
        Ok(Self(canonical))
    }

    /// Canonicalize a name received on the wire. A label carrying a literal
    /// `.` has no presentation form here and is rejected rather than split.
    pub fn from_labels(labels: &[String]) -> Result<Self> {
        if labels.is_empty() {
            return Ok(Self::root());
        }
        if let Some(label) = labels.iter().find(|label| label.contains('.')) {
            return Err(ZoneError::InvalidName {
                name: label.clone(),
                reason: "label contains a dot".to_string(),
            });
        }
        Self::parse(&labels.join("."))
    }

    pub fn root() -> Self {
        Self(".".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == "."
    }

    /// Labels without the root
    pub fn labels(&self) -> Vec<String> {
        if self.is_root() {
            return Vec::new();
        }
        self.0
            .trim_end_matches('.')
            .split('.')
            .map(|l| l.to_string())
            .collect()
    }

    pub fn label_count(&self) -> usize {
        if self.is_root() {
            0
        } else {
            self.0.matches('.').count()
        }
    }

    /// Prefix this name with one more label (`dns.` + server name)
    pub fn prepend(&self, label: &str) -> Result<Self> {
        if self.is_root() {
            return Self::parse(label);
        }
        Self::parse(&format!("{}.{}", label, self.0))
    }
}

impl fmt::Display for ZoneName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ZoneName {
    type Err = ZoneError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl AsRef<str> for ZoneName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for ZoneName {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ZoneName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        ZoneName::parse(&raw).map_err(serde::de::Error::custom)
    }
}
