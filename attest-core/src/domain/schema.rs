// attest-core/src/domain/schema.rs

use crate::domain::error::DomainError;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use std::fmt;
use std::str::FromStr;

/// Strict `major.minor.patch` version. No pre-release tags, no build metadata,
/// no partial forms. Ordering is numeric by component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl FromStr for Version {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('.');
        let (major, minor, patch) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(a), Some(b), Some(c), None) => (a, b, c),
            _ => return Err(DomainError::InvalidVersion(s.to_string())),
        };

        let component = |part: &str| -> Result<u32, DomainError> {
            // "01" and "1 " are rejected: digits only, nothing else.
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(DomainError::InvalidVersion(s.to_string()));
            }
            part.parse()
                .map_err(|_| DomainError::InvalidVersion(s.to_string()))
        };

        Ok(Self {
            major: component(major)?,
            minor: component(minor)?,
            patch: component(patch)?,
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl Serialize for Version {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Version::from_str(&s).map_err(|e| de::Error::custom(e.to_string()))
    }
}

/// A named, versioned data contract. Identity is the `(name, version)` tuple:
/// two schemas are the same contract only on an exact match of both.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Schema {
    pub name: String,
    pub version: Version,
}

impl Schema {
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }

    /// Parses a `name/major.minor.patch` reference (the form used by the
    /// `output_schema` override in runbooks).
    pub fn parse_ref(reference: &str) -> Result<Self, DomainError> {
        let (name, version) = reference
            .split_once('/')
            .ok_or_else(|| DomainError::InvalidVersion(reference.to_string()))?;
        if name.is_empty() {
            return Err(DomainError::InvalidVersion(reference.to_string()));
        }
        Ok(Self::new(name, version.parse()?))
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.version)
    }
}

/// One schema a processor needs on its inputs. Combinations of these declare
/// the valid input sets; matching is exact on the `(name, version)` tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InputRequirement {
    pub schema_name: String,
    pub version: Version,
}

impl InputRequirement {
    pub fn new(schema_name: impl Into<String>, version: Version) -> Self {
        Self {
            schema_name: schema_name.into(),
            version,
        }
    }

    pub fn of(schema: &Schema) -> Self {
        Self {
            schema_name: schema.name.clone(),
            version: schema.version,
        }
    }

    pub fn schema(&self) -> Schema {
        Schema::new(self.schema_name.clone(), self.version)
    }

    pub fn matches(&self, schema: &Schema) -> bool {
        self.schema_name == schema.name && self.version == schema.version
    }
}

impl fmt::Display for InputRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.schema_name, self.version)
    }
}
