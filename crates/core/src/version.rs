//! Schema version identifiers.
//!
//! A version is a non-empty sequence of unsigned integer components. Ordering
//! is lexicographic over the components and trailing zero components are
//! insignificant, so `1`, `1.0` and `1_0` all denote the same version.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::VersionError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "VersionRepr", into = "VersionRepr")]
pub struct Version {
    components: Vec<u64>,
}

impl Version {
    /// Build a version from components. Trailing zeros are dropped.
    pub fn new(components: impl Into<Vec<u64>>) -> Self {
        let mut components = components.into();
        while components.len() > 1 && components.last() == Some(&0) {
            components.pop();
        }
        if components.is_empty() {
            components.push(0);
        }
        Version { components }
    }

    pub fn components(&self) -> &[u64] {
        &self.components
    }

    /// Parse a version from text. Components are separated by `.` or `_`.
    pub fn parse(input: &str) -> Result<Version, VersionError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(VersionError {
                input: input.to_string(),
                message: "version is empty".to_string(),
            });
        }

        let mut components = Vec::new();
        for part in trimmed.split(['.', '_']) {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(VersionError {
                    input: input.to_string(),
                    message: format!("'{}' is not a numeric component", part),
                });
            }
            let n = part.parse::<u64>().map_err(|e| VersionError {
                input: input.to_string(),
                message: e.to_string(),
            })?;
            components.push(n);
        }
        Ok(Version::new(components))
    }

    /// Read a version from a document value (number or string).
    pub fn from_value(value: &Value) -> Result<Version, VersionError> {
        match value {
            Value::Number(n) => {
                if let Some(n) = n.as_u64() {
                    Ok(Version::new(vec![n]))
                } else {
                    Version::parse(&n.to_string())
                }
            }
            Value::String(s) => Version::parse(s),
            other => Err(VersionError {
                input: other.to_string(),
                message: "expected a number or a string".to_string(),
            }),
        }
    }

    /// Value written back into documents: a number for single-component
    /// versions, a dotted string otherwise.
    pub fn to_value(&self) -> Value {
        match self.components.as_slice() {
            [n] => Value::from(*n),
            _ => Value::String(self.to_string()),
        }
    }

    /// Like [`Version::to_value`], but a version field that already holds a
    /// string keeps holding one.
    pub fn to_value_like(&self, existing: Option<&Value>) -> Value {
        match existing {
            Some(Value::String(_)) => Value::String(self.to_string()),
            _ => self.to_value(),
        }
    }
}

impl From<u64> for Version {
    fn from(n: u64) -> Self {
        Version::new(vec![n])
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.components.cmp(&other.components)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, c) in self.components.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

/// Wire form used by serde: versions may be written as numbers or strings.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum VersionRepr {
    Number(u64),
    Text(String),
}

impl TryFrom<VersionRepr> for Version {
    type Error = VersionError;

    fn try_from(repr: VersionRepr) -> Result<Self, Self::Error> {
        match repr {
            VersionRepr::Number(n) => Ok(Version::from(n)),
            VersionRepr::Text(s) => Version::parse(&s),
        }
    }
}

impl From<Version> for VersionRepr {
    fn from(v: Version) -> Self {
        match v.components.as_slice() {
            [n] => VersionRepr::Number(*n),
            _ => VersionRepr::Text(v.to_string()),
        }
    }
}
