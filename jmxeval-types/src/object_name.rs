//! Managed-object identifiers.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Errors from parsing a managed-object identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObjectNameError {
    /// No `:` separating domain from key properties.
    #[error("missing ':' between domain and key properties in '{0}'")]
    MissingDomainSeparator(String),

    /// Nothing after the `:`.
    #[error("no key properties in '{0}'")]
    NoKeyProperties(String),

    /// A key property without `=`, or with an empty key.
    #[error("invalid key property '{property}' in '{name}'")]
    InvalidKeyProperty { name: String, property: String },

    /// The same key given twice.
    #[error("duplicate key '{key}' in '{name}'")]
    DuplicateKey { name: String, key: String },

    /// A quoted value that never closes.
    #[error("unterminated quoted value in '{0}'")]
    UnterminatedQuote(String),
}

/// A parsed managed-object name of the form `domain:key=value[,key=value...]`.
///
/// Values may be quoted (`name="a,b"`) to carry commas or other separators.
/// The original text is kept and used for display, so the name sent to the
/// agent is exactly what was configured.
///
/// # Example
///
/// ```rust
/// use jmxeval_types::ObjectName;
///
/// let name: ObjectName = "java.lang:type=MemoryPool,name=CMS Old Gen".parse().unwrap();
/// assert_eq!(name.domain(), "java.lang");
/// assert_eq!(name.property("name"), Some("CMS Old Gen"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct ObjectName {
    raw: String,
    domain: String,
    properties: Vec<(String, String)>,
}

impl ObjectName {
    /// Parse and validate an identifier.
    pub fn parse(name: &str) -> Result<Self, ObjectNameError> {
        let (domain, rest) = name
            .split_once(':')
            .ok_or_else(|| ObjectNameError::MissingDomainSeparator(name.to_string()))?;

        if rest.trim().is_empty() {
            return Err(ObjectNameError::NoKeyProperties(name.to_string()));
        }

        let mut properties: Vec<(String, String)> = Vec::new();
        for property in split_properties(rest, name)? {
            let (key, value) = property.split_once('=').ok_or_else(|| {
                ObjectNameError::InvalidKeyProperty {
                    name: name.to_string(),
                    property: property.to_string(),
                }
            })?;
            if key.is_empty() {
                return Err(ObjectNameError::InvalidKeyProperty {
                    name: name.to_string(),
                    property: property.to_string(),
                });
            }
            if properties.iter().any(|(k, _)| k == key) {
                return Err(ObjectNameError::DuplicateKey {
                    name: name.to_string(),
                    key: key.to_string(),
                });
            }
            properties.push((key.to_string(), unquote(value).to_string()));
        }

        Ok(Self {
            raw: name.to_string(),
            domain: domain.to_string(),
            properties,
        })
    }

    /// The domain part (before `:`).
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Value of a key property, unquoted.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Key properties in the order they were written.
    pub fn properties(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The identifier exactly as configured.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

/// Split key properties on commas that are not inside a quoted value.
fn split_properties<'a>(rest: &'a str, name: &str) -> Result<Vec<&'a str>, ObjectNameError> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;

    for (i, c) in rest.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                parts.push(&rest[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }

    if in_quotes {
        return Err(ObjectNameError::UnterminatedQuote(name.to_string()));
    }
    parts.push(&rest[start..]);
    Ok(parts)
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

impl FromStr for ObjectName {
    type Err = ObjectNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ObjectName {
    type Error = ObjectNameError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<ObjectName> for String {
    fn from(name: ObjectName) -> Self {
        name.raw
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
