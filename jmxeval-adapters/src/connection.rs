//! The connection seam and an in-memory implementation.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::fs;
use std::path::Path;

use jmxeval_types::{AttributeValue, ObjectName};
use serde_json::Value;
use tracing::debug;

use crate::decode::decode_value;
use crate::ConnectionError;

/// A live session with a remote agent.
///
/// Implementations perform one blocking attribute read per call. Timeouts
/// are the implementation's business; callers do not add their own.
///
/// # Example
///
/// ```
/// use jmxeval_adapters::{Connection, StaticConnection};
/// use jmxeval_types::{AttributeValue, ObjectName};
///
/// let conn = StaticConnection::new()
///     .with_attribute("java.lang:type=Threading", "ThreadCount", 42_i64);
///
/// let name = ObjectName::parse("java.lang:type=Threading").unwrap();
/// assert_eq!(
///     conn.get_attribute(&name, "ThreadCount").unwrap(),
///     AttributeValue::Long(42)
/// );
/// ```
pub trait Connection: Debug {
    /// Read the current value of `attribute` on `object_name`.
    fn get_attribute(
        &self,
        object_name: &ObjectName,
        attribute: &str,
    ) -> Result<AttributeValue, ConnectionError>;

    /// Returns a human-readable description of the connection.
    fn description(&self) -> &str;
}

impl<C: Connection + ?Sized> Connection for Box<C> {
    fn get_attribute(
        &self,
        object_name: &ObjectName,
        attribute: &str,
    ) -> Result<AttributeValue, ConnectionError> {
        (**self).get_attribute(object_name, attribute)
    }

    fn description(&self) -> &str {
        (**self).description()
    }
}

/// A connection answering from a fixed set of attribute values.
///
/// Useful for offline evaluation against a captured dump and in tests.
/// Values are keyed by the object name text exactly as configured.
#[derive(Debug, Clone, Default)]
pub struct StaticConnection {
    objects: BTreeMap<String, BTreeMap<String, AttributeValue>>,
    description: String,
}

impl StaticConnection {
    /// Create an empty connection.
    pub fn new() -> Self {
        Self {
            objects: BTreeMap::new(),
            description: "static".to_string(),
        }
    }

    /// Add an attribute value.
    pub fn with_attribute(
        mut self,
        object_name: impl Into<String>,
        attribute: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Self {
        self.insert(object_name, attribute, value);
        self
    }

    /// Set an attribute value, replacing any previous one.
    pub fn insert(
        &mut self,
        object_name: impl Into<String>,
        attribute: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) {
        self.objects
            .entry(object_name.into())
            .or_default()
            .insert(attribute.into(), value.into());
    }

    /// Load a JSON dump of the form `{"<object name>": {"<attribute>": <value>}}`.
    pub fn from_json_str(json: &str) -> Result<Self, ConnectionError> {
        let dump: BTreeMap<String, BTreeMap<String, Value>> =
            serde_json::from_str(json).map_err(|e| ConnectionError::Parse(e.to_string()))?;

        let objects = dump
            .into_iter()
            .map(|(object, attributes)| {
                let attributes = attributes
                    .into_iter()
                    .map(|(name, value)| (name, decode_value(value)))
                    .collect();
                (object, attributes)
            })
            .collect();

        Ok(Self {
            objects,
            description: "static".to_string(),
        })
    }

    /// Load a JSON dump from a file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConnectionError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| ConnectionError::Connection(format!("{}: {}", path.display(), e)))?;
        let mut conn = Self::from_json_str(&content)?;
        conn.description = format!("file: {}", path.display());
        debug!(
            path = %path.display(),
            objects = conn.objects.len(),
            "Loaded attribute snapshot"
        );
        Ok(conn)
    }
}

impl Connection for StaticConnection {
    fn get_attribute(
        &self,
        object_name: &ObjectName,
        attribute: &str,
    ) -> Result<AttributeValue, ConnectionError> {
        let value = self
            .objects
            .get(object_name.as_str())
            .ok_or_else(|| ConnectionError::NotFound(format!("instance {}", object_name)))?
            .get(attribute)
            .cloned()
            .ok_or_else(|| {
                ConnectionError::NotFound(format!("attribute {} on {}", attribute, object_name))
            })?;

        debug!(
            source = %self.description,
            object = %object_name,
            attribute,
            kind = value.kind(),
            "Read attribute"
        );
        Ok(value)
    }

    fn description(&self) -> &str {
        &self.description
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn name(s: &str) -> ObjectName {
        ObjectName::parse(s).unwrap()
    }

    #[test]
    fn returns_configured_values() {
        let conn = StaticConnection::new().with_attribute("app:type=Server", "Requests", 220_i64);
        assert_eq!(
            conn.get_attribute(&name("app:type=Server"), "Requests").unwrap(),
            AttributeValue::Long(220)
        );
    }

    #[test]
    fn unknown_object_and_attribute_are_not_found() {
        let conn = StaticConnection::new().with_attribute("app:type=Server", "Requests", 1_i64);
        assert!(matches!(
            conn.get_attribute(&name("app:type=Other"), "Requests"),
            Err(ConnectionError::NotFound(_))
        ));
        assert!(matches!(
            conn.get_attribute(&name("app:type=Server"), "Missing"),
            Err(ConnectionError::NotFound(_))
        ));
    }

    #[test]
    fn loads_json_dump_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{
                "java.lang:type=Memory": {{
                    "HeapMemoryUsage": {{"used": 100, "max": 400}}
                }},
                "java.lang:type=Runtime": {{
                    "InputArguments": ["-Xmx1g"]
                }}
            }}"#
        )
        .unwrap();

        let conn = StaticConnection::from_file(file.path()).unwrap();
        assert!(conn.description().starts_with("file: "));

        let heap = conn
            .get_attribute(&name("java.lang:type=Memory"), "HeapMemoryUsage")
            .unwrap();
        assert!(heap.as_composite().is_some());

        let args = conn
            .get_attribute(&name("java.lang:type=Runtime"), "InputArguments")
            .unwrap();
        assert_eq!(args, AttributeValue::Strings(vec!["-Xmx1g".into()]));
    }

    #[test]
    fn invalid_json_is_a_parse_error() {
        assert!(matches!(
            StaticConnection::from_json_str("not json"),
            Err(ConnectionError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_is_a_connection_error() {
        assert!(matches!(
            StaticConnection::from_file("/nonexistent/dump.json"),
            Err(ConnectionError::Connection(_))
        ));
    }
}
