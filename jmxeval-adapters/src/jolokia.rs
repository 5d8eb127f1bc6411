//! Jolokia adapter using the agent's HTTP/JSON read endpoint.
//!
//! Jolokia exposes managed objects over HTTP, typically on port 8778.
//! Each attribute read is a single `POST` of a `read` request; the agent
//! answers with the value and a status code embedded in the JSON body.
//!
//! ## Example
//!
//! ```rust,no_run
//! use jmxeval_adapters::jolokia::JolokiaConnection;
//! use jmxeval_adapters::Connection;
//! use jmxeval_types::ObjectName;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let conn = JolokiaConnection::builder()
//!         .endpoint("http://localhost:8778/jolokia")
//!         .credentials("monitor", "secret")
//!         .build()?;
//!
//!     let name = ObjectName::parse("java.lang:type=Threading")?;
//!     let threads = conn.get_attribute(&name, "ThreadCount")?;
//!     println!("threads: {}", threads);
//!
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use jmxeval_types::{AttributeValue, ObjectName};

use crate::decode::decode_value;
use crate::{Connection, ConnectionError};

/// Connection to a Jolokia agent.
#[derive(Debug, Clone)]
pub struct JolokiaConnection {
    client: Client,
    endpoint: String,
    credentials: Option<(String, String)>,
    description: String,
}

impl JolokiaConnection {
    /// Create a new builder for configuring the connection.
    pub fn builder() -> JolokiaConnectionBuilder {
        JolokiaConnectionBuilder::default()
    }

    /// The agent endpoint this connection talks to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn read(&self, object_name: &ObjectName, attribute: &str) -> Result<Value, ConnectionError> {
        let request = ReadRequest {
            kind: "read",
            mbean: object_name.as_str(),
            attribute,
        };

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some((username, password)) = &self.credentials {
            builder = builder.basic_auth(username, Some(password));
        }

        let response = builder.send()?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ConnectionError::Auth("Invalid credentials".to_string()));
        }

        if !response.status().is_success() {
            return Err(ConnectionError::Http(format!(
                "Agent returned status {}",
                response.status()
            )));
        }

        let body: ReadResponse = response
            .json()
            .map_err(|e| ConnectionError::Parse(e.to_string()))?;

        body.into_value(object_name, attribute)
    }
}

impl Connection for JolokiaConnection {
    fn get_attribute(
        &self,
        object_name: &ObjectName,
        attribute: &str,
    ) -> Result<AttributeValue, ConnectionError> {
        debug!(endpoint = %self.endpoint, %object_name, attribute, "jolokia read");
        self.read(object_name, attribute).map(decode_value)
    }

    fn description(&self) -> &str {
        &self.description
    }
}

/// Builder for JolokiaConnection.
#[derive(Debug, Default)]
pub struct JolokiaConnectionBuilder {
    endpoint: Option<String>,
    username: Option<String>,
    password: Option<String>,
    timeout: Option<Duration>,
}

impl JolokiaConnectionBuilder {
    /// Set the agent endpoint (e.g., "http://localhost:8778/jolokia").
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the username and password for authentication.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set the request timeout (default: 10 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the connection.
    pub fn build(self) -> Result<JolokiaConnection, ConnectionError> {
        let timeout = self.timeout.unwrap_or(Duration::from_secs(10));

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConnectionError::Connection(e.to_string()))?;

        let endpoint = self
            .endpoint
            .unwrap_or_else(|| "http://localhost:8778/jolokia".to_string())
            .trim_end_matches('/')
            .to_string();

        let credentials = match (self.username, self.password) {
            (Some(username), password) => Some((username, password.unwrap_or_default())),
            (None, _) => None,
        };

        Ok(JolokiaConnection {
            client,
            description: format!("jolokia: {}", endpoint),
            endpoint,
            credentials,
        })
    }
}

#[derive(Debug, Serialize)]
struct ReadRequest<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    mbean: &'a str,
    attribute: &'a str,
}

/// Response body of a Jolokia `read` request.
#[derive(Debug, Deserialize)]
struct ReadResponse {
    status: u16,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    error_type: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ReadResponse {
    fn into_value(self, object_name: &ObjectName, attribute: &str) -> Result<Value, ConnectionError> {
        match self.status {
            200 => Ok(self.value),
            404 => Err(ConnectionError::NotFound(format!(
                "attribute {} on {}",
                attribute, object_name
            ))),
            401 | 403 => Err(ConnectionError::Auth(
                self.error.unwrap_or_else(|| "Access denied".to_string()),
            )),
            status => Err(ConnectionError::Remote {
                error_type: self
                    .error_type
                    .unwrap_or_else(|| format!("status {}", status)),
                message: self.error.unwrap_or_default(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name() -> ObjectName {
        ObjectName::parse("java.lang:type=Memory").unwrap()
    }

    fn response(json: &str) -> ReadResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_builder_defaults() {
        let conn = JolokiaConnection::builder().build().unwrap();
        assert_eq!(conn.endpoint, "http://localhost:8778/jolokia");
        assert!(conn.credentials.is_none());
        assert_eq!(conn.description(), "jolokia: http://localhost:8778/jolokia");
    }

    #[test]
    fn test_builder_custom() {
        let conn = JolokiaConnection::builder()
            .endpoint("http://app.local:8778/jolokia/")
            .credentials("admin", "secret")
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap();

        assert_eq!(conn.endpoint(), "http://app.local:8778/jolokia");
        assert_eq!(
            conn.credentials,
            Some(("admin".to_string(), "secret".to_string()))
        );
    }

    #[test]
    fn read_request_shape() {
        let name = name();
        let request = ReadRequest {
            kind: "read",
            mbean: name.as_str(),
            attribute: "HeapMemoryUsage",
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "read",
                "mbean": "java.lang:type=Memory",
                "attribute": "HeapMemoryUsage"
            })
        );
    }

    #[test]
    fn successful_response_yields_value() {
        let body = response(r#"{"status": 200, "value": {"used": 10}, "timestamp": 1}"#);
        let value = body.into_value(&name(), "HeapMemoryUsage").unwrap();
        assert_eq!(value, serde_json::json!({"used": 10}));
    }

    #[test]
    fn missing_instance_is_not_found() {
        let body = response(
            r#"{"status": 404, "error_type": "javax.management.InstanceNotFoundException",
                "error": "java.lang:type=Nope"}"#,
        );
        assert!(matches!(
            body.into_value(&name(), "HeapMemoryUsage"),
            Err(ConnectionError::NotFound(_))
        ));
    }

    #[test]
    fn other_errors_carry_remote_type() {
        let body = response(
            r#"{"status": 500, "error_type": "javax.management.ReflectionException",
                "error": "boom"}"#,
        );
        match body.into_value(&name(), "HeapMemoryUsage") {
            Err(ConnectionError::Remote {
                error_type,
                message,
            }) => {
                assert_eq!(error_type, "javax.management.ReflectionException");
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
