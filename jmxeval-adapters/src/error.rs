//! Error types for connections.

use thiserror::Error;

/// Why an attribute read did not produce a value.
///
/// Every variant is a lookup failure to the evaluator, so a configured
/// fallback value applies to all of them alike.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The agent answered the read request with a non-success HTTP status.
    #[error("Attribute read rejected by agent: {0}")]
    Http(String),

    /// The read response (or a captured dump) is not the expected JSON.
    #[error("Malformed attribute payload: {0}")]
    Parse(String),

    /// The agent refused the credentials.
    #[error("Agent denied access: {0}")]
    Auth(String),

    /// The agent or dump could not be reached at all.
    #[error("Agent unreachable: {0}")]
    Connection(String),

    /// No answer within the connection's read timeout.
    #[error("Attribute read timed out")]
    Timeout,

    /// The agent does not know the object or attribute.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The agent reported an error of its own for the read.
    #[error("{error_type}: {message}")]
    Remote { error_type: String, message: String },
}

#[cfg(feature = "jolokia")]
impl From<reqwest::Error> for ConnectionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ConnectionError::Timeout
        } else if err.is_connect() {
            ConnectionError::Connection(err.to_string())
        } else {
            ConnectionError::Http(err.to_string())
        }
    }
}
