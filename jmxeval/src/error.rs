//! Error types for query evaluation.

use jmxeval_adapters::ConnectionError;
use jmxeval_types::ObjectNameError;
use thiserror::Error;

/// Why the live value of a query could not be produced.
///
/// Every variant is intercepted by the fallback boundary: a query with a
/// configured fallback value publishes that value instead.
#[derive(Debug, Error)]
pub enum QueryError {
    /// No live session to the remote agent.
    #[error("Could not connect to server")]
    ConnectionUnavailable,

    /// The agent rejected the object or attribute, or the read failed.
    #[error("Attribute lookup failed: {0}")]
    AttributeLookup(#[from] LookupFailure),

    /// The composite or tabular value did not have the expected shape.
    #[error("Composite navigation failed: {0}")]
    CompositeNavigation(String),

    /// A rate variable's value is not an integer counter.
    #[error("Value '{value}' ({kind}) is not an integer counter")]
    InvalidCounter { value: String, kind: &'static str },
}

/// Cause of an attribute lookup failure.
#[derive(Debug, Error)]
pub enum LookupFailure {
    #[error(transparent)]
    ObjectName(#[from] ObjectNameError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

impl From<ObjectNameError> for QueryError {
    fn from(err: ObjectNameError) -> Self {
        QueryError::AttributeLookup(LookupFailure::ObjectName(err))
    }
}

impl From<ConnectionError> for QueryError {
    fn from(err: ConnectionError) -> Self {
        QueryError::AttributeLookup(LookupFailure::Connection(err))
    }
}

/// A query failed and had no fallback value.
///
/// Carries the identifiers of what was being read so the message alone is
/// enough to find the misconfigured query.
#[derive(Debug, Error)]
#[error(
    "Failed to get [{attribute}] from [{object_name}]{}",
    in_composite(.composite_attribute)
)]
pub struct EvaluationError {
    pub variable: String,
    pub object_name: String,
    pub attribute: String,
    pub composite_attribute: Option<String>,
    #[source]
    pub source: QueryError,
}

fn in_composite(composite: &Option<String>) -> String {
    composite
        .as_deref()
        .map(|c| format!(" in [{}]", c))
        .unwrap_or_default()
}
