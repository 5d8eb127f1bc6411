//! Attribute retrieval and composite navigation.

use jmxeval_adapters::Connection;
use jmxeval_types::{AttributeValue, ObjectName, TabularData};
use tracing::debug;

use crate::error::QueryError;

/// Variables whose name contains this marker get the memory-pool
/// extraction applied to tabular values.
pub const GC_POOL_MARKER: &str = "CMSOldGen";

/// Row key of the old generation pool in a collector's memory usage table.
pub const GC_POOL_KEY: &str = "CMS Old Gen";

/// Read `attribute` of `object_name` through the session.
///
/// The session is checked before anything else; a missing one is
/// `ConnectionUnavailable` and no name parsing or remote call happens.
pub fn fetch_attribute(
    connection: Option<&dyn Connection>,
    object_name: &str,
    attribute: &str,
) -> Result<AttributeValue, QueryError> {
    let connection = connection.ok_or(QueryError::ConnectionUnavailable)?;
    let name = ObjectName::parse(object_name)?;

    debug!(connection = connection.description(), %name, attribute, "fetching attribute");
    let value = connection.get_attribute(&name, attribute)?;

    Ok(normalize(value))
}

/// Collapse an all-string array into an ordered string sequence.
fn normalize(value: AttributeValue) -> AttributeValue {
    match value {
        AttributeValue::Array(items)
            if !items.is_empty()
                && items.iter().all(|v| matches!(v, AttributeValue::String(_))) =>
        {
            AttributeValue::Strings(
                items
                    .into_iter()
                    .filter_map(|v| match v {
                        AttributeValue::String(s) => Some(s),
                        _ => None,
                    })
                    .collect(),
            )
        }
        other => other,
    }
}

/// Extract the `field` leaf of a fetched composite attribute.
pub fn navigate_composite(
    composite: AttributeValue,
    field: &str,
) -> Result<AttributeValue, QueryError> {
    match composite {
        AttributeValue::Null => Err(QueryError::CompositeNavigation(
            "Unable to get composite attribute".to_string(),
        )),
        AttributeValue::Composite(data) => data.get(field).cloned().ok_or_else(|| {
            QueryError::CompositeNavigation(format!("no field '{}' in composite", field))
        }),
        other => Err(QueryError::CompositeNavigation(format!(
            "expected a composite, got {}",
            other.kind()
        ))),
    }
}

/// Check whether a variable gets the memory-pool extraction.
pub fn is_gc_pool_variable(variable: &str) -> bool {
    variable.contains(GC_POOL_MARKER)
}

/// Used bytes of the old generation pool in a collector's memory usage
/// table.
///
/// This is a fixed traversal, not a general tabular query: the row keyed
/// `"CMS Old Gen"`, then its `value` record, then that record's `used`
/// integer.
pub fn gc_pool_used(table: &TabularData) -> Result<i64, QueryError> {
    let row = table.get(&[GC_POOL_KEY]).ok_or_else(|| {
        QueryError::CompositeNavigation(format!("no '{}' row in table", GC_POOL_KEY))
    })?;

    let usage = row
        .get("value")
        .and_then(AttributeValue::as_composite)
        .ok_or_else(|| {
            QueryError::CompositeNavigation(format!("'{}' row has no value record", GC_POOL_KEY))
        })?;

    match usage.get("used") {
        Some(AttributeValue::Long(used)) => Ok(*used),
        Some(other) => Err(QueryError::CompositeNavigation(format!(
            "'{}' used is {}, not an integer",
            GC_POOL_KEY,
            other.kind()
        ))),
        None => Err(QueryError::CompositeNavigation(format!(
            "'{}' usage has no used field",
            GC_POOL_KEY
        ))),
    }
}
