//! Decoding JSON attribute values into [`AttributeValue`].
//!
//! Agents that speak JSON flatten every attribute shape into JSON values.
//! The mapping back is:
//!
//! - `null`, booleans and strings map to the matching scalar
//! - integral numbers map to `Long`, everything else numeric to `Double`
//! - arrays of strings map to `Strings`, any other array to `Array`
//! - an object whose members are all objects carrying a `key` and a `value`
//!   member is a table indexed by `key`
//! - an object whose members are all non-empty objects is a map of records
//!   (an MXBean `Map<String, CompositeData>`, e.g. a collector's
//!   `memoryUsageAfterGc`); it becomes a table indexed by `key` with one
//!   synthesized `{key, value}` row per member
//! - any other object is a composite record

use jmxeval_types::{AttributeValue, CompositeData, TabularData};
use serde_json::Value;

/// Index field of key/value tables.
const TABLE_KEY: &str = "key";
const TABLE_VALUE: &str = "value";

/// Convert a JSON value into an attribute value.
pub fn decode_value(value: Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null,
        Value::Bool(b) => AttributeValue::Boolean(b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => AttributeValue::Long(i),
            None => AttributeValue::Double(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => AttributeValue::String(s),
        Value::Array(items) => decode_array(items),
        Value::Object(map) => {
            if is_key_value_table(&map) {
                let mut table = TabularData::new([TABLE_KEY]);
                for (_, row) in map {
                    if let AttributeValue::Composite(row) = decode_value(row) {
                        // Rows were checked to carry the index field.
                        let _ = table.insert(row);
                    }
                }
                AttributeValue::Tabular(table)
            } else if is_record_map(&map) {
                let mut table = TabularData::new([TABLE_KEY]);
                for (name, record) in map {
                    let row = CompositeData::builder()
                        .field(TABLE_KEY, name)
                        .field(TABLE_VALUE, decode_value(record))
                        .build();
                    // Always carries the index field.
                    let _ = table.insert(row);
                }
                AttributeValue::Tabular(table)
            } else {
                AttributeValue::Composite(
                    map.into_iter()
                        .map(|(name, v)| (name, decode_value(v)))
                        .collect::<CompositeData>(),
                )
            }
        }
    }
}

fn decode_array(items: Vec<Value>) -> AttributeValue {
    if !items.is_empty() && items.iter().all(Value::is_string) {
        let strings = items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect();
        AttributeValue::Strings(strings)
    } else {
        AttributeValue::Array(items.into_iter().map(decode_value).collect())
    }
}

fn is_key_value_table(map: &serde_json::Map<String, Value>) -> bool {
    !map.is_empty()
        && map.values().all(|row| {
            row.as_object().is_some_and(|r| {
                r.len() == 2 && r.contains_key(TABLE_KEY) && r.contains_key(TABLE_VALUE)
            })
        })
}

fn is_record_map(map: &serde_json::Map<String, Value>) -> bool {
    !map.is_empty()
        && map
            .values()
            .all(|member| member.as_object().is_some_and(|m| !m.is_empty()))
}
