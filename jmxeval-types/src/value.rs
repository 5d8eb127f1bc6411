//! The attribute value union.

use core::fmt;

use crate::{CompositeData, Decimal, TabularData};

/// Whatever a remote attribute read yields.
///
/// The shape decides which transform applies downstream: composite values
/// can be navigated, tabular values feed the fixed memory-pool path, and
/// integer-like scalars can be tracked as counters.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AttributeValue {
    /// The agent returned no value.
    #[default]
    Null,

    Boolean(bool),

    /// Integral number (int, long, short, byte on the agent side).
    Long(i64),

    /// Floating point number.
    Double(f64),

    /// Fixed-point number, used for computed rates.
    Decimal(Decimal),

    String(String),

    /// Ordered sequence of strings.
    Strings(Vec<String>),

    /// Sequence of anything that is not all strings.
    Array(Vec<AttributeValue>),

    /// Structured record of named sub-fields.
    Composite(CompositeData),

    /// Keyed collection of composite records.
    Tabular(TabularData),
}

impl AttributeValue {
    /// Check if the value is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    /// Borrow the composite record, if this is one.
    pub fn as_composite(&self) -> Option<&CompositeData> {
        match self {
            AttributeValue::Composite(c) => Some(c),
            _ => None,
        }
    }

    /// Borrow the tabular collection, if this is one.
    pub fn as_tabular(&self) -> Option<&TabularData> {
        match self {
            AttributeValue::Tabular(t) => Some(t),
            _ => None,
        }
    }

    /// Interpret the value as a monotonic counter reading.
    ///
    /// Integral values are taken as-is and strings are parsed as base-10
    /// integers. Every other shape (including doubles) is not a counter.
    pub fn as_counter(&self) -> Option<i64> {
        match self {
            AttributeValue::Long(v) => Some(*v),
            AttributeValue::String(s) => s.trim().parse().ok(),
            AttributeValue::Null
            | AttributeValue::Boolean(_)
            | AttributeValue::Double(_)
            | AttributeValue::Decimal(_)
            | AttributeValue::Strings(_)
            | AttributeValue::Array(_)
            | AttributeValue::Composite(_)
            | AttributeValue::Tabular(_) => None,
        }
    }

    /// Short name of the value's shape, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            AttributeValue::Null => "null",
            AttributeValue::Boolean(_) => "boolean",
            AttributeValue::Long(_) => "long",
            AttributeValue::Double(_) => "double",
            AttributeValue::Decimal(_) => "decimal",
            AttributeValue::String(_) => "string",
            AttributeValue::Strings(_) => "string sequence",
            AttributeValue::Array(_) => "array",
            AttributeValue::Composite(_) => "composite",
            AttributeValue::Tabular(_) => "tabular",
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Null => f.write_str("null"),
            AttributeValue::Boolean(b) => write!(f, "{}", b),
            AttributeValue::Long(v) => write!(f, "{}", v),
            AttributeValue::Double(v) => write!(f, "{}", v),
            AttributeValue::Decimal(d) => write!(f, "{}", d),
            AttributeValue::String(s) => f.write_str(s),
            AttributeValue::Strings(items) => write!(f, "[{}]", items.join(", ")),
            AttributeValue::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            AttributeValue::Composite(c) => write!(f, "{}", c),
            AttributeValue::Tabular(t) => write!(f, "{}", t),
        }
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        AttributeValue::Boolean(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Long(v)
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Double(v)
    }
}

impl From<Decimal> for AttributeValue {
    fn from(v: Decimal) -> Self {
        AttributeValue::Decimal(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::String(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::String(v)
    }
}

impl From<Vec<String>> for AttributeValue {
    fn from(v: Vec<String>) -> Self {
        AttributeValue::Strings(v)
    }
}

impl From<CompositeData> for AttributeValue {
    fn from(v: CompositeData) -> Self {
        AttributeValue::Composite(v)
    }
}

impl From<TabularData> for AttributeValue {
    fn from(v: TabularData) -> Self {
        AttributeValue::Tabular(v)
    }
}
