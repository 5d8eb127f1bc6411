//! Composite and tabular values.

use std::collections::BTreeMap;
use std::fmt;

use crate::AttributeValue;

/// A structured record of named sub-fields.
///
/// Fields are kept in name order so rendering and comparisons are stable.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct CompositeData {
    fields: BTreeMap<String, AttributeValue>,
}

impl CompositeData {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder for a record.
    pub fn builder() -> CompositeDataBuilder {
        CompositeDataBuilder::new()
    }

    /// Look up a field by name.
    pub fn get(&self, field: &str) -> Option<&AttributeValue> {
        self.fields.get(field)
    }

    /// Check whether a field is present.
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Set a field, returning the previous value if any.
    pub fn insert(
        &mut self,
        field: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Option<AttributeValue> {
        self.fields.insert(field.into(), value.into())
    }

    /// Iterate over `(field, value)` pairs in field-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttributeValue)> {
        self.fields.iter()
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<(String, AttributeValue)> for CompositeData {
    fn from_iter<I: IntoIterator<Item = (String, AttributeValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for CompositeData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", name, value)?;
        }
        f.write_str("}")
    }
}

/// Builder for `CompositeData`.
#[derive(Debug, Default)]
pub struct CompositeDataBuilder {
    fields: BTreeMap<String, AttributeValue>,
}

impl CompositeDataBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Add a nested composite field.
    pub fn composite<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: FnOnce(CompositeDataBuilder) -> CompositeDataBuilder,
    {
        let nested = f(CompositeDataBuilder::new()).build();
        self.fields
            .insert(name.into(), AttributeValue::Composite(nested));
        self
    }

    /// Build the record.
    pub fn build(self) -> CompositeData {
        CompositeData {
            fields: self.fields,
        }
    }
}

/// A keyed collection of composite records.
///
/// Each row is indexed by the rendered values of the `index` fields, so a
/// table with index `["key"]` holding a row whose `key` field is
/// `"CMS Old Gen"` is looked up with `get(&["CMS Old Gen"])`.
///
/// Serialized as `{"index": [...], "rows": [...]}`; row keys are rebuilt
/// from the index fields on the way back in.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(try_from = "TabularRepr", into = "TabularRepr")
)]
pub struct TabularData {
    index: Vec<String>,
    rows: BTreeMap<Vec<String>, CompositeData>,
}

impl TabularData {
    /// Create an empty table indexed by the given field names.
    pub fn new<I, S>(index: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            index: index.into_iter().map(Into::into).collect(),
            rows: BTreeMap::new(),
        }
    }

    /// The index field names.
    pub fn index(&self) -> &[String] {
        &self.index
    }

    /// Insert a row, keyed by its index field values.
    ///
    /// Returns the row back when it lacks one of the index fields.
    pub fn insert(&mut self, row: CompositeData) -> Result<(), CompositeData> {
        let mut key = Vec::with_capacity(self.index.len());
        for name in &self.index {
            match row.get(name) {
                Some(value) => key.push(value.to_string()),
                None => return Err(row),
            }
        }
        self.rows.insert(key, row);
        Ok(())
    }

    /// Look up the row with the given index values.
    pub fn get<S: AsRef<str>>(&self, key: &[S]) -> Option<&CompositeData> {
        let key: Vec<String> = key.iter().map(|k| k.as_ref().to_string()).collect();
        self.rows.get(&key)
    }

    /// Iterate over rows in key order.
    pub fn rows(&self) -> impl Iterator<Item = (&Vec<String>, &CompositeData)> {
        self.rows.iter()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(feature = "serde")]
#[derive(serde::Serialize, serde::Deserialize)]
struct TabularRepr {
    index: Vec<String>,
    rows: Vec<CompositeData>,
}

#[cfg(feature = "serde")]
impl From<TabularData> for TabularRepr {
    fn from(table: TabularData) -> Self {
        Self {
            index: table.index,
            rows: table.rows.into_values().collect(),
        }
    }
}

#[cfg(feature = "serde")]
impl TryFrom<TabularRepr> for TabularData {
    type Error = String;

    fn try_from(repr: TabularRepr) -> Result<Self, Self::Error> {
        let mut table = TabularData::new(repr.index);
        for row in repr.rows {
            table
                .insert(row)
                .map_err(|row| format!("row {} lacks an index field", row))?;
        }
        Ok(table)
    }
}

impl fmt::Display for TabularData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, row) in self.rows.values().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", row)?;
        }
        f.write_str("]")
    }
}
