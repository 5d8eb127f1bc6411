//! # jmxeval-types
//!
//! Value model for evaluating attributes exposed by managed objects on a
//! remote agent. An attribute read can yield a scalar, a sequence, a
//! composite record, or a tabular collection of composite records; this
//! crate models all of them as one explicit tagged enum so every consumer
//! handles each shape exhaustively.
//!
//! ## Design Goals
//!
//! - **Explicit shapes**: [`AttributeValue`] replaces runtime type inspection
//! - **Exact rates**: [`Decimal`] keeps published rates at a fixed scale
//!   (`60.00`, never `59.999999`)
//! - **Validated identifiers**: [`ObjectName`] rejects malformed managed-object
//!   names before anything is sent to the remote agent
//! - **Optional serialization**: enable `serde` as needed
//!
//! ## Example
//!
//! ```rust
//! use jmxeval_types::{AttributeValue, CompositeData, ObjectName};
//!
//! let name = ObjectName::parse("java.lang:type=Memory").unwrap();
//! assert_eq!(name.domain(), "java.lang");
//!
//! let usage = CompositeData::builder()
//!     .field("used", 1024_i64)
//!     .field("max", 4096_i64)
//!     .build();
//!
//! let value = AttributeValue::Composite(usage);
//! assert_eq!(
//!     value.as_composite().and_then(|c| c.get("used")),
//!     Some(&AttributeValue::Long(1024))
//! );
//! ```

mod composite;
mod decimal;
mod object_name;
mod value;

pub use composite::*;
pub use decimal::*;
pub use object_name::*;
pub use value::*;
