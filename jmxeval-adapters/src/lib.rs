//! # jmxeval-adapters
//!
//! Connections for reading attributes of managed objects on remote agents.
//!
//! This crate defines the [`Connection`] seam the evaluator reads through,
//! plus ready-to-use implementations.
//!
//! ## Supported Connections
//!
//! - **Static** ([`StaticConnection`]) - Answers from an in-memory map or a
//!   captured JSON dump
//! - **Jolokia** (`jolokia` feature) - Reads attributes through the Jolokia
//!   HTTP/JSON bridge
//!
//! ## Quick Start (Jolokia)
//!
//! ```rust,ignore
//! use jmxeval_adapters::jolokia::JolokiaConnection;
//! use jmxeval_adapters::Connection;
//! use jmxeval_types::ObjectName;
//!
//! let conn = JolokiaConnection::builder()
//!     .endpoint("http://localhost:8778/jolokia")
//!     .build()?;
//!
//! let name = ObjectName::parse("java.lang:type=Memory")?;
//! let heap = conn.get_attribute(&name, "HeapMemoryUsage")?;
//! ```

pub mod connection;
pub mod decode;
pub mod error;

#[cfg(feature = "jolokia")]
pub mod jolokia;

pub use connection::{Connection, StaticConnection};
pub use decode::decode_value;
pub use error::ConnectionError;

// Re-export types for convenience
pub use jmxeval_types::{AttributeValue, CompositeData, ObjectName, TabularData};
