//! # jmxeval
//!
//! Evaluate one attribute of a managed object on a remote agent, derive a
//! per-minute rate for counters across invocations, and publish the result
//! as a named variable.
//!
//! Built for monitoring check plugins: each invocation evaluates a single
//! metric and exits, with rate samples carried between runs in a small
//! state file.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       EvaluationContext                      │
//! │   connection ─────────────┐          vars ◀──────┐           │
//! │   rate_tracker ───┐       │                      │           │
//! └───────────────────┼───────┼──────────────────────┼───────────┘
//!                     │       ▼                      │
//!  Plan ─▶ Query ─▶ fetch ─▶ navigate ─▶ rate ─▶ bind ─▶ children
//!                     │                    │
//!                     └──── StateStore ◀───┘   (lock, load, save)
//! ```
//!
//! - **[`fetch`]**: reads an attribute through the [`Connection`] and
//!   navigates composite and tabular values
//! - **[`rate`]**: the [`RateTracker`] and its file-backed [`StateStore`]
//! - **[`query`]**: a [`Query`] ties retrieval, rate derivation and the
//!   fallback value together
//! - **[`plan`]**: sequential [`Step`]s sharing one [`EvaluationContext`]
//! - **[`config`]**: [`Settings`] loaded from a file and the environment
//!
//! ## Usage
//!
//! ```
//! use jmxeval::{EvaluationContext, Query, QueryDefinition, StateStore};
//! use jmxeval_adapters::StaticConnection;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let conn = StaticConnection::new()
//!     .with_attribute("java.lang:type=Threading", "ThreadCount", 42_i64);
//! let mut ctx = EvaluationContext::new(StateStore::new(dir.path().join("state")))
//!     .with_connection(conn);
//!
//! let query = Query::new(QueryDefinition::new("Threads", "java.lang:type=Threading", "ThreadCount"));
//! let eval = query.evaluate(&mut ctx).unwrap();
//! assert_eq!(eval.value.to_string(), "42");
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod fetch;
pub mod plan;
pub mod query;
pub mod rate;

pub use self::config::{ConfigError, ConnectionSettings, ConnectionTarget, Settings};
pub use context::{bind, Continuation, EvaluationContext, ValueSource};
pub use error::{EvaluationError, LookupFailure, QueryError};
pub use fetch::{fetch_attribute, navigate_composite};
pub use plan::{Plan, Step};
pub use query::{current_timestamp_ms, Evaluation, Query, QueryDefinition};
pub use rate::{RateReading, RateState, RateTracker, Sample, StateStore, StateStoreError};

pub use jmxeval_adapters::Connection;
pub use jmxeval_types::AttributeValue;
