//! The evaluation context shared by all steps of a run.

use std::collections::BTreeMap;

use jmxeval_adapters::Connection;
use jmxeval_types::AttributeValue;
use tracing::info;

use crate::rate::{RateTracker, StateStore, StateStoreError};

/// Process-wide state of one evaluation run.
///
/// Holds the session to the remote agent (if one could be established), the
/// rate tracker, the published variables, and any recoverable warnings
/// raised while evaluating. Discarded when the run ends.
#[derive(Debug)]
pub struct EvaluationContext {
    connection: Option<Box<dyn Connection>>,
    rate_tracker: RateTracker,
    vars: BTreeMap<String, AttributeValue>,
    warnings: Vec<StateStoreError>,
}

impl EvaluationContext {
    /// Create a context without a session, persisting rate samples in
    /// `store`.
    pub fn new(store: StateStore) -> Self {
        Self {
            connection: None,
            rate_tracker: RateTracker::new(store),
            vars: BTreeMap::new(),
            warnings: Vec::new(),
        }
    }

    /// Attach the session to the remote agent.
    pub fn with_connection(mut self, connection: impl Connection + 'static) -> Self {
        self.connection = Some(Box::new(connection));
        self
    }

    /// The session, if one was established.
    pub fn connection(&self) -> Option<&dyn Connection> {
        self.connection.as_deref()
    }

    /// The rate tracker.
    pub fn rate_tracker(&self) -> &RateTracker {
        &self.rate_tracker
    }

    /// Publish a variable, replacing any previous value.
    pub fn set_var(&mut self, name: impl Into<String>, value: AttributeValue) {
        self.vars.insert(name.into(), value);
    }

    /// Look up a published variable.
    pub fn var(&self, name: &str) -> Option<&AttributeValue> {
        self.vars.get(name)
    }

    /// All published variables in name order.
    pub fn vars(&self) -> &BTreeMap<String, AttributeValue> {
        &self.vars
    }

    /// Record recoverable warnings for the caller to inspect.
    pub fn record_warnings(&mut self, warnings: impl IntoIterator<Item = StateStoreError>) {
        self.warnings.extend(warnings);
    }

    /// Recoverable warnings raised so far.
    pub fn warnings(&self) -> &[StateStoreError] {
        &self.warnings
    }
}

/// Whether dependent steps should run after a value was published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    /// The live value was published; dependent steps may run.
    Proceed,
    /// A substitute was published; dependent steps are skipped.
    Halt,
}

/// How a published value was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    /// Read from the agent (and possibly transformed).
    Live,
    /// The configured fallback value.
    Fallback,
}

/// Publish `value` under `name` and signal whether dependent steps run.
pub fn bind(
    ctx: &mut EvaluationContext,
    name: &str,
    value: AttributeValue,
    source: ValueSource,
) -> Continuation {
    info!(variable = name, %value, ?source, "published");
    ctx.set_var(name, value);

    match source {
        ValueSource::Live => Continuation::Proceed,
        ValueSource::Fallback => Continuation::Halt,
    }
}
