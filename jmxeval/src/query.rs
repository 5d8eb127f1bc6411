//! Query evaluation: fetch, navigate, transform, publish, with fallback.
//!
//! ```text
//! fetch_attribute ──▶ navigate_composite? ──▶ rate / gc pool? ──▶ bind
//!        └───────────── any QueryError ─────────────┘
//!                            │
//!              value_on_failure? ── yes ──▶ bind fallback
//!                            └───── no ───▶ EvaluationError
//! ```

use std::time::{SystemTime, UNIX_EPOCH};

use jmxeval_types::AttributeValue;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::context::{bind, Continuation, EvaluationContext, ValueSource};
use crate::error::{EvaluationError, QueryError};
use crate::fetch::{fetch_attribute, gc_pool_used, is_gc_pool_variable, navigate_composite};
use crate::plan::{Plan, Step};
use crate::rate::{is_rate_variable, StateStoreError};

/// What to read and where to publish it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QueryDefinition {
    /// Variable the result is published under.
    pub var: String,
    /// Managed-object name, `domain:key=value,...`.
    pub object_name: String,
    /// Attribute to read, or the field to extract when
    /// `composite_attribute` is set.
    pub attribute: String,
    /// Composite attribute to read `attribute` from.
    #[serde(default)]
    pub composite_attribute: Option<String>,
    /// Value published when the live read fails.
    #[serde(default)]
    pub value_on_failure: Option<String>,
}

impl QueryDefinition {
    /// Create a plain attribute query.
    pub fn new(
        var: impl Into<String>,
        object_name: impl Into<String>,
        attribute: impl Into<String>,
    ) -> Self {
        Self {
            var: var.into(),
            object_name: object_name.into(),
            attribute: attribute.into(),
            composite_attribute: None,
            value_on_failure: None,
        }
    }

    /// Read `attribute` as a field of this composite attribute.
    pub fn composite(mut self, composite_attribute: impl Into<String>) -> Self {
        self.composite_attribute = Some(composite_attribute.into());
        self
    }

    /// Publish this value when the live read fails.
    pub fn value_on_failure(mut self, value: impl Into<String>) -> Self {
        self.value_on_failure = Some(value.into());
        self
    }

    /// The composite attribute, if set and not blank.
    pub fn composite_name(&self) -> Option<&str> {
        self.composite_attribute
            .as_deref()
            .filter(|c| !c.trim().is_empty())
    }
}

/// Outcome of a successful evaluation.
#[must_use = "an evaluation carries state file warnings that should be reported"]
#[derive(Debug)]
pub struct Evaluation {
    /// The published value.
    pub value: AttributeValue,
    /// Whether the value is live or the fallback.
    pub source: ValueSource,
    /// What dependent steps should do.
    pub continuation: Continuation,
    /// Recoverable state file problems.
    pub warnings: Vec<StateStoreError>,
}

/// A query step: evaluates one definition and then its dependent steps.
#[derive(Debug)]
pub struct Query {
    def: QueryDefinition,
    children: Plan,
}

impl Query {
    /// Create a query without dependent steps.
    pub fn new(def: QueryDefinition) -> Self {
        Self {
            def,
            children: Plan::new(),
        }
    }

    /// Add a step that runs after a live publish.
    pub fn child(mut self, step: impl Step + 'static) -> Self {
        self.children = self.children.step(step);
        self
    }

    /// The query's definition.
    pub fn definition(&self) -> &QueryDefinition {
        &self.def
    }

    /// Evaluate and publish at the current time.
    pub fn evaluate(&self, ctx: &mut EvaluationContext) -> Result<Evaluation, EvaluationError> {
        self.evaluate_at(ctx, current_timestamp_ms())
    }

    /// Evaluate and publish as if the time were `now_ms`.
    ///
    /// Any [`QueryError`] is replaced by the fallback value when one is
    /// configured; otherwise it is returned wrapped with the query's
    /// identifiers.
    pub fn evaluate_at(
        &self,
        ctx: &mut EvaluationContext,
        now_ms: i64,
    ) -> Result<Evaluation, EvaluationError> {
        let def = &self.def;

        let (value, source, warnings) = match self.retrieve(ctx, now_ms) {
            Ok((value, warnings)) => (value, ValueSource::Live, warnings),
            Err(err) => match &def.value_on_failure {
                Some(fallback) => {
                    warn!(variable = %def.var, error = %err, "using value on failure");
                    (
                        AttributeValue::String(fallback.clone()),
                        ValueSource::Fallback,
                        Vec::new(),
                    )
                }
                None => {
                    return Err(EvaluationError {
                        variable: def.var.clone(),
                        object_name: def.object_name.clone(),
                        attribute: def.attribute.clone(),
                        composite_attribute: def.composite_attribute.clone(),
                        source: err,
                    })
                }
            },
        };

        let continuation = bind(ctx, &def.var, value.clone(), source);

        Ok(Evaluation {
            value,
            source,
            continuation,
            warnings,
        })
    }

    fn retrieve(
        &self,
        ctx: &EvaluationContext,
        now_ms: i64,
    ) -> Result<(AttributeValue, Vec<StateStoreError>), QueryError> {
        let def = &self.def;
        let connection = ctx.connection();

        let value = match def.composite_name() {
            None => fetch_attribute(connection, &def.object_name, &def.attribute)?,
            Some(composite) => {
                let data = fetch_attribute(connection, &def.object_name, composite)?;
                navigate_composite(data, &def.attribute)?
            }
        };
        debug!(variable = %def.var, kind = value.kind(), "fetched");

        if is_rate_variable(&def.var) {
            let counter = value.as_counter().ok_or_else(|| QueryError::InvalidCounter {
                value: value.to_string(),
                kind: value.kind(),
            })?;
            let reading = ctx.rate_tracker().track(&def.var, counter, now_ms);
            return Ok((AttributeValue::Decimal(reading.rate), reading.warnings));
        }

        if is_gc_pool_variable(&def.var) {
            if let AttributeValue::Tabular(table) = &value {
                return Ok((AttributeValue::Long(gc_pool_used(table)?), Vec::new()));
            }
        }

        Ok((value, Vec::new()))
    }
}

impl Step for Query {
    fn name(&self) -> &str {
        &self.def.var
    }

    fn run(&self, ctx: &mut EvaluationContext) -> Result<(), EvaluationError> {
        let evaluation = self.evaluate(ctx)?;
        // Already logged by the tracker.
        ctx.record_warnings(evaluation.warnings);

        match evaluation.continuation {
            Continuation::Proceed => self.children.run(ctx),
            Continuation::Halt => Ok(()),
        }
    }
}

/// Milliseconds since the Unix epoch.
pub fn current_timestamp_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
