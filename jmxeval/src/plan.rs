//! Ordered evaluation steps.

use std::fmt;

use tracing::debug;

use crate::context::EvaluationContext;
use crate::error::EvaluationError;

/// One unit of work in an evaluation run.
pub trait Step: fmt::Debug {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Run against the shared context.
    fn run(&self, ctx: &mut EvaluationContext) -> Result<(), EvaluationError>;
}

/// Steps run in order, stopping at the first error.
#[derive(Debug, Default)]
pub struct Plan {
    steps: Vec<Box<dyn Step>>,
}

impl Plan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step (builder style).
    pub fn step(mut self, step: impl Step + 'static) -> Self {
        self.push(step);
        self
    }

    pub fn push(&mut self, step: impl Step + 'static) {
        self.steps.push(Box::new(step));
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step in order.
    pub fn run(&self, ctx: &mut EvaluationContext) -> Result<(), EvaluationError> {
        for step in &self.steps {
            debug!(step = step.name(), "running step");
            step.run(ctx)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jmxeval_types::AttributeValue;
    use tempfile::TempDir;

    use crate::error::QueryError;
    use crate::rate::StateStore;

    #[derive(Debug)]
    struct Publish(&'static str);

    impl Step for Publish {
        fn name(&self) -> &str {
            self.0
        }

        fn run(&self, ctx: &mut EvaluationContext) -> Result<(), EvaluationError> {
            let count = ctx.vars().len() as i64;
            ctx.set_var(self.0, AttributeValue::Long(count));
            Ok(())
        }
    }

    #[derive(Debug)]
    struct Fail;

    impl Step for Fail {
        fn name(&self) -> &str {
            "fail"
        }

        fn run(&self, _ctx: &mut EvaluationContext) -> Result<(), EvaluationError> {
            Err(EvaluationError {
                variable: "fail".into(),
                object_name: "app:type=X".into(),
                attribute: "Y".into(),
                composite_attribute: None,
                source: QueryError::ConnectionUnavailable,
            })
        }
    }

    #[test]
    fn steps_run_in_order() {
        let dir = TempDir::new().unwrap();
        let mut ctx = EvaluationContext::new(StateStore::new(dir.path().join("s")));

        let plan = Plan::new().step(Publish("a")).step(Publish("b"));
        assert_eq!(plan.len(), 2);
        plan.run(&mut ctx).unwrap();

        assert_eq!(ctx.var("a"), Some(&AttributeValue::Long(0)));
        assert_eq!(ctx.var("b"), Some(&AttributeValue::Long(1)));
    }

    #[test]
    fn first_error_stops_the_plan() {
        let dir = TempDir::new().unwrap();
        let mut ctx = EvaluationContext::new(StateStore::new(dir.path().join("s")));

        let plan = Plan::new().step(Publish("a")).step(Fail).step(Publish("b"));
        let err = plan.run(&mut ctx).unwrap_err();

        assert_eq!(err.variable, "fail");
        assert!(ctx.var("a").is_some());
        assert!(ctx.var("b").is_none());
    }
}
