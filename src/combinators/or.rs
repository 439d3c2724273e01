//! Alternative disjunction

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::Context;
use crate::foundation::{Invalid, IntoValidator, Messages, Validator, Value};

/// Tries validators in order, returning the first success.
///
/// When every alternative fails the error aggregates all branch failures
/// as nested errors, in branch order, so callers can see why each
/// alternative was rejected rather than only the last one.
///
/// # Examples
///
/// ```rust,ignore
/// use trellis::prelude::*;
///
/// let id = IsInt::new().or(Match::pattern(r"^[a-f0-9]{8}$"));
/// assert!(id.context(42).result().is_ok());
/// assert!(id.context("deadbeef").result().is_ok());
/// ```
#[derive(Debug)]
pub struct Or {
    validators: Vec<Arc<dyn Validator>>,
    messages: Messages,
}

impl Or {
    pub fn pair(first: impl IntoValidator, second: impl IntoValidator) -> Self {
        Self {
            validators: vec![first.into_validator(), second.into_validator()],
            messages: Messages::from_pairs(&[("fail", "No criteria matched the value")]),
        }
    }

    /// Appends another alternative, keeping the disjunction flat.
    #[must_use = "builder methods must be chained or built"]
    pub fn or(mut self, other: impl IntoValidator) -> Self {
        self.validators.push(other.into_validator());
        self
    }

    fn exhausted(&self, value: &Value, errors: Vec<Invalid>) -> Invalid {
        self.invalid("fail")
            .with_value(value.clone())
            .with_nested(errors)
    }
}

#[async_trait]
impl Validator for Or {
    fn name(&self) -> &'static str {
        "Or"
    }

    fn messages(&self) -> Option<&Messages> {
        Some(&self.messages)
    }

    fn validate(&self, ctx: &Context, value: &Value) -> Result<Value, Invalid> {
        let mut errors = Vec::new();
        for validator in &self.validators {
            match validator.validate(ctx, value) {
                Ok(result) => return Ok(result),
                Err(error) => errors.push(error),
            }
        }
        Err(self.exhausted(value, errors))
    }

    async fn validate_async(&self, ctx: &Context, value: &Value) -> Result<Value, Invalid> {
        // Alternatives stay sequential under the async strategy: a later
        // branch must not run (or touch the scratch cache) when an earlier
        // one succeeds.
        let mut errors = Vec::new();
        for validator in &self.validators {
            match validator.validate_async(ctx, value).await {
                Ok(result) => return Ok(result),
                Err(error) => errors.push(error),
            }
        }
        Err(self.exhausted(value, errors))
    }

    fn sub_validators(&self, out: &mut Vec<Arc<dyn Validator>>) {
        for validator in &self.validators {
            out.push(validator.clone());
            validator.sub_validators(out);
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::ValidatorExt;
    use crate::validators::{IsInt, IsString, Len};

    #[test]
    fn test_first_success_wins() {
        let validator = IsInt::new().or(IsString::new());
        assert_eq!(validator.context(7).result().unwrap(), Value::from(7));
        let validator = IsInt::new().or(IsString::new());
        assert_eq!(
            validator.context("x").result().unwrap(),
            Value::from("x")
        );
    }

    #[test]
    fn test_exhaustion_retains_all_branch_errors() {
        let validator = IsInt::new().or(Len::min(5));
        let err = validator.context("abc").result().unwrap_err();
        assert_eq!(err.code, "fail");
        assert_eq!(err.nested.len(), 2);
        assert_eq!(err.nested[0].code, "type");
        assert_eq!(err.nested[1].code, "min");
    }

    #[test]
    fn test_later_branches_do_not_run_after_success() {
        let validator = IsString::new().or(Len::min(100));
        assert!(validator.context("ok").result().is_ok());
    }
}
