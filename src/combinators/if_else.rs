//! Conditional branching

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::Context;
use crate::foundation::{Invalid, IntoValidator, Validator, Value};

/// Branches on a criterion: when it succeeds, its result feeds the `then`
/// branch; when it fails, the original value feeds the `otherwise` branch.
///
/// The criterion's own error is discarded; only branch errors surface.
///
/// # Examples
///
/// ```rust,ignore
/// use trellis::prelude::*;
///
/// // Numbers get a range check, everything else a length check.
/// let flexible = IfElse::new(IsInt::convert(), Len::max(100), Len::range(1, 10));
/// ```
#[derive(Debug)]
pub struct IfElse {
    criterion: Arc<dyn Validator>,
    then: Arc<dyn Validator>,
    otherwise: Arc<dyn Validator>,
}

impl IfElse {
    pub fn new(
        criterion: impl IntoValidator,
        then: impl IntoValidator,
        otherwise: impl IntoValidator,
    ) -> Self {
        Self {
            criterion: criterion.into_validator(),
            then: then.into_validator(),
            otherwise: otherwise.into_validator(),
        }
    }
}

#[async_trait]
impl Validator for IfElse {
    fn name(&self) -> &'static str {
        "IfElse"
    }

    fn validate(&self, ctx: &Context, value: &Value) -> Result<Value, Invalid> {
        match self.criterion.validate(ctx, value) {
            Ok(result) => self.then.validate(ctx, &result),
            Err(_) => self.otherwise.validate(ctx, value),
        }
    }

    async fn validate_async(&self, ctx: &Context, value: &Value) -> Result<Value, Invalid> {
        match self.criterion.validate_async(ctx, value).await {
            Ok(result) => self.then.validate_async(ctx, &result).await,
            Err(_) => self.otherwise.validate_async(ctx, value).await,
        }
    }

    fn sub_validators(&self, out: &mut Vec<Arc<dyn Validator>>) {
        for validator in [&self.criterion, &self.then, &self.otherwise] {
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
    use crate::validators::{In, IsInt, Len};

    fn flexible() -> IfElse {
        IfElse::new(IsInt::convert(), In::values([42, 43]), Len::range(1, 3))
    }

    #[test]
    fn test_then_branch_receives_criterion_result() {
        // "42" converts, so the then branch sees the integer.
        let ctx = flexible().context("42");
        assert_eq!(ctx.result().unwrap(), Value::from(42));
    }

    #[test]
    fn test_otherwise_branch_receives_original_value() {
        let ctx = flexible().context("abc");
        assert_eq!(ctx.result().unwrap(), Value::from("abc"));

        let err = flexible().context("toolong").result().unwrap_err();
        assert_eq!(err.code, "max");
    }
}
