//! Negation

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::Context;
use crate::foundation::{Invalid, IntoValidator, Messages, Validator, Value};

/// Succeeds with the original value exactly when the wrapped validator
/// fails.
///
/// # Examples
///
/// ```rust,ignore
/// use trellis::prelude::*;
///
/// let not_reserved = In::values(["admin", "root"]).not();
/// assert!(not_reserved.context("alice").result().is_ok());
/// assert!(not_reserved.context("admin").result().is_err());
/// ```
#[derive(Debug)]
pub struct Not {
    inner: Arc<dyn Validator>,
    messages: Messages,
}

impl Not {
    pub fn new(inner: impl IntoValidator) -> Self {
        Self {
            inner: inner.into_validator(),
            messages: Messages::from_pairs(&[("fail", "Value must not match the criterion")]),
        }
    }
}

#[async_trait]
impl Validator for Not {
    fn name(&self) -> &'static str {
        "Not"
    }

    fn messages(&self) -> Option<&Messages> {
        Some(&self.messages)
    }

    fn validate(&self, ctx: &Context, value: &Value) -> Result<Value, Invalid> {
        match self.inner.validate(ctx, value) {
            Ok(_) => Err(self.invalid("fail").with_value(value.clone())),
            Err(_) => Ok(value.clone()),
        }
    }

    async fn validate_async(&self, ctx: &Context, value: &Value) -> Result<Value, Invalid> {
        match self.inner.validate_async(ctx, value).await {
            Ok(_) => Err(self.invalid("fail").with_value(value.clone())),
            Err(_) => Ok(value.clone()),
        }
    }

    fn sub_validators(&self, out: &mut Vec<Arc<dyn Validator>>) {
        out.push(self.inner.clone());
        self.inner.sub_validators(out);
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use crate::foundation::{Value, ValidatorExt};
    use crate::validators::IsInt;

    #[test]
    fn test_negation_flips_outcome() {
        let validator = IsInt::new().not();
        assert_eq!(
            validator.context("x").result().unwrap(),
            Value::from("x")
        );

        let validator = IsInt::new().not();
        assert_eq!(validator.context(3).result().unwrap_err().code, "fail");
    }
}
