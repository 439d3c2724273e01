//! Sequential conjunction

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::Context;
use crate::foundation::{Invalid, IntoValidator, Validator, Value};

/// Runs validators in order, failing on the first error.
///
/// By default each stage receives the previous stage's output, so a chain
/// doubles as a transformation pipeline (`IsInt::convert()` feeding
/// `Len::min(..)`). With [`And::chain`] disabled every stage sees the
/// original input and the original input is returned.
///
/// # Examples
///
/// ```rust,ignore
/// use trellis::prelude::*;
///
/// let username = IsString::new().and(Len::range(3, 20));
/// assert!(username.context("alice").result().is_ok());
/// ```
#[derive(Debug)]
pub struct And {
    validators: Vec<Arc<dyn Validator>>,
    chain: bool,
}

impl And {
    pub fn pair(first: impl IntoValidator, second: impl IntoValidator) -> Self {
        Self {
            validators: vec![first.into_validator(), second.into_validator()],
            chain: true,
        }
    }

    /// Appends another stage, keeping the conjunction flat.
    #[must_use = "builder methods must be chained or built"]
    pub fn and(mut self, other: impl IntoValidator) -> Self {
        self.validators.push(other.into_validator());
        self
    }

    /// Controls value threading. `true` (the default) feeds each stage the
    /// previous stage's output; `false` validates every stage against the
    /// original input and returns the original input.
    #[must_use = "builder methods must be chained or built"]
    pub fn chain(mut self, chain: bool) -> Self {
        self.chain = chain;
        self
    }
}

#[async_trait]
impl Validator for And {
    fn name(&self) -> &'static str {
        "And"
    }

    fn validate(&self, ctx: &Context, value: &Value) -> Result<Value, Invalid> {
        if self.chain {
            let mut current = value.clone();
            for validator in &self.validators {
                current = validator.validate(ctx, &current)?;
            }
            Ok(current)
        } else {
            for validator in &self.validators {
                validator.validate(ctx, value)?;
            }
            Ok(value.clone())
        }
    }

    async fn validate_async(&self, ctx: &Context, value: &Value) -> Result<Value, Invalid> {
        if self.chain {
            let mut current = value.clone();
            for validator in &self.validators {
                current = validator.validate_async(ctx, &current).await?;
            }
            Ok(current)
        } else {
            for validator in &self.validators {
                validator.validate_async(ctx, value).await?;
            }
            Ok(value.clone())
        }
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
