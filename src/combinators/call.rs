//! Plain functions as validators

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::context::Context;
use crate::foundation::{Invalid, Validator, ValidatorId, Value};

/// Lifts a plain function into a validator.
///
/// Errors raised inside the function are re-attributed to the `Call`
/// wrapper, so tags and message overrides target the wrapper instead of a
/// detached error. The function sees missing and blank values too; there
/// is no presence pre-dispatch.
///
/// # Examples
///
/// ```rust,ignore
/// use trellis::prelude::*;
///
/// let even = Call::new(|_ctx, value| match value.as_int() {
///     Some(n) if n % 2 == 0 => Ok(value.clone()),
///     _ => Err(Invalid::new("odd", "Value must be even")),
/// });
/// ```
pub struct Call {
    func: Arc<dyn Fn(&Context, &Value) -> Result<Value, Invalid> + Send + Sync>,
}

impl Call {
    pub fn new(
        func: impl Fn(&Context, &Value) -> Result<Value, Invalid> + Send + Sync + 'static,
    ) -> Self {
        Self {
            func: Arc::new(func),
        }
    }

    fn claim(&self, mut error: Invalid) -> Invalid {
        error.origin = ValidatorId::of(self);
        error.validator = Cow::Borrowed(self.name());
        error
    }
}

#[async_trait]
impl Validator for Call {
    fn name(&self) -> &'static str {
        "Call"
    }

    fn validate(&self, ctx: &Context, value: &Value) -> Result<Value, Invalid> {
        (self.func)(ctx, value).map_err(|error| self.claim(error))
    }

    async fn validate_async(&self, ctx: &Context, value: &Value) -> Result<Value, Invalid> {
        self.validate(ctx, value)
    }
}

impl fmt::Debug for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Call").finish_non_exhaustive()
    }
}

// ============================================================================
// ASYNC CALL
// ============================================================================

/// Lifts an async function into a validator, for I/O-backed checks
/// (uniqueness lookups, remote verification).
///
/// Usable only under the asynchronous strategy; the synchronous path has
/// no executor to drive the future.
///
/// # Examples
///
/// ```rust,ignore
/// use trellis::prelude::*;
///
/// let unique = CallAsync::new(|_ctx, value| {
///     Box::pin(async move {
///         if db_lookup(&value).await {
///             Err(Invalid::new("taken", "Already in use"))
///         } else {
///             Ok(value)
///         }
///     })
/// });
/// ```
pub struct CallAsync {
    func: Arc<
        dyn Fn(Context, Value) -> BoxFuture<'static, Result<Value, Invalid>> + Send + Sync,
    >,
}

impl CallAsync {
    pub fn new(
        func: impl Fn(Context, Value) -> BoxFuture<'static, Result<Value, Invalid>>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            func: Arc::new(func),
        }
    }

    fn claim(&self, mut error: Invalid) -> Invalid {
        error.origin = ValidatorId::of(self);
        error.validator = Cow::Borrowed(self.name());
        error
    }
}

#[async_trait]
impl Validator for CallAsync {
    fn name(&self) -> &'static str {
        "CallAsync"
    }

    /// # Panics
    ///
    /// Always. Drive this validator through `Context::result_async`.
    fn validate(&self, _ctx: &Context, _value: &Value) -> Result<Value, Invalid> {
        panic!("CallAsync requires the asynchronous strategy; use result_async()")
    }

    async fn validate_async(&self, ctx: &Context, value: &Value) -> Result<Value, Invalid> {
        (self.func)(ctx.clone(), value.clone())
            .await
            .map_err(|error| self.claim(error))
    }
}

impl fmt::Debug for CallAsync {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallAsync").finish_non_exhaustive()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::ValidatorExt;

    #[test]
    fn test_call_runs_function() {
        let even = Call::new(|_ctx, value| match value.as_int() {
            Some(n) if n % 2 == 0 => Ok(value.clone()),
            _ => Err(Invalid::new("odd", "Value must be even")),
        });
        assert!(even.context(4).result().is_ok());
    }

    #[test]
    fn test_call_claims_raised_errors() {
        let odd = Call::new(|_ctx, _value| Err(Invalid::new("odd", "Value must be even")));
        let err = odd.context(3).result().unwrap_err();
        assert_eq!(err.code, "odd");
        assert_eq!(err.validator, "Call");
        assert_eq!(err.message.as_deref(), Some("Value must be even"));
    }

    #[test]
    fn test_call_sees_missing_values() {
        let probe = Call::new(|_ctx, value| {
            if value.is_missing() {
                Err(Invalid::new("absent", "saw the sentinel"))
            } else {
                Ok(value.clone())
            }
        });
        let err = probe.context(Value::Missing).result().unwrap_err();
        assert_eq!(err.code, "absent");
    }
}
