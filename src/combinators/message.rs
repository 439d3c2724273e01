//! Per-instance message overrides

use std::borrow::Cow;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::Context;
use crate::foundation::{Invalid, Messages, Validator, ValidatorId, Value};

/// Overrides message templates of the wrapped validator without touching
/// other instances sharing it.
///
/// Only errors raised by the wrapped validator itself are re-templated;
/// errors merely bubbling through from deeper validators keep their own
/// messages.
///
/// # Examples
///
/// ```rust,ignore
/// use trellis::prelude::*;
///
/// let name = Len::min(3).message("min", "Pick a longer name ({min}+ characters)");
/// ```
#[derive(Debug)]
pub struct WithMessage {
    inner: Arc<dyn Validator>,
    messages: Messages,
}

impl WithMessage {
    pub fn new(inner: Arc<dyn Validator>) -> Self {
        Self {
            inner,
            messages: Messages::new(),
        }
    }

    /// Overrides the template for one reason code.
    #[must_use = "builder methods must be chained or built"]
    pub fn message(
        mut self,
        code: impl Into<Cow<'static, str>>,
        template: impl Into<Cow<'static, str>>,
    ) -> Self {
        self.messages.set(code, template);
        self
    }

    /// Suppresses the message for one reason code.
    #[must_use = "builder methods must be chained or built"]
    pub fn suppress(mut self, code: impl Into<Cow<'static, str>>) -> Self {
        self.messages.suppress(code);
        self
    }

    fn retemplate(&self, mut error: Invalid) -> Invalid {
        if error.origin == ValidatorId::of(&*self.inner) {
            if let Some(entry) = self.messages.get(error.code.as_ref()) {
                error.template = entry.map(|t| Cow::Owned(t.to_string()));
            }
        }
        error
    }
}

#[async_trait]
impl Validator for WithMessage {
    /// Provenance stays with the wrapped validator.
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn messages(&self) -> Option<&Messages> {
        Some(&self.messages)
    }

    fn validate(&self, ctx: &Context, value: &Value) -> Result<Value, Invalid> {
        self.inner
            .validate(ctx, value)
            .map_err(|error| self.retemplate(error))
    }

    async fn validate_async(&self, ctx: &Context, value: &Value) -> Result<Value, Invalid> {
        self.inner
            .validate_async(ctx, value)
            .await
            .map_err(|error| self.retemplate(error))
    }

    fn sub_validators(&self, out: &mut Vec<Arc<dyn Validator>>) {
        out.push(self.inner.clone());
        self.inner.sub_validators(out);
    }

    fn with_param(&self, name: &str, value: &Value) -> Option<Arc<dyn Validator>> {
        let inner = self.inner.with_param(name, value)?;
        Some(Arc::new(WithMessage {
            inner,
            messages: self.messages.clone(),
        }))
    }
}

// ============================================================================
// TESTS
// ============================================================================
