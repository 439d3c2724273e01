//! Core validator traits
//!
//! [`Validator`] is the atomic contract: `validate(context, value)` either
//! returns a (possibly transformed) value or raises [`Invalid`]. Validators
//! are immutable templates, parameterized at construction, shareable across
//! unrelated contexts behind `Arc<dyn Validator>`; they carry no
//! per-evaluation state.
//!
//! The default `validate` dispatches once, centrally, on the value's
//! [`Presence`] before any value-specific logic runs; leaf validators
//! normally implement only `on_value` and inherit the missing/blank
//! failures. Combinators override `validate` itself.

use std::borrow::Cow;
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;

use crate::combinators::{And, Not, Or, Tag, WithMessage};
use crate::context::Context;
use crate::foundation::{default_template, Invalid, Messages, Presence, Value, ValidatorId};

// ============================================================================
// CORE VALIDATOR TRAIT
// ============================================================================

/// The atomic validation contract.
///
/// # Examples
///
/// ```rust,ignore
/// use trellis::prelude::*;
///
/// #[derive(Debug)]
/// struct Uppercase;
///
/// impl Validator for Uppercase {
///     fn name(&self) -> &'static str {
///         "Uppercase"
///     }
///
///     fn on_value(&self, _ctx: &Context, value: &Value) -> Result<Value, Invalid> {
///         match value.as_str() {
///             Some(s) => Ok(Value::from(s.to_uppercase())),
///             None => Err(self.invalid("type").with_value(value.clone())),
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Validator: Send + Sync + Debug {
    /// The validator's name, used as error provenance.
    fn name(&self) -> &'static str;

    /// The validator's message table. `None` falls back to the shared
    /// `fail`/`missing`/`blank` defaults.
    fn messages(&self) -> Option<&Messages> {
        None
    }

    /// Validates a value within a context.
    ///
    /// The default implementation dispatches on presence; combinators and
    /// structural validators override it wholesale.
    fn validate(&self, ctx: &Context, value: &Value) -> Result<Value, Invalid> {
        match value.presence() {
            Presence::Missing => self.on_missing(ctx),
            Presence::Blank => self.on_blank(ctx, value),
            Presence::Present => self.on_value(ctx, value),
        }
    }

    /// Handles a present value. Default: pass through unchanged.
    fn on_value(&self, _ctx: &Context, value: &Value) -> Result<Value, Invalid> {
        Ok(value.clone())
    }

    /// Handles an absent value. Default: raise `missing`.
    fn on_missing(&self, _ctx: &Context) -> Result<Value, Invalid> {
        Err(self.invalid("missing"))
    }

    /// Handles a blank value. Default: raise `blank`.
    fn on_blank(&self, _ctx: &Context, value: &Value) -> Result<Value, Invalid> {
        Err(self.invalid("blank").with_value(value.clone()))
    }

    /// Validates under the asynchronous strategy.
    ///
    /// The default delegates to the synchronous path, so plain leaf
    /// validators are async-ready for free. Combinators and structural
    /// validators override this to propagate the contract structurally
    /// (sequential chaining for `And`, concurrent fan-out for
    /// `Schema`/`ForEach`).
    async fn validate_async(&self, ctx: &Context, value: &Value) -> Result<Value, Invalid> {
        self.validate(ctx, value)
    }

    /// Appends this validator's sub-validators, transitively.
    ///
    /// `Compose` walks the tree through this hook at construction to
    /// collect every `Tag`. Leaf validators have nothing to append.
    fn sub_validators(&self, _out: &mut Vec<Arc<dyn Validator>>) {}

    /// Downcast hook for the `Compose` walk.
    fn as_tag(&self) -> Option<&Tag> {
        None
    }

    /// Rebuilds this validator with one parameter changed, for tag
    /// overrides. `None` means the parameter is not supported.
    fn with_param(&self, _name: &str, _value: &Value) -> Option<Arc<dyn Validator>> {
        None
    }

    /// Raises an error originating in this validator.
    ///
    /// Selects the message template for `code` from this validator's
    /// message table (falling back to the shared defaults) and records the
    /// validator's identity, so `Tag` re-keying and message lookup resolve
    /// to the right instance.
    fn invalid(&self, code: &'static str) -> Invalid {
        let template = match self.messages().and_then(|m| m.get(code)) {
            Some(template) => template.map(|t| Cow::Owned(t.to_string())),
            None => default_template(code).map(Cow::Borrowed),
        };
        Invalid::raised(
            Cow::Borrowed(code),
            Cow::Borrowed(self.name()),
            template,
            ValidatorId::of(self),
        )
    }
}

// ============================================================================
// CONVERSION INTO SHARED VALIDATORS
// ============================================================================

/// Conversion into a shared validator handle.
///
/// Lets combinator builders accept both owned validators and already
/// shared `Arc<dyn Validator>` handles without double-wrapping.
pub trait IntoValidator {
    fn into_validator(self) -> Arc<dyn Validator>;
}

impl<V: Validator + 'static> IntoValidator for V {
    fn into_validator(self) -> Arc<dyn Validator> {
        Arc::new(self)
    }
}

impl IntoValidator for Arc<dyn Validator> {
    fn into_validator(self) -> Arc<dyn Validator> {
        self
    }
}

// ============================================================================
// VALIDATOR EXTENSION TRAIT
// ============================================================================

/// Fluent combinator API, implemented for every validator.
///
/// # Examples
///
/// ```rust,ignore
/// use trellis::prelude::*;
///
/// let username = IsString::new().and(Len::range(3, 20));
/// let ctx = username.context("alice");
/// assert!(ctx.result().is_ok());
/// ```
pub trait ValidatorExt: Validator + Sized + 'static {
    /// Wraps this validator in a shared handle.
    fn arc(self) -> Arc<dyn Validator> {
        Arc::new(self)
    }

    /// Sequences this validator with another; each stage's output feeds
    /// the next stage. `And` has an inherent `and` that appends instead of
    /// nesting, keeping traces flat.
    fn and(self, other: impl IntoValidator) -> And {
        And::pair(self.arc(), other.into_validator())
    }

    /// Tries this validator first, the alternative on failure. `Or` has an
    /// inherent `or` that appends instead of nesting.
    fn or(self, other: impl IntoValidator) -> Or {
        Or::pair(self.arc(), other.into_validator())
    }

    /// Succeeds with the original value iff this validator fails.
    fn not(self) -> Not {
        Not::new(self)
    }

    /// Marks this validator as an externally overridable point named
    /// `name`.
    ///
    /// # Panics
    ///
    /// Panics if `self` is already a `Tag`.
    fn tag(self, name: impl Into<Cow<'static, str>>) -> Tag {
        Tag::new(name, self)
    }

    /// Overrides one message template on this validator instance.
    fn message(
        self,
        code: impl Into<Cow<'static, str>>,
        template: impl Into<Cow<'static, str>>,
    ) -> WithMessage {
        WithMessage::new(self.arc()).message(code, template)
    }

    /// Binds this validator to a value in a fresh root context.
    fn context(self, value: impl Into<Value>) -> Context {
        Context::new(self.arc(), value)
    }
}

impl<T: Validator + Sized + 'static> ValidatorExt for T {}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Anything;

    impl Validator for Anything {
        fn name(&self) -> &'static str {
            "Anything"
        }
    }

    #[test]
    fn test_presence_dispatch_defaults() {
        let ctx = Anything.context("hello");
        assert_eq!(ctx.result().unwrap(), Value::from("hello"));

        let ctx = Anything.context(Value::Missing);
        let err = ctx.result().unwrap_err();
        assert_eq!(err.code, "missing");

        let ctx = Anything.context(Value::Null);
        let err = ctx.result().unwrap_err();
        assert_eq!(err.code, "blank");
    }

    #[test]
    fn test_invalid_uses_default_templates() {
        let err = Anything.invalid("missing");
        assert_eq!(err.template.as_deref(), Some("Please provide a value"));
        assert_eq!(err.validator, "Anything");
    }
}
