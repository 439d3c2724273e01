//! Tagged override points
//!
//! A [`Tag`] marks a position in a validator tree as externally
//! configurable. The tree stays immutable; an enclosing `Compose` collects
//! every tag at build time and publishes per-evaluation overrides (replace
//! the wrapped validator, re-parameterize it, or disable it) through the
//! root context's active override map.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::Context;
use crate::foundation::{Invalid, IntoValidator, Validator, ValidatorId, Value};

/// Active tag overrides for one evaluation, keyed by tag identity.
///
/// Pushed on the root context by `Compose` as a scope for the duration of
/// the wrapped evaluation. Tag identities are private to each composition,
/// so nested and concurrently running compositions see only their own
/// overrides.
pub type OverrideMap = HashMap<ValidatorId, TagState>;

/// The override applied to one tag.
#[derive(Debug, Clone)]
pub enum TagState {
    /// Run this validator in place of the tagged one.
    Active(Arc<dyn Validator>),
    /// Skip the tagged validator, passing the value through unchanged.
    Disabled,
}

// ============================================================================
// TAG
// ============================================================================

/// Marks the wrapped validator as an overridable point named `name`.
///
/// Without an active override the wrapped validator runs as-is (or is
/// skipped entirely when the tag was built disabled). Errors raised by the
/// validator that actually ran are stamped with the tag name so the
/// innermost enclosing `Compose` can re-key them to `{name}_{code}`.
///
/// # Examples
///
/// ```rust,ignore
/// use trellis::prelude::*;
///
/// let schema = Schema::new()
///     .field("nickname", Len::min(3).tag("nickname_length"));
/// ```
#[derive(Debug)]
pub struct Tag {
    name: Cow<'static, str>,
    inner: Arc<dyn Validator>,
    enabled: bool,
}

impl Tag {
    /// Wraps `inner` as an overridable point named `name`.
    ///
    /// # Panics
    ///
    /// Panics if `inner` is itself a `Tag`; an override point cannot be
    /// nested directly inside another.
    pub fn new(name: impl Into<Cow<'static, str>>, inner: impl IntoValidator) -> Self {
        let inner = inner.into_validator();
        assert!(
            inner.as_tag().is_none(),
            "a tag cannot wrap another tag directly"
        );
        Self {
            name: name.into(),
            inner,
            enabled: true,
        }
    }

    /// Sets whether the wrapped validator runs when no override is active.
    /// Disabled tags pass the value through until a composition enables
    /// them.
    #[must_use = "builder methods must be chained or built"]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// The tag's override name.
    #[must_use]
    pub fn tag_name(&self) -> &str {
        &self.name
    }

    /// The wrapped validator, the base for parameter overrides.
    pub(crate) fn wrapped(&self) -> &Arc<dyn Validator> {
        &self.inner
    }

    /// Resolves which validator should run under the given context's
    /// active overrides. `None` means the tag is disabled.
    fn resolve(&self, ctx: &Context) -> Option<Arc<dyn Validator>> {
        match ctx.active_override(ValidatorId::of(self)) {
            Some(TagState::Active(validator)) => Some(validator),
            Some(TagState::Disabled) => None,
            None if self.enabled => Some(self.inner.clone()),
            None => None,
        }
    }

    fn stamp(&self, mut error: Invalid, ran: &Arc<dyn Validator>) -> Invalid {
        if error.tag.is_none() && error.origin == ValidatorId::of(&**ran) {
            error.tag = Some(self.name.clone());
        }
        error
    }
}

#[async_trait]
impl Validator for Tag {
    fn name(&self) -> &'static str {
        "Tag"
    }

    fn validate(&self, ctx: &Context, value: &Value) -> Result<Value, Invalid> {
        match self.resolve(ctx) {
            Some(validator) => validator
                .validate(ctx, value)
                .map_err(|error| self.stamp(error, &validator)),
            None => Ok(value.clone()),
        }
    }

    async fn validate_async(&self, ctx: &Context, value: &Value) -> Result<Value, Invalid> {
        match self.resolve(ctx) {
            Some(validator) => validator
                .validate_async(ctx, value)
                .await
                .map_err(|error| self.stamp(error, &validator)),
            None => Ok(value.clone()),
        }
    }

    fn sub_validators(&self, out: &mut Vec<Arc<dyn Validator>>) {
        out.push(self.inner.clone());
        self.inner.sub_validators(out);
    }

    fn as_tag(&self) -> Option<&Tag> {
        Some(self)
    }
}

// ============================================================================
// TESTS
// ============================================================================
