//! Validation failure and construction error types
//!
//! [`Invalid`] is the structured error every validator raises: a symbolic
//! reason code, the originating validator's identity, message params and
//! optional nested errors. The human-readable message is rendered only when
//! the error is attached to a context, by substituting params into the
//! template selected by the reason code.
//!
//! All string fields use `Cow<'static, str>` for zero-allocation in the
//! common case of static reason codes and templates.

use std::borrow::Cow;
use std::fmt;

use smallvec::SmallVec;

use crate::foundation::Value;

// ============================================================================
// VALIDATOR IDENTITY
// ============================================================================

/// Opaque identity of a validator instance.
///
/// Derived from the instance's allocation address, so two `Arc` handles to
/// the same validator compare equal while distinct instances never collide.
/// `Tag` uses this to decide whether a bubbling error originated in its own
/// wrapped validator (and should be re-keyed) or merely passed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValidatorId(usize);

impl ValidatorId {
    /// Identity of a validator instance.
    pub fn of<V: ?Sized>(validator: &V) -> Self {
        let ptr: *const V = validator;
        Self(ptr.cast::<()>() as usize)
    }

    /// Identity for errors raised outside any validator (e.g. inside a
    /// bare `Call` function). Never matches a real instance.
    #[must_use]
    pub const fn detached() -> Self {
        Self(0)
    }
}

// ============================================================================
// INVALID
// ============================================================================

/// A structured validation failure.
///
/// Created at the point of failure via [`Validator::invalid`] (which
/// selects the message template from the raising validator's message
/// table), attached to the failing context (which renders the message and
/// records the path in the root's error list), optionally re-keyed while
/// crossing `Tag`/`Compose` boundaries, then bubbled.
///
/// [`Validator::invalid`]: crate::foundation::Validator::invalid
///
/// # Examples
///
/// ```rust,ignore
/// use trellis::foundation::Invalid;
///
/// let error = Invalid::new("min", "Value must have at least {min} characters")
///     .with_param("min", 8);
/// ```
#[derive(Debug, Clone)]
pub struct Invalid {
    /// Symbolic reason code, e.g. `"type"`, `"missing"`, `"extra_fields"`.
    ///
    /// Re-keyed to `tagName_code` when crossing a `Compose` boundary.
    pub code: Cow<'static, str>,

    /// Name of the originating validator.
    pub validator: Cow<'static, str>,

    /// Message template selected by the reason code at raise time.
    ///
    /// `None` suppresses rendering (aggregate errors whose children carry
    /// the real messages).
    pub template: Option<Cow<'static, str>>,

    /// Rendered message. Populated when the error is attached to a context.
    pub message: Option<String>,

    /// Dot path of the failing context. Populated at attachment.
    pub path: Option<String>,

    /// The offending value.
    pub value: Option<Value>,

    /// Parameters for the message template, as ordered key-value pairs.
    pub params: SmallVec<[(Cow<'static, str>, String); 4]>,

    /// Nested errors for aggregate failures (`Or` exhaustion, schema
    /// field errors).
    pub nested: Vec<Invalid>,

    /// Allocation identity of the raising validator.
    pub(crate) origin: ValidatorId,

    /// Transient tag name, set by `Tag` on the way out and consumed by the
    /// innermost enclosing `Compose` when re-keying.
    pub(crate) tag: Option<Cow<'static, str>>,
}

impl Invalid {
    /// Creates a detached error with an explicit template.
    ///
    /// Validators should prefer [`Validator::invalid`], which resolves the
    /// template from the validator's message table and records its
    /// identity; `new` is for errors raised inside plain functions wrapped
    /// by `Call`.
    ///
    /// [`Validator::invalid`]: crate::foundation::Validator::invalid
    pub fn new(
        code: impl Into<Cow<'static, str>>,
        template: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            code: code.into(),
            validator: Cow::Borrowed(""),
            template: Some(template.into()),
            message: None,
            path: None,
            value: None,
            params: SmallVec::new(),
            nested: Vec::new(),
            origin: ValidatorId::detached(),
            tag: None,
        }
    }

    pub(crate) fn raised(
        code: Cow<'static, str>,
        validator: Cow<'static, str>,
        template: Option<Cow<'static, str>>,
        origin: ValidatorId,
    ) -> Self {
        Self {
            code,
            validator,
            template,
            message: None,
            path: None,
            value: None,
            params: SmallVec::new(),
            nested: Vec::new(),
            origin,
            tag: None,
        }
    }

    /// Adds a message template parameter.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_param(mut self, key: impl Into<Cow<'static, str>>, value: impl ToString) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    /// Attaches the offending value.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    /// Adds nested errors for aggregate failures.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_nested(mut self, errors: Vec<Invalid>) -> Self {
        self.nested = errors;
        self
    }

    /// Looks up a parameter value by key.
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.as_ref() == key)
            .map(|(_, v)| v.as_str())
    }

    /// Returns true if this error aggregates nested errors.
    #[must_use]
    pub fn has_nested(&self) -> bool {
        !self.nested.is_empty()
    }

    /// Flattens this error and all nested errors, depth-first.
    #[must_use]
    pub fn flatten(&self) -> Vec<&Invalid> {
        let mut out = vec![self];
        for nested in &self.nested {
            out.extend(nested.flatten());
        }
        out
    }

    /// Renders the message template by substituting `{param}` placeholders.
    ///
    /// Used by the default error formatter; custom formatters installed on
    /// a root context may ignore the template entirely.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        let template = self.template.as_deref()?;
        let mut rendered = template.to_string();
        for (key, value) in &self.params {
            rendered = rendered.replace(&format!("{{{key}}}"), value);
        }
        Some(rendered)
    }

    /// Converts the error to a JSON report.
    pub fn to_json_value(&self) -> serde_json::Value {
        let params: serde_json::Map<String, serde_json::Value> = self
            .params
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.clone())))
            .collect();

        serde_json::json!({
            "code": self.code,
            "validator": self.validator,
            "message": self.message,
            "path": self.path,
            "params": params,
            "nested": self.nested.iter().map(Invalid::to_json_value).collect::<Vec<_>>(),
        })
    }
}

impl fmt::Display for Invalid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.path, &self.message) {
            (Some(path), Some(message)) => write!(f, "[{path}] {message}")?,
            (None, Some(message)) => write!(f, "{message}")?,
            (Some(path), None) => write!(f, "[{path}] {}", self.code)?,
            (None, None) => write!(f, "Invalid({})", self.code)?,
        }

        if !self.nested.is_empty() {
            for (i, error) in self.nested.iter().enumerate() {
                write!(f, "\n  {}. {}", i + 1, error)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for Invalid {}

// ============================================================================
// MESSAGE TABLES
// ============================================================================

/// Per-validator message templates, keyed by reason code.
///
/// Each validator carries its defaults; instances may override entries via
/// the builder-style `message` methods without affecting other instances.
/// An entry may be suppressed so an aggregate error renders no message of
/// its own.
#[derive(Debug, Clone, Default)]
pub struct Messages {
    entries: SmallVec<[(Cow<'static, str>, Option<Cow<'static, str>>); 4]>,
}

impl Messages {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from static code/template pairs.
    #[must_use]
    pub fn from_pairs(pairs: &[(&'static str, &'static str)]) -> Self {
        Self {
            entries: pairs
                .iter()
                .map(|(code, template)| (Cow::Borrowed(*code), Some(Cow::Borrowed(*template))))
                .collect(),
        }
    }

    /// Sets or replaces the template for a reason code.
    pub fn set(
        &mut self,
        code: impl Into<Cow<'static, str>>,
        template: impl Into<Cow<'static, str>>,
    ) {
        let code = code.into();
        let template = Some(template.into());
        if let Some(entry) = self.entries.iter_mut().find(|(c, _)| *c == code) {
            entry.1 = template;
        } else {
            self.entries.push((code, template));
        }
    }

    /// Marks a reason code as message-less.
    pub fn suppress(&mut self, code: impl Into<Cow<'static, str>>) {
        let code = code.into();
        if let Some(entry) = self.entries.iter_mut().find(|(c, _)| *c == code) {
            entry.1 = None;
        } else {
            self.entries.push((code, None));
        }
    }

    /// Looks up a template. Outer `None` means "not in this table";
    /// `Some(None)` means "explicitly suppressed".
    #[must_use]
    pub fn get(&self, code: &str) -> Option<Option<&str>> {
        self.entries
            .iter()
            .find(|(c, _)| c.as_ref() == code)
            .map(|(_, t)| t.as_deref())
    }
}

/// Fallback templates for the three reason codes every validator shares.
#[must_use]
pub fn default_template(code: &str) -> Option<&'static str> {
    match code {
        "fail" => Some("Validation failed"),
        "missing" => Some("Please provide a value"),
        "blank" => Some("Field cannot be empty"),
        _ => None,
    }
}

// ============================================================================
// SETUP ERRORS
// ============================================================================

/// A malformed validator tree.
///
/// These are programmer errors, always detected at build time (or, for
/// self-references, at first evaluation) and never reported as validation
/// failures. The panicking builder APIs document them under `# Panics`;
/// the `try_*` variants return them for callers assembling trees from
/// dynamic input.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("tag '{0}' does not exist in the composed tree")]
    UnknownTag(String),

    #[error("composed tree contains no tags")]
    NoTags,

    #[error("validator '{validator}' does not accept parameter '{param}'")]
    UnsupportedParam { validator: String, param: String },

    #[error("schema declares no fields")]
    NoFields,

    #[error("duplicate schema field '{0}'")]
    DuplicateField(String),

    #[error("invalid match pattern: {0}")]
    Pattern(#[from] regex::Error),
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_substitutes_params() {
        let error = Invalid::new("min", "at least {min}, got {len}")
            .with_param("min", 8)
            .with_param("len", 3);
        assert_eq!(error.render().as_deref(), Some("at least 8, got 3"));
    }

    #[test]
    fn test_render_without_template() {
        let mut error = Invalid::new("fail", "x");
        error.template = None;
        assert_eq!(error.render(), None);
    }

    #[test]
    fn test_param_lookup() {
        let error = Invalid::new("fail", "x").with_param("a", 1);
        assert_eq!(error.param("a"), Some("1"));
        assert_eq!(error.param("b"), None);
    }

    #[test]
    fn test_flatten_nested() {
        let error = Invalid::new("fail", "x").with_nested(vec![
            Invalid::new("a", "a"),
            Invalid::new("b", "b").with_nested(vec![Invalid::new("c", "c")]),
        ]);
        assert_eq!(error.flatten().len(), 4);
    }

    #[test]
    fn test_messages_override_and_suppress() {
        let mut messages = Messages::from_pairs(&[("type", "bad type")]);
        assert_eq!(messages.get("type"), Some(Some("bad type")));

        messages.set("type", "custom");
        assert_eq!(messages.get("type"), Some(Some("custom")));

        messages.suppress("fail");
        assert_eq!(messages.get("fail"), Some(None));
        assert_eq!(messages.get("other"), None);
    }

    #[test]
    fn test_validator_id_distinguishes_instances() {
        let a = String::from("a");
        let b = String::from("b");
        assert_eq!(ValidatorId::of(&a), ValidatorId::of(&a));
        assert_ne!(ValidatorId::of(&a), ValidatorId::of(&b));
    }

    #[test]
    fn test_zero_alloc_static_strings() {
        let error = Invalid::new("required", "This field is required");
        assert!(matches!(error.code, Cow::Borrowed(_)));
        assert!(matches!(error.template, Some(Cow::Borrowed(_))));
    }
}
