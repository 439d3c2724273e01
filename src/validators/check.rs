//! Value checks: absence states, pattern matching, length and enumeration

use std::sync::Arc;

use async_trait::async_trait;
use regex::RegexBuilder;

use crate::context::Context;
use crate::foundation::{
    Invalid, IntoValidator, Messages, Presence, SetupError, Validator, Value,
};

// ============================================================================
// ABSENCE STATES
// ============================================================================

/// Requires the field to be absent, yielding a configurable default.
///
/// Useful for fields a client must not supply (server-assigned ids).
#[derive(Debug)]
pub struct Missing {
    default: Value,
    messages: Messages,
}

impl Missing {
    #[must_use]
    pub fn new() -> Self {
        Self {
            default: Value::Missing,
            messages: Messages::from_pairs(&[("fail", "Field must not be set")]),
        }
    }

    /// The value substituted for the absent field.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = default.into();
        self
    }
}

impl Default for Missing {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Validator for Missing {
    fn name(&self) -> &'static str {
        "Missing"
    }

    fn messages(&self) -> Option<&Messages> {
        Some(&self.messages)
    }

    fn on_missing(&self, _ctx: &Context) -> Result<Value, Invalid> {
        Ok(self.default.clone())
    }

    fn on_blank(&self, _ctx: &Context, value: &Value) -> Result<Value, Invalid> {
        Err(self.invalid("fail").with_value(value.clone()))
    }

    fn on_value(&self, _ctx: &Context, value: &Value) -> Result<Value, Invalid> {
        Err(self.invalid("fail").with_value(value.clone()))
    }
}

/// Requires the field to be blank, yielding a configurable default.
#[derive(Debug)]
pub struct Blank {
    default: Value,
    messages: Messages,
}

impl Blank {
    #[must_use]
    pub fn new() -> Self {
        Self {
            default: Value::Null,
            messages: Messages::from_pairs(&[("fail", "Field must be blank")]),
        }
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = default.into();
        self
    }
}

impl Default for Blank {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Validator for Blank {
    fn name(&self) -> &'static str {
        "Blank"
    }

    fn messages(&self) -> Option<&Messages> {
        Some(&self.messages)
    }

    fn on_blank(&self, _ctx: &Context, _value: &Value) -> Result<Value, Invalid> {
        Ok(self.default.clone())
    }

    fn on_missing(&self, _ctx: &Context) -> Result<Value, Invalid> {
        Err(self.invalid("fail"))
    }

    fn on_value(&self, _ctx: &Context, value: &Value) -> Result<Value, Invalid> {
        Err(self.invalid("fail").with_value(value.clone()))
    }
}

/// Requires the field to be empty: either absent or blank.
#[derive(Debug)]
pub struct Empty {
    messages: Messages,
}

impl Empty {
    #[must_use]
    pub fn new() -> Self {
        Self {
            messages: Messages::from_pairs(&[("fail", "Field must be empty")]),
        }
    }
}

impl Default for Empty {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Validator for Empty {
    fn name(&self) -> &'static str {
        "Empty"
    }

    fn messages(&self) -> Option<&Messages> {
        Some(&self.messages)
    }

    fn validate(&self, _ctx: &Context, value: &Value) -> Result<Value, Invalid> {
        match value.presence() {
            Presence::Present => Err(self.invalid("fail").with_value(value.clone())),
            _ => Ok(value.clone()),
        }
    }
}

// ============================================================================
// MATCH
// ============================================================================

#[derive(Debug)]
enum MatchRule {
    /// Equality against a literal value.
    Raw(Value),
    /// Regular expression over string input.
    Pattern(regex::Regex),
    /// Equality against another validator's result.
    Check(Arc<dyn Validator>),
}

/// Matches the value against a literal, a regular expression or another
/// validator.
///
/// # Examples
///
/// ```rust,ignore
/// use trellis::prelude::*;
///
/// let hex = Match::pattern(r"^[0-9a-f]+$");
/// let exact = Match::raw("yes").ignore_case(true);
/// ```
#[derive(Debug)]
pub struct Match {
    rule: MatchRule,
    ignore_case: bool,
    messages: Messages,
}

impl Match {
    fn with_rule(rule: MatchRule) -> Self {
        Self {
            rule,
            ignore_case: false,
            messages: Messages::from_pairs(&[
                ("type", "Value must be a string"),
                ("mismatch", "Value must match {criterion}"),
            ]),
        }
    }

    /// Equality match against a literal value.
    pub fn raw(criterion: impl Into<Value>) -> Self {
        Self::with_rule(MatchRule::Raw(criterion.into()))
    }

    /// Regular expression match.
    ///
    /// # Panics
    ///
    /// Panics on an invalid pattern; use [`Match::try_pattern`] for
    /// patterns from dynamic input.
    #[must_use]
    pub fn pattern(pattern: &str) -> Self {
        match Self::try_pattern(pattern) {
            Ok(m) => m,
            Err(error) => panic!("{error}"),
        }
    }

    /// Fallible variant of [`Match::pattern`].
    pub fn try_pattern(pattern: &str) -> Result<Self, SetupError> {
        Ok(Self::with_rule(MatchRule::Pattern(regex::Regex::new(
            pattern,
        )?)))
    }

    /// Compares the value for equality against the given validator's
    /// result. With a cross-field reference as criterion this is the
    /// confirmation-field pattern:
    ///
    /// ```rust,ignore
    /// let confirm = Match::check(Field::new(".password").copy(true));
    /// ```
    pub fn check(validator: impl IntoValidator) -> Self {
        Self::with_rule(MatchRule::Check(validator.into_validator()))
    }

    /// Case-insensitive comparison. Rebuilds regex rules accordingly.
    ///
    /// # Panics
    ///
    /// Panics if the stored pattern no longer compiles, which cannot
    /// happen for patterns accepted by the constructor.
    #[must_use = "builder methods must be chained or built"]
    pub fn ignore_case(mut self, ignore_case: bool) -> Self {
        self.ignore_case = ignore_case;
        if let MatchRule::Pattern(regex) = &self.rule {
            let rebuilt = RegexBuilder::new(regex.as_str())
                .case_insensitive(ignore_case)
                .build()
                .unwrap_or_else(|error| panic!("{error}"));
            self.rule = MatchRule::Pattern(rebuilt);
        }
        self
    }

    fn mismatch(&self, value: &Value, criterion: impl ToString) -> Invalid {
        self.invalid("mismatch")
            .with_param("criterion", criterion)
            .with_value(value.clone())
    }
}

#[async_trait]
impl Validator for Match {
    fn name(&self) -> &'static str {
        "Match"
    }

    fn messages(&self) -> Option<&Messages> {
        Some(&self.messages)
    }

    fn on_value(&self, ctx: &Context, value: &Value) -> Result<Value, Invalid> {
        match &self.rule {
            MatchRule::Raw(criterion) => {
                let matched = match (value, criterion) {
                    (Value::Str(a), Value::Str(b)) if self.ignore_case => {
                        a.eq_ignore_ascii_case(b)
                    }
                    _ => value == criterion,
                };
                if matched {
                    Ok(value.clone())
                } else {
                    Err(self.mismatch(value, criterion))
                }
            }
            MatchRule::Pattern(regex) => {
                let Some(s) = value.as_str() else {
                    return Err(self.invalid("type").with_value(value.clone()));
                };
                if regex.is_match(s) {
                    Ok(value.clone())
                } else {
                    Err(self.mismatch(value, regex.as_str()))
                }
            }
            MatchRule::Check(validator) => {
                let criterion = validator
                    .validate(ctx, value)
                    .map_err(|_| self.mismatch(value, validator.name()))?;
                let matched = match (value, &criterion) {
                    (Value::Str(a), Value::Str(b)) if self.ignore_case => {
                        a.eq_ignore_ascii_case(b)
                    }
                    _ => value == &criterion,
                };
                if matched {
                    Ok(value.clone())
                } else {
                    Err(self.mismatch(value, &criterion))
                }
            }
        }
    }

    /// Validator criteria (cross-field references among them) must run on
    /// the async path when the strategy is asynchronous.
    async fn validate_async(&self, ctx: &Context, value: &Value) -> Result<Value, Invalid> {
        let MatchRule::Check(validator) = &self.rule else {
            return self.validate(ctx, value);
        };
        if value.presence() != Presence::Present {
            return self.validate(ctx, value);
        }
        let criterion = validator
            .validate_async(ctx, value)
            .await
            .map_err(|_| self.mismatch(value, validator.name()))?;
        let matched = match (value, &criterion) {
            (Value::Str(a), Value::Str(b)) if self.ignore_case => a.eq_ignore_ascii_case(b),
            _ => value == &criterion,
        };
        if matched {
            Ok(value.clone())
        } else {
            Err(self.mismatch(value, &criterion))
        }
    }

    fn sub_validators(&self, out: &mut Vec<Arc<dyn Validator>>) {
        if let MatchRule::Check(validator) = &self.rule {
            out.push(validator.clone());
            validator.sub_validators(out);
        }
    }
}

// ============================================================================
// LENGTH
// ============================================================================

/// Bounds the length of strings (in characters), lists and maps.
///
/// # Examples
///
/// ```rust,ignore
/// use trellis::prelude::*;
///
/// let nickname = Len::range(3, 20);
/// let tags = Len::max(5);
/// ```
#[derive(Debug, Clone)]
pub struct Len {
    min: Option<usize>,
    max: Option<usize>,
    return_len: bool,
    messages: Messages,
}

impl Len {
    fn bounds(min: Option<usize>, max: Option<usize>) -> Self {
        Self {
            min,
            max,
            return_len: false,
            messages: Messages::from_pairs(&[
                ("type", "Value has no length"),
                ("min", "Value must have at least {min} characters (it has {len})"),
                ("max", "Value must have at most {max} characters (it has {len})"),
            ]),
        }
    }

    #[must_use]
    pub fn min(min: usize) -> Self {
        Self::bounds(Some(min), None)
    }

    #[must_use]
    pub fn max(max: usize) -> Self {
        Self::bounds(None, Some(max))
    }

    #[must_use]
    pub fn range(min: usize, max: usize) -> Self {
        Self::bounds(Some(min), Some(max))
    }

    /// Returns the measured length instead of the original value.
    #[must_use = "builder methods must be chained or built"]
    pub fn return_len(mut self, return_len: bool) -> Self {
        self.return_len = return_len;
        self
    }
}

#[async_trait]
impl Validator for Len {
    fn name(&self) -> &'static str {
        "Len"
    }

    fn messages(&self) -> Option<&Messages> {
        Some(&self.messages)
    }

    fn on_value(&self, _ctx: &Context, value: &Value) -> Result<Value, Invalid> {
        let Some(len) = value.length() else {
            return Err(self.invalid("type").with_value(value.clone()));
        };
        if let Some(min) = self.min {
            if len < min {
                return Err(self
                    .invalid("min")
                    .with_param("min", min)
                    .with_param("len", len)
                    .with_value(value.clone()));
            }
        }
        if let Some(max) = self.max {
            if len > max {
                return Err(self
                    .invalid("max")
                    .with_param("max", max)
                    .with_param("len", len)
                    .with_value(value.clone()));
            }
        }
        if self.return_len {
            Ok(Value::from(len))
        } else {
            Ok(value.clone())
        }
    }

    fn with_param(&self, name: &str, value: &Value) -> Option<Arc<dyn Validator>> {
        let bound = usize::try_from(value.as_int()?).ok()?;
        let mut rebuilt = self.clone();
        match name {
            "min" => rebuilt.min = Some(bound),
            "max" => rebuilt.max = Some(bound),
            _ => return None,
        }
        Some(Arc::new(rebuilt))
    }
}

// ============================================================================
// ENUMERATION
// ============================================================================

/// Requires the value to be one of a fixed set.
#[derive(Debug)]
pub struct In {
    options: Vec<Value>,
    messages: Messages,
}

impl In {
    pub fn values<I>(options: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        Self {
            options: options.into_iter().map(Into::into).collect(),
            messages: Messages::from_pairs(&[("fail", "Value must be one of: {options}")]),
        }
    }
}

#[async_trait]
impl Validator for In {
    fn name(&self) -> &'static str {
        "In"
    }

    fn messages(&self) -> Option<&Messages> {
        Some(&self.messages)
    }

    fn on_value(&self, _ctx: &Context, value: &Value) -> Result<Value, Invalid> {
        if self.options.contains(value) {
            Ok(value.clone())
        } else {
            let options = self
                .options
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            Err(self
                .invalid("fail")
                .with_param("options", options)
                .with_value(value.clone()))
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
    use crate::list;

    #[test]
    fn test_missing_substitutes_default() {
        let ctx = Missing::new().with_default(0).context(Value::Missing);
        assert_eq!(ctx.result().unwrap(), Value::from(0));

        let ctx = Missing::new().context("set");
        assert_eq!(ctx.result().unwrap_err().code, "fail");
    }

    #[test]
    fn test_blank_substitutes_default() {
        let ctx = Blank::new().with_default("n/a").context(Value::Null);
        assert_eq!(ctx.result().unwrap(), Value::from("n/a"));

        let ctx = Blank::new().context("set");
        assert_eq!(ctx.result().unwrap_err().code, "fail");
    }

    #[test]
    fn test_empty_accepts_both_absence_states() {
        assert!(Empty::new().context(Value::Missing).result().is_ok());
        assert!(Empty::new().context(Value::Null).result().is_ok());
        assert!(Empty::new().context("x").result().is_err());
    }

    #[test]
    fn test_match_raw() {
        assert!(Match::raw("yes").context("yes").result().is_ok());
        assert!(Match::raw("yes").context("no").result().is_err());
        assert!(Match::raw("YES")
            .ignore_case(true)
            .context("yes")
            .result()
            .is_ok());
    }

    #[test]
    fn test_match_pattern() {
        let hex = Match::pattern(r"^[0-9a-f]+$");
        assert!(hex.context("deadbeef").result().is_ok());

        let hex = Match::pattern(r"^[0-9a-f]+$");
        let err = hex.context("nope!").result().unwrap_err();
        assert_eq!(err.code, "mismatch");

        let hex = Match::pattern(r"^[0-9a-f]+$");
        assert_eq!(hex.context(15).result().unwrap_err().code, "type");
    }

    #[test]
    fn test_match_pattern_ignore_case() {
        let hex = Match::pattern(r"^[0-9a-f]+$").ignore_case(true);
        assert!(hex.context("DEADBEEF").result().is_ok());
    }

    #[test]
    fn test_try_pattern_reports_bad_regex() {
        assert!(matches!(
            Match::try_pattern("("),
            Err(SetupError::Pattern(_))
        ));
    }

    #[test]
    fn test_match_check_compares_against_criterion_result() {
        // IsString passes the value through, so equality holds.
        let m = Match::check(crate::validators::IsString::new());
        assert_eq!(m.context("x").result().unwrap(), Value::from("x"));

        // IsInt::convert yields 42 (an integer), which "42" does not equal.
        let m = Match::check(crate::validators::IsInt::convert());
        assert_eq!(m.context("42").result().unwrap_err().code, "mismatch");
    }

    #[test]
    fn test_len_bounds() {
        assert!(Len::range(3, 5).context("abcd").result().is_ok());
        assert_eq!(
            Len::range(3, 5).context("ab").result().unwrap_err().code,
            "min"
        );
        assert_eq!(
            Len::range(3, 5).context("abcdef").result().unwrap_err().code,
            "max"
        );
        assert!(Len::min(2).context(list!["a", "b"]).result().is_ok());
        assert_eq!(Len::min(1).context(7).result().unwrap_err().code, "type");
    }

    #[test]
    fn test_len_error_carries_params() {
        let err = Len::min(8).context("abc").result().unwrap_err();
        assert_eq!(err.param("min"), Some("8"));
        assert_eq!(err.param("len"), Some("3"));
        assert_eq!(
            err.message.as_deref(),
            Some("Value must have at least 8 characters (it has 3)")
        );
    }

    #[test]
    fn test_len_with_param_rebuilds() {
        let relaxed = Len::min(2);
        let strict = relaxed.with_param("min", &Value::from(5)).unwrap();
        let ctx = crate::context::Context::new(strict, "abc");
        assert_eq!(ctx.result().unwrap_err().code, "min");
        // The original instance keeps its bound.
        assert!(relaxed.context("abc").result().is_ok());
    }

    #[test]
    fn test_return_len() {
        let ctx = Len::min(1).return_len(true).context("abcd");
        assert_eq!(ctx.result().unwrap(), Value::from(4));
    }

    #[test]
    fn test_in_enumeration() {
        assert!(In::values(["red", "green"]).context("red").result().is_ok());
        let err = In::values(["red", "green"])
            .context("blue")
            .result()
            .unwrap_err();
        assert_eq!(err.code, "fail");
        assert_eq!(err.param("options"), Some("red, green"));
    }
}
