//! Keyed structural validation

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use indexmap::IndexMap;

use crate::context::Context;
use crate::foundation::{Invalid, IntoValidator, Messages, Validator, Value};

/// Validates a map (or positionally, a list) against declared fields.
///
/// Declared fields absent from the input validate against the `Missing`
/// sentinel, so required-field errors surface uniformly. Undeclared input
/// keys are rejected in one aggregate error unless extra fields are
/// allowed.
///
/// In the default child-context mode each field is evaluated in its own
/// child context: every failing field is reported, results are memoized
/// per field, and cross-field references can address siblings. Inline mode
/// skips child contexts and aborts on the first failing field.
///
/// # Examples
///
/// ```rust,ignore
/// use trellis::prelude::*;
///
/// let signup = Schema::new()
///     .field("nickname", IsString::new().and(Len::range(3, 20)))
///     .field("email", Match::pattern(r"^[^@]+@[^@]+$"))
///     .field("password", Len::min(8))
///     .field(
///         "password_confirm",
///         Match::check(Field::new(".password").copy(true)),
///     );
/// ```
#[derive(Debug)]
pub struct Schema {
    fields: Vec<(String, Arc<dyn Validator>)>,
    allow_extra: bool,
    return_list: bool,
    inline: bool,
    messages: Messages,
}

impl Schema {
    #[must_use]
    pub fn new() -> Self {
        let mut messages = Messages::from_pairs(&[
            ("type", "Value must be a map or a list"),
            ("extra_fields", "Unknown field(s): {extra}"),
        ]);
        // The aggregate carries no message of its own; the nested field
        // errors hold the real ones.
        messages.suppress("fail");
        Self {
            fields: Vec::new(),
            allow_extra: false,
            return_list: false,
            inline: false,
            messages,
        }
    }

    /// Declares a field.
    ///
    /// # Panics
    ///
    /// Panics on a duplicate field name.
    #[must_use = "builder methods must be chained or built"]
    pub fn field(mut self, name: impl Into<String>, validator: impl IntoValidator) -> Self {
        let name = name.into();
        assert!(
            !self.fields.iter().any(|(existing, _)| *existing == name),
            "duplicate schema field '{name}'"
        );
        self.fields.push((name, validator.into_validator()));
        self
    }

    /// Accepts undeclared input keys instead of rejecting them.
    #[must_use = "builder methods must be chained or built"]
    pub fn allow_extra_fields(mut self, allow: bool) -> Self {
        self.allow_extra = allow;
        self
    }

    /// Returns field results as a list in declaration order instead of a
    /// map.
    #[must_use = "builder methods must be chained or built"]
    pub fn return_list(mut self, return_list: bool) -> Self {
        self.return_list = return_list;
        self
    }

    /// Inline mode: no child contexts, abort on the first failing field.
    #[must_use = "builder methods must be chained or built"]
    pub fn inline(mut self, inline: bool) -> Self {
        self.inline = inline;
        self
    }

    /// Extracts per-field input values in declaration order. List input
    /// maps positionally onto the declared fields.
    fn extract(&self, value: &Value) -> Result<Vec<Value>, Invalid> {
        match value {
            Value::Map(map) => {
                if !self.allow_extra {
                    let extra: Vec<&str> = map
                        .keys()
                        .filter(|key| !self.fields.iter().any(|(name, _)| name == *key))
                        .map(String::as_str)
                        .collect();
                    if !extra.is_empty() {
                        return Err(self
                            .invalid("extra_fields")
                            .with_param("extra", extra.join(", "))
                            .with_value(value.clone()));
                    }
                }
                Ok(self
                    .fields
                    .iter()
                    .map(|(name, _)| value.get(name))
                    .collect())
            }
            Value::List(list) => {
                if !self.allow_extra && list.len() > self.fields.len() {
                    let extra: Vec<String> =
                        (self.fields.len()..list.len()).map(|i| i.to_string()).collect();
                    return Err(self
                        .invalid("extra_fields")
                        .with_param("extra", extra.join(", "))
                        .with_value(value.clone()));
                }
                Ok((0..self.fields.len())
                    .map(|i| list.get(i).cloned().unwrap_or(Value::Missing))
                    .collect())
            }
            _ => Err(self.invalid("type").with_value(value.clone())),
        }
    }

    /// Primes one child context per declared field and installs positional
    /// addressing over the declaration order.
    fn populate(&self, ctx: &Context, values: Vec<Value>) -> Vec<Context> {
        let names: Vec<String> = self.fields.iter().map(|(name, _)| name.clone()).collect();
        ctx.set_index_fn(Some(Arc::new(move |i| {
            names.get(i).cloned().unwrap_or_else(|| i.to_string())
        })));

        self.fields
            .iter()
            .zip(values)
            .map(|((name, validator), value)| {
                let child = ctx.child(name);
                child.prime(validator.clone(), value);
                child
            })
            .collect()
    }

    fn assemble(&self, outcomes: Vec<(String, Result<Value, Invalid>)>) -> Result<Value, Invalid> {
        let mut errors = Vec::new();
        let mut failed = Vec::new();
        let mut results = IndexMap::new();
        for (name, outcome) in outcomes {
            match outcome {
                Ok(result) => {
                    results.insert(name, result);
                }
                Err(error) => {
                    failed.push(name);
                    errors.push(error);
                }
            }
        }
        if !errors.is_empty() {
            return Err(self
                .invalid("fail")
                .with_param("fields", failed.join(", "))
                .with_nested(errors));
        }
        if self.return_list {
            Ok(Value::List(results.into_values().collect()))
        } else {
            // Absent optional fields stay out of the result map.
            results.retain(|_, v| !v.is_missing());
            Ok(Value::Map(results))
        }
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Validator for Schema {
    fn name(&self) -> &'static str {
        "Schema"
    }

    fn messages(&self) -> Option<&Messages> {
        Some(&self.messages)
    }

    /// # Panics
    ///
    /// Panics if no fields were declared.
    fn on_value(&self, ctx: &Context, value: &Value) -> Result<Value, Invalid> {
        assert!(!self.fields.is_empty(), "schema declares no fields");
        let values = self.extract(value)?;

        if self.inline {
            let mut outcomes = Vec::with_capacity(self.fields.len());
            for ((name, validator), value) in self.fields.iter().zip(values) {
                // Inline mode aborts on the first failure.
                let result = validator.validate(ctx, &value)?;
                outcomes.push((name.clone(), Ok(result)));
            }
            return self.assemble(outcomes);
        }

        let children = self.populate(ctx, values);
        let outcomes = self
            .fields
            .iter()
            .zip(&children)
            .map(|((name, _), child)| (name.clone(), child.result()))
            .collect();
        self.assemble(outcomes)
    }

    async fn validate_async(&self, ctx: &Context, value: &Value) -> Result<Value, Invalid> {
        if value.presence() != crate::foundation::Presence::Present {
            return self.validate(ctx, value);
        }
        assert!(!self.fields.is_empty(), "schema declares no fields");
        let values = self.extract(value)?;

        if self.inline {
            let mut outcomes = Vec::with_capacity(self.fields.len());
            for ((name, validator), value) in self.fields.iter().zip(values) {
                let result = validator.validate_async(ctx, &value).await?;
                outcomes.push((name.clone(), Ok(result)));
            }
            return self.assemble(outcomes);
        }

        // Concurrent fan-out; aggregation stays in declaration order, so
        // the outcome is independent of completion order.
        let children = self.populate(ctx, values);
        let results = join_all(children.iter().map(Context::result_async)).await;
        let outcomes = self
            .fields
            .iter()
            .zip(results)
            .map(|((name, _), outcome)| (name.clone(), outcome))
            .collect();
        self.assemble(outcomes)
    }

    fn sub_validators(&self, out: &mut Vec<Arc<dyn Validator>>) {
        for (_, validator) in &self.fields {
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
    use crate::record;
    use crate::validators::{IsInt, IsString, Len};

    fn person() -> Schema {
        Schema::new()
            .field("name", IsString::new().and(Len::min(2)))
            .field("age", IsInt::convert())
    }

    #[test]
    fn test_valid_map_input() {
        let ctx = person().context(record! { "name" => "bob", "age" => "42" });
        let result = ctx.result().unwrap();
        assert_eq!(result.get("name"), Value::from("bob"));
        assert_eq!(result.get("age"), Value::from(42));
    }

    #[test]
    fn test_list_input_maps_positionally() {
        let ctx = person().context(crate::list!["bob", "42"]);
        let result = ctx.result().unwrap();
        assert_eq!(result.get("age"), Value::from(42));
    }

    #[test]
    fn test_all_failing_fields_are_reported() {
        let ctx = person().context(record! { "name" => "x", "age" => "nan" });
        let err = ctx.result().unwrap_err();
        assert_eq!(err.code, "fail");
        assert_eq!(err.nested.len(), 2);
        assert_eq!(err.param("fields"), Some("name, age"));
        // Child errors are addressed by path.
        assert_eq!(err.nested[0].path.as_deref(), Some("/name"));
        assert_eq!(err.nested[1].path.as_deref(), Some("/age"));
    }

    #[test]
    fn test_absent_declared_field_sees_missing() {
        let ctx = person().context(record! { "name" => "bob" });
        let err = ctx.result().unwrap_err();
        assert_eq!(err.nested[0].code, "missing");
        assert_eq!(err.nested[0].path.as_deref(), Some("/age"));
    }

    #[test]
    fn test_extra_fields_rejected_in_one_error() {
        let ctx = person().context(record! {
            "name" => "bob", "age" => 1, "x" => 1, "y" => 2,
        });
        let err = ctx.result().unwrap_err();
        assert_eq!(err.code, "extra_fields");
        assert_eq!(err.param("extra"), Some("x, y"));
    }

    #[test]
    fn test_extra_fields_allowed_when_opted_in() {
        let schema = person().allow_extra_fields(true);
        let ctx = schema.context(record! { "name" => "bob", "age" => 1, "x" => 1 });
        let result = ctx.result().unwrap();
        // Extra input is dropped from the result, not echoed back.
        assert_eq!(result.get("x"), Value::Missing);
    }

    #[test]
    fn test_child_contexts_are_addressable() {
        let ctx = person().context(record! { "name" => "bob", "age" => "42" });
        let _ = ctx.result();
        assert_eq!(ctx.child("age").result().unwrap(), Value::from(42));
        // Positional addressing follows declaration order.
        assert_eq!(ctx.at(0).path(), "/name");
    }

    #[test]
    fn test_inline_mode_aborts_on_first_failure() {
        let schema = person().inline(true);
        let ctx = schema.context(record! { "name" => "x", "age" => "nan" });
        let err = ctx.result().unwrap_err();
        // The first field's error propagates directly, unaggregated.
        assert_eq!(err.code, "min");
    }

    #[test]
    fn test_return_list() {
        let schema = person().return_list(true);
        let ctx = schema.context(record! { "name" => "bob", "age" => "42" });
        let result = ctx.result().unwrap();
        assert_eq!(result.as_list().map(|l| l.len()), Some(2));
        assert_eq!(result.get("0"), Value::from("bob"));
    }

    #[test]
    fn test_duplicate_field_is_fatal() {
        let caught = std::panic::catch_unwind(|| {
            let _ = Schema::new()
                .field("a", IsString::new())
                .field("a", IsString::new());
        });
        assert!(caught.is_err());
    }
}
