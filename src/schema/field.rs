//! Cross-field references

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::Context;
use crate::foundation::{Invalid, IntoValidator, Validator, Value};

/// References another context in the tree by path.
///
/// Paths starting with `/` resolve from the root; each leading `.` walks
/// one level up from the current context, so `.password` addresses a
/// sibling. The referenced value (or, with [`Field::use_result`], its
/// validated result) optionally runs through a criterion; by default the
/// current value passes through unchanged, with [`Field::copy`] the
/// referenced value replaces it.
///
/// Reading a sibling's result triggers its validation on demand; the
/// memoized outcome is shared with the enclosing schema's own pass over
/// that sibling.
///
/// # Examples
///
/// ```rust,ignore
/// use trellis::prelude::*;
///
/// // The confirmation field must equal the password field.
/// let confirm = Match::check(Field::new(".password").copy(true));
/// ```
#[derive(Debug)]
pub struct Field {
    path: String,
    criterion: Option<Arc<dyn Validator>>,
    use_result: bool,
    copy: bool,
    write_to_context: bool,
}

impl Field {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            criterion: None,
            use_result: false,
            copy: false,
            write_to_context: false,
        }
    }

    /// Runs the referenced value through a criterion; its errors surface
    /// at the current context.
    #[must_use = "builder methods must be chained or built"]
    pub fn check(mut self, criterion: impl IntoValidator) -> Self {
        self.criterion = Some(criterion.into_validator());
        self
    }

    /// Reads the referenced context's validated result instead of its raw
    /// value. A failed reference reads as a no-op: the criterion is
    /// skipped and the current value passes through, while the target
    /// reports its own error at its own path.
    #[must_use = "builder methods must be chained or built"]
    pub fn use_result(mut self, use_result: bool) -> Self {
        self.use_result = use_result;
        self
    }

    /// Returns the referenced value instead of passing the current value
    /// through.
    #[must_use = "builder methods must be chained or built"]
    pub fn copy(mut self, copy: bool) -> Self {
        self.copy = copy;
        self
    }

    /// Writes the criterion's result back into the referenced context as
    /// its memoized result.
    #[must_use = "builder methods must be chained or built"]
    pub fn write_to_context(mut self, write: bool) -> Self {
        self.write_to_context = write;
        self
    }

    /// Resolves the referenced context, creating it on demand.
    ///
    /// # Panics
    ///
    /// Panics when the path resolves to the current context itself; a
    /// self-referencing field cannot terminate.
    fn resolve(&self, ctx: &Context) -> Context {
        let target = if self.path.starts_with('/') {
            ctx.child(&self.path)
        } else {
            let mut rest = self.path.as_str();
            let mut base = ctx.clone();
            while let Some(stripped) = rest.strip_prefix('.') {
                base = base.parent().unwrap_or_else(|| base.root());
                rest = stripped;
            }
            if rest.is_empty() {
                base
            } else {
                base.child(rest)
            }
        };
        assert!(
            !target.same_as(ctx),
            "field '{}' references its own context",
            self.path
        );
        target
    }

    fn finish(
        &self,
        target: &Context,
        value: &Value,
        result: Value,
    ) -> Result<Value, Invalid> {
        if self.write_to_context {
            target.write_result(result.clone());
        }
        if self.copy {
            Ok(result)
        } else {
            Ok(value.clone())
        }
    }
}

#[async_trait]
impl Validator for Field {
    fn name(&self) -> &'static str {
        "Field"
    }

    /// Runs regardless of the current value's presence; the referenced
    /// value is what gets checked.
    fn validate(&self, ctx: &Context, value: &Value) -> Result<Value, Invalid> {
        let target = self.resolve(ctx);
        let referenced = if self.use_result {
            match target.result() {
                Ok(result) => result,
                // A failed reference reads as a no-op; the target already
                // reports its own error at its own path.
                Err(_) => return Ok(value.clone()),
            }
        } else {
            target.value()
        };
        let result = match &self.criterion {
            Some(criterion) => criterion.validate(&target, &referenced)?,
            None => referenced,
        };
        self.finish(&target, value, result)
    }

    async fn validate_async(&self, ctx: &Context, value: &Value) -> Result<Value, Invalid> {
        let target = self.resolve(ctx);
        let referenced = if self.use_result {
            match target.result_async().await {
                Ok(result) => result,
                Err(_) => return Ok(value.clone()),
            }
        } else {
            target.value()
        };
        let result = match &self.criterion {
            Some(criterion) => criterion.validate_async(&target, &referenced).await?,
            None => referenced,
        };
        self.finish(&target, value, result)
    }

    fn sub_validators(&self, out: &mut Vec<Arc<dyn Validator>>) {
        if let Some(criterion) = &self.criterion {
            out.push(criterion.clone());
            criterion.sub_validators(out);
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
    use crate::schema::Schema;
    use crate::validators::{IsInt, IsString, Len};

    #[test]
    fn test_copy_sibling_result() {
        let schema = Schema::new()
            .field("a", IsInt::convert())
            .field("b", Field::new(".a").use_result(true).copy(true));
        let ctx = schema.context(record! { "a" => "5" });
        let result = ctx.result().unwrap();
        assert_eq!(result.get("b"), Value::from(5));
    }

    #[test]
    fn test_raw_value_reference() {
        let schema = Schema::new()
            .field("a", IsInt::convert())
            .field("b", Field::new(".a").copy(true));
        let ctx = schema.context(record! { "a" => "5" });
        // Without use_result the raw (unconverted) value is referenced.
        assert_eq!(ctx.result().unwrap().get("b"), Value::from("5"));
    }

    #[test]
    fn test_failed_reference_is_a_noop() {
        let schema = Schema::new()
            .field("a", IsInt::new())
            .field("b", Field::new(".a").use_result(true).copy(true));
        let ctx = schema.context(record! { "a" => "nan", "b" => 1 });
        let err = ctx.result().unwrap_err();
        // Only the target reports; the referencing field passes its own
        // value through untouched.
        assert!(err.nested.iter().all(|e| e.path.as_deref() != Some("/b")));
        assert_eq!(ctx.child("b").result().unwrap(), Value::from(1));
    }

    #[test]
    fn test_failed_reference_skips_the_criterion() {
        let schema = Schema::new()
            .field("a", IsInt::new())
            .field(
                "b",
                Field::new(".a").use_result(true).check(Len::min(100)),
            );
        let ctx = schema.context(record! { "a" => "nan", "b" => "kept" });
        let err = ctx.result().unwrap_err();
        assert!(err.nested.iter().all(|e| e.path.as_deref() != Some("/b")));
        assert_eq!(ctx.child("b").result().unwrap(), Value::from("kept"));
    }

    #[test]
    fn test_criterion_errors_surface_at_current_context() {
        let schema = Schema::new()
            .field("a", IsString::new())
            .field("b", Field::new(".a").check(Len::min(10)));
        let ctx = schema.context(record! { "a" => "short", "b" => 1 });
        let err = ctx.result().unwrap_err();
        assert_eq!(err.nested[0].path.as_deref(), Some("/b"));
        assert_eq!(err.nested[0].code, "min");
    }

    #[test]
    fn test_absolute_path() {
        let schema = Schema::new()
            .field("a", IsString::new())
            .field("b", Field::new("/a").copy(true));
        let ctx = schema.context(record! { "a" => "x" });
        assert_eq!(ctx.result().unwrap().get("b"), Value::from("x"));
    }

    #[test]
    #[should_panic(expected = "references its own context")]
    fn test_self_reference_is_fatal() {
        let schema = Schema::new()
            .field("a", IsString::new())
            .field("b", Field::new(".b"));
        let _ = schema.context(record! { "a" => "x" }).result();
    }

    #[test]
    fn test_write_to_context() {
        let schema = Schema::new()
            .field("a", IsString::new())
            .field(
                "b",
                Field::new(".a").check(Len::min(1).return_len(true)).write_to_context(true),
            );
        let ctx = schema.context(record! { "a" => "abc", "b" => 1 });
        let _ = ctx.result();
        // The referenced context's memoized result was overwritten.
        assert_eq!(ctx.child("a").result().unwrap(), Value::from(3));
    }
}
