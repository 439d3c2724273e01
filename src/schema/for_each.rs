//! Homogeneous structural validation

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use indexmap::IndexMap;

use crate::context::Context;
use crate::foundation::{Invalid, IntoValidator, Messages, Validator, Value};

/// Applies one validator to every element of a list or map.
///
/// Lists get children keyed by decimal index. Maps are accepted as
/// list-like when their keys are exactly the indices `"0".."n-1"` (the
/// default); with
/// [`ForEach::numeric_keys`] disabled they are validated per entry and a
/// map is returned, which requires [`ForEach::return_list`] to be disabled
/// as well.
///
/// # Examples
///
/// ```rust,ignore
/// use trellis::prelude::*;
///
/// let tags = ForEach::new(IsString::new().and(Len::range(1, 16)));
/// ```
#[derive(Debug)]
pub struct ForEach {
    inner: Arc<dyn Validator>,
    numeric_keys: bool,
    return_list: bool,
    inline: bool,
    messages: Messages,
}

impl ForEach {
    pub fn new(inner: impl IntoValidator) -> Self {
        let mut messages = Messages::from_pairs(&[
            ("type", "Value must be a list or a map"),
            ("numeric_keys", "Map keys must be contiguous indices from 0 (got: {keys})"),
            ("list_type", "Value must be a list"),
        ]);
        messages.suppress("fail");
        Self {
            inner: inner.into_validator(),
            numeric_keys: true,
            return_list: true,
            inline: false,
            messages,
        }
    }

    /// Whether map input must be list-like (keys `"0"`..`"n-1"`).
    #[must_use = "builder methods must be chained or built"]
    pub fn numeric_keys(mut self, numeric_keys: bool) -> Self {
        self.numeric_keys = numeric_keys;
        self
    }

    /// Whether the result is a list. Disable for keyed map results.
    #[must_use = "builder methods must be chained or built"]
    pub fn return_list(mut self, return_list: bool) -> Self {
        self.return_list = return_list;
        self
    }

    /// Inline mode: no child contexts, abort on the first failing element.
    #[must_use = "builder methods must be chained or built"]
    pub fn inline(mut self, inline: bool) -> Self {
        self.inline = inline;
        self
    }

    /// Extracts (key, element) pairs in input order.
    fn extract(&self, value: &Value) -> Result<Vec<(String, Value)>, Invalid> {
        match value {
            Value::List(list) => Ok(list
                .iter()
                .enumerate()
                .map(|(i, element)| (i.to_string(), element.clone()))
                .collect()),
            Value::Map(map) => {
                if self.numeric_keys {
                    // List-like means the keys are exactly "0".."n-1".
                    let mut indexed: Vec<(usize, Value)> = Vec::with_capacity(map.len());
                    for (key, element) in map {
                        if let Ok(index) = key.parse::<usize>() {
                            indexed.push((index, element.clone()));
                        }
                    }
                    indexed.sort_by_key(|(index, _)| *index);
                    let list_like = indexed.len() == map.len()
                        && indexed
                            .iter()
                            .enumerate()
                            .all(|(position, (index, _))| position == *index);
                    if !list_like {
                        let keys: Vec<&str> = map.keys().map(String::as_str).collect();
                        return Err(self
                            .invalid("numeric_keys")
                            .with_param("keys", keys.join(", "))
                            .with_value(value.clone()));
                    }
                    Ok(indexed
                        .into_iter()
                        .map(|(index, element)| (index.to_string(), element))
                        .collect())
                } else if self.return_list {
                    Err(self.invalid("list_type").with_value(value.clone()))
                } else {
                    Ok(map
                        .iter()
                        .map(|(key, element)| (key.clone(), element.clone()))
                        .collect())
                }
            }
            _ => Err(self.invalid("type").with_value(value.clone())),
        }
    }

    fn populate(&self, ctx: &Context, entries: &[(String, Value)]) -> Vec<Context> {
        let keys: Vec<String> = entries.iter().map(|(key, _)| key.clone()).collect();
        ctx.set_index_fn(Some(Arc::new(move |i| {
            keys.get(i).cloned().unwrap_or_else(|| i.to_string())
        })));

        entries
            .iter()
            .map(|(key, element)| {
                let child = ctx.child(key);
                child.prime(self.inner.clone(), element.clone());
                child
            })
            .collect()
    }

    fn assemble(
        &self,
        outcomes: Vec<(String, Result<Value, Invalid>)>,
    ) -> Result<Value, Invalid> {
        let mut errors = Vec::new();
        let mut failed = Vec::new();
        let mut results = IndexMap::new();
        for (key, outcome) in outcomes {
            match outcome {
                Ok(result) => {
                    results.insert(key, result);
                }
                Err(error) => {
                    failed.push(key);
                    errors.push(error);
                }
            }
        }
        if !errors.is_empty() {
            return Err(self
                .invalid("fail")
                .with_param("keys", failed.join(", "))
                .with_nested(errors));
        }
        if self.return_list {
            Ok(Value::List(results.into_values().collect()))
        } else {
            Ok(Value::Map(results))
        }
    }
}

#[async_trait]
impl Validator for ForEach {
    fn name(&self) -> &'static str {
        "ForEach"
    }

    fn messages(&self) -> Option<&Messages> {
        Some(&self.messages)
    }

    fn on_value(&self, ctx: &Context, value: &Value) -> Result<Value, Invalid> {
        let entries = self.extract(value)?;

        if self.inline {
            let mut outcomes = Vec::with_capacity(entries.len());
            for (key, element) in entries {
                let result = self.inner.validate(ctx, &element)?;
                outcomes.push((key, Ok(result)));
            }
            return self.assemble(outcomes);
        }

        let children = self.populate(ctx, &entries);
        let outcomes = entries
            .iter()
            .zip(&children)
            .map(|((key, _), child)| (key.clone(), child.result()))
            .collect();
        self.assemble(outcomes)
    }

    async fn validate_async(&self, ctx: &Context, value: &Value) -> Result<Value, Invalid> {
        if value.presence() != crate::foundation::Presence::Present {
            return self.validate(ctx, value);
        }
        let entries = self.extract(value)?;

        if self.inline {
            let mut outcomes = Vec::with_capacity(entries.len());
            for (key, element) in entries {
                let result = self.inner.validate_async(ctx, &element).await?;
                outcomes.push((key, Ok(result)));
            }
            return self.assemble(outcomes);
        }

        // Concurrent fan-out with input-order aggregation.
        let children = self.populate(ctx, &entries);
        let results = join_all(children.iter().map(Context::result_async)).await;
        let outcomes = entries
            .iter()
            .zip(results)
            .map(|((key, _), outcome)| (key.clone(), outcome))
            .collect();
        self.assemble(outcomes)
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
    use super::*;
    use crate::foundation::ValidatorExt;
    use crate::validators::{IsInt, Len};
    use crate::{list, record};

    #[test]
    fn test_list_elements_validate_independently() {
        let ctx = ForEach::new(IsInt::convert()).context(list!["1", "2", "3"]);
        assert_eq!(
            ctx.result().unwrap(),
            Value::List(vec![Value::from(1), Value::from(2), Value::from(3)])
        );
    }

    #[test]
    fn test_every_failing_element_is_reported() {
        let ctx = ForEach::new(IsInt::convert()).context(list!["1", "x", "y"]);
        let err = ctx.result().unwrap_err();
        assert_eq!(err.param("keys"), Some("1, 2"));
        assert_eq!(err.nested[0].path.as_deref(), Some("/1"));
    }

    #[test]
    fn test_numeric_keyed_map_is_list_like() {
        let ctx = ForEach::new(IsInt::new()).context(record! {
            "1" => 20, "0" => 10,
        });
        // Entries are ordered by index, not input order.
        assert_eq!(
            ctx.result().unwrap(),
            Value::List(vec![Value::from(10), Value::from(20)])
        );
    }

    #[test]
    fn test_non_numeric_keys_rejected_by_default() {
        let ctx = ForEach::new(IsInt::new()).context(record! { "a" => 1, "b" => 2 });
        let err = ctx.result().unwrap_err();
        assert_eq!(err.code, "numeric_keys");
        assert_eq!(err.param("keys"), Some("a, b"));
    }

    #[test]
    fn test_gapped_indices_are_rejected() {
        let ctx = ForEach::new(IsInt::new()).context(record! { "0" => 1, "2" => 2 });
        let err = ctx.result().unwrap_err();
        assert_eq!(err.code, "numeric_keys");
        assert_eq!(err.param("keys"), Some("0, 2"));
    }

    #[test]
    fn test_offset_indices_are_rejected() {
        let ctx = ForEach::new(IsInt::new()).context(record! { "1" => 1, "2" => 2 });
        assert_eq!(ctx.result().unwrap_err().code, "numeric_keys");
    }

    #[test]
    fn test_keyed_map_mode() {
        let validator = ForEach::new(IsInt::convert())
            .numeric_keys(false)
            .return_list(false);
        let ctx = validator.context(record! { "a" => "1", "b" => "2" });
        let result = ctx.result().unwrap();
        assert_eq!(result.get("a"), Value::from(1));
        assert_eq!(result.get("b"), Value::from(2));
    }

    #[test]
    fn test_map_with_list_result_is_rejected() {
        let validator = ForEach::new(IsInt::new()).numeric_keys(false);
        let ctx = validator.context(record! { "a" => 1 });
        assert_eq!(ctx.result().unwrap_err().code, "list_type");
    }

    #[test]
    fn test_children_are_indexable() {
        let ctx = ForEach::new(Len::min(1)).context(list!["a", "b"]);
        let _ = ctx.result();
        assert_eq!(ctx.at(1).result().unwrap(), Value::from("b"));
        assert_eq!(ctx.child("(0)").path(), "/0");
    }

    #[test]
    fn test_inline_mode_aborts_on_first_failure() {
        let validator = ForEach::new(IsInt::convert()).inline(true);
        let ctx = validator.context(list!["x", "y"]);
        assert_eq!(ctx.result().unwrap_err().code, "type");
    }
}
