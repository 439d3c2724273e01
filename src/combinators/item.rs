//! Single-element validation inside collections

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::Context;
use crate::foundation::{Invalid, IntoValidator, Messages, Validator, Value};

/// Validates one element of a list or map in place.
///
/// The element's validation result replaces it in the returned collection;
/// siblings pass through untouched. For lists the key is the decimal
/// index.
///
/// # Examples
///
/// ```rust,ignore
/// use trellis::prelude::*;
///
/// let first_upper = Item::new("0", Match::pattern(r"^[A-Z]"));
/// ```
#[derive(Debug)]
pub struct Item {
    key: String,
    inner: Arc<dyn Validator>,
    messages: Messages,
}

impl Item {
    pub fn new(key: impl Into<String>, inner: impl IntoValidator) -> Self {
        Self {
            key: key.into(),
            inner: inner.into_validator(),
            messages: Messages::from_pairs(&[
                ("type", "Value must be a list or a map"),
                ("not_found", "Item {key} not found"),
            ]),
        }
    }

    fn put(&self, value: &Value, result: Value) -> Value {
        match value {
            Value::Map(map) => {
                let mut map = map.clone();
                map.insert(self.key.clone(), result);
                Value::Map(map)
            }
            Value::List(list) => {
                let mut list = list.clone();
                if let Ok(index) = self.key.parse::<usize>() {
                    if index < list.len() {
                        list[index] = result;
                    }
                }
                Value::List(list)
            }
            other => other.clone(),
        }
    }
}

#[async_trait]
impl Validator for Item {
    fn name(&self) -> &'static str {
        "Item"
    }

    fn messages(&self) -> Option<&Messages> {
        Some(&self.messages)
    }

    fn on_value(&self, ctx: &Context, value: &Value) -> Result<Value, Invalid> {
        if !matches!(value, Value::List(_) | Value::Map(_)) {
            return Err(self.invalid("type").with_value(value.clone()));
        }
        let element = value.get(&self.key);
        if element.is_missing() {
            return Err(self.invalid("not_found").with_param("key", &self.key));
        }
        let result = self.inner.validate(ctx, &element)?;
        Ok(self.put(value, result))
    }

    async fn validate_async(&self, ctx: &Context, value: &Value) -> Result<Value, Invalid> {
        if value.presence() != crate::foundation::Presence::Present {
            return self.validate(ctx, value);
        }
        if !matches!(value, Value::List(_) | Value::Map(_)) {
            return Err(self.invalid("type").with_value(value.clone()));
        }
        let element = value.get(&self.key);
        if element.is_missing() {
            return Err(self.invalid("not_found").with_param("key", &self.key));
        }
        let result = self.inner.validate_async(ctx, &element).await?;
        Ok(self.put(value, result))
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
    use crate::validators::IsInt;
    use crate::{list, record};

    #[test]
    fn test_validates_and_replaces_one_element() {
        let validator = Item::new("age", IsInt::convert());
        let ctx = validator.context(record! { "age" => "42", "name" => "bob" });
        let result = ctx.result().unwrap();
        assert_eq!(result.get("age"), Value::from(42));
        assert_eq!(result.get("name"), Value::from("bob"));
    }

    #[test]
    fn test_list_index_key() {
        let validator = Item::new("1", IsInt::convert());
        let ctx = validator.context(list!["a", "7"]);
        assert_eq!(ctx.result().unwrap().get("1"), Value::from(7));
    }

    #[test]
    fn test_absent_key_fails() {
        let validator = Item::new("age", IsInt::new());
        let err = validator.context(record! { "name" => "bob" }).result().unwrap_err();
        assert_eq!(err.code, "not_found");
    }
}
