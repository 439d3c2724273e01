//! Type checks and conversions
//!
//! Each type validator has a strict mode (`new`), which only accepts
//! values already of the target type, and a converting mode (`convert`),
//! which coerces compatible representations (string digits to integers,
//! scalars to strings) and returns the converted value so later stages in
//! an `And` chain see the target type.

use async_trait::async_trait;

use crate::context::Context;
use crate::foundation::{Invalid, Messages, Validator, Value};

// ============================================================================
// STRINGS
// ============================================================================

/// Accepts strings; in converting mode renders scalars to their string
/// form.
#[derive(Debug)]
pub struct IsString {
    convert: bool,
    messages: Messages,
}

impl IsString {
    #[must_use]
    pub fn new() -> Self {
        Self {
            convert: false,
            messages: Messages::from_pairs(&[("type", "Value must be a string")]),
        }
    }

    /// Converting mode: scalars become their display form.
    #[must_use]
    pub fn convert() -> Self {
        Self {
            convert: true,
            ..Self::new()
        }
    }
}

impl Default for IsString {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Validator for IsString {
    fn name(&self) -> &'static str {
        "IsString"
    }

    fn messages(&self) -> Option<&Messages> {
        Some(&self.messages)
    }

    fn on_value(&self, _ctx: &Context, value: &Value) -> Result<Value, Invalid> {
        match value {
            Value::Str(_) => Ok(value.clone()),
            Value::Bool(_) | Value::Int(_) | Value::Float(_) if self.convert => {
                Ok(Value::Str(value.to_string()))
            }
            _ => Err(self.invalid("type").with_value(value.clone())),
        }
    }
}

// ============================================================================
// INTEGERS
// ============================================================================

/// Accepts integers; in converting mode parses numeric strings and accepts
/// whole floats.
#[derive(Debug)]
pub struct IsInt {
    convert: bool,
    messages: Messages,
}

impl IsInt {
    #[must_use]
    pub fn new() -> Self {
        Self {
            convert: false,
            messages: Messages::from_pairs(&[("type", "Value must be an integer")]),
        }
    }

    #[must_use]
    pub fn convert() -> Self {
        Self {
            convert: true,
            ..Self::new()
        }
    }

    fn coerce(&self, value: &Value) -> Option<i64> {
        match value {
            Value::Int(i) => Some(*i),
            Value::Str(s) if self.convert => s.trim().parse().ok(),
            Value::Float(f) if self.convert && f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }
}

impl Default for IsInt {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Validator for IsInt {
    fn name(&self) -> &'static str {
        "IsInt"
    }

    fn messages(&self) -> Option<&Messages> {
        Some(&self.messages)
    }

    fn on_value(&self, _ctx: &Context, value: &Value) -> Result<Value, Invalid> {
        match self.coerce(value) {
            Some(i) => Ok(Value::Int(i)),
            None => Err(self.invalid("type").with_value(value.clone())),
        }
    }
}

// ============================================================================
// FLOATS
// ============================================================================

/// Accepts floats; in converting mode parses numeric strings and widens
/// integers.
#[derive(Debug)]
pub struct IsFloat {
    convert: bool,
    messages: Messages,
}

impl IsFloat {
    #[must_use]
    pub fn new() -> Self {
        Self {
            convert: false,
            messages: Messages::from_pairs(&[("type", "Value must be a number")]),
        }
    }

    #[must_use]
    pub fn convert() -> Self {
        Self {
            convert: true,
            ..Self::new()
        }
    }

    fn coerce(&self, value: &Value) -> Option<f64> {
        match value {
            Value::Float(f) => Some(*f),
            Value::Int(i) if self.convert => Some(*i as f64),
            Value::Str(s) if self.convert => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl Default for IsFloat {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Validator for IsFloat {
    fn name(&self) -> &'static str {
        "IsFloat"
    }

    fn messages(&self) -> Option<&Messages> {
        Some(&self.messages)
    }

    fn on_value(&self, _ctx: &Context, value: &Value) -> Result<Value, Invalid> {
        match self.coerce(value) {
            Some(f) => Ok(Value::Float(f)),
            None => Err(self.invalid("type").with_value(value.clone())),
        }
    }
}

// ============================================================================
// BOOLS
// ============================================================================

/// Accepts booleans; in converting mode accepts the usual textual and
/// numeric spellings.
#[derive(Debug)]
pub struct IsBool {
    convert: bool,
    messages: Messages,
}

impl IsBool {
    #[must_use]
    pub fn new() -> Self {
        Self {
            convert: false,
            messages: Messages::from_pairs(&[("type", "Value must be a boolean")]),
        }
    }

    #[must_use]
    pub fn convert() -> Self {
        Self {
            convert: true,
            ..Self::new()
        }
    }

    fn coerce(&self, value: &Value) -> Option<bool> {
        match value {
            Value::Bool(b) => Some(*b),
            Value::Int(0) if self.convert => Some(false),
            Value::Int(1) if self.convert => Some(true),
            Value::Str(s) if self.convert => match s.to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Some(true),
                "false" | "no" | "off" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }
}

impl Default for IsBool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Validator for IsBool {
    fn name(&self) -> &'static str {
        "IsBool"
    }

    fn messages(&self) -> Option<&Messages> {
        Some(&self.messages)
    }

    fn on_value(&self, _ctx: &Context, value: &Value) -> Result<Value, Invalid> {
        match self.coerce(value) {
            Some(b) => Ok(Value::Bool(b)),
            None => Err(self.invalid("type").with_value(value.clone())),
        }
    }
}

// ============================================================================
// COLLECTIONS
// ============================================================================

/// Accepts lists.
#[derive(Debug)]
pub struct IsList {
    messages: Messages,
}

impl IsList {
    #[must_use]
    pub fn new() -> Self {
        Self {
            messages: Messages::from_pairs(&[("type", "Value must be a list")]),
        }
    }
}

impl Default for IsList {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Validator for IsList {
    fn name(&self) -> &'static str {
        "IsList"
    }

    fn messages(&self) -> Option<&Messages> {
        Some(&self.messages)
    }

    fn on_value(&self, _ctx: &Context, value: &Value) -> Result<Value, Invalid> {
        match value {
            Value::List(_) => Ok(value.clone()),
            _ => Err(self.invalid("type").with_value(value.clone())),
        }
    }
}

/// Accepts maps.
#[derive(Debug)]
pub struct IsMap {
    messages: Messages,
}

impl IsMap {
    #[must_use]
    pub fn new() -> Self {
        Self {
            messages: Messages::from_pairs(&[("type", "Value must be a map")]),
        }
    }
}

impl Default for IsMap {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Validator for IsMap {
    fn name(&self) -> &'static str {
        "IsMap"
    }

    fn messages(&self) -> Option<&Messages> {
        Some(&self.messages)
    }

    fn on_value(&self, _ctx: &Context, value: &Value) -> Result<Value, Invalid> {
        match value {
            Value::Map(_) => Ok(value.clone()),
            _ => Err(self.invalid("type").with_value(value.clone())),
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

    #[test]
    fn test_strict_rejects_other_types() {
        assert_eq!(IsString::new().context(1).result().unwrap_err().code, "type");
        assert_eq!(IsInt::new().context("1").result().unwrap_err().code, "type");
        assert_eq!(IsBool::new().context(1).result().unwrap_err().code, "type");
    }

    #[test]
    fn test_convert_coerces() {
        assert_eq!(
            IsString::convert().context(42).result().unwrap(),
            Value::from("42")
        );
        assert_eq!(
            IsInt::convert().context(" 42 ").result().unwrap(),
            Value::from(42)
        );
        assert_eq!(
            IsFloat::convert().context(3).result().unwrap(),
            Value::from(3.0)
        );
        assert_eq!(
            IsBool::convert().context("Yes").result().unwrap(),
            Value::from(true)
        );
    }

    #[test]
    fn test_convert_rejects_garbage() {
        assert!(IsInt::convert().context("4x").result().is_err());
        assert!(IsBool::convert().context("maybe").result().is_err());
        // Non-whole floats do not silently truncate.
        assert!(IsInt::convert().context(1.5).result().is_err());
    }

    #[test]
    fn test_missing_and_blank_fail_before_type_logic() {
        assert_eq!(
            IsInt::new().context(Value::Missing).result().unwrap_err().code,
            "missing"
        );
        assert_eq!(
            IsList::new().context(Value::Null).result().unwrap_err().code,
            "blank"
        );
    }
}
