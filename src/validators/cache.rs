//! Scratch cache access
//!
//! The root context carries a scratch cache shared by the whole tree.
//! `CacheSet` stashes the value flowing through it; `CacheGet` substitutes
//! a previously stashed value. Together they let unrelated positions in a
//! schema exchange intermediate results within one pass.

use async_trait::async_trait;

use crate::context::Context;
use crate::foundation::{Invalid, Messages, Validator, Value};

/// Stores the value flowing through under a key, passing it on unchanged.
///
/// Sees missing and blank values too, so absence can be cached.
#[derive(Debug)]
pub struct CacheSet {
    key: String,
}

impl CacheSet {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

#[async_trait]
impl Validator for CacheSet {
    fn name(&self) -> &'static str {
        "CacheSet"
    }

    fn validate(&self, ctx: &Context, value: &Value) -> Result<Value, Invalid> {
        ctx.scratch_set(self.key.clone(), value.clone());
        Ok(value.clone())
    }
}

/// Substitutes the value cached under a key, failing when nothing was
/// stored.
#[derive(Debug)]
pub struct CacheGet {
    key: String,
    messages: Messages,
}

impl CacheGet {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            messages: Messages::from_pairs(&[("fail", "No value cached under '{key}'")]),
        }
    }
}

#[async_trait]
impl Validator for CacheGet {
    fn name(&self) -> &'static str {
        "CacheGet"
    }

    fn messages(&self) -> Option<&Messages> {
        Some(&self.messages)
    }

    fn validate(&self, ctx: &Context, _value: &Value) -> Result<Value, Invalid> {
        match ctx.scratch_get(&self.key) {
            Some(value) => Ok(value),
            None => Err(self.invalid("fail").with_param("key", &self.key)),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
