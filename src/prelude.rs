//! Convenience re-exports for building validator trees.
//!
//! ```rust,ignore
//! use trellis::prelude::*;
//! ```

pub use crate::combinators::{
    And, Call, CallAsync, Compose, IfElse, Item, Not, Or, Overrides, Tag, WithMessage,
};
pub use crate::context::Context;
pub use crate::foundation::{
    Invalid, IntoValidator, Messages, Presence, SetupError, Validator, ValidatorExt, Value,
};
pub use crate::schema::{Field, ForEach, Schema};
pub use crate::validators::{
    Blank, CacheGet, CacheSet, Empty, In, IsBool, IsFloat, IsInt, IsList, IsMap, IsString, Len,
    Match, Missing,
};
pub use crate::{list, record};
