//! Leaf validators: type checks, value checks and scratch cache access.

mod cache;
mod check;
mod types;

pub use cache::{CacheGet, CacheSet};
pub use check::{Blank, Empty, In, Len, Match, Missing};
pub use types::{IsBool, IsFloat, IsInt, IsList, IsMap, IsString};
