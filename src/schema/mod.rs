//! Structural validators: keyed schemas, homogeneous collections and
//! cross-field references.

mod field;
mod for_each;
#[allow(clippy::module_inception)]
mod schema;

pub use field::Field;
pub use for_each::ForEach;
pub use schema::Schema;
