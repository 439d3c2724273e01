//! Foundation types: the dynamic value model, the structured error type
//! and the core validator traits.

mod error;
mod traits;
mod value;

pub use error::{default_template, Invalid, Messages, SetupError, ValidatorId};
pub use traits::{IntoValidator, Validator, ValidatorExt};
pub use value::{Presence, Value};
