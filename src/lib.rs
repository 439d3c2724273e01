//! Declarative, composable validation with lazy, path-addressed
//! evaluation.
//!
//! Validator trees are immutable, shareable templates built from leaf
//! checks ([`validators`]), combinators ([`combinators`]) and structural
//! validators ([`schema`]). Evaluation state lives entirely in a
//! [`Context`] tree mirroring the input: results are computed lazily,
//! memoized per node and invalidated when a value or validator changes.
//! Cross-field rules address siblings by path, tagged positions in a tree
//! can be re-parameterized or disabled per composition, and the same tree
//! runs under a synchronous or an asynchronous strategy.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use trellis::prelude::*;
//!
//! let signup = Schema::new()
//!     .field("nickname", IsString::new().and(Len::range(3, 20)))
//!     .field("password", Len::min(8))
//!     .field(
//!         "password_confirm",
//!         Match::check(Field::new(".password").copy(true)),
//!     );
//!
//! let ctx = signup.context(record! {
//!     "nickname" => "bob",
//!     "password" => "secret123",
//!     "password_confirm" => "secret123",
//! });
//!
//! match ctx.result() {
//!     Ok(validated) => println!("{validated}"),
//!     Err(error) => {
//!         for field_error in &error.nested {
//!             println!("{field_error}");
//!         }
//!     }
//! }
//! ```
//!
//! # Reusable compositions
//!
//! ```rust,ignore
//! use trellis::prelude::*;
//!
//! let nickname = Compose::new(
//!     IsString::new().and(Len::range(3, 20).tag("length")),
//! );
//! let strict = nickname.with(Overrides::new().set("length_min", 8));
//! ```

pub mod combinators;
pub mod context;
pub mod foundation;
mod macros;
pub mod prelude;
pub mod schema;
pub mod validators;

pub use context::Context;
pub use foundation::{
    Invalid, IntoValidator, Messages, Presence, SetupError, Validator, ValidatorExt, Value,
};

// Macro support; not part of the public API.
#[doc(hidden)]
pub mod __private {
    pub use indexmap::IndexMap;
}
