//! Validator combinators: conjunction, disjunction, negation, function
//! lifting, message overrides and the tag/compose override mechanism.

mod and;
mod call;
mod compose;
mod if_else;
mod item;
mod message;
mod not;
mod or;
mod tag;

pub use and::And;
pub use call::{Call, CallAsync};
pub use compose::{Compose, Overrides};
pub use if_else::IfElse;
pub use item::Item;
pub use message::WithMessage;
pub use not::Not;
pub use or::Or;
pub use tag::{OverrideMap, Tag, TagState};
