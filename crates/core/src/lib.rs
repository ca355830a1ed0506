//! Core domain types for the rule evaluation engine: the dynamic `Value`
//! model, attribute path identifiers, and the `Rule` declaration type.
//!
//! Everything here is domain-agnostic — a rule only knows the attribute
//! paths it reads and writes; what a product, catalog, or UI does with that
//! is outside this crate.

pub mod error;
pub mod rule;
pub mod types;
pub mod validation;
pub mod value;

pub use error::*;
pub use rule::*;
pub use types::*;
pub use value::*;
