//! Variable system.
//!
//! The [`VariableStore`] holds everything the connector has supplied for a
//! transaction; the [`VariableResolver`] turns rule targets into the values
//! a matcher inspects.

mod collection;
mod resolver;
mod store;
mod target;

pub use collection::{Collection, MutableCollection, OrderedCollection, TxCollection};
pub use resolver::VariableResolver;
pub use store::{PhaseData, VariableStore};
pub use target::{Selection, Target, Variable};
