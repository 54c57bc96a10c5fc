//! Scoped variables with dependency-ordered asynchronous revalidation.
//!
//! Variables live in [`VariableSet`]s attached to the nodes of a
//! [`SceneTree`]. A variable's definition may reference other variables
//! (`$name`, `[[name]]`, `${name.path:format}`). When a value changes, every
//! variable of the same set that references it is revalidated, in waves that
//! never start a variable while something it depends on is still queued or
//! running. Settled updates are then propagated to the consumers and nested
//! sets of the attachment node's subtree, skipping subtrees that redefine the
//! name.
//!
//! Sets remember their values when deactivated. On reactivation, values that
//! were edited in the meantime are treated as fresh changes.

mod config;
mod consumer;
mod context;
mod error;
mod index;
mod interpolate;
mod recorder;
mod set;
mod tree;
mod value;
mod variable;
pub mod variants;

#[cfg(test)]
mod testing;

pub use config::{CyclePolicy, SchedulerConfig};
pub use consumer::{DependencyBinding, VariableConsumer};
pub use context::{NoVariables, UpdateContext, VariableLookup};
pub use error::{ConfigError, ConsumerError, SetError, TreeError, VariableError};
pub use index::ActiveVariableIndex;
pub use interpolate::{Interpolator, PlainInterpolator};
pub use scopevars_deps::{ALL_VARIABLES, DependencyDescriptor, NameSet};
pub use scopevars_worker::TaskClass;
pub use set::{SchedulerEvent, VariableSet, VariableSetBuilder};
pub use tree::{NodeId, NodeLookup, SceneTree};
pub use value::{ALL_TEXT, ALL_VALUE, CustomAllValue, CustomValue, VariableText, VariableValue};
pub use variable::{RefreshTrigger, Revalidatable, Variable, VariableCore, VariableKind, VariableState, resolve_field};
