//! Dependency discovery for scoped variables.
//!
//! A node depends on a variable when its state mentions it through one of the
//! reference forms understood by [`references`]:
//!
//! - `$name`
//! - `[[name]]` and `[[name:format]]`
//! - `${name}`, `${name.field.path}`, `${name:format}`
//!
//! [`DependencyDescriptor`] caches the resulting [`NameSet`] per node and only
//! rescans when the tracked state changes.

mod descriptor;
mod extract;

pub use descriptor::{DependencyDescriptor, depends_on};
pub use extract::{NameSet, RefSyntax, VariableRef, extract_names, interpolate, references, scan_json, scan_state};

/// Reference that makes a consumer depend on every variable in scope.
pub const ALL_VARIABLES: &str = "__all_variables";
