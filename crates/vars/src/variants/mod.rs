//! Built-in variable variants.

mod adhoc;
mod constant;
mod custom;
mod multi;
mod query;
mod text_box;

pub use adhoc::{AdHocFilter, AdHocFiltersVariable};
pub use constant::ConstantVariable;
pub use custom::{CustomOptions, parse_custom_options};
pub use multi::{MultiValueConfig, MultiValueVariable, OptionSource, OptionsDefinition, VariableOption, VariableRefresh, reconcile};
pub use query::{QueryOptions, QueryRunner, apply_regex};
pub use text_box::TextBoxVariable;
