use std::sync::Arc;

use parking_lot::RwLock;
use scopevars_deps::{DependencyDescriptor, NameSet};
use serde::{Deserialize, Serialize};

use crate::value::{VariableText, VariableValue};
use crate::variable::{Variable, VariableCore, VariableKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdHocFilter {
	pub key: String,
	pub operator: String,
	pub value: String,
}

impl AdHocFilter {
	pub fn new(key: impl Into<String>, operator: impl Into<String>, value: impl Into<String>) -> Self {
		Self {
			key: key.into(),
			operator: operator.into(),
			value: value.into(),
		}
	}
}

#[derive(Debug, Serialize)]
struct AdHocDefinition {
	datasource: String,
}

/// Free-form filters applied to every query against one data source.
///
/// Edited by the user rather than revalidated. While its set is active the
/// variable is published in the set's
/// [`ActiveVariableIndex`](crate::ActiveVariableIndex) under its data source.
pub struct AdHocFiltersVariable {
	core: VariableCore,
	definition: Arc<AdHocDefinition>,
	descriptor: DependencyDescriptor,
	filters: RwLock<Vec<AdHocFilter>>,
}

impl std::fmt::Debug for AdHocFiltersVariable {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("AdHocFiltersVariable")
			.field("datasource", &self.definition.datasource)
			.field("filters", &*self.filters.read())
			.finish()
	}
}

fn render(filters: &[AdHocFilter]) -> (VariableValue, VariableText) {
	let value = VariableValue::Json(serde_json::to_value(filters).unwrap_or_default());
	let text = VariableText::List(filters.iter().map(|f| format!("{}{}{}", f.key, f.operator, f.value)).collect());
	(value, text)
}

impl AdHocFiltersVariable {
	pub fn new(name: impl Into<String>, datasource: impl Into<String>) -> Self {
		let (value, text) = render(&[]);
		Self {
			core: VariableCore::new(name, VariableKind::AdHocFilters, value, text),
			definition: Arc::new(AdHocDefinition { datasource: datasource.into() }),
			descriptor: DependencyDescriptor::tracking(["datasource"]),
			filters: RwLock::new(Vec::new()),
		}
	}

	pub fn datasource(&self) -> &str {
		&self.definition.datasource
	}

	pub fn filters(&self) -> Vec<AdHocFilter> {
		self.filters.read().clone()
	}

	/// Replaces the filters. Returns whether they changed.
	pub fn set_filters(&self, filters: Vec<AdHocFilter>) -> bool {
		let (value, text) = render(&filters);
		*self.filters.write() = filters;
		self.core.set_value(value, text)
	}

	pub fn add_filter(&self, filter: AdHocFilter) -> bool {
		let mut filters = self.filters();
		filters.push(filter);
		self.set_filters(filters)
	}
}

impl Variable for AdHocFiltersVariable {
	fn core(&self) -> &VariableCore {
		&self.core
	}

	fn dependencies(&self) -> Arc<NameSet> {
		self.descriptor.names(&self.definition)
	}

	fn index_key(&self) -> Option<String> {
		Some(self.definition.datasource.clone())
	}
}
