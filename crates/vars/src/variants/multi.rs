//! Variables that select one or more values out of a fetched option list.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use scopevars_deps::{DependencyDescriptor, NameSet};
use serde::{Deserialize, Serialize};

use super::query::apply_regex;
use crate::context::UpdateContext;
use crate::error::VariableError;
use crate::value::{ALL_TEXT, ALL_VALUE, CustomAllValue, VariableText, VariableValue};
use crate::variable::{RefreshTrigger, Revalidatable, Variable, VariableCore, VariableKind, resolve_field};

#[cfg(test)]
mod tests;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableOption {
	pub label: String,
	pub value: String,
}

impl VariableOption {
	pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
		Self {
			label: label.into(),
			value: value.into(),
		}
	}

	/// Option whose label is its value.
	pub fn plain(value: impl Into<String>) -> Self {
		let value = value.into();
		Self::new(value.clone(), value)
	}
}

/// When a multi-value variable refreshes its options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableRefresh {
	#[default]
	OnActivation,
	OnTimeRangeChanged,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiValueConfig {
	pub is_multi: bool,
	/// Offer the "all" pseudo-option.
	pub include_all: bool,
	/// Fall back to "all" instead of the first option.
	pub default_to_all: bool,
	/// Rendered in place of the option list while "all" is selected.
	pub all_value: Option<String>,
	pub lazy: bool,
	pub refresh: VariableRefresh,
	pub skip_url_sync: bool,
}

/// The part of a multi-value variable its dependencies are scanned from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionsDefinition {
	pub query: String,
	#[serde(default)]
	pub regex: Option<String>,
}

impl OptionsDefinition {
	pub fn new(query: impl Into<String>) -> Self {
		Self {
			query: query.into(),
			regex: None,
		}
	}

	#[must_use]
	pub fn with_regex(mut self, regex: impl Into<String>) -> Self {
		self.regex = Some(regex.into());
		self
	}
}

/// Supplies the options of a [`MultiValueVariable`].
#[async_trait]
pub trait OptionSource: Send + Sync {
	/// Fetches options for the already interpolated `query`.
	async fn options(&self, query: &str, ctx: &UpdateContext) -> Result<Vec<VariableOption>, VariableError>;

	/// Aborts outstanding fetches.
	fn cancel(&self) {}
}

fn all_selection(is_multi: bool) -> (VariableValue, VariableText) {
	if is_multi {
		(VariableValue::List(vec![ALL_VALUE.into()]), VariableText::List(vec![ALL_TEXT.into()]))
	} else {
		(VariableValue::from(ALL_VALUE), VariableText::from(ALL_TEXT))
	}
}

fn empty_selection(is_multi: bool) -> (VariableValue, VariableText) {
	if is_multi {
		(VariableValue::List(Vec::new()), VariableText::List(Vec::new()))
	} else {
		(VariableValue::default(), VariableText::default())
	}
}

fn first_option(options: &[VariableOption], is_multi: bool) -> (VariableValue, VariableText) {
	let Some(first) = options.first() else {
		return empty_selection(is_multi);
	};
	if is_multi {
		(VariableValue::List(vec![first.value.clone()]), VariableText::List(vec![first.label.clone()]))
	} else {
		(VariableValue::from(first.value.as_str()), VariableText::from(first.label.as_str()))
	}
}

/// Computes the selection that survives a new option list.
///
/// Valid current values are kept (in order, for multi-select). Otherwise the
/// selection falls back to "all" when `default_to_all` is set, else to the
/// first option. "All" itself survives while `include_all` is set.
pub fn reconcile(config: &MultiValueConfig, value: &VariableValue, text: &VariableText, options: &[VariableOption]) -> (VariableValue, VariableText) {
	if options.is_empty() {
		if config.default_to_all || config.include_all {
			return all_selection(config.is_multi);
		}
		return empty_selection(config.is_multi);
	}

	if value.is_all() {
		if config.include_all {
			return (value.clone(), all_selection(config.is_multi).1);
		}
		return first_option(options, config.is_multi);
	}

	if config.is_multi {
		let valid: Vec<&VariableOption> = value
			.to_list()
			.iter()
			.filter_map(|v| options.iter().find(|o| &o.value == v))
			.collect();
		if valid.is_empty() {
			return if config.default_to_all {
				all_selection(true)
			} else {
				first_option(options, true)
			};
		}
		return (
			VariableValue::List(valid.iter().map(|o| o.value.clone()).collect()),
			VariableText::List(valid.iter().map(|o| o.label.clone()).collect()),
		);
	}

	let current = value.to_plain_string();
	let current_text = text.display();
	let matching = options
		.iter()
		.find(|o| o.value == current)
		.or_else(|| options.iter().find(|o| o.label == current_text));
	match matching {
		Some(option) => (VariableValue::from(option.value.as_str()), VariableText::from(option.label.as_str())),
		None if config.default_to_all => all_selection(false),
		None => first_option(options, false),
	}
}

/// Single or multi-select variable over options from an [`OptionSource`].
pub struct MultiValueVariable {
	core: VariableCore,
	config: MultiValueConfig,
	definition: RwLock<Arc<OptionsDefinition>>,
	descriptor: DependencyDescriptor,
	options: RwLock<Vec<VariableOption>>,
	source: Arc<dyn OptionSource>,
	skip_next_validation: AtomicBool,
}

impl std::fmt::Debug for MultiValueVariable {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MultiValueVariable")
			.field("core", &self.core)
			.field("config", &self.config)
			.field("definition", &self.definition.read())
			.field("options", &self.options.read().len())
			.finish_non_exhaustive()
	}
}

impl MultiValueVariable {
	pub fn new(name: impl Into<String>, kind: VariableKind, definition: OptionsDefinition, source: Arc<dyn OptionSource>, config: MultiValueConfig) -> Self {
		let (value, text) = empty_selection(config.is_multi);
		let core = VariableCore::new(name, kind, value, text);
		core.update(|s| s.skip_url_sync = config.skip_url_sync);
		Self {
			core,
			config,
			definition: RwLock::new(Arc::new(definition)),
			descriptor: DependencyDescriptor::tracking(["query", "regex"]),
			options: RwLock::new(Vec::new()),
			source,
			skip_next_validation: AtomicBool::new(false),
		}
	}

	/// Variable over a caller-supplied source.
	pub fn with_source(name: impl Into<String>, query: impl Into<String>, source: Arc<dyn OptionSource>, config: MultiValueConfig) -> Self {
		Self::new(name, VariableKind::MultiValue, OptionsDefinition::new(query), source, config)
	}

	pub fn config(&self) -> &MultiValueConfig {
		&self.config
	}

	pub fn definition(&self) -> Arc<OptionsDefinition> {
		Arc::clone(&self.definition.read())
	}

	/// Replaces the definition. Takes effect on the next update.
	pub fn set_definition(&self, definition: OptionsDefinition) {
		*self.definition.write() = Arc::new(definition);
	}

	pub fn set_query(&self, query: impl Into<String>) {
		let mut definition = (*self.definition()).clone();
		definition.query = query.into();
		self.set_definition(definition);
	}

	pub fn options(&self) -> Vec<VariableOption> {
		self.options.read().clone()
	}

	pub fn has_all_value(&self) -> bool {
		self.core.value().is_all()
	}

	/// Sets the selection, signalling the owning set when it differs.
	pub fn change_value_to(&self, value: VariableValue, text: VariableText) -> bool {
		self.core.set_value(value, text)
	}

	/// Selects options by value, taking labels from the current options.
	pub fn select(&self, values: &[&str]) -> bool {
		let options = self.options();
		let label = |v: &str| options.iter().find(|o| o.value == v).map_or_else(|| v.to_string(), |o| o.label.clone());
		let (value, text) = if self.config.is_multi {
			(
				VariableValue::List(values.iter().map(|v| v.to_string()).collect()),
				VariableText::List(values.iter().copied().map(label).collect()),
			)
		} else {
			let v = values.first().copied().unwrap_or_default();
			(VariableValue::from(v), VariableText::Single(label(v)))
		};
		self.change_value_to(value, text)
	}

	/// Applies an externally persisted selection.
	///
	/// While the owning set is inactive, the next revalidation keeps this
	/// selection instead of reconciling it against the options.
	pub fn restore_value(&self, value: VariableValue, text: VariableText) -> bool {
		if !self.core.is_live() {
			self.skip_next_validation.store(true, Ordering::Release);
		}
		self.core.set_value(value, text)
	}

	/// Stores new options and reconciles the selection against them.
	/// Returns whether the value-changed signal was raised.
	pub(crate) fn apply_options(&self, options: Vec<VariableOption>) -> bool {
		let state = self.core.state();
		let (value, text) = if self.skip_next_validation.swap(false, Ordering::AcqRel) {
			tracing::trace!(variable = self.core.name(), "multi.validation.skipped");
			(state.value.clone(), state.text.clone())
		} else {
			reconcile(&self.config, &state.value, &state.text, &options)
		};
		let options_changed = {
			let mut current = self.options.write();
			let changed = *current != options;
			*current = options;
			changed
		};

		let changed = value != state.value || text != state.text || (value.is_all() && options_changed);
		self.core.update(|s| {
			s.value = value;
			s.text = text;
		});
		if changed {
			self.core.publish_value_changed();
		}
		changed
	}
}

impl Variable for MultiValueVariable {
	fn core(&self) -> &VariableCore {
		&self.core
	}

	fn dependencies(&self) -> Arc<NameSet> {
		self.descriptor.names(&self.definition())
	}

	fn value(&self, field_path: Option<&str>) -> Option<VariableValue> {
		if self.has_all_value() {
			return Some(match &self.config.all_value {
				Some(all) => VariableValue::Custom(Arc::new(CustomAllValue::new(all.as_str()))),
				None => VariableValue::List(self.options.read().iter().map(|o| o.value.clone()).collect()),
			});
		}
		resolve_field(self.core.value(), field_path)
	}

	fn revalidatable(&self) -> Option<&dyn Revalidatable> {
		Some(self)
	}
}

#[async_trait]
impl Revalidatable for MultiValueVariable {
	async fn validate_and_update(&self, ctx: &UpdateContext) -> Result<(), VariableError> {
		let definition = self.definition();
		let query = ctx.interpolate(&definition.query);
		tracing::trace!(variable = self.core.name(), %query, "multi.fetch");
		let mut options = self.source.options(&query, ctx).await?;
		if ctx.is_cancelled() {
			return Err(VariableError::Cancelled);
		}
		if let Some(regex) = definition.regex.as_deref().filter(|r| !r.is_empty()) {
			options = apply_regex(options, &ctx.interpolate(regex))?;
		}
		self.apply_options(options);
		Ok(())
	}

	fn on_cancel(&self) {
		self.source.cancel();
	}

	fn is_lazy(&self) -> bool {
		self.config.lazy
	}

	fn refreshes_on(&self, trigger: RefreshTrigger) -> bool {
		match trigger {
			RefreshTrigger::TimeRangeChanged => self.config.refresh == VariableRefresh::OnTimeRangeChanged,
		}
	}
}
