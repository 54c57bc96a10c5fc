//! The variable node contract.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::RwLock;
use scopevars_deps::{NameSet, depends_on};

use crate::context::UpdateContext;
use crate::error::VariableError;
use crate::value::{VariableText, VariableValue};

/// Discriminates variable variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableKind {
	Constant,
	TextBox,
	Custom,
	Query,
	AdHocFilters,
	/// Multi-value variable over a caller-supplied option source.
	MultiValue,
}

impl VariableKind {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Constant => "constant",
			Self::TextBox => "textbox",
			Self::Custom => "custom",
			Self::Query => "query",
			Self::AdHocFilters => "adhoc",
			Self::MultiValue => "multi",
		}
	}
}

/// External events that can ask variables to revalidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefreshTrigger {
	TimeRangeChanged,
}

/// Observable state shared by every variable variant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableState {
	pub value: VariableValue,
	pub text: VariableText,
	pub loading: bool,
	pub error: Option<String>,
	/// Excluded from persisted-state synchronisation.
	pub skip_url_sync: bool,
}

/// Receiver of value-changed signals, implemented by the owning set.
pub(crate) trait ChangeSink: Send + Sync {
	fn value_changed(&self, name: &str);
	fn is_active(&self) -> bool;
}

struct CoreInner {
	name: String,
	kind: VariableKind,
	state: RwLock<VariableState>,
	sink: RwLock<Option<Weak<dyn ChangeSink>>>,
}

/// Name, kind and state of a variable, plus its link to the owning set.
///
/// Writes through [`Self::set_value`] raise the value-changed signal the owning
/// set schedules dependents from. [`Self::update`] writes silently.
#[derive(Clone)]
pub struct VariableCore {
	inner: Arc<CoreInner>,
}

impl std::fmt::Debug for VariableCore {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("VariableCore")
			.field("name", &self.inner.name)
			.field("kind", &self.inner.kind)
			.field("state", &*self.inner.state.read())
			.finish()
	}
}

impl VariableCore {
	pub fn new(name: impl Into<String>, kind: VariableKind, value: VariableValue, text: VariableText) -> Self {
		Self {
			inner: Arc::new(CoreInner {
				name: name.into(),
				kind,
				state: RwLock::new(VariableState {
					value,
					text,
					..VariableState::default()
				}),
				sink: RwLock::new(None),
			}),
		}
	}

	pub fn name(&self) -> &str {
		&self.inner.name
	}

	pub fn kind(&self) -> VariableKind {
		self.inner.kind
	}

	pub fn state(&self) -> VariableState {
		self.inner.state.read().clone()
	}

	pub fn value(&self) -> VariableValue {
		self.inner.state.read().value.clone()
	}

	pub fn text(&self) -> VariableText {
		self.inner.state.read().text.clone()
	}

	pub fn is_loading(&self) -> bool {
		self.inner.state.read().loading
	}

	pub fn error(&self) -> Option<String> {
		self.inner.state.read().error.clone()
	}

	pub fn set_loading(&self, loading: bool) {
		self.inner.state.write().loading = loading;
	}

	pub fn set_error(&self, error: Option<String>) {
		self.inner.state.write().error = error;
	}

	/// Replaces value and text, signalling the owning set if either differs.
	pub fn set_value(&self, value: VariableValue, text: VariableText) -> bool {
		let changed = {
			let mut state = self.inner.state.write();
			if state.value == value && state.text == text {
				false
			} else {
				state.value = value;
				state.text = text;
				true
			}
		};
		if changed {
			self.publish_value_changed();
		}
		changed
	}

	/// Mutates state without signalling.
	pub fn update(&self, f: impl FnOnce(&mut VariableState)) {
		f(&mut self.inner.state.write());
	}

	/// Raises the value-changed signal on the owning set, if any.
	pub fn publish_value_changed(&self) {
		let sink = self.inner.sink.read().as_ref().and_then(Weak::upgrade);
		match sink {
			Some(sink) => sink.value_changed(&self.inner.name),
			None => tracing::trace!(variable = %self.inner.name, "variable.changed.unbound"),
		}
	}

	/// Whether the owning set is currently active.
	pub fn is_live(&self) -> bool {
		self.inner.sink.read().as_ref().and_then(Weak::upgrade).is_some_and(|sink| sink.is_active())
	}

	pub(crate) fn bind(&self, sink: Weak<dyn ChangeSink>) {
		*self.inner.sink.write() = Some(sink);
	}

	pub(crate) fn unbind(&self) {
		*self.inner.sink.write() = None;
	}
}

/// Resolves an optional field path against a value.
pub fn resolve_field(value: VariableValue, field_path: Option<&str>) -> Option<VariableValue> {
	match field_path {
		None => Some(value),
		Some(path) => value.field(path),
	}
}

/// A named value-producing node.
pub trait Variable: Send + Sync + 'static {
	fn core(&self) -> &VariableCore;

	fn name(&self) -> &str {
		self.core().name()
	}

	/// Names referenced by this variable's own definition.
	fn dependencies(&self) -> Arc<NameSet> {
		Arc::default()
	}

	fn has_dependency_on(&self, name: &str) -> bool {
		depends_on(&self.dependencies(), name)
	}

	fn value(&self, field_path: Option<&str>) -> Option<VariableValue> {
		resolve_field(self.core().value(), field_path)
	}

	/// Display text. Multiple labels are joined with ` + `.
	fn value_text(&self, field_path: Option<&str>) -> String {
		match field_path {
			None => self.core().text().display(),
			Some(_) => self.value(field_path).map(|v| v.to_plain_string()).unwrap_or_default(),
		}
	}

	/// The revalidation capability, for variables that need one.
	fn revalidatable(&self) -> Option<&dyn Revalidatable> {
		None
	}

	/// Key under which the variable is published in an
	/// [`ActiveVariableIndex`](crate::ActiveVariableIndex) while active.
	fn index_key(&self) -> Option<String> {
		None
	}
}

/// Asynchronous revalidation, opted into through [`Variable::revalidatable`].
#[async_trait]
pub trait Revalidatable: Send + Sync {
	/// Refreshes the variable's options or value.
	///
	/// Dropped without completing when the scheduler cancels the update.
	async fn validate_and_update(&self, ctx: &UpdateContext) -> Result<(), VariableError>;

	/// Called when an in-flight update is abandoned.
	fn on_cancel(&self) {}

	/// Lazy variables are skipped at activation and only run on demand.
	fn is_lazy(&self) -> bool {
		false
	}

	fn refreshes_on(&self, _trigger: RefreshTrigger) -> bool {
		false
	}
}
