//! Variable registry with its update scheduler.
//!
//! A [`VariableSet`] owns the variables of one scope. While active it keeps
//! them valid: variables whose dependencies changed are queued, started in
//! waves once nothing they depend on is still queued or running, and their
//! completions are propagated to dependent nodes of the surrounding tree.

mod events;
mod state;
mod wave;

use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use scopevars_worker::{CancelHandle, GenerationClock};
use tokio::sync::broadcast;

pub use self::events::SchedulerEvent;
use self::state::SchedulerState;
use crate::config::SchedulerConfig;
use crate::context::VariableLookup;
use crate::error::SetError;
use crate::index::{ActiveVariableIndex, OwnerId};
use crate::interpolate::{Interpolator, PlainInterpolator};
use crate::tree::{NodeId, WeakTree};
use crate::variable::{ChangeSink, RefreshTrigger, Variable};


static NEXT_SET_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone)]
pub(crate) struct Attachment {
	pub tree: WeakTree,
	pub node: NodeId,
}

pub(crate) struct SetInner {
	this: Weak<SetInner>,
	id: OwnerId,
	variables: RwLock<Vec<Arc<dyn Variable>>>,
	state: Mutex<SchedulerState>,
	clock: GenerationClock,
	config: SchedulerConfig,
	events: broadcast::Sender<SchedulerEvent>,
	attachment: RwLock<Option<Attachment>>,
	interpolator: Arc<dyn Interpolator>,
	index: Option<Arc<ActiveVariableIndex>>,
}

/// Ordered variables of one scope plus their scheduler.
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone)]
pub struct VariableSet {
	pub(crate) inner: Arc<SetInner>,
}

impl std::fmt::Debug for VariableSet {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let names = self.inner.names();
		let state = self.inner.state.lock();
		f.debug_struct("VariableSet")
			.field("id", &self.inner.id)
			.field("variables", &names)
			.field("active", &state.active)
			.field("pending", &state.pending)
			.field("in_flight", &state.in_flight.keys().collect::<Vec<_>>())
			.finish()
	}
}

/// Builder for [`VariableSet`].
#[derive(Default)]
pub struct VariableSetBuilder {
	variables: Vec<Arc<dyn Variable>>,
	config: SchedulerConfig,
	interpolator: Option<Arc<dyn Interpolator>>,
	index: Option<Arc<ActiveVariableIndex>>,
}

impl VariableSetBuilder {
	#[must_use]
	pub fn variable(mut self, variable: Arc<dyn Variable>) -> Self {
		self.variables.push(variable);
		self
	}

	#[must_use]
	pub fn variables(mut self, variables: impl IntoIterator<Item = Arc<dyn Variable>>) -> Self {
		self.variables.extend(variables);
		self
	}

	#[must_use]
	pub fn config(mut self, config: SchedulerConfig) -> Self {
		self.config = config;
		self
	}

	/// Replaces the default [`PlainInterpolator`].
	#[must_use]
	pub fn interpolator(mut self, interpolator: Arc<dyn Interpolator>) -> Self {
		self.interpolator = Some(interpolator);
		self
	}

	/// Publishes indexed variables into `index` while the set is active.
	#[must_use]
	pub fn index(mut self, index: Arc<ActiveVariableIndex>) -> Self {
		self.index = Some(index);
		self
	}

	pub fn build(self) -> Result<VariableSet, SetError> {
		let mut seen = rustc_hash::FxHashSet::default();
		for variable in &self.variables {
			if !seen.insert(variable.name().to_string()) {
				return Err(SetError::DuplicateName(variable.name().to_string()));
			}
		}

		let (events, _) = broadcast::channel(self.config.event_buffer.max(1));
		let inner = Arc::new_cyclic(|this| SetInner {
			this: this.clone(),
			id: NEXT_SET_ID.fetch_add(1, Ordering::Relaxed),
			variables: RwLock::new(Vec::new()),
			state: Mutex::new(SchedulerState::default()),
			clock: GenerationClock::new(),
			config: self.config,
			events,
			attachment: RwLock::new(None),
			interpolator: self.interpolator.unwrap_or_else(|| Arc::new(PlainInterpolator)),
			index: self.index,
		});
		for variable in &self.variables {
			inner.bind(variable);
		}
		*inner.variables.write() = self.variables;
		Ok(VariableSet { inner })
	}
}

impl VariableSet {
	pub fn builder() -> VariableSetBuilder {
		VariableSetBuilder::default()
	}

	/// Set with default configuration.
	pub fn new(variables: impl IntoIterator<Item = Arc<dyn Variable>>) -> Result<Self, SetError> {
		Self::builder().variables(variables).build()
	}

	pub fn config(&self) -> &SchedulerConfig {
		&self.inner.config
	}

	pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
		self.inner.events.subscribe()
	}

	pub fn get(&self, name: &str) -> Option<Arc<dyn Variable>> {
		self.inner.get(name)
	}

	/// Variables in definition order.
	pub fn variables(&self) -> Vec<Arc<dyn Variable>> {
		self.inner.variables.read().clone()
	}

	pub fn names(&self) -> Vec<String> {
		self.inner.names()
	}

	pub fn is_active(&self) -> bool {
		self.inner.state.lock().active
	}

	/// Starts scheduling.
	///
	/// Variables whose value drifted since the last deactivation have their
	/// dependents queued first, then every revalidatable, non-lazy variable
	/// without a remembered value is queued, and a wave is started.
	pub fn activate(&self) {
		self.inner.activate();
	}

	/// Stops scheduling, cancelling in-flight updates and remembering the
	/// values of every variable that had settled.
	pub fn deactivate(&self) {
		self.inner.deactivate();
	}

	/// Adds a variable at the end of the set, queueing it when active.
	pub fn add_variable(&self, variable: Arc<dyn Variable>) -> Result<(), SetError> {
		self.inner.add_variable(variable)
	}

	/// Removes a variable, cancelling its in-flight update first.
	pub fn remove_variable(&self, name: &str) -> Option<Arc<dyn Variable>> {
		self.inner.remove_variable(name)
	}

	/// Queues one variable regardless of laziness. Returns whether it was queued.
	pub fn refresh(&self, name: &str) -> bool {
		self.inner.refresh(name)
	}

	/// Queues every variable that refreshes on `trigger`.
	pub fn refresh_on(&self, trigger: RefreshTrigger) {
		self.inner.refresh_on(trigger);
	}

	/// Abandons the queued or in-flight update of `name`.
	pub fn cancel(&self, name: &str) -> bool {
		self.inner.cancel(name)
	}

	pub fn is_loading_or_pending(&self, name: &str) -> bool {
		self.inner.is_loading_or_pending(name)
	}

	pub fn pending_names(&self) -> Vec<String> {
		self.inner.state.lock().pending.iter().cloned().collect()
	}

	pub fn in_flight_names(&self) -> Vec<String> {
		let mut names: Vec<_> = self.inner.state.lock().in_flight.keys().cloned().collect();
		names.sort();
		names
	}

	/// Name resolution from this scope outward.
	pub fn lookup(&self) -> Arc<dyn VariableLookup> {
		Arc::clone(&self.inner) as Arc<dyn VariableLookup>
	}

	/// Interpolates `template` against this scope.
	pub fn interpolate(&self, template: &str) -> String {
		self.inner.interpolator.interpolate(template, &*self.inner)
	}

	pub(crate) fn is(&self, other: &SetInner) -> bool {
		std::ptr::eq(Arc::as_ptr(&self.inner), other)
	}

	pub(crate) fn attached_node(&self) -> Option<NodeId> {
		self.inner.attachment.read().as_ref().map(|a| a.node)
	}

	pub(crate) fn attach(&self, tree: WeakTree, node: NodeId) {
		*self.inner.attachment.write() = Some(Attachment { tree, node });
	}

	pub(crate) fn detach(&self) {
		*self.inner.attachment.write() = None;
	}

	/// An ancestor scope finished updating `variable`.
	pub(crate) fn parent_variable_update_completed(&self, variable: &Arc<dyn Variable>, has_changed: bool) {
		self.inner.parent_variable_update_completed(variable, has_changed);
	}
}

impl SetInner {
	fn bind(self: &Arc<Self>, variable: &Arc<dyn Variable>) {
		let sink: Weak<dyn ChangeSink> = Arc::downgrade(self) as Weak<dyn ChangeSink>;
		variable.core().bind(sink);
	}

	pub(crate) fn get(&self, name: &str) -> Option<Arc<dyn Variable>> {
		self.variables.read().iter().find(|v| v.name() == name).cloned()
	}

	pub(crate) fn defines(&self, name: &str) -> bool {
		self.variables.read().iter().any(|v| v.name() == name)
	}

	fn names(&self) -> Vec<String> {
		self.variables.read().iter().map(|v| v.name().to_string()).collect()
	}

	fn snapshot(&self) -> Vec<Arc<dyn Variable>> {
		self.variables.read().clone()
	}

	fn emit(&self, event: SchedulerEvent) {
		let _ = self.events.send(event);
	}

	fn attachment(&self) -> Option<Attachment> {
		self.attachment.read().clone()
	}

	/// Revalidatable variables of this set, other than `name`, that reference it.
	fn dependents_of(&self, name: &str) -> Vec<String> {
		self.snapshot()
			.iter()
			.filter(|v| v.name() != name && v.revalidatable().is_some() && v.has_dependency_on(name))
			.map(|v| v.name().to_string())
			.collect()
	}

	fn activate(self: &Arc<Self>) {
		let variables = self.snapshot();
		let drifted: Vec<Arc<dyn Variable>> = {
			let state = self.state.lock();
			if state.active {
				return;
			}
			variables
				.iter()
				.filter(|v| state.recorder.has_drifted(v.name(), &v.core().value()))
				.cloned()
				.collect()
		};
		let drift_dependents: Vec<String> = drifted.iter().flat_map(|v| self.dependents_of(v.name())).collect();

		let interrupted = {
			let mut state = self.state.lock();
			if state.active {
				return;
			}
			state.active = true;
			state.idle = false;
			state.reported_cycle = None;
			let mut interrupted = Vec::new();
			for name in &drift_dependents {
				interrupted.extend(state.enqueue(name).map(|h| (name.clone(), h)));
			}
			for variable in &variables {
				let needs_update = variable.revalidatable().is_some_and(|r| !r.is_lazy());
				if needs_update && !state.recorder.has_recorded(variable.name()) {
					state.enqueue(variable.name());
				}
			}
			for variable in &drifted {
				tracing::debug!(variable = variable.name(), "varset.drifted");
				state.recorder.record(variable.name(), variable.core().value());
				state.changed.insert(variable.name().to_string());
			}
			interrupted
		};
		self.finish_cancelled(interrupted);

		if let Some(index) = &self.index {
			for variable in &variables {
				if let Some(key) = variable.index_key() {
					index.register(self.id, key, Arc::clone(variable));
				}
			}
		}
		tracing::debug!(set = self.id, pending = ?self.state.lock().pending, "varset.activate");
		self.emit(SchedulerEvent::Activated);
		self.run_wave();
		for variable in &drifted {
			self.propagate(variable);
		}
	}

	fn deactivate(self: &Arc<Self>) {
		let variables = self.snapshot();
		let interrupted: Vec<(String, CancelHandle)> = {
			let mut state = self.state.lock();
			if !state.active {
				return;
			}
			state.active = false;
			for variable in &variables {
				let name = variable.name();
				if state.is_busy(name) {
					state.recorder.forget(name);
				} else {
					state.recorder.record(name, variable.core().value());
				}
			}
			state.pending.clear();
			state.changed.clear();
			state.rerun = false;
			state.idle = true;
			state.reported_cycle = None;
			let interrupted: Vec<_> = state.in_flight.drain().collect();
			for (_, handle) in &interrupted {
				handle.cancel();
			}
			interrupted
		};
		self.finish_cancelled(interrupted);

		if let Some(index) = &self.index {
			index.unregister(self.id, None);
		}
		tracing::debug!(set = self.id, "varset.deactivate");
		self.emit(SchedulerEvent::Deactivated);
	}

	fn add_variable(self: &Arc<Self>, variable: Arc<dyn Variable>) -> Result<(), SetError> {
		{
			let mut variables = self.variables.write();
			if variables.iter().any(|v| v.name() == variable.name()) {
				return Err(SetError::DuplicateName(variable.name().to_string()));
			}
			variables.push(Arc::clone(&variable));
		}
		self.bind(&variable);
		tracing::debug!(variable = variable.name(), "varset.add");

		let queued = {
			let mut state = self.state.lock();
			if !state.active {
				return Ok(());
			}
			let queued = variable.revalidatable().is_some_and(|r| !r.is_lazy());
			if queued {
				state.enqueue(variable.name());
			}
			queued
		};
		if let (Some(index), Some(key)) = (&self.index, variable.index_key()) {
			index.register(self.id, key, Arc::clone(&variable));
		}
		if queued {
			self.run_wave();
		}
		Ok(())
	}

	fn remove_variable(self: &Arc<Self>, name: &str) -> Option<Arc<dyn Variable>> {
		let removed = {
			let mut variables = self.variables.write();
			let pos = variables.iter().position(|v| v.name() == name)?;
			variables.remove(pos)
		};
		removed.core().unbind();

		let (interrupted, active) = {
			let mut state = self.state.lock();
			let interrupted = state.withdraw(name);
			state.recorder.forget(name);
			state.changed.remove(name);
			(interrupted, state.active)
		};
		if interrupted.is_some() {
			if let Some(r) = removed.revalidatable() {
				r.on_cancel();
			}
			removed.core().set_loading(false);
			self.emit(SchedulerEvent::UpdateCancelled { name: name.to_string() });
		}
		if let Some(index) = &self.index {
			index.unregister(self.id, Some(name));
		}
		tracing::debug!(variable = name, "varset.remove");
		if active {
			self.run_wave();
			self.release_waiters(&removed);
		}
		Some(removed)
	}

	fn refresh(self: &Arc<Self>, name: &str) -> bool {
		let Some(variable) = self.get(name) else {
			return false;
		};
		if variable.revalidatable().is_none() {
			return false;
		}
		let interrupted = {
			let mut state = self.state.lock();
			if !state.active {
				return false;
			}
			state.enqueue(name)
		};
		self.finish_cancelled(interrupted.map(|h| (name.to_string(), h)));
		self.run_wave();
		true
	}

	fn refresh_on(self: &Arc<Self>, trigger: RefreshTrigger) {
		let targets: Vec<String> = self
			.snapshot()
			.iter()
			.filter(|v| v.revalidatable().is_some_and(|r| r.refreshes_on(trigger)))
			.map(|v| v.name().to_string())
			.collect();
		if targets.is_empty() {
			return;
		}
		let interrupted = {
			let mut state = self.state.lock();
			if !state.active {
				return;
			}
			targets
				.iter()
				.filter_map(|name| state.enqueue(name).map(|h| (name.clone(), h)))
				.collect::<Vec<_>>()
		};
		tracing::debug!(?trigger, variables = ?targets, "varset.refresh_on");
		self.finish_cancelled(interrupted);
		self.run_wave();
	}

	fn cancel(self: &Arc<Self>, name: &str) -> bool {
		let (was_busy, interrupted) = {
			let mut state = self.state.lock();
			let was_busy = state.is_busy(name);
			(was_busy, state.withdraw(name))
		};
		if !was_busy {
			return false;
		}
		self.finish_cancelled(interrupted.map(|h| (name.to_string(), h)));
		self.run_wave();
		if let Some(variable) = self.get(name) {
			self.release_waiters(&variable);
		}
		true
	}

	pub(crate) fn is_loading_or_pending(&self, name: &str) -> bool {
		self.state.lock().is_busy(name)
	}

	fn parent_variable_update_completed(self: &Arc<Self>, variable: &Arc<dyn Variable>, has_changed: bool) {
		if !self.state.lock().active {
			return;
		}
		if has_changed {
			let dependents = self.dependents_of(variable.name());
			let interrupted = {
				let mut state = self.state.lock();
				dependents
					.iter()
					.filter_map(|name| state.enqueue(name).map(|h| (name.clone(), h)))
					.collect::<Vec<_>>()
			};
			self.finish_cancelled(interrupted);
		}
		self.run_wave();
	}

	/// Reports interrupted updates once their handles have been cancelled.
	fn finish_cancelled(&self, interrupted: impl IntoIterator<Item = (String, CancelHandle)>) {
		for (name, handle) in interrupted {
			tracing::debug!(variable = %name, generation = handle.generation(), "varset.update.cancel");
			if let Some(variable) = self.get(&name) {
				if let Some(r) = variable.revalidatable() {
					r.on_cancel();
				}
				variable.core().set_loading(false);
			}
			self.emit(SchedulerEvent::UpdateCancelled { name });
		}
	}
}

impl ChangeSink for SetInner {
	fn value_changed(&self, name: &str) {
		if let Some(this) = self.this.upgrade() {
			this.handle_value_changed(name);
		}
	}

	fn is_active(&self) -> bool {
		self.state.lock().active
	}
}

impl VariableLookup for SetInner {
	fn lookup_variable(&self, name: &str) -> Option<Arc<dyn Variable>> {
		if let Some(variable) = self.get(name) {
			return Some(variable);
		}
		let attachment = self.attachment()?;
		attachment.tree.upgrade()?.lookup_variable_above(attachment.node, name)
	}
}
