use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use scopevars_deps::NameSet;
use scopevars_worker::{CancelHandle, join_error_panic_message, spawn};

use super::{SchedulerEvent, SetInner};
use crate::config::CyclePolicy;
use crate::context::{UpdateContext, VariableLookup};
use crate::error::VariableError;
use crate::tree::propagate;
use crate::variable::Variable;

impl SetInner {
	/// Advances waves until nothing more can start.
	///
	/// Only one caller drives at a time; callers arriving while a pass is
	/// running request another pass from the driver and return immediately.
	pub(super) fn run_wave(self: &Arc<Self>) {
		{
			let mut state = self.state.lock();
			if state.driving {
				state.rerun = true;
				return;
			}
			state.driving = true;
		}
		loop {
			let again = self.advance();
			let mut state = self.state.lock();
			if again || state.rerun {
				state.rerun = false;
				continue;
			}
			state.driving = false;
			break;
		}
	}

	/// One scheduling pass. Returns whether another pass is needed.
	fn advance(self: &Arc<Self>) -> bool {
		let (pending, busy) = {
			let state = self.state.lock();
			if !state.active {
				return false;
			}
			let busy: FxHashSet<String> = state.pending.iter().chain(state.in_flight.keys()).cloned().collect();
			(state.pending.iter().cloned().collect::<Vec<_>>(), busy)
		};

		let mut ready = Vec::new();
		let mut blocked = Vec::new();
		let mut missing = Vec::new();
		let mut waits_on_outer = false;
		for name in &pending {
			let Some(variable) = self.get(name) else {
				missing.push(name.clone());
				continue;
			};
			let deps = variable.dependencies();
			if deps.iter().any(|dep| dep != name && busy.contains(dep)) {
				blocked.push((name.clone(), deps));
				continue;
			}
			if deps.iter().any(|dep| dep != name && !self.defines(dep) && self.outer_is_busy(dep)) {
				tracing::trace!(variable = %name, "varset.wait.outer");
				waits_on_outer = true;
				continue;
			}
			ready.push((variable, deps));
		}

		let (started, idle, stalled, raced) = {
			let mut state = self.state.lock();
			if !state.active {
				return false;
			}
			for name in &missing {
				state.pending.shift_remove(name);
			}
			let mut started = Vec::new();
			let mut raced = false;
			for (variable, deps) in ready {
				let name = variable.name();
				if !state.pending.contains(name) || state.in_flight.contains_key(name) {
					continue;
				}
				// Another thread may have queued a dependency since the snapshot.
				if state.is_blocked(name, &deps) {
					raced = true;
					continue;
				}
				state.pending.shift_remove(name);
				let handle = self.clock.issue();
				state.in_flight.insert(name.to_string(), handle.clone());
				started.push((variable, handle));
			}
			let settled = state.pending.is_empty() && state.in_flight.is_empty();
			let idle = settled && !state.idle;
			if settled {
				state.idle = true;
				state.reported_cycle = None;
			}
			let stalled = started.is_empty() && !raced && !waits_on_outer && state.in_flight.is_empty() && !state.pending.is_empty();
			(started, idle, stalled, raced)
		};
		tracing::trace!(started = started.len(), blocked = blocked.len(), "varset.wave");

		for (variable, handle) in started {
			self.start_update(variable, handle);
		}
		if idle {
			tracing::trace!(set = self.id, "varset.idle");
			self.emit(SchedulerEvent::Idle);
		}
		raced || (stalled && self.resolve_stall(&blocked))
	}

	fn start_update(self: &Arc<Self>, variable: Arc<dyn Variable>, handle: CancelHandle) {
		let name = variable.name().to_string();
		let generation = handle.generation();
		variable.core().set_loading(true);
		tracing::debug!(variable = %name, generation, "varset.update.start");
		self.emit(SchedulerEvent::UpdateStarted { name: name.clone() });

		let lookup: Arc<dyn VariableLookup> = Arc::clone(self) as Arc<dyn VariableLookup>;
		let ctx = UpdateContext::new(lookup, Arc::clone(&self.interpolator), handle.token());
		let set = Arc::clone(self);
		let task_variable = Arc::clone(&variable);
		let work_variable = Arc::clone(&variable);
		let work = async move {
			match work_variable.revalidatable() {
				Some(r) => handle.run_until_cancelled(r.validate_and_update(&ctx)).await,
				None => Some(Ok(())),
			}
		};
		// The update runs in its own task so a panic settles it as a failure.
		let task = async move {
			let outcome = match tokio::spawn(work).await {
				Ok(outcome) => outcome,
				Err(error) => join_error_panic_message(error).map(|panic| Err(VariableError::Other(format!("update panicked: {panic}")))),
			};
			match outcome {
				Some(result) => set.update_finished(&task_variable, generation, result),
				None => tracing::trace!(variable = task_variable.name(), generation, "varset.update.abandoned"),
			}
		};
		if let Err(error) = spawn(self.config.task_class, &name, task) {
			self.update_finished(&variable, generation, Err(error.into()));
		}
	}

	fn update_finished(self: &Arc<Self>, variable: &Arc<dyn Variable>, generation: u64, result: Result<(), VariableError>) {
		let name = variable.name();
		let has_changed = {
			let mut state = self.state.lock();
			if state.in_flight.get(name).map(CancelHandle::generation) != Some(generation) {
				tracing::trace!(variable = name, generation, "varset.update.stale");
				return;
			}
			state.in_flight.remove(name);
			state.changed.remove(name)
		};

		match result {
			Err(VariableError::Cancelled) => {
				variable.core().set_loading(false);
				tracing::debug!(variable = name, generation, "varset.update.cancelled_by_source");
				self.emit(SchedulerEvent::UpdateCancelled { name: name.to_string() });
			}
			Ok(()) => {
				variable.core().update(|s| {
					s.loading = false;
					s.error = None;
				});
				tracing::debug!(variable = name, generation, changed = has_changed, "varset.update.done");
				self.emit(SchedulerEvent::UpdateCompleted {
					name: name.to_string(),
					changed: has_changed,
				});
			}
			Err(error) => {
				variable.core().update(|s| {
					s.loading = false;
					s.error = Some(error.to_string());
				});
				tracing::warn!(variable = name, generation, %error, "varset.update.failed");
				self.emit(SchedulerEvent::UpdateFailed {
					name: name.to_string(),
					error: error.to_string(),
				});
			}
		}

		self.notify_dependents(variable, has_changed);
		self.run_wave();
	}

	/// Value-changed signal from one of this set's variables.
	pub(super) fn handle_value_changed(self: &Arc<Self>, name: &str) {
		if !self.state.lock().active {
			tracing::trace!(variable = name, "varset.changed.inactive");
			return;
		}
		let dependents = self.dependents_of(name);
		let (interrupted, updating) = {
			let mut state = self.state.lock();
			if !state.active {
				return;
			}
			state.changed.insert(name.to_string());
			let interrupted: Vec<_> = dependents.iter().filter_map(|dep| state.enqueue(dep).map(|h| (dep.clone(), h))).collect();
			(interrupted, state.in_flight.contains_key(name))
		};
		tracing::debug!(variable = name, ?dependents, "varset.changed");
		self.finish_cancelled(interrupted);

		// Updating variables propagate once their update settles.
		if updating {
			return;
		}
		self.run_wave();
		if let Some(variable) = self.get(name) {
			self.propagate(&variable);
		}
	}

	/// Takes the changed flag of `variable` and notifies the tree.
	pub(super) fn propagate(&self, variable: &Arc<dyn Variable>) {
		let has_changed = self.state.lock().changed.remove(variable.name());
		self.notify_dependents(variable, has_changed);
	}

	fn notify_dependents(&self, variable: &Arc<dyn Variable>, has_changed: bool) {
		let Some(attachment) = self.attachment() else {
			return;
		};
		let Some(tree) = attachment.tree.upgrade() else {
			return;
		};
		propagate::notify(&tree, self, attachment.node, variable, has_changed);
	}

	/// Lets nested sets waiting on `variable` re-check it after it stopped
	/// being busy without settling.
	pub(super) fn release_waiters(&self, variable: &Arc<dyn Variable>) {
		let Some(attachment) = self.attachment() else {
			return;
		};
		let Some(tree) = attachment.tree.upgrade() else {
			return;
		};
		propagate::release(&tree, self, attachment.node, variable);
	}

	/// Whether `name` resolves to a busy variable of an enclosing scope.
	fn outer_is_busy(&self, name: &str) -> bool {
		let Some(attachment) = self.attachment() else {
			return false;
		};
		let Some(tree) = attachment.tree.upgrade() else {
			return false;
		};
		tree.resolve_set_above(attachment.node, name).is_some_and(|set| set.inner.is_loading_or_pending(name))
	}

	/// Handles pending variables that can never start. Returns whether the
	/// pending set changed.
	fn resolve_stall(self: &Arc<Self>, blocked: &[(String, Arc<NameSet>)]) -> bool {
		let members = cycle_members(blocked);
		if members.is_empty() {
			return false;
		}
		let names: Vec<String> = members.iter().cloned().collect();

		match self.config.cycle_policy {
			CyclePolicy::Report => {
				{
					let mut state = self.state.lock();
					if state.reported_cycle.as_ref() == Some(&members) {
						return false;
					}
					state.reported_cycle = Some(members);
				}
				tracing::warn!(variables = ?names, "varset.cycle");
				self.emit(SchedulerEvent::CycleDetected { names });
				false
			}
			CyclePolicy::Fail => {
				{
					let mut state = self.state.lock();
					for name in &names {
						state.pending.shift_remove(name);
					}
				}
				tracing::warn!(variables = ?names, policy = "fail", "varset.cycle");
				self.emit(SchedulerEvent::CycleDetected { names: names.clone() });

				let error = VariableError::Cycle(names.join(", ")).to_string();
				for name in &names {
					let Some(variable) = self.get(name) else {
						continue;
					};
					variable.core().update(|s| {
						s.loading = false;
						s.error = Some(error.clone());
					});
					self.emit(SchedulerEvent::UpdateFailed {
						name: name.clone(),
						error: error.clone(),
					});
					self.notify_dependents(&variable, false);
				}
				true
			}
		}
	}
}

/// Names in `blocked` that lie on a dependency cycle among themselves.
pub(super) fn cycle_members(blocked: &[(String, Arc<NameSet>)]) -> NameSet {
	let names: FxHashSet<&str> = blocked.iter().map(|(name, _)| name.as_str()).collect();
	let graph: FxHashMap<&str, Vec<&str>> = blocked
		.iter()
		.map(|(name, deps)| {
			let edges = deps.iter().map(String::as_str).filter(|dep| *dep != name.as_str() && names.contains(dep)).collect();
			(name.as_str(), edges)
		})
		.collect();

	let mut members = NameSet::new();
	for (&start, edges) in &graph {
		let mut stack: Vec<&str> = edges.clone();
		let mut seen = FxHashSet::default();
		while let Some(node) = stack.pop() {
			if node == start {
				members.insert(start.to_string());
				break;
			}
			if seen.insert(node)
				&& let Some(next) = graph.get(node)
			{
				stack.extend(next);
			}
		}
	}
	members
}
