use indexmap::IndexSet;
use rustc_hash::{FxHashMap, FxHashSet};
use scopevars_deps::NameSet;
use scopevars_worker::CancelHandle;

use crate::recorder::ValueRecorder;

/// Scheduling bookkeeping of one set, guarded by the set's state mutex.
///
/// A name is never both in `pending` and in `in_flight`.
#[derive(Debug)]
pub(crate) struct SchedulerState {
	pub active: bool,
	/// Waiting to start, in enqueue order.
	pub pending: IndexSet<String>,
	pub in_flight: FxHashMap<String, CancelHandle>,
	/// Changed since their last propagation.
	pub changed: FxHashSet<String>,
	pub recorder: ValueRecorder,
	/// A thread is advancing waves.
	pub driving: bool,
	/// Another pass was requested while driving.
	pub rerun: bool,
	pub idle: bool,
	pub reported_cycle: Option<NameSet>,
}

impl Default for SchedulerState {
	fn default() -> Self {
		Self {
			active: false,
			pending: IndexSet::new(),
			in_flight: FxHashMap::default(),
			changed: FxHashSet::default(),
			recorder: ValueRecorder::default(),
			driving: false,
			rerun: false,
			idle: true,
			reported_cycle: None,
		}
	}
}

impl SchedulerState {
	/// Queues `name`, returning the handle of an update it interrupts.
	pub fn enqueue(&mut self, name: &str) -> Option<CancelHandle> {
		self.idle = false;
		let interrupted = self.in_flight.remove(name);
		if let Some(handle) = &interrupted {
			handle.cancel();
		}
		self.pending.insert(name.to_string());
		interrupted
	}

	/// Stops tracking `name`, returning the handle of an update it interrupts.
	pub fn withdraw(&mut self, name: &str) -> Option<CancelHandle> {
		self.pending.shift_remove(name);
		let interrupted = self.in_flight.remove(name);
		if let Some(handle) = &interrupted {
			handle.cancel();
		}
		interrupted
	}

	pub fn is_busy(&self, name: &str) -> bool {
		self.pending.contains(name) || self.in_flight.contains_key(name)
	}

	/// Whether a dependency of `name` other than itself is queued or running.
	pub fn is_blocked(&self, name: &str, deps: &NameSet) -> bool {
		deps.iter().any(|dep| dep != name && self.is_busy(dep))
	}
}
