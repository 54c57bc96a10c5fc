/// Lifecycle and update events broadcast by a [`VariableSet`](crate::VariableSet).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
	Activated,
	Deactivated,
	UpdateStarted {
		name: String,
	},
	UpdateCompleted {
		name: String,
		/// Whether the value differs from the one the update started with.
		changed: bool,
	},
	UpdateFailed {
		name: String,
		error: String,
	},
	/// An in-flight update was abandoned.
	UpdateCancelled {
		name: String,
	},
	/// Pending variables that can only start after each other.
	CycleDetected {
		names: Vec<String>,
	},
	/// Nothing pending and nothing in flight.
	Idle,
}
