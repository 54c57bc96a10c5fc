use serde::{Deserialize, Serialize};

/// Execution class used for scheduling and observability of update tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskClass {
	/// Latency-sensitive work whose result is visible to the user.
	#[default]
	Interactive,
	/// Work that can lag behind interactive updates.
	Background,
}

impl TaskClass {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Interactive => "interactive",
			Self::Background => "background",
		}
	}
}
