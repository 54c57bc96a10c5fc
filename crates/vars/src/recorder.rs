use rustc_hash::FxHashMap;

use crate::value::VariableValue;

/// Values remembered at deactivation, compared again on activation.
#[derive(Debug, Default)]
pub(crate) struct ValueRecorder {
	values: FxHashMap<String, VariableValue>,
}

impl ValueRecorder {
	pub fn record(&mut self, name: &str, value: VariableValue) {
		self.values.insert(name.to_string(), value);
	}

	pub fn forget(&mut self, name: &str) {
		self.values.remove(name);
	}

	pub fn has_recorded(&self, name: &str) -> bool {
		self.values.contains_key(name)
	}

	/// A variable drifted when it has a snapshot that differs from `current`.
	pub fn has_drifted(&self, name: &str, current: &VariableValue) -> bool {
		self.values.get(name).is_some_and(|recorded| recorded != current)
	}
}
