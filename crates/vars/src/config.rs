//! Scheduler configuration.

use std::path::Path;

use scopevars_worker::TaskClass;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[cfg(test)]
mod tests;

/// What the scheduler does when pending variables wait on each other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePolicy {
	/// Log and broadcast the cycle, leave its members pending.
	#[default]
	Report,
	/// Fail every member with a cycle error so downstream variables can run.
	Fail,
}

/// Settings of one [`VariableSet`](crate::VariableSet) scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
	pub cycle_policy: CyclePolicy,
	/// Capacity of the event broadcast channel.
	pub event_buffer: usize,
	/// Worker class update tasks are spawned under.
	pub task_class: TaskClass,
}

impl Default for SchedulerConfig {
	fn default() -> Self {
		Self {
			cycle_policy: CyclePolicy::Report,
			event_buffer: 64,
			task_class: TaskClass::Interactive,
		}
	}
}

impl SchedulerConfig {
	/// Parses and validates TOML text.
	pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
		let config: Self = toml::from_str(text)?;
		config.validate()?;
		Ok(config)
	}

	/// Reads and parses a TOML file.
	pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let text = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		Self::from_toml(&text)
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.event_buffer == 0 {
			return Err(ConfigError::Invalid("event_buffer must be greater than zero".into()));
		}
		Ok(())
	}
}
