//! Error types for variables, registries, and the scene tree.

use thiserror::Error;

use crate::tree::NodeId;

/// Failure of a variable's update, stored on the variable as text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VariableError {
	/// The option source or query runner failed.
	#[error("option source failed: {0}")]
	Source(String),

	/// The variable's `regex` could not be compiled.
	#[error("invalid regex `{pattern}`: {message}")]
	InvalidRegex {
		/// Pattern as configured.
		pattern: String,
		/// Compiler diagnostic.
		message: String,
	},

	/// The update was abandoned before it finished. Settles the update
	/// without recording an error.
	#[error("update cancelled")]
	Cancelled,

	/// The variable is part of a dependency cycle.
	#[error("circular dependency between variables: {0}")]
	Cycle(String),

	/// The update task could not be started.
	#[error("failed to schedule update: {0}")]
	Spawn(String),

	#[error("{0}")]
	Other(String),
}

impl From<scopevars_worker::SpawnError> for VariableError {
	fn from(err: scopevars_worker::SpawnError) -> Self {
		Self::Spawn(err.to_string())
	}
}

/// Errors raised while editing a variable set.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SetError {
	/// Names are unique within one set.
	#[error("variable `{0}` is already defined in this set")]
	DuplicateName(String),
}

/// Errors raised by structural edits of the scene tree.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TreeError {
	#[error("unknown scene node {0:?}")]
	UnknownNode(NodeId),

	/// A variable set can be attached to one node only.
	#[error("variable set is already attached to node {0:?}")]
	AlreadyAttached(NodeId),

	/// The node already owns a variable set.
	#[error("node {0:?} already has a variable set")]
	NodeHasVariables(NodeId),
}

/// Error returned by a consumer's notification hook.
pub type ConsumerError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while loading a [`SchedulerConfig`](crate::SchedulerConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("TOML parse error: {0}")]
	Toml(#[from] toml::de::Error),

	/// Error reading a configuration file.
	#[error("I/O error reading {path}: {error}")]
	Io {
		/// Path to the file that failed to read.
		path: std::path::PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},

	/// A field parsed but holds an unusable value.
	#[error("invalid configuration: {0}")]
	Invalid(String),
}
