//! Non-variable nodes that react to variable updates.

use std::sync::Arc;

use parking_lot::RwLock;
use scopevars_deps::{DependencyDescriptor, NameSet, depends_on};
use serde::Serialize;

use crate::error::ConsumerError;
use crate::variable::Variable;

/// A node that depends on variables without being scheduled itself, e.g. a
/// query runner.
pub trait VariableConsumer: Send + Sync {
	fn dependencies(&self) -> Arc<NameSet>;

	fn has_dependency_on(&self, name: &str) -> bool {
		depends_on(&self.dependencies(), name)
	}

	/// Called after `variable` settled. `has_changed` is false when the update
	/// completed with the value it started with.
	fn variable_update_completed(&self, variable: &dyn Variable, has_changed: bool) -> Result<(), ConsumerError>;
}

type Callback<S> = dyn Fn(&S, &dyn Variable, bool) -> Result<(), ConsumerError> + Send + Sync;

/// Consumer over a serializable state, with dependencies scanned from it.
pub struct DependencyBinding<S> {
	state: RwLock<Arc<S>>,
	descriptor: DependencyDescriptor,
	on_update: Box<Callback<S>>,
}

impl<S> DependencyBinding<S>
where
	S: Serialize + Send + Sync + 'static,
{
	pub fn new<F>(state: S, descriptor: DependencyDescriptor, on_update: F) -> Self
	where
		F: Fn(&S, &dyn Variable, bool) -> Result<(), ConsumerError> + Send + Sync + 'static,
	{
		Self {
			state: RwLock::new(Arc::new(state)),
			descriptor,
			on_update: Box::new(on_update),
		}
	}

	pub fn state(&self) -> Arc<S> {
		Arc::clone(&self.state.read())
	}

	pub fn set_state(&self, state: S) {
		*self.state.write() = Arc::new(state);
	}
}

impl<S> VariableConsumer for DependencyBinding<S>
where
	S: Serialize + Send + Sync + 'static,
{
	fn dependencies(&self) -> Arc<NameSet> {
		self.descriptor.names(&self.state())
	}

	fn variable_update_completed(&self, variable: &dyn Variable, has_changed: bool) -> Result<(), ConsumerError> {
		(self.on_update)(&self.state(), variable, has_changed)
	}
}
