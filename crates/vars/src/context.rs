use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::interpolate::{Interpolator, PlainInterpolator};
use crate::variable::Variable;

/// Name resolution seen from one scope.
pub trait VariableLookup: Send + Sync {
	fn lookup_variable(&self, name: &str) -> Option<Arc<dyn Variable>>;
}

/// A lookup that resolves nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoVariables;

impl VariableLookup for NoVariables {
	fn lookup_variable(&self, _name: &str) -> Option<Arc<dyn Variable>> {
		None
	}
}

/// Collaborators handed to [`Revalidatable::validate_and_update`](crate::Revalidatable::validate_and_update).
#[derive(Clone)]
pub struct UpdateContext {
	lookup: Arc<dyn VariableLookup>,
	interpolator: Arc<dyn Interpolator>,
	cancel: CancellationToken,
}

impl std::fmt::Debug for UpdateContext {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("UpdateContext").field("cancelled", &self.cancel.is_cancelled()).finish_non_exhaustive()
	}
}

impl UpdateContext {
	pub fn new(lookup: Arc<dyn VariableLookup>, interpolator: Arc<dyn Interpolator>, cancel: CancellationToken) -> Self {
		Self {
			lookup,
			interpolator,
			cancel,
		}
	}

	/// Context with no variables in scope, for running updates by hand.
	pub fn detached() -> Self {
		Self::new(Arc::new(NoVariables), Arc::new(PlainInterpolator), CancellationToken::new())
	}

	pub fn lookup(&self, name: &str) -> Option<Arc<dyn Variable>> {
		self.lookup.lookup_variable(name)
	}

	/// Replaces variable references in `template` using this scope.
	pub fn interpolate(&self, template: &str) -> String {
		self.interpolator.interpolate(template, &*self.lookup)
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancel.is_cancelled()
	}

	pub async fn cancelled(&self) {
		self.cancel.cancelled().await;
	}

	pub fn token(&self) -> &CancellationToken {
		&self.cancel
	}
}
