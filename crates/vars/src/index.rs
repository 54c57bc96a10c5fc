//! Index of active variables keyed by an external identifier.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::variable::Variable;

/// Identity of the [`VariableSet`](crate::VariableSet) that registered an entry.
pub(crate) type OwnerId = u64;

struct IndexEntry {
	owner: OwnerId,
	variable: Arc<dyn Variable>,
}

/// Active variables keyed by an external id, e.g. the data source an ad hoc
/// filter set applies to.
///
/// Sets that were given an index publish every variable with an
/// [`index_key`](Variable::index_key) when they activate and withdraw them on
/// deactivation. Lookups return the most recently activated entry.
#[derive(Default)]
pub struct ActiveVariableIndex {
	entries: RwLock<FxHashMap<String, Vec<IndexEntry>>>,
}

impl std::fmt::Debug for ActiveVariableIndex {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let entries = self.entries.read();
		let mut map = f.debug_map();
		for (key, list) in entries.iter() {
			map.entry(key, &list.iter().map(|e| e.variable.name().to_string()).collect::<Vec<_>>());
		}
		map.finish()
	}
}

impl ActiveVariableIndex {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn get(&self, key: &str) -> Option<Arc<dyn Variable>> {
		self.entries.read().get(key)?.last().map(|e| Arc::clone(&e.variable))
	}

	pub fn contains_key(&self, key: &str) -> bool {
		self.entries.read().contains_key(key)
	}

	pub fn len(&self) -> usize {
		self.entries.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.read().is_empty()
	}

	pub(crate) fn register(&self, owner: OwnerId, key: String, variable: Arc<dyn Variable>) {
		tracing::trace!(key, variable = variable.name(), "index.register");
		self.entries.write().entry(key).or_default().push(IndexEntry { owner, variable });
	}

	/// Drops the owner's entry for one variable, or all of its entries.
	pub(crate) fn unregister(&self, owner: OwnerId, variable: Option<&str>) {
		let mut entries = self.entries.write();
		entries.retain(|_, list| {
			list.retain(|e| e.owner != owner || variable.is_some_and(|name| e.variable.name() != name));
			!list.is_empty()
		});
	}
}
