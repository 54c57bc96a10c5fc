use std::any::Any;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

use crate::extract::{NameSet, scan_json};
use crate::ALL_VARIABLES;


type SeenState = Arc<dyn Any + Send + Sync>;

#[derive(Default)]
struct ScanCache {
	/// Last state snapshot scanned, held so its address cannot be reused.
	seen: Option<SeenState>,
	/// Projection of the tracked fields taken from `seen`.
	slice: Option<Value>,
	names: Arc<NameSet>,
}

/// Per-node cache of the variable names the node's state references.
///
/// Owners keep their scannable state behind an `Arc` and replace it on every
/// change. [`Self::names`] rescans only when handed a different allocation,
/// and, when tracked fields are configured, only when those fields changed.
pub struct DependencyDescriptor {
	explicit: Option<Arc<NameSet>>,
	tracked: Option<Box<[String]>>,
	cache: Mutex<ScanCache>,
}

impl Default for DependencyDescriptor {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Debug for DependencyDescriptor {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("DependencyDescriptor")
			.field("explicit", &self.explicit)
			.field("tracked", &self.tracked)
			.field("names", &self.cache.lock().names)
			.finish()
	}
}

impl DependencyDescriptor {
	/// Scans the whole serialized state.
	pub fn new() -> Self {
		Self {
			explicit: None,
			tracked: None,
			cache: Mutex::new(ScanCache::default()),
		}
	}

	/// Scans only the given fields. Dotted paths reach into nested objects.
	pub fn tracking<I, S>(fields: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			tracked: Some(fields.into_iter().map(Into::into).collect()),
			..Self::new()
		}
	}

	/// Fixed dependency list; the state is never scanned.
	pub fn explicit<I, S>(names: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			explicit: Some(Arc::new(names.into_iter().map(Into::into).collect())),
			..Self::new()
		}
	}

	pub fn is_explicit(&self) -> bool {
		self.explicit.is_some()
	}

	/// Returns the referenced names for `state`, rescanning if it changed.
	pub fn names<T>(&self, state: &Arc<T>) -> Arc<NameSet>
	where
		T: Serialize + Send + Sync + 'static,
	{
		if let Some(explicit) = &self.explicit {
			return Arc::clone(explicit);
		}

		let mut cache = self.cache.lock();
		if let Some(seen) = &cache.seen
			&& std::ptr::addr_eq(Arc::as_ptr(seen), Arc::as_ptr(state))
		{
			return Arc::clone(&cache.names);
		}

		let value = match serde_json::to_value(&**state) {
			Ok(value) => value,
			Err(error) => {
				tracing::warn!(%error, "deps.scan.serialize_failed");
				Value::Null
			}
		};
		let seen: SeenState = state.clone();
		cache.seen = Some(seen);

		match &self.tracked {
			None => {
				let mut names = NameSet::new();
				scan_json(&value, &mut names);
				cache.names = Arc::new(names);
			}
			Some(fields) => {
				let slice = Value::Array(fields.iter().map(|path| project(&value, path)).collect());
				if cache.slice.as_ref() != Some(&slice) {
					let mut names = NameSet::new();
					scan_json(&slice, &mut names);
					cache.names = Arc::new(names);
					cache.slice = Some(slice);
				}
			}
		}
		tracing::trace!(names = ?cache.names, "deps.scan");
		Arc::clone(&cache.names)
	}

	/// Returns whether `state` references `name`.
	pub fn has_dependency_on<T>(&self, state: &Arc<T>, name: &str) -> bool
	where
		T: Serialize + Send + Sync + 'static,
	{
		depends_on(&self.names(state), name)
	}
}

/// Dependency test that honours the `__all_variables` wildcard.
pub fn depends_on(names: &NameSet, name: &str) -> bool {
	names.contains(name) || names.contains(ALL_VARIABLES)
}

fn project(value: &Value, path: &str) -> Value {
	let mut current = value;
	for segment in path.split('.') {
		match current.get(segment) {
			Some(next) => current = next,
			None => return Value::Null,
		}
	}
	current.clone()
}
