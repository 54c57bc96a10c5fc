//! Change propagation through the scene tree.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use super::{NodeId, SceneTree};
use crate::consumer::VariableConsumer;
use crate::set::{SetInner, VariableSet};
use crate::variable::Variable;

enum Target {
	/// A nested set that does not redefine the variable.
	Scope(VariableSet),
	Consumer(NodeId, Arc<dyn VariableConsumer>),
}

/// Notifies the active subtree at `start` that `variable` settled.
///
/// Subtrees whose own set defines a variable of the same name are skipped.
/// Nested sets hear about the update before the consumers below them.
pub(crate) fn notify(tree: &SceneTree, origin: &SetInner, start: NodeId, variable: &Arc<dyn Variable>, has_changed: bool) {
	let name = variable.name();
	let targets = collect(tree, origin, start, name);
	tracing::trace!(variable = name, has_changed, targets = targets.len(), "tree.propagate");

	for target in targets {
		match target {
			Target::Scope(set) => set.parent_variable_update_completed(variable, has_changed),
			Target::Consumer(node, consumer) => notify_consumer(node, &*consumer, variable, has_changed),
		}
	}
}

/// Wakes nested sets in the active subtree at `start` that may be waiting on
/// `variable`, without notifying consumers.
pub(crate) fn release(tree: &SceneTree, origin: &SetInner, start: NodeId, variable: &Arc<dyn Variable>) {
	for target in collect(tree, origin, start, variable.name()) {
		if let Target::Scope(set) = target {
			set.parent_variable_update_completed(variable, false);
		}
	}
}

fn collect(tree: &SceneTree, origin: &SetInner, start: NodeId, name: &str) -> Vec<Target> {
	let arena = tree.inner.read();
	let mut targets = Vec::new();
	let mut stack = vec![start];
	while let Some(id) = stack.pop() {
		let Some(node) = arena.nodes.get(id.0) else {
			continue;
		};
		if !node.active {
			continue;
		}
		if let Some(set) = &node.variables
			&& !set.is(origin)
		{
			if set.inner.defines(name) {
				continue;
			}
			targets.push(Target::Scope(set.clone()));
		}
		if let Some(consumer) = &node.consumer {
			targets.push(Target::Consumer(id, Arc::clone(consumer)));
		}
		stack.extend(node.children.iter().rev().copied());
	}
	targets
}

fn notify_consumer(node: NodeId, consumer: &dyn VariableConsumer, variable: &Arc<dyn Variable>, has_changed: bool) {
	let name = variable.name();
	let outcome = catch_unwind(AssertUnwindSafe(|| {
		if !consumer.has_dependency_on(name) {
			return Ok(());
		}
		consumer.variable_update_completed(&**variable, has_changed)
	}));
	match outcome {
		Ok(Ok(())) => {}
		Ok(Err(error)) => tracing::warn!(?node, variable = name, %error, "tree.notify.failed"),
		Err(payload) => {
			let panic = scopevars_worker::panic_message(&*payload).unwrap_or_else(|| "<unknown panic>".to_string());
			tracing::warn!(?node, variable = name, %panic, "tree.notify.failed");
		}
	}
}
