//! Scene tree hosting variable sets and consumers.
//!
//! Nodes form an arena-backed tree. A node may own one [`VariableSet`] and
//! one [`VariableConsumer`]. Name lookups walk from a node up through its
//! ancestors and stop at the first set that defines the name, so a nested set
//! shadows outer definitions for everything below it.

pub(crate) mod propagate;

use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use scopevars_deps::ALL_VARIABLES;
use slab::Slab;

use crate::consumer::VariableConsumer;
use crate::context::VariableLookup;
use crate::error::TreeError;
use crate::interpolate::{Interpolator, PlainInterpolator};
use crate::set::VariableSet;
use crate::variable::{RefreshTrigger, Variable};


/// Handle of a node in a [`SceneTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

struct SceneNode {
	label: String,
	parent: Option<NodeId>,
	children: Vec<NodeId>,
	active: bool,
	variables: Option<VariableSet>,
	consumer: Option<Arc<dyn VariableConsumer>>,
}

impl SceneNode {
	fn new(label: String, parent: Option<NodeId>) -> Self {
		Self {
			label,
			parent,
			children: Vec::new(),
			active: false,
			variables: None,
			consumer: None,
		}
	}
}

#[derive(Default)]
pub(crate) struct TreeArena {
	nodes: Slab<SceneNode>,
}

impl TreeArena {
	fn node(&self, id: NodeId) -> Result<&SceneNode, TreeError> {
		self.nodes.get(id.0).ok_or(TreeError::UnknownNode(id))
	}

	fn node_mut(&mut self, id: NodeId) -> Result<&mut SceneNode, TreeError> {
		self.nodes.get_mut(id.0).ok_or(TreeError::UnknownNode(id))
	}

	/// `root` and its descendants, parents before children.
	fn preorder(&self, root: NodeId) -> Vec<NodeId> {
		let mut out = Vec::new();
		let mut stack = vec![root];
		while let Some(id) = stack.pop() {
			if let Some(node) = self.nodes.get(id.0) {
				out.push(id);
				stack.extend(node.children.iter().rev().copied());
			}
		}
		out
	}

	/// First set defining `name`, walking up from `start`.
	fn resolve(&self, start: Option<NodeId>, name: &str) -> Option<VariableSet> {
		let mut cursor = start;
		while let Some(id) = cursor {
			let node = self.nodes.get(id.0)?;
			if let Some(set) = &node.variables
				&& set.inner.defines(name)
			{
				return Some(set.clone());
			}
			cursor = node.parent;
		}
		None
	}
}

/// Shared handle to a tree of scene nodes.
#[derive(Clone, Default)]
pub struct SceneTree {
	pub(crate) inner: Arc<RwLock<TreeArena>>,
}

#[derive(Clone)]
pub(crate) struct WeakTree(Weak<RwLock<TreeArena>>);

impl WeakTree {
	pub fn upgrade(&self) -> Option<SceneTree> {
		self.0.upgrade().map(|inner| SceneTree { inner })
	}
}

impl std::fmt::Debug for SceneTree {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SceneTree").field("nodes", &self.inner.read().nodes.len()).finish()
	}
}

impl SceneTree {
	pub fn new() -> Self {
		Self::default()
	}

	fn downgrade(&self) -> WeakTree {
		WeakTree(Arc::downgrade(&self.inner))
	}

	pub fn add_root(&self, label: impl Into<String>) -> NodeId {
		NodeId(self.inner.write().nodes.insert(SceneNode::new(label.into(), None)))
	}

	pub fn add_child(&self, parent: NodeId, label: impl Into<String>) -> Result<NodeId, TreeError> {
		let mut arena = self.inner.write();
		arena.node(parent)?;
		let id = NodeId(arena.nodes.insert(SceneNode::new(label.into(), Some(parent))));
		arena.node_mut(parent)?.children.push(id);
		Ok(id)
	}

	/// Deactivates and removes `node` with its subtree, detaching their sets.
	pub fn remove(&self, node: NodeId) -> Result<(), TreeError> {
		self.deactivate_subtree(node)?;
		let mut arena = self.inner.write();
		let parent = arena.node(node)?.parent;
		if let Some(parent) = parent
			&& let Ok(parent) = arena.node_mut(parent)
		{
			parent.children.retain(|&c| c != node);
		}
		for id in arena.preorder(node) {
			let removed = arena.nodes.remove(id.0);
			if let Some(set) = removed.variables {
				set.detach();
			}
		}
		Ok(())
	}

	pub fn contains(&self, node: NodeId) -> bool {
		self.inner.read().nodes.contains(node.0)
	}

	pub fn parent(&self, node: NodeId) -> Option<NodeId> {
		self.inner.read().nodes.get(node.0)?.parent
	}

	pub fn children(&self, node: NodeId) -> Vec<NodeId> {
		self.inner.read().nodes.get(node.0).map(|n| n.children.clone()).unwrap_or_default()
	}

	pub fn label(&self, node: NodeId) -> Option<String> {
		self.inner.read().nodes.get(node.0).map(|n| n.label.clone())
	}

	pub fn is_active(&self, node: NodeId) -> bool {
		self.inner.read().nodes.get(node.0).is_some_and(|n| n.active)
	}

	/// Attaches `set` to `node`, activating it if the node is active.
	pub fn set_variables(&self, node: NodeId, set: VariableSet) -> Result<(), TreeError> {
		if let Some(attached) = set.attached_node() {
			return Err(TreeError::AlreadyAttached(attached));
		}
		let active = {
			let mut arena = self.inner.write();
			let entry = arena.node_mut(node)?;
			if entry.variables.is_some() {
				return Err(TreeError::NodeHasVariables(node));
			}
			set.attach(self.downgrade(), node);
			entry.variables = Some(set.clone());
			entry.active
		};
		tracing::debug!(?node, variables = ?set.names(), "tree.attach");
		if active {
			set.activate();
		}
		Ok(())
	}

	/// Detaches and returns the set owned by `node`.
	pub fn take_variables(&self, node: NodeId) -> Result<Option<VariableSet>, TreeError> {
		let set = self.inner.write().node_mut(node)?.variables.take();
		if let Some(set) = &set {
			set.deactivate();
			set.detach();
		}
		Ok(set)
	}

	pub fn variables(&self, node: NodeId) -> Option<VariableSet> {
		self.inner.read().nodes.get(node.0)?.variables.clone()
	}

	pub fn set_consumer(&self, node: NodeId, consumer: Arc<dyn VariableConsumer>) -> Result<(), TreeError> {
		self.inner.write().node_mut(node)?.consumer = Some(consumer);
		Ok(())
	}

	/// Marks `node` active and activates its set.
	pub fn activate(&self, node: NodeId) -> Result<(), TreeError> {
		let set = {
			let mut arena = self.inner.write();
			let entry = arena.node_mut(node)?;
			entry.active = true;
			entry.variables.clone()
		};
		tracing::trace!(?node, "tree.activate");
		if let Some(set) = set {
			set.activate();
		}
		Ok(())
	}

	/// Deactivates the set of `node`, then marks the node inactive.
	pub fn deactivate(&self, node: NodeId) -> Result<(), TreeError> {
		let set = self.inner.read().node(node)?.variables.clone();
		if let Some(set) = set {
			set.deactivate();
		}
		self.inner.write().node_mut(node)?.active = false;
		tracing::trace!(?node, "tree.deactivate");
		Ok(())
	}

	/// Activates `node` and its descendants, parents first.
	pub fn activate_subtree(&self, node: NodeId) -> Result<(), TreeError> {
		let order = {
			let arena = self.inner.read();
			arena.node(node)?;
			arena.preorder(node)
		};
		for id in order {
			self.activate(id)?;
		}
		Ok(())
	}

	/// Deactivates `node` and its descendants, children first.
	pub fn deactivate_subtree(&self, node: NodeId) -> Result<(), TreeError> {
		let order = {
			let arena = self.inner.read();
			arena.node(node)?;
			arena.preorder(node)
		};
		for id in order.into_iter().rev() {
			self.deactivate(id)?;
		}
		Ok(())
	}

	/// The set that `name` resolves to from `node`.
	pub fn resolve_set(&self, node: NodeId, name: &str) -> Option<VariableSet> {
		self.inner.read().resolve(Some(node), name)
	}

	/// Resolves `name` from `node` upward. The nearest definition wins.
	pub fn lookup_variable(&self, node: NodeId, name: &str) -> Option<Arc<dyn Variable>> {
		self.resolve_set(node, name)?.get(name)
	}

	pub(crate) fn resolve_set_above(&self, node: NodeId, name: &str) -> Option<VariableSet> {
		let arena = self.inner.read();
		let parent = arena.nodes.get(node.0)?.parent;
		arena.resolve(parent, name)
	}

	pub(crate) fn lookup_variable_above(&self, node: NodeId, name: &str) -> Option<Arc<dyn Variable>> {
		self.resolve_set_above(node, name)?.get(name)
	}

	/// Whether `name`, seen from `node`, is queued or updating.
	pub fn is_variable_loading_or_pending(&self, node: NodeId, name: &str) -> bool {
		self.resolve_set(node, name).is_some_and(|set| set.is_loading_or_pending(name))
	}

	/// Whether any dependency of the consumer at `node` is queued or updating.
	pub fn has_dependency_in_loading_state(&self, node: NodeId) -> bool {
		let Some(consumer) = self.inner.read().nodes.get(node.0).and_then(|n| n.consumer.clone()) else {
			return false;
		};
		consumer
			.dependencies()
			.iter()
			.filter(|name| name.as_str() != ALL_VARIABLES)
			.any(|name| self.is_variable_loading_or_pending(node, name))
	}

	/// Forwards `trigger` to the sets of every active node.
	pub fn refresh_on(&self, trigger: RefreshTrigger) {
		let sets: Vec<VariableSet> = self
			.inner
			.read()
			.nodes
			.iter()
			.filter(|(_, n)| n.active)
			.filter_map(|(_, n)| n.variables.clone())
			.collect();
		for set in sets {
			set.refresh_on(trigger);
		}
	}

	/// Name resolution as seen from `node`.
	pub fn lookup_at(&self, node: NodeId) -> NodeLookup {
		NodeLookup {
			tree: self.clone(),
			node,
		}
	}

	/// Interpolates `template` with the variables visible from `node`.
	pub fn interpolate(&self, node: NodeId, template: &str) -> String {
		PlainInterpolator.interpolate(template, &self.lookup_at(node))
	}
}

/// [`VariableLookup`] rooted at one node of a [`SceneTree`].
#[derive(Debug, Clone)]
pub struct NodeLookup {
	tree: SceneTree,
	node: NodeId,
}

impl VariableLookup for NodeLookup {
	fn lookup_variable(&self, name: &str) -> Option<Arc<dyn Variable>> {
		self.tree.lookup_variable(self.node, name)
	}
}
