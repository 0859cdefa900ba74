//! Layered tree reconciliation.
//!
//! One consistent node tree per rebuild, merged from four ordered
//! sources: the session default layout (or the world-shared custom
//! layout when present), the per-user overlay, and the per-entity
//! overlay. Every piece of user customization that still has a valid
//! anchor in the current candidate set survives the merge.
//!
//! Nodes are addressed by path ([`NestId`]), never by object identity.
//! A persisted node whose parent disappeared between sessions is
//! silently pruned: accepted data loss, not an error.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::node::{DisplayStyle, NestId, Node, NodeKind, NodeRecord, NodeSeed};

#[cfg(test)]
mod tests;

/// Persisted form of one layer: the reduced records of its nodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutRecord {
	pub nodes: Vec<NodeRecord>,
}

/// The merged in-memory tree: a flat map keyed by nest id plus the
/// ordered root sequence. Children are linked by nest id in two lanes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HudTree {
	nodes: FxHashMap<NestId, Node>,
	roots: Vec<NestId>,
}

impl HudTree {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	pub fn contains(&self, nest: &NestId) -> bool {
		self.nodes.contains_key(nest)
	}

	pub fn get(&self, nest: &NestId) -> Option<&Node> {
		self.nodes.get(nest)
	}

	pub fn get_mut(&mut self, nest: &NestId) -> Option<&mut Node> {
		self.nodes.get_mut(nest)
	}

	/// Ordered root nest ids.
	pub fn roots(&self) -> &[NestId] {
		&self.roots
	}

	pub fn iter(&self) -> impl Iterator<Item = &Node> {
		self.nodes.values()
	}

	/// All nest ids, sorted for deterministic iteration.
	pub fn nest_ids(&self) -> Vec<NestId> {
		let mut ids: Vec<NestId> = self.nodes.keys().cloned().collect();
		ids.sort();
		ids
	}

	/// Grafts a node under its parent (or as a root), choosing the lane
	/// from its display style. Returns `false` when the parent is
	/// missing; the caller decides whether that is an orphan drop.
	pub fn graft(&mut self, node: Node) -> bool {
		let nest = node.nest.clone();
		match nest.parent() {
			None => {
				self.nodes.insert(nest.clone(), node);
				if !self.roots.contains(&nest) {
					self.roots.push(nest);
				}
				true
			}
			Some(parent_nest) => {
				let style = node.display.style;
				let Some(parent) = self.nodes.get_mut(&parent_nest) else {
					return false;
				};
				let lane = match style {
					DisplayStyle::Tab => &mut parent.tabs,
					DisplayStyle::List => &mut parent.lists,
				};
				if !lane.contains(&nest) {
					lane.push(nest.clone());
				}
				self.nodes.insert(nest, node);
				true
			}
		}
	}

	/// Moves a node between its parent's lanes after a style change.
	pub(crate) fn relink_lane(&mut self, nest: &NestId) {
		let Some(parent_nest) = nest.parent() else { return };
		let style = match self.nodes.get(nest) {
			Some(node) => node.display.style,
			None => return,
		};
		if let Some(parent) = self.nodes.get_mut(&parent_nest) {
			parent.tabs.retain(|child| child != nest);
			parent.lists.retain(|child| child != nest);
			let lane = match style {
				DisplayStyle::Tab => &mut parent.tabs,
				DisplayStyle::List => &mut parent.lists,
			};
			lane.push(nest.clone());
		}
	}

	/// Stable-sorts the root sequence and every lane by `order`.
	pub fn sort_siblings(&mut self) {
		let order_of = |nodes: &FxHashMap<NestId, Node>, nest: &NestId| {
			nodes.get(nest).map(|node| node.order).unwrap_or(0)
		};
		let mut roots = std::mem::take(&mut self.roots);
		roots.sort_by_key(|nest| order_of(&self.nodes, nest));
		self.roots = roots;

		let ids: Vec<NestId> = self.nodes.keys().cloned().collect();
		for nest in ids {
			let mut tabs = self.nodes.get(&nest).map(|n| n.tabs.clone()).unwrap_or_default();
			let mut lists = self.nodes.get(&nest).map(|n| n.lists.clone()).unwrap_or_default();
			tabs.sort_by_key(|child| order_of(&self.nodes, child));
			lists.sort_by_key(|child| order_of(&self.nodes, child));
			if let Some(node) = self.nodes.get_mut(&nest) {
				node.tabs = tabs;
				node.lists = lists;
			}
		}
	}

	/// Recomputes `has_selected_actions` bottom-up over the whole tree.
	/// A node is marked when it or any descendant holds at least one
	/// effectively selected action.
	pub fn mark_selected_actions(&mut self) {
		let roots = self.roots.clone();
		for nest in roots {
			self.mark_subtree(&nest);
		}
	}

	fn mark_subtree(&mut self, nest: &NestId) -> bool {
		let (children, own) = match self.nodes.get(nest) {
			Some(node) => {
				let mut children = node.tabs.clone();
				children.extend(node.lists.iter().cloned());
				(children, node.any_action_selected())
			}
			None => return false,
		};
		let mut marked = own;
		for child in &children {
			marked |= self.mark_subtree(child);
		}
		if let Some(node) = self.nodes.get_mut(nest) {
			node.has_selected_actions = marked;
		}
		marked
	}

	/// Depth-first ordered traversal (tabs lane before lists lane).
	pub fn walk(&self) -> Vec<&Node> {
		let mut out = Vec::with_capacity(self.nodes.len());
		for root in &self.roots {
			self.walk_into(root, &mut out);
		}
		out
	}

	fn walk_into<'a>(&'a self, nest: &NestId, out: &mut Vec<&'a Node>) {
		let Some(node) = self.nodes.get(nest) else { return };
		out.push(node);
		for child in node.tabs.iter().chain(node.lists.iter()) {
			self.walk_into(child, out);
		}
	}

	/// User-scope persistence payload: reduced records without action
	/// deltas. System-derived nodes belong to the entity scope and are
	/// excluded here, or one entity's derived groups would regraft into
	/// every other entity's tree.
	pub fn user_layout(&self) -> LayoutRecord {
		LayoutRecord {
			nodes: self
				.walk()
				.iter()
				.filter(|node| node.kind != NodeKind::SystemDerived)
				.map(|node| node.to_record(false))
				.collect(),
		}
	}

	/// Entity-scope persistence payload: system-derived nodes plus any
	/// node carrying action-selection deltas.
	pub fn entity_layout(&self) -> LayoutRecord {
		LayoutRecord {
			nodes: self
				.walk()
				.iter()
				.filter(|node| node.kind == NodeKind::SystemDerived || !node.actions.is_empty())
				.map(|node| node.to_record(true))
				.collect(),
		}
	}

	/// Rule for derived nodes with no remaining discovered actions:
	/// never hard-delete, mark unselected and push past live siblings.
	/// One rule for both the removed and the superseded case.
	pub fn deprioritize_empty_derived(&mut self) {
		for node in self.nodes.values_mut() {
			if node.kind == NodeKind::SystemDerived
				&& !node.actions.iter().any(|action| action.system_selected)
			{
				node.selected = false;
				node.order = crate::node::DEPRIORITIZED_ORDER;
			}
		}
	}
}

/// Merges the four layers into one tree.
///
/// `seed` is the session default layout, or the world-shared custom
/// layout when the world provides one; the caller picks. Overlays are
/// applied shallowest-first so parents exist before their children are
/// grafted; records without a surviving parent are dropped.
pub fn build_tree(
	seed: &[NodeSeed],
	user_layout: Option<&LayoutRecord>,
	entity_layout: Option<&LayoutRecord>,
) -> HudTree {
	let mut tree = HudTree::new();

	for seed_node in seed {
		let nest = seed_node.nest();
		let mut node = Node::new(nest, seed_node.name.clone(), seed_node.kind);
		node.display = seed_node.display;
		node.order = seed_node.order;
		if !tree.graft(node) {
			tracing::debug!(nest = %seed_node.nest(), "seed node parent missing, skipping");
		}
	}

	if let Some(layout) = user_layout {
		overlay_user(&mut tree, layout);
	}
	if let Some(layout) = entity_layout {
		overlay_entity(&mut tree, layout);
	}

	tree.sort_siblings();
	tree
}

fn by_level(layout: &LayoutRecord) -> Vec<&NodeRecord> {
	let mut records: Vec<&NodeRecord> = layout.nodes.iter().collect();
	records.sort_by_key(|record| record.nest_id.level());
	records
}

fn overlay_user(tree: &mut HudTree, layout: &LayoutRecord) {
	for record in by_level(layout) {
		if let Some(existing) = tree.get(&record.nest_id) {
			let merged = existing.merged_with(record);
			let style_changed = existing.display.style != merged.display.style;
			tree.nodes.insert(record.nest_id.clone(), merged);
			if style_changed {
				tree.relink_lane(&record.nest_id);
			}
		} else if !tree.graft(Node::from_record(record)) {
			tracing::debug!(nest = %record.nest_id, "orphaned user node, dropping");
		}
	}
}

fn overlay_entity(tree: &mut HudTree, layout: &LayoutRecord) {
	for record in by_level(layout) {
		if let Some(existing) = tree.get(&record.nest_id) {
			let merged = merge_action_deltas(existing, record);
			tree.nodes.insert(record.nest_id.clone(), merged);
		} else if record.kind != NodeKind::SystemDerived {
			// Only derived nodes may be introduced by the entity layer.
			tracing::debug!(nest = %record.nest_id, "entity record for unknown non-derived node, dropping");
		} else if !tree.graft(Node::from_record(record)) {
			tracing::debug!(nest = %record.nest_id, "orphaned entity node, dropping");
		}
	}
}

/// Pure merge of a record's action-selection deltas into an existing
/// node: matching resident actions take the persisted flags, unknown
/// ids become stubs awaiting a discovery refresh. Node scalar state is
/// kept; a same-path collision merges, never replaces.
fn merge_action_deltas(existing: &Node, record: &NodeRecord) -> Node {
	let mut next = existing.clone();
	for delta in record.actions.iter().flatten() {
		match next.actions.iter_mut().find(|action| action.id == delta.id) {
			Some(action) => {
				action.user_selected = delta.user_selected;
				action.is_preset = delta.is_preset;
			}
			None => next.actions.push(Action::from_delta(delta)),
		}
	}
	next
}
