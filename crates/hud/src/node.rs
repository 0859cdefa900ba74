//! Tree node (group) model.
//!
//! Nodes are addressed by [`NestId`], a path key built from ancestor
//! ids, which is what makes cross-session reconciliation possible:
//! merge identity is `(parent path, id)`, never object identity. A
//! node's ancestry is reconstructible by splitting its nest id on the
//! separator.

use serde::{Deserialize, Serialize};

use crate::action::{Action, ActionDelta};

/// Separator between path segments of a [`NestId`].
pub const NEST_SEPARATOR: char = '_';

/// Sort key assigned to derived nodes whose actions have all vanished.
///
/// Entity-scope derived nodes are never hard-deleted, only deselected
/// and pushed past every live sibling.
pub const DEPRIORITIZED_ORDER: i32 = 999;

/// Path key uniquely addressing a node in the tree.
///
/// The root node's nest id equals its id; a child's nest id is
/// `parent.nest_id + "_" + child.id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NestId(String);

impl NestId {
	/// Nest id of a root node.
	pub fn root(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	/// Nest id of a child of `self`.
	pub fn child(&self, id: &str) -> Self {
		Self(format!("{}{}{}", self.0, NEST_SEPARATOR, id))
	}

	/// Count of path segments; roots are level 1.
	pub fn level(&self) -> u32 {
		self.0.split(NEST_SEPARATOR).count() as u32
	}

	/// Parent path, or `None` for a root.
	pub fn parent(&self) -> Option<NestId> {
		self.0.rfind(NEST_SEPARATOR).map(|idx| Self(self.0[..idx].to_string()))
	}

	/// Final path segment (the node's own id).
	pub fn leaf(&self) -> &str {
		self.0.rsplit(NEST_SEPARATOR).next().unwrap_or(&self.0)
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl std::fmt::Display for NestId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for NestId {
	fn from(value: &str) -> Self {
		Self(value.to_string())
	}
}

/// Provenance of a node. Controls merge rules, not display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
	/// From the session's discovery-produced default layout.
	SystemDefault,
	/// User-created (or world-custom-layout) group.
	Custom,
	/// Derived from compendium content.
	CompendiumDerived,
	/// Created dynamically by the discovery callback; the only kind the
	/// entity layer may introduce.
	SystemDerived,
}

/// Rendering lane a node occupies under its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayStyle {
	#[default]
	Tab,
	List,
}

/// Per-node presentation settings. Persisted verbatim; the core only
/// interprets `style` (lane choice) and `sort_alphabetically`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
	pub style: DisplayStyle,
	pub show_title: bool,
	pub collapse: bool,
	pub grid: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub custom_width: Option<u32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub character_limit: Option<u32>,
	/// Node-level override of the global alphabetical-sort default.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub sort_alphabetically: Option<bool>,
}

/// One node of the in-memory tree.
///
/// Children are held as nest ids in two ordered lanes; the flat map in
/// [`crate::reconciler::HudTree`] owns the nodes themselves.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
	pub id: String,
	pub nest: NestId,
	pub level: u32,
	pub kind: NodeKind,
	pub name: String,
	/// Compact display variant used in list lanes.
	pub list_name: Option<String>,
	pub display: DisplaySettings,
	pub tabs: Vec<NestId>,
	pub lists: Vec<NestId>,
	pub actions: Vec<Action>,
	/// Node-level visibility toggle.
	pub selected: bool,
	/// Stable sort key among siblings.
	pub order: i32,
	/// Recomputed at the end of every build: whether this node or any
	/// descendant holds at least one selected action.
	pub has_selected_actions: bool,
}

impl Node {
	pub fn new(nest: NestId, name: impl Into<String>, kind: NodeKind) -> Self {
		Self {
			id: nest.leaf().to_string(),
			level: nest.level(),
			nest,
			kind,
			name: name.into(),
			list_name: None,
			display: DisplaySettings::default(),
			tabs: Vec::new(),
			lists: Vec::new(),
			actions: Vec::new(),
			selected: true,
			order: 0,
			has_selected_actions: false,
		}
	}

	/// Pure merge: this node with a persisted record's scalar state
	/// applied. Children and resident actions are untouched; action
	/// deltas are merged separately by the reconciler.
	pub fn merged_with(&self, record: &NodeRecord) -> Node {
		let mut next = self.clone();
		if let Some(name) = &record.name {
			next.name = name.clone();
		}
		next.list_name = record.list_name.clone().or(next.list_name);
		next.display = record.settings;
		next.selected = record.selected;
		next.order = record.order;
		next
	}

	/// Builds a node from a persisted record with no live counterpart.
	pub fn from_record(record: &NodeRecord) -> Node {
		let mut node = Node::new(
			record.nest_id.clone(),
			record.name.clone().unwrap_or_else(|| record.nest_id.leaf().to_string()),
			record.kind,
		);
		node.list_name = record.list_name.clone();
		node.display = record.settings;
		node.selected = record.selected;
		node.order = record.order;
		node.actions = record
			.actions
			.iter()
			.flatten()
			.map(Action::from_delta)
			.collect();
		node
	}

	/// Reduced persistence payload for this node. Action deltas are
	/// carried only for the entity scope.
	pub fn to_record(&self, with_actions: bool) -> NodeRecord {
		NodeRecord {
			id: self.id.clone(),
			nest_id: self.nest.clone(),
			name: Some(self.name.clone()),
			list_name: self.list_name.clone(),
			level: self.level,
			order: self.order,
			selected: self.selected,
			settings: self.display,
			kind: self.kind,
			actions: with_actions.then(|| self.actions.iter().map(Action::to_delta).collect()),
		}
	}

	/// Whether any resident action is effectively selected.
	pub fn any_action_selected(&self) -> bool {
		self.actions.iter().any(Action::selected)
	}
}

/// Reduced per-node persistence record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
	pub id: String,
	pub nest_id: NestId,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub list_name: Option<String>,
	pub level: u32,
	pub order: i32,
	pub selected: bool,
	#[serde(default)]
	pub settings: DisplaySettings,
	pub kind: NodeKind,
	/// Present only for entity-scope records.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub actions: Option<Vec<ActionDelta>>,
}

/// One node of a layout seed (the session default layout or the
/// world-shared custom layout). Seeds are definitions, not persisted
/// state: they carry no selection flags or action deltas.
#[derive(Debug, Clone)]
pub struct NodeSeed {
	pub id: String,
	pub name: String,
	pub parent: Option<NestId>,
	pub kind: NodeKind,
	pub display: DisplaySettings,
	pub order: i32,
}

impl NodeSeed {
	pub fn root(id: impl Into<String>, name: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			name: name.into(),
			parent: None,
			kind: NodeKind::SystemDefault,
			display: DisplaySettings::default(),
			order: 0,
		}
	}

	pub fn under(parent: NestId, id: impl Into<String>, name: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			name: name.into(),
			parent: Some(parent),
			kind: NodeKind::SystemDefault,
			display: DisplaySettings::default(),
			order: 0,
		}
	}

	pub fn with_style(mut self, style: DisplayStyle) -> Self {
		self.display.style = style;
		self
	}

	pub fn with_order(mut self, order: i32) -> Self {
		self.order = order;
		self
	}

	/// Nest id this seed resolves to.
	pub fn nest(&self) -> NestId {
		match &self.parent {
			Some(parent) => parent.child(&self.id),
			None => NestId::root(self.id.clone()),
		}
	}
}
