//! Action (leaf command) model.
//!
//! Three selection flags interact here and the distinction is load
//! bearing: `system_selected` is what discovery said *this rebuild*,
//! `user_selected` is the sticky persisted preference, and the
//! effective value is always derived from the two, never stored.

use serde::{Deserialize, Serialize};

/// One of up to three info badges attached to an action.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionInfo {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub class: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub icon: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub text: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub title: Option<String>,
}

/// Candidate action descriptor produced by a discovery source.
///
/// The engine treats `system_payload` as opaque; it exists so the host
/// can round-trip whatever it needs to execute the action later.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DiscoveredAction {
	pub id: String,
	pub name: String,
	pub full_name: Option<String>,
	pub list_name: Option<String>,
	pub icon: Option<String>,
	pub image: Option<String>,
	pub tooltip: Option<String>,
	pub info: [Option<ActionInfo>; 3],
	pub system_payload: serde_json::Value,
}

impl DiscoveredAction {
	pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			name: name.into(),
			..Default::default()
		}
	}
}

/// An action resident in a tree node.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
	pub id: String,
	pub name: String,
	pub full_name: Option<String>,
	pub list_name: Option<String>,
	pub icon: Option<String>,
	pub image: Option<String>,
	pub tooltip: Option<String>,
	pub info: [Option<ActionInfo>; 3],
	pub system_payload: serde_json::Value,
	/// Whether discovery still considers this action available in the
	/// current rebuild.
	pub system_selected: bool,
	/// Sticky user preference. `None` means the user never touched it.
	pub user_selected: Option<bool>,
	/// Auto-discovered, as opposed to manually added via the editor.
	pub is_preset: bool,
}

impl Action {
	/// New preset from a fresh discovery with no persisted history.
	pub fn from_discovered(discovered: &DiscoveredAction) -> Self {
		Self {
			id: discovered.id.clone(),
			name: discovered.name.clone(),
			full_name: discovered.full_name.clone(),
			list_name: discovered.list_name.clone(),
			icon: discovered.icon.clone(),
			image: discovered.image.clone(),
			tooltip: discovered.tooltip.clone(),
			info: discovered.info.clone(),
			system_payload: discovered.system_payload.clone(),
			system_selected: true,
			user_selected: None,
			is_preset: true,
		}
	}

	/// Stub rebuilt from a persisted delta, before discovery has had a
	/// chance to refresh its definition. Display fields fall back to
	/// the id until a same-id discovery fills them in. Starts
	/// system-selected; selection reconciliation flips that for presets
	/// the current discovery no longer returns.
	pub fn from_delta(delta: &ActionDelta) -> Self {
		Self {
			id: delta.id.clone(),
			name: delta.id.clone(),
			full_name: None,
			list_name: None,
			icon: None,
			image: None,
			tooltip: None,
			info: Default::default(),
			system_payload: serde_json::Value::Null,
			system_selected: true,
			user_selected: delta.user_selected,
			is_preset: delta.is_preset,
		}
	}

	/// Pure refresh: the current discovery's definition applied over
	/// this action's persisted history. Marks the result a preset.
	pub fn refreshed_from(&self, discovered: &DiscoveredAction) -> Action {
		Action {
			id: self.id.clone(),
			name: discovered.name.clone(),
			full_name: discovered.full_name.clone(),
			list_name: discovered.list_name.clone(),
			icon: discovered.icon.clone(),
			image: discovered.image.clone(),
			tooltip: discovered.tooltip.clone(),
			info: discovered.info.clone(),
			system_payload: discovered.system_payload.clone(),
			system_selected: true,
			user_selected: self.user_selected,
			is_preset: true,
		}
	}

	/// Pure recompute for a preset discovery no longer returns: kept in
	/// the list but hidden via the derived selection.
	pub fn vanished(&self) -> Action {
		Action { system_selected: false, ..self.clone() }
	}

	/// Effective selection, always derived:
	/// `false` when the system no longer offers the action, else the
	/// user's sticky choice, defaulting to selected.
	pub fn selected(&self) -> bool {
		if !self.system_selected {
			return false;
		}
		self.user_selected.unwrap_or(true)
	}

	/// Name used for alphabetical sorting and list lanes.
	pub fn display_name(&self) -> &str {
		self.list_name.as_deref().unwrap_or(&self.name)
	}

	/// Reduced persistence payload; everything else is rediscovered.
	pub fn to_delta(&self) -> ActionDelta {
		ActionDelta {
			id: self.id.clone(),
			is_preset: self.is_preset,
			user_selected: self.user_selected,
		}
	}
}

/// Per-action persisted state (entity scope only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDelta {
	pub id: String,
	pub is_preset: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub user_selected: Option<bool>,
}
