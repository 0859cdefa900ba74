//! Rebuild-scoped candidate action universe and selection
//! reconciliation.
//!
//! The registry is discarded and rebuilt every rebuild cycle; it is the
//! authoritative source the tree's resident actions are refreshed from.
//! Two rules carry all the user-trust weight here:
//!
//! - a user's explicit deselection is never forgotten while the action
//!   keeps being discovered, and
//! - reconciliation never deletes a persisted preset outright; a
//!   future rebuild may rediscover it and needs its history.

use rustc_hash::FxHashMap;

use crate::action::{Action, DiscoveredAction};
use crate::node::Node;


/// One entry of an edited selection list submitted by the tree editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditedEntry {
	pub id: String,
	/// Display name for entries with no live candidate (manual adds).
	pub name: Option<String>,
}

impl EditedEntry {
	pub fn new(id: impl Into<String>) -> Self {
		Self { id: id.into(), name: None }
	}
}

/// The full discovered candidate universe for one rebuild.
#[derive(Debug, Default)]
pub struct ActionRegistry {
	available: FxHashMap<String, DiscoveredAction>,
}

impl ActionRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		self.available.len()
	}

	pub fn is_empty(&self) -> bool {
		self.available.is_empty()
	}

	pub fn candidate(&self, id: &str) -> Option<&DiscoveredAction> {
		self.available.get(id)
	}

	/// Merges candidates into the universe. First writer per id wins:
	/// an already-known action's canonical definition is never
	/// overwritten within one rebuild.
	pub fn register<'a>(&mut self, discovered: impl IntoIterator<Item = &'a DiscoveredAction>) {
		for action in discovered {
			self.available
				.entry(action.id.clone())
				.or_insert_with(|| action.clone());
		}
	}

	/// Reconciles a node's resident actions with this rebuild's
	/// discoveries for that node.
	///
	/// Existing actions keep their position; same-id discoveries
	/// refresh their definition and re-mark them presets. Presets no
	/// longer discovered are kept but system-deselected, unless the
	/// user explicitly selected them, in which case they stay visible
	/// untouched so the user notices and can deselect. New discoveries
	/// append as presets. `global_sort` is the settings default the
	/// node's own `sort_alphabetically` may override.
	pub fn add_actions(
		&mut self,
		discovered: &[DiscoveredAction],
		node: &mut Node,
		global_sort: bool,
	) {
		self.register(discovered.iter());

		let incoming: FxHashMap<&str, &DiscoveredAction> =
			discovered.iter().map(|action| (action.id.as_str(), action)).collect();

		let mut next: Vec<Action> = node
			.actions
			.iter()
			.map(|existing| match incoming.get(existing.id.as_str()) {
				Some(found) => existing.refreshed_from(found),
				None => {
					let kept_by_user = existing.user_selected == Some(true);
					if existing.is_preset && !kept_by_user {
						existing.vanished()
					} else {
						existing.clone()
					}
				}
			})
			.collect();

		for action in discovered {
			if !next.iter().any(|resident| resident.id == action.id) {
				next.push(Action::from_discovered(action));
			}
		}

		if node.display.sort_alphabetically.unwrap_or(global_sort) {
			next.sort_by(|a, b| {
				a.display_name()
					.to_lowercase()
					.cmp(&b.display_name().to_lowercase())
			});
		}

		node.actions = next;
	}

	/// Applies an edited selection list submitted by the tree editor.
	///
	/// Entries matching a resident action select and reorder it;
	/// entries matching only a registry candidate become manual adds.
	/// Resident presets missing from the edited list are deselected but
	/// kept; manual adds missing from the list are the one thing the
	/// user genuinely deleted, and go away.
	pub fn update_actions(&self, edited: &[EditedEntry], node: &mut Node) {
		let mut next: Vec<Action> = Vec::with_capacity(edited.len());

		for entry in edited {
			if let Some(existing) = node.actions.iter().find(|action| action.id == entry.id) {
				let mut action = existing.clone();
				action.user_selected = Some(true);
				next.push(action);
			} else if let Some(candidate) = self.candidate(&entry.id) {
				let mut action = Action::from_discovered(candidate);
				action.user_selected = Some(true);
				action.is_preset = false;
				next.push(action);
			} else {
				let name = entry.name.clone().unwrap_or_else(|| entry.id.clone());
				let mut action = Action::from_discovered(&DiscoveredAction::new(entry.id.clone(), name));
				action.user_selected = Some(true);
				action.is_preset = false;
				next.push(action);
			}
		}

		for existing in &node.actions {
			let in_edit = edited.iter().any(|entry| entry.id == existing.id);
			if !in_edit && existing.is_preset {
				let mut action = existing.clone();
				action.user_selected = Some(false);
				next.push(action);
			}
		}

		node.actions = next;
	}
}
