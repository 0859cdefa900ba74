//! Top-level HUD session.
//!
//! One [`HudSession`] per host session owns everything: settings, the
//! registered discovery sources, the scheduler gate, the last committed
//! tree, and the registry snapshot the tree editor works against.
//! External change triggers enter through [`HudSession::on_trigger`];
//! user edits enter through the `submit_*`/`update_*` operations and
//! flow back out through the persistence adapter.
//!
//! The session is shared (`Arc`) so overlapping triggers can interleave
//! at their await points; the mutable state sits behind a mutex that is
//! never held across an await. The current build task has exclusive
//! ownership of the tree it is constructing; the committed tree is
//! only swapped under the lock, after the merge is complete.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use sigil_persist::{decode_lenient, PersistError, PersistKey, PersistStore};

use crate::discovery::{discover_all, ActionSource, DiscoveredGroup, EntityContext};
use crate::error::HudError;
use crate::node::{DisplaySettings, DisplayStyle, NestId, Node, NodeKind, NodeSeed};
use crate::notify::{Notice, NoticeQueue};
use crate::reconciler::{build_tree, HudTree, LayoutRecord};
use crate::registry::{ActionRegistry, EditedEntry};
use crate::scheduler::{Admission, BuildPermit, RebuildScheduler, SchedulerConfig};


/// Global HUD settings, updatable at runtime via
/// [`HudTrigger::SettingsChanged`].
#[derive(Debug, Clone, PartialEq)]
pub struct HudSettings {
	/// Master switch; a disabled HUD closes on the next trigger.
	pub enabled: bool,
	/// Global default for per-node alphabetical action sorting.
	pub sort_alphabetically: bool,
	pub debounce: Duration,
	pub wait_ceiling: Duration,
}

impl Default for HudSettings {
	fn default() -> Self {
		Self {
			enabled: true,
			sort_alphabetically: false,
			debounce: crate::scheduler::DEFAULT_DEBOUNCE,
			wait_ceiling: crate::scheduler::DEFAULT_WAIT_CEILING,
		}
	}
}

impl HudSettings {
	fn scheduler_config(&self) -> SchedulerConfig {
		SchedulerConfig {
			debounce: self.debounce,
			wait_ceiling: self.wait_ceiling,
		}
	}
}

/// Named change events consumed from the host.
#[derive(Debug, Clone)]
pub enum HudTrigger {
	/// The user selected a different entity (or none). `persist` marks
	/// the trigger persistence-worthy, e.g. a token-selection change
	/// that touched the same entity.
	SelectionChanged {
		entity: Option<EntityContext>,
		persist: bool,
	},
	/// A field of an entity's document changed.
	EntityUpdated { entity_id: String },
	/// Macro or compendium content changed.
	ContentChanged,
	SettingsChanged(HudSettings),
	ForceUpdate,
}

/// What became of one trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
	/// Build completed, tree committed and handed to the renderer.
	Rendered,
	/// Context no longer valid; display closed, previous tree kept.
	Closed,
	/// A newer trigger restarted the debounce window.
	Coalesced,
	/// The in-flight build outlived the wait ceiling.
	Abandoned,
	/// Trigger did not apply to the current context.
	Ignored,
}

/// Renderer seam. Markup, theming, and drag-and-drop live on the host
/// side of this boundary.
pub trait HudRenderer: Send + Sync {
	fn render(&self, tree: &HudTree);
	fn close(&self);
}

struct SessionState {
	settings: HudSettings,
	entity: Option<EntityContext>,
	tree: Option<HudTree>,
	/// Candidate universe snapshot from the last completed rebuild;
	/// what the tree editor resolves manual adds against.
	registry: ActionRegistry,
	persist_warned: bool,
	/// Session-only fallback layers for when the substrate is
	/// unreachable; refreshed from every committed build.
	cached_user_layout: Option<LayoutRecord>,
	cached_entity_layouts: FxHashMap<String, LayoutRecord>,
}

/// The HUD engine's root object; created on session start, dropped on
/// session end.
pub struct HudSession {
	user_id: String,
	store: Arc<dyn PersistStore>,
	renderer: Arc<dyn HudRenderer>,
	sources: Vec<Arc<dyn ActionSource>>,
	default_layout: Vec<NodeSeed>,
	custom_layout: Option<Vec<NodeSeed>>,
	notices: Arc<NoticeQueue>,
	/// One gate for the session's whole lifetime. Settings changes
	/// retune it in place; replacing it would orphan an in-flight
	/// build's slot and let a second build run concurrently.
	scheduler: RebuildScheduler,
	state: Mutex<SessionState>,
}

impl HudSession {
	pub fn new(
		user_id: impl Into<String>,
		store: Arc<dyn PersistStore>,
		renderer: Arc<dyn HudRenderer>,
	) -> Self {
		let settings = HudSettings::default();
		let scheduler = RebuildScheduler::new(settings.scheduler_config());
		Self {
			user_id: user_id.into(),
			store,
			renderer,
			sources: Vec::new(),
			default_layout: Vec::new(),
			custom_layout: None,
			notices: Arc::new(NoticeQueue::new()),
			scheduler,
			state: Mutex::new(SessionState {
				settings,
				entity: None,
				tree: None,
				registry: ActionRegistry::new(),
				persist_warned: false,
				cached_user_layout: None,
				cached_entity_layouts: FxHashMap::default(),
			}),
		}
	}

	/// Registers a discovery source. Sources run in registration order.
	pub fn with_source(mut self, source: Arc<dyn ActionSource>) -> Self {
		self.sources.push(source);
		self
	}

	/// Session default layout, produced fresh each session.
	pub fn with_default_layout(mut self, layout: Vec<NodeSeed>) -> Self {
		self.default_layout = layout;
		self
	}

	/// Optional world-shared custom layout; replaces the default as the
	/// seed when present. Read-only to the engine.
	pub fn with_custom_layout(mut self, layout: Vec<NodeSeed>) -> Self {
		self.custom_layout = Some(layout);
		self
	}

	pub fn with_settings(self, settings: HudSettings) -> Self {
		self.scheduler.set_config(settings.scheduler_config());
		self.state.lock().settings = settings;
		self
	}

	pub fn notices(&self) -> &Arc<NoticeQueue> {
		&self.notices
	}

	/// Snapshot of the last committed tree.
	pub fn tree(&self) -> Option<HudTree> {
		self.state.lock().tree.clone()
	}

	pub fn settings(&self) -> HudSettings {
		self.state.lock().settings.clone()
	}

	/// Feeds one external trigger through the scheduler gate and, if it
	/// wins a build slot, runs a full rebuild.
	pub async fn on_trigger(self: &Arc<Self>, trigger: HudTrigger) -> BuildOutcome {
		let Some(persist_worthy) = self.apply_trigger(trigger) else {
			return BuildOutcome::Ignored;
		};

		match self.scheduler.admit().await {
			Admission::Superseded => BuildOutcome::Coalesced,
			Admission::Abandoned => BuildOutcome::Abandoned,
			Admission::Admitted(permit) => {
				let outcome = self.run_build(persist_worthy).await;
				permit.finish();
				outcome
			}
		}
	}

	/// Applies a trigger's state changes and decides applicability.
	/// Returns whether the resulting build is persistence-worthy, or
	/// `None` for inapplicable triggers.
	fn apply_trigger(&self, trigger: HudTrigger) -> Option<bool> {
		let mut state = self.state.lock();
		let persist_worthy = match trigger {
			HudTrigger::SelectionChanged { entity, persist } => {
				state.entity = entity;
				persist
			}
			HudTrigger::EntityUpdated { entity_id } => {
				let applies = state
					.entity
					.as_ref()
					.is_some_and(|current| current.entity_id == entity_id);
				if !applies {
					tracing::debug!(%entity_id, "entity update for unselected entity, ignoring");
					return None;
				}
				true
			}
			HudTrigger::ContentChanged => false,
			HudTrigger::SettingsChanged(settings) => {
				self.scheduler.set_config(settings.scheduler_config());
				state.settings = settings;
				false
			}
			HudTrigger::ForceUpdate => false,
		};
		Some(persist_worthy)
	}

	async fn run_build(&self, persist_worthy: bool) -> BuildOutcome {
		let (ctx, global_sort) = {
			let state = self.state.lock();
			if !state.settings.enabled {
				drop(state);
				self.renderer.close();
				return BuildOutcome::Closed;
			}
			match &state.entity {
				Some(entity) => (entity.clone(), state.settings.sort_alphabetically),
				None => {
					drop(state);
					self.renderer.close();
					return BuildOutcome::Closed;
				}
			}
		};

		let user_layout = self.load_layer(PersistKey::user(&self.user_id)).await;
		let entity_layout = self.load_layer(PersistKey::entity(&ctx.entity_id)).await;
		let groups = discover_all(&self.sources, &ctx).await;

		let seed = self.custom_layout.as_deref().unwrap_or(&self.default_layout);
		let mut tree = build_tree(seed, user_layout.as_ref(), entity_layout.as_ref());
		let registry = populate_actions(&mut tree, &groups, global_sort);

		tree.deprioritize_empty_derived();
		tree.sort_siblings();
		tree.mark_selected_actions();

		if persist_worthy {
			self.save_layers(&ctx.entity_id, &tree).await;
		}

		// Commit, unless the context moved on while the build was in
		// flight; an abort leaves the previous rendered tree intact.
		{
			let mut state = self.state.lock();
			let still_valid = state.settings.enabled
				&& state
					.entity
					.as_ref()
					.is_some_and(|current| current.entity_id == ctx.entity_id);
			if !still_valid {
				drop(state);
				self.renderer.close();
				return BuildOutcome::Closed;
			}
			state.cached_user_layout = Some(tree.user_layout());
			state
				.cached_entity_layouts
				.insert(ctx.entity_id.clone(), tree.entity_layout());
			state.tree = Some(tree.clone());
			state.registry = registry;
		}

		self.renderer.render(&tree);
		BuildOutcome::Rendered
	}

	/// Loads one persisted layer, degrading to the session cache when
	/// the substrate is unavailable and to absent data when the payload
	/// is malformed.
	async fn load_layer(&self, key: PersistKey) -> Option<LayoutRecord> {
		if !self.store.available() {
			self.warn_persist_once();
			return self.cached_layer(&key);
		}
		match self.store.get_data(&key).await {
			Ok(Some(value)) => decode_lenient(key.scope.as_str(), value),
			Ok(None) => None,
			Err(PersistError::Unavailable { .. }) => {
				self.warn_persist_once();
				self.cached_layer(&key)
			}
			Err(err) => {
				tracing::warn!(scope = key.scope.as_str(), id = %key.id, %err, "layer load failed, using defaults");
				None
			}
		}
	}

	fn cached_layer(&self, key: &PersistKey) -> Option<LayoutRecord> {
		let state = self.state.lock();
		match key.scope {
			sigil_persist::Scope::User => state.cached_user_layout.clone(),
			sigil_persist::Scope::Entity => state.cached_entity_layouts.get(&key.id).cloned(),
		}
	}

	fn warn_persist_once(&self) {
		let mut state = self.state.lock();
		if !state.persist_warned {
			state.persist_warned = true;
			self.notices.push(Notice::warn(
				"No privileged peer present; HUD layout changes will not outlive this session",
			));
		}
	}

	/// Saves both layers. Failures are logged and surfaced, never
	/// retried; the in-memory tree stays the source of truth.
	async fn save_layers(&self, entity_id: &str, tree: &HudTree) {
		if !self.store.available() {
			self.warn_persist_once();
			return;
		}
		let saves = [
			(PersistKey::user(&self.user_id), tree.user_layout()),
			(PersistKey::entity(entity_id), tree.entity_layout()),
		];
		for (key, layout) in saves {
			let payload = match serde_json::to_value(&layout) {
				Ok(payload) => payload,
				Err(err) => {
					tracing::warn!(scope = key.scope.as_str(), %err, "layout encode failed");
					continue;
				}
			};
			if let Err(err) = self.store.save_data(&key, payload).await {
				tracing::warn!(scope = key.scope.as_str(), id = %key.id, %err, "layout save failed");
				self.notices
					.push(Notice::error(format!("Could not save HUD layout: {err}")));
			}
		}
	}

	/// Takes the build slot for an edit commit. An edit that mutated and
	/// saved while a rebuild was between its layer load and its layer
	/// save would be clobbered by the rebuild's stale payload; holding
	/// the slot serializes the two.
	async fn edit_permit(&self) -> Result<BuildPermit, HudError> {
		match self.scheduler.acquire_slot().await {
			Admission::Admitted(permit) => Ok(permit),
			Admission::Superseded | Admission::Abandoned => Err(HudError::Busy),
		}
	}

	/// Tree-editor submission for one node's action selection.
	pub async fn submit_action_edits(
		&self,
		nest: &NestId,
		edited: &[EditedEntry],
	) -> Result<(), HudError> {
		let _permit = self.edit_permit().await?;
		let (tree, entity_id) = {
			let mut state = self.state.lock();
			let Some(tree) = state.tree.as_ref() else {
				return Err(HudError::NoTree);
			};
			let mut next = tree.clone();
			let Some(node) = next.get_mut(nest) else {
				return Err(HudError::UnknownNode(nest.clone()));
			};
			state.registry.update_actions(edited, node);
			next.mark_selected_actions();
			state.tree = Some(next.clone());
			(next, state.entity.as_ref().map(|e| e.entity_id.clone()))
		};
		self.commit_edit(tree, entity_id).await
	}

	/// Tree-editor submission for one node's settings and name.
	pub async fn update_node(
		&self,
		nest: &NestId,
		settings: DisplaySettings,
		name: Option<String>,
	) -> Result<(), HudError> {
		let _permit = self.edit_permit().await?;
		let (tree, entity_id) = {
			let mut state = self.state.lock();
			let Some(tree) = state.tree.as_ref() else {
				return Err(HudError::NoTree);
			};
			let mut next = tree.clone();
			let Some(node) = next.get_mut(nest) else {
				return Err(HudError::UnknownNode(nest.clone()));
			};
			let style_changed = node.display.style != settings.style;
			node.display = settings;
			if let Some(name) = name {
				node.name = name;
			}
			if style_changed {
				next.relink_lane(nest);
			}
			next.sort_siblings();
			state.tree = Some(next.clone());
			(next, state.entity.as_ref().map(|e| e.entity_id.clone()))
		};
		self.commit_edit(tree, entity_id).await
	}

	/// Creates a user-defined group under an existing parent.
	pub async fn add_group(
		&self,
		parent: &NestId,
		id: &str,
		name: &str,
		style: DisplayStyle,
	) -> Result<NestId, HudError> {
		let _permit = self.edit_permit().await?;
		let nest = parent.child(id);
		let (tree, entity_id) = {
			let mut state = self.state.lock();
			let Some(tree) = state.tree.as_ref() else {
				return Err(HudError::NoTree);
			};
			if !tree.contains(parent) {
				return Err(HudError::UnknownNode(parent.clone()));
			}
			let mut next = tree.clone();
			let mut node = Node::new(nest.clone(), name, NodeKind::Custom);
			node.display.style = style;
			next.graft(node);
			state.tree = Some(next.clone());
			(next, state.entity.as_ref().map(|e| e.entity_id.clone()))
		};
		self.commit_edit(tree, entity_id).await?;
		Ok(nest)
	}

	async fn commit_edit(&self, tree: HudTree, entity_id: Option<String>) -> Result<(), HudError> {
		if let Some(entity_id) = entity_id {
			self.save_layers(&entity_id, &tree).await;
		}
		self.renderer.render(&tree);
		Ok(())
	}

	/// Destroys the per-entity overlay (the entity's data was reset)
	/// and rebuilds from defaults.
	pub async fn reset_entity_layer(self: &Arc<Self>, entity_id: &str) -> Result<BuildOutcome, HudError> {
		if self.store.available() {
			self.store
				.delete_data(&PersistKey::entity(entity_id))
				.await?;
		}
		self.state.lock().cached_entity_layouts.remove(entity_id);
		Ok(self.on_trigger(HudTrigger::ForceUpdate).await)
	}
}

/// Feeds this rebuild's discoveries into the tree: creates missing
/// derived nodes, reconciles each covered node's actions, then runs
/// the vanish rule over uncovered nodes that still hold presets.
fn populate_actions(
	tree: &mut HudTree,
	groups: &[DiscoveredGroup],
	global_sort: bool,
) -> ActionRegistry {
	let mut registry = ActionRegistry::new();
	let mut covered: Vec<NestId> = Vec::with_capacity(groups.len());

	for group in groups {
		if !tree.contains(&group.nest) {
			let parent_exists = group
				.nest
				.parent()
				.is_some_and(|parent| tree.contains(&parent));
			if !parent_exists {
				tracing::debug!(nest = %group.nest, "discovered group has no anchor, candidates only");
				registry.register(group.actions.iter());
				continue;
			}
			let mut node = Node::new(group.nest.clone(), group.name.clone(), NodeKind::SystemDerived);
			node.display.style = DisplayStyle::List;
			tree.graft(node);
		}
		let node = tree.get_mut(&group.nest).expect("grafted or pre-existing");
		registry.add_actions(&group.actions, node, global_sort);
		covered.push(group.nest.clone());
	}

	for nest in tree.nest_ids() {
		if covered.contains(&nest) {
			continue;
		}
		let node = tree.get_mut(&nest).expect("listed above");
		if !node.actions.is_empty() {
			registry.add_actions(&[], node, global_sort);
		}
	}

	registry
}
