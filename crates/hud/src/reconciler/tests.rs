use pretty_assertions::assert_eq;

use super::*;
use crate::action::{Action, ActionDelta, DiscoveredAction};
use crate::node::DisplaySettings;

fn seed_combat() -> Vec<NodeSeed> {
	vec![
		NodeSeed::root("combat", "Combat"),
		NodeSeed::root("utility", "Utility").with_order(1),
	]
}

fn record(nest: NestId, kind: NodeKind) -> NodeRecord {
	NodeRecord {
		id: nest.leaf().to_string(),
		name: Some(nest.leaf().to_string()),
		list_name: None,
		level: nest.level(),
		nest_id: nest,
		order: 0,
		selected: true,
		settings: DisplaySettings::default(),
		kind,
		actions: None,
	}
}

#[test]
fn test_seed_only_build() {
	let tree = build_tree(&seed_combat(), None, None);
	assert_eq!(tree.len(), 2);
	assert_eq!(tree.roots().len(), 2);
	assert_eq!(tree.roots()[0], NestId::root("combat"));
	assert!(tree.get(&NestId::root("utility")).is_some());
}

#[test]
fn test_user_layer_grafts_into_list_lane() {
	// Spec scenario: seed has root "combat" with no children; the user
	// layer adds "combat_spells" (Custom) with one selected action.
	let spells = NestId::root("combat").child("spells");
	let mut spells_record = record(spells.clone(), NodeKind::Custom);
	spells_record.settings.style = DisplayStyle::List;
	spells_record.actions = Some(vec![ActionDelta {
		id: "fireball".into(),
		is_preset: true,
		user_selected: Some(true),
	}]);
	let user = LayoutRecord { nodes: vec![spells_record] };

	let tree = build_tree(&seed_combat(), Some(&user), None);

	let combat = tree.get(&NestId::root("combat")).unwrap();
	assert_eq!(combat.lists, vec![spells.clone()]);
	assert!(combat.tabs.is_empty());

	let node = tree.get(&spells).unwrap();
	assert_eq!(node.level, 2);
	assert_eq!(node.kind, NodeKind::Custom);
	assert_eq!(node.actions.len(), 1);
	let fireball = &node.actions[0];
	assert_eq!(fireball.id, "fireball");
	assert_eq!(fireball.user_selected, Some(true));
	assert!(fireball.selected());
}

#[test]
fn test_orphaned_user_node_is_pruned_without_error() {
	let orphan = NestId::root("missing").child("child");
	let user = LayoutRecord { nodes: vec![record(orphan.clone(), NodeKind::Custom)] };

	let tree = build_tree(&seed_combat(), Some(&user), None);
	assert!(!tree.contains(&orphan));
	assert_eq!(tree.len(), 2);
}

#[test]
fn test_build_is_idempotent() {
	let spells = NestId::root("combat").child("spells");
	let user = LayoutRecord { nodes: vec![record(spells.clone(), NodeKind::Custom)] };
	let entity = LayoutRecord {
		nodes: vec![NodeRecord {
			actions: Some(vec![ActionDelta { id: "a1".into(), is_preset: true, user_selected: Some(false) }]),
			..record(NestId::root("combat").child("derived"), NodeKind::SystemDerived)
		}],
	};

	let first = build_tree(&seed_combat(), Some(&user), Some(&entity));
	let second = build_tree(&seed_combat(), Some(&user), Some(&entity));

	assert_eq!(first.nest_ids(), second.nest_ids());
	for nest in first.nest_ids() {
		let a = first.get(&nest).unwrap();
		let b = second.get(&nest).unwrap();
		assert_eq!(a.selected, b.selected, "selected differs at {nest}");
		assert_eq!(a.order, b.order, "order differs at {nest}");
		assert_eq!(a, b);
	}
}

#[test]
fn test_entity_overlay_merges_instead_of_replacing() {
	let spells = NestId::root("combat").child("spells");
	let mut user_record = record(spells.clone(), NodeKind::Custom);
	user_record.order = 5;
	user_record.name = Some("Spellbook".into());
	let user = LayoutRecord { nodes: vec![user_record] };

	// Entity record for the same path: its deltas must merge into the
	// grafted node, its scalar state must not clobber the user's.
	let mut entity_record = record(spells.clone(), NodeKind::SystemDerived);
	entity_record.order = 42;
	entity_record.actions = Some(vec![ActionDelta {
		id: "fireball".into(),
		is_preset: true,
		user_selected: Some(false),
	}]);
	let entity = LayoutRecord { nodes: vec![entity_record] };

	let tree = build_tree(&seed_combat(), Some(&user), Some(&entity));
	let node = tree.get(&spells).unwrap();
	assert_eq!(node.name, "Spellbook");
	assert_eq!(node.order, 5);
	assert_eq!(node.kind, NodeKind::Custom);
	assert_eq!(node.actions.len(), 1);
	assert_eq!(node.actions[0].user_selected, Some(false));
}

#[test]
fn test_entity_layer_creates_only_derived_nodes() {
	let derived = NestId::root("combat").child("derived");
	let custom = NestId::root("combat").child("sneaky");
	let entity = LayoutRecord {
		nodes: vec![
			record(derived.clone(), NodeKind::SystemDerived),
			record(custom.clone(), NodeKind::Custom),
		],
	};

	let tree = build_tree(&seed_combat(), None, Some(&entity));
	assert!(tree.contains(&derived));
	assert!(!tree.contains(&custom));
}

#[test]
fn test_style_change_relinks_lane() {
	let spells = NestId::root("combat").child("spells");
	let mut tab_record = record(spells.clone(), NodeKind::Custom);
	tab_record.settings.style = DisplayStyle::Tab;
	let user_a = LayoutRecord { nodes: vec![tab_record.clone()] };
	let tree = build_tree(&seed_combat(), Some(&user_a), None);
	assert_eq!(tree.get(&NestId::root("combat")).unwrap().tabs, vec![spells.clone()]);

	// Same node persisted again with the list style: one lane only.
	let mut list_record = tab_record;
	list_record.settings.style = DisplayStyle::List;
	let user_b = LayoutRecord { nodes: vec![list_record] };
	let tree = build_tree(&seed_combat(), Some(&user_b), None);
	let combat = tree.get(&NestId::root("combat")).unwrap();
	assert!(combat.tabs.is_empty());
	assert_eq!(combat.lists, vec![spells]);
}

#[test]
fn test_sibling_order_is_stable_sort_key() {
	let seeds = vec![
		NodeSeed::root("z", "Z").with_order(2),
		NodeSeed::root("a", "A").with_order(1),
		NodeSeed::root("m", "M").with_order(1),
	];
	let tree = build_tree(&seeds, None, None);
	// Equal orders keep insertion order: a before m.
	assert_eq!(
		tree.roots(),
		&[NestId::root("a"), NestId::root("m"), NestId::root("z")]
	);
}

#[test]
fn test_mark_selected_actions_cascades_to_ancestors() {
	let spells = NestId::root("combat").child("spells");
	let mut user_record = record(spells.clone(), NodeKind::Custom);
	user_record.settings.style = DisplayStyle::List;
	let user = LayoutRecord { nodes: vec![user_record] };
	let mut tree = build_tree(&seed_combat(), Some(&user), None);

	tree.get_mut(&spells)
		.unwrap()
		.actions
		.push(Action::from_discovered(&DiscoveredAction::new("fireball", "Fireball")));
	tree.mark_selected_actions();

	assert!(tree.get(&spells).unwrap().has_selected_actions);
	assert!(tree.get(&NestId::root("combat")).unwrap().has_selected_actions);
	assert!(!tree.get(&NestId::root("utility")).unwrap().has_selected_actions);
}

#[test]
fn test_deprioritize_empty_derived_never_deletes() {
	let derived = NestId::root("combat").child("derived");
	let mut entity_record = record(derived.clone(), NodeKind::SystemDerived);
	entity_record.actions = Some(vec![ActionDelta {
		id: "gone".into(),
		is_preset: true,
		user_selected: None,
	}]);
	let entity = LayoutRecord { nodes: vec![entity_record] };

	let mut tree = build_tree(&seed_combat(), None, Some(&entity));
	// Simulate the registry outcome for an undiscovered preset.
	let node = tree.get_mut(&derived).unwrap();
	node.actions[0] = node.actions[0].vanished();
	tree.deprioritize_empty_derived();

	let node = tree.get(&derived).unwrap();
	assert!(!node.selected);
	assert_eq!(node.order, crate::node::DEPRIORITIZED_ORDER);
	assert_eq!(node.actions.len(), 1);
}

#[test]
fn test_layout_exports() {
	let derived = NestId::root("combat").child("derived");
	let mut entity_record = record(derived.clone(), NodeKind::SystemDerived);
	entity_record.actions = Some(vec![ActionDelta {
		id: "a1".into(),
		is_preset: true,
		user_selected: None,
	}]);
	let entity = LayoutRecord { nodes: vec![entity_record] };
	let tree = build_tree(&seed_combat(), None, Some(&entity));

	let user_layout = tree.user_layout();
	assert_eq!(user_layout.nodes.len(), 2);
	assert!(user_layout.nodes.iter().all(|record| record.actions.is_none()));

	let entity_layout = tree.entity_layout();
	assert_eq!(entity_layout.nodes.len(), 1);
	assert_eq!(entity_layout.nodes[0].nest_id, derived);
	assert_eq!(entity_layout.nodes[0].actions.as_ref().unwrap().len(), 1);
}

#[test]
fn test_user_layout_excludes_derived_nodes() {
	// Derived groups are per-entity state; letting them into the user
	// payload would graft one entity's groups into every other entity's
	// tree on later builds.
	let derived = NestId::root("combat").child("maneuvers");
	let entity = LayoutRecord { nodes: vec![record(derived.clone(), NodeKind::SystemDerived)] };
	let tree = build_tree(&seed_combat(), None, Some(&entity));
	assert!(tree.contains(&derived));

	let user_layout = tree.user_layout();
	assert!(user_layout.nodes.iter().all(|r| r.kind != NodeKind::SystemDerived));
	assert!(user_layout.nodes.iter().all(|r| r.nest_id != derived));

	let entity_layout = tree.entity_layout();
	assert!(entity_layout.nodes.iter().any(|r| r.nest_id == derived));
}
