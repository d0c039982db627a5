use std::cell::RefCell;
use std::rc::Rc;

use rosterforge_core::{
    AssertMode, CategoryDef, Comparator, ConditionDef, ConstraintDef, ExtraConstraintDef,
    IncludeFlags, InfoDef, ListenerId, MaxCost, ModifierDef, ModifierOp, NodeDef, NodeId, Query,
    QueryHash, RepeatDef, RosterError, ScopeName,
};

use super::StateTree;
use crate::observer::NodeObserver;

fn hash(flags: &str, field: &str, child: &str) -> QueryHash {
    let flags = match flags {
        "s" => IncludeFlags::new(true, false),
        "f" => IncludeFlags::new(false, true),
        "sf" => IncludeFlags::new(true, true),
        _ => IncludeFlags::default(),
    };
    QueryHash::new(flags, field, Some(child))
}

fn bucket(tree: &StateTree, node: NodeId, flags: &str, field: &str, child: &str) -> f64 {
    tree.get_hash(node, &hash(flags, field, child)).unwrap()
}

fn roster_with_force() -> (StateTree, NodeId, NodeId) {
    let mut tree = StateTree::with_assert_mode(AssertMode::Full);
    let roster = tree.add_node(&NodeDef::roster("roster"), None, true).unwrap();
    let force = tree.add_node(&NodeDef::force("force"), Some(roster), true).unwrap();
    (tree, roster, force)
}

fn captain() -> NodeDef {
    NodeDef::unit("captain")
        .cost("pts", 80.0)
        .category_link(CategoryDef::primary("hq"))
}

#[derive(Clone, Default)]
struct Recorder(Rc<RefCell<Vec<String>>>);

impl Recorder {
    fn events(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

impl NodeObserver for Recorder {
    fn hidden_changed(&mut self, node: NodeId, hidden: bool, _was_hidden: bool) {
        self.0.borrow_mut().push(format!("hidden {node} {hidden}"));
    }

    fn category_added(&mut self, node: NodeId, category_id: &str) {
        self.0.borrow_mut().push(format!("category+ {node} {category_id}"));
    }

    fn constraints_changed(&mut self, node: NodeId) {
        self.0.borrow_mut().push(format!("constraints {node}"));
    }

    fn amount_changed(&mut self, node: NodeId, amount: f64) {
        self.0.borrow_mut().push(format!("amount {node} {amount}"));
    }
}

#[test]
fn test_unit_counts_flow_to_force_and_roster() {
    let (mut tree, roster, force) = roster_with_force();
    let unit = tree.add_node(&captain(), Some(force), true).unwrap();

    tree.set_selections(unit, 2.0).unwrap();

    assert_eq!(bucket(&tree, force, "", "selections", "captain"), 2.0);
    assert_eq!(bucket(&tree, force, "", "selections", "hq"), 2.0);
    assert_eq!(bucket(&tree, force, "s", "pts", "self"), 160.0);

    // Crossing the force keeps only force-recursive buckets.
    assert_eq!(bucket(&tree, roster, "", "selections", "captain"), 0.0);
    assert_eq!(bucket(&tree, roster, "f", "selections", "captain"), 2.0);
    assert_eq!(bucket(&tree, roster, "sf", "pts", "self"), 160.0);
    assert_eq!(bucket(&tree, roster, "", "forces", "force"), 1.0);

    assert_eq!(tree.node(unit).unwrap().total_cost("pts"), 160.0);
    assert_eq!(tree.node(force).unwrap().total_cost("pts"), 160.0);
    tree.check_invariants(unit).unwrap();
}

#[test]
fn test_nested_selections_multiply_through_entries() {
    let (mut tree, _, force) = roster_with_force();
    let unit = tree.add_node(&captain(), Some(force), true).unwrap();
    let upgrade = tree
        .add_node(&NodeDef::entry("upgrade").cost("pts", 5.0), Some(unit), true)
        .unwrap();

    tree.set_selections(upgrade, 1.0).unwrap();
    tree.set_selections(unit, 2.0).unwrap();

    assert_eq!(bucket(&tree, unit, "", "selections", "upgrade"), 1.0);
    assert_eq!(bucket(&tree, force, "", "selections", "upgrade"), 0.0);
    assert_eq!(bucket(&tree, force, "s", "selections", "upgrade"), 2.0);
    assert_eq!(bucket(&tree, force, "s", "pts", "self"), 170.0);
    // Upgrade costs also count under the unit's category.
    assert_eq!(bucket(&tree, force, "s", "pts", "hq"), 170.0);

    assert_eq!(tree.node(unit).unwrap().total_cost("pts"), 170.0);
    assert_eq!(tree.node(upgrade).unwrap().total_cost("pts"), 5.0);
}

#[test]
fn test_excluded_node_keeps_amount_but_propagates_zero() {
    let (mut tree, _, force) = roster_with_force();
    let unit = tree.add_node(&captain(), Some(force), true).unwrap();
    tree.set_selections(unit, 2.0).unwrap();

    tree.set_excluded(unit, true).unwrap();
    let state = tree.node(unit).unwrap();
    assert_eq!(state.amount(), 2.0);
    assert_eq!(state.propagate_amount(), 0.0);
    assert_eq!(bucket(&tree, force, "", "selections", "captain"), 0.0);

    tree.set_excluded(unit, false).unwrap();
    assert_eq!(bucket(&tree, force, "", "selections", "captain"), 2.0);
}

#[test]
fn test_membership_buckets_and_instance_conditions() {
    let (mut tree, _, force) = roster_with_force();
    let def = captain()
        .modifier(ModifierDef::new(ModifierOp::Set, "hidden", true).when(ConditionDef::instance_of("self", "hq")));
    let unit = tree.add_node(&def, Some(force), true).unwrap();

    assert_eq!(tree.get_hash(unit, &QueryHash::membership("hq")).unwrap(), 1.0);
    assert_eq!(tree.get_hash(unit, &QueryHash::membership("captain")).unwrap(), 1.0);
    assert!(tree.node(unit).unwrap().hidden());
}

#[test]
fn test_ancestor_instance_condition() {
    let (mut tree, _, force) = roster_with_force();
    let unit = tree.add_node(&captain(), Some(force), true).unwrap();
    let def = NodeDef::entry("banner").modifier(
        ModifierDef::new(ModifierOp::Set, "hidden", true)
            .when(ConditionDef::instance_of("ancestor", "hq")),
    );
    let banner = tree.add_node(&def, Some(unit), true).unwrap();
    assert!(tree.node(banner).unwrap().hidden());
}

#[test]
fn test_constraint_flips_notify_observer() {
    let (mut tree, _, force) = roster_with_force();
    let recorder = Recorder::default();
    tree.set_observer(recorder.clone());
    let limit = ConstraintDef::max("max-hq", 1.0).in_scope("self").with_child("hq");
    tree.add_constraints(force, &[limit]).unwrap();

    let a = tree.add_node(&captain(), Some(force), true).unwrap();
    let b = tree
        .add_node(&NodeDef::unit("chaplain").category_link(CategoryDef::primary("hq")), Some(force), true)
        .unwrap();
    tree.set_selections(a, 1.0).unwrap();
    assert!(tree.node(force).unwrap().errors().is_empty());

    recorder.clear();
    tree.set_selections(b, 1.0).unwrap();
    assert_eq!(tree.node(force).unwrap().errors(), vec!["max-hq"]);
    assert!(recorder.events().contains(&format!("constraints {force}")));
    assert!(recorder.events().contains(&format!("amount {b} 1")));
}

#[test]
fn test_disable_after_unannounced_move_reports_leak() {
    let (mut tree, roster, first) = roster_with_force();
    let second = tree.add_node(&NodeDef::force("allies"), Some(roster), true).unwrap();
    let def = NodeDef::unit("captain").constraint(ConstraintDef::max("max-1", 1.0));
    let unit = tree.add_node(&def, Some(first), true).unwrap();
    assert_eq!(tree.node(unit).unwrap().subscription_count(), 2);

    tree.reattach(unit, second).unwrap();
    let err = tree.disable(unit).unwrap_err();
    assert_eq!(err, RosterError::SubscriptionLeak { node: unit, count: 1 });

    // Strays were purged.
    let scope = tree.node(first).unwrap().scope().unwrap();
    assert!(scope
        .listener_table()
        .values()
        .flatten()
        .all(|s| s.owner() != Some(unit)));
    assert_eq!(tree.node(unit).unwrap().subscription_count(), 0);
}

#[test]
fn test_enable_disable_round_trip_leaves_no_listeners() {
    let (mut tree, _, force) = roster_with_force();
    let def = captain().constraint(ConstraintDef::max("max-1", 1.0));
    let unit = tree.add_node(&def, Some(force), true).unwrap();
    let before = tree.node(unit).unwrap().subscription_count();
    let force_listeners = tree.node(force).unwrap().scope().unwrap().listener_count();

    tree.disable(unit).unwrap();
    tree.disable(unit).unwrap();
    assert_eq!(tree.node(unit).unwrap().subscription_count(), 0);
    assert!(tree.node(force).unwrap().scope().unwrap().listener_count() < force_listeners);

    tree.enable(unit).unwrap();
    tree.enable(unit).unwrap();
    assert_eq!(tree.node(unit).unwrap().subscription_count(), before);
    assert_eq!(tree.node(force).unwrap().scope().unwrap().listener_count(), force_listeners);
}

#[test]
fn test_lifecycle_order_is_enforced() {
    let (mut tree, _, force) = roster_with_force();
    let unit = tree.add_node(&captain(), Some(force), true).unwrap();

    assert!(matches!(
        tree.disable(force),
        Err(RosterError::LifecycleOrder { node, .. }) if node == force
    ));

    tree.disable(unit).unwrap();
    tree.disable(force).unwrap();
    assert!(matches!(
        tree.enable(unit),
        Err(RosterError::LifecycleOrder { node, .. }) if node == unit
    ));
}

#[test]
fn test_add_under_disabled_parent_leaves_tree_untouched() {
    let (mut tree, roster, force) = roster_with_force();
    tree.disable(force).unwrap();
    let len = tree.len();

    let result = tree.add_node(&captain(), Some(force), true);

    assert!(matches!(
        result,
        Err(RosterError::LifecycleOrder { node, .. }) if node == force
    ));
    assert_eq!(tree.len(), len);
    assert!(tree.children(force).is_empty());
    assert_eq!(tree.root(), Some(roster));

    // Static children are still allowed.
    let plain = tree.add_node(&captain(), Some(force), false).unwrap();
    assert_eq!(tree.children(force), &[plain]);
}

#[test]
fn test_add_after_rejected_add_counts_normally() {
    let (mut tree, _, force) = roster_with_force();
    tree.disable(force).unwrap();
    assert!(tree.add_node(&captain(), Some(force), true).is_err());
    tree.enable(force).unwrap();

    let unit = tree.add_node(&captain(), Some(force), true).unwrap();
    tree.set_selections(unit, 1.0).unwrap();

    assert_eq!(tree.children(force), &[unit]);
    assert_eq!(bucket(&tree, force, "s", "pts", "self"), 80.0);
}

#[test]
fn test_leak_is_purged_quietly_with_checks_off() {
    let (mut tree, roster, first) = roster_with_force();
    tree.set_assert_mode(AssertMode::Off);
    let second = tree.add_node(&NodeDef::force("allies"), Some(roster), true).unwrap();
    let def = NodeDef::unit("captain").constraint(ConstraintDef::max("max-1", 1.0));
    let unit = tree.add_node(&def, Some(first), true).unwrap();

    tree.reattach(unit, second).unwrap();
    tree.disable(unit).unwrap();

    assert_eq!(tree.node(unit).unwrap().subscription_count(), 0);
    let scope = tree.node(first).unwrap().scope().unwrap();
    assert!(scope
        .listener_table()
        .values()
        .flatten()
        .all(|s| s.owner() != Some(unit)));
}

#[test]
fn test_set_parent_moves_contributions() {
    let (mut tree, roster, first) = roster_with_force();
    let second = tree.add_node(&NodeDef::force("allies"), Some(roster), true).unwrap();
    let def = captain().constraint(ConstraintDef::max("max-1", 1.0));
    let unit = tree.add_node(&def, Some(first), true).unwrap();
    tree.set_selections(unit, 2.0).unwrap();
    assert_eq!(tree.node(unit).unwrap().errors(), vec!["max-1"]);

    tree.set_parent(unit, second).unwrap();

    assert_eq!(bucket(&tree, first, "", "selections", "captain"), 0.0);
    assert_eq!(bucket(&tree, second, "", "selections", "captain"), 2.0);
    assert_eq!(bucket(&tree, roster, "f", "selections", "captain"), 2.0);
    // The constraint now reads the new parent.
    assert_eq!(tree.node(unit).unwrap().errors(), vec!["max-1"]);
    assert!(tree.node(unit).unwrap().is_enabled());
    tree.check_invariants(first).unwrap();
    tree.check_invariants(second).unwrap();

    tree.set_selections(unit, 1.0).unwrap();
    assert!(tree.node(unit).unwrap().errors().is_empty());
}

#[test]
fn test_set_parent_into_group_updates_filters() {
    let (mut tree, _, force) = roster_with_force();
    let unit = tree.add_node(&NodeDef::unit("squad"), Some(force), true).unwrap();
    let group = tree.add_node(&NodeDef::group("weapons"), Some(unit), true).unwrap();
    let gun = tree.add_node(&NodeDef::entry("gun"), Some(unit), true).unwrap();
    tree.set_selections(gun, 3.0).unwrap();
    assert_eq!(bucket(&tree, unit, "", "selections", "weapons"), 0.0);

    tree.set_parent(gun, group).unwrap();

    assert_eq!(bucket(&tree, unit, "", "selections", "weapons"), 3.0);
    assert_eq!(bucket(&tree, unit, "", "selections", "gun"), 3.0);
    assert_eq!(bucket(&tree, group, "", "selections", "gun"), 3.0);
    tree.check_invariants(gun).unwrap();
}

#[test]
fn test_set_parent_rejects_cycles() {
    let (mut tree, _, force) = roster_with_force();
    let unit = tree.add_node(&captain(), Some(force), true).unwrap();
    let child = tree.add_node(&NodeDef::entry("upgrade"), Some(unit), true).unwrap();
    assert!(matches!(
        tree.set_parent(unit, child),
        Err(RosterError::LifecycleOrder { .. })
    ));
}

#[test]
fn test_remove_node_retracts_and_invalidates_id() {
    let (mut tree, roster, force) = roster_with_force();
    let unit = tree.add_node(&captain(), Some(force), true).unwrap();
    let upgrade = tree
        .add_node(&NodeDef::entry("upgrade").cost("pts", 5.0), Some(unit), true)
        .unwrap();
    tree.set_selections(unit, 1.0).unwrap();
    tree.set_selections(upgrade, 1.0).unwrap();
    let len = tree.len();

    tree.remove_node(unit).unwrap();

    assert_eq!(tree.len(), len - 2);
    assert_eq!(bucket(&tree, force, "s", "pts", "self"), 0.0);
    assert_eq!(bucket(&tree, roster, "sf", "pts", "self"), 0.0);
    assert_eq!(tree.node(unit).unwrap_err(), RosterError::UnknownNode(unit));
    assert!(tree.children(force).is_empty());

    // Slot reuse bumps the generation.
    let again = tree.add_node(&captain(), Some(force), true).unwrap();
    assert_ne!(again, unit);
    assert!(!tree.contains(unit));
}

#[test]
fn test_external_listener_is_called_eagerly_and_coalesced() {
    let (mut tree, _, force) = roster_with_force();
    let unit = tree.add_node(&NodeDef::unit("captain"), Some(force), true).unwrap();
    let calls = Rc::new(RefCell::new(Vec::new()));
    let sink = calls.clone();
    let query = Query::new("self", "selections").with_child("captain");

    tree.listen(force, &query, ListenerId(1), move |new, old| {
        sink.borrow_mut().push((new, old));
    })
    .unwrap();
    assert_eq!(*calls.borrow(), vec![(0.0, 0.0)]);

    tree.update_multipliers(unit, 1.0, 1.0).unwrap();
    tree.update_multipliers(unit, 3.0, 3.0).unwrap();
    assert_eq!(tree.pending(), 1);
    tree.drain();
    assert_eq!(*calls.borrow(), vec![(0.0, 0.0), (3.0, 1.0)]);

    assert!(tree.unlisten(force, &query, ListenerId(1)).unwrap());
    tree.set_selections(unit, 0.0).unwrap();
    assert_eq!(calls.borrow().len(), 2);
}

#[test]
fn test_repeat_modifier_scales_unit_cost() {
    let (mut tree, _, force) = roster_with_force();
    let def = NodeDef::unit("squad").cost("pts", 10.0).modifier(
        ModifierDef::new(ModifierOp::Increment, "pts", 5.0).repeat(RepeatDef::new(
            Query::new("self", "selections").with_child("extra-model"),
            1.0,
            1,
        )),
    );
    let unit = tree.add_node(&def, Some(force), true).unwrap();
    let extra = tree.add_node(&NodeDef::entry("extra-model"), Some(unit), true).unwrap();
    tree.set_selections(unit, 1.0).unwrap();

    tree.set_selections(extra, 2.0).unwrap();

    let state = tree.node(unit).unwrap();
    assert_eq!(state.unit_costs()["pts"], 20.0);
    assert_eq!(state.total_cost("pts"), 20.0);
    assert_eq!(bucket(&tree, force, "s", "pts", "self"), 20.0);
    tree.check_invariants(extra).unwrap();
}

#[test]
fn test_category_modifier_moves_unit_between_categories() {
    let (mut tree, _, force) = roster_with_force();
    let recorder = Recorder::default();
    tree.set_observer(recorder.clone());
    let def = NodeDef::unit("sergeant")
        .category_link(CategoryDef::primary("troops"))
        .modifier(
            ModifierDef::new(ModifierOp::SetPrimary, "category", "hq").when(ConditionDef::new(
                Comparator::AtLeast,
                Query::new("self", "selections").with_child("promotion"),
                1.0,
            )),
        );
    let unit = tree.add_node(&def, Some(force), true).unwrap();
    let promotion = tree.add_node(&NodeDef::entry("promotion"), Some(unit), true).unwrap();
    tree.set_selections(unit, 1.0).unwrap();
    assert_eq!(bucket(&tree, force, "", "selections", "hq"), 0.0);

    tree.set_selections(promotion, 1.0).unwrap();

    let state = tree.node(unit).unwrap();
    assert_eq!(state.primary_category(), Some("hq"));
    assert_eq!(bucket(&tree, force, "", "selections", "hq"), 1.0);
    assert_eq!(bucket(&tree, force, "", "selections", "troops"), 1.0);
    assert_eq!(tree.get_hash(unit, &QueryHash::membership("hq")).unwrap(), 1.0);
    assert!(recorder.events().contains(&format!("category+ {unit} hq")));
    tree.check_invariants(promotion).unwrap();
}

#[test]
fn test_constraint_limit_modifier_follows_condition() {
    let (mut tree, _, force) = roster_with_force();
    let def = NodeDef::unit("squad")
        .constraint(ConstraintDef::max("max-1", 1.0))
        .modifier(
            ModifierDef::new(ModifierOp::Increment, "max-1", 2.0).when(ConditionDef::new(
                Comparator::AtLeast,
                Query::new("roster", "forces").recursive(false, true),
                2.0,
            )),
        );
    let unit = tree.add_node(&def, Some(force), true).unwrap();
    tree.set_selections(unit, 2.0).unwrap();
    assert_eq!(tree.node(unit).unwrap().errors(), vec!["max-1"]);

    let roster = tree.root().unwrap();
    tree.add_node(&NodeDef::force("allies"), Some(roster), true).unwrap();

    let state = tree.node(unit).unwrap();
    assert_eq!(state.constraints().next().unwrap().limit(), 3.0);
    assert!(state.errors().is_empty());
}

#[test]
fn test_max_costs_install_update_and_remove() {
    let (mut tree, roster, force) = roster_with_force();
    tree.set_max_costs(roster, &[MaxCost::new("pts", 100.0)]).unwrap();
    let unit = tree.add_node(&captain(), Some(force), true).unwrap();

    tree.set_selections(unit, 2.0).unwrap();
    assert_eq!(tree.node(roster).unwrap().errors(), vec!["max::pts::pts"]);

    tree.set_max_costs(roster, &[MaxCost::new("pts", 200.0)]).unwrap();
    assert!(tree.node(roster).unwrap().errors().is_empty());
    assert_eq!(
        tree.node(roster).unwrap().extra_constraint("max::pts::pts").unwrap().limit(),
        200.0
    );

    tree.set_max_costs(roster, &[MaxCost::new("pts", 100.0)]).unwrap();
    assert_eq!(tree.node(roster).unwrap().errors().len(), 1);

    let unbounded = MaxCost {
        value: None,
        ..MaxCost::new("pts", 0.0)
    };
    tree.set_max_costs(roster, &[unbounded]).unwrap();
    assert!(tree.node(roster).unwrap().errors().is_empty());
    assert!(tree.node(roster).unwrap().extra_constraint("max::pts::pts").is_none());
}

#[test]
fn test_toggling_limits_does_not_grow_primitives() {
    let (mut tree, roster, _) = roster_with_force();
    let subscriptions = tree.node(roster).unwrap().subscription_count();
    let unbounded = MaxCost {
        value: None,
        ..MaxCost::new("pts", 0.0)
    };
    for _ in 0..5 {
        tree.set_max_costs(roster, &[MaxCost::new("pts", 100.0)]).unwrap();
        assert_eq!(tree.node(roster).unwrap().reactive().constraints.len(), 1);
        tree.set_max_costs(roster, &[unbounded.clone()]).unwrap();
        assert!(tree.node(roster).unwrap().reactive().constraints.is_empty());
    }

    let self_selected = ConditionDef::new(Comparator::AtLeast, Query::new("self", "selections"), 1.0);
    let mut extra = ExtraConstraintDef::new("cap", "roster", ConstraintDef::max("cap", 3.0).in_scope("self"));
    extra.modifiers = vec![ModifierDef::new(ModifierOp::Increment, "cap", 1.0).when(self_selected)];
    for _ in 0..3 {
        tree.add_extra_constraints(roster, &[extra.clone()]).unwrap();
        let reactive = tree.node(roster).unwrap().reactive();
        assert_eq!(reactive.modifiers().len(), 1);
        assert_eq!(reactive.conditions().len(), 1);
        assert!(tree.remove_extra_constraint(roster, "cap").unwrap());
    }
    let reactive = tree.node(roster).unwrap().reactive();
    assert!(reactive.modifiers().is_empty());
    assert!(reactive.conditions().is_empty());
    assert_eq!(tree.node(roster).unwrap().subscription_count(), subscriptions);
}

#[test]
fn test_percent_constraint() {
    let (mut tree, roster, force) = roster_with_force();
    let share = ConstraintDef::max("hq-share", 50.0)
        .on_field("pts")
        .in_scope("self")
        .with_child("hq")
        .recursive(true, true)
        .percent();
    tree.add_constraints(roster, &[share]).unwrap();
    let hq = tree.add_node(&captain(), Some(force), true).unwrap();
    let troops = tree
        .add_node(&NodeDef::unit("guard").cost("pts", 60.0), Some(force), true)
        .unwrap();

    tree.set_selections(hq, 1.0).unwrap();
    tree.set_selections(troops, 1.0).unwrap();
    assert_eq!(tree.node(roster).unwrap().errors(), vec!["hq-share"]);

    tree.set_selections(troops, 2.0).unwrap();
    assert!(tree.node(roster).unwrap().errors().is_empty());
}

#[test]
fn test_unresolved_scope_stays_unsubscribed() {
    let (mut tree, _, force) = roster_with_force();
    let def = NodeDef::unit("squad").modifier(
        ModifierDef::new(ModifierOp::Set, "hidden", true).when(ConditionDef::new(
            Comparator::AtLeast,
            Query::new("primary-category", "selections"),
            1.0,
        )),
    );
    let unit = tree.add_node(&def, Some(force), true).unwrap();
    let state = tree.node(unit).unwrap();
    assert!(!state.hidden());
    // Only the node's own cost-type watch is registered.
    assert_eq!(state.subscription_count(), 1);
}

#[test]
fn test_find_resolves_scope_names() {
    let (mut tree, roster, force) = roster_with_force();
    let category = tree.add_node(&NodeDef::category("hq"), Some(force), true).unwrap();
    let unit = tree.add_node(&captain(), Some(category), true).unwrap();
    let group = tree.add_node(&NodeDef::group("wargear"), Some(unit), true).unwrap();
    let option = tree.add_node(&NodeDef::entry("sword").link_to("blade"), Some(group), true).unwrap();

    assert_eq!(tree.find(unit, &ScopeName::Parent, true), vec![force]);
    assert_eq!(tree.find(option, &ScopeName::Parent, true), vec![unit]);
    assert_eq!(tree.find(option, &ScopeName::Parent, false), vec![group]);
    assert_eq!(tree.find(option, &ScopeName::Force, true), vec![force]);
    assert_eq!(tree.find(force, &ScopeName::Force, true), vec![force]);
    assert_eq!(tree.find(unit, &ScopeName::PrimaryCategory, true), vec![category]);
    assert_eq!(tree.find(option, &ScopeName::Roster, true), vec![roster]);
    assert_eq!(tree.find(option, &ScopeName::Id("blade".into()), true), vec![option]);
    assert_eq!(tree.find(option, &ScopeName::Id("captain".into()), true), vec![unit]);
    assert!(tree.find(option, &ScopeName::Id("missing".into()), true).is_empty());
    assert_eq!(
        tree.find(option, &ScopeName::Ancestor, true),
        vec![group, unit, category, force, roster]
    );
}

#[test]
fn test_info_modifiers() {
    let (mut tree, _, force) = roster_with_force();
    let info = InfoDef::new("profile", "Captain")
        .characteristic("move", "6\"")
        .modifier(ModifierDef::new(ModifierOp::Set, "move", "8\"").when(ConditionDef::new(
            Comparator::AtLeast,
            Query::new("self", "selections").with_child("jump-pack"),
            1.0,
        )));
    let unit = tree.add_node(&captain().info(info), Some(force), true).unwrap();
    let pack = tree.add_node(&NodeDef::entry("jump-pack"), Some(unit), true).unwrap();
    assert_eq!(tree.node(unit).unwrap().info()[0].characteristic("move"), Some("6\""));

    tree.set_selections(pack, 1.0).unwrap();
    assert_eq!(tree.node(unit).unwrap().info()[0].characteristic("move"), Some("8\""));

    tree.add_extra_info(unit, &[InfoDef::new("note", "Warlord")]).unwrap();
    let state = tree.node(unit).unwrap();
    assert_eq!(state.info().len(), 2);
    assert!(state.info()[1].is_extra());
}

#[test]
fn test_non_reactive_nodes_hold_defaults_only() {
    let (mut tree, _, force) = roster_with_force();
    let unit = tree.add_node(&captain(), Some(force), false).unwrap();
    assert!(tree.node(unit).unwrap().scope().is_none());
    assert_eq!(tree.enable(unit), Err(RosterError::NotReactive(unit)));

    tree.set_selections(unit, 2.0).unwrap();
    assert_eq!(tree.node(unit).unwrap().amount(), 2.0);
    assert_eq!(bucket(&tree, force, "", "selections", "captain"), 0.0);
}

#[test]
fn test_dump_lists_buckets_and_constraints() {
    let (mut tree, _, force) = roster_with_force();
    let def = captain().constraint(ConstraintDef::max("max-1", 1.0));
    let unit = tree.add_node(&def, Some(force), true).unwrap();
    tree.set_selections(unit, 2.0).unwrap();

    let text = tree.dump(force).unwrap().to_string();
    assert!(text.contains("::selections::captain = 2"));
    let text = tree.dump(unit).unwrap().to_string();
    assert!(text.contains("max-1"));
    assert!(text.contains("VIOLATED"));
}
