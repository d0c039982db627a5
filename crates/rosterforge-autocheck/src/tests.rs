use rosterforge_config::AutoCheckConfig;
use rosterforge_core::{CategoryDef, ConstraintDef, NodeDef, NodeId};
use rosterforge_scope::StateTree;
use rosterforge_test::fixtures::{group, limited_option, option};
use rosterforge_test::TreeBuilder;

use crate::{Association, AutoChecker};

fn amount(tree: &StateTree, node: NodeId) -> f64 {
    tree.node(node).unwrap().amount()
}

/// A selected unit to hang groups and options on.
fn squad() -> (TreeBuilder, NodeId) {
    let mut builder = TreeBuilder::new();
    let unit = builder.selected_unit(NodeDef::unit("squad"));
    (builder, unit)
}

#[test]
fn test_group_minimum_prefers_default_then_shallow_options() {
    let (mut builder, unit) = squad();
    let loadout = builder.add(group("loadout", 2.0, -1.0).default_option("default"), unit);
    let default = builder.add(option("default", 5.0), loadout);
    let shallow = builder.add(option("shallow", 5.0), loadout);
    let nested = builder.add(NodeDef::group("more"), loadout);
    let deep = builder.add(option("deep", 5.0), nested);
    let (mut tree, _, _) = builder.build();

    let checker = AutoChecker::default();
    let report = checker.run(&mut tree, unit).unwrap();

    assert_eq!(report.changed, vec![default, shallow]);
    assert!(report.warnings.is_empty());
    assert_eq!(amount(&tree, default), 1.0);
    assert_eq!(amount(&tree, shallow), 1.0);
    assert_eq!(amount(&tree, deep), 0.0);
    assert!(tree.node(loadout).unwrap().errors().is_empty());

    // Minimum already met: nothing to do.
    let again = checker.run(&mut tree, unit).unwrap();
    assert!(again.is_empty());
    assert_eq!(amount(&tree, default), 1.0);
    assert_eq!(amount(&tree, shallow), 1.0);
}

#[test]
fn test_fill_respects_option_maximum_across_passes() {
    let (mut builder, unit) = squad();
    let models = builder.add(group("models", 3.0, -1.0), unit);
    let sergeant = builder.add(limited_option("sergeant", 10.0, 1.0), models);
    let trooper = builder.add(option("trooper", 8.0), models);
    let (mut tree, _, _) = builder.build();

    let report = AutoChecker::default().run(&mut tree, unit).unwrap();

    assert_eq!(report.changed, vec![sergeant, trooper]);
    assert_eq!(amount(&tree, sergeant), 1.0);
    assert_eq!(amount(&tree, trooper), 2.0);
    assert_eq!(tree.node(unit).unwrap().total_cost("pts"), 26.0);
}

#[test]
fn test_fill_spreads_units_round_robin() {
    let (mut builder, unit) = squad();
    let crew = builder.add(group("crew", 3.0, -1.0), unit);
    let gunner = builder.add(option("gunner", 4.0), crew);
    let loader = builder.add(option("loader", 2.0), crew);
    let (mut tree, _, _) = builder.build();

    let report = AutoChecker::default().run(&mut tree, unit).unwrap();

    assert_eq!(report.changed, vec![gunner, loader]);
    assert_eq!(amount(&tree, gunner), 2.0);
    assert_eq!(amount(&tree, loader), 1.0);
    assert_eq!(tree.node(unit).unwrap().total_cost("pts"), 10.0);
}

#[test]
fn test_unfillable_group_and_missing_default_warn() {
    let (mut builder, unit) = squad();
    let pair = builder.add(group("pair", 2.0, -1.0).default_option("ghost"), unit);
    let only = builder.add(limited_option("only", 0.0, 1.0), pair);
    let (mut tree, _, _) = builder.build();

    let report = AutoChecker::default().run(&mut tree, unit).unwrap();

    assert_eq!(amount(&tree, only), 1.0);
    assert_eq!(report.warnings.len(), 2);
    assert!(report.warnings[0].contains("ghost"));
    assert!(report.warnings[1].contains("1 of 2"));
    assert_eq!(tree.node(pair).unwrap().errors(), vec!["pair-min"]);
}

#[test]
fn test_entries_raised_to_minimum_and_zero_max_short_circuits() {
    let (mut builder, unit) = squad();
    let recruits = builder.add(
        NodeDef::entry("recruit").constraint(ConstraintDef::min("recruit-min", 2.0)),
        unit,
    );
    let banned = builder.add(
        NodeDef::entry("banned")
            .constraint(ConstraintDef::min("banned-min", 1.0))
            .constraint(ConstraintDef::max("banned-max", 0.0)),
        unit,
    );
    let (mut tree, _, _) = builder.build();

    let report = AutoChecker::default().run(&mut tree, unit).unwrap();

    assert_eq!(report.changed, vec![recruits]);
    assert_eq!(amount(&tree, recruits), 2.0);
    assert_eq!(amount(&tree, banned), 0.0);
}

#[test]
fn test_units_are_ignored_unless_checklist() {
    let mut builder = TreeBuilder::new();
    let hero = builder.unit(NodeDef::unit("hero").constraint(ConstraintDef::min("hero-min", 1.0)));
    let standard = builder.unit(
        NodeDef::unit("standard")
            .checklist()
            .constraint(ConstraintDef::min("standard-min", 1.0)),
    );
    let (mut tree, _, force) = builder.build();

    let report = AutoChecker::default().run(&mut tree, force).unwrap();

    assert_eq!(report.changed, vec![standard]);
    assert_eq!(amount(&tree, hero), 0.0);
    assert_eq!(amount(&tree, standard), 1.0);
}

#[test]
fn test_newly_selected_options_populate_their_children() {
    let (mut builder, unit) = squad();
    let weapons = builder.add(group("weapons", 1.0, -1.0), unit);
    let combi = builder.add(option("combi", 10.0), weapons);
    let ammo = builder.add(group("ammo", 1.0, -1.0), combi);
    let bolts = builder.add(option("bolts", 1.0), ammo);
    let (mut tree, _, _) = builder.build();

    let report = AutoChecker::default().run(&mut tree, unit).unwrap();

    assert_eq!(report.changed, vec![combi, bolts]);
    assert_eq!(amount(&tree, bolts), 1.0);
    assert_eq!(tree.node(unit).unwrap().total_cost("pts"), 11.0);
}

#[test]
fn test_hidden_options_are_skipped_by_default() {
    let build = || {
        let (mut builder, unit) = squad();
        let relic = builder.add(group("relic", 1.0, -1.0), unit);
        let secret = builder.add(option("secret", 0.0).hidden(true), relic);
        let plain = builder.add(option("plain", 0.0), relic);
        (builder.build().0, unit, secret, plain)
    };

    let (mut tree, unit, secret, plain) = build();
    AutoChecker::default().run(&mut tree, unit).unwrap();
    assert_eq!(amount(&tree, secret), 0.0);
    assert_eq!(amount(&tree, plain), 1.0);

    let (mut tree, unit, secret, plain) = build();
    let checker = AutoChecker::new(AutoCheckConfig::default().with_skip_hidden(false));
    checker.run(&mut tree, unit).unwrap();
    assert_eq!(amount(&tree, secret), 1.0);
    assert_eq!(amount(&tree, plain), 0.0);
}

#[test]
fn test_skipped_while_loading_or_disabled() {
    let (mut builder, unit) = squad();
    let weapons = builder.add(group("weapons", 1.0, -1.0), unit);
    let knife = builder.add(option("knife", 0.0), weapons);
    let (mut tree, _, _) = builder.build();

    let disabled = AutoChecker::new(AutoCheckConfig::disabled());
    assert!(disabled.run(&mut tree, unit).unwrap().is_empty());

    tree.set_loading(true);
    let checker = AutoChecker::default();
    assert!(checker.run(&mut tree, unit).unwrap().is_empty());
    assert_eq!(amount(&tree, knife), 0.0);

    tree.set_loading(false);
    assert_eq!(checker.run(&mut tree, unit).unwrap().changed, vec![knife]);
}

#[test]
fn test_check_removes_other_option_of_single_choice_group() {
    let (mut builder, unit) = squad();
    let special = builder.add(group("special", 0.0, 1.0), unit);
    let plasma = builder.add(option("plasma", 15.0), special);
    let melta = builder.add(option("melta", 10.0), special);
    let (mut tree, _, _) = builder.build();
    let checker = AutoChecker::default();

    let first = checker.check(&mut tree, plasma, 1.0).unwrap();
    assert_eq!(first.changed, vec![plasma]);
    assert!(first.removed.is_empty());

    let second = checker.check(&mut tree, melta, 1.0).unwrap();
    assert_eq!(second.changed, vec![melta]);
    assert_eq!(second.removed, vec![plasma]);
    assert_eq!(amount(&tree, plasma), 0.0);
    assert_eq!(amount(&tree, melta), 1.0);
    assert!(tree.node(special).unwrap().errors().is_empty());
    assert_eq!(tree.node(unit).unwrap().total_cost("pts"), 10.0);
}

#[test]
fn test_remove_others_keeps_same_selector() {
    let (mut builder, unit) = squad();
    let special = builder.add(group("special", 0.0, 1.0), unit);
    let first = builder.add(option("plasma", 15.0), special);
    let second = builder.add(option("plasma-copy", 15.0).link_to("plasma"), special);
    let (mut tree, _, _) = builder.build();
    let checker = AutoChecker::default();

    checker.check(&mut tree, first, 1.0).unwrap();
    let report = checker.check(&mut tree, second, 1.0).unwrap();
    assert!(report.removed.is_empty());
    assert_eq!(amount(&tree, first), 1.0);
}

#[test]
fn test_remove_others_touches_units_only_when_allowed() {
    let hq_limit = || {
        ConstraintDef::max("hq-max", 1.0)
            .in_scope("force")
            .with_child("hq")
    };
    let build = || {
        let mut builder = TreeBuilder::new();
        let captain = builder.selected_unit(
            NodeDef::unit("captain")
                .category_link(CategoryDef::primary("hq"))
                .constraint(hq_limit()),
        );
        let lord = builder.unit(
            NodeDef::unit("lord")
                .category_link(CategoryDef::primary("hq"))
                .constraint(hq_limit()),
        );
        (builder.build().0, captain, lord)
    };

    let (mut tree, captain, lord) = build();
    let report = AutoChecker::default().check(&mut tree, lord, 1.0).unwrap();
    assert!(report.removed.is_empty());
    assert_eq!(amount(&tree, captain), 1.0);

    let (mut tree, captain, lord) = build();
    let checker = AutoChecker::new(AutoCheckConfig::default().with_allow_remove_units(true));
    let report = checker.check(&mut tree, lord, 1.0).unwrap();
    assert_eq!(report.removed, vec![captain]);
    assert_eq!(amount(&tree, captain), 0.0);
    assert_eq!(amount(&tree, lord), 1.0);
}

#[test]
fn test_associate_only_considers_visible_candidates() {
    let mut builder = TreeBuilder::new();
    let visible = builder.selected_unit(NodeDef::unit("guard"));
    let hidden = builder.selected_unit(NodeDef::unit("phantom").hidden(true));
    let (tree, _, _) = builder.build();

    let mut link = Association::new("bodyguard", 1, Some(1));
    let report = AutoChecker::default()
        .associate(&tree, &mut link, &[visible, hidden])
        .unwrap();
    assert_eq!(report.changed, vec![visible]);
    assert_eq!(link.selected(), &[visible]);
}

#[tokio::test]
async fn test_async_walk_matches_sync_walk() {
    let build = || {
        let (mut builder, unit) = squad();
        let loadout = builder.add(group("loadout", 2.0, -1.0), unit);
        builder.add(option("a", 1.0), loadout);
        builder.add(limited_option("b", 2.0, 1.0), loadout);
        let extras = builder.add(group("extras", 1.0, -1.0), unit);
        let kit = builder.add(option("kit", 3.0), extras);
        let inner = builder.add(group("inner", 1.0, -1.0), kit);
        builder.add(option("part", 4.0), inner);
        (builder.build().0, unit)
    };

    let (mut sync_tree, unit) = build();
    let sync_report = AutoChecker::default().run(&mut sync_tree, unit).unwrap();

    let (mut async_tree, unit) = build();
    let checker = AutoChecker::new(AutoCheckConfig::default().with_yield_every(1));
    let async_report = checker.run_async(&mut async_tree, unit).await.unwrap();

    assert_eq!(sync_report, async_report);
    assert_eq!(sync_report.changed.len(), 4);
    for node in &sync_report.changed {
        assert_eq!(amount(&sync_tree, *node), amount(&async_tree, *node));
    }
    assert_eq!(
        sync_tree.node(unit).unwrap().total_cost("pts"),
        async_tree.node(unit).unwrap().total_cost("pts"),
    );
}
