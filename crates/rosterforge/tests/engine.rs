//! Engine wiring: config-driven assertion level and auto-check.

use rosterforge::prelude::*;
use rosterforge::RosterError;
use rosterforge_test::fixtures::{captain, group, option, troops};

fn force_engine(config: EngineConfig) -> (Engine, NodeId) {
    let mut engine = Engine::new(config);
    let roster = engine.add_node(&NodeDef::roster("roster"), None).unwrap();
    let force = engine.add_node(&NodeDef::force("force"), Some(roster)).unwrap();
    (engine, force)
}

#[test]
fn test_bulk_load_defers_auto_check() {
    let (mut engine, force) = force_engine(EngineConfig::default());

    let squad = engine
        .bulk_load(|tree| {
            let squad = tree.add_node(&troops().checklist(), Some(force), true)?;
            assert!(tree.is_loading());
            Ok(squad)
        })
        .unwrap();
    assert!(!engine.tree().is_loading());
    assert_eq!(engine.tree().node(squad).unwrap().amount(), 0.0);

    let report = engine.auto_check(force).unwrap();
    assert_eq!(report.changed, vec![squad]);
    assert_eq!(engine.tree().node(squad).unwrap().amount(), 5.0);
}

#[test]
fn test_bulk_load_clears_flag_on_error() {
    let (mut engine, force) = force_engine(EngineConfig::default());
    let missing = NodeId::new(99, 0);

    let result: Result<(), RosterError> = engine.bulk_load(|tree| {
        tree.add_node(&captain(), Some(force), true)?;
        tree.set_selections(missing, 1.0)
    });
    assert_eq!(result, Err(RosterError::UnknownNode(missing)));
    assert!(!engine.tree().is_loading());
}

#[test]
fn test_check_fills_new_selection() {
    let config = EngineConfig::new().with_assert_mode(AssertMode::Full);
    let (mut engine, force) = force_engine(config);
    assert_eq!(engine.tree().assert_mode(), AssertMode::Full);

    let squad = engine
        .add_node(&NodeDef::unit("squad").cost("pts", 10.0), Some(force))
        .unwrap();
    let weapons = engine.add_node(&group("weapons", 1.0, 1.0), Some(squad)).unwrap();
    let rifle = engine.add_node(&option("rifle", 2.0), Some(weapons)).unwrap();

    let report = engine.check(squad, 3.0).unwrap();
    assert_eq!(report.changed, vec![squad, rifle]);
    assert_eq!(engine.tree().node(force).unwrap().total_cost("pts"), 36.0);
}

#[test]
fn test_disabled_auto_check_leaves_tree_alone() {
    let config = EngineConfig::new().with_auto_check(AutoCheckConfig::disabled());
    let (mut engine, force) = force_engine(config);
    let squad = engine.add_node(&troops().checklist(), Some(force)).unwrap();

    assert!(engine.auto_check(force).unwrap().is_empty());
    assert_eq!(engine.tree().node(squad).unwrap().amount(), 0.0);
}

#[tokio::test]
async fn test_async_auto_check() {
    let (mut engine, force) = force_engine(EngineConfig::default());
    let squad = engine.add_node(&troops().checklist(), Some(force)).unwrap();

    let report = engine.auto_check_async(force).await.unwrap();
    assert_eq!(report.changed, vec![squad]);
}
