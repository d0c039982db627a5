//! Canned definitions shared by integration tests.

use rosterforge_core::{
    CategoryDef, Comparator, ConditionDef, ConstraintDef, MaxCost, ModifierDef, ModifierOp,
    NodeDef, Query,
};

/// HQ unit: 80 pts, primary category `hq`, at most one per force.
pub fn captain() -> NodeDef {
    NodeDef::unit("captain")
        .named("Captain")
        .cost("pts", 80.0)
        .category_link(CategoryDef::primary("hq"))
        .constraint(max_selections("captain-max", 1.0))
}

/// Troops unit: 10 pts per model, between 5 and 10 models per force.
pub fn troops() -> NodeDef {
    NodeDef::unit("troops")
        .named("Troops")
        .cost("pts", 10.0)
        .category_link(CategoryDef::primary("troops"))
        .constraint(min_selections("troops-min", 5.0))
        .constraint(max_selections("troops-max", 10.0))
}

/// Upgrade option with a points cost.
pub fn option(id: &str, pts: f64) -> NodeDef {
    NodeDef::entry(id).cost("pts", pts)
}

/// Upgrade option limited to `max` per parent.
pub fn limited_option(id: &str, pts: f64, max: f64) -> NodeDef {
    option(id, pts).constraint(max_selections(format!("{id}-max"), max))
}

/// Selection group requiring between `min` and `max` options.
///
/// A negative `max` leaves the group unbounded.
pub fn group(id: &str, min: f64, max: f64) -> NodeDef {
    let mut def = NodeDef::group(id);
    if min > 0.0 {
        def = def.constraint(min_selections(format!("{id}-min"), min));
    }
    if max >= 0.0 {
        def = def.constraint(max_selections(format!("{id}-max"), max));
    }
    def
}

/// At most `value` selections of the declaring definition per parent.
pub fn max_selections(id: impl Into<String>, value: f64) -> ConstraintDef {
    ConstraintDef::max(id, value)
}

/// At least `value` selections of the declaring definition per parent.
pub fn min_selections(id: impl Into<String>, value: f64) -> ConstraintDef {
    ConstraintDef::min(id, value)
}

/// Roster-wide points limit.
pub fn pts_limit(value: f64) -> MaxCost {
    MaxCost::new("pts", value)
}

/// Hides the owner once the force holds at least `count` of `child_id`.
pub fn hide_when_force_has(child_id: &str, count: f64) -> ModifierDef {
    ModifierDef::new(ModifierOp::Set, "hidden", true).when(ConditionDef::new(
        Comparator::AtLeast,
        Query::new("force", "selections").with_child(child_id),
        count,
    ))
}
