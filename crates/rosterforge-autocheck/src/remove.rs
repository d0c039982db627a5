//! "Remove others": enforcing select-at-most-one groups and limits.

use tracing::debug;

use rosterforge_config::AutoCheckConfig;
use rosterforge_core::{ConstraintKind, NodeId, Result, SELECTIONS};
use rosterforge_scope::StateTree;

use crate::options::collect_options;
use crate::report::AutoCheckReport;

/// Zeroes the nodes competing with `node` for a maximum of one.
///
/// Competitors are options of an enclosing group limited to one selection,
/// and entries matched by one of the node's own max-1 constraints. Entries
/// sharing the node's selector are left alone, as are top-level units unless
/// the config allows removing them.
pub(crate) fn remove_others(
    config: &AutoCheckConfig,
    tree: &mut StateTree,
    node: NodeId,
) -> Result<AutoCheckReport> {
    let mut report = AutoCheckReport::default();
    let state = tree.node(node)?;
    if state.amount() <= 0.0 {
        return Ok(report);
    }
    let selector = state.primary_id().to_string();

    let mut competitors = Vec::new();
    let mut cursor = state.parent();
    while let Some(at) = cursor {
        let group = tree.node(at)?;
        if !group.kind().is_group() {
            break;
        }
        if group.bounds().1 == Some(1.0) {
            competitors.extend(collect_options(tree, at)?.into_iter().map(|o| o.node));
        }
        cursor = group.parent();
    }

    let single_limits: Vec<_> = state
        .constraints()
        .filter(|c| {
            c.def().kind == ConstraintKind::Max
                && c.limit() == 1.0
                && c.key().is_none()
                && c.query().field == SELECTIONS
                && !c.query().percent_value
        })
        .filter_map(|c| {
            let child = c.query().child_id.clone()?;
            Some((c.query().scope.clone(), c.query().shared, child))
        })
        .collect();
    for (scope, shared, child) in single_limits {
        for scope_node in tree.find(node, &scope, shared) {
            for entry in entries_below(tree, scope_node) {
                let other = tree.node(entry)?;
                if other.answers_to(&child) || other.categories().contains(&child) {
                    competitors.push(entry);
                }
            }
        }
    }

    for other in competitors {
        if other == node || report.removed.contains(&other) {
            continue;
        }
        let state = tree.node(other)?;
        if state.primary_id() == selector || state.amount() <= 0.0 {
            continue;
        }
        if state.kind().is_unit() && !config.allow_remove_units {
            debug!(event = "remove_others_skip_unit", node = %other, kept_for = %node);
            continue;
        }
        tree.set_selections(other, 0.0)?;
        report.record_removed(other);
        debug!(event = "remove_other", node = %other, selected = %node);
    }
    Ok(report)
}

/// Entries under `root`, not descending into entries.
fn entries_below(tree: &StateTree, root: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut stack: Vec<NodeId> = tree.children(root).iter().rev().copied().collect();
    while let Some(node) = stack.pop() {
        let Ok(state) = tree.node(node) else {
            continue;
        };
        if state.kind().is_entry() {
            out.push(node);
        } else {
            stack.extend(tree.children(node).iter().rev().copied());
        }
    }
    out
}
