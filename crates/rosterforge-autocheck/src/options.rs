//! Option discovery and ranking inside selection groups.

use rosterforge_core::{NodeId, Result};
use rosterforge_scope::StateTree;

/// An entry reachable from a group through nested groups only.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct GroupOption {
    pub node: NodeId,
    /// Number of nested groups between the option and the group.
    pub depth: usize,
}

/// Entries of `group`, in declaration order, descending into nested groups.
pub(crate) fn collect_options(tree: &StateTree, group: NodeId) -> Result<Vec<GroupOption>> {
    let mut out = Vec::new();
    let mut stack: Vec<(NodeId, usize)> = tree
        .children(group)
        .iter()
        .rev()
        .map(|&child| (child, 0))
        .collect();
    while let Some((node, depth)) = stack.pop() {
        let state = tree.node(node)?;
        if state.kind().is_group() {
            stack.extend(tree.children(node).iter().rev().map(|&c| (c, depth + 1)));
        } else if state.kind().is_entry() {
            out.push(GroupOption { node, depth });
        }
    }
    Ok(out)
}

/// Current selections across a group's options.
pub(crate) fn selected_count(tree: &StateTree, options: &[GroupOption]) -> Result<f64> {
    let mut total = 0.0;
    for option in options {
        total += tree.node(option.node)?.amount();
    }
    Ok(total)
}

/// Fill priority: the default option outranks everything, then shallower
/// options outrank deeper ones.
fn priority(tree: &StateTree, option: &GroupOption, default: Option<&str>) -> Result<i64> {
    if let Some(default) = default {
        if tree.node(option.node)?.answers_to(default) {
            return Ok(i64::MAX);
        }
    }
    Ok(-(option.depth as i64))
}

/// Options sorted by descending priority, stable within equal priority.
///
/// Returns whether any option matched `default`.
pub(crate) fn rank(
    tree: &StateTree,
    options: &[GroupOption],
    default: Option<&str>,
) -> Result<(Vec<NodeId>, bool)> {
    let mut scored = Vec::with_capacity(options.len());
    for option in options {
        scored.push((priority(tree, option, default)?, option.node));
    }
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    let found = default.is_some() && scored.first().is_some_and(|(p, _)| *p == i64::MAX);
    Ok((scored.into_iter().map(|(_, node)| node).collect(), found))
}

#[cfg(test)]
mod tests {
    use rosterforge_core::NodeDef;
    use rosterforge_scope::StateTree;

    use super::*;

    fn group_tree() -> (StateTree, NodeId, Vec<NodeId>) {
        let mut tree = StateTree::new();
        let roster = tree.add_node(&NodeDef::roster("roster"), None, true).unwrap();
        let force = tree.add_node(&NodeDef::force("force"), Some(roster), true).unwrap();
        let unit = tree.add_node(&NodeDef::unit("unit"), Some(force), true).unwrap();
        let group = tree.add_node(&NodeDef::group("wargear"), Some(unit), true).unwrap();
        let nested = tree.add_node(&NodeDef::group("pistols"), Some(group), true).unwrap();
        let deep = tree.add_node(&NodeDef::entry("pistol"), Some(nested), true).unwrap();
        let sword = tree.add_node(&NodeDef::entry("sword"), Some(group), true).unwrap();
        let axe = tree.add_node(&NodeDef::entry("axe"), Some(group), true).unwrap();
        (tree, group, vec![deep, sword, axe])
    }

    #[test]
    fn test_collect_options_descends_nested_groups() {
        let (tree, group, nodes) = group_tree();
        let options = collect_options(&tree, group).unwrap();
        let found: Vec<_> = options.iter().map(|o| (o.node, o.depth)).collect();
        assert_eq!(found, vec![(nodes[0], 1), (nodes[1], 0), (nodes[2], 0)]);
    }

    #[test]
    fn test_rank_prefers_default_then_shallow() {
        let (tree, group, nodes) = group_tree();
        let options = collect_options(&tree, group).unwrap();

        let (ranked, found) = rank(&tree, &options, None).unwrap();
        assert!(!found);
        assert_eq!(ranked, vec![nodes[1], nodes[2], nodes[0]]);

        let (ranked, found) = rank(&tree, &options, Some("pistol")).unwrap();
        assert!(found);
        assert_eq!(ranked, vec![nodes[0], nodes[1], nodes[2]]);

        let (_, found) = rank(&tree, &options, Some("missing")).unwrap();
        assert!(!found);
    }
}
