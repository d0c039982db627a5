//! Scope resolution: which nodes a query's scope name refers to.

use rosterforge_core::{NodeId, NodeKind, ScopeName};

use super::StateTree;

impl StateTree {
    /// Resolves `scope` relative to `node`.
    ///
    /// Unshared lookups of `parent`, `force` and `primary-*` resolve to the
    /// nearest enclosing group, falling back to the structural parent. Only
    /// reactive nodes are returned; an empty result means the query stays
    /// unresolved.
    pub fn find(&self, node: NodeId, scope: &ScopeName, shared: bool) -> Vec<NodeId> {
        let found = match scope {
            ScopeName::Itself => vec![node],
            ScopeName::Parent if shared => self.structural_parent(node).into_iter().collect(),
            ScopeName::Force | ScopeName::PrimaryCatalogue if shared => self
                .nearest(node, true, |kind| kind == NodeKind::Force)
                .into_iter()
                .collect(),
            ScopeName::PrimaryCategory if shared => self
                .nearest(node, false, |kind| kind == NodeKind::Category)
                .into_iter()
                .collect(),
            ScopeName::Parent
            | ScopeName::Force
            | ScopeName::PrimaryCatalogue
            | ScopeName::PrimaryCategory => self
                .nearest(node, false, NodeKind::is_group)
                .or_else(|| self.structural_parent(node))
                .into_iter()
                .collect(),
            ScopeName::Roster => self.top(node).into_iter().collect(),
            ScopeName::Ancestor => self.self_and_ancestors(node).into_iter().skip(1).collect(),
            ScopeName::Id(id) => self
                .self_and_ancestors(node)
                .into_iter()
                .find(|&at| self.state(at).is_some_and(|s| s.answers_to(id)))
                .into_iter()
                .collect(),
        };
        found
            .into_iter()
            .filter(|&at| self.state(at).is_some_and(|s| s.is_reactive()))
            .collect()
    }

    /// Nearest entry, force or roster strictly above `node`.
    pub fn structural_parent(&self, node: NodeId) -> Option<NodeId> {
        self.nearest(node, false, NodeKind::is_structural)
    }

    fn nearest(&self, node: NodeId, include_self: bool, matches: impl Fn(NodeKind) -> bool) -> Option<NodeId> {
        let skip = usize::from(!include_self);
        self.self_and_ancestors(node)
            .into_iter()
            .skip(skip)
            .find(|&at| self.state(at).is_some_and(|s| matches(s.kind)))
    }

    /// The roster at the top of `node`'s chain, if the chain ends in one.
    fn top(&self, node: NodeId) -> Option<NodeId> {
        let top = self.self_and_ancestors(node).pop()?;
        self.state(top)
            .filter(|s| s.kind == NodeKind::Roster)
            .map(|_| top)
    }
}
