//! Roster scaffolding for tests.
//!
//! # Example
//!
//! ```
//! use rosterforge_core::NodeDef;
//! use rosterforge_test::TreeBuilder;
//!
//! let mut builder = TreeBuilder::new();
//! let unit = builder.unit(NodeDef::unit("captain").cost("pts", 80.0));
//! builder.select(unit, 2.0);
//!
//! let (tree, _, force) = builder.build();
//! assert_eq!(tree.node(force).unwrap().total_cost("pts"), 160.0);
//! ```

use rosterforge_core::{AssertMode, NodeDef, NodeId};
use rosterforge_scope::{NodeObserver, StateTree};

/// Builds a roster with one force and hands out the ids it creates.
///
/// Every operation panics on error: fixtures are expected to be valid.
pub struct TreeBuilder {
    tree: StateTree,
    roster: NodeId,
    force: NodeId,
}

impl TreeBuilder {
    /// Creates a roster `"roster"` holding force `"force"`, with full
    /// invariant checking.
    pub fn new() -> Self {
        Self::with_assert_mode(AssertMode::Full)
    }

    pub fn with_assert_mode(mode: AssertMode) -> Self {
        Self::with_force(mode, NodeDef::force("force"))
    }

    /// Creates the roster around a custom force definition.
    pub fn with_force(mode: AssertMode, force: NodeDef) -> Self {
        let mut tree = StateTree::with_assert_mode(mode);
        let roster = tree
            .add_node(&NodeDef::roster("roster"), None, true)
            .expect("roster fixture");
        let force = tree.add_node(&force, Some(roster), true).expect("force fixture");
        Self {
            tree,
            roster,
            force,
        }
    }

    pub fn roster(&self) -> NodeId {
        self.roster
    }

    pub fn force(&self) -> NodeId {
        self.force
    }

    /// Adds a reactive node under `parent`.
    pub fn add(&mut self, def: NodeDef, parent: NodeId) -> NodeId {
        self.tree
            .add_node(&def, Some(parent), true)
            .unwrap_or_else(|e| panic!("adding {} failed: {e}", def.id))
    }

    /// Adds a node under the force.
    pub fn unit(&mut self, def: NodeDef) -> NodeId {
        let force = self.force;
        self.add(def, force)
    }

    /// Adds a node under the force and selects it once.
    pub fn selected_unit(&mut self, def: NodeDef) -> NodeId {
        let unit = self.unit(def);
        self.select(unit, 1.0);
        unit
    }

    /// Adds a second force under the roster.
    pub fn add_force(&mut self, def: NodeDef) -> NodeId {
        let roster = self.roster;
        self.add(def, roster)
    }

    pub fn select(&mut self, node: NodeId, amount: f64) {
        self.tree
            .set_selections(node, amount)
            .unwrap_or_else(|e| panic!("selecting {node} failed: {e}"));
    }

    pub fn observe(&mut self, observer: impl NodeObserver + 'static) {
        self.tree.set_observer(observer);
    }

    pub fn tree(&self) -> &StateTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut StateTree {
        &mut self.tree
    }

    /// Returns the tree with the roster and force ids.
    pub fn build(self) -> (StateTree, NodeId, NodeId) {
        (self.tree, self.roster, self.force)
    }
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
