//! Host callbacks fired when derived node values change.

use rosterforge_core::NodeId;

/// Receives notifications about derived node values.
///
/// Every method has a no-op default, so observers implement only what they
/// care about. Callbacks fire after the tree has settled for the change
/// that caused them, with the tree borrowed; they must not call back into it.
pub trait NodeObserver {
    fn hidden_changed(&mut self, _node: NodeId, _hidden: bool, _was_hidden: bool) {}

    fn category_added(&mut self, _node: NodeId, _category_id: &str) {}

    fn category_removed(&mut self, _node: NodeId, _category_id: &str) {}

    fn costs_changed(&mut self, _node: NodeId) {}

    fn constraints_changed(&mut self, _node: NodeId) {}

    /// Name, page, primary category or an info block changed.
    fn info_changed(&mut self, _node: NodeId) {}

    fn amount_changed(&mut self, _node: NodeId, _amount: f64) {}
}
