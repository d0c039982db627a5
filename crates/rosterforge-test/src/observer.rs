//! An observer that records every callback it receives.

use std::cell::RefCell;
use std::rc::Rc;

use rosterforge_core::NodeId;
use rosterforge_scope::NodeObserver;

/// One recorded callback.
#[derive(Debug, Clone, PartialEq)]
pub enum Observed {
    Hidden { node: NodeId, hidden: bool },
    CategoryAdded { node: NodeId, category: String },
    CategoryRemoved { node: NodeId, category: String },
    Costs(NodeId),
    Constraints(NodeId),
    Info(NodeId),
    Amount { node: NodeId, amount: f64 },
}

impl Observed {
    pub fn node(&self) -> NodeId {
        match self {
            Observed::Hidden { node, .. }
            | Observed::CategoryAdded { node, .. }
            | Observed::CategoryRemoved { node, .. }
            | Observed::Amount { node, .. } => *node,
            Observed::Costs(node) | Observed::Constraints(node) | Observed::Info(node) => *node,
        }
    }
}

/// Cloneable handle: install one clone on the tree, inspect through another.
///
/// # Example
///
/// ```
/// use rosterforge_core::NodeDef;
/// use rosterforge_test::{Observed, RecordingObserver, TreeBuilder};
///
/// let recorder = RecordingObserver::new();
/// let mut builder = TreeBuilder::new();
/// builder.observe(recorder.clone());
///
/// let unit = builder.unit(NodeDef::unit("scout"));
/// builder.select(unit, 3.0);
/// assert!(recorder.events().contains(&Observed::Amount { node: unit, amount: 3.0 }));
/// ```
#[derive(Debug, Clone, Default)]
pub struct RecordingObserver {
    events: Rc<RefCell<Vec<Observed>>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Observed> {
        self.events.borrow().clone()
    }

    /// Returns and clears everything recorded so far.
    pub fn take(&self) -> Vec<Observed> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    /// Events recorded for one node.
    pub fn for_node(&self, node: NodeId) -> Vec<Observed> {
        self.events
            .borrow()
            .iter()
            .filter(|e| e.node() == node)
            .cloned()
            .collect()
    }

    pub fn count(&self, predicate: impl Fn(&Observed) -> bool) -> usize {
        self.events.borrow().iter().filter(|e| predicate(e)).count()
    }

    fn push(&self, event: Observed) {
        self.events.borrow_mut().push(event);
    }
}

impl NodeObserver for RecordingObserver {
    fn hidden_changed(&mut self, node: NodeId, hidden: bool, _was_hidden: bool) {
        self.push(Observed::Hidden { node, hidden });
    }

    fn category_added(&mut self, node: NodeId, category_id: &str) {
        self.push(Observed::CategoryAdded {
            node,
            category: category_id.to_string(),
        });
    }

    fn category_removed(&mut self, node: NodeId, category_id: &str) {
        self.push(Observed::CategoryRemoved {
            node,
            category: category_id.to_string(),
        });
    }

    fn costs_changed(&mut self, node: NodeId) {
        self.push(Observed::Costs(node));
    }

    fn constraints_changed(&mut self, node: NodeId) {
        self.push(Observed::Constraints(node));
    }

    fn info_changed(&mut self, node: NodeId) {
        self.push(Observed::Info(node));
    }

    fn amount_changed(&mut self, node: NodeId, amount: f64) {
        self.push(Observed::Amount { node, amount });
    }
}
