//! Outcome of an auto-check walk.

use rosterforge_core::NodeId;

/// Nodes an auto-check operation touched, and what it could not do.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AutoCheckReport {
    /// Nodes whose amount was raised, in the order they were raised.
    pub changed: Vec<NodeId>,
    /// Nodes forced to zero by "remove others" or a single-member
    /// association.
    pub removed: Vec<NodeId>,
    /// Groups that could not be filled and options that could not be found.
    pub warnings: Vec<String>,
}

impl AutoCheckReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.removed.is_empty() && self.warnings.is_empty()
    }

    pub(crate) fn record_changed(&mut self, node: NodeId) {
        if !self.changed.contains(&node) {
            self.changed.push(node);
        }
    }

    pub(crate) fn record_removed(&mut self, node: NodeId) {
        if !self.removed.contains(&node) {
            self.removed.push(node);
        }
    }

    pub(crate) fn warn(&mut self, message: String) {
        self.warnings.push(message);
    }

    /// Appends another report, keeping node lists free of duplicates.
    pub fn merge(&mut self, other: AutoCheckReport) {
        for node in other.changed {
            self.record_changed(node);
        }
        for node in other.removed {
            self.record_removed(node);
        }
        self.warnings.extend(other.warnings);
    }
}
