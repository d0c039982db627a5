//! Node kinds of the configuration tree.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::query::{FORCES, SELECTIONS};

/// The closed set of node kinds, decided once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
pub enum NodeKind {
    /// Tree root.
    Roster,
    /// A force (detachment) holding units.
    Force,
    /// Category bucket a unit is filed under inside a force.
    Category,
    /// Selection group organising options inside an entry.
    Group,
    /// A selectable entry. `unit` marks top-level selections of a force.
    Entry {
        /// Whether this entry is a top-level unit.
        #[cfg_attr(feature = "serde", serde(default))]
        unit: bool,
    },
}

/// How a node scales the contributions of its descendants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    /// Crossing keeps only buckets that recurse through child selections.
    Selection,
    /// Crossing keeps only buckets that recurse through child forces.
    Force,
}

impl NodeKind {
    /// Returns the multiplier boundary this kind represents, if any.
    ///
    /// Groups, categories and the roster are transparent.
    pub fn boundary(self) -> Option<Boundary> {
        match self {
            NodeKind::Entry { .. } => Some(Boundary::Selection),
            NodeKind::Force => Some(Boundary::Force),
            NodeKind::Roster | NodeKind::Category | NodeKind::Group => None,
        }
    }

    /// Field this kind's own amount is counted under.
    pub fn contribution_field(self) -> Option<&'static str> {
        match self {
            NodeKind::Entry { .. } => Some(SELECTIONS),
            NodeKind::Force => Some(FORCES),
            _ => None,
        }
    }

    pub fn is_entry(self) -> bool {
        matches!(self, NodeKind::Entry { .. })
    }

    pub fn is_unit(self) -> bool {
        matches!(self, NodeKind::Entry { unit: true })
    }

    pub fn is_group(self) -> bool {
        matches!(self, NodeKind::Group)
    }

    /// Nodes a `parent` scope lookup stops at.
    pub fn is_structural(self) -> bool {
        matches!(
            self,
            NodeKind::Entry { .. } | NodeKind::Force | NodeKind::Roster
        )
    }
}
