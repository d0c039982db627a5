//! RosterForge Auto-check - greedy default-quantity filling
//!
//! Given a subtree of a [`StateTree`](rosterforge_scope::StateTree), the
//! auto-check walk raises entries to their minimum and fills selection
//! groups up to theirs, preferring each group's default option and then
//! shallower options. It only ever adds or removes quantity, so it always
//! terminates in time linear in the subtree.
//!
//! # Example
//!
//! ```
//! use rosterforge_autocheck::AutoChecker;
//! use rosterforge_core::{ConstraintDef, NodeDef};
//! use rosterforge_scope::StateTree;
//!
//! let mut tree = StateTree::new();
//! let roster = tree.add_node(&NodeDef::roster("roster"), None, true).unwrap();
//! let force = tree.add_node(&NodeDef::force("force"), Some(roster), true).unwrap();
//! let unit = tree.add_node(&NodeDef::unit("squad"), Some(force), true).unwrap();
//! let group = tree
//!     .add_node(
//!         &NodeDef::group("weapons").constraint(ConstraintDef::min("weapons-min", 1.0)),
//!         Some(unit),
//!         true,
//!     )
//!     .unwrap();
//! let bolter = tree.add_node(&NodeDef::entry("bolter"), Some(group), true).unwrap();
//! tree.set_selections(unit, 1.0).unwrap();
//!
//! let report = AutoChecker::default().run(&mut tree, unit).unwrap();
//! assert_eq!(report.changed, vec![bolter]);
//! assert_eq!(tree.node(bolter).unwrap().amount(), 1.0);
//! ```

pub mod association;
pub mod checker;
pub mod report;

mod options;
mod remove;
mod walk;

pub use association::Association;
pub use checker::AutoChecker;
pub use report::AutoCheckReport;

#[cfg(test)]
mod tests;
