//! RosterForge Scope - incremental aggregation and reactive node state
//!
//! This crate keeps every node of a roster-configuration tree consistent as
//! selections change:
//! - [`queue`]: the deferred, coalescing, non-reentrant event queue
//! - [`scope`]: per-node hierarchical indices and their listeners
//! - [`reactive`]: conditions, repeats, modifiers and constraints
//! - [`state`]: per-node derived values
//! - [`tree`]: the arena tying them together
//!
//! # Example
//!
//! ```
//! use rosterforge_core::{ConstraintDef, NodeDef};
//! use rosterforge_scope::StateTree;
//!
//! let mut tree = StateTree::new();
//! let roster = tree.add_node(&NodeDef::roster("roster"), None, true).unwrap();
//! let force = tree.add_node(&NodeDef::force("force"), Some(roster), true).unwrap();
//! let unit = tree
//!     .add_node(
//!         &NodeDef::unit("captain").constraint(ConstraintDef::max("max-1", 1.0)),
//!         Some(force),
//!         true,
//!     )
//!     .unwrap();
//!
//! tree.set_selections(unit, 2.0).unwrap();
//! assert_eq!(tree.node(unit).unwrap().errors(), vec!["max-1"]);
//!
//! tree.set_selections(unit, 1.0).unwrap();
//! assert!(tree.node(unit).unwrap().errors().is_empty());
//! ```

pub mod dump;
pub mod observer;
pub mod queue;
pub mod reactive;
pub mod scope;
pub mod state;
pub mod tree;

// Re-exports
pub use dump::NodeDump;
pub use observer::NodeObserver;
pub use queue::{EventQueue, Notification};
pub use reactive::{Change, Constraint, Modifier, Reactive, Target};
pub use scope::{ListenerKey, Port, Scope, Slot, Subscriber};
pub use state::{InfoState, NodeState};
pub use tree::{Mismatch, StateTree};
