//! RosterForge - An incremental constraint engine for roster trees
//!
//! Describe each node once, then change quantities: every ancestor
//! aggregate, cost total, constraint and modifier stays current.
//!
//! # Example
//!
//! ```rust
//! use rosterforge::prelude::*;
//!
//! let mut engine = Engine::default();
//! let roster = engine.add_node(&NodeDef::roster("roster"), None).unwrap();
//! let force = engine.add_node(&NodeDef::force("force"), Some(roster)).unwrap();
//! let squad = engine
//!     .add_node(
//!         &NodeDef::unit("squad").cost("pts", 10.0).checklist()
//!             .constraint(ConstraintDef::min("squad-min", 5.0)),
//!         Some(force),
//!     )
//!     .unwrap();
//!
//! let report = engine.auto_check(force).unwrap();
//! assert_eq!(report.changed, vec![squad]);
//! assert_eq!(engine.tree().node(force).unwrap().total_cost("pts"), 50.0);
//! ```

// Definitions
pub use rosterforge_core::{
    AssertMode, CategoryDef, Comparator, ConditionDef, ConditionGroupDef, ConstraintDef,
    ConstraintKind, CostDef, ExtraConstraintDef, FieldValue, GroupKind, InfoDef, ListenerId,
    MaxCost, ModifierDef, ModifierGroupDef, ModifierOp, NodeDef, NodeId, NodeKind, Query,
    QueryHash, RepeatDef, Result, RosterError, ScopeName,
};

// Reactive core
pub use rosterforge_scope::{NodeDump, NodeObserver, NodeState, StateTree};

// Auto-check
pub use rosterforge_autocheck::{Association, AutoCheckReport, AutoChecker};

// Configuration
pub use rosterforge_config::{AutoCheckConfig, ConfigError, EngineConfig};

// Console output
#[cfg(feature = "console")]
pub use rosterforge_console::{init, init_with, render_dump};

mod engine;
pub use engine::Engine;

pub mod prelude {
    pub use super::{
        AssertMode, AutoCheckConfig, AutoCheckReport, AutoChecker, CategoryDef, ConditionDef,
        ConstraintDef, Engine, EngineConfig, MaxCost, ModifierDef, ModifierOp, NodeDef, NodeId,
        NodeObserver, Query, StateTree,
    };
}
