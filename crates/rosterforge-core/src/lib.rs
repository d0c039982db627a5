//! RosterForge Core - Core types for the incremental constraint engine
//!
//! This crate provides the plain data the reactive core is built from:
//! - Node identity and node kinds
//! - Queries, scope names and the stable query hash format
//! - Static rule definitions (constraints, modifiers, conditions, repeats)
//! - Field values and the error type shared by every crate

pub mod error;
pub mod ids;
pub mod kind;
pub mod mode;
pub mod node;
pub mod query;
pub mod rules;
pub mod value;

pub use error::{Result, RosterError};
pub use ids::{ListenerId, NodeId};
pub use kind::{Boundary, NodeKind};
pub use mode::AssertMode;
pub use node::{CategoryDef, CostDef, ExtraConstraintDef, InfoDef, MaxCost, NodeDef};
pub use query::{IncludeFlags, Query, QueryHash, ScopeName, FORCES, SELECTIONS, SELF_KEY};
pub use rules::{
    Comparator, ConditionDef, ConditionGroupDef, ConstraintDef, ConstraintKind, GroupKind,
    ModifierDef, ModifierGroupDef, ModifierOp, RepeatDef,
};
pub use value::FieldValue;
