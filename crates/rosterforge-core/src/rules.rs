//! Static rule definitions.
//!
//! These are attached to a node once, at state construction, and never
//! change afterwards. Only the *computed* results of their live
//! counterparts in `rosterforge-scope` move.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::query::{Query, ScopeName, SELECTIONS};
use crate::value::FieldValue;

/// Direction of a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ConstraintKind {
    Min,
    Max,
}

/// A min/max bound on a live query.
///
/// # Example
///
/// ```
/// use rosterforge_core::{ConstraintDef, ConstraintKind};
///
/// let c = ConstraintDef::max("c1", 3.0).in_scope("parent");
/// assert_eq!(c.kind, ConstraintKind::Max);
/// assert!(c.is_violated(4.0, 3.0));
/// assert!(!c.is_violated(3.0, 3.0));
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub struct ConstraintDef {
    pub id: String,
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub kind: ConstraintKind,
    pub field: String,
    pub value: f64,
    pub scope: ScopeName,
    #[cfg_attr(feature = "serde", serde(default))]
    pub child_id: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub include_child_selections: bool,
    #[cfg_attr(feature = "serde", serde(default))]
    pub include_child_forces: bool,
    #[cfg_attr(feature = "serde", serde(default))]
    pub percent_value: bool,
    #[cfg_attr(feature = "serde", serde(default = "default_true"))]
    pub shared: bool,
}

#[cfg(feature = "serde")]
fn default_true() -> bool {
    true
}

impl ConstraintDef {
    /// Creates a constraint counting selections in the parent scope.
    pub fn new(id: impl Into<String>, kind: ConstraintKind, value: f64) -> Self {
        Self {
            id: id.into(),
            kind,
            field: SELECTIONS.to_string(),
            value,
            scope: ScopeName::Parent,
            child_id: None,
            include_child_selections: false,
            include_child_forces: false,
            percent_value: false,
            shared: true,
        }
    }

    pub fn min(id: impl Into<String>, value: f64) -> Self {
        Self::new(id, ConstraintKind::Min, value)
    }

    pub fn max(id: impl Into<String>, value: f64) -> Self {
        Self::new(id, ConstraintKind::Max, value)
    }

    pub fn in_scope(mut self, scope: impl Into<ScopeName>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn on_field(mut self, field: impl Into<String>) -> Self {
        self.field = field.into();
        self
    }

    pub fn with_child(mut self, child_id: impl Into<String>) -> Self {
        self.child_id = Some(child_id.into());
        self
    }

    pub fn recursive(mut self, selections: bool, forces: bool) -> Self {
        self.include_child_selections = selections;
        self.include_child_forces = forces;
        self
    }

    pub fn percent(mut self) -> Self {
        self.percent_value = true;
        self
    }

    pub fn unshared(mut self) -> Self {
        self.shared = false;
        self
    }

    /// Builds the live query for a constraint declared by `owner_id`.
    ///
    /// Outside the `self` scope a missing child id means "the declaring
    /// definition itself".
    pub fn query(&self, owner_id: &str) -> Query {
        let child_id = match (&self.child_id, &self.scope) {
            (Some(child), _) => Some(child.clone()),
            (None, ScopeName::Itself) => None,
            (None, _) => Some(owner_id.to_string()),
        };
        Query {
            scope: self.scope.clone(),
            field: self.field.clone(),
            child_id,
            include_child_selections: self.include_child_selections,
            include_child_forces: self.include_child_forces,
            percent_value: self.percent_value,
            shared: self.shared,
        }
    }

    /// Compares an observed amount against an effective limit.
    ///
    /// A negative maximum is unbounded.
    pub fn is_violated(&self, observed: f64, limit: f64) -> bool {
        match self.kind {
            ConstraintKind::Min => observed < limit,
            ConstraintKind::Max => limit >= 0.0 && observed > limit,
        }
    }
}

/// Comparison a condition applies to its query result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Comparator {
    LessThan,
    GreaterThan,
    EqualTo,
    NotEqualTo,
    AtLeast,
    AtMost,
    InstanceOf,
    NotInstanceOf,
}

impl Comparator {
    pub fn test(self, observed: f64, value: f64) -> bool {
        match self {
            Comparator::LessThan => observed < value,
            Comparator::GreaterThan => observed > value,
            Comparator::EqualTo => observed == value,
            Comparator::NotEqualTo => observed != value,
            Comparator::AtLeast => observed >= value,
            Comparator::AtMost => observed <= value,
            Comparator::InstanceOf => observed > 0.0,
            Comparator::NotInstanceOf => observed <= 0.0,
        }
    }

    /// Whether the comparator reads a membership bucket.
    pub fn is_membership(self) -> bool {
        matches!(self, Comparator::InstanceOf | Comparator::NotInstanceOf)
    }
}

/// A boolean test of a live query.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub struct ConditionDef {
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub comparator: Comparator,
    #[cfg_attr(feature = "serde", serde(default))]
    pub query: Option<Query>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub value: f64,
}

impl ConditionDef {
    pub fn new(comparator: Comparator, query: Query, value: f64) -> Self {
        Self {
            comparator,
            query: Some(query),
            value,
        }
    }

    /// `scope` is an instance of `id` (entry, link target or category).
    pub fn instance_of(scope: impl Into<ScopeName>, id: impl Into<String>) -> Self {
        Self::new(
            Comparator::InstanceOf,
            Query::new(scope, SELECTIONS).with_child(id),
            1.0,
        )
    }

    pub fn not_instance_of(scope: impl Into<ScopeName>, id: impl Into<String>) -> Self {
        Self {
            comparator: Comparator::NotInstanceOf,
            ..Self::instance_of(scope, id)
        }
    }
}

/// AND/OR combinator of a condition group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum GroupKind {
    #[default]
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub struct ConditionGroupDef {
    #[cfg_attr(feature = "serde", serde(rename = "type", default))]
    pub kind: GroupKind,
    #[cfg_attr(feature = "serde", serde(default))]
    pub conditions: Vec<ConditionDef>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub groups: Vec<ConditionGroupDef>,
}

/// Yields a repetition count instead of a boolean.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub struct RepeatDef {
    pub query: Query,
    /// Observed amount per repetition.
    pub value: f64,
    /// Repetitions granted per full `value`.
    #[cfg_attr(feature = "serde", serde(default = "default_repeats"))]
    pub repeats: u32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub round_up: bool,
}

#[cfg(feature = "serde")]
fn default_repeats() -> u32 {
    1
}

impl RepeatDef {
    pub fn new(query: Query, value: f64, repeats: u32) -> Self {
        Self {
            query,
            value,
            repeats,
            round_up: false,
        }
    }

    /// Repetition count for an observed amount.
    pub fn count(&self, observed: f64) -> f64 {
        if self.value == 0.0 {
            return 0.0;
        }
        let ratio = observed / self.value;
        let whole = if self.round_up {
            ratio.ceil()
        } else {
            ratio.floor()
        };
        whole.max(0.0) * f64::from(self.repeats)
    }
}

/// Operation a modifier folds onto its field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum ModifierOp {
    Set,
    Add,
    Remove,
    Increment,
    Decrement,
    Append,
    SetPrimary,
    UnsetPrimary,
}

impl ModifierOp {
    /// Operations that edit category membership rather than a scalar.
    pub fn is_membership(self) -> bool {
        matches!(
            self,
            ModifierOp::Add | ModifierOp::Remove | ModifierOp::SetPrimary | ModifierOp::UnsetPrimary
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub struct ModifierDef {
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub op: ModifierOp,
    pub field: String,
    pub value: FieldValue,
    #[cfg_attr(feature = "serde", serde(default))]
    pub conditions: Vec<ConditionDef>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub condition_groups: Vec<ConditionGroupDef>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub repeats: Vec<RepeatDef>,
}

impl ModifierDef {
    pub fn new(op: ModifierOp, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self {
            op,
            field: field.into(),
            value: value.into(),
            conditions: Vec::new(),
            condition_groups: Vec::new(),
            repeats: Vec::new(),
        }
    }

    pub fn when(mut self, condition: ConditionDef) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn when_group(mut self, group: ConditionGroupDef) -> Self {
        self.condition_groups.push(group);
        self
    }

    pub fn repeat(mut self, repeat: RepeatDef) -> Self {
        self.repeats.push(repeat);
        self
    }
}

/// Nested set of modifiers gated by shared conditions and repeats.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub struct ModifierGroupDef {
    #[cfg_attr(feature = "serde", serde(default))]
    pub conditions: Vec<ConditionDef>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub condition_groups: Vec<ConditionGroupDef>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub repeats: Vec<RepeatDef>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub modifiers: Vec<ModifierDef>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub groups: Vec<ModifierGroupDef>,
}
