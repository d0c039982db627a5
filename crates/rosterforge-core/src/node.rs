//! Static description of one node, as supplied by the owning tree.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::kind::NodeKind;
use crate::query::{IncludeFlags, ScopeName};
use crate::rules::{ConstraintDef, ConstraintKind, ModifierDef, ModifierGroupDef};

/// Per-unit cost of a node.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub struct CostDef {
    pub type_id: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub name: String,
    pub value: f64,
}

impl CostDef {
    pub fn new(type_id: impl Into<String>, value: f64) -> Self {
        let type_id = type_id.into();
        Self {
            name: type_id.clone(),
            type_id,
            value,
        }
    }
}

/// Category membership declared by a definition.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub struct CategoryDef {
    pub id: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub primary: bool,
}

impl CategoryDef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            primary: false,
        }
    }

    pub fn primary(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            primary: true,
        }
    }
}

/// A rule or profile attached to a node.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub struct InfoDef {
    pub id: String,
    pub name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub hidden: bool,
    /// Characteristic type id and text value, in display order.
    #[cfg_attr(feature = "serde", serde(default))]
    pub characteristics: Vec<(String, String)>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub modifiers: Vec<ModifierDef>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub modifier_groups: Vec<ModifierGroupDef>,
}

impl InfoDef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn characteristic(mut self, type_id: impl Into<String>, value: impl Into<String>) -> Self {
        self.characteristics.push((type_id.into(), value.into()));
        self
    }

    pub fn modifier(mut self, modifier: ModifierDef) -> Self {
        self.modifiers.push(modifier);
        self
    }
}

/// A constraint bound with the modifiers governing its value, evaluated in
/// a context other than the node that declared it.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub struct ExtraConstraintDef {
    /// Unique key of the installed constraint on its host node.
    pub key: String,
    /// Definition id a missing child id falls back to.
    pub owner_id: String,
    pub constraint: ConstraintDef,
    #[cfg_attr(feature = "serde", serde(default))]
    pub modifiers: Vec<ModifierDef>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub modifier_groups: Vec<ModifierGroupDef>,
}

impl ExtraConstraintDef {
    pub fn new(
        key: impl Into<String>,
        owner_id: impl Into<String>,
        constraint: ConstraintDef,
    ) -> Self {
        Self {
            key: key.into(),
            owner_id: owner_id.into(),
            constraint,
            modifiers: Vec::new(),
            modifier_groups: Vec::new(),
        }
    }

    pub fn modifier(mut self, modifier: ModifierDef) -> Self {
        self.modifiers.push(modifier);
        self
    }
}

/// Roster-wide cost limit. `None` or a negative value means unbounded.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub struct MaxCost {
    pub type_id: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub value: Option<f64>,
}

impl MaxCost {
    pub fn new(type_id: impl Into<String>, value: f64) -> Self {
        let type_id = type_id.into();
        Self {
            name: type_id.clone(),
            type_id,
            value: Some(value),
        }
    }

    /// Key of the extra constraint this limit installs.
    pub fn key(&self) -> String {
        format!("max::{}::{}", self.type_id, self.name)
    }

    /// The limit, or `None` when unbounded.
    pub fn bound(&self) -> Option<f64> {
        self.value.filter(|v| *v >= 0.0)
    }

    /// Builds the roster-wide extra constraint for a bounded limit.
    pub fn to_extra(&self, value: f64) -> ExtraConstraintDef {
        let key = self.key();
        let flags = IncludeFlags::new(true, true);
        let constraint = ConstraintDef {
            id: key.clone(),
            kind: ConstraintKind::Max,
            field: self.type_id.clone(),
            value,
            scope: ScopeName::Itself,
            child_id: None,
            include_child_selections: flags.selections,
            include_child_forces: flags.forces,
            percent_value: false,
            shared: true,
        };
        ExtraConstraintDef::new(key, self.type_id.clone(), constraint)
    }
}

/// Static rule lists and defaults of one node.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub struct NodeDef {
    pub kind: NodeKind,
    /// Own definition id.
    pub id: String,
    /// Shared definition a link node aliases.
    #[cfg_attr(feature = "serde", serde(default))]
    pub target_id: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub hidden: bool,
    #[cfg_attr(feature = "serde", serde(default))]
    pub page: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub categories: Vec<CategoryDef>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub costs: Vec<CostDef>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub constraints: Vec<ConstraintDef>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub modifiers: Vec<ModifierDef>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub modifier_groups: Vec<ModifierGroupDef>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub info: Vec<InfoDef>,
    /// Option a group prefers when auto-checking.
    #[cfg_attr(feature = "serde", serde(default))]
    pub default_option: Option<String>,
    /// Units and forces flagged as checklist items are auto-checked too.
    #[cfg_attr(feature = "serde", serde(default))]
    pub checklist: bool,
}

impl NodeDef {
    pub fn new(kind: NodeKind, id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            kind,
            name: id.clone(),
            id,
            target_id: None,
            hidden: false,
            page: None,
            categories: Vec::new(),
            costs: Vec::new(),
            constraints: Vec::new(),
            modifiers: Vec::new(),
            modifier_groups: Vec::new(),
            info: Vec::new(),
            default_option: None,
            checklist: false,
        }
    }

    pub fn roster(id: impl Into<String>) -> Self {
        Self::new(NodeKind::Roster, id)
    }

    pub fn force(id: impl Into<String>) -> Self {
        Self::new(NodeKind::Force, id)
    }

    pub fn category(id: impl Into<String>) -> Self {
        Self::new(NodeKind::Category, id)
    }

    pub fn group(id: impl Into<String>) -> Self {
        Self::new(NodeKind::Group, id)
    }

    pub fn entry(id: impl Into<String>) -> Self {
        Self::new(NodeKind::Entry { unit: false }, id)
    }

    pub fn unit(id: impl Into<String>) -> Self {
        Self::new(NodeKind::Entry { unit: true }, id)
    }

    pub fn link_to(mut self, target_id: impl Into<String>) -> Self {
        self.target_id = Some(target_id.into());
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn cost(mut self, type_id: impl Into<String>, value: f64) -> Self {
        self.costs.push(CostDef::new(type_id, value));
        self
    }

    pub fn category_link(mut self, category: CategoryDef) -> Self {
        self.categories.push(category);
        self
    }

    pub fn constraint(mut self, constraint: ConstraintDef) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn modifier(mut self, modifier: ModifierDef) -> Self {
        self.modifiers.push(modifier);
        self
    }

    pub fn modifier_group(mut self, group: ModifierGroupDef) -> Self {
        self.modifier_groups.push(group);
        self
    }

    pub fn info(mut self, info: InfoDef) -> Self {
        self.info.push(info);
        self
    }

    pub fn default_option(mut self, option_id: impl Into<String>) -> Self {
        self.default_option = Some(option_id.into());
        self
    }

    pub fn checklist(mut self) -> Self {
        self.checklist = true;
        self
    }

    /// Id queries about this node match: the link target if any, else its own.
    pub fn primary_id(&self) -> &str {
        self.target_id.as_deref().unwrap_or(&self.id)
    }
}
