//! Deriving field values from active modifiers.

use rosterforge_core::FieldValue;

use super::NodeState;
use crate::reactive::{fold_scalar, CategoryFold, Target};

/// What a node-level modifier field refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Name,
    Hidden,
    Page,
    Category,
    /// Limit of the definition constraint at this index.
    Constraint(usize),
    /// Per-unit cost of this type.
    Cost(String),
}

impl NodeState {
    /// Classifies a node-level field: reserved names first, then
    /// definition constraint ids, then cost types.
    pub fn classify(&self, field: &str) -> FieldKind {
        match field {
            "name" => return FieldKind::Name,
            "hidden" => return FieldKind::Hidden,
            "page" => return FieldKind::Page,
            "category" => return FieldKind::Category,
            _ => {}
        }
        let constraint = self
            .reactive
            .constraints()
            .find(|(_, c)| c.key().is_none() && c.def().id == field);
        match constraint {
            Some((index, _)) => FieldKind::Constraint(index),
            None => FieldKind::Cost(field.to_string()),
        }
    }

    /// Folds active scalar modifiers on `target`/`field` over `default`,
    /// in declaration order. `None` matches any field of the target.
    pub(crate) fn fold(&self, target: Target, field: Option<&str>, default: FieldValue) -> FieldValue {
        self.reactive
            .modifiers()
            .iter()
            .filter(|m| m.is_active() && m.target() == target && !m.op().is_membership())
            .filter(|m| field.map_or(true, |f| m.field() == f))
            .fold(default, |acc, m| {
                fold_scalar(m.op(), acc, m.value(), m.computed())
            })
    }

    /// Folds default categories and active category modifiers.
    pub(crate) fn fold_categories(&self) -> CategoryFold {
        let mut fold = CategoryFold {
            categories: self.defaults.categories.clone(),
            primary: self.defaults.primary_category.clone(),
        };
        for m in self.reactive.modifiers() {
            if m.is_active() && m.target() == Target::Node && m.field() == "category" {
                fold.apply(m.op(), &m.value().as_text());
            }
        }
        fold
    }

    pub(crate) fn derived_name(&self) -> String {
        self.fold(Target::Node, Some("name"), FieldValue::Text(self.defaults.name.clone()))
            .as_text()
    }

    pub(crate) fn derived_hidden(&self) -> bool {
        self.fold(Target::Node, Some("hidden"), FieldValue::Bool(self.defaults.hidden))
            .as_bool()
    }

    pub(crate) fn derived_page(&self) -> Option<String> {
        let default = FieldValue::Text(self.defaults.page.clone().unwrap_or_default());
        let page = self.fold(Target::Node, Some("page"), default).as_text();
        (!page.is_empty()).then_some(page)
    }

    pub(crate) fn derived_cost(&self, type_id: &str) -> f64 {
        let default = self.defaults.costs.get(type_id).copied().unwrap_or(0.0);
        self.fold(Target::Node, Some(type_id), FieldValue::Number(default))
            .as_number()
    }

    /// Effective limit of the constraint at `index`.
    pub(crate) fn derived_limit(&self, index: usize) -> Option<f64> {
        let constraint = self.reactive.constraint(index)?;
        let default = FieldValue::Number(constraint.def().value);
        let limit = match constraint.key() {
            Some(_) => self.fold(Target::Extra(index), None, default),
            None => self.fold(Target::Node, Some(constraint.def().id.as_str()), default),
        };
        Some(limit.as_number())
    }

    /// Cost types referenced by defaults or by any cost modifier.
    pub(crate) fn cost_fields(&self) -> Vec<String> {
        let mut types: Vec<String> = self.defaults.costs.keys().cloned().collect();
        for m in self.reactive.modifiers() {
            if m.target() != Target::Node || types.iter().any(|t| t == m.field()) {
                continue;
            }
            if let FieldKind::Cost(t) = self.classify(m.field()) {
                types.push(t);
            }
        }
        types
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rosterforge_core::{ConstraintDef, ModifierDef, ModifierOp, NodeDef, NodeId};

    use crate::reactive::Reactive;

    fn state(def: NodeDef) -> NodeState {
        let mut state = NodeState::new(NodeId::new(0, 0), &def, None);
        for c in &def.constraints {
            state
                .reactive
                .add_constraint(Reactive::constraint_for(c, def.primary_id(), None));
        }
        for m in &def.modifiers {
            state.reactive.add_modifier(m, None, Target::Node);
        }
        state
    }

    #[test]
    fn test_classify_order() {
        let s = state(NodeDef::entry("e").constraint(ConstraintDef::max("max1", 1.0)));
        assert_eq!(s.classify("hidden"), FieldKind::Hidden);
        assert_eq!(s.classify("max1"), FieldKind::Constraint(0));
        assert_eq!(s.classify("pts"), FieldKind::Cost("pts".into()));
    }

    #[test]
    fn test_fold_in_declaration_order() {
        let s = state(
            NodeDef::entry("e")
                .cost("pts", 10.0)
                .modifier(ModifierDef::new(ModifierOp::Set, "pts", 20.0))
                .modifier(ModifierDef::new(ModifierOp::Increment, "pts", 5.0)),
        );
        assert_eq!(s.derived_cost("pts"), 25.0);
    }

    #[test]
    fn test_constraint_limit_modifier() {
        let s = state(
            NodeDef::entry("e")
                .constraint(ConstraintDef::max("max1", 1.0))
                .modifier(ModifierDef::new(ModifierOp::Increment, "max1", 2.0)),
        );
        assert_eq!(s.derived_limit(0), Some(3.0));
    }

    #[test]
    fn test_category_defaults_and_modifiers() {
        let s = state(
            NodeDef::unit("u")
                .category_link(rosterforge_core::CategoryDef::primary("troops"))
                .modifier(ModifierDef::new(ModifierOp::SetPrimary, "category", "hq")),
        );
        let fold = s.fold_categories();
        assert_eq!(fold.primary.as_deref(), Some("hq"));
        assert!(fold.categories.contains("troops"));
    }
}
