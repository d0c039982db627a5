//! Modifiers, modifier groups and the fold rules that turn active modifiers
//! into field values.

use std::collections::BTreeSet;

use rosterforge_core::{FieldValue, ModifierOp};

/// What a modifier's field lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Target {
    /// A field of the owning node.
    Node,
    /// A field of the node's n-th info block.
    Info(usize),
    /// The limit of an extra constraint, by constraint index.
    Extra(usize),
}

/// One field change, applied `computed` times while active.
#[derive(Debug, Clone)]
pub struct Modifier {
    pub(crate) op: ModifierOp,
    pub(crate) field: String,
    pub(crate) value: FieldValue,
    pub(crate) target: Target,
    pub(crate) parent: Option<usize>,
    pub(crate) conditions: Vec<usize>,
    pub(crate) groups: Vec<usize>,
    pub(crate) repeats: Vec<usize>,
    pub(crate) computed: f64,
    pub(crate) retired: bool,
}

impl Modifier {
    pub fn op(&self) -> ModifierOp {
        self.op
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn value(&self) -> &FieldValue {
        &self.value
    }

    pub fn target(&self) -> Target {
        self.target
    }

    /// Times applied; zero while inactive.
    pub fn computed(&self) -> f64 {
        self.computed
    }

    pub fn is_active(&self) -> bool {
        !self.retired && self.computed > 0.0
    }
}

/// Shared gate over nested modifiers and groups.
#[derive(Debug, Clone, Default)]
pub struct ModifierGroup {
    pub(crate) parent: Option<usize>,
    pub(crate) conditions: Vec<usize>,
    pub(crate) groups: Vec<usize>,
    pub(crate) repeats: Vec<usize>,
    pub(crate) modifiers: Vec<usize>,
    pub(crate) children: Vec<usize>,
    pub(crate) computed: f64,
    pub(crate) retired: bool,
}

impl ModifierGroup {
    pub fn computed(&self) -> f64 {
        self.computed
    }
}

/// Folds one active modifier onto a scalar value.
pub fn fold_scalar(op: ModifierOp, current: FieldValue, value: &FieldValue, times: f64) -> FieldValue {
    match op {
        ModifierOp::Set => value.clone(),
        ModifierOp::Increment => FieldValue::Number(current.as_number() + value.as_number() * times),
        ModifierOp::Decrement => FieldValue::Number(current.as_number() - value.as_number() * times),
        ModifierOp::Append => {
            let base = current.as_text();
            let tail = value.as_text();
            if base.is_empty() {
                FieldValue::Text(tail)
            } else {
                FieldValue::Text(format!("{base} {tail}"))
            }
        }
        ModifierOp::Add | ModifierOp::Remove | ModifierOp::SetPrimary | ModifierOp::UnsetPrimary => {
            current
        }
    }
}

/// Category membership being folded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryFold {
    pub categories: BTreeSet<String>,
    pub primary: Option<String>,
}

impl CategoryFold {
    pub fn apply(&mut self, op: ModifierOp, id: &str) {
        match op {
            ModifierOp::Add => {
                self.categories.insert(id.to_string());
            }
            ModifierOp::Remove => {
                self.categories.remove(id);
                if self.primary.as_deref() == Some(id) {
                    self.primary = None;
                }
            }
            ModifierOp::SetPrimary => {
                self.categories.insert(id.to_string());
                self.primary = Some(id.to_string());
            }
            ModifierOp::UnsetPrimary => {
                if self.primary.as_deref() == Some(id) {
                    self.primary = None;
                }
            }
            ModifierOp::Set => {
                self.categories.clear();
                self.categories.insert(id.to_string());
                self.primary = Some(id.to_string());
            }
            ModifierOp::Increment | ModifierOp::Decrement | ModifierOp::Append => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_scales_with_times() {
        let v = fold_scalar(
            ModifierOp::Increment,
            FieldValue::Number(3.0),
            &FieldValue::Number(2.0),
            3.0,
        );
        assert_eq!(v, FieldValue::Number(9.0));
    }

    #[test]
    fn test_append_joins_with_space() {
        let v = fold_scalar(
            ModifierOp::Append,
            FieldValue::Text("Captain".into()),
            &FieldValue::Text("(Warlord)".into()),
            1.0,
        );
        assert_eq!(v, FieldValue::Text("Captain (Warlord)".into()));
    }

    #[test]
    fn test_category_fold() {
        let mut fold = CategoryFold::default();
        fold.apply(ModifierOp::Add, "troops");
        fold.apply(ModifierOp::SetPrimary, "hq");
        assert_eq!(fold.primary.as_deref(), Some("hq"));
        assert!(fold.categories.contains("troops"));

        fold.apply(ModifierOp::Remove, "hq");
        assert_eq!(fold.primary, None);
        assert_eq!(fold.categories.len(), 1);
    }
}
