//! Conditions and condition groups.

use rosterforge_core::{
    ConditionDef, GroupKind, Query, QueryHash, ScopeName, SELECTIONS,
};

use super::inputs::Inputs;
use super::Owner;

/// Boolean test of a live query.
#[derive(Debug, Clone)]
pub struct Condition {
    pub(crate) def: ConditionDef,
    pub(crate) owner: Owner,
    pub(crate) inputs: Inputs,
    pub(crate) computed: bool,
    pub(crate) retired: bool,
}

impl Condition {
    pub(crate) fn new(def: ConditionDef, owner: Owner) -> Self {
        let ancestor = matches!(
            def.query.as_ref().map(|q| &q.scope),
            Some(ScopeName::Ancestor)
        );
        let mut condition = Self {
            def,
            owner,
            inputs: Inputs::new(ancestor),
            computed: false,
            retired: false,
        };
        condition.computed = condition.compute();
        condition
    }

    /// Pure function of the current inputs.
    pub fn compute(&self) -> bool {
        let percent = self.def.query.as_ref().is_some_and(|q| q.percent_value);
        self.def
            .comparator
            .test(self.inputs.observed(percent), self.def.value)
    }

    pub fn computed(&self) -> bool {
        self.computed
    }

    pub fn def(&self) -> &ConditionDef {
        &self.def
    }

    /// Bucket the condition reads. Instance checks read membership.
    pub(crate) fn hash(&self) -> Option<QueryHash> {
        let query = self.def.query.as_ref()?;
        if self.def.comparator.is_membership() {
            let id = query.child_id.as_deref().unwrap_or(SELECTIONS);
            return Some(QueryHash::membership(id));
        }
        Some(query.hash())
    }

    pub(crate) fn total_hash(&self) -> Option<QueryHash> {
        let query = self.def.query.as_ref()?;
        if query.percent_value && !self.def.comparator.is_membership() {
            Some(query.total().hash())
        } else {
            None
        }
    }

    pub(crate) fn query(&self) -> Option<&Query> {
        self.def.query.as_ref()
    }
}

/// AND/OR over child conditions and nested groups.
#[derive(Debug, Clone)]
pub struct ConditionGroup {
    pub(crate) kind: GroupKind,
    pub(crate) conditions: Vec<usize>,
    pub(crate) groups: Vec<usize>,
    pub(crate) owner: Owner,
    pub(crate) computed: bool,
    pub(crate) retired: bool,
}

impl ConditionGroup {
    pub(crate) fn new(kind: GroupKind, owner: Owner) -> Self {
        Self {
            kind,
            conditions: Vec::new(),
            groups: Vec::new(),
            owner,
            computed: true,
            retired: false,
        }
    }

    /// Combines child results. An empty group is satisfied.
    pub fn combine(kind: GroupKind, mut children: impl Iterator<Item = bool>) -> bool {
        match kind {
            GroupKind::And => children.all(|c| c),
            GroupKind::Or => {
                let mut any_child = false;
                for c in children {
                    if c {
                        return true;
                    }
                    any_child = true;
                }
                !any_child
            }
        }
    }

    pub fn computed(&self) -> bool {
        self.computed
    }
}
