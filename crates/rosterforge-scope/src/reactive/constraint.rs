//! Live constraints.

use rosterforge_core::{ConstraintDef, Query, QueryHash, ScopeName};

use super::inputs::Inputs;

/// A min/max check of a live query against an effective limit.
#[derive(Debug, Clone)]
pub struct Constraint {
    pub(crate) def: ConstraintDef,
    pub(crate) query: Query,
    /// Key of an extra constraint; `None` for definition constraints.
    pub(crate) key: Option<String>,
    pub(crate) inputs: Inputs,
    pub(crate) limit: f64,
    pub(crate) computed: bool,
    /// Modifiers owned by an extra constraint, retired with it.
    pub(crate) modifiers: Vec<usize>,
    pub(crate) modifier_groups: Vec<usize>,
}

impl Constraint {
    pub(crate) fn new(def: ConstraintDef, query: Query, key: Option<String>) -> Self {
        let ancestor = query.scope == ScopeName::Ancestor;
        let limit = def.value;
        let mut constraint = Self {
            def,
            query,
            key,
            inputs: Inputs::new(ancestor),
            limit,
            computed: false,
            modifiers: Vec::new(),
            modifier_groups: Vec::new(),
        };
        constraint.computed = constraint.compute();
        constraint
    }

    /// Amount the limit is compared against.
    pub fn observed(&self) -> f64 {
        self.inputs.observed(self.query.percent_value)
    }

    /// Whether the constraint is currently violated.
    pub fn compute(&self) -> bool {
        self.def.is_violated(self.observed(), self.limit)
    }

    pub fn computed(&self) -> bool {
        self.computed
    }

    pub fn def(&self) -> &ConstraintDef {
        &self.def
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Effective limit after modifiers.
    pub fn limit(&self) -> f64 {
        self.limit
    }

    pub(crate) fn hash(&self) -> QueryHash {
        self.query.hash()
    }

    pub(crate) fn total_hash(&self) -> Option<QueryHash> {
        self.query
            .percent_value
            .then(|| self.query.total().hash())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::Port;
    use rosterforge_core::NodeId;

    #[test]
    fn test_percent_constraint() {
        let def = ConstraintDef::max("c", 25.0)
            .on_field("pts")
            .in_scope("roster")
            .percent();
        let query = def.query("hq");
        let mut c = Constraint::new(def, query, None);
        c.inputs.set(Port::Value, NodeId::new(0, 0), 300.0);
        c.inputs.set(Port::Total, NodeId::new(0, 0), 1000.0);
        assert!(c.compute());
        c.inputs.set(Port::Value, NodeId::new(0, 0), 250.0);
        assert!(!c.compute());
    }

    #[test]
    fn test_min_with_zero_inputs_is_violated() {
        let def = ConstraintDef::min("c", 1.0);
        let query = def.query("troops");
        assert!(Constraint::new(def, query, None).computed());
    }
}
