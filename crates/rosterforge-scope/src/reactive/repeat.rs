//! Repeat counters.

use rosterforge_core::{QueryHash, RepeatDef, ScopeName};

use super::inputs::Inputs;
use super::Owner;

/// Integer multiplier derived from a live query.
#[derive(Debug, Clone)]
pub struct Repeat {
    pub(crate) def: RepeatDef,
    pub(crate) owner: Owner,
    pub(crate) inputs: Inputs,
    pub(crate) computed: f64,
    pub(crate) retired: bool,
}

impl Repeat {
    pub(crate) fn new(def: RepeatDef, owner: Owner) -> Self {
        let ancestor = def.query.scope == ScopeName::Ancestor;
        let mut repeat = Self {
            def,
            owner,
            inputs: Inputs::new(ancestor),
            computed: 0.0,
            retired: false,
        };
        repeat.computed = repeat.compute();
        repeat
    }

    pub fn compute(&self) -> f64 {
        self.def
            .count(self.inputs.observed(self.def.query.percent_value))
    }

    pub fn computed(&self) -> f64 {
        self.computed
    }

    pub(crate) fn hash(&self) -> QueryHash {
        self.def.query.hash()
    }

    pub(crate) fn total_hash(&self) -> Option<QueryHash> {
        self.def
            .query
            .percent_value
            .then(|| self.def.query.total().hash())
    }
}
