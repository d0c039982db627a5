//! Live query inputs shared by conditions, repeats and constraints.

use smallvec::SmallVec;

use rosterforge_core::NodeId;

use crate::scope::Port;

/// Latest values delivered to one primitive, per resolved scope node.
///
/// Most queries resolve to a single scope. `ancestor` queries resolve to
/// every ancestor; their value is the number of ancestors with a non-zero
/// bucket.
#[derive(Debug, Clone, Default)]
pub struct Inputs {
    ancestor: bool,
    values: SmallVec<[(NodeId, f64); 1]>,
    totals: SmallVec<[(NodeId, f64); 1]>,
}

impl Inputs {
    pub fn new(ancestor: bool) -> Self {
        Self {
            ancestor,
            ..Self::default()
        }
    }

    /// Stores the value delivered for `scope` on `port`.
    pub fn set(&mut self, port: Port, scope: NodeId, value: f64) {
        let list = match port {
            Port::Value => &mut self.values,
            Port::Total => &mut self.totals,
        };
        match list.iter_mut().find(|(s, _)| *s == scope) {
            Some(entry) => entry.1 = value,
            None => list.push((scope, value)),
        }
    }

    /// Forgets everything delivered by `scope`.
    pub fn forget(&mut self, scope: NodeId) {
        self.values.retain(|(s, _)| *s != scope);
        self.totals.retain(|(s, _)| *s != scope);
    }

    pub fn value(&self) -> f64 {
        if self.ancestor {
            self.values.iter().filter(|(_, v)| *v > 0.0).count() as f64
        } else {
            self.values.iter().map(|(_, v)| v).sum()
        }
    }

    pub fn total(&self) -> f64 {
        self.totals.iter().map(|(_, v)| v).sum()
    }

    /// The compared amount: raw, or a percentage of the total.
    pub fn observed(&self, percent: bool) -> f64 {
        if !percent {
            return self.value();
        }
        let total = self.total();
        if total == 0.0 {
            0.0
        } else {
            self.value() / total * 100.0
        }
    }
}
