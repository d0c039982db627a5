//! Brute-force recount of scope aggregators.

use std::collections::HashMap;

use tracing::error;

use rosterforge_core::{Boundary, IncludeFlags, NodeId, QueryHash, Result, RosterError};

use super::propagate::passes;
use super::StateTree;
use crate::scope::EPSILON;

const TOLERANCE: f64 = 1e-6;

/// A bucket whose maintained value disagrees with a recount.
#[derive(Debug, Clone, PartialEq)]
pub struct Mismatch {
    pub hash: QueryHash,
    pub expected: f64,
    pub actual: f64,
}

impl StateTree {
    /// Recounts every aggregated bucket of `at` from its descendants and
    /// returns the buckets that disagree.
    pub fn verify_aggregates(&self, at: NodeId) -> Result<Vec<Mismatch>> {
        let expected = self.recount(at)?;
        let scope = self.scope_ref(at)?;
        let mut mismatches = Vec::new();
        for (hash, &value) in &expected {
            let actual = scope.get(hash);
            if (actual - value).abs() > TOLERANCE {
                mismatches.push(Mismatch {
                    hash: hash.clone(),
                    expected: value,
                    actual,
                });
            }
        }
        for (hash, actual) in scope.buckets() {
            if hash.is_reserved() || expected.contains_key(hash) {
                continue;
            }
            if actual.abs() > TOLERANCE {
                mismatches.push(Mismatch {
                    hash: hash.clone(),
                    expected: 0.0,
                    actual,
                });
            }
        }
        mismatches.sort_by(|a, b| a.hash.cmp(&b.hash));
        Ok(mismatches)
    }

    /// Verifies `node` and every ancestor, failing on the first mismatch.
    pub fn check_invariants(&self, node: NodeId) -> Result<()> {
        self.verify_chain(node)
    }

    pub(crate) fn verify_chain(&self, node: NodeId) -> Result<()> {
        for at in self.self_and_ancestors(node) {
            if !self.state(at).is_some_and(|s| s.is_reactive()) {
                break;
            }
            if let Some(m) = self.verify_aggregates(at)?.into_iter().next() {
                error!(
                    event = "aggregate_mismatch",
                    node = %at,
                    hash = %m.hash,
                    expected = m.expected,
                    actual = m.actual,
                );
                return Err(RosterError::AggregateMismatch {
                    node: at,
                    hash: m.hash.to_string(),
                    expected: m.expected,
                    actual: m.actual,
                });
            }
        }
        Ok(())
    }

    fn recount(&self, at: NodeId) -> Result<HashMap<QueryHash, f64>> {
        self.scope_ref(at)?;
        let mut expected: HashMap<QueryHash, f64> = HashMap::new();
        for descendant in self.post_order(at) {
            if descendant == at {
                continue;
            }
            let Some(state) = self.state(descendant) else {
                continue;
            };
            let (Some(scope), Some(field)) = (state.scope.as_ref(), state.kind.contribution_field()) else {
                continue;
            };
            let Some(crossed) = self.crossed_boundaries(descendant, at) else {
                continue;
            };
            for flags in IncludeFlags::ALL {
                let mut factor = scope.propagate_amount();
                for &(boundary, p) in &crossed {
                    factor *= if passes(boundary, flags) { p } else { 0.0 };
                }
                if factor.abs() < EPSILON {
                    continue;
                }
                for key in scope.selection_keys() {
                    *expected
                        .entry(QueryHash::new(flags, field, Some(key)))
                        .or_insert(0.0) += factor;
                }
                for (type_id, unit) in scope.costs() {
                    for key in scope.cost_keys() {
                        *expected
                            .entry(QueryHash::new(flags, type_id, Some(key)))
                            .or_insert(0.0) += factor * unit;
                    }
                }
            }
        }
        expected.retain(|_, v| v.abs() > TOLERANCE);
        Ok(expected)
    }

    /// Boundaries strictly between `from` and its ancestor `to`, with their
    /// propagate amounts. `None` if a non-reactive node cuts the chain.
    fn crossed_boundaries(
        &self,
        from: NodeId,
        to: NodeId,
    ) -> Option<Vec<(Boundary, f64)>> {
        let mut crossed = Vec::new();
        let mut cursor = self.state(from)?.parent;
        while let Some(at) = cursor {
            if at == to {
                return Some(crossed);
            }
            let state = self.state(at)?;
            state.scope.as_ref()?;
            if let Some(boundary) = state.kind.boundary() {
                crossed.push((boundary, state.propagate_amount()));
            }
            cursor = state.parent;
        }
        None
    }
}
