//! Incremental maintenance of scope aggregators.
//!
//! A node contributes its propagate amount under each of its selection keys
//! and `propagate amount × unit cost` under each cost key, to every ancestor,
//! in all four flag combinations. Crossing an entry keeps only buckets that
//! recurse through selections and multiplies them by the entry's propagate
//! amount; crossing a force does the same for force-recursive buckets.
//! Every operation here expresses a change as a list of deltas and pushes
//! it up the ancestor chain.

use std::collections::{BTreeMap, BTreeSet};

use smallvec::SmallVec;
use tracing::trace;

use rosterforge_core::{Boundary, IncludeFlags, NodeId, NodeKind, QueryHash, Result, RosterError};

use super::StateTree;
use crate::queue::Notification;
use crate::scope::{ListenerKey, Scope, Subscriber, EPSILON};

/// One pending bucket change, re-keyed and re-scaled at every ancestor.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Delta {
    pub flags: IncludeFlags,
    pub field: String,
    pub key: String,
    pub value: f64,
}

/// Whether buckets with `flags` survive crossing `boundary`.
pub(crate) fn passes(boundary: Boundary, flags: IncludeFlags) -> bool {
    match boundary {
        Boundary::Selection => flags.selections,
        Boundary::Force => flags.forces,
    }
}

/// `factor` times the node's own contribution.
pub(crate) fn own_deltas(scope: &Scope, kind: NodeKind, factor: f64) -> Vec<Delta> {
    let mut out = Vec::new();
    let Some(field) = kind.contribution_field() else {
        return out;
    };
    if factor.abs() < EPSILON {
        return out;
    }
    for key in scope.selection_keys() {
        fan_out(&mut out, field, key, factor);
    }
    for (type_id, unit) in scope.costs() {
        if unit.abs() < EPSILON {
            continue;
        }
        for key in scope.cost_keys() {
            fan_out(&mut out, type_id, key, factor * unit);
        }
    }
    out
}

/// `factor` times every bucket of `scope` that crosses `boundary`.
pub(crate) fn inner_deltas(scope: &Scope, boundary: Boundary, factor: f64) -> Vec<Delta> {
    if factor.abs() < EPSILON {
        return Vec::new();
    }
    scope
        .buckets()
        .filter_map(|(hash, value)| {
            let (flags, field, key) = hash.parts()?;
            passes(boundary, flags).then(|| Delta {
                flags,
                field: field.to_string(),
                key: key.to_string(),
                value: value * factor,
            })
        })
        .collect()
}

/// `factor` times every aggregated bucket of a transparent node.
fn transparent_deltas(scope: &Scope, factor: f64) -> Vec<Delta> {
    scope
        .buckets()
        .filter_map(|(hash, value)| {
            let (flags, field, key) = hash.parts()?;
            Some(Delta {
                flags,
                field: field.to_string(),
                key: key.to_string(),
                value: value * factor,
            })
        })
        .collect()
}

fn fan_out(out: &mut Vec<Delta>, field: &str, key: &str, value: f64) {
    for flags in IncludeFlags::ALL {
        out.push(Delta {
            flags,
            field: field.to_string(),
            key: key.to_string(),
            value,
        });
    }
}

/// `(key, +1 | -1)` for every key entering or leaving a set.
fn key_changes(old: &BTreeSet<String>, new: &BTreeSet<String>) -> Vec<(String, f64)> {
    new.difference(old)
        .map(|k| (k.clone(), 1.0))
        .chain(old.difference(new).map(|k| (k.clone(), -1.0)))
        .collect()
}

fn selection_key_set(scope: &Scope) -> BTreeSet<String> {
    scope.selection_keys().map(str::to_string).collect()
}

fn cost_key_set(scope: &Scope) -> BTreeSet<String> {
    scope.cost_keys().map(str::to_string).collect()
}

impl StateTree {
    /// Adds `delta` to one bucket of `at` and enqueues its listeners.
    pub(crate) fn change_bucket(&mut self, at: NodeId, hash: &QueryHash, delta: f64) {
        let Some(scope) = self.state_mut(at).and_then(|s| s.scope.as_mut()) else {
            return;
        };
        if let Some((new, old)) = scope.change(hash, delta) {
            self.notify_listeners(at, hash, new, old);
        }
    }

    /// Overwrites one bucket of `at` and enqueues its listeners.
    pub(crate) fn set_bucket(&mut self, at: NodeId, hash: &QueryHash, value: f64) {
        let Some(scope) = self.state_mut(at).and_then(|s| s.scope.as_mut()) else {
            return;
        };
        if let Some((new, old)) = scope.set(hash, value) {
            self.notify_listeners(at, hash, new, old);
        }
    }

    fn notify_listeners(&mut self, at: NodeId, hash: &QueryHash, new: f64, old: f64) {
        let subscribers: SmallVec<[Subscriber; 4]> = match self.state(at).and_then(|s| s.scope.as_ref()) {
            Some(scope) => scope.listeners(hash).iter().copied().collect(),
            None => return,
        };
        for subscriber in subscribers {
            self.queue.enqueue(
                ListenerKey {
                    scope: at,
                    hash: hash.clone(),
                    subscriber,
                },
                Notification { new, old },
            );
        }
    }

    /// Applies `deltas` to every reactive ancestor of `from`, filtering and
    /// scaling them at each boundary crossed.
    pub(crate) fn push_deltas(&mut self, from: NodeId, mut deltas: Vec<Delta>) {
        let mut cursor = self.parent(from);
        while let Some(at) = cursor {
            if deltas.is_empty() {
                break;
            }
            let Some(state) = self.state(at) else {
                break;
            };
            if state.scope.is_none() {
                break;
            }
            let boundary = state.kind.boundary();
            let factor = state.propagate_amount();
            cursor = state.parent;

            for delta in &deltas {
                let hash = QueryHash::new(delta.flags, &delta.field, Some(&delta.key));
                self.change_bucket(at, &hash, delta.value);
            }
            if let Some(boundary) = boundary {
                deltas.retain(|d| passes(boundary, d.flags));
                for delta in &mut deltas {
                    delta.value *= factor;
                }
                deltas.retain(|d| d.value.abs() >= EPSILON);
            }
        }
    }

    // ---- multipliers ----

    /// Sets a node's raw and propagated amounts and pushes the difference
    /// of its own and inner contributions to its ancestors.
    pub fn update_multipliers(&mut self, node: NodeId, amount: f64, propagate: f64) -> Result<()> {
        let scope = self.scope_mut(node)?;
        let old = scope.propagate_amount;
        scope.amount = amount;
        scope.propagate_amount = propagate;
        if (propagate - old).abs() < EPSILON {
            return Ok(());
        }
        self.apply_fast_selections_update(node, propagate - old)
    }

    /// Pushes `factor × (own + inner)` contributions of `node`.
    ///
    /// Valid whenever only the multiplier changed: the node's keys, unit
    /// costs and index are unchanged, so the whole contribution scales.
    pub fn apply_fast_selections_update(&mut self, node: NodeId, factor: f64) -> Result<()> {
        let state = self.node(node)?;
        let kind = state.kind;
        let scope = state.scope.as_ref().ok_or(RosterError::NotReactive(node))?;
        let mut deltas = own_deltas(scope, kind, factor);
        if let Some(boundary) = kind.boundary() {
            deltas.extend(inner_deltas(scope, boundary, factor));
        }
        trace!(
            event = "selections_update",
            node = %node,
            factor = factor,
            deltas = deltas.len(),
        );
        self.push_deltas(node, deltas);
        Ok(())
    }

    /// Structural path: the node's own key sets changed. Pushes `±p` (and
    /// `±p × unit cost`) for every key that entered or left.
    pub fn apply_update(
        &mut self,
        node: NodeId,
        selection_keys: &[(String, f64)],
        cost_keys: &[(String, f64)],
    ) -> Result<()> {
        let state = self.node(node)?;
        let kind = state.kind;
        let scope = state.scope.as_ref().ok_or(RosterError::NotReactive(node))?;
        let Some(field) = kind.contribution_field() else {
            return Ok(());
        };
        let p = scope.propagate_amount;
        if p.abs() < EPSILON {
            return Ok(());
        }
        let mut deltas = Vec::new();
        for (key, sign) in selection_keys {
            fan_out(&mut deltas, field, key, sign * p);
        }
        for (key, sign) in cost_keys {
            for (type_id, unit) in scope.costs() {
                if unit.abs() >= EPSILON {
                    fan_out(&mut deltas, type_id, key, sign * p * unit);
                }
            }
        }
        self.push_deltas(node, deltas);
        Ok(())
    }

    /// Withdraws everything `node` contributes to its current ancestors.
    ///
    /// Boundary nodes drop their propagate amount to zero. Transparent
    /// nodes pass their whole index through unscaled, so they retract it
    /// directly. Returns the propagate amount to hand back to [`restore`].
    ///
    /// [`restore`]: StateTree::restore
    pub(crate) fn retract(&mut self, node: NodeId) -> Result<f64> {
        let state = self.node(node)?;
        let scope = state.scope.as_ref().ok_or(RosterError::NotReactive(node))?;
        let (amount, propagate) = (scope.amount(), scope.propagate_amount());
        match state.kind.boundary() {
            Some(_) => self.update_multipliers(node, amount, 0.0)?,
            None => {
                let deltas = transparent_deltas(scope, -1.0);
                self.push_deltas(node, deltas);
            }
        }
        Ok(propagate)
    }

    /// Re-adds the contribution withdrawn by [`retract`](StateTree::retract).
    pub(crate) fn restore(&mut self, node: NodeId, propagate: f64) -> Result<()> {
        let state = self.node(node)?;
        let scope = state.scope.as_ref().ok_or(RosterError::NotReactive(node))?;
        let amount = scope.amount();
        match state.kind.boundary() {
            Some(_) => self.update_multipliers(node, amount, propagate),
            None => {
                let deltas = transparent_deltas(scope, 1.0);
                self.push_deltas(node, deltas);
                Ok(())
            }
        }
    }

    // ---- key sets ----

    /// Replaces the ids a node's amount is counted under.
    pub fn update_filters(&mut self, node: NodeId, filters: BTreeSet<String>) -> Result<()> {
        let scope = self.scope_mut(node)?;
        let old_keys = selection_key_set(scope);
        let old_membership = scope.membership();
        scope.filters = filters;
        let changes = key_changes(&old_keys, &selection_key_set(scope));
        self.apply_update(node, &changes, &[])?;
        self.refresh_membership(node, &old_membership)
    }

    /// Replaces the categories a node's amount is counted under.
    pub fn update_categories(&mut self, node: NodeId, categories: BTreeSet<String>) -> Result<()> {
        let scope = self.scope_mut(node)?;
        let old_keys = selection_key_set(scope);
        let old_membership = scope.membership();
        scope.categories = categories;
        let changes = key_changes(&old_keys, &selection_key_set(scope));
        self.apply_update(node, &changes, &[])?;
        self.refresh_membership(node, &old_membership)
    }

    pub fn update_cost_filters(&mut self, node: NodeId, filters: BTreeSet<String>) -> Result<()> {
        let scope = self.scope_mut(node)?;
        let old_keys = cost_key_set(scope);
        scope.cost_filters = filters;
        let changes = key_changes(&old_keys, &cost_key_set(scope));
        self.apply_update(node, &[], &changes)
    }

    pub fn update_cost_categories(&mut self, node: NodeId, categories: BTreeSet<String>) -> Result<()> {
        let scope = self.scope_mut(node)?;
        let old_keys = cost_key_set(scope);
        scope.cost_categories = categories;
        let changes = key_changes(&old_keys, &cost_key_set(scope));
        self.apply_update(node, &[], &changes)
    }

    /// Keeps the node's own `is::{id}` buckets equal to its membership.
    fn refresh_membership(&mut self, node: NodeId, old: &BTreeSet<String>) -> Result<()> {
        let new = self.scope_ref(node)?.membership();
        for id in old.difference(&new) {
            self.set_bucket(node, &QueryHash::membership(id), 0.0);
        }
        for id in new.difference(old) {
            self.set_bucket(node, &QueryHash::membership(id), 1.0);
        }
        Ok(())
    }

    // ---- costs ----

    /// Replaces a node's per-unit costs.
    pub fn update_costs(&mut self, node: NodeId, costs: BTreeMap<String, f64>) -> Result<()> {
        let state = self.node_mut(node)?;
        let kind = state.kind;
        state.unit_costs = costs.clone();
        let scope = state.scope.as_mut().ok_or(RosterError::NotReactive(node))?;
        let old = std::mem::replace(&mut scope.costs, costs);
        let p = scope.propagate_amount;

        let mut deltas = Vec::new();
        if kind.contribution_field().is_some() && p.abs() >= EPSILON {
            let types: BTreeSet<&String> = old.keys().chain(scope.costs.keys()).collect();
            for type_id in types {
                let before = old.get(type_id).copied().unwrap_or(0.0);
                let after = scope.costs.get(type_id).copied().unwrap_or(0.0);
                let diff = after - before;
                if diff.abs() < EPSILON {
                    continue;
                }
                for key in scope.cost_keys() {
                    fan_out(&mut deltas, type_id, key, diff * p);
                }
            }
        }
        let types: Vec<String> = scope.costs.keys().cloned().collect();
        self.push_deltas(node, deltas);
        self.announce_cost_types(node, &types);
        Ok(())
    }

    /// Changes one per-unit cost.
    pub fn update_cost(&mut self, node: NodeId, type_id: &str, value: f64) -> Result<()> {
        let mut costs = self.scope_ref(node)?.costs().clone();
        costs.insert(type_id.to_string(), value);
        self.update_costs(node, costs)
    }

    /// Records cost types on `node` and its ancestors, bumping the
    /// `costType` bucket wherever a type is new.
    pub(crate) fn announce_cost_types(&mut self, node: NodeId, types: &[String]) {
        if types.is_empty() {
            return;
        }
        for at in self.self_and_ancestors(node) {
            let Some(scope) = self.state_mut(at).and_then(|s| s.scope.as_mut()) else {
                continue;
            };
            let before = scope.cost_types.len();
            scope.cost_types.extend(types.iter().cloned());
            let after = scope.cost_types.len();
            if after != before {
                self.set_bucket(at, &QueryHash::cost_type(), after as f64);
            }
        }
    }

    // ---- derived key sets ----

    /// Definition id, link target and ids of the groups enclosing the node
    /// up to its structural parent.
    pub(crate) fn compute_filters(&self, node: NodeId) -> BTreeSet<String> {
        let mut filters = BTreeSet::new();
        let Some(state) = self.state(node) else {
            return filters;
        };
        filters.insert(state.def_id.clone());
        filters.extend(state.target_id.clone());
        let mut cursor = state.parent;
        while let Some(at) = cursor {
            let Some(ancestor) = self.state(at) else {
                break;
            };
            if !ancestor.kind.is_group() {
                break;
            }
            filters.insert(ancestor.def_id.clone());
            filters.extend(ancestor.target_id.clone());
            cursor = ancestor.parent;
        }
        filters
    }

    /// Recomputes filters for `node` and, through groups, for the entries
    /// whose filters include it.
    pub(crate) fn refresh_filters(&mut self, node: NodeId) -> Result<()> {
        let filters = self.compute_filters(node);
        self.update_filters(node, filters)?;
        if self.node(node)?.kind.is_group() {
            let children = self.children(node).to_vec();
            for child in children {
                if self.state(child).is_some_and(|s| s.is_reactive()) {
                    self.refresh_filters(child)?;
                }
            }
        }
        Ok(())
    }

    /// Own keys plus the cost keys of the nearest enclosing entry, so an
    /// upgrade's cost also counts under its unit's categories.
    fn inherited_cost_keys(&self, node: NodeId) -> Result<(BTreeSet<String>, BTreeSet<String>)> {
        let state = self.node(node)?;
        let scope = self.scope_ref(node)?;
        let mut filters = scope.filters.clone();
        let mut categories = scope.categories.clone();
        if state.kind.is_entry() {
            let mut cursor = state.parent;
            while let Some(at) = cursor {
                let Some(ancestor) = self.state(at) else {
                    break;
                };
                match (ancestor.kind, ancestor.scope.as_ref()) {
                    (NodeKind::Entry { .. }, Some(outer)) => {
                        filters.extend(outer.cost_filters.iter().cloned());
                        categories.extend(outer.cost_categories.iter().cloned());
                        break;
                    }
                    (NodeKind::Force | NodeKind::Roster, _) => break,
                    _ => cursor = ancestor.parent,
                }
            }
        }
        Ok((filters, categories))
    }

    /// Recomputes cost keys for `node` and its descendants within the
    /// same force.
    pub(crate) fn refresh_cost_keys(&mut self, node: NodeId) -> Result<()> {
        let (filters, categories) = self.inherited_cost_keys(node)?;
        self.update_cost_filters(node, filters)?;
        self.update_cost_categories(node, categories)?;
        let children = self.children(node).to_vec();
        for child in children {
            let descend = self
                .state(child)
                .is_some_and(|s| s.is_reactive() && s.kind != NodeKind::Force);
            if descend {
                self.refresh_cost_keys(child)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passes() {
        let s = IncludeFlags::new(true, false);
        let f = IncludeFlags::new(false, true);
        assert!(passes(Boundary::Selection, s));
        assert!(!passes(Boundary::Selection, f));
        assert!(passes(Boundary::Force, f));
        assert!(!passes(Boundary::Force, IncludeFlags::default()));
    }

    #[test]
    fn test_own_deltas_cover_keys_flags_and_costs() {
        let mut scope = Scope::new();
        scope.filters.insert("captain".into());
        scope.cost_filters.insert("captain".into());
        scope.costs.insert("pts".into(), 80.0);

        let deltas = own_deltas(&scope, NodeKind::Entry { unit: true }, 2.0);
        // 2 selection keys + 2 cost keys, 4 flag combinations each.
        assert_eq!(deltas.len(), 16);
        let cost = deltas
            .iter()
            .find(|d| d.field == "pts" && d.key == "captain" && d.flags == IncludeFlags::ALL[3])
            .unwrap();
        assert_eq!(cost.value, 160.0);
    }

    #[test]
    fn test_groups_contribute_nothing_of_their_own() {
        let mut scope = Scope::new();
        scope.filters.insert("g".into());
        assert!(own_deltas(&scope, NodeKind::Group, 1.0).is_empty());
    }

    #[test]
    fn test_key_changes() {
        let old: BTreeSet<String> = ["a", "b"].iter().map(|s| s.to_string()).collect();
        let new: BTreeSet<String> = ["b", "c"].iter().map(|s| s.to_string()).collect();
        let changes = key_changes(&old, &new);
        assert_eq!(changes, vec![("c".to_string(), 1.0), ("a".to_string(), -1.0)]);
    }
}
