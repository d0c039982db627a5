//! Turning primitive changes into derived node values.

use std::collections::{BTreeMap, BTreeSet};

use tracing::warn;

use rosterforge_core::{IncludeFlags, NodeId, QueryHash, Result};

use super::StateTree;
use crate::reactive::{Change, Target};
use crate::scope::{Port, Slot, EPSILON};
use crate::state::FieldKind;

impl StateTree {
    /// Routes one delivered value to the subscribing node.
    pub(crate) fn deliver(&mut self, node: NodeId, slot: Slot, port: Port, scope: NodeId, value: f64) {
        let Some(state) = self.state_mut(node) else {
            return;
        };
        if !state.enabled {
            return;
        }
        match slot {
            Slot::CostType => self.discover_cost_types(node),
            Slot::CostTotal(_) => self.refresh_totals_and_notify(node),
            Slot::Condition(_) | Slot::Repeat(_) | Slot::Constraint(_) => {
                let mut changes = Vec::new();
                state.reactive.deliver(slot, port, scope, value, &mut changes);
                self.apply_changes(node, changes);
            }
        }
    }

    /// Re-derives every field touched by flipped modifiers and reports
    /// flipped constraints.
    pub(crate) fn apply_changes(&mut self, node: NodeId, changes: Vec<Change>) {
        if changes.is_empty() {
            return;
        }
        let mut fields: BTreeSet<(Target, String)> = BTreeSet::new();
        let mut constraints_flipped = false;
        {
            let Some(state) = self.state(node) else {
                return;
            };
            for change in changes {
                match change {
                    Change::Modifier(m) => {
                        let modifier = &state.reactive.modifiers()[m];
                        let field = match modifier.target() {
                            Target::Extra(_) => String::new(),
                            _ => modifier.field().to_string(),
                        };
                        fields.insert((modifier.target(), field));
                    }
                    Change::Constraint(_) => constraints_flipped = true,
                }
            }
        }
        for (target, field) in fields {
            constraints_flipped |= self.rederive(node, target, &field);
        }
        if constraints_flipped {
            self.emit(|o| o.constraints_changed(node));
        }
    }

    /// Recomputes one derived field. Returns `true` if a constraint flipped.
    pub(crate) fn rederive(&mut self, node: NodeId, target: Target, field: &str) -> bool {
        match target {
            Target::Node => self.rederive_node_field(node, field),
            Target::Info(index) => {
                let changed = self
                    .state_mut(node)
                    .is_some_and(|s| s.rederive_info(index, field));
                if changed {
                    self.emit(|o| o.info_changed(node));
                }
                false
            }
            Target::Extra(index) => self.refresh_limit(node, index),
        }
    }

    fn rederive_node_field(&mut self, node: NodeId, field: &str) -> bool {
        let Some(state) = self.state_mut(node) else {
            return false;
        };
        match state.classify(field) {
            FieldKind::Name => {
                let name = state.derived_name();
                if name != state.name {
                    state.name = name;
                    self.emit(|o| o.info_changed(node));
                }
            }
            FieldKind::Page => {
                let page = state.derived_page();
                if page != state.page {
                    state.page = page;
                    self.emit(|o| o.info_changed(node));
                }
            }
            FieldKind::Hidden => {
                let hidden = state.derived_hidden();
                let was_hidden = state.hidden;
                if hidden != was_hidden {
                    state.hidden = hidden;
                    self.emit(|o| o.hidden_changed(node, hidden, was_hidden));
                }
            }
            FieldKind::Category => self.refresh_categories(node),
            FieldKind::Constraint(index) => return self.refresh_limit(node, index),
            FieldKind::Cost(type_id) => self.refresh_unit_cost(node, &type_id),
        }
        false
    }

    /// Applies the effective limit of one constraint. Returns `true` if the
    /// constraint flipped.
    pub(crate) fn refresh_limit(&mut self, node: NodeId, index: usize) -> bool {
        let Some(state) = self.state_mut(node) else {
            return false;
        };
        let Some(limit) = state.derived_limit(index) else {
            return false;
        };
        let mut flipped = Vec::new();
        state.reactive.set_constraint_limit(index, limit, &mut flipped);
        !flipped.is_empty()
    }

    fn refresh_unit_cost(&mut self, node: NodeId, type_id: &str) {
        let Some(state) = self.state(node) else {
            return;
        };
        let value = state.derived_cost(type_id);
        let current = state.unit_costs.get(type_id).copied();
        if current.is_some_and(|c| (c - value).abs() < EPSILON) {
            return;
        }
        let result = if state.is_reactive() {
            self.update_cost(node, type_id, value)
        } else {
            self.node_mut(node).map(|s| {
                s.unit_costs.insert(type_id.to_string(), value);
            })
        };
        log_failure(node, "update_cost", result);
        self.refresh_totals(node);
        self.emit(|o| o.costs_changed(node));
    }

    /// Folds category modifiers and moves the node between category keys.
    pub(crate) fn refresh_categories(&mut self, node: NodeId) {
        let Some(state) = self.state_mut(node) else {
            return;
        };
        let fold = state.fold_categories();
        if fold.categories == state.categories && fold.primary == state.primary_category {
            return;
        }
        let old = std::mem::replace(&mut state.categories, fold.categories.clone());
        let primary_changed = state.primary_category != fold.primary;
        state.primary_category = fold.primary;
        let reactive = state.is_reactive();

        if reactive {
            let result = self.update_categories(node, fold.categories.clone());
            log_failure(node, "update_categories", result);
            let result = self.refresh_cost_keys(node);
            log_failure(node, "refresh_cost_keys", result);
        }
        for added in fold.categories.difference(&old) {
            self.emit(|o| o.category_added(node, added));
        }
        for removed in old.difference(&fold.categories) {
            self.emit(|o| o.category_removed(node, removed));
        }
        if primary_changed {
            self.emit(|o| o.info_changed(node));
        }
    }

    // ---- cost totals ----

    /// Picks up cost types that appeared at or below `node` and starts
    /// tracking their totals.
    pub(crate) fn discover_cost_types(&mut self, node: NodeId) {
        let Some(state) = self.state(node) else {
            return;
        };
        let Some(scope) = state.scope.as_ref() else {
            return;
        };
        let fresh: Vec<String> = scope
            .cost_types()
            .iter()
            .filter(|t| !state.known_cost_types.contains(t))
            .cloned()
            .collect();
        if fresh.is_empty() {
            return;
        }
        for type_id in fresh {
            let Some(state) = self.state_mut(node) else {
                return;
            };
            state.known_cost_types.push(type_id);
            let index = state.known_cost_types.len() - 1;
            if state.enabled {
                let watch = self.cost_total_watch(node, index);
                if let Some(watch) = watch {
                    self.subscribe(node, &watch);
                }
            }
        }
        self.refresh_totals_and_notify(node);
    }

    pub(crate) fn refresh_totals_and_notify(&mut self, node: NodeId) {
        if self.refresh_totals(node) {
            self.emit(|o| o.costs_changed(node));
        }
    }

    /// Recomputes `total = p × (unit + inner)` per known cost type. Nodes
    /// without a multiplier boundary total `unit + inner`. Returns `true`
    /// if any total moved.
    pub(crate) fn refresh_totals(&mut self, node: NodeId) -> bool {
        let Some(state) = self.state(node) else {
            return false;
        };
        let Some(scope) = state.scope.as_ref() else {
            return false;
        };
        let p = scope.propagate_amount();
        let boundary = state.kind.boundary();
        let types: BTreeSet<&String> = state
            .known_cost_types
            .iter()
            .chain(state.unit_costs.keys())
            .collect();
        let mut totals = BTreeMap::new();
        for type_id in types {
            let unit = state.unit_costs.get(type_id).copied().unwrap_or(0.0);
            let inner = scope.get(&QueryHash::new(IncludeFlags::new(true, false), type_id, None));
            let total = match boundary {
                Some(_) => p * (unit + inner),
                None => unit + inner,
            };
            totals.insert(type_id.clone(), total);
        }
        let changed = totals.len() != state.total_costs.len()
            || totals.iter().any(|(t, v)| (state.total_cost(t) - v).abs() >= EPSILON);
        if changed {
            if let Some(state) = self.state_mut(node) {
                state.total_costs = totals;
            }
        }
        changed
    }
}

pub(crate) fn log_failure(node: NodeId, operation: &str, result: Result<()>) {
    if let Err(error) = result {
        warn!(
            event = "derive_failed",
            node = %node,
            operation = operation,
            error = %error,
        );
    }
}
