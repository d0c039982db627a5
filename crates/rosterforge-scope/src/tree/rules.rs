//! Attaching rules to live nodes.

use tracing::debug;

use rosterforge_core::{
    ConstraintDef, ExtraConstraintDef, InfoDef, MaxCost, ModifierDef, ModifierGroupDef, NodeId,
    Result, RosterError,
};

use super::StateTree;
use crate::reactive::{Reactive, Target, Watch};
use crate::scope::{Slot, Subscriber};
use crate::state::InfoState;

impl StateTree {
    /// Adds definition constraints to a reactive node.
    pub fn add_constraints(&mut self, node: NodeId, defs: &[ConstraintDef]) -> Result<()> {
        let state = self.node_mut(node)?;
        if !state.is_reactive() {
            return Err(RosterError::NotReactive(node));
        }
        let owner_id = state.primary_id().to_string();
        let indices: Vec<usize> = defs
            .iter()
            .map(|def| {
                state
                    .reactive
                    .add_constraint(Reactive::constraint_for(def, &owner_id, None))
            })
            .collect();
        self.activate_constraints(node, &indices)
    }

    /// Adds host-owned constraints, replacing any with the same key.
    pub fn add_extra_constraints(&mut self, node: NodeId, defs: &[ExtraConstraintDef]) -> Result<()> {
        if !self.node(node)?.is_reactive() {
            return Err(RosterError::NotReactive(node));
        }
        let mut indices = Vec::with_capacity(defs.len());
        for def in defs {
            if self.node(node)?.extra_keys.contains_key(&def.key) {
                self.remove_extra_constraint(node, &def.key)?;
            }
            let state = self.node_mut(node)?;
            let index = state.reactive.add_constraint(Reactive::constraint_for(
                &def.constraint,
                &def.owner_id,
                Some(def.key.clone()),
            ));
            let modifiers: Vec<usize> = def
                .modifiers
                .iter()
                .map(|m| state.reactive.add_modifier(m, None, Target::Extra(index)))
                .collect();
            let groups: Vec<usize> = def
                .modifier_groups
                .iter()
                .map(|g| state.reactive.add_modifier_group(g, None, Target::Extra(index)))
                .collect();
            if let Some(Some(constraint)) = state.reactive.constraints.get_mut(index) {
                constraint.modifiers = modifiers.clone();
                constraint.modifier_groups = groups.clone();
            }
            state.extra_keys.insert(def.key.clone(), index);
            if state.enabled {
                let watches = state.reactive.watches_of(&modifiers, &groups);
                self.subscribe_all(node, &watches);
            }
            indices.push(index);
        }
        self.activate_constraints(node, &indices)
    }

    /// Removes the extra constraint registered under `key`, with its
    /// modifiers. Returns `false` if there was none.
    pub fn remove_extra_constraint(&mut self, node: NodeId, key: &str) -> Result<bool> {
        let state = self.node(node)?;
        let Some(&index) = state.extra_keys.get(key) else {
            return Ok(false);
        };
        let Some(constraint) = state.reactive.constraint(index) else {
            return Ok(false);
        };
        let modifiers = constraint.modifiers.clone();
        let groups = constraint.modifier_groups.clone();
        if state.enabled {
            let mut watches = state.reactive.watches_of(&modifiers, &groups);
            state.reactive.constraint_watches(index, &mut watches);
            for watch in &watches {
                self.unsubscribe(node, watch);
            }
        }
        let state = self.node_mut(node)?;
        state.reactive.retire(&modifiers, &groups);
        state.reactive.remove_constraint(index);
        state.extra_keys.remove(key);
        let dropped = state.reactive.compact();
        self.queue.cancel_where(|k| match k.subscriber {
            Subscriber::Node { node: owner, slot, .. } => {
                owner == node && slot == Slot::Constraint(index)
            }
            Subscriber::External(_) => false,
        });
        self.emit(|o| o.constraints_changed(node));
        debug!(event = "remove_extra_constraint", node = %node, key = key, dropped = dropped);
        Ok(true)
    }

    /// Adds modifiers and modifier groups targeting the node's own fields.
    pub fn add_modifiers(
        &mut self,
        node: NodeId,
        modifiers: &[ModifierDef],
        groups: &[ModifierGroupDef],
    ) -> Result<()> {
        let state = self.node_mut(node)?;
        let first_modifier = state.reactive.modifiers.len();
        let new_modifiers: Vec<usize> = modifiers
            .iter()
            .map(|m| state.reactive.add_modifier(m, None, Target::Node))
            .collect();
        let new_groups: Vec<usize> = groups
            .iter()
            .map(|g| state.reactive.add_modifier_group(g, None, Target::Node))
            .collect();
        if state.enabled {
            let watches = state.reactive.watches_of(&new_modifiers, &new_groups);
            self.subscribe_all(node, &watches);
        }
        self.rederive_from(node, first_modifier);
        self.drain();
        Ok(())
    }

    /// Attaches definition info blocks.
    pub fn add_info(&mut self, node: NodeId, infos: &[InfoDef]) -> Result<()> {
        self.attach_info(node, infos, false)?;
        self.drain();
        Ok(())
    }

    /// Attaches host-provided info blocks.
    pub fn add_extra_info(&mut self, node: NodeId, infos: &[InfoDef]) -> Result<()> {
        self.attach_info(node, infos, true)?;
        self.drain();
        Ok(())
    }

    pub(crate) fn attach_info(&mut self, node: NodeId, infos: &[InfoDef], extra: bool) -> Result<()> {
        if infos.is_empty() {
            return Ok(());
        }
        let state = self.node_mut(node)?;
        let first_modifier = state.reactive.modifiers.len();
        let mut new_modifiers = Vec::new();
        let mut new_groups = Vec::new();
        for info in infos {
            let index = state.info.len();
            state.info.push(InfoState::new(info.clone(), extra));
            for m in &info.modifiers {
                new_modifiers.push(state.reactive.add_modifier(m, None, Target::Info(index)));
            }
            for g in &info.modifier_groups {
                new_groups.push(state.reactive.add_modifier_group(g, None, Target::Info(index)));
            }
        }
        if state.enabled {
            let watches = state.reactive.watches_of(&new_modifiers, &new_groups);
            self.subscribe_all(node, &watches);
        }
        self.rederive_from(node, first_modifier);
        self.emit(|o| o.info_changed(node));
        Ok(())
    }

    /// Applies cost limits as extra constraints keyed `max::{type}::{name}`.
    ///
    /// A missing or negative value removes the limit. Keys not listed are
    /// left alone.
    pub fn set_max_costs(&mut self, node: NodeId, limits: &[MaxCost]) -> Result<()> {
        for limit in limits {
            let key = limit.key();
            debug!(event = "set_max_costs", node = %node, key = %key, bound = ?limit.bound());
            match limit.bound() {
                None => {
                    self.remove_extra_constraint(node, &key)?;
                }
                Some(value) => {
                    let existing = self.node(node)?.extra_keys.get(&key).copied();
                    match existing {
                        Some(index) => {
                            if let Some(Some(c)) = self.node_mut(node)?.reactive.constraints.get_mut(index) {
                                c.def.value = value;
                            }
                            if self.refresh_limit(node, index) {
                                self.emit(|o| o.constraints_changed(node));
                            }
                        }
                        None => {
                            let owner_id = self.node(node)?.primary_id().to_string();
                            let mut extra = limit.to_extra(value);
                            extra.owner_id = owner_id;
                            self.add_extra_constraints(node, &[extra])?;
                        }
                    }
                }
            }
        }
        self.drain();
        Ok(())
    }

    // ---- helpers ----

    fn subscribe_all(&mut self, node: NodeId, watches: &[Watch]) {
        for watch in watches {
            self.subscribe(node, watch);
        }
    }

    /// Computes limits of new constraints and subscribes them.
    fn activate_constraints(&mut self, node: NodeId, indices: &[usize]) -> Result<()> {
        for &index in indices {
            self.refresh_limit(node, index);
        }
        let state = self.node(node)?;
        if state.enabled {
            let mut watches = Vec::new();
            for &index in indices {
                state.reactive.constraint_watches(index, &mut watches);
            }
            self.subscribe_all(node, &watches);
        }
        if !indices.is_empty() {
            self.emit(|o| o.constraints_changed(node));
        }
        self.drain();
        Ok(())
    }

    /// Re-derives every field targeted by modifiers from `first` on.
    fn rederive_from(&mut self, node: NodeId, first: usize) {
        let Some(state) = self.state(node) else {
            return;
        };
        let mut fields: Vec<(Target, String)> = state.reactive.modifiers()[first..]
            .iter()
            .map(|m| match m.target() {
                Target::Extra(_) => (m.target(), String::new()),
                _ => (m.target(), m.field().to_string()),
            })
            .collect();
        fields.sort();
        fields.dedup();
        let mut flipped = false;
        for (target, field) in fields {
            flipped |= self.rederive(node, target, &field);
        }
        if flipped {
            self.emit(|o| o.constraints_changed(node));
        }
    }
}
