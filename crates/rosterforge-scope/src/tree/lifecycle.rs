//! Node construction, subscription lifecycles and quantity changes.

use tracing::{debug, error, warn};

use rosterforge_core::{
    IncludeFlags, NodeDef, NodeId, NodeKind, Query, QueryHash, Result, RosterError, ScopeName,
};

use super::StateTree;
use crate::reactive::{Target, Watch};
use crate::scope::{Port, Scope, Subscriber};
use crate::state::NodeState;

impl StateTree {
    // ---- construction ----

    /// Adds a node built from `def` under `parent`.
    ///
    /// Non-reactive nodes only record their static defaults. Reactive nodes
    /// get a scope aggregator, their primitives and an initial `enable`.
    /// Forces start with an amount of one.
    pub fn add_node(&mut self, def: &NodeDef, parent: Option<NodeId>, reactive: bool) -> Result<NodeId> {
        if let Some(parent) = parent {
            let state = self.node(parent)?;
            if reactive && state.is_reactive() && !state.enabled {
                return Err(RosterError::LifecycleOrder {
                    node: parent,
                    reason: format!("cannot add a reactive child under disabled {parent}"),
                });
            }
        }
        let id = self.alloc(|id| NodeState::new(id, def, parent));
        match parent {
            Some(parent) => self.node_mut(parent)?.children.push(id),
            None => {
                if self.root.is_none() {
                    self.root = Some(id);
                }
            }
        }
        if reactive {
            if let Err(err) = self.init_reactive(id, def) {
                self.discard(id);
                return Err(err);
            }
        }
        debug!(
            event = "add_node",
            node = %id,
            def_id = %def.id,
            kind = ?def.kind,
            reactive = reactive,
        );
        Ok(id)
    }

    /// Undoes a partially constructed node so the arena looks as if it was
    /// never added.
    fn discard(&mut self, id: NodeId) {
        if self.state(id).is_some_and(|s| s.enabled) {
            for watch in self.watches(id) {
                self.unsubscribe(id, &watch);
            }
        }
        if self.state(id).is_some_and(|s| s.scope.is_some()) {
            if let Err(err) = self.retract(id) {
                warn!(event = "discard_retract_failed", node = %id, error = %err);
            }
        }
        self.purge_subscriptions(id);
        self.drain();
        if let Some(parent) = self.state(id).and_then(|s| s.parent) {
            if let Some(parent_state) = self.state_mut(parent) {
                parent_state.children.retain(|&c| c != id);
            }
        }
        self.externals.retain(|k, _| k.scope != id);
        self.queue
            .cancel_where(|k| k.scope == id || k.subscriber.owner() == Some(id));
        self.release(id);
        if self.root == Some(id) {
            self.root = None;
        }
        debug!(event = "discard_node", node = %id);
    }

    fn init_reactive(&mut self, id: NodeId, def: &NodeDef) -> Result<()> {
        self.node_mut(id)?.scope = Some(Scope::new());
        let filters = self.compute_filters(id);
        self.update_filters(id, filters)?;
        let categories = self.node(id)?.categories.clone();
        self.update_categories(id, categories)?;
        self.refresh_cost_keys(id)?;

        {
            let owner_id = def.primary_id().to_string();
            let state = self.node_mut(id)?;
            for constraint in &def.constraints {
                state
                    .reactive
                    .add_constraint(crate::reactive::Reactive::constraint_for(constraint, &owner_id, None));
            }
            for modifier in &def.modifiers {
                state.reactive.add_modifier(modifier, None, Target::Node);
            }
            for group in &def.modifier_groups {
                state.reactive.add_modifier_group(group, None, Target::Node);
            }
        }
        self.attach_info(id, &def.info, false)?;
        self.rederive_all(id)?;

        if def.kind == NodeKind::Force {
            self.node_mut(id)?.amount = 1.0;
            self.update_multipliers(id, 1.0, 1.0)?;
        }
        self.enable(id)
    }

    /// Quietly recomputes every derived field from the current primitives.
    pub(crate) fn rederive_all(&mut self, id: NodeId) -> Result<()> {
        let state = self.node_mut(id)?;
        state.name = state.derived_name();
        state.hidden = state.derived_hidden();
        state.page = state.derived_page();
        let fold = state.fold_categories();
        let categories_changed = fold.categories != state.categories;
        state.categories = fold.categories.clone();
        state.primary_category = fold.primary;
        let limits: Vec<(usize, f64)> = state
            .reactive
            .constraints()
            .filter_map(|(i, _)| state.derived_limit(i).map(|l| (i, l)))
            .collect();
        let mut ignored = Vec::new();
        for (index, limit) in limits {
            state.reactive.set_constraint_limit(index, limit, &mut ignored);
        }
        for index in 0..state.info.len() {
            for field in info_fields(state, index) {
                state.rederive_info(index, &field);
            }
        }
        let costs = state
            .cost_fields()
            .into_iter()
            .map(|t| {
                let value = state.derived_cost(&t);
                (t, value)
            })
            .collect();

        if state.is_reactive() {
            if categories_changed {
                self.update_categories(id, fold.categories)?;
                self.refresh_cost_keys(id)?;
            }
            self.update_costs(id, costs)?;
            self.refresh_totals(id);
        } else {
            state.unit_costs = costs;
        }
        Ok(())
    }

    // ---- subscriptions ----

    /// Every bucket the node listens to while enabled.
    pub(crate) fn watches(&self, node: NodeId) -> Vec<Watch> {
        let Some(state) = self.state(node) else {
            return Vec::new();
        };
        let mut watches = state.reactive.watches();
        watches.push(Watch {
            slot: crate::scope::Slot::CostType,
            port: Port::Value,
            query: Query::new(ScopeName::Itself, "costType"),
            hash: QueryHash::cost_type(),
        });
        for index in 0..state.known_cost_types.len() {
            watches.extend(self.cost_total_watch(node, index));
        }
        watches
    }

    pub(crate) fn cost_total_watch(&self, node: NodeId, index: usize) -> Option<Watch> {
        let type_id = self.state(node)?.known_cost_types.get(index)?;
        let query = Query::new(ScopeName::Itself, type_id.as_str()).recursive(true, false);
        Some(Watch {
            slot: crate::scope::Slot::CostTotal(index),
            port: Port::Value,
            hash: QueryHash::new(IncludeFlags::new(true, false), type_id, None),
            query,
        })
    }

    /// Registers one watch on every node its scope resolves to and delivers
    /// the current value immediately.
    pub(crate) fn subscribe(&mut self, node: NodeId, watch: &Watch) {
        let targets = self.find(node, &watch.query.scope, watch.query.shared);
        if targets.is_empty() {
            warn!(
                event = "unresolved_scope",
                node = %node,
                scope = %watch.query.scope,
                hash = %watch.hash,
            );
            return;
        }
        let subscriber = Subscriber::node(node, watch.slot, watch.port);
        for target in targets {
            let Some(scope) = self.state_mut(target).and_then(|s| s.scope.as_mut()) else {
                continue;
            };
            let added = scope.add_listener(watch.hash.clone(), subscriber);
            let value = scope.get(&watch.hash);
            if added {
                if let Some(state) = self.state_mut(node) {
                    state.subscriptions += 1;
                }
            }
            self.deliver(node, watch.slot, watch.port, target, value);
        }
    }

    /// Re-resolves one watch and deregisters it wherever it is found.
    pub(crate) fn unsubscribe(&mut self, node: NodeId, watch: &Watch) {
        let subscriber = Subscriber::node(node, watch.slot, watch.port);
        for target in self.find(node, &watch.query.scope, watch.query.shared) {
            let removed = self
                .state_mut(target)
                .and_then(|s| s.scope.as_mut())
                .is_some_and(|scope| scope.remove_listener(&watch.hash, &subscriber));
            if let Some(state) = self.state_mut(node) {
                if removed {
                    state.subscriptions -= 1;
                }
                state.reactive.forget(watch.slot, target);
            }
        }
    }

    /// Subscribes every primitive of `node` and settles the result.
    ///
    /// Idempotent. Fails if the node's reactive parent is disabled.
    pub fn enable(&mut self, node: NodeId) -> Result<()> {
        let state = self.node(node)?;
        if !state.is_reactive() {
            return Err(RosterError::NotReactive(node));
        }
        if state.enabled {
            return Ok(());
        }
        if let Some(parent) = state.parent {
            if self.state(parent).is_some_and(|p| p.is_reactive() && !p.enabled) {
                return Err(RosterError::LifecycleOrder {
                    node,
                    reason: format!("parent {parent} is disabled"),
                });
            }
        }
        self.node_mut(node)?.enabled = true;
        for watch in self.watches(node) {
            self.subscribe(node, &watch);
        }
        let mut changes = Vec::new();
        self.node_mut(node)?.reactive.recompute(&mut changes);
        self.apply_changes(node, changes);
        self.drain();
        debug!(
            event = "enable",
            node = %node,
            subscriptions = self.node(node)?.subscriptions,
        );
        Ok(())
    }

    /// Deregisters every subscription of `node`.
    ///
    /// Idempotent. Fails if a child is still enabled. With leak checks on,
    /// a non-zero subscription counter afterwards purges the strays and
    /// returns [`RosterError::SubscriptionLeak`].
    pub fn disable(&mut self, node: NodeId) -> Result<()> {
        let state = self.node(node)?;
        if !state.is_reactive() {
            return Err(RosterError::NotReactive(node));
        }
        if !state.enabled {
            return Ok(());
        }
        let enabled_child = state
            .children
            .iter()
            .copied()
            .find(|&c| self.state(c).is_some_and(|s| s.enabled));
        if let Some(child) = enabled_child {
            return Err(RosterError::LifecycleOrder {
                node,
                reason: format!("child {child} is still enabled"),
            });
        }
        for watch in self.watches(node) {
            self.unsubscribe(node, &watch);
        }
        self.node_mut(node)?.enabled = false;
        self.queue.cancel_where(|k| k.subscriber.owner() == Some(node));

        let count = self.node(node)?.subscriptions;
        if count != 0 {
            let purged = self.purge_subscriptions(node);
            if self.assert_mode.checks_leaks() {
                error!(
                    event = "subscription_leak",
                    node = %node,
                    count = count,
                    purged = purged,
                );
                return Err(RosterError::SubscriptionLeak { node, count });
            }
            debug!(event = "subscription_purge", node = %node, purged = purged);
        }
        debug!(event = "disable", node = %node);
        Ok(())
    }

    fn purge_subscriptions(&mut self, node: NodeId) -> usize {
        let mut purged = 0;
        for entry in &mut self.entries {
            if let Some(scope) = entry.state.as_mut().and_then(|s| s.scope.as_mut()) {
                purged += scope.purge_owner(node);
            }
        }
        if let Some(state) = self.state_mut(node) {
            state.subscriptions = 0;
        }
        purged
    }

    // ---- structure ----

    /// Moves `node` under `new_parent`.
    ///
    /// The subtree is disabled leaf-first and its contribution retracted.
    /// After the move the contribution is restored under the old keys, the
    /// keys are recomputed for the new position, and the subtree is
    /// re-enabled parent-first.
    pub fn set_parent(&mut self, node: NodeId, new_parent: NodeId) -> Result<()> {
        self.node(new_parent)?;
        let old_parent = self.node(node)?.parent;
        if old_parent == Some(new_parent) {
            return Ok(());
        }
        if self.self_and_ancestors(new_parent).contains(&node) {
            return Err(RosterError::LifecycleOrder {
                node,
                reason: format!("{new_parent} is inside the moved subtree"),
            });
        }

        let subtree = self.post_order(node);
        let was_enabled: Vec<NodeId> = subtree
            .iter()
            .copied()
            .filter(|&n| self.state(n).is_some_and(|s| s.enabled))
            .collect();
        for &n in &subtree {
            if was_enabled.contains(&n) {
                self.disable(n)?;
            }
        }

        let reactive = self.node(node)?.is_reactive();
        let propagate = if reactive { self.retract(node)? } else { 0.0 };

        self.reattach(node, new_parent)?;

        if reactive {
            self.restore(node, propagate)?;
            self.refresh_filters(node)?;
            self.refresh_cost_keys(node)?;
            let types: Vec<String> = self.scope_ref(node)?.cost_types().iter().cloned().collect();
            self.announce_cost_types(node, &types);
        }

        for &n in subtree.iter().rev() {
            if was_enabled.contains(&n) {
                self.enable(n)?;
            }
        }
        self.drain();
        debug!(
            event = "set_parent",
            node = %node,
            parent = %new_parent,
            subtree = subtree.len(),
        );
        Ok(())
    }

    /// Moves the node in the arena without touching subscriptions or
    /// aggregates.
    pub(crate) fn reattach(&mut self, node: NodeId, new_parent: NodeId) -> Result<()> {
        if let Some(old) = self.node(node)?.parent {
            if let Some(old_state) = self.state_mut(old) {
                old_state.children.retain(|&c| c != node);
            }
        }
        self.node_mut(new_parent)?.children.push(node);
        self.node_mut(node)?.parent = Some(new_parent);
        if self.root == Some(node) {
            self.root = None;
        }
        Ok(())
    }

    /// Removes `node` and its subtree, retracting their contributions.
    pub fn remove_node(&mut self, node: NodeId) -> Result<()> {
        let subtree = self.post_order(node);
        for &n in &subtree {
            if self.state(n).is_some_and(|s| s.enabled) {
                self.disable(n)?;
            }
        }
        if self.node(node)?.is_reactive() {
            self.retract(node)?;
        }
        self.drain();

        if let Some(parent) = self.node(node)?.parent {
            if let Some(parent_state) = self.state_mut(parent) {
                parent_state.children.retain(|&c| c != node);
            }
        }
        for &n in &subtree {
            self.externals.retain(|k, _| k.scope != n);
            self.queue.cancel_where(|k| k.scope == n || k.subscriber.owner() == Some(n));
            self.release(n);
        }
        if self.root == Some(node) {
            self.root = None;
        }
        debug!(event = "remove_node", node = %node, removed = subtree.len());
        Ok(())
    }

    // ---- quantities ----

    /// Sets the selected count of a node and settles everything it feeds.
    pub fn set_selections(&mut self, node: NodeId, amount: f64) -> Result<()> {
        let state = self.node_mut(node)?;
        state.amount = amount;
        let excluded = state.excluded;
        if state.is_reactive() {
            let propagate = if excluded { 0.0 } else { amount };
            self.update_multipliers(node, amount, propagate)?;
            self.drain();
            self.refresh_totals_and_notify(node);
        }
        self.emit(|o| o.amount_changed(node, amount));
        debug!(event = "set_selections", node = %node, amount = amount);
        if self.assert_mode.verifies_aggregates() {
            self.verify_chain(node)?;
        }
        Ok(())
    }

    /// Excludes a node: it keeps its amount but propagates zero.
    pub fn set_excluded(&mut self, node: NodeId, excluded: bool) -> Result<()> {
        let state = self.node_mut(node)?;
        if state.excluded == excluded {
            return Ok(());
        }
        state.excluded = excluded;
        let amount = state.amount;
        self.set_selections(node, amount)
    }
}

/// Fields of an info block that modifiers may target.
fn info_fields(state: &NodeState, index: usize) -> Vec<String> {
    let mut fields = vec!["name".to_string(), "hidden".to_string()];
    if let Some(info) = state.info.get(index) {
        fields.extend(info.def.characteristics.iter().map(|(t, _)| t.clone()));
    }
    fields
}

