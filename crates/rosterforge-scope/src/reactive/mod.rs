//! Reactive primitives owned by one node state.
//!
//! Conditions, condition groups, repeats, modifiers, modifier groups and
//! constraints live in index-addressed vectors. Each primitive keeps its
//! last `computed` value; delivering an input recomputes it and, when the
//! value moved, walks up its owner chain. Modifiers and constraints that
//! flip are reported back as [`Change`]s so the node can re-derive fields.

mod condition;
mod constraint;
mod inputs;
mod modifier;
mod repeat;


pub use condition::{Condition, ConditionGroup};
pub use constraint::Constraint;
pub use inputs::Inputs;
pub use modifier::{fold_scalar, CategoryFold, Modifier, ModifierGroup, Target};
pub use repeat::Repeat;

use rosterforge_core::{
    ConditionDef, ConditionGroupDef, ConstraintDef, ModifierDef, ModifierGroupDef, NodeId, Query,
    QueryHash, RepeatDef,
};

use crate::scope::{Port, Slot};

/// Who is told when a condition, group or repeat recomputes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    Group(usize),
    Modifier(usize),
    ModifierGroup(usize),
}

/// A modifier or constraint whose computed value changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Change {
    Modifier(usize),
    Constraint(usize),
}

/// One bucket a primitive reads, before scope resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Watch {
    pub slot: Slot,
    pub port: Port,
    pub query: Query,
    pub hash: QueryHash,
}

/// Container of a node's primitives.
#[derive(Debug, Clone, Default)]
pub struct Reactive {
    pub(crate) conditions: Vec<Condition>,
    pub(crate) condition_groups: Vec<ConditionGroup>,
    pub(crate) repeats: Vec<Repeat>,
    pub(crate) modifiers: Vec<Modifier>,
    pub(crate) modifier_groups: Vec<ModifierGroup>,
    pub(crate) constraints: Vec<Option<Constraint>>,
}

impl Reactive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn repeats(&self) -> &[Repeat] {
        &self.repeats
    }

    pub fn modifiers(&self) -> &[Modifier] {
        &self.modifiers
    }

    pub fn constraint(&self, index: usize) -> Option<&Constraint> {
        self.constraints.get(index).and_then(Option::as_ref)
    }

    /// Live constraints with their indices.
    pub fn constraints(&self) -> impl Iterator<Item = (usize, &Constraint)> {
        self.constraints
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.as_ref().map(|c| (i, c)))
    }

    // ---- construction ----

    pub(crate) fn add_condition(&mut self, def: &ConditionDef, owner: Owner) -> usize {
        self.conditions.push(Condition::new(def.clone(), owner));
        self.conditions.len() - 1
    }

    pub(crate) fn add_condition_group(&mut self, def: &ConditionGroupDef, owner: Owner) -> usize {
        let index = self.condition_groups.len();
        self.condition_groups
            .push(ConditionGroup::new(def.kind, owner));
        let conditions = def
            .conditions
            .iter()
            .map(|c| self.add_condition(c, Owner::Group(index)))
            .collect();
        let groups = def
            .groups
            .iter()
            .map(|g| self.add_condition_group(g, Owner::Group(index)))
            .collect();
        let group = &mut self.condition_groups[index];
        group.conditions = conditions;
        group.groups = groups;
        let computed = self.compute_group(index);
        self.condition_groups[index].computed = computed;
        index
    }

    pub(crate) fn add_repeat(&mut self, def: &RepeatDef, owner: Owner) -> usize {
        self.repeats.push(Repeat::new(def.clone(), owner));
        self.repeats.len() - 1
    }

    /// Instantiates a modifier and its inputs. Returns its index.
    pub(crate) fn add_modifier(
        &mut self,
        def: &ModifierDef,
        parent: Option<usize>,
        target: Target,
    ) -> usize {
        let index = self.modifiers.len();
        self.modifiers.push(Modifier {
            op: def.op,
            field: def.field.clone(),
            value: def.value.clone(),
            target,
            parent,
            conditions: Vec::new(),
            groups: Vec::new(),
            repeats: Vec::new(),
            computed: 0.0,
            retired: false,
        });
        let owner = Owner::Modifier(index);
        let conditions = def
            .conditions
            .iter()
            .map(|c| self.add_condition(c, owner))
            .collect();
        let groups = def
            .condition_groups
            .iter()
            .map(|g| self.add_condition_group(g, owner))
            .collect();
        let repeats = def
            .repeats
            .iter()
            .map(|r| self.add_repeat(r, owner))
            .collect();
        let modifier = &mut self.modifiers[index];
        modifier.conditions = conditions;
        modifier.groups = groups;
        modifier.repeats = repeats;
        let computed = self.compute_modifier(index);
        self.modifiers[index].computed = computed;
        index
    }

    /// Instantiates a modifier group, its nested modifiers and groups.
    pub(crate) fn add_modifier_group(
        &mut self,
        def: &ModifierGroupDef,
        parent: Option<usize>,
        target: Target,
    ) -> usize {
        let index = self.modifier_groups.len();
        self.modifier_groups.push(ModifierGroup {
            parent,
            ..ModifierGroup::default()
        });
        let owner = Owner::ModifierGroup(index);
        let conditions = def
            .conditions
            .iter()
            .map(|c| self.add_condition(c, owner))
            .collect();
        let groups = def
            .condition_groups
            .iter()
            .map(|g| self.add_condition_group(g, owner))
            .collect();
        let repeats = def
            .repeats
            .iter()
            .map(|r| self.add_repeat(r, owner))
            .collect();
        {
            let group = &mut self.modifier_groups[index];
            group.conditions = conditions;
            group.groups = groups;
            group.repeats = repeats;
        }
        let computed = self.compute_modifier_group(index);
        self.modifier_groups[index].computed = computed;

        let modifiers = def
            .modifiers
            .iter()
            .map(|m| self.add_modifier(m, Some(index), target))
            .collect();
        let children = def
            .groups
            .iter()
            .map(|g| self.add_modifier_group(g, Some(index), target))
            .collect();
        let group = &mut self.modifier_groups[index];
        group.modifiers = modifiers;
        group.children = children;
        index
    }

    /// Stores a constraint, reusing the first slot freed by a removal.
    pub(crate) fn add_constraint(&mut self, constraint: Constraint) -> usize {
        match self.constraints.iter().position(Option::is_none) {
            Some(index) => {
                self.constraints[index] = Some(constraint);
                index
            }
            None => {
                self.constraints.push(Some(constraint));
                self.constraints.len() - 1
            }
        }
    }

    /// Frees the constraint slot at `index`.
    pub(crate) fn remove_constraint(&mut self, index: usize) {
        if let Some(slot) = self.constraints.get_mut(index) {
            *slot = None;
        }
    }

    // ---- inputs ----

    /// Every bucket the live primitives read.
    pub fn watches(&self) -> Vec<Watch> {
        let mut out = Vec::new();
        for i in 0..self.conditions.len() {
            self.condition_watches(i, &mut out);
        }
        for i in 0..self.repeats.len() {
            self.repeat_watches(i, &mut out);
        }
        for (i, _) in self.constraints() {
            self.constraint_watches(i, &mut out);
        }
        out
    }

    /// Buckets read by the given modifiers and groups, transitively.
    pub fn watches_of(&self, modifiers: &[usize], groups: &[usize]) -> Vec<Watch> {
        let mut conditions = Vec::new();
        let mut repeats = Vec::new();
        for &m in modifiers {
            self.collect_modifier_inputs(m, &mut conditions, &mut repeats);
        }
        for &g in groups {
            self.collect_modifier_group_inputs(g, &mut conditions, &mut repeats);
        }
        let mut out = Vec::new();
        for c in conditions {
            self.condition_watches(c, &mut out);
        }
        for r in repeats {
            self.repeat_watches(r, &mut out);
        }
        out
    }

    pub fn constraint_watches(&self, index: usize, out: &mut Vec<Watch>) {
        let Some(c) = self.constraint(index) else {
            return;
        };
        let slot = Slot::Constraint(index);
        out.push(Watch {
            slot,
            port: Port::Value,
            query: c.query.clone(),
            hash: c.hash(),
        });
        if let Some(hash) = c.total_hash() {
            out.push(Watch {
                slot,
                port: Port::Total,
                query: c.query.clone(),
                hash,
            });
        }
    }

    fn condition_watches(&self, index: usize, out: &mut Vec<Watch>) {
        let c = &self.conditions[index];
        if c.retired {
            return;
        }
        let (Some(query), Some(hash)) = (c.query(), c.hash()) else {
            return;
        };
        let slot = Slot::Condition(index);
        out.push(Watch {
            slot,
            port: Port::Value,
            query: query.clone(),
            hash,
        });
        if let Some(hash) = c.total_hash() {
            out.push(Watch {
                slot,
                port: Port::Total,
                query: query.clone(),
                hash,
            });
        }
    }

    fn repeat_watches(&self, index: usize, out: &mut Vec<Watch>) {
        let r = &self.repeats[index];
        if r.retired {
            return;
        }
        let slot = Slot::Repeat(index);
        out.push(Watch {
            slot,
            port: Port::Value,
            query: r.def.query.clone(),
            hash: r.hash(),
        });
        if let Some(hash) = r.total_hash() {
            out.push(Watch {
                slot,
                port: Port::Total,
                query: r.def.query.clone(),
                hash,
            });
        }
    }

    fn collect_group_conditions(&self, group: usize, conditions: &mut Vec<usize>) {
        let g = &self.condition_groups[group];
        conditions.extend(g.conditions.iter().copied());
        for &child in &g.groups {
            self.collect_group_conditions(child, conditions);
        }
    }

    fn collect_modifier_inputs(&self, m: usize, conditions: &mut Vec<usize>, repeats: &mut Vec<usize>) {
        let modifier = &self.modifiers[m];
        conditions.extend(modifier.conditions.iter().copied());
        for &g in &modifier.groups {
            self.collect_group_conditions(g, conditions);
        }
        repeats.extend(modifier.repeats.iter().copied());
    }

    fn collect_modifier_group_inputs(
        &self,
        g: usize,
        conditions: &mut Vec<usize>,
        repeats: &mut Vec<usize>,
    ) {
        let group = &self.modifier_groups[g];
        conditions.extend(group.conditions.iter().copied());
        for &cg in &group.groups {
            self.collect_group_conditions(cg, conditions);
        }
        repeats.extend(group.repeats.iter().copied());
        for &m in &group.modifiers {
            self.collect_modifier_inputs(m, conditions, repeats);
        }
        for &child in &group.children {
            self.collect_modifier_group_inputs(child, conditions, repeats);
        }
    }

    /// Delivers one input value and propagates the consequences.
    pub(crate) fn deliver(
        &mut self,
        slot: Slot,
        port: Port,
        scope: NodeId,
        value: f64,
        out: &mut Vec<Change>,
    ) {
        match slot {
            Slot::Condition(i) => {
                let Some(c) = self.conditions.get_mut(i) else {
                    return;
                };
                if c.retired {
                    return;
                }
                c.inputs.set(port, scope, value);
                self.update_condition(i, out);
            }
            Slot::Repeat(i) => {
                let Some(r) = self.repeats.get_mut(i) else {
                    return;
                };
                if r.retired {
                    return;
                }
                r.inputs.set(port, scope, value);
                self.update_repeat(i, out);
            }
            Slot::Constraint(i) => {
                let Some(Some(c)) = self.constraints.get_mut(i) else {
                    return;
                };
                c.inputs.set(port, scope, value);
                self.update_constraint(i, out);
            }
            Slot::CostType | Slot::CostTotal(_) => {}
        }
    }

    /// Drops the values `scope` delivered to one input.
    pub(crate) fn forget(&mut self, slot: Slot, scope: NodeId) {
        match slot {
            Slot::Condition(i) => {
                if let Some(c) = self.conditions.get_mut(i) {
                    c.inputs.forget(scope);
                }
            }
            Slot::Repeat(i) => {
                if let Some(r) = self.repeats.get_mut(i) {
                    r.inputs.forget(scope);
                }
            }
            Slot::Constraint(i) => {
                if let Some(Some(c)) = self.constraints.get_mut(i) {
                    c.inputs.forget(scope);
                }
            }
            Slot::CostType | Slot::CostTotal(_) => {}
        }
    }

    /// Recomputes every live input primitive against its stored inputs.
    pub(crate) fn recompute(&mut self, out: &mut Vec<Change>) {
        for i in 0..self.conditions.len() {
            if !self.conditions[i].retired {
                self.update_condition(i, out);
            }
        }
        for i in 0..self.repeats.len() {
            if !self.repeats[i].retired {
                self.update_repeat(i, out);
            }
        }
        for i in 0..self.constraints.len() {
            self.update_constraint(i, out);
        }
    }

    /// Changes an effective constraint limit.
    pub(crate) fn set_constraint_limit(&mut self, index: usize, limit: f64, out: &mut Vec<Change>) {
        if let Some(Some(c)) = self.constraints.get_mut(index) {
            c.limit = limit;
            self.update_constraint(index, out);
        }
    }

    /// Retires modifiers and groups together with their inputs.
    pub(crate) fn retire(&mut self, modifiers: &[usize], groups: &[usize]) {
        let mut conditions = Vec::new();
        let mut repeats = Vec::new();
        let mut all_modifiers = modifiers.to_vec();
        let mut all_groups = Vec::new();
        let mut stack = groups.to_vec();
        while let Some(g) = stack.pop() {
            all_groups.push(g);
            all_modifiers.extend(self.modifier_groups[g].modifiers.iter().copied());
            stack.extend(self.modifier_groups[g].children.iter().copied());
        }
        for &m in modifiers {
            self.collect_modifier_inputs(m, &mut conditions, &mut repeats);
        }
        for &g in groups {
            self.collect_modifier_group_inputs(g, &mut conditions, &mut repeats);
        }
        let mut condition_groups = Vec::new();
        for &m in &all_modifiers {
            condition_groups.extend(self.modifiers[m].groups.iter().copied());
        }
        for &g in &all_groups {
            condition_groups.extend(self.modifier_groups[g].groups.iter().copied());
        }
        while let Some(g) = condition_groups.pop() {
            let group = &mut self.condition_groups[g];
            group.retired = true;
            condition_groups.extend(group.groups.iter().copied());
        }
        for c in conditions {
            self.conditions[c].retired = true;
        }
        for r in repeats {
            self.repeats[r].retired = true;
        }
        for m in all_modifiers {
            self.modifiers[m].retired = true;
            self.modifiers[m].computed = 0.0;
        }
        for g in all_groups {
            self.modifier_groups[g].retired = true;
            self.modifier_groups[g].computed = 0.0;
        }
    }

    /// Drops retired primitives from the tail of every vector and trailing
    /// free constraint slots.
    ///
    /// Live primitives keep their indices. Returns the number dropped.
    pub(crate) fn compact(&mut self) -> usize {
        let before = self.conditions.len()
            + self.condition_groups.len()
            + self.repeats.len()
            + self.modifiers.len()
            + self.modifier_groups.len()
            + self.constraints.len();
        while self.conditions.last().is_some_and(|c| c.retired) {
            self.conditions.pop();
        }
        while self.condition_groups.last().is_some_and(|g| g.retired) {
            self.condition_groups.pop();
        }
        while self.repeats.last().is_some_and(|r| r.retired) {
            self.repeats.pop();
        }
        while self.modifiers.last().is_some_and(|m| m.retired) {
            self.modifiers.pop();
        }
        while self.modifier_groups.last().is_some_and(|g| g.retired) {
            self.modifier_groups.pop();
        }
        while matches!(self.constraints.last(), Some(None)) {
            self.constraints.pop();
        }
        before
            - (self.conditions.len()
                + self.condition_groups.len()
                + self.repeats.len()
                + self.modifiers.len()
                + self.modifier_groups.len()
                + self.constraints.len())
    }

    // ---- compute ----

    fn gate(&self, conditions: &[usize], groups: &[usize], repeats: &[usize]) -> f64 {
        let conditions_ok = conditions.iter().all(|&c| self.conditions[c].computed)
            && groups.iter().all(|&g| self.condition_groups[g].computed);
        if !conditions_ok {
            return 0.0;
        }
        if repeats.is_empty() {
            1.0
        } else {
            repeats.iter().map(|&r| self.repeats[r].computed).sum()
        }
    }

    fn compute_group(&self, index: usize) -> bool {
        let group = &self.condition_groups[index];
        let children = group
            .conditions
            .iter()
            .map(|&c| self.conditions[c].computed)
            .chain(group.groups.iter().map(|&g| self.condition_groups[g].computed));
        ConditionGroup::combine(group.kind, children)
    }

    fn compute_modifier(&self, index: usize) -> f64 {
        let m = &self.modifiers[index];
        if m.retired {
            return 0.0;
        }
        let parent = m
            .parent
            .map(|g| self.modifier_groups[g].computed)
            .unwrap_or(1.0);
        if parent == 0.0 {
            return 0.0;
        }
        parent * self.gate(&m.conditions, &m.groups, &m.repeats)
    }

    fn compute_modifier_group(&self, index: usize) -> f64 {
        let g = &self.modifier_groups[index];
        if g.retired {
            return 0.0;
        }
        let parent = g
            .parent
            .map(|p| self.modifier_groups[p].computed)
            .unwrap_or(1.0);
        if parent == 0.0 {
            return 0.0;
        }
        parent * self.gate(&g.conditions, &g.groups, &g.repeats)
    }

    // ---- update chains ----

    fn notify(&mut self, owner: Owner, out: &mut Vec<Change>) {
        match owner {
            Owner::Group(g) => self.update_group(g, out),
            Owner::Modifier(m) => self.update_modifier(m, out),
            Owner::ModifierGroup(g) => self.update_modifier_group(g, out),
        }
    }

    fn update_condition(&mut self, index: usize, out: &mut Vec<Change>) {
        let next = self.conditions[index].compute();
        let c = &mut self.conditions[index];
        if next != c.computed {
            c.computed = next;
            let owner = c.owner;
            self.notify(owner, out);
        }
    }

    fn update_group(&mut self, index: usize, out: &mut Vec<Change>) {
        let next = self.compute_group(index);
        let g = &mut self.condition_groups[index];
        if next != g.computed {
            g.computed = next;
            let owner = g.owner;
            self.notify(owner, out);
        }
    }

    fn update_repeat(&mut self, index: usize, out: &mut Vec<Change>) {
        let next = self.repeats[index].compute();
        let r = &mut self.repeats[index];
        if next != r.computed {
            r.computed = next;
            let owner = r.owner;
            self.notify(owner, out);
        }
    }

    fn update_modifier(&mut self, index: usize, out: &mut Vec<Change>) {
        let next = self.compute_modifier(index);
        let m = &mut self.modifiers[index];
        if next != m.computed {
            m.computed = next;
            out.push(Change::Modifier(index));
        }
    }

    fn update_modifier_group(&mut self, index: usize, out: &mut Vec<Change>) {
        let next = self.compute_modifier_group(index);
        let g = &mut self.modifier_groups[index];
        if next == g.computed {
            return;
        }
        g.computed = next;
        let modifiers = g.modifiers.clone();
        let children = g.children.clone();
        for m in modifiers {
            self.update_modifier(m, out);
        }
        for child in children {
            self.update_modifier_group(child, out);
        }
    }

    fn update_constraint(&mut self, index: usize, out: &mut Vec<Change>) {
        let Some(Some(c)) = self.constraints.get_mut(index) else {
            return;
        };
        let next = c.compute();
        if next != c.computed {
            c.computed = next;
            out.push(Change::Constraint(index));
        }
    }

    /// Builds a definition constraint for `owner_id`.
    pub(crate) fn constraint_for(def: &ConstraintDef, owner_id: &str, key: Option<String>) -> Constraint {
        let query = def.query(owner_id);
        Constraint::new(def.clone(), query, key)
    }
}
