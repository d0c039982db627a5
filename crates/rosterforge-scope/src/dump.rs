//! Human-readable snapshot of a node state.

use std::collections::BTreeMap;
use std::fmt;

use rosterforge_core::{ConstraintKind, NodeId, NodeKind};

use crate::reactive::Target;
use crate::state::NodeState;

/// One constraint line of a dump.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintLine {
    pub id: String,
    pub kind: ConstraintKind,
    pub hash: String,
    pub scope: String,
    pub observed: f64,
    pub limit: f64,
    pub violated: bool,
    pub extra: bool,
}

/// One modifier line of a dump.
#[derive(Debug, Clone, PartialEq)]
pub struct ModifierLine {
    pub target: Target,
    pub field: String,
    pub op: String,
    pub value: String,
    pub times: f64,
}

/// Snapshot of a node for debugging and diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDump {
    pub node: NodeId,
    pub def_id: String,
    pub kind: NodeKind,
    pub name: String,
    pub hidden: bool,
    pub amount: f64,
    pub propagate_amount: f64,
    pub enabled: bool,
    pub subscriptions: i64,
    pub filters: Vec<String>,
    pub categories: Vec<String>,
    pub unit_costs: BTreeMap<String, f64>,
    pub total_costs: BTreeMap<String, f64>,
    pub buckets: BTreeMap<String, f64>,
    pub listeners: BTreeMap<String, usize>,
    pub constraints: Vec<ConstraintLine>,
    pub modifiers: Vec<ModifierLine>,
}

impl NodeDump {
    pub fn capture(state: &NodeState) -> Self {
        let scope = state.scope();
        let buckets = scope
            .map(|s| s.buckets().map(|(h, v)| (h.to_string(), v)).collect())
            .unwrap_or_default();
        let listeners = scope
            .map(|s| {
                s.listener_table()
                    .into_iter()
                    .map(|(h, subs)| (h.to_string(), subs.len()))
                    .collect()
            })
            .unwrap_or_default();
        let constraints = state
            .constraints()
            .map(|c| ConstraintLine {
                id: c.def().id.clone(),
                kind: c.def().kind,
                hash: c.query().hash().to_string(),
                scope: c.query().scope.to_string(),
                observed: c.observed(),
                limit: c.limit(),
                violated: c.computed(),
                extra: c.key().is_some(),
            })
            .collect();
        let modifiers = state
            .reactive()
            .modifiers()
            .iter()
            .filter(|m| !m.retired)
            .map(|m| ModifierLine {
                target: m.target(),
                field: m.field().to_string(),
                op: format!("{:?}", m.op()),
                value: m.value().to_string(),
                times: m.computed(),
            })
            .collect();
        Self {
            node: state.id(),
            def_id: state.def_id().to_string(),
            kind: state.kind(),
            name: state.name().to_string(),
            hidden: state.hidden(),
            amount: state.amount(),
            propagate_amount: state.propagate_amount(),
            enabled: state.is_enabled(),
            subscriptions: state.subscription_count(),
            filters: scope
                .map(|s| s.filters().iter().cloned().collect())
                .unwrap_or_default(),
            categories: state.categories().iter().cloned().collect(),
            unit_costs: state.unit_costs().clone(),
            total_costs: state.total_costs().clone(),
            buckets,
            listeners,
            constraints,
            modifiers,
        }
    }
}

impl fmt::Display for NodeDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} {} ({:?}) \"{}\"{}",
            self.node,
            self.def_id,
            self.kind,
            self.name,
            if self.hidden { " [hidden]" } else { "" }
        )?;
        writeln!(
            f,
            "  amount={} propagate={} enabled={} subscriptions={}",
            self.amount, self.propagate_amount, self.enabled, self.subscriptions
        )?;
        if !self.filters.is_empty() {
            writeln!(f, "  filters: {}", self.filters.join(", "))?;
        }
        if !self.categories.is_empty() {
            writeln!(f, "  categories: {}", self.categories.join(", "))?;
        }
        for (type_id, total) in &self.total_costs {
            let unit = self.unit_costs.get(type_id).copied().unwrap_or(0.0);
            writeln!(f, "  cost {type_id}: unit={unit} total={total}")?;
        }
        if !self.buckets.is_empty() {
            writeln!(f, "  buckets:")?;
            for (hash, value) in &self.buckets {
                let listeners = self.listeners.get(hash).copied().unwrap_or(0);
                writeln!(f, "    {hash} = {value} ({listeners} listener(s))")?;
            }
        }
        for c in &self.constraints {
            writeln!(
                f,
                "  {:?} {}{} on {}@{}: {} vs {}{}",
                c.kind,
                c.id,
                if c.extra { " (extra)" } else { "" },
                c.hash,
                c.scope,
                c.observed,
                c.limit,
                if c.violated { " VIOLATED" } else { "" }
            )?;
        }
        for m in &self.modifiers {
            writeln!(
                f,
                "  modifier {:?} {} {} {} x{}",
                m.target, m.op, m.field, m.value, m.times
            )?;
        }
        Ok(())
    }
}
