//! Per-node reactive state.
//!
//! A `NodeState` is one node of the configuration tree: its static defaults,
//! its scope aggregator (when constructed reactively), its primitives and
//! the field values currently derived from active modifiers.

mod derive;
mod info;

pub use derive::FieldKind;
pub use info::InfoState;

use std::collections::{BTreeMap, BTreeSet};

use rosterforge_core::{ConstraintKind, NodeDef, NodeId, NodeKind, ScopeName, SELECTIONS};

use crate::reactive::{Constraint, Reactive};
use crate::scope::Scope;

/// Static values a node falls back to when no modifier applies.
#[derive(Debug, Clone, Default)]
pub struct Defaults {
    pub name: String,
    pub hidden: bool,
    pub page: Option<String>,
    pub categories: BTreeSet<String>,
    pub primary_category: Option<String>,
    pub costs: BTreeMap<String, f64>,
}

impl Defaults {
    pub(crate) fn from_def(def: &NodeDef) -> Self {
        let mut costs = BTreeMap::new();
        for cost in &def.costs {
            *costs.entry(cost.type_id.clone()).or_insert(0.0) += cost.value;
        }
        Self {
            name: def.name.clone(),
            hidden: def.hidden,
            page: def.page.clone(),
            categories: def.categories.iter().map(|c| c.id.clone()).collect(),
            primary_category: def
                .categories
                .iter()
                .find(|c| c.primary)
                .map(|c| c.id.clone()),
            costs,
        }
    }
}

/// One node of the tree.
#[derive(Debug)]
pub struct NodeState {
    pub(crate) id: NodeId,
    pub(crate) def_id: String,
    pub(crate) target_id: Option<String>,
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) scope: Option<Scope>,
    pub(crate) reactive: Reactive,
    pub(crate) defaults: Defaults,
    pub(crate) name: String,
    pub(crate) hidden: bool,
    pub(crate) page: Option<String>,
    pub(crate) categories: BTreeSet<String>,
    pub(crate) primary_category: Option<String>,
    pub(crate) unit_costs: BTreeMap<String, f64>,
    pub(crate) total_costs: BTreeMap<String, f64>,
    pub(crate) known_cost_types: Vec<String>,
    pub(crate) info: Vec<InfoState>,
    pub(crate) extra_keys: BTreeMap<String, usize>,
    pub(crate) amount: f64,
    pub(crate) excluded: bool,
    pub(crate) enabled: bool,
    pub(crate) subscriptions: i64,
    pub(crate) default_option: Option<String>,
    pub(crate) checklist: bool,
}

impl NodeState {
    pub(crate) fn new(id: NodeId, def: &NodeDef, parent: Option<NodeId>) -> Self {
        let defaults = Defaults::from_def(def);
        Self {
            id,
            def_id: def.id.clone(),
            target_id: def.target_id.clone(),
            kind: def.kind,
            parent,
            children: Vec::new(),
            scope: None,
            reactive: Reactive::new(),
            name: defaults.name.clone(),
            hidden: defaults.hidden,
            page: defaults.page.clone(),
            categories: defaults.categories.clone(),
            primary_category: defaults.primary_category.clone(),
            unit_costs: defaults.costs.clone(),
            total_costs: BTreeMap::new(),
            known_cost_types: Vec::new(),
            info: Vec::new(),
            extra_keys: BTreeMap::new(),
            amount: 0.0,
            excluded: false,
            enabled: false,
            subscriptions: 0,
            default_option: def.default_option.clone(),
            checklist: def.checklist,
            defaults,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Id of the definition the node was built from.
    pub fn def_id(&self) -> &str {
        &self.def_id
    }

    pub fn target_id(&self) -> Option<&str> {
        self.target_id.as_deref()
    }

    /// Id other nodes' queries refer to this node by.
    pub fn primary_id(&self) -> &str {
        self.target_id.as_deref().unwrap_or(&self.def_id)
    }

    /// Whether `id` names this node, by definition or link target.
    pub fn answers_to(&self, id: &str) -> bool {
        self.def_id == id || self.target_id.as_deref() == Some(id)
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// The scope aggregator; `None` for nodes built non-reactively.
    pub fn scope(&self) -> Option<&Scope> {
        self.scope.as_ref()
    }

    pub fn is_reactive(&self) -> bool {
        self.scope.is_some()
    }

    pub fn reactive(&self) -> &Reactive {
        &self.reactive
    }

    pub fn defaults(&self) -> &Defaults {
        &self.defaults
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hidden(&self) -> bool {
        self.hidden
    }

    pub fn page(&self) -> Option<&str> {
        self.page.as_deref()
    }

    pub fn categories(&self) -> &BTreeSet<String> {
        &self.categories
    }

    pub fn primary_category(&self) -> Option<&str> {
        self.primary_category.as_deref()
    }

    /// Cost of one selection, after modifiers.
    pub fn unit_costs(&self) -> &BTreeMap<String, f64> {
        &self.unit_costs
    }

    /// Costs of this node and everything selected below it.
    pub fn total_costs(&self) -> &BTreeMap<String, f64> {
        &self.total_costs
    }

    pub fn total_cost(&self, type_id: &str) -> f64 {
        self.total_costs.get(type_id).copied().unwrap_or(0.0)
    }

    pub fn info(&self) -> &[InfoState] {
        &self.info
    }

    /// Raw selected count, as last set by the host.
    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn is_excluded(&self) -> bool {
        self.excluded
    }

    /// Count propagated to ancestors.
    pub fn propagate_amount(&self) -> f64 {
        self.scope
            .as_ref()
            .map(Scope::propagate_amount)
            .unwrap_or(0.0)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Net number of live subscriptions made by this node.
    pub fn subscription_count(&self) -> i64 {
        self.subscriptions
    }

    pub fn default_option(&self) -> Option<&str> {
        self.default_option.as_deref()
    }

    pub fn is_checklist(&self) -> bool {
        self.checklist
    }

    /// Live constraints, definition and extra alike.
    pub fn constraints(&self) -> impl Iterator<Item = &Constraint> {
        self.reactive.constraints().map(|(_, c)| c)
    }

    /// Extra constraint registered under `key`.
    pub fn extra_constraint(&self, key: &str) -> Option<&Constraint> {
        self.extra_keys
            .get(key)
            .and_then(|&i| self.reactive.constraint(i))
    }

    /// Ids of currently violated constraints.
    pub fn errors(&self) -> Vec<&str> {
        self.constraints()
            .filter(|c| c.computed())
            .map(|c| c.def().id.as_str())
            .collect()
    }

    /// `(min, max)` bounds of this node's own count, from its `selections`
    /// constraints scoped to itself or its parent. A missing max is `None`.
    pub fn bounds(&self) -> (f64, Option<f64>) {
        let mut min: f64 = 0.0;
        let mut max: Option<f64> = None;
        for c in self.constraints() {
            if c.key().is_some() || c.query().field != SELECTIONS {
                continue;
            }
            let scoped = matches!(
                c.query().scope,
                ScopeName::Parent | ScopeName::Itself
            );
            let about_self = match c.query().child_id.as_deref() {
                Some(child) => self.answers_to(child),
                None => true,
            };
            if !scoped || !about_self || c.query().percent_value {
                continue;
            }
            let limit = c.limit();
            match c.def().kind {
                ConstraintKind::Min => min = min.max(limit),
                ConstraintKind::Max if limit >= 0.0 => {
                    max = Some(max.map_or(limit, |m: f64| m.min(limit)));
                }
                ConstraintKind::Max => {}
            }
        }
        (min, max)
    }
}
