//! Per-node scope aggregator.
//!
//! A `Scope` holds the aggregated buckets visible to queries anchored at its
//! node, the listeners registered on those buckets, and the node's own
//! contribution data (amounts, membership sets, per-unit costs). It only
//! mutates itself; walks over ancestors live on `StateTree`.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use smallvec::SmallVec;

use rosterforge_core::{ListenerId, NodeId, Query, QueryHash, SELF_KEY};

/// Values below this magnitude are treated as zero and evicted from the index.
pub(crate) const EPSILON: f64 = 1e-9;

/// Which of a primitive's two inputs a subscription feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Port {
    /// The raw query result.
    Value,
    /// The parallel total of a percentage comparison.
    Total,
}

/// Reactive input of a node state that can listen to a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Slot {
    Condition(usize),
    Repeat(usize),
    Constraint(usize),
    /// The node's own `costType` bucket.
    CostType,
    /// The node's own `s::{type}::self` bucket for its n-th known cost type.
    CostTotal(usize),
}

/// Identity of a listener on one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Subscriber {
    Node { node: NodeId, slot: Slot, port: Port },
    External(ListenerId),
}

impl Subscriber {
    pub fn node(node: NodeId, slot: Slot, port: Port) -> Self {
        Subscriber::Node { node, slot, port }
    }

    /// The node owning this subscriber, if any.
    pub fn owner(&self) -> Option<NodeId> {
        match self {
            Subscriber::Node { node, .. } => Some(*node),
            Subscriber::External(_) => None,
        }
    }
}

/// Coalescing key of a pending listener call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListenerKey {
    pub scope: NodeId,
    pub hash: QueryHash,
    pub subscriber: Subscriber,
}

/// Hierarchical numeric index of one node.
#[derive(Debug, Default)]
pub struct Scope {
    pub(crate) amount: f64,
    pub(crate) propagate_amount: f64,
    index: HashMap<QueryHash, f64>,
    listeners: HashMap<QueryHash, SmallVec<[Subscriber; 2]>>,
    pub(crate) filters: BTreeSet<String>,
    pub(crate) categories: BTreeSet<String>,
    pub(crate) cost_filters: BTreeSet<String>,
    pub(crate) cost_categories: BTreeSet<String>,
    pub(crate) costs: BTreeMap<String, f64>,
    pub(crate) cost_types: BTreeSet<String>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw selected count.
    pub fn amount(&self) -> f64 {
        self.amount
    }

    /// Count actually propagated to ancestors; zero while excluded.
    pub fn propagate_amount(&self) -> f64 {
        self.propagate_amount
    }

    /// Current value of a bucket.
    pub fn get(&self, hash: &QueryHash) -> f64 {
        self.index.get(hash).copied().unwrap_or(0.0)
    }

    /// Current value of the bucket a query reads.
    pub fn get_query(&self, query: &Query) -> f64 {
        self.get(&query.hash())
    }

    pub fn filters(&self) -> &BTreeSet<String> {
        &self.filters
    }

    pub fn categories(&self) -> &BTreeSet<String> {
        &self.categories
    }

    pub fn cost_filters(&self) -> &BTreeSet<String> {
        &self.cost_filters
    }

    pub fn cost_categories(&self) -> &BTreeSet<String> {
        &self.cost_categories
    }

    /// Per-unit costs.
    pub fn costs(&self) -> &BTreeMap<String, f64> {
        &self.costs
    }

    /// Cost types known at or below this node.
    pub fn cost_types(&self) -> &BTreeSet<String> {
        &self.cost_types
    }

    /// Ids the node's amount is counted under, `self` first.
    pub fn selection_keys(&self) -> impl Iterator<Item = &str> {
        std::iter::once(SELF_KEY).chain(
            self.filters
                .iter()
                .chain(self.categories.iter().filter(|c| !self.filters.contains(*c)))
                .map(String::as_str),
        )
    }

    /// Ids the node's costs are counted under, `self` first.
    pub fn cost_keys(&self) -> impl Iterator<Item = &str> {
        std::iter::once(SELF_KEY).chain(
            self.cost_filters
                .iter()
                .chain(
                    self.cost_categories
                        .iter()
                        .filter(|c| !self.cost_filters.contains(*c)),
                )
                .map(String::as_str),
        )
    }

    /// Ids the node is an instance of.
    pub fn membership(&self) -> BTreeSet<String> {
        self.filters.union(&self.categories).cloned().collect()
    }

    /// Aggregated buckets, reserved hashes included.
    pub fn buckets(&self) -> impl Iterator<Item = (&QueryHash, f64)> {
        self.index.iter().map(|(h, v)| (h, *v))
    }

    pub fn listeners(&self, hash: &QueryHash) -> &[Subscriber] {
        self.listeners.get(hash).map(|l| l.as_slice()).unwrap_or(&[])
    }

    /// Total listener registrations across all buckets.
    pub fn listener_count(&self) -> usize {
        self.listeners.values().map(|l| l.len()).sum()
    }

    /// Snapshot of every registration, for leak comparisons.
    pub fn listener_table(&self) -> BTreeMap<QueryHash, Vec<Subscriber>> {
        self.listeners
            .iter()
            .map(|(h, l)| {
                let mut subs = l.to_vec();
                subs.sort();
                (h.clone(), subs)
            })
            .collect()
    }

    /// Registers a listener. Returns `false` if it was already registered.
    pub(crate) fn add_listener(&mut self, hash: QueryHash, subscriber: Subscriber) -> bool {
        let entry = self.listeners.entry(hash).or_default();
        if entry.contains(&subscriber) {
            return false;
        }
        entry.push(subscriber);
        true
    }

    /// Deregisters a listener. Returns `false` if it was not registered.
    pub(crate) fn remove_listener(&mut self, hash: &QueryHash, subscriber: &Subscriber) -> bool {
        let Some(entry) = self.listeners.get_mut(hash) else {
            return false;
        };
        let Some(pos) = entry.iter().position(|s| s == subscriber) else {
            return false;
        };
        entry.remove(pos);
        if entry.is_empty() {
            self.listeners.remove(hash);
        }
        true
    }

    /// Drops every registration owned by `node`. Returns how many were removed.
    pub(crate) fn purge_owner(&mut self, node: NodeId) -> usize {
        let mut removed = 0;
        self.listeners.retain(|_, subs| {
            let before = subs.len();
            subs.retain(|s| s.owner() != Some(node));
            removed += before - subs.len();
            !subs.is_empty()
        });
        removed
    }

    /// Adds `delta` to a bucket. Returns `(new, old)` when the value moved.
    pub(crate) fn change(&mut self, hash: &QueryHash, delta: f64) -> Option<(f64, f64)> {
        if delta.abs() < EPSILON {
            return None;
        }
        let old = self.get(hash);
        self.store(hash, old + delta);
        Some((self.get(hash), old))
    }

    /// Overwrites a bucket. Returns `(new, old)` when the value moved.
    pub(crate) fn set(&mut self, hash: &QueryHash, value: f64) -> Option<(f64, f64)> {
        let old = self.get(hash);
        if (value - old).abs() < EPSILON {
            return None;
        }
        self.store(hash, value);
        Some((self.get(hash), old))
    }

    fn store(&mut self, hash: &QueryHash, value: f64) {
        if value.abs() < EPSILON {
            self.index.remove(hash);
        } else {
            self.index.insert(hash.clone(), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rosterforge_core::IncludeFlags;

    fn hash(child: &str) -> QueryHash {
        QueryHash::new(IncludeFlags::default(), "selections", Some(child))
    }

    #[test]
    fn test_change_reports_new_and_old() {
        let mut scope = Scope::new();
        assert_eq!(scope.change(&hash("a"), 2.0), Some((2.0, 0.0)));
        assert_eq!(scope.change(&hash("a"), 3.0), Some((5.0, 2.0)));
        assert_eq!(scope.change(&hash("a"), 0.0), None);
        assert_eq!(scope.get(&hash("a")), 5.0);
    }

    #[test]
    fn test_zero_buckets_are_evicted() {
        let mut scope = Scope::new();
        scope.change(&hash("a"), 2.0);
        assert_eq!(scope.change(&hash("a"), -2.0), Some((0.0, 2.0)));
        assert_eq!(scope.buckets().count(), 0);
        assert_eq!(scope.set(&hash("a"), 0.0), None);
    }

    #[test]
    fn test_listener_registration_is_idempotent() {
        let mut scope = Scope::new();
        let sub = Subscriber::External(ListenerId(1));
        assert!(scope.add_listener(hash("a"), sub));
        assert!(!scope.add_listener(hash("a"), sub));
        assert_eq!(scope.listener_count(), 1);
        assert!(scope.remove_listener(&hash("a"), &sub));
        assert!(!scope.remove_listener(&hash("a"), &sub));
        assert_eq!(scope.listener_count(), 0);
    }

    #[test]
    fn test_keys_deduplicate_filters_and_categories() {
        let mut scope = Scope::new();
        scope.filters.insert("entry".into());
        scope.filters.insert("group".into());
        scope.categories.insert("group".into());
        scope.categories.insert("hq".into());

        let keys: Vec<&str> = scope.selection_keys().collect();
        assert_eq!(keys, vec!["self", "entry", "group", "hq"]);
    }

    #[test]
    fn test_purge_owner() {
        let mut scope = Scope::new();
        let node = NodeId::new(1, 0);
        scope.add_listener(hash("a"), Subscriber::node(node, Slot::Condition(0), Port::Value));
        scope.add_listener(hash("a"), Subscriber::External(ListenerId(9)));
        scope.add_listener(hash("b"), Subscriber::node(node, Slot::Repeat(0), Port::Value));

        assert_eq!(scope.purge_owner(node), 2);
        assert_eq!(scope.listener_count(), 1);
    }
}
