//! The node arena and its event loop.
//!
//! `StateTree` owns every `NodeState` in a generational arena. All
//! cross-node work goes through it: the ancestor walk that keeps scope
//! aggregators consistent, scope resolution, subscription lifecycles and
//! draining the shared event queue.

mod effects;
mod lifecycle;
mod propagate;
mod resolve;
mod rules;
mod verify;

#[cfg(test)]
mod tests;

pub use verify::Mismatch;

use std::collections::HashMap;
use std::fmt;

use tracing::trace;

use rosterforge_core::{AssertMode, ListenerId, NodeId, Query, QueryHash, Result, RosterError};

use crate::dump::NodeDump;
use crate::observer::NodeObserver;
use crate::queue::{EventQueue, Notification};
use crate::scope::{ListenerKey, Scope, Subscriber};
use crate::state::NodeState;

type ExternalListener = Box<dyn FnMut(f64, f64)>;

#[derive(Debug, Default)]
struct ArenaEntry {
    generation: u32,
    state: Option<NodeState>,
}

/// Arena of node states sharing one event queue.
///
/// # Example
///
/// ```
/// use rosterforge_core::{NodeDef, Query};
/// use rosterforge_scope::StateTree;
///
/// let mut tree = StateTree::new();
/// let roster = tree.add_node(&NodeDef::roster("roster"), None, true).unwrap();
/// let force = tree.add_node(&NodeDef::force("force"), Some(roster), true).unwrap();
/// let unit = tree
///     .add_node(&NodeDef::unit("captain").cost("pts", 80.0), Some(force), true)
///     .unwrap();
///
/// tree.set_selections(unit, 2.0).unwrap();
///
/// let points = Query::new("self", "pts").recursive(true, false);
/// assert_eq!(tree.get(force, &points).unwrap(), 160.0);
/// assert_eq!(tree.node(unit).unwrap().total_cost("pts"), 160.0);
/// ```
pub struct StateTree {
    entries: Vec<ArenaEntry>,
    free: Vec<u32>,
    root: Option<NodeId>,
    len: usize,
    queue: EventQueue<ListenerKey, Notification>,
    externals: HashMap<ListenerKey, ExternalListener>,
    observer: Option<Box<dyn NodeObserver>>,
    assert_mode: AssertMode,
    loading: bool,
}

impl Default for StateTree {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StateTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateTree")
            .field("len", &self.len)
            .field("root", &self.root)
            .field("pending", &self.queue.len())
            .field("externals", &self.externals.len())
            .field("assert_mode", &self.assert_mode)
            .finish()
    }
}

impl StateTree {
    pub fn new() -> Self {
        Self::with_assert_mode(AssertMode::default())
    }

    pub fn with_assert_mode(assert_mode: AssertMode) -> Self {
        Self {
            entries: Vec::new(),
            free: Vec::new(),
            root: None,
            len: 0,
            queue: EventQueue::new(),
            externals: HashMap::new(),
            observer: None,
            assert_mode,
            loading: false,
        }
    }

    pub fn assert_mode(&self) -> AssertMode {
        self.assert_mode
    }

    pub fn set_assert_mode(&mut self, mode: AssertMode) {
        self.assert_mode = mode;
    }

    /// Installs the observer receiving derived-value notifications.
    pub fn set_observer(&mut self, observer: impl NodeObserver + 'static) {
        self.observer = Some(Box::new(observer));
    }

    pub fn clear_observer(&mut self) {
        self.observer = None;
    }

    /// Marks a bulk load in progress. Auto-check passes skip loading trees.
    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.state(id).is_some()
    }

    /// Looks up a live node.
    pub fn node(&self, id: NodeId) -> Result<&NodeState> {
        self.state(id).ok_or(RosterError::UnknownNode(id))
    }

    /// Every live node, in arena order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeState> {
        self.entries.iter().filter_map(|e| e.state.as_ref())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.state(id).and_then(|s| s.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.state(id).map(|s| s.children.as_slice()).unwrap_or(&[])
    }

    /// Current value of the bucket `query` reads at `scope_node`.
    pub fn get(&self, scope_node: NodeId, query: &Query) -> Result<f64> {
        self.get_hash(scope_node, &query.hash())
    }

    pub fn get_hash(&self, scope_node: NodeId, hash: &QueryHash) -> Result<f64> {
        let scope = self
            .node(scope_node)?
            .scope
            .as_ref()
            .ok_or(RosterError::NotReactive(scope_node))?;
        Ok(scope.get(hash))
    }

    /// Pending, undelivered listener calls.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Snapshot of one node for debugging.
    pub fn dump(&self, id: NodeId) -> Result<NodeDump> {
        Ok(NodeDump::capture(self.node(id)?))
    }

    // ---- external listeners ----

    /// Registers a host callback on the bucket `query` reads at `scope_node`.
    ///
    /// The callback runs immediately with `(current, 0)` and then with
    /// `(new, old)` whenever the bucket moves, once per drain.
    pub fn listen<F>(&mut self, scope_node: NodeId, query: &Query, id: ListenerId, mut callback: F) -> Result<()>
    where
        F: FnMut(f64, f64) + 'static,
    {
        let hash = query.hash();
        let subscriber = Subscriber::External(id);
        let scope = self.scope_mut(scope_node)?;
        scope.add_listener(hash.clone(), subscriber);
        callback(scope.get(&hash), 0.0);
        self.externals.insert(
            ListenerKey {
                scope: scope_node,
                hash,
                subscriber,
            },
            Box::new(callback),
        );
        Ok(())
    }

    /// Removes a host callback. Returns `false` if it was not registered.
    pub fn unlisten(&mut self, scope_node: NodeId, query: &Query, id: ListenerId) -> Result<bool> {
        let key = ListenerKey {
            scope: scope_node,
            hash: query.hash(),
            subscriber: Subscriber::External(id),
        };
        let removed = self.scope_mut(scope_node)?.remove_listener(&key.hash, &key.subscriber);
        self.queue.cancel(&key);
        self.externals.remove(&key);
        Ok(removed)
    }

    // ---- event loop ----

    /// Delivers every pending listener call, including calls enqueued while
    /// delivering. A drain requested during a drain returns 0 and leaves
    /// the work to the outer one.
    pub fn drain(&mut self) -> usize {
        if !self.queue.begin_drain() {
            trace!(event = "drain_nested", pending = self.queue.len());
            return 0;
        }
        let mut delivered = 0;
        while let Some((key, notification)) = self.queue.pop() {
            self.dispatch(key, notification);
            delivered += 1;
        }
        self.queue.end_drain();
        if delivered > 0 {
            trace!(event = "drain", delivered = delivered);
        }
        delivered
    }

    fn dispatch(&mut self, key: ListenerKey, notification: Notification) {
        match key.subscriber {
            Subscriber::External(_) => {
                if let Some(callback) = self.externals.get_mut(&key) {
                    callback(notification.new, notification.old);
                }
            }
            Subscriber::Node { node, slot, port } => {
                self.deliver(node, slot, port, key.scope, notification.new);
            }
        }
    }

    // ---- arena ----

    pub(crate) fn state(&self, id: NodeId) -> Option<&NodeState> {
        self.entries
            .get(id.index())
            .filter(|e| e.generation == id.generation())
            .and_then(|e| e.state.as_ref())
    }

    pub(crate) fn state_mut(&mut self, id: NodeId) -> Option<&mut NodeState> {
        self.entries
            .get_mut(id.index())
            .filter(|e| e.generation == id.generation())
            .and_then(|e| e.state.as_mut())
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut NodeState> {
        self.state_mut(id).ok_or(RosterError::UnknownNode(id))
    }

    pub(crate) fn scope_mut(&mut self, id: NodeId) -> Result<&mut Scope> {
        self.node_mut(id)?
            .scope
            .as_mut()
            .ok_or(RosterError::NotReactive(id))
    }

    pub(crate) fn scope_ref(&self, id: NodeId) -> Result<&Scope> {
        self.node(id)?
            .scope
            .as_ref()
            .ok_or(RosterError::NotReactive(id))
    }

    fn alloc(&mut self, build: impl FnOnce(NodeId) -> NodeState) -> NodeId {
        let id = match self.free.pop() {
            Some(index) => {
                let entry = &mut self.entries[index as usize];
                NodeId::new(index, entry.generation)
            }
            None => {
                let index = self.entries.len() as u32;
                self.entries.push(ArenaEntry::default());
                NodeId::new(index, 0)
            }
        };
        self.entries[id.index()].state = Some(build(id));
        self.len += 1;
        id
    }

    fn release(&mut self, id: NodeId) {
        if let Some(entry) = self.entries.get_mut(id.index()) {
            if entry.generation == id.generation() && entry.state.take().is_some() {
                entry.generation += 1;
                self.free.push(id.index() as u32);
                self.len -= 1;
            }
        }
    }

    /// `node` followed by its ancestors, nearest first.
    pub(crate) fn self_and_ancestors(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cursor = Some(node);
        while let Some(at) = cursor {
            let Some(state) = self.state(at) else {
                break;
            };
            out.push(at);
            cursor = state.parent;
        }
        out
    }

    /// The subtree rooted at `node`, children before parents.
    pub(crate) fn post_order(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![(node, false)];
        while let Some((at, expanded)) = stack.pop() {
            if expanded {
                out.push(at);
                continue;
            }
            stack.push((at, true));
            for &child in self.children(at).iter().rev() {
                stack.push((child, false));
            }
        }
        out
    }

    pub(crate) fn emit(&mut self, notify: impl FnOnce(&mut dyn NodeObserver)) {
        if let Some(observer) = self.observer.as_mut() {
            notify(observer.as_mut());
        }
    }
}
