//! Deferred, coalescing, non-reentrant dispatch queue.
//!
//! Every bucket change inside a scope aggregator enqueues its listeners here
//! instead of calling them. Pending calls are keyed, so a value that changes
//! twice before the queue drains is delivered once with the latest pair.
//! Draining is not reentrant: a drain started while another is running does
//! nothing, and the outer drain picks up everything enqueued meanwhile.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

use rosterforge_core::{Result, RosterError};

/// One pending delivery: the latest `(new, old)` pair for a key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Notification {
    pub new: f64,
    pub old: f64,
}

/// Coalescing FIFO of pending listener calls.
///
/// # Example
///
/// ```
/// use rosterforge_scope::queue::{EventQueue, Notification};
///
/// let mut queue: EventQueue<&str, Notification> = EventQueue::new();
/// queue.enqueue("a", Notification { new: 1.0, old: 0.0 });
/// queue.enqueue("a", Notification { new: 2.0, old: 1.0 });
///
/// let mut seen = Vec::new();
/// queue.drain(|_, key, n| seen.push((key, n.new))).unwrap();
/// assert_eq!(seen, vec![("a", 2.0)]);
/// ```
#[derive(Debug)]
pub struct EventQueue<K, E> {
    order: VecDeque<K>,
    pending: HashMap<K, E>,
    draining: bool,
    delivered: u64,
}

impl<K, E> Default for EventQueue<K, E>
where
    K: Hash + Eq + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, E> EventQueue<K, E>
where
    K: Hash + Eq + Clone,
{
    pub fn new() -> Self {
        Self {
            order: VecDeque::new(),
            pending: HashMap::new(),
            draining: false,
            delivered: 0,
        }
    }

    /// Stores one pending call for `key`, replacing any earlier pending
    /// call for the same key in place.
    ///
    /// Returns `false` when the call was coalesced into an existing entry.
    pub fn enqueue(&mut self, key: K, event: E) -> bool {
        match self.pending.entry(key) {
            Entry::Occupied(mut slot) => {
                slot.insert(event);
                false
            }
            Entry::Vacant(slot) => {
                self.order.push_back(slot.key().clone());
                slot.insert(event);
                true
            }
        }
    }

    /// Pops the oldest pending call.
    pub fn pop(&mut self) -> Option<(K, E)> {
        while let Some(key) = self.order.pop_front() {
            if let Some(event) = self.pending.remove(&key) {
                self.delivered += 1;
                return Some((key, event));
            }
        }
        None
    }

    /// Marks the queue as draining.
    ///
    /// Returns `false` when a drain is already running; the caller must then
    /// leave the work to the outer drain.
    pub fn begin_drain(&mut self) -> bool {
        if self.draining {
            return false;
        }
        self.draining = true;
        true
    }

    pub fn end_drain(&mut self) {
        self.draining = false;
    }

    pub fn is_draining(&self) -> bool {
        self.draining
    }

    /// Drains every pending call, including calls enqueued by `deliver`.
    ///
    /// `deliver` receives the queue back so it can enqueue follow-up calls.
    /// A nested `drain` from inside `deliver` returns
    /// [`RosterError::ReentrantDrain`] without delivering anything.
    pub fn drain<F>(&mut self, mut deliver: F) -> Result<usize>
    where
        F: FnMut(&mut Self, K, E),
    {
        if !self.begin_drain() {
            return Err(RosterError::ReentrantDrain);
        }
        let mut count = 0;
        while let Some((key, event)) = self.pop() {
            deliver(self, key, event);
            count += 1;
        }
        self.end_drain();
        Ok(count)
    }

    /// Removes a pending call without delivering it.
    pub fn cancel(&mut self, key: &K) -> Option<E> {
        self.pending.remove(key)
    }

    /// Drops every pending call whose key matches `predicate`.
    pub fn cancel_where<P>(&mut self, mut predicate: P)
    where
        P: FnMut(&K) -> bool,
    {
        self.pending.retain(|k, _| !predicate(k));
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Total calls handed out by `pop` since construction.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(new: f64, old: f64) -> Notification {
        Notification { new, old }
    }

    #[test]
    fn test_coalesces_by_key_keeping_first_position() {
        let mut queue = EventQueue::new();
        assert!(queue.enqueue("a", n(1.0, 0.0)));
        assert!(queue.enqueue("b", n(5.0, 0.0)));
        assert!(!queue.enqueue("a", n(3.0, 1.0)));
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.pop(), Some(("a", n(3.0, 1.0))));
        assert_eq!(queue.pop(), Some(("b", n(5.0, 0.0))));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_drain_delivers_calls_enqueued_during_drain() {
        let mut queue = EventQueue::new();
        queue.enqueue(1u32, n(1.0, 0.0));

        let mut order = Vec::new();
        let count = queue
            .drain(|q, key, _| {
                order.push(key);
                if key < 4 {
                    q.enqueue(key + 1, n(0.0, 0.0));
                }
            })
            .unwrap();

        assert_eq!(count, 4);
        assert_eq!(order, vec![1, 2, 3, 4]);
        assert!(queue.is_empty());
        assert!(!queue.is_draining());
    }

    #[test]
    fn test_nested_drain_is_rejected_and_outer_drain_finishes() {
        let mut queue = EventQueue::new();
        queue.enqueue("outer", n(1.0, 0.0));

        let mut nested = None;
        let mut seen = Vec::new();
        queue
            .drain(|q, key, _| {
                seen.push(key);
                if key == "outer" {
                    q.enqueue("follow-up", n(2.0, 0.0));
                    nested = Some(q.drain(|_, _, _| {}));
                }
            })
            .unwrap();

        assert_eq!(nested, Some(Err(RosterError::ReentrantDrain)));
        assert_eq!(seen, vec!["outer", "follow-up"]);
    }

    #[test]
    fn test_key_requeued_after_pop_is_delivered_again() {
        let mut queue = EventQueue::new();
        queue.enqueue("a", n(1.0, 0.0));

        let mut deliveries = 0;
        queue
            .drain(|q, key, event| {
                deliveries += 1;
                if event.new < 3.0 {
                    q.enqueue(key, n(event.new + 1.0, event.new));
                }
            })
            .unwrap();

        assert_eq!(deliveries, 3);
        assert_eq!(queue.delivered(), 3);
    }

    #[test]
    fn test_cancel_where() {
        let mut queue = EventQueue::new();
        queue.enqueue(1, n(1.0, 0.0));
        queue.enqueue(2, n(1.0, 0.0));
        queue.enqueue(3, n(1.0, 0.0));
        queue.cancel_where(|k| *k % 2 == 1);

        assert_eq!(queue.pop().map(|(k, _)| k), Some(2));
        assert_eq!(queue.pop(), None);
    }
}
