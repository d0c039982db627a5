//! Error types for RosterForge

use thiserror::Error;

use crate::ids::NodeId;

/// Main error type for RosterForge operations.
///
/// Only programming errors surface here. Violated constraints are ordinary
/// computed values and unresolvable scope references degrade to zero.
#[derive(Debug, Error, PartialEq)]
pub enum RosterError {
    /// The id does not name a live node.
    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    /// The node was asked to act on a parent it is not attached to.
    #[error("Node {0} is detached from the tree")]
    DetachedNode(NodeId),

    /// Reactive operation on a node constructed without a scope.
    #[error("Node {0} was not initialized reactively")]
    NotReactive(NodeId),

    /// A matching enable/disable pair left subscriptions behind.
    #[error("Subscription leak on node {node}: {count} listener(s) still registered")]
    SubscriptionLeak {
        /// Node whose counter is non-zero.
        node: NodeId,
        /// Remaining subscriptions.
        count: i64,
    },

    /// Enable/disable called out of LIFO order.
    #[error("Lifecycle order violated on node {node}: {reason}")]
    LifecycleOrder {
        /// Offending node.
        node: NodeId,
        /// What was out of order.
        reason: String,
    },

    /// A queue drain was started while another drain was running.
    #[error("Re-entrant event queue drain")]
    ReentrantDrain,

    /// A maintained bucket disagrees with a brute-force recount.
    #[error("Aggregate mismatch at node {node} on {hash}: maintained {actual}, recounted {expected}")]
    AggregateMismatch {
        /// Scope node holding the bucket.
        node: NodeId,
        /// Bucket hash.
        hash: String,
        /// Recounted value.
        expected: f64,
        /// Incrementally maintained value.
        actual: f64,
    },

    /// A rule definition cannot be instantiated.
    #[error("Invalid definition: {0}")]
    InvalidDefinition(String),
}

/// Result type alias for RosterForge operations
pub type Result<T> = std::result::Result<T, RosterError>;
