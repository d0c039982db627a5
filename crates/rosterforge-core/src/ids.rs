//! Arena identifiers.

use std::fmt;

/// Stable handle to a node in a `StateTree` arena.
///
/// The generation is bumped every time a slot is reused, so a handle that
/// outlives its node is detected on lookup instead of aliasing a newer node.
///
/// # Example
///
/// ```
/// use rosterforge_core::NodeId;
///
/// let id = NodeId::new(3, 1);
/// assert_eq!(id.index(), 3);
/// assert_eq!(id.to_string(), "#3v1");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    /// Creates a handle from a slot index and generation.
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Returns the arena slot index.
    #[inline]
    pub fn index(self) -> usize {
        self.index as usize
    }

    /// Returns the slot generation.
    #[inline]
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// Caller-chosen id for an external listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_distinguishes_reused_slot() {
        let old = NodeId::new(4, 0);
        let new = NodeId::new(4, 1);
        assert_eq!(old.index(), new.index());
        assert_ne!(old, new);
    }
}
