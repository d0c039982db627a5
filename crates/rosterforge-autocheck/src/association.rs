//! Associations: links from one node to a set of member nodes.

use rosterforge_core::NodeId;

/// A link with a required member count, such as a leader attached to units.
///
/// # Example
///
/// ```
/// use rosterforge_autocheck::Association;
/// use rosterforge_core::NodeId;
///
/// let (a, b, c) = (NodeId::new(1, 0), NodeId::new(2, 0), NodeId::new(3, 0));
///
/// // Two members missing and exactly two candidates: both are taken.
/// let mut link = Association::new("bodyguard", 2, None);
/// assert_eq!(link.on_create(&[a, b]), vec![a, b]);
///
/// // Three candidates for two places: nothing is guessed.
/// let mut link = Association::new("bodyguard", 2, None);
/// assert!(link.on_create(&[a, b, c]).is_empty());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Association {
    id: String,
    min: usize,
    max: Option<usize>,
    selected: Vec<NodeId>,
}

impl Association {
    pub fn new(id: impl Into<String>, min: usize, max: Option<usize>) -> Self {
        Self {
            id: id.into(),
            min,
            max,
            selected: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn min(&self) -> usize {
        self.min
    }

    pub fn max(&self) -> Option<usize> {
        self.max
    }

    pub fn selected(&self) -> &[NodeId] {
        &self.selected
    }

    pub fn is_selected(&self, member: NodeId) -> bool {
        self.selected.contains(&member)
    }

    /// Members still needed to reach the minimum.
    pub fn missing(&self) -> usize {
        self.min.saturating_sub(self.selected.len())
    }

    /// Selects every unselected candidate when their number exactly matches
    /// the missing count. Returns the members selected.
    pub fn on_create(&mut self, candidates: &[NodeId]) -> Vec<NodeId> {
        let missing = self.missing();
        if missing == 0 {
            return Vec::new();
        }
        let mut unselected: Vec<NodeId> = Vec::new();
        for &candidate in candidates {
            if !self.is_selected(candidate) && !unselected.contains(&candidate) {
                unselected.push(candidate);
            }
        }
        if unselected.len() != missing {
            return Vec::new();
        }
        self.selected.extend(unselected.iter().copied());
        unselected
    }

    /// Selects `member`. On a single-member association every other member
    /// is deselected; those are returned.
    pub fn select(&mut self, member: NodeId) -> Vec<NodeId> {
        if self.max == Some(1) {
            let dropped: Vec<NodeId> = self
                .selected
                .iter()
                .copied()
                .filter(|&m| m != member)
                .collect();
            self.selected = vec![member];
            return dropped;
        }
        if !self.is_selected(member) {
            self.selected.push(member);
        }
        Vec::new()
    }

    /// Returns whether `member` was selected.
    pub fn deselect(&mut self, member: NodeId) -> bool {
        let before = self.selected.len();
        self.selected.retain(|&m| m != member);
        self.selected.len() != before
    }
}
