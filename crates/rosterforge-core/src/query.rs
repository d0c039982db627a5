//! Queries and the stable query hash format.
//!
//! A query names *where* to look (a scope name resolved against the tree)
//! and *what* to count (a field, optionally filtered to one child id and
//! optionally recursing through child selections and child forces).
//!
//! Buckets inside a scope aggregator are keyed by [`QueryHash`]:
//!
//! ```text
//! {includeFlags}::{field}::{childId|"self"}
//! is::{id}        membership of the scope's own node
//! costType        number of cost types known under the scope
//! ```

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Field counting selected entries.
pub const SELECTIONS: &str = "selections";

/// Field counting forces.
pub const FORCES: &str = "forces";

/// Child segment of a hash whose query has no child filter.
///
/// The `self` bucket of a scope aggregates every contribution below the
/// scope's node regardless of id: the node's own total.
pub const SELF_KEY: &str = "self";

const MEMBERSHIP_PREFIX: &str = "is::";
const COST_TYPE: &str = "costType";

/// Named anchor a query is resolved against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(into = "String", from = "String"))]
pub enum ScopeName {
    /// The node itself.
    #[default]
    Itself,
    /// Nearest enclosing entry, force or roster.
    Parent,
    /// Nearest enclosing force.
    Force,
    /// Tree root.
    Roster,
    /// Category node the unit is filed under.
    PrimaryCategory,
    /// Force the unit belongs to.
    PrimaryCatalogue,
    /// Every ancestor.
    Ancestor,
    /// Nearest node (self included) whose definition or target id matches.
    Id(String),
}

impl ScopeName {
    pub fn as_str(&self) -> &str {
        match self {
            ScopeName::Itself => "self",
            ScopeName::Parent => "parent",
            ScopeName::Force => "force",
            ScopeName::Roster => "roster",
            ScopeName::PrimaryCategory => "primary-category",
            ScopeName::PrimaryCatalogue => "primary-catalogue",
            ScopeName::Ancestor => "ancestor",
            ScopeName::Id(id) => id,
        }
    }
}

impl From<&str> for ScopeName {
    fn from(s: &str) -> Self {
        match s {
            "self" => ScopeName::Itself,
            "parent" => ScopeName::Parent,
            "force" => ScopeName::Force,
            "roster" => ScopeName::Roster,
            "primary-category" => ScopeName::PrimaryCategory,
            "primary-catalogue" => ScopeName::PrimaryCatalogue,
            "ancestor" => ScopeName::Ancestor,
            other => ScopeName::Id(other.to_string()),
        }
    }
}

impl From<String> for ScopeName {
    fn from(s: String) -> Self {
        ScopeName::from(s.as_str())
    }
}

impl From<ScopeName> for String {
    fn from(s: ScopeName) -> Self {
        s.as_str().to_string()
    }
}

impl fmt::Display for ScopeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recursion flags of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct IncludeFlags {
    /// Recurse through nested selections.
    pub selections: bool,
    /// Recurse through child forces.
    pub forces: bool,
}

impl IncludeFlags {
    /// Every flag combination, in hash-prefix order `"", "s", "f", "sf"`.
    pub const ALL: [IncludeFlags; 4] = [
        IncludeFlags::new(false, false),
        IncludeFlags::new(true, false),
        IncludeFlags::new(false, true),
        IncludeFlags::new(true, true),
    ];

    pub const fn new(selections: bool, forces: bool) -> Self {
        Self { selections, forces }
    }

    pub fn as_str(self) -> &'static str {
        match (self.selections, self.forces) {
            (false, false) => "",
            (true, false) => "s",
            (false, true) => "f",
            (true, true) => "sf",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "" => Some(Self::new(false, false)),
            "s" => Some(Self::new(true, false)),
            "f" => Some(Self::new(false, true)),
            "sf" => Some(Self::new(true, true)),
            _ => None,
        }
    }
}

/// String key of one aggregated bucket inside a scope aggregator.
///
/// # Example
///
/// ```
/// use rosterforge_core::{IncludeFlags, QueryHash};
///
/// let hash = QueryHash::new(IncludeFlags::new(true, false), "pts", None);
/// assert_eq!(hash.as_str(), "s::pts::self");
/// assert_eq!(
///     hash.parts(),
///     Some((IncludeFlags::new(true, false), "pts", "self"))
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryHash(String);

impl QueryHash {
    /// Builds a bucket hash. A missing child maps to the `self` bucket.
    pub fn new(flags: IncludeFlags, field: &str, child_id: Option<&str>) -> Self {
        Self(format!(
            "{}::{}::{}",
            flags.as_str(),
            field,
            child_id.unwrap_or(SELF_KEY)
        ))
    }

    /// Reserved hash of a node's membership in `id`.
    pub fn membership(id: &str) -> Self {
        Self(format!("{MEMBERSHIP_PREFIX}{id}"))
    }

    /// Reserved hash signalling that a new cost type appeared below a node.
    pub fn cost_type() -> Self {
        Self(COST_TYPE.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this hash is one of the reserved, non-aggregated keys.
    pub fn is_reserved(&self) -> bool {
        self.0 == COST_TYPE || self.0.starts_with(MEMBERSHIP_PREFIX)
    }

    /// Splits an aggregated bucket hash into flags, field and child segment.
    ///
    /// Returns `None` for reserved hashes.
    pub fn parts(&self) -> Option<(IncludeFlags, &str, &str)> {
        if self.is_reserved() {
            return None;
        }
        let mut it = self.0.splitn(3, "::");
        let flags = IncludeFlags::parse(it.next()?)?;
        let field = it.next()?;
        let child = it.next()?;
        Some((flags, field, child))
    }
}

impl FromStr for QueryHash {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl Borrow<str> for QueryHash {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for QueryHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A pure lookup: which anchor, which field, which child.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub struct Query {
    #[cfg_attr(feature = "serde", serde(default))]
    pub scope: ScopeName,
    pub field: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub child_id: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub include_child_selections: bool,
    #[cfg_attr(feature = "serde", serde(default))]
    pub include_child_forces: bool,
    #[cfg_attr(feature = "serde", serde(default))]
    pub percent_value: bool,
    /// `false` makes `parent`, `force` and `primary-*` resolve to the nearest
    /// enclosing group instead.
    #[cfg_attr(feature = "serde", serde(default = "default_shared"))]
    pub shared: bool,
}

#[cfg(feature = "serde")]
fn default_shared() -> bool {
    true
}

impl Query {
    /// Creates a shared, non-recursive query.
    pub fn new(scope: impl Into<ScopeName>, field: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            field: field.into(),
            child_id: None,
            include_child_selections: false,
            include_child_forces: false,
            percent_value: false,
            shared: true,
        }
    }

    pub fn with_child(mut self, child_id: impl Into<String>) -> Self {
        self.child_id = Some(child_id.into());
        self
    }

    pub fn recursive(mut self, selections: bool, forces: bool) -> Self {
        self.include_child_selections = selections;
        self.include_child_forces = forces;
        self
    }

    pub fn percent(mut self) -> Self {
        self.percent_value = true;
        self
    }

    pub fn unshared(mut self) -> Self {
        self.shared = false;
        self
    }

    pub fn flags(&self) -> IncludeFlags {
        IncludeFlags::new(self.include_child_selections, self.include_child_forces)
    }

    /// Hash of the bucket this query reads.
    pub fn hash(&self) -> QueryHash {
        QueryHash::new(self.flags(), &self.field, self.child_id.as_deref())
    }

    /// The parallel "total" query used by percentage comparisons.
    ///
    /// Same anchor and field, no child filter, always recursing through
    /// child selections.
    pub fn total(&self) -> Query {
        Query {
            scope: self.scope.clone(),
            field: self.field.clone(),
            child_id: None,
            include_child_selections: true,
            include_child_forces: self.include_child_forces,
            percent_value: false,
            shared: self.shared,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_round_trip() {
        for flags in IncludeFlags::ALL {
            let hash = QueryHash::new(flags, "selections", Some("cat-hq"));
            let (f, field, child) = hash.parts().unwrap();
            assert_eq!(f, flags);
            assert_eq!(field, "selections");
            assert_eq!(child, "cat-hq");
            assert_eq!(QueryHash::new(f, field, Some(child)), hash);
        }
    }

    #[test]
    fn test_hash_prefixes() {
        assert_eq!(
            QueryHash::new(IncludeFlags::default(), "pts", None).as_str(),
            "::pts::self"
        );
        assert_eq!(
            QueryHash::new(IncludeFlags::new(true, true), "pts", Some("x")).as_str(),
            "sf::pts::x"
        );
        assert_eq!(
            QueryHash::new(IncludeFlags::new(false, true), "forces", None).as_str(),
            "f::forces::self"
        );
    }

    #[test]
    fn test_reserved_hashes() {
        assert!(QueryHash::membership("hq").is_reserved());
        assert_eq!(QueryHash::membership("hq").as_str(), "is::hq");
        assert!(QueryHash::cost_type().is_reserved());
        assert_eq!(QueryHash::cost_type().parts(), None);
    }

    #[test]
    fn test_scope_name_parsing() {
        assert_eq!(ScopeName::from("primary-category"), ScopeName::PrimaryCategory);
        assert_eq!(ScopeName::from("self"), ScopeName::Itself);
        assert_eq!(ScopeName::from("abc-123"), ScopeName::Id("abc-123".into()));
        assert_eq!(ScopeName::from("ancestor").as_str(), "ancestor");
    }

    #[test]
    fn test_total_query() {
        let q = Query::new("force", "pts").with_child("hq").percent();
        let total = q.total();
        assert_eq!(total.child_id, None);
        assert!(total.include_child_selections);
        assert!(!total.percent_value);
        assert_eq!(total.hash().as_str(), "s::pts::self");
    }
}
