//! Assertion levels for lifecycle and aggregation checks.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How aggressively the engine checks its own invariants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum AssertMode {
    /// No checks beyond what the lifecycle operations need to function.
    Off,

    /// Check the subscription counter on every `disable`.
    #[default]
    Leaks,

    /// Leak checks plus a brute-force recount of the ancestor chain after
    /// every quantity change.
    Full,
}

impl AssertMode {
    pub fn checks_leaks(self) -> bool {
        !matches!(self, AssertMode::Off)
    }

    pub fn verifies_aggregates(self) -> bool {
        matches!(self, AssertMode::Full)
    }
}
