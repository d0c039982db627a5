//! Engine entry point that hides the wiring between tree, config and
//! auto-check.

use std::path::Path;

use tracing::debug;

use rosterforge_autocheck::{AutoCheckReport, AutoChecker};
use rosterforge_config::EngineConfig;
use rosterforge_core::{NodeDef, NodeId, Result};
use rosterforge_scope::StateTree;

/// A state tree configured from an [`EngineConfig`], with auto-check wired in.
pub struct Engine {
    config: EngineConfig,
    tree: StateTree,
    checker: AutoChecker,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        #[cfg(feature = "console")]
        rosterforge_console::init_with(&config);

        let tree = StateTree::with_assert_mode(config.assert_mode);
        let checker = AutoChecker::new(config.auto_check.clone());
        Self {
            config,
            tree,
            checker,
        }
    }

    /// Builds an engine from a config file, using defaults if it is missing
    /// or invalid.
    pub fn from_config_file(path: impl AsRef<Path>) -> Self {
        Self::new(EngineConfig::load(path).unwrap_or_default())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tree(&self) -> &StateTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut StateTree {
        &mut self.tree
    }

    pub fn checker(&self) -> &AutoChecker {
        &self.checker
    }

    /// Adds a reactive node.
    pub fn add_node(&mut self, def: &NodeDef, parent: Option<NodeId>) -> Result<NodeId> {
        self.tree.add_node(def, parent, true)
    }

    /// Sets a node's amount as a user check, with competitor removal and
    /// auto-check of the node's subtree.
    pub fn check(&mut self, node: NodeId, amount: f64) -> Result<AutoCheckReport> {
        self.checker.check(&mut self.tree, node, amount)
    }

    pub fn auto_check(&mut self, root: NodeId) -> Result<AutoCheckReport> {
        self.checker.run(&mut self.tree, root)
    }

    pub async fn auto_check_async(&mut self, root: NodeId) -> Result<AutoCheckReport> {
        self.checker.run_async(&mut self.tree, root).await
    }

    /// Runs `load` with the tree marked as bulk-loading, so auto-check stays
    /// out of the way, then clears the flag whether or not `load` failed.
    pub fn bulk_load<T>(&mut self, load: impl FnOnce(&mut StateTree) -> Result<T>) -> Result<T> {
        self.tree.set_loading(true);
        debug!(event = "bulk_load_start", nodes = self.tree.len());
        let result = load(&mut self.tree);
        self.tree.set_loading(false);
        debug!(event = "bulk_load_end", nodes = self.tree.len(), ok = result.is_ok());
        result
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
