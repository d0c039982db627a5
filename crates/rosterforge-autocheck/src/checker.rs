//! Public entry points of the auto-check engine.

use tracing::{debug, info};

use rosterforge_config::AutoCheckConfig;
use rosterforge_core::{NodeId, Result};
use rosterforge_scope::StateTree;

use crate::association::Association;
use crate::remove::remove_others;
use crate::report::AutoCheckReport;
use crate::walk::{Progress, Walk};

/// Fills default quantities in a subtree.
///
/// Every operation is a no-op while the config disables auto-check or the
/// tree is bulk-loading.
#[derive(Debug, Clone, Default)]
pub struct AutoChecker {
    config: AutoCheckConfig,
}

impl AutoChecker {
    pub fn new(config: AutoCheckConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AutoCheckConfig {
        &self.config
    }

    fn skipped(&self, tree: &StateTree, root: NodeId) -> Result<bool> {
        tree.node(root)?;
        if !self.config.enabled {
            debug!(event = "auto_check_skipped", root = %root, reason = "disabled");
            return Ok(true);
        }
        if tree.is_loading() {
            debug!(event = "auto_check_skipped", root = %root, reason = "loading");
            return Ok(true);
        }
        Ok(false)
    }

    /// Walks the subtree under `root` top-down, raising entries to their
    /// minimum and filling groups up to theirs.
    pub fn run(&self, tree: &mut StateTree, root: NodeId) -> Result<AutoCheckReport> {
        if self.skipped(tree, root)? {
            return Ok(AutoCheckReport::default());
        }
        info!(event = "auto_check_start", root = %root, nodes = tree.len());
        let mut walk = Walk::new(&self.config, root);
        while walk.step(tree)?.is_some() {}
        let report = walk.finish();
        log_end(root, &report);
        Ok(report)
    }

    /// Same walk as [`run`](AutoChecker::run), yielding to the runtime after
    /// every `yield_every` visited subtrees.
    pub async fn run_async(&self, tree: &mut StateTree, root: NodeId) -> Result<AutoCheckReport> {
        if self.skipped(tree, root)? {
            return Ok(AutoCheckReport::default());
        }
        info!(event = "auto_check_start", root = %root, nodes = tree.len());
        let every = self.config.yield_every.max(1);
        let mut visited = 0;
        let mut walk = Walk::new(&self.config, root);
        while let Some(progress) = walk.step(tree)? {
            if progress == Progress::Visited {
                visited += 1;
                if visited % every == 0 {
                    tokio::task::yield_now().await;
                }
            }
        }
        let report = walk.finish();
        log_end(root, &report);
        Ok(report)
    }

    /// Zeroes the nodes competing with `node` for a maximum of one.
    pub fn remove_others(&self, tree: &mut StateTree, node: NodeId) -> Result<AutoCheckReport> {
        if self.skipped(tree, node)? {
            return Ok(AutoCheckReport::default());
        }
        remove_others(&self.config, tree, node)
    }

    /// Sets a node's amount the way a user check does: competitors are
    /// removed and the node's subtree is auto-checked.
    pub fn check(&self, tree: &mut StateTree, node: NodeId, amount: f64) -> Result<AutoCheckReport> {
        tree.set_selections(node, amount)?;
        let mut report = AutoCheckReport::default();
        report.record_changed(node);
        if amount > 0.0 {
            report.merge(self.remove_others(tree, node)?);
            report.merge(self.run(tree, node)?);
        }
        Ok(report)
    }

    /// Runs the exact-fit shortcut on a newly created association.
    ///
    /// Hidden candidates are not eligible when the config skips hidden
    /// nodes. Selected members are reported as changed.
    pub fn associate(
        &self,
        tree: &StateTree,
        association: &mut Association,
        candidates: &[NodeId],
    ) -> Result<AutoCheckReport> {
        let mut report = AutoCheckReport::default();
        if !self.config.enabled || tree.is_loading() {
            return Ok(report);
        }
        let mut eligible = Vec::with_capacity(candidates.len());
        for &candidate in candidates {
            let state = tree.node(candidate)?;
            if self.config.skip_hidden && state.hidden() {
                continue;
            }
            eligible.push(candidate);
        }
        let selected = association.on_create(&eligible);
        debug!(
            event = "association_auto_check",
            association = association.id(),
            selected = selected.len(),
            missing = association.missing(),
        );
        for member in selected {
            report.record_changed(member);
        }
        Ok(report)
    }
}

fn log_end(root: NodeId, report: &AutoCheckReport) {
    info!(
        event = "auto_check_end",
        root = %root,
        changed = report.changed.len(),
        removed = report.removed.len(),
        warnings = report.warnings.len(),
    );
}
