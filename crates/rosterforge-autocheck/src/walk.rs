//! The auto-check walk as an explicit stack machine.
//!
//! Both the synchronous and the asynchronous entry points drive the same
//! [`Walk`], one step at a time, so yielding between steps cannot change
//! the result.

use tracing::{debug, warn};

use rosterforge_config::AutoCheckConfig;
use rosterforge_core::{NodeId, NodeKind, Result};
use rosterforge_scope::StateTree;

use crate::options::{collect_options, rank, selected_count};
use crate::report::AutoCheckReport;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Step {
    /// Apply the node's own rule, then schedule its children.
    Visit(NodeId),
    /// Bring a group up to its minimum once its options have been visited.
    Fill(NodeId),
}

/// Outcome of one [`Walk::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Progress {
    /// A subtree visit began.
    Visited,
    /// A group was filled.
    Filled,
}

pub(crate) struct Walk<'c> {
    config: &'c AutoCheckConfig,
    stack: Vec<Step>,
    report: AutoCheckReport,
}

impl<'c> Walk<'c> {
    pub(crate) fn new(config: &'c AutoCheckConfig, root: NodeId) -> Self {
        Self {
            config,
            stack: vec![Step::Visit(root)],
            report: AutoCheckReport::default(),
        }
    }

    /// Runs one step. Returns `None` once the walk is complete.
    pub(crate) fn step(&mut self, tree: &mut StateTree) -> Result<Option<Progress>> {
        match self.stack.pop() {
            None => Ok(None),
            Some(Step::Visit(node)) => {
                self.visit(tree, node)?;
                Ok(Some(Progress::Visited))
            }
            Some(Step::Fill(group)) => {
                self.fill(tree, group)?;
                Ok(Some(Progress::Filled))
            }
        }
    }

    pub(crate) fn finish(self) -> AutoCheckReport {
        self.report
    }

    fn schedule_children(&mut self, tree: &StateTree, node: NodeId) {
        self.stack
            .extend(tree.children(node).iter().rev().map(|&c| Step::Visit(c)));
    }

    fn visit(&mut self, tree: &mut StateTree, node: NodeId) -> Result<()> {
        let state = tree.node(node)?;
        if self.config.skip_hidden && state.hidden() {
            return Ok(());
        }
        let kind = state.kind();
        match kind {
            NodeKind::Group => {
                // Options first, so nested defaults count towards the minimum.
                self.stack.push(Step::Fill(node));
                self.schedule_children(tree, node);
            }
            NodeKind::Roster | NodeKind::Category => self.schedule_children(tree, node),
            NodeKind::Force | NodeKind::Entry { .. } => {
                let ignored = matches!(kind, NodeKind::Force | NodeKind::Entry { unit: true })
                    && !state.is_checklist();
                if !ignored {
                    let (min, max) = state.bounds();
                    if max == Some(0.0) {
                        return Ok(());
                    }
                    let target = max.map_or(min, |max| min.min(max));
                    let amount = state.amount();
                    if amount < target {
                        tree.set_selections(node, target)?;
                        self.report.record_changed(node);
                        debug!(event = "auto_check_min", node = %node, from = amount, to = target);
                    }
                }
                if kind.is_entry() && tree.node(node)?.amount() <= 0.0 {
                    return Ok(());
                }
                self.schedule_children(tree, node);
            }
        }
        Ok(())
    }

    /// Raises a group's selection count towards its minimum.
    ///
    /// Options are filled round-robin rather than greedily: each pass gives
    /// every eligible option at most one more unit, in priority order, until
    /// the minimum or the group maximum is reached. A minimum of three over
    /// two unbounded options therefore ends as two and one, not three and
    /// zero. Options at their own maximum are passed over.
    fn fill(&mut self, tree: &mut StateTree, group: NodeId) -> Result<()> {
        let state = tree.node(group)?;
        let (min, max) = state.bounds();
        let default = state.default_option().map(str::to_string);
        let group_id = state.def_id().to_string();

        let options = collect_options(tree, group)?;
        let mut count = selected_count(tree, &options)?;
        if count >= min {
            return Ok(());
        }

        let (ranked, found) = rank(tree, &options, default.as_deref())?;
        if let (Some(default), false) = (default.as_deref(), found) {
            let message = format!("group {group_id}: default option {default} not found");
            warn!(event = "auto_check_missing_default", group = %group, default = default);
            self.report.warn(message);
        }

        let mut eligible = Vec::with_capacity(ranked.len());
        for node in ranked {
            let option = tree.node(node)?;
            if self.config.skip_hidden && option.hidden() {
                continue;
            }
            eligible.push((node, option.amount()));
        }

        let full = |count: f64| count >= min || max.is_some_and(|max| count >= max);
        // One unit per option per pass, in priority order.
        loop {
            let mut progressed = false;
            for &(node, _) in &eligible {
                if full(count) {
                    break;
                }
                let option = tree.node(node)?;
                let amount = option.amount();
                if option.bounds().1.is_some_and(|max| amount + 1.0 > max) {
                    continue;
                }
                tree.set_selections(node, amount + 1.0)?;
                self.report.record_changed(node);
                count += 1.0;
                progressed = true;
            }
            if !progressed || full(count) {
                break;
            }
        }
        debug!(event = "auto_check_fill", group = %group, count = count, min = min);

        if count < min {
            let message = format!("group {group_id}: {count} of {min} required selections available");
            warn!(event = "auto_check_unfilled", group = %group, count = count, min = min);
            self.report.warn(message);
        }

        // Newly selected options populate their own children next.
        for &(node, before) in eligible.iter().rev() {
            if before <= 0.0 && tree.node(node)?.amount() > 0.0 {
                self.stack.push(Step::Visit(node));
            }
        }
        Ok(())
    }
}
