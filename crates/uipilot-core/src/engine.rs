//! The automation engine: every tree operation a request can ask for.

use crate::actions::{perform_node_action, ActionTarget};
use crate::error::{AutomationError, Result};
use crate::events::EventHub;
use crate::node::NodePath;
use crate::selector::{Matcher, SelectorExpr};
use crate::source::{GlobalAction, NodeAction, NodeSource};
use crate::tables::LaunchTables;
use crate::walker::{self, FindMode, FindResult, TreeDump};
use crate::window::{self, OverlayRules};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Engine bound to one node source and its event hub.
pub struct Automation<S> {
    pub(crate) source: Arc<S>,
    pub(crate) events: Arc<EventHub>,
    pub(crate) overlay: OverlayRules,
    pub(crate) tables: LaunchTables,
}

impl<S> Automation<S> {
    pub fn new(source: Arc<S>, events: Arc<EventHub>) -> Self {
        Self {
            source,
            events,
            overlay: OverlayRules::default(),
            tables: LaunchTables::default(),
        }
    }

    pub fn with_overlay_rules(mut self, rules: OverlayRules) -> Self {
        self.overlay = rules;
        self
    }

    pub fn with_launch_tables(mut self, tables: LaunchTables) -> Self {
        self.tables = tables;
        self
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    pub fn events(&self) -> &Arc<EventHub> {
        &self.events
    }

    pub fn tables(&self) -> &LaunchTables {
        &self.tables
    }
}

impl<S: NodeSource> Automation<S> {
    /// Root every tree operation reads from.
    pub fn best_root(&self) -> Result<S::Node> {
        window::select_best_root(self.source.as_ref(), &self.overlay).ok_or(AutomationError::NoActiveWindow)
    }

    /// Package of the host's active window, ignoring overlay heuristics.
    pub fn active_package(&self) -> Option<String> {
        let root = self.source.active_root()?;
        self.source.info(&root).package
    }

    pub fn dump_tree(&self, max_nodes: i64) -> Result<TreeDump> {
        let root = self.best_root()?;
        Ok(walker::dump_tree(self.source.as_ref(), &root, max_nodes))
    }

    pub fn find(&self, matcher: &Matcher, mode: FindMode, max_nodes: i64) -> Result<FindResult> {
        let root = self.best_root()?;
        Ok(self.find_in(&root, matcher, mode, max_nodes))
    }

    /// Find under an explicit `root` instead of the best root.
    pub fn find_in(&self, root: &S::Node, matcher: &Matcher, mode: FindMode, max_nodes: i64) -> FindResult {
        walker::find_matches(self.source.as_ref(), root, matcher, mode, max_nodes)
    }

    /// Find, and when nothing matches and `timeout` is non-zero, wait for a
    /// match to appear before finding again.
    pub fn find_with_timeout(
        &self,
        selector: &SelectorExpr,
        mode: FindMode,
        timeout: Duration,
        max_nodes: i64,
    ) -> Result<FindResult> {
        let matcher = Matcher::compile(selector);
        let res = self.find(&matcher, mode, max_nodes)?;
        if timeout.is_zero() || !res.matches.is_empty() {
            return Ok(res);
        }
        if self.wait_for_matcher(&matcher, timeout, max_nodes) {
            self.find(&matcher, mode, max_nodes)
        } else {
            Err(AutomationError::timeout("element not found before timeout"))
        }
    }

    /// One existence probe. A missing root counts as "not there yet".
    pub fn exists_now(&self, matcher: &Matcher, max_nodes: i64) -> bool {
        match self.best_root() {
            Ok(root) => walker::exists(self.source.as_ref(), &root, matcher, max_nodes),
            Err(_) => false,
        }
    }

    pub fn wait_for_exists(&self, selector: &SelectorExpr, timeout: Duration, max_nodes: i64) -> bool {
        self.wait_for_matcher(&Matcher::compile(selector), timeout, max_nodes)
    }

    fn wait_for_matcher(&self, matcher: &Matcher, timeout: Duration, max_nodes: i64) -> bool {
        self.events
            .wait_until(timeout, || self.exists_now(matcher, max_nodes))
    }

    pub fn wait_for_window_changed(&self, since_ms: i64, timeout: Duration) -> bool {
        self.events.wait_for_window_changed(since_ms, timeout)
    }

    pub fn wait_for_content_changed(&self, since_ms: i64, timeout: Duration) -> bool {
        self.events.wait_for_content_changed(since_ms, timeout)
    }

    /// Resolve `target` and perform `action` on it.
    pub fn perform(
        &self,
        target: &ActionTarget,
        action: &NodeAction,
        timeout: Duration,
        max_nodes: i64,
    ) -> Result<()> {
        match target {
            ActionTarget::NodeId(raw) => {
                let root = self.best_root()?;
                let path: NodePath = raw.parse()?;
                self.perform_from(root, &path, action)
            }
            ActionTarget::Selector(selector) => {
                let matcher = Matcher::compile(selector);
                if !timeout.is_zero() && !self.wait_for_matcher(&matcher, timeout, max_nodes) {
                    return Err(AutomationError::timeout("element not found before timeout"));
                }
                let found = self.find(&matcher, FindMode::First, max_nodes)?;
                let hit = found
                    .matches
                    .first()
                    .ok_or_else(|| AutomationError::not_found("no matching node"))?;
                debug!(target = %hit.target_path(), matched = %hit.node.path, "selector resolved");
                self.perform_at(hit.target_path(), action)
            }
        }
    }

    /// Perform `action` on the node at `path` under the current best root.
    pub fn perform_at(&self, path: &NodePath, action: &NodeAction) -> Result<()> {
        let root = self.best_root()?;
        self.perform_from(root, path, action)
    }

    /// Perform `action` on the node at `path` under an explicit `root`.
    pub fn perform_from(&self, root: S::Node, path: &NodePath, action: &NodeAction) -> Result<()> {
        let node = walker::resolve_path(self.source.as_ref(), root, path)
            .ok_or_else(|| AutomationError::not_found(format!("no node at path {path}")))?;
        if perform_node_action(self.source.as_ref(), &node, action) {
            Ok(())
        } else {
            Err(AutomationError::ActionFailed(format!("{} failed", action.name())))
        }
    }

    pub fn global(&self, name: &str) -> Result<()> {
        let action = GlobalAction::parse(name)
            .ok_or_else(|| AutomationError::BadAction(format!("unsupported global action: {name}")))?;
        if self.source.global_action(action) {
            Ok(())
        } else {
            Err(AutomationError::BadAction(format!("unsupported global action: {name}")))
        }
    }
}
