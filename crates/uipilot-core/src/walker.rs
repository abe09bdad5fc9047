//! Budgeted depth-first traversal of a live tree.
//!
//! Every walk owns a [`NodeBudget`]. A node consumes one unit before its
//! children are considered, and once the budget is spent no further nodes are
//! visited. Live handles stay inside the walk; only snapshots come out.

use crate::node::{Bounds, NodePath, NodeSnapshot};
use crate::selector::Matcher;
use crate::source::NodeSource;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Visit cap shared by a single traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeBudget {
    max: usize,
    visited: usize,
    truncated: bool,
}

impl NodeBudget {
    /// Requested values below 1 clamp to 1.
    pub fn new(max: i64) -> Self {
        Self {
            max: usize::try_from(max.max(1)).unwrap_or(usize::MAX),
            visited: 0,
            truncated: false,
        }
    }

    pub fn can_visit(&self) -> bool {
        self.visited < self.max
    }

    pub fn on_visit(&mut self) {
        self.visited += 1;
        if self.visited >= self.max {
            self.truncated = true;
        }
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn visited(&self) -> usize {
        self.visited
    }

    pub fn truncated(&self) -> bool {
        self.truncated
    }
}

/// A snapshot with its visited children, as returned by `tree`.
#[derive(Debug, Clone, Serialize)]
pub struct TreeNode {
    #[serde(flatten)]
    pub node: NodeSnapshot,
    pub children: Vec<TreeNode>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeDump {
    pub tree: TreeNode,
    pub truncated: bool,
    pub node_count: usize,
}

/// How many matches a find collects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindMode {
    #[default]
    First,
    All,
}

impl FromStr for FindMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first" => Ok(Self::First),
            "all" => Ok(Self::All),
            other => Err(format!("unknown find mode: {other}")),
        }
    }
}

/// A matched node plus the nearest actionable and scrollable nodes on its
/// root path (self included).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    #[serde(flatten)]
    pub node: NodeSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_node_id: Option<NodePath>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_bounds: Option<Bounds>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scroll_node_id: Option<NodePath>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scroll_bounds: Option<Bounds>,
}

impl MatchResult {
    fn resolve(stack: &[NodeSnapshot]) -> Option<Self> {
        let node = stack.last()?.clone();
        let action = stack.iter().rev().find(|s| s.info.is_action_target());
        let scroll = stack.iter().rev().find(|s| s.info.is_scroll_target());
        Some(Self {
            node,
            action_node_id: action.map(|s| s.path.clone()),
            action_bounds: action.map(|s| s.info.bounds),
            scroll_node_id: scroll.map(|s| s.path.clone()),
            scroll_bounds: scroll.map(|s| s.info.bounds),
        })
    }

    /// The path an action should be performed on.
    pub fn target_path(&self) -> &NodePath {
        self.action_node_id.as_ref().unwrap_or(&self.node.path)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FindResult {
    pub mode: FindMode,
    pub matches: Vec<MatchResult>,
    pub truncated: bool,
    pub node_count: usize,
}

/// Copy one live node into an immutable snapshot.
pub fn snapshot<S: NodeSource>(source: &S, node: &S::Node, path: NodePath) -> NodeSnapshot {
    NodeSnapshot::new(path, source.info(node))
}

/// Dump the tree under `root`, visiting at most `max_nodes` nodes.
pub fn dump_tree<S: NodeSource>(source: &S, root: &S::Node, max_nodes: i64) -> TreeDump {
    let mut budget = NodeBudget::new(max_nodes);
    budget.on_visit();
    let tree = dump_node(source, root, NodePath::root(), &mut budget);
    TreeDump {
        tree,
        truncated: budget.truncated(),
        node_count: budget.visited(),
    }
}

// Caller has already charged the budget for `node`.
fn dump_node<S: NodeSource>(
    source: &S,
    node: &S::Node,
    path: NodePath,
    budget: &mut NodeBudget,
) -> TreeNode {
    let snap = snapshot(source, node, path);
    let mut children = Vec::new();

    for i in 0..source.child_count(node) {
        if !budget.can_visit() {
            break;
        }
        let Some(child) = source.child(node, i) else {
            continue;
        };
        budget.on_visit();
        children.push(dump_node(source, &child, snap.path.child(i), budget));
    }

    TreeNode {
        node: snap,
        children,
    }
}

/// Collect nodes under `root` satisfying `matcher`.
pub fn find_matches<S: NodeSource>(
    source: &S,
    root: &S::Node,
    matcher: &Matcher,
    mode: FindMode,
    max_nodes: i64,
) -> FindResult {
    let mut walk = FindWalk {
        source,
        matcher,
        mode,
        budget: NodeBudget::new(max_nodes),
        stack: Vec::new(),
        matches: Vec::new(),
    };
    walk.visit(root, NodePath::root());

    FindResult {
        mode,
        truncated: walk.budget.truncated(),
        node_count: walk.budget.visited(),
        matches: walk.matches,
    }
}

/// Whether any node under `root` satisfies `matcher`.
pub fn exists<S: NodeSource>(source: &S, root: &S::Node, matcher: &Matcher, max_nodes: i64) -> bool {
    !find_matches(source, root, matcher, FindMode::First, max_nodes)
        .matches
        .is_empty()
}

struct FindWalk<'a, S: NodeSource> {
    source: &'a S,
    matcher: &'a Matcher,
    mode: FindMode,
    budget: NodeBudget,
    stack: Vec<NodeSnapshot>,
    matches: Vec<MatchResult>,
}

impl<S: NodeSource> FindWalk<'_, S> {
    fn done(&self) -> bool {
        self.mode == FindMode::First && !self.matches.is_empty()
    }

    fn visit(&mut self, node: &S::Node, path: NodePath) {
        if !self.budget.can_visit() {
            return;
        }
        self.budget.on_visit();

        self.stack.push(snapshot(self.source, node, path));
        self.visit_inner(node);
        self.stack.pop();
    }

    fn visit_inner(&mut self, node: &S::Node) {
        if self.matcher.matches_stack(&self.stack) {
            if let Some(m) = MatchResult::resolve(&self.stack) {
                self.matches.push(m);
            }
            if self.mode == FindMode::First {
                return;
            }
        }

        let Some(path) = self.stack.last().map(|s| s.path.clone()) else {
            return;
        };
        for i in 0..self.source.child_count(node) {
            if !self.budget.can_visit() {
                break;
            }
            let Some(child) = self.source.child(node, i) else {
                continue;
            };
            self.visit(&child, path.child(i));
            if self.done() {
                return;
            }
        }
    }
}

/// Follow `path` down from `root`. `None` when any index is out of range.
pub fn resolve_path<S: NodeSource>(source: &S, root: S::Node, path: &NodePath) -> Option<S::Node> {
    let mut current = root;
    for &idx in path.segments() {
        if idx >= source.child_count(&current) {
            return None;
        }
        current = source.child(&current, idx)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemorySource;
    use serde_json::json;

    fn five_nodes() -> MemorySource {
        MemorySource::from_json(&json!({
            "class": "android.widget.FrameLayout",
            "package": "com.example",
            "bounds": [0, 0, 1080, 2400],
            "children": [
                {"class": "android.widget.TextView", "text": "a", "bounds": [0, 0, 100, 100]},
                {"class": "android.widget.TextView", "text": "b", "bounds": [0, 100, 100, 200]},
                {"class": "android.widget.LinearLayout", "bounds": [0, 200, 1080, 400], "children": [
                    {"class": "android.widget.TextView", "text": "c", "bounds": [0, 200, 100, 300]}
                ]}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_budget_clamps_and_truncates() {
        let mut b = NodeBudget::new(0);
        assert_eq!(b.max(), 1);
        assert!(b.can_visit());
        b.on_visit();
        assert!(!b.can_visit());
        assert!(b.truncated());
        assert_eq!(b.visited(), 1);
    }

    #[test]
    fn test_dump_truncates_at_budget() {
        let src = five_nodes();
        let root = src.active_root().unwrap();
        let dump = dump_tree(&src, &root, 2);
        assert!(dump.truncated);
        assert_eq!(dump.node_count, 2);
        assert_eq!(dump.tree.children.len(), 1);
        assert_eq!(dump.tree.children[0].node.path.to_string(), "0");
    }

    #[test]
    fn test_dump_full_tree() {
        let src = five_nodes();
        let root = src.active_root().unwrap();
        let dump = dump_tree(&src, &root, 500);
        assert!(!dump.truncated);
        assert_eq!(dump.node_count, 5);
        let v = serde_json::to_value(&dump).unwrap();
        assert_eq!(v["tree"]["nodeId"], "");
        assert_eq!(v["tree"]["children"][2]["children"][0]["nodeId"], "2/0");
        assert_eq!(v["nodeCount"], 5);
    }

    #[test]
    fn test_exact_budget_reports_truncated() {
        let src = five_nodes();
        let root = src.active_root().unwrap();
        let dump = dump_tree(&src, &root, 5);
        assert_eq!(dump.node_count, 5);
        assert!(dump.truncated);
    }

    #[test]
    fn test_find_first_and_all() {
        let src = five_nodes();
        let root = src.active_root().unwrap();
        let m = Matcher::from_json(&json!({"className": "android.widget.TextView"}));

        let first = find_matches(&src, &root, &m, FindMode::First, 100);
        assert_eq!(first.matches.len(), 1);
        assert_eq!(first.matches[0].node.path.to_string(), "0");
        assert_eq!(first.node_count, 2);

        let all = find_matches(&src, &root, &m, FindMode::All, 100);
        let ids: Vec<String> = all.matches.iter().map(|m| m.node.path.to_string()).collect();
        assert_eq!(ids, vec!["0", "1", "2/0"]);
        assert_eq!(all.node_count, 5);
    }

    #[test]
    fn test_first_mode_skips_children_of_match() {
        let src = five_nodes();
        let root = src.active_root().unwrap();
        let m = Matcher::from_json(&json!({"or": [{"className": "android.widget.LinearLayout"}, {"text": "c"}]}));
        let res = find_matches(&src, &root, &m, FindMode::First, 100);
        assert_eq!(res.matches.len(), 1);
        assert_eq!(res.matches[0].node.path.to_string(), "2");
        assert_eq!(res.node_count, 4);
    }

    #[test]
    fn test_action_node_is_nearest_clickable_ancestor() {
        let src = MemorySource::from_json(&json!({
            "class": "android.widget.FrameLayout",
            "bounds": [0, 0, 1080, 2400],
            "children": [{
                "class": "android.widget.LinearLayout",
                "clickable": true,
                "scrollable": true,
                "bounds": [0, 0, 500, 200],
                "children": [{
                    "class": "android.widget.TextView",
                    "resourceId": "com.example:id/ok",
                    "text": "OK",
                    "bounds": [10, 10, 100, 60]
                }]
            }]
        }))
        .unwrap();
        let root = src.active_root().unwrap();
        let m = Matcher::from_json(&json!({"resourceId": "com.example:id/ok"}));
        let res = find_matches(&src, &root, &m, FindMode::First, 100);
        let hit = &res.matches[0];
        assert_eq!(hit.node.path.to_string(), "0/0");
        assert_eq!(hit.action_node_id.as_ref().map(|p| p.to_string()).as_deref(), Some("0"));
        assert_eq!(hit.action_bounds, Some(Bounds::new(0, 0, 500, 200)));
        assert_eq!(hit.scroll_node_id.as_ref().map(|p| p.to_string()).as_deref(), Some("0"));
        assert_eq!(hit.target_path().to_string(), "0");

        let v = serde_json::to_value(hit).unwrap();
        assert_eq!(v["actionNodeId"], "0");
        assert_eq!(v["nodeId"], "0/0");
    }

    #[test]
    fn test_thin_clickable_is_not_an_action_target() {
        let src = MemorySource::from_json(&json!({
            "class": "android.widget.FrameLayout",
            "bounds": [0, 0, 1080, 2400],
            "children": [{"class": "android.view.View", "clickable": true, "text": "x", "bounds": [0, 0, 1, 50]}]
        }))
        .unwrap();
        let root = src.active_root().unwrap();
        let res = find_matches(&src, &root, &Matcher::from_json(&json!({"text": "x"})), FindMode::First, 10);
        assert!(res.matches[0].action_node_id.is_none());
        let v = serde_json::to_value(&res.matches[0]).unwrap();
        assert!(v.get("actionNodeId").is_none());
    }

    #[test]
    fn test_exists_respects_budget() {
        let src = five_nodes();
        let root = src.active_root().unwrap();
        let m = Matcher::from_json(&json!({"text": "c"}));
        assert!(exists(&src, &root, &m, 100));
        assert!(!exists(&src, &root, &m, 3));
    }

    #[test]
    fn test_resolve_path() {
        let src = five_nodes();
        let root = src.active_root().unwrap();
        let found = resolve_path(&src, root.clone(), &"2/0".parse().unwrap()).unwrap();
        assert_eq!(src.info(&found).text.as_deref(), Some("c"));
        assert!(resolve_path(&src, root.clone(), &"9/9".parse().unwrap()).is_none());
        assert!(resolve_path(&src, root, &NodePath::root()).is_some());
    }
}
