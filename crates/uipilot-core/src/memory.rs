//! In-memory node source driven by a JSON fixture.
//!
//! Used by the daemon when no real accessibility host is attached, and by
//! tests. A fixture is one of:
//!
//! - a single node tree (`{"class": ..., "children": [...]}`)
//! - a `tree` response as produced by the server (`{"tree": {...}}`)
//! - a screen: `{"windows": [...], "active": 0, "apps": {...}}`
//!
//! Fixture nodes take every [`NodeInfo`] field plus `editable` (accepts
//! `setText`), `editableOnFocus` (accepts `setText` only after a `focus`),
//! `opens` (clicking it brings that app's `foreground` window up) and
//! `children`. Nodes without a package inherit their parent's.
//!
//! Apps describe how the fake package manager answers launches:
//! `activities`, `launchIntent`, `implicit`, `queryable`, and the `window`
//! shown once a launch is accepted.

use crate::events::{EventHub, UiEvent, UiEventKind};
use crate::node::{NodeInfo, NodePath};
use crate::source::{
    Gesture, GestureTicket, GlobalAction, HostError, IntentKind, LaunchIntent, NodeAction, NodeSource,
    PackageHost,
};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FixtureError {
    #[error("failed to read fixture {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid fixture: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureNode {
    #[serde(flatten)]
    pub info: NodeInfo,
    #[serde(default)]
    pub editable: bool,
    #[serde(default)]
    pub editable_on_focus: bool,
    #[serde(default)]
    pub opens: Option<String>,
    #[serde(default)]
    pub children: Vec<FixtureNode>,
}

impl FixtureNode {
    fn inherit_package(&mut self, parent: Option<&str>) {
        if self.info.package.is_none() {
            self.info.package = parent.map(String::from);
        }
        let pkg = self.info.package.clone();
        for child in &mut self.children {
            child.inherit_package(pkg.as_deref());
        }
    }

    fn at(&self, path: &[usize]) -> Option<&FixtureNode> {
        path.iter().try_fold(self, |node, &i| node.children.get(i))
    }

    fn at_mut(&mut self, path: &[usize]) -> Option<&mut FixtureNode> {
        path.iter().try_fold(self, |node, &i| node.children.get_mut(i))
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppFixture {
    /// Classes accepted by explicit starts, in launcher order.
    #[serde(default)]
    pub activities: Vec<String>,
    /// Whether the package registers a launch intent.
    #[serde(default)]
    pub launch_intent: bool,
    /// Whether an implicit MAIN/LAUNCHER start resolves.
    #[serde(default)]
    pub implicit: bool,
    /// Whether launcher queries list `activities`.
    #[serde(default = "default_true")]
    pub queryable: bool,
    #[serde(default)]
    pub window: Option<FixtureNode>,
    #[serde(default)]
    pub foreground: Option<FixtureNode>,
}

fn first_window() -> Option<usize> {
    Some(0)
}

#[derive(Debug, Deserialize)]
struct ScreenFixture {
    windows: Vec<FixtureNode>,
    #[serde(default = "first_window")]
    active: Option<usize>,
    #[serde(default)]
    apps: BTreeMap<String, AppFixture>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FixtureDoc {
    Screen(ScreenFixture),
    Dump { tree: FixtureNode },
    Single(FixtureNode),
}

/// How dispatched gestures resolve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GestureBehavior {
    #[default]
    Complete,
    Cancel,
    /// Drop the completion sender without answering.
    Drop,
    /// Keep the sender alive and never answer.
    Hang,
}

/// Handle into a [`MemorySource`] window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryNode {
    window: usize,
    path: NodePath,
}

impl MemoryNode {
    fn root(window: usize) -> Self {
        Self {
            window,
            path: NodePath::root(),
        }
    }

    pub fn path(&self) -> &NodePath {
        &self.path
    }
}

#[derive(Debug)]
struct State {
    windows: Vec<FixtureNode>,
    active: Option<usize>,
    apps: BTreeMap<String, AppFixture>,
    events: Option<Arc<EventHub>>,
    direct_actions: bool,
    gesture_behavior: GestureBehavior,
    held: Vec<Sender<bool>>,
    actions: Vec<(NodePath, NodeAction)>,
    gestures: Vec<Gesture>,
    launches: Vec<LaunchIntent>,
    globals: Vec<GlobalAction>,
}

impl State {
    fn node(&self, handle: &MemoryNode) -> Option<&FixtureNode> {
        self.windows.get(handle.window)?.at(handle.path.segments())
    }

    fn node_mut(&mut self, handle: &MemoryNode) -> Option<&mut FixtureNode> {
        self.windows.get_mut(handle.window)?.at_mut(handle.path.segments())
    }

    /// Bring `window` to the front, replacing any window of the same package.
    fn show(&mut self, mut window: FixtureNode) -> usize {
        window.inherit_package(None);
        let pkg = window.info.package.clone();
        let idx = match self
            .windows
            .iter()
            .position(|w| pkg.is_some() && w.info.package == pkg)
        {
            Some(i) => {
                self.windows[i] = window;
                i
            }
            None => {
                self.windows.push(window);
                self.windows.len() - 1
            }
        };
        self.active = Some(idx);
        idx
    }
}

/// Fixture-backed [`NodeSource`] and [`PackageHost`].
#[derive(Debug)]
pub struct MemorySource {
    state: Mutex<State>,
}

impl MemorySource {
    pub fn from_json(value: &Value) -> Result<Self, FixtureError> {
        let doc = FixtureDoc::deserialize(value)?;
        let (mut windows, active, apps) = match doc {
            FixtureDoc::Screen(s) => (s.windows, s.active, s.apps),
            FixtureDoc::Dump { tree } | FixtureDoc::Single(tree) => (vec![tree], Some(0), BTreeMap::new()),
        };
        for w in &mut windows {
            w.inherit_package(None);
        }

        Ok(Self {
            state: Mutex::new(State {
                windows,
                active,
                apps,
                events: None,
                direct_actions: true,
                gesture_behavior: GestureBehavior::default(),
                held: Vec::new(),
                actions: Vec::new(),
                gestures: Vec::new(),
                launches: Vec::new(),
                globals: Vec::new(),
            }),
        })
    }

    pub fn load(path: &Path) -> Result<Self, FixtureError> {
        let raw = std::fs::read_to_string(path).map_err(|source| FixtureError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let value: Value = serde_json::from_str(&raw)?;
        Self::from_json(&value)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Report window and content changes to `hub` from now on.
    pub fn attach_events(&self, hub: Arc<EventHub>) {
        self.lock().events = Some(hub);
    }

    fn emit(&self, hub: Option<Arc<EventHub>>, event: Option<UiEvent>) {
        if let (Some(hub), Some(event)) = (hub, event) {
            hub.record(event);
        }
    }

    /// Add a window from its JSON form; `activate` makes it the active one.
    pub fn push_window(&self, value: &Value, activate: bool) -> Result<usize, FixtureError> {
        let window = FixtureNode::deserialize(value)?;
        let mut state = self.lock();
        let previous = state.active;
        let idx = state.show(window);
        if !activate {
            state.active = previous;
        }
        Ok(idx)
    }

    pub fn set_active(&self, window: Option<usize>) {
        self.lock().active = window;
    }

    /// When disabled every direct node action is refused, forcing fallbacks.
    pub fn set_direct_actions(&self, enabled: bool) {
        self.lock().direct_actions = enabled;
    }

    pub fn set_gesture_behavior(&self, behavior: GestureBehavior) {
        self.lock().gesture_behavior = behavior;
    }

    /// Successful direct actions, by node path.
    pub fn actions(&self) -> Vec<(NodePath, NodeAction)> {
        self.lock().actions.clone()
    }

    pub fn gestures(&self) -> Vec<Gesture> {
        self.lock().gestures.clone()
    }

    /// Accepted activity starts.
    pub fn launches(&self) -> Vec<LaunchIntent> {
        self.lock().launches.clone()
    }

    pub fn globals(&self) -> Vec<GlobalAction> {
        self.lock().globals.clone()
    }
}

impl NodeSource for MemorySource {
    type Node = MemoryNode;

    fn active_root(&self) -> Option<MemoryNode> {
        let state = self.lock();
        state
            .active
            .filter(|&i| i < state.windows.len())
            .map(MemoryNode::root)
    }

    fn window_roots(&self) -> Vec<MemoryNode> {
        (0..self.lock().windows.len()).map(MemoryNode::root).collect()
    }

    fn info(&self, node: &MemoryNode) -> NodeInfo {
        self.lock()
            .node(node)
            .map(|n| n.info.clone())
            .unwrap_or_default()
    }

    fn child_count(&self, node: &MemoryNode) -> usize {
        self.lock().node(node).map_or(0, |n| n.children.len())
    }

    fn child(&self, node: &MemoryNode, index: usize) -> Option<MemoryNode> {
        (index < self.child_count(node)).then(|| MemoryNode {
            window: node.window,
            path: node.path.child(index),
        })
    }

    fn perform_action(&self, node: &MemoryNode, action: &NodeAction) -> bool {
        let mut state = self.lock();
        if !state.direct_actions {
            return false;
        }

        let (package, opens) = {
            let Some(target) = state.node_mut(node) else {
                return false;
            };
            let accepted = target.info.enabled
                && match action {
                    NodeAction::Click | NodeAction::LongClick => target.info.clickable,
                    NodeAction::Focus => {
                        target.editable |= target.editable_on_focus;
                        true
                    }
                    NodeAction::ScrollForward | NodeAction::ScrollBackward => target.info.scrollable,
                    NodeAction::SetText(text) => {
                        if target.editable {
                            target.info.text = Some(text.clone());
                        }
                        target.editable
                    }
                };
            if !accepted {
                return false;
            }
            let opens = match action {
                NodeAction::Click => target.opens.clone(),
                _ => None,
            };
            (target.info.package.clone(), opens)
        };
        state.actions.push((node.path.clone(), action.clone()));

        let mut event = match action {
            NodeAction::SetText(_) | NodeAction::ScrollForward | NodeAction::ScrollBackward => Some(
                UiEvent::new(UiEventKind::WindowContentChanged, package.as_deref()),
            ),
            _ => None,
        };
        if let Some(pkg) = opens {
            let window = state.apps.get(&pkg).and_then(|a| a.foreground.clone());
            if let Some(window) = window {
                state.show(window);
                event = Some(UiEvent::new(UiEventKind::WindowStateChanged, Some(&pkg)));
            }
        }

        let hub = state.events.clone();
        drop(state);
        self.emit(hub, event);
        true
    }

    fn dispatch_gesture(&self, gesture: Gesture) -> GestureTicket {
        let (tx, rx) = mpsc::channel();
        let mut state = self.lock();
        state.gestures.push(gesture);
        match state.gesture_behavior {
            GestureBehavior::Complete => {
                let _ = tx.send(true);
            }
            GestureBehavior::Cancel => {
                let _ = tx.send(false);
            }
            GestureBehavior::Drop => drop(tx),
            GestureBehavior::Hang => state.held.push(tx),
        }
        rx
    }

    fn global_action(&self, action: GlobalAction) -> bool {
        self.lock().globals.push(action);
        true
    }
}

impl PackageHost for MemorySource {
    fn start_activity(&self, intent: &LaunchIntent) -> Result<(), HostError> {
        let mut state = self.lock();
        let app = state
            .apps
            .get(&intent.package)
            .ok_or_else(|| HostError::ActivityNotFound(intent.package.clone()))?;

        let accepted = match intent.kind {
            IntentKind::Explicit => intent
                .class_name
                .as_ref()
                .is_some_and(|c| app.activities.contains(c)),
            IntentKind::Registered => app.launch_intent,
            IntentKind::ImplicitLauncher => app.implicit,
        };
        if !accepted {
            return Err(HostError::ActivityNotFound(format!(
                "{}/{}",
                intent.package,
                intent.class_name.as_deref().unwrap_or("*")
            )));
        }

        let window = app.window.clone();
        state.launches.push(intent.clone());
        if let Some(window) = window {
            state.show(window);
        }
        let hub = state.events.clone();
        drop(state);

        self.emit(
            hub,
            Some(UiEvent::new(UiEventKind::WindowStateChanged, Some(&intent.package))),
        );
        Ok(())
    }

    fn launch_intent_for_package(&self, package: &str) -> Option<LaunchIntent> {
        let state = self.lock();
        let app = state.apps.get(package).filter(|a| a.launch_intent)?;
        Some(LaunchIntent {
            kind: IntentKind::Registered,
            package: package.to_string(),
            class_name: app.activities.first().cloned(),
        })
    }

    fn query_launcher_activities(&self, package: &str) -> Vec<String> {
        self.lock()
            .apps
            .get(package)
            .filter(|a| a.queryable)
            .map(|a| a.activities.clone())
            .unwrap_or_default()
    }
}
