//! Host capabilities consumed by the engine.
//!
//! The accessibility API itself lives outside this crate. A host exposes its
//! tree through [`NodeSource`] and its app launcher through [`PackageHost`].
//! Node handles are only held for the duration of one request.

use crate::node::NodeInfo;
use std::sync::mpsc::Receiver;
use std::time::Duration;
use thiserror::Error;

/// Direct node actions understood by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeAction {
    Click,
    LongClick,
    Focus,
    ScrollForward,
    ScrollBackward,
    SetText(String),
}

impl NodeAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::LongClick => "longClick",
            Self::Focus => "focus",
            Self::ScrollForward => "scrollForward",
            Self::ScrollBackward => "scrollBackward",
            Self::SetText(_) => "setText",
        }
    }
}

/// System-wide navigation actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalAction {
    Back,
    Home,
    Recents,
    Notifications,
}

impl GlobalAction {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "back" => Some(Self::Back),
            "home" => Some(Self::Home),
            "recents" => Some(Self::Recents),
            "notifications" => Some(Self::Notifications),
            _ => None,
        }
    }
}

/// Shape of a single-stroke synthesized gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stroke {
    /// Press and hold at one point.
    Tap { x: i32, y: i32 },
    /// Straight line from one point to another.
    Swipe { from: (i32, i32), to: (i32, i32) },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gesture {
    pub stroke: Stroke,
    pub duration: Duration,
}

/// Completion signal for a dispatched gesture: `true` when the host reports it
/// completed, `false` when cancelled. The host may drop the sender on failure.
pub type GestureTicket = Receiver<bool>;

/// Read and act on the live UI tree.
pub trait NodeSource: Send + Sync {
    /// Live node handle. Never stored past the request that obtained it.
    type Node;

    /// Root of the window the host considers active.
    fn active_root(&self) -> Option<Self::Node>;

    /// Roots of every window the host can enumerate.
    fn window_roots(&self) -> Vec<Self::Node>;

    fn info(&self, node: &Self::Node) -> NodeInfo;

    fn child_count(&self, node: &Self::Node) -> usize;

    /// Child at `index`; `None` when the index is out of range or the child vanished.
    fn child(&self, node: &Self::Node, index: usize) -> Option<Self::Node>;

    fn perform_action(&self, node: &Self::Node, action: &NodeAction) -> bool;

    /// Post a gesture to the host's dispatch thread.
    fn dispatch_gesture(&self, gesture: Gesture) -> GestureTicket;

    fn global_action(&self, action: GlobalAction) -> bool;
}

/// How an activity start is addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentKind {
    /// Explicit package + class.
    Explicit,
    /// The launch intent the package registered with the host.
    Registered,
    /// MAIN/LAUNCHER restricted to a package, resolved by the host.
    ImplicitLauncher,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchIntent {
    pub kind: IntentKind,
    pub package: String,
    pub class_name: Option<String>,
}

impl LaunchIntent {
    pub fn explicit(package: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self {
            kind: IntentKind::Explicit,
            package: package.into(),
            class_name: Some(class_name.into()),
        }
    }

    pub fn implicit_launcher(package: impl Into<String>) -> Self {
        Self {
            kind: IntentKind::ImplicitLauncher,
            package: package.into(),
            class_name: None,
        }
    }
}

/// Errors raised by the host when starting activities.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("activity not found: {0}")]
    ActivityNotFound(String),

    #[error("launch denied: {0}")]
    Denied(String),

    #[error("host error: {0}")]
    Other(String),
}

/// Start activities and query launchable components.
pub trait PackageHost: Send + Sync {
    fn start_activity(&self, intent: &LaunchIntent) -> Result<(), HostError>;

    /// The launch intent registered by `package`, if any.
    fn launch_intent_for_package(&self, package: &str) -> Option<LaunchIntent>;

    /// Activity class names answering a MAIN/LAUNCHER query for `package`.
    fn query_launcher_activities(&self, package: &str) -> Vec<String>;
}
