//! # uipilot core
//!
//! Inspect and drive the foreground UI of a device through its accessibility
//! tree.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Automation<S>                         │
//! │                                                              │
//! │  ┌────────────┐  ┌────────────┐  ┌──────────┐  ┌──────────┐  │
//! │  │ Best root  │  │   Walker   │  │ Actions  │  │  Launch  │  │
//! │  └────────────┘  └────────────┘  └──────────┘  └──────────┘  │
//! │        │               │              │             │        │
//! │  ┌────────────┐  ┌────────────┐  ┌──────────┐               │
//! │  │  EventHub  │  │  Selector  │  │ Gestures │               │
//! │  └────────────┘  └────────────┘  └──────────┘               │
//! └──────────────────────────────────────────────────────────────┘
//!                               │
//!                   NodeSource + PackageHost (host)
//! ```
//!
//! The host supplies the live tree through [`NodeSource`] and app starts
//! through [`PackageHost`]. Everything that leaves a request is a plain
//! [`NodeSnapshot`]; live handles never outlive the call that obtained them.
//!
//! [`MemorySource`] is a fixture-backed host for tests and the offline daemon.

pub mod actions;
pub mod engine;
pub mod error;
pub mod events;
pub mod gesture;
pub mod launch;
pub mod memory;
pub mod node;
pub mod selector;
pub mod source;
pub mod tables;
pub mod walker;
pub mod window;

pub use actions::ActionTarget;
pub use engine::Automation;
pub use error::{AutomationError, ErrorCode, Result};
pub use events::{now_ms, EventHub, UiEvent, UiEventKind};
pub use launch::{LaunchReport, MatchedBy, OpenAppRequest};
pub use memory::{FixtureError, GestureBehavior, MemorySource};
pub use node::{Bounds, NodeInfo, NodePath, NodeSnapshot, PathError};
pub use selector::{Matcher, SelectorExpr};
pub use source::{
    Gesture, GestureTicket, GlobalAction, HostError, IntentKind, LaunchIntent, NodeAction, NodeSource,
    PackageHost, Stroke,
};
pub use tables::{ConfirmPreference, DialogRules, LaunchTables};
pub use walker::{FindMode, FindResult, MatchResult, TreeDump, TreeNode};
pub use window::OverlayRules;
