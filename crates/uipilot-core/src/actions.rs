//! Node action parsing and execution with gesture fallbacks.

use crate::error::{AutomationError, Result};
use crate::gesture::{self, LONG_PRESS_DURATION, TAP_DURATION};
use crate::selector::SelectorExpr;
use crate::source::{NodeAction, NodeSource};
use serde_json::Value;
use tracing::debug;

impl NodeAction {
    /// Build an action from its wire name and `args` object.
    pub fn from_request(name: &str, args: Option<&Value>) -> Result<Self> {
        Ok(match name {
            "click" => Self::Click,
            "longClick" => Self::LongClick,
            "focus" => Self::Focus,
            "scrollForward" => Self::ScrollForward,
            "scrollBackward" => Self::ScrollBackward,
            "setText" => {
                let text = args
                    .and_then(|a| a.get("text"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| AutomationError::bad_request("setText requires args.text"))?;
                Self::SetText(text.to_string())
            }
            other => return Err(AutomationError::BadAction(other.to_string())),
        })
    }
}

/// What an `action` request points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionTarget {
    /// Raw client node id, parsed at execution time.
    NodeId(String),
    Selector(SelectorExpr),
}

/// Perform `action` on `node`, falling back to a synthesized gesture where
/// one exists.
pub fn perform_node_action<S: NodeSource>(source: &S, node: &S::Node, action: &NodeAction) -> bool {
    if source.perform_action(node, action) {
        return true;
    }

    let bounds = || source.info(node).bounds;
    match action {
        NodeAction::Click => {
            debug!("direct click refused, tapping");
            gesture::click_fallback(source, &bounds(), TAP_DURATION)
        }
        NodeAction::LongClick => {
            debug!("direct long click refused, pressing");
            gesture::click_fallback(source, &bounds(), LONG_PRESS_DURATION)
        }
        NodeAction::Focus => false,
        NodeAction::ScrollForward => gesture::scroll_fallback(source, &bounds(), true),
        NodeAction::ScrollBackward => gesture::scroll_fallback(source, &bounds(), false),
        NodeAction::SetText(_) => {
            debug!("setText refused, focusing and retrying");
            source.perform_action(node, &NodeAction::Focus) && source.perform_action(node, action)
        }
    }
}
