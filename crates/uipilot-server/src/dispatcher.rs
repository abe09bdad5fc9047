//! Routes one decoded request to the automation engine.
//!
//! Everything here is blocking; the server runs it on the blocking pool
//! behind its global lock.

use crate::config::{millis, OpDefaults, ServerConfig};
use crate::history::{History, HistoryEntry};
use crate::protocol::{
    ActionRequest, FindRequest, GlobalRequest, Op, OpenAppWire, Response, TargetSpec, TreeRequest,
    WaitRequest,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use uipilot_core::{
    now_ms, ActionTarget, Automation, AutomationError, ConfirmPreference, ErrorCode, EventHub,
    FindMode, NodeAction, NodeSource, OpenAppRequest, PackageHost, SelectorExpr,
};

/// Handler outcome; both arms are sent to the client as-is.
type Handled<T = Response> = std::result::Result<T, Response>;

#[derive(Serialize)]
struct HistoryBody {
    entries: Vec<HistoryEntry>,
}

pub struct Dispatcher<S> {
    engine: Option<Arc<Automation<S>>>,
    defaults: OpDefaults,
    history: Arc<History>,
}

impl<S> Dispatcher<S> {
    /// Dispatcher backed by `source`, with tables and defaults from `config`.
    pub fn connect(source: Arc<S>, events: Arc<EventHub>, config: &ServerConfig) -> Self {
        let engine = Automation::new(source, events)
            .with_overlay_rules(config.tables.overlay.clone())
            .with_launch_tables(config.tables.launch.clone());
        Self {
            engine: Some(Arc::new(engine)),
            defaults: config.defaults.clone(),
            history: Arc::new(History::new(config.history_size)),
        }
    }

    /// Dispatcher with no node source; only `ping` and `history` succeed.
    pub fn disconnected(config: &ServerConfig) -> Self {
        Self {
            engine: None,
            defaults: config.defaults.clone(),
            history: Arc::new(History::new(config.history_size)),
        }
    }

    pub fn history(&self) -> &Arc<History> {
        &self.history
    }

    pub fn defaults(&self) -> &OpDefaults {
        &self.defaults
    }
}

impl<S: NodeSource + PackageHost> Dispatcher<S> {
    /// Handle one raw request body. Never fails; errors come back as
    /// `ok:false` responses.
    pub fn handle_raw(&self, raw: &str) -> Response {
        let raw = raw.trim();
        if raw.is_empty() {
            return Response::error(ErrorCode::EmptyRequest, "request body is empty");
        }
        let value: Value = match serde_json::from_str(raw) {
            Ok(v @ Value::Object(_)) => v,
            Ok(_) => return Response::error(ErrorCode::BadJson, "request must be a json object"),
            Err(e) => return Response::error(ErrorCode::BadJson, format!("invalid json: {e}")),
        };
        match self.handle(value) {
            Ok(res) | Err(res) => res,
        }
    }

    fn handle(&self, value: Value) -> Handled {
        let name = value.get("op").and_then(Value::as_str).unwrap_or_default();
        let op = Op::parse(name)
            .ok_or_else(|| Response::error(ErrorCode::BadOp, format!("unknown op: {name}")))?;
        debug!(?op, "dispatching request");

        match op {
            Op::Ping => Ok(Response::ok().with("message", "pong")),
            Op::History => Ok(Response::ok_with(HistoryBody {
                entries: self.history.recent(),
            })),
            Op::Tree => self.tree(self.engine()?, decode(value)?),
            Op::Global => self.global(self.engine()?, decode(value)?),
            Op::Find => self.find(self.engine()?, decode(value)?),
            Op::Action => self.action(self.engine()?, decode(value)?),
            Op::Wait => self.wait(self.engine()?, decode(value)?),
            Op::OpenApp => self.open_app(self.engine()?, decode(value)?),
        }
    }

    fn engine(&self) -> Handled<&Automation<S>> {
        self.engine.as_deref().ok_or_else(|| {
            Response::error(ErrorCode::ServiceDisabled, "accessibility service not connected")
        })
    }

    fn tree(&self, engine: &Automation<S>, req: TreeRequest) -> Handled {
        let dump = engine.dump_tree(req.max_nodes.unwrap_or(self.defaults.tree_max_nodes))?;
        Ok(Response::ok_with(dump))
    }

    fn global(&self, engine: &Automation<S>, req: GlobalRequest) -> Handled {
        let name = req.action.unwrap_or_default();
        engine.global(&name)?;
        Ok(Response::ok())
    }

    fn find(&self, engine: &Automation<S>, req: FindRequest) -> Handled {
        let mode = match req.mode.as_deref() {
            Some(raw) => raw
                .parse::<FindMode>()
                .map_err(|e| Response::error(ErrorCode::BadRequest, e))?,
            None => self.defaults.find_mode,
        };
        let selector = req.selector.unwrap_or(SelectorExpr::All);
        let timeout = millis(req.timeout_ms.unwrap_or(self.defaults.find_timeout_ms));
        let max_nodes = req.max_nodes.unwrap_or(self.defaults.max_nodes);

        let found = engine.find_with_timeout(&selector, mode, timeout, max_nodes)?;
        Ok(Response::ok_with(found))
    }

    fn action(&self, engine: &Automation<S>, req: ActionRequest) -> Handled {
        let target = resolve_target(req.target)?;
        let name = req
            .action
            .filter(|a| !a.is_empty())
            .ok_or_else(|| Response::error(ErrorCode::BadAction, "missing action"))?;
        let action = NodeAction::from_request(&name, req.args.as_ref())?;
        let timeout = millis(req.timeout_ms.unwrap_or(self.defaults.action_timeout_ms));
        let max_nodes = req.max_nodes.unwrap_or(self.defaults.max_nodes);

        engine.perform(&target, &action, timeout, max_nodes)?;
        Ok(Response::ok())
    }

    fn wait(&self, engine: &Automation<S>, req: WaitRequest) -> Handled {
        let since = req.since_ms.unwrap_or_else(now_ms);
        let timeout = millis(req.timeout_ms.unwrap_or(self.defaults.wait_timeout_ms));
        let max_nodes = req.max_nodes.unwrap_or(self.defaults.max_nodes);

        let (event, satisfied) = match req.event.as_deref().unwrap_or_default() {
            "windowChanged" => ("windowChanged", engine.wait_for_window_changed(since, timeout)),
            "contentChanged" => ("contentChanged", engine.wait_for_content_changed(since, timeout)),
            "exists" => {
                let selector = match req.selector {
                    Some(v @ Value::Object(_)) => SelectorExpr::from_json(&v),
                    _ => {
                        return Err(Response::error(
                            ErrorCode::BadRequest,
                            "missing selector for exists",
                        ))
                    }
                };
                ("exists", engine.wait_for_exists(&selector, timeout, max_nodes))
            }
            other => {
                return Err(Response::error(
                    ErrorCode::BadEvent,
                    format!("unknown wait event: {other}"),
                ))
            }
        };

        if satisfied {
            Ok(Response::ok())
        } else {
            Err(AutomationError::timeout(format!("{event} timeout")).into())
        }
    }

    fn open_app(&self, engine: &Automation<S>, wire: OpenAppWire) -> Handled {
        let d = &self.defaults;
        let mut req = OpenAppRequest::new(wire.package_name.unwrap_or_default());
        req.activity = wire.activity;
        req.component = wire.component;
        req.timeout = millis(wire.timeout_ms.unwrap_or(d.open_app_timeout_ms));
        req.max_nodes = wire.max_nodes.unwrap_or(d.max_nodes);
        req.handle_confirm_dialog = wire.handle_confirm_dialog.unwrap_or(d.handle_confirm_dialog);
        req.preferred_confirm = wire
            .preferred_confirm
            .as_deref()
            .map(ConfirmPreference::parse)
            .unwrap_or(d.preferred_confirm);

        let report = engine.open_app(&req)?;
        Ok(Response::ok_with(report))
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Handled<T> {
    serde_json::from_value(value)
        .map_err(|e| Response::error(ErrorCode::BadRequest, format!("invalid request: {e}")))
}

/// A non-blank `nodeId` wins, then an object `selector`. A blank `nodeId`
/// alone is kept so path parsing can reject it.
fn resolve_target(target: Option<TargetSpec>) -> Handled<ActionTarget> {
    let target = target.ok_or_else(|| Response::error(ErrorCode::BadRequest, "missing target"))?;
    match (target.node_id, target.selector) {
        (Some(id), _) if !id.trim().is_empty() => Ok(ActionTarget::NodeId(id)),
        (_, Some(sel @ Value::Object(_))) => Ok(ActionTarget::Selector(SelectorExpr::from_json(&sel))),
        (Some(id), _) => Ok(ActionTarget::NodeId(id)),
        _ => Err(Response::error(
            ErrorCode::BadRequest,
            "missing target.selector or target.nodeId",
        )),
    }
}
