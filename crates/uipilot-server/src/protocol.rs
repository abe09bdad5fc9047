//! Wire types: one JSON object in, one JSON object out.
//!
//! Every response carries `ok`. Failures add `error` (an [`ErrorCode`]) and
//! `message`, plus any diagnostic fields the error provides.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use uipilot_core::{AutomationError, ErrorCode, SelectorExpr};

/// Ops understood by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Ping,
    Tree,
    Global,
    Find,
    Action,
    Wait,
    OpenApp,
    History,
}

impl Op {
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "ping" => Self::Ping,
            "tree" => Self::Tree,
            "global" => Self::Global,
            "find" => Self::Find,
            "action" => Self::Action,
            "wait" => Self::Wait,
            "openApp" => Self::OpenApp,
            "history" => Self::History,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeRequest {
    pub max_nodes: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GlobalRequest {
    pub action: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindRequest {
    pub selector: Option<SelectorExpr>,
    pub mode: Option<String>,
    pub timeout_ms: Option<i64>,
    pub max_nodes: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetSpec {
    pub node_id: Option<String>,
    pub selector: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    pub target: Option<TargetSpec>,
    pub action: Option<String>,
    pub args: Option<Value>,
    pub timeout_ms: Option<i64>,
    pub max_nodes: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitRequest {
    pub event: Option<String>,
    pub since_ms: Option<i64>,
    pub timeout_ms: Option<i64>,
    pub selector: Option<Value>,
    pub max_nodes: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenAppWire {
    pub package_name: Option<String>,
    pub activity: Option<String>,
    pub component: Option<String>,
    pub timeout_ms: Option<i64>,
    pub max_nodes: Option<i64>,
    pub handle_confirm_dialog: Option<bool>,
    pub preferred_confirm: Option<String>,
}

/// A protocol response under construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Response(Map<String, Value>);

impl Response {
    pub fn ok() -> Self {
        let mut map = Map::new();
        map.insert("ok".into(), Value::Bool(true));
        Self(map)
    }

    /// Success carrying the fields of `body`, which must serialize to an object.
    pub fn ok_with(body: impl Serialize) -> Self {
        let mut res = Self::ok();
        match serde_json::to_value(body) {
            Ok(Value::Object(fields)) => res.0.extend(fields),
            Ok(_) => {}
            Err(e) => return Self::error(ErrorCode::Exception, e.to_string()),
        }
        res
    }

    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        let mut map = Map::new();
        map.insert("ok".into(), Value::Bool(false));
        map.insert("error".into(), Value::String(code.as_str().into()));
        map.insert("message".into(), Value::String(message.into()));
        Self(map)
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn is_ok(&self) -> bool {
        self.0.get("ok").and_then(Value::as_bool).unwrap_or(false)
    }

    /// Error code, if this is a failure.
    pub fn error_code(&self) -> Option<&str> {
        self.0.get("error").and_then(Value::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn to_json(&self) -> String {
        Value::Object(self.0.clone()).to_string()
    }
}

impl From<AutomationError> for Response {
    fn from(err: AutomationError) -> Self {
        let mut res = Self::error(err.code(), err.to_string());
        res.0.extend(err.details());
        res
    }
}

impl Serialize for Response {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_op_parse() {
        assert_eq!(Op::parse("openApp"), Some(Op::OpenApp));
        assert_eq!(Op::parse("openapp"), None);
        assert_eq!(Op::parse(""), None);
    }

    #[test]
    fn test_error_response_shape() {
        let res = Response::error(ErrorCode::NotFound, "no matching node");
        assert_eq!(
            res.into_value(),
            json!({"ok": false, "error": "NOT_FOUND", "message": "no matching node"})
        );
    }

    #[test]
    fn test_ok_with_merges_fields() {
        let res = Response::ok_with(json!({"mode": "first", "matches": []}));
        assert!(res.is_ok());
        assert_eq!(res.get("mode"), Some(&json!("first")));
    }

    #[test]
    fn test_automation_error_details_are_merged() {
        let res: Response = AutomationError::LaunchFailed {
            package: "com.x".into(),
            candidates: vec!["com.x".into()],
        }
        .into();
        assert_eq!(res.error_code(), Some("LAUNCH_FAILED"));
        assert_eq!(res.get("candidates"), Some(&json!(["com.x"])));
        assert!(!res.is_ok());
    }

    #[test]
    fn test_requests_reject_wrong_types() {
        assert!(serde_json::from_value::<TreeRequest>(json!({"maxNodes": "ten"})).is_err());
        let req: FindRequest = serde_json::from_value(json!({"op": "find", "selector": null})).unwrap();
        assert!(req.selector.is_none());
    }
}
