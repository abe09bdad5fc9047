//! Error types for the automation engine.

use crate::launch::LaunchReport;
use crate::node::PathError;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::fmt;
use thiserror::Error;

/// Result type alias using the automation error type.
pub type Result<T> = std::result::Result<T, AutomationError>;

/// Stable wire codes reported in the `error` field of a failed response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    BadJson,
    EmptyRequest,
    BadRequest,
    BadNodeId,
    BadOp,
    BadAction,
    BadEvent,
    ServiceDisabled,
    NoActiveWindow,
    NotFound,
    Timeout,
    ActionFailed,
    LaunchFailed,
    ReadFailed,
    Exception,
}

impl ErrorCode {
    /// The code as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadJson => "BAD_JSON",
            Self::EmptyRequest => "EMPTY_REQUEST",
            Self::BadRequest => "BAD_REQUEST",
            Self::BadNodeId => "BAD_NODE_ID",
            Self::BadOp => "BAD_OP",
            Self::BadAction => "BAD_ACTION",
            Self::BadEvent => "BAD_EVENT",
            Self::ServiceDisabled => "SERVICE_DISABLED",
            Self::NoActiveWindow => "NO_ACTIVE_WINDOW",
            Self::NotFound => "NOT_FOUND",
            Self::Timeout => "TIMEOUT",
            Self::ActionFailed => "ACTION_FAILED",
            Self::LaunchFailed => "LAUNCH_FAILED",
            Self::ReadFailed => "READ_FAILED",
            Self::Exception => "EXCEPTION",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced by tree, action, wait and launch operations.
#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("no usable active window")]
    NoActiveWindow,

    #[error("bad node id: {0}")]
    BadNodeId(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Timeout(String),

    #[error("{0}")]
    ActionFailed(String),

    #[error("unsupported action: {0}")]
    BadAction(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("unable to resolve launcher activity for package: {package}")]
    LaunchFailed {
        package: String,
        candidates: Vec<String>,
    },

    #[error("openApp timeout for package: {}", .0.package_name)]
    LaunchTimeout(Box<LaunchReport>),
}

impl AutomationError {
    /// Create a not found error with a custom message.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a timeout error with a custom message.
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a bad request error with a custom message.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    /// Wire code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NoActiveWindow => ErrorCode::NoActiveWindow,
            Self::BadNodeId(_) => ErrorCode::BadNodeId,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::Timeout(_) | Self::LaunchTimeout(_) => ErrorCode::Timeout,
            Self::ActionFailed(_) => ErrorCode::ActionFailed,
            Self::BadAction(_) => ErrorCode::BadAction,
            Self::BadRequest(_) => ErrorCode::BadRequest,
            Self::LaunchFailed { .. } => ErrorCode::LaunchFailed,
        }
    }

    /// Extra diagnostic fields merged into the error response.
    pub fn details(&self) -> Map<String, Value> {
        match self {
            Self::LaunchFailed {
                package,
                candidates,
            } => match json!({ "packageName": package, "candidates": candidates }) {
                Value::Object(map) => map,
                _ => Map::new(),
            },
            Self::LaunchTimeout(report) => match serde_json::to_value(report.as_ref()) {
                Ok(Value::Object(map)) => map,
                _ => Map::new(),
            },
            _ => Map::new(),
        }
    }
}

impl From<PathError> for AutomationError {
    fn from(err: PathError) -> Self {
        match err {
            PathError::Negative(_) => Self::NotFound(err.to_string()),
            PathError::Blank | PathError::BadSegment(_) => Self::BadNodeId(err.to_string()),
        }
    }
}
