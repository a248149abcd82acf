//! JSON-RPC 2.0 envelope types.
//!
//! Inbound documents are classified into requests (carrying an id) and
//! notifications (no id). Outbound messages are responses, which carry
//! exactly one of `result` or `error`, and plugin-initiated notifications.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::errors::ErrorKind;

pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC 2.0 request id, echoed back verbatim
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(Number),
    String(String),
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{n}"),
            RequestId::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<u64> for RequestId {
    fn from(n: u64) -> Self {
        RequestId::Number(n.into())
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        RequestId::Number(n.into())
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        RequestId::String(s)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId::String(s.to_string())
    }
}

/// Inbound JSON-RPC call. A call without an id is a notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
}

impl Request {
    #[must_use]
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// Outcome carried by a response: either a result or an error, never both
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Result(Value),
    Error(RpcError),
}

/// JSON-RPC 2.0 Response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: String,
    pub id: RequestId,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl Response {
    #[must_use]
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            outcome: Outcome::Result(result),
        }
    }

    #[must_use]
    pub fn error(id: RequestId, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            outcome: Outcome::Error(error),
        }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self.outcome, Outcome::Error(_))
    }
}

/// JSON-RPC 2.0 Notification sent by the plugin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Notification {
    #[must_use]
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC 2.0 Error object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    #[must_use]
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    #[must_use]
    pub fn with_data(code: i32, message: impl Into<String>, data: Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }

    #[must_use]
    pub fn unknown_error() -> Self {
        ErrorKind::UnknownError.into()
    }

    /// The table kind matching this error's code, if any.
    #[must_use]
    pub fn kind(&self) -> Option<ErrorKind> {
        ErrorKind::from_code(self.code)
    }
}

impl From<ErrorKind> for RpcError {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind.code(), kind.message())
    }
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RPC error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for RpcError {}

/// Outgoing message written by the plugin
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
    Response(Response),
    Notification(Notification),
}

impl Message {
    /// Serialize this message to compact JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    #[must_use]
    pub fn is_response(&self) -> bool {
        matches!(self, Message::Response(_))
    }

    #[must_use]
    pub fn is_notification(&self) -> bool {
        matches!(self, Message::Notification(_))
    }
}

impl From<Response> for Message {
    fn from(response: Response) -> Self {
        Message::Response(response)
    }
}

impl From<Notification> for Message {
    fn from(notification: Notification) -> Self {
        Message::Notification(notification)
    }
}

/// Reasons an inbound document is not a valid call
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("Message is not a JSON object")]
    NotAnObject,

    #[error("Invalid request id: {0}")]
    InvalidId(Value),

    #[error("Missing or empty method name")]
    InvalidMethod { id: Option<RequestId> },

    #[error("Params must be a JSON object, got {kind}")]
    InvalidParams {
        id: Option<RequestId>,
        kind: &'static str,
    },
}

impl EnvelopeError {
    /// Id of the offending message, when one could be recovered.
    #[must_use]
    pub fn id(&self) -> Option<&RequestId> {
        match self {
            EnvelopeError::InvalidMethod { id } | EnvelopeError::InvalidParams { id, .. } => {
                id.as_ref()
            }
            EnvelopeError::NotAnObject | EnvelopeError::InvalidId(_) => None,
        }
    }
}

/// Classified inbound document
#[derive(Debug, Clone)]
pub enum Incoming {
    /// Call with an id; exactly one response is owed
    Request(Request),
    /// Call without an id; never answered
    Notification(Request),
    /// A response document; the plugin issues no requests so these are ignored
    Response(Option<RequestId>),
}

impl Incoming {
    /// Parse a JSON string into an `Incoming` message.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or is not a valid envelope.
    pub fn parse(json: &str) -> Result<Self, ParseError> {
        let value: Value = serde_json::from_str(json)?;
        Ok(Self::from_value(value)?)
    }

    /// Classify and validate a decoded JSON document.
    ///
    /// # Errors
    ///
    /// Returns an [`EnvelopeError`] describing the first violation found.
    pub fn from_value(value: Value) -> Result<Self, EnvelopeError> {
        let Value::Object(mut obj) = value else {
            return Err(EnvelopeError::NotAnObject);
        };

        let id = match obj.remove("id") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(RequestId::String(s)),
            Some(Value::Number(n)) => Some(RequestId::Number(n)),
            Some(other) => return Err(EnvelopeError::InvalidId(other)),
        };

        let method = match obj.remove("method") {
            Some(Value::String(m)) if !m.is_empty() => m,
            None if obj.contains_key("result") || obj.contains_key("error") => {
                return Ok(Incoming::Response(id));
            }
            _ => return Err(EnvelopeError::InvalidMethod { id }),
        };

        let params = match obj.remove("params") {
            None | Some(Value::Null) => None,
            Some(Value::Object(map)) => Some(map),
            Some(other) => {
                return Err(EnvelopeError::InvalidParams {
                    id,
                    kind: json_type_name(&other),
                });
            }
        };

        let jsonrpc = match obj.remove("jsonrpc") {
            Some(Value::String(v)) => v,
            _ => JSONRPC_VERSION.to_string(),
        };

        let request = Request {
            jsonrpc,
            method,
            params,
            id,
        };

        if request.id.is_some() {
            Ok(Incoming::Request(request))
        } else {
            Ok(Incoming::Notification(request))
        }
    }
}

/// Error from [`Incoming::parse`]
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid envelope: {0}")]
    Envelope(#[from] EnvelopeError),
}

/// Short JSON type name for diagnostics
#[must_use]
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
