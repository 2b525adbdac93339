//! Line-oriented JSON-RPC 2.0 framing (spec §4.1).
//!
//! One message per newline; classification is purely structural (id +
//! method → request, id + result/error → response, method only →
//! notification). Serialisation enforces a single trailing newline, no
//! embedded newlines in the encoded body, and a configurable max size.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use std::fmt;

/// Errors raised while parsing or serialising a framed message.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The line was not valid JSON.
    #[error("invalid json: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The line parsed as JSON but lacked `"jsonrpc": "2.0"`.
    #[error("missing or invalid jsonrpc version header")]
    MissingJsonRpcHeader,

    /// The parsed value had neither a `method` nor a `result`/`error`, so
    /// it could not be classified as request, response, or notification.
    #[error("message has no method and no result/error: cannot classify")]
    Unclassifiable,

    /// The encoded message exceeded the configured byte cap.
    #[error("message exceeds max size ({actual} > {limit} bytes)")]
    TooLarge {
        /// Encoded size that was rejected.
        actual: usize,
        /// Configured cap.
        limit: usize,
    },

    /// The message content contained a raw newline, which would corrupt
    /// the line-delimited framing on the wire.
    #[error("message content contains an embedded newline")]
    EmbeddedNewline,
}

/// A JSON-RPC id: either a number or a string, per the 2.0 spec.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcId {
    /// Numeric id (brokerd always mints these for outbound requests).
    Number(i64),
    /// String id (accepted from backends that mint string ids).
    String(String),
}

impl fmt::Display for JsonRpcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
        }
    }
}

/// A raw, parsed JSON-RPC message before it has been dispatched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Always `"2.0"`.
    pub jsonrpc: String,
    /// Present on requests and responses; absent on notifications.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<JsonRpcId>,
    /// Present on requests and notifications.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Present on requests and notifications that carry parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// Present on successful responses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Present on failed responses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcErrorObject>,
}

/// The `error` member of a JSON-RPC response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcErrorObject {
    /// Standard or application-defined error code.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
    /// Optional structured detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcErrorObject {
    /// `-32700 Parse error`.
    #[must_use]
    pub fn parse_error(detail: impl Into<String>) -> Self {
        Self { code: -32700, message: detail.into(), data: None }
    }

    /// `-32600 Invalid Request`.
    #[must_use]
    pub fn invalid_request(detail: impl Into<String>) -> Self {
        Self { code: -32600, message: detail.into(), data: None }
    }

    /// `-32601 Method not found`.
    #[must_use]
    pub fn method_not_found(method: impl Into<String>) -> Self {
        Self { code: -32601, message: format!("Method not found: {}", method.into()), data: None }
    }

    /// `-32602 Invalid params`.
    #[must_use]
    pub fn invalid_params(detail: impl Into<String>) -> Self {
        Self { code: -32602, message: detail.into(), data: None }
    }
}

/// The structural classification of a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// `id` and `method` both present.
    Request,
    /// `id` present, `result` or `error` present.
    Response,
    /// `method` present, `id` absent.
    Notification,
}

/// Classify a message structurally (spec §4.1).
///
/// # Errors
///
/// Returns [`ProtocolError::Unclassifiable`] if the message matches none
/// of the three shapes (e.g. an id with no method, result, or error).
pub fn classify(msg: &Message) -> Result<MessageKind, ProtocolError> {
    match (&msg.id, &msg.method, msg.result.is_some() || msg.error.is_some()) {
        (Some(_), Some(_), _) => Ok(MessageKind::Request),
        (Some(_), None, true) => Ok(MessageKind::Response),
        (None, Some(_), _) => Ok(MessageKind::Notification),
        _ => Err(ProtocolError::Unclassifiable),
    }
}

/// Parse one newline-delimited line into a [`Message`].
///
/// Rejects lines that fail JSON parsing or lack `"jsonrpc": "2.0"`. Does
/// not strip the trailing newline itself — callers split on `\n` first.
///
/// # Errors
///
/// See [`ProtocolError`].
pub fn parse_line(line: &str) -> Result<Message, ProtocolError> {
    let trimmed = line.trim_end_matches(['\r', '\n']);
    let msg: Message = serde_json::from_str(trimmed)?;
    if msg.jsonrpc != "2.0" {
        return Err(ProtocolError::MissingJsonRpcHeader);
    }
    Ok(msg)
}

/// Serialise a message to a single line with exactly one trailing newline,
/// enforcing `max_size` on the encoded body (excluding the newline) and
/// rejecting any embedded newline in the encoded JSON.
///
/// # Errors
///
/// [`ProtocolError::TooLarge`] if the encoded body exceeds `max_size`;
/// [`ProtocolError::EmbeddedNewline`] if the encoded JSON contains a raw
/// `\n` (this should not happen for well-formed `Value`s, since
/// `serde_json` escapes string content, but is checked defensively since
/// it is a wire-integrity invariant, not just a correctness nicety).
pub fn serialize_message(msg: &Message, max_size: usize) -> Result<String, ProtocolError> {
    let body = serde_json::to_string(msg)?;
    if body.contains('\n') {
        return Err(ProtocolError::EmbeddedNewline);
    }
    if body.len() > max_size {
        return Err(ProtocolError::TooLarge { actual: body.len(), limit: max_size });
    }
    let mut line = body;
    line.push('\n');
    Ok(line)
}

impl Message {
    /// Build a request with the given reserved/monotonic id.
    #[must_use]
    pub fn request(id: JsonRpcId, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Some(id),
            method: Some(method.into()),
            params: Some(params),
            result: None,
            error: None,
        }
    }

    /// Build a notification (no id, no reply expected).
    #[must_use]
    pub fn notification(method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: None,
            method: Some(method.into()),
            params: Some(params),
            result: None,
            error: None,
        }
    }

    /// Build a success response to `id`.
    #[must_use]
    pub fn success(id: JsonRpcId, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Some(id),
            method: None,
            params: None,
            result: Some(result),
            error: None,
        }
    }

    /// Build an error response to `id`.
    #[must_use]
    pub fn failure(id: JsonRpcId, error: JsonRpcErrorObject) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Some(id),
            method: None,
            params: None,
            result: None,
            error: Some(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classifies_request_response_notification() {
        let req = Message::request(JsonRpcId::Number(1), "initialize", json!({}));
        assert_eq!(classify(&req).unwrap(), MessageKind::Request);

        let resp = Message::success(JsonRpcId::Number(1), json!({"ok": true}));
        assert_eq!(classify(&resp).unwrap(), MessageKind::Response);

        let notif = Message::notification("session/update", json!({}));
        assert_eq!(classify(&notif).unwrap(), MessageKind::Notification);
    }

    #[test]
    fn classify_rejects_id_with_nothing_else() {
        let weird = Message {
            jsonrpc: "2.0".into(),
            id: Some(JsonRpcId::Number(1)),
            method: None,
            params: None,
            result: None,
            error: None,
        };
        assert!(matches!(classify(&weird), Err(ProtocolError::Unclassifiable)));
    }

    #[test]
    fn parse_rejects_missing_jsonrpc_header() {
        let err = parse_line(r#"{"id":1,"method":"x"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::MissingJsonRpcHeader));
    }

    #[test]
    fn parse_rejects_invalid_json() {
        let err = parse_line("not json").unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidJson(_)));
    }

    #[test]
    fn serialize_round_trips_through_parse() {
        let msg = Message::request(JsonRpcId::Number(2), "session/new", json!({"cwd": "/tmp"}));
        let line = serialize_message(&msg, 1024).unwrap();
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);
        let parsed = parse_line(&line).unwrap();
        assert_eq!(parsed.method.as_deref(), Some("session/new"));
        assert_eq!(parsed.id, Some(JsonRpcId::Number(2)));
    }

    #[test]
    fn serialize_enforces_size_cap() {
        let msg = Message::notification("x", json!({"payload": "a".repeat(100)}));
        let exact = serde_json::to_string(&msg).unwrap().len();
        assert!(serialize_message(&msg, exact).is_ok());
        assert!(matches!(
            serialize_message(&msg, exact - 1),
            Err(ProtocolError::TooLarge { .. })
        ));
    }

    #[test]
    fn error_helpers_use_standard_codes() {
        assert_eq!(JsonRpcErrorObject::parse_error("x").code, -32700);
        assert_eq!(JsonRpcErrorObject::invalid_request("x").code, -32600);
        assert_eq!(JsonRpcErrorObject::method_not_found("foo").code, -32601);
        assert_eq!(JsonRpcErrorObject::invalid_params("x").code, -32602);
    }
}
