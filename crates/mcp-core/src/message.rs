//! The four-shape JSON-RPC 2.0 message envelope (§3 of the design spec).

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

use crate::id::Id;

/// The JSON-RPC version string carried on every message.
pub const JSONRPC_VERSION: &str = "2.0";

/// A JSON-RPC error object, carried in a [`Message::ResponseError`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    /// Numeric error code (see `ErrorCode` in `mcp-core::error`).
    pub code: i32,
    /// Short, human-readable error message.
    pub message: String,
    /// Optional structured error payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    /// Builds an error object from a numeric code and message.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Attaches structured data to the error.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

/// One JSON-RPC 2.0 message, in any of its four wire shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// `{jsonrpc, id, method, params?}`
    Request {
        id: Id,
        method: String,
        params: Option<Value>,
    },
    /// `{jsonrpc, id, result}`
    Response { id: Id, result: Value },
    /// `{jsonrpc, id, error}`
    ResponseError { id: Id, error: RpcError },
    /// `{jsonrpc, method, params?}` (no id — no reply expected)
    Notification {
        method: String,
        params: Option<Value>,
    },
}

impl Message {
    /// Builds a request message.
    pub fn request(id: Id, method: impl Into<String>, params: Option<Value>) -> Self {
        Self::Request {
            id,
            method: method.into(),
            params,
        }
    }

    /// Builds a notification message.
    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Self::Notification {
            method: method.into(),
            params,
        }
    }

    /// Builds a successful response message.
    pub fn success(id: Id, result: Value) -> Self {
        Self::Response { id, result }
    }

    /// Builds an error response message.
    pub fn error(id: Id, error: RpcError) -> Self {
        Self::ResponseError { id, error }
    }

    /// The message's id, if it carries one (requests and responses do,
    /// notifications do not).
    pub fn id(&self) -> Option<&Id> {
        match self {
            Self::Request { id, .. } | Self::Response { id, .. } | Self::ResponseError { id, .. } => {
                Some(id)
            }
            Self::Notification { .. } => None,
        }
    }

    /// The message's method name, if it is a request or notification.
    pub fn method(&self) -> Option<&str> {
        match self {
            Self::Request { method, .. } | Self::Notification { method, .. } => Some(method),
            Self::Response { .. } | Self::ResponseError { .. } => None,
        }
    }

    /// `true` if this message is a reply (success or error response).
    pub fn is_reply(&self) -> bool {
        matches!(self, Self::Response { .. } | Self::ResponseError { .. })
    }
}

impl Serialize for Message {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Request { id, method, params } => {
                let mut s = serializer.serialize_struct("Message", 4)?;
                s.serialize_field("jsonrpc", JSONRPC_VERSION)?;
                s.serialize_field("id", id)?;
                s.serialize_field("method", method)?;
                if let Some(params) = params {
                    s.serialize_field("params", params)?;
                }
                s.end()
            }
            Self::Response { id, result } => {
                let mut s = serializer.serialize_struct("Message", 3)?;
                s.serialize_field("jsonrpc", JSONRPC_VERSION)?;
                s.serialize_field("id", id)?;
                s.serialize_field("result", result)?;
                s.end()
            }
            Self::ResponseError { id, error } => {
                let mut s = serializer.serialize_struct("Message", 3)?;
                s.serialize_field("jsonrpc", JSONRPC_VERSION)?;
                s.serialize_field("id", id)?;
                s.serialize_field("error", error)?;
                s.end()
            }
            Self::Notification { method, params } => {
                let mut s = serializer.serialize_struct("Message", 3)?;
                s.serialize_field("jsonrpc", JSONRPC_VERSION)?;
                s.serialize_field("method", method)?;
                if let Some(params) = params {
                    s.serialize_field("params", params)?;
                }
                s.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Message {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct MessageVisitor;

        impl<'de> Visitor<'de> for MessageVisitor {
            type Value = Message;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a JSON-RPC 2.0 request, response, or notification object")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Message, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut id: Option<Id> = None;
                let mut method: Option<String> = None;
                let mut params: Option<Value> = None;
                let mut result: Option<Value> = None;
                let mut error: Option<RpcError> = None;
                let mut saw_jsonrpc = false;

                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "jsonrpc" => {
                            let v: String = map.next_value()?;
                            if v != JSONRPC_VERSION {
                                return Err(de::Error::custom(format!(
                                    "unsupported jsonrpc version: {v}"
                                )));
                            }
                            saw_jsonrpc = true;
                        }
                        "id" => id = Some(map.next_value()?),
                        "method" => method = Some(map.next_value()?),
                        "params" => params = Some(map.next_value()?),
                        "result" => result = Some(map.next_value()?),
                        "error" => error = Some(map.next_value()?),
                        _ => {
                            let _: de::IgnoredAny = map.next_value()?;
                        }
                    }
                }

                if !saw_jsonrpc {
                    return Err(de::Error::missing_field("jsonrpc"));
                }

                match (id, method, result, error) {
                    (Some(id), Some(method), None, None) => Ok(Message::Request { id, method, params }),
                    (None, Some(method), None, None) => Ok(Message::Notification { method, params }),
                    (Some(id), None, Some(result), None) => Ok(Message::Response { id, result }),
                    (Some(id), None, None, Some(error)) => Ok(Message::ResponseError { id, error }),
                    _ => Err(de::Error::custom(
                        "message must be exactly one of: request, response, error response, notification",
                    )),
                }
            }
        }

        deserializer.deserialize_map(MessageVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trips_request() {
        let msg = Message::request(Id::Number(1), "ping", None);
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(msg, back);
    }

    #[test]
    fn round_trips_notification() {
        let msg = Message::notification("notifications/initialized", None);
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(msg, back);
    }

    #[test]
    fn round_trips_success_response() {
        let msg = Message::success(Id::Number(7), json!({"ok": true}));
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(msg, back);
    }

    #[test]
    fn round_trips_error_response() {
        let msg = Message::error(Id::Number(7), RpcError::new(-32601, "Method not found"));
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(msg, back);
    }

    #[test]
    fn rejects_wrong_jsonrpc_version() {
        let raw = r#"{"jsonrpc":"1.0","id":1,"method":"ping"}"#;
        assert!(serde_json::from_str::<Message>(raw).is_err());
    }

    #[test]
    fn rejects_ambiguous_shape() {
        // Both result and error present is invalid.
        let raw = r#"{"jsonrpc":"2.0","id":1,"result":{},"error":{"code":-1,"message":"x"}}"#;
        assert!(serde_json::from_str::<Message>(raw).is_err());
    }

    #[test]
    fn accepts_string_id_inbound() {
        let raw = r#"{"jsonrpc":"2.0","id":"abc","method":"ping"}"#;
        let msg: Message = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.id(), Some(&Id::String("abc".to_string())));
    }
}
