//! Request decoding and classification.
//!
//! A request is a UTF-8 JSON object. Field presence selects the mode:
//! `index` wins over `offset`, `action` is mutually exclusive with both.
//! Offsets and indexes are accepted as integers or numeric strings —
//! legacy controllers send strings.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{GatewayError, Result};

/// A decoded controller request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Offset-paged read of the snapshot's serialized bytes.
    Offset { offset: usize },
    /// Index-paged read of one ranked item; `refresh` forces a fresh
    /// snapshot before answering.
    Index { index: usize, refresh: bool },
    /// Mutating action dispatch.
    Action { action: ActionRequest },
}

/// Actions accepted by the network-change endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionRequest {
    Connect { ssid: String, password: String },
    Disconnect,
    Rescan,
}

/// Credential submission payload (credentials endpoint only).
///
/// The `username` field carries the ssid; the name is part of the wire
/// contract with existing controllers.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let text = utf8(payload)?;
        serde_json::from_str(text)
            .map_err(|e| GatewayError::ParseFailure(format!("invalid credentials: {e}")))
    }
}

impl Request {
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let text = utf8(payload)?;
        let value: Value = serde_json::from_str(text)
            .map_err(|e| GatewayError::ParseFailure(e.to_string()))?;
        let object = value
            .as_object()
            .ok_or_else(|| GatewayError::ParseFailure("request must be a JSON object".to_string()))?;

        let has_action = object.contains_key("action");
        let has_index = object.contains_key("index");
        let has_offset = object.contains_key("offset");

        if has_action && (has_index || has_offset) {
            return Err(GatewayError::InvalidParameter(
                "action is mutually exclusive with pagination fields".to_string(),
            ));
        }

        if has_action {
            return Ok(Request::Action {
                action: decode_action(object)?,
            });
        }

        if has_index {
            let index = coerce_unsigned(&object["index"], "index")?;
            let refresh = object
                .get("refresh")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            return Ok(Request::Index { index, refresh });
        }

        if has_offset {
            let offset = coerce_unsigned(&object["offset"], "offset")?;
            return Ok(Request::Offset { offset });
        }

        Err(GatewayError::InvalidParameter(
            "request carries neither offset, index nor action".to_string(),
        ))
    }
}

fn utf8(payload: &[u8]) -> Result<&str> {
    std::str::from_utf8(payload)
        .map_err(|_| GatewayError::ParseFailure("request is not valid UTF-8".to_string()))
}

fn decode_action(object: &serde_json::Map<String, Value>) -> Result<ActionRequest> {
    let action = object["action"]
        .as_str()
        .ok_or_else(|| GatewayError::InvalidParameter("action must be a string".to_string()))?;

    match action {
        "connect" => {
            let ssid = required_string(object, "ssid")?;
            let password = required_string(object, "password")?;
            Ok(ActionRequest::Connect { ssid, password })
        }
        "disconnect" => Ok(ActionRequest::Disconnect),
        "rescan" => Ok(ActionRequest::Rescan),
        other => Err(GatewayError::InvalidParameter(format!(
            "unknown action: {other}"
        ))),
    }
}

fn required_string(object: &serde_json::Map<String, Value>, field: &str) -> Result<String> {
    object
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| GatewayError::InvalidParameter(format!("missing string field: {field}")))
}

/// Accept a non-negative integer given as a JSON number or numeric string.
fn coerce_unsigned(value: &Value, field: &str) -> Result<usize> {
    let invalid =
        || GatewayError::InvalidParameter(format!("{field} must be a non-negative integer"));

    match value {
        Value::Number(n) => n.as_u64().map(|v| v as usize).ok_or_else(invalid),
        Value::String(s) => s.trim().parse().map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}
