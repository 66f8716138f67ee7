//! WSP wire codec
//!
//! Messages travel as JSON arrays of two or three elements:
//! `["keyword", content]` or `["keyword", content, {options}]`.
//! Only the arity and the keyword are checked here; content shapes are
//! validated by whoever consumes them.

pub mod message;

pub use message::{
    ByeReason, CallParty, Candidate, Invitation, Keyword, Message, SessionDescription,
    HANDOVER_CODE, NORMAL_HANGUP_CODE,
};

use serde_json::{Map, Value};

use crate::errors::{Result, SessionError};

/// Encode a message to its wire form.
///
/// Absent options produce the two-element form.
pub fn encode(keyword: Keyword, content: Value, options: Option<Map<String, Value>>) -> String {
    let mut items = vec![Value::String(keyword.as_str().to_string()), content];
    if let Some(options) = options {
        items.push(Value::Object(options));
    }
    Value::Array(items).to_string()
}

/// Decode a wire form into a [`Message`]
pub fn decode(wire: &[u8]) -> Result<Message> {
    let value: Value = serde_json::from_slice(wire)
        .map_err(|e| SessionError::malformed(format!("not valid JSON: {}", e)))?;

    let mut items = match value {
        Value::Array(items) => items,
        other => {
            return Err(SessionError::malformed(format!(
                "expected an array, got {}",
                json_kind(&other)
            )))
        }
    };

    if items.len() != 2 && items.len() != 3 {
        return Err(SessionError::malformed(format!(
            "expected 2 or 3 elements, got {}",
            items.len()
        )));
    }

    let options = match items.len() {
        3 => match items.pop() {
            Some(Value::Object(map)) => Some(map),
            None => None,
            Some(other) => {
                return Err(SessionError::malformed(format!(
                    "options must be an object, got {}",
                    json_kind(&other)
                )))
            }
        },
        _ => None,
    };

    let content = items.pop().unwrap_or(Value::Null);
    let keyword = match items.pop() {
        Some(Value::String(word)) => Keyword::parse(&word)
            .ok_or_else(|| SessionError::malformed(format!("unrecognized keyword '{}'", word)))?,
        Some(other) => {
            return Err(SessionError::malformed(format!(
                "keyword must be a string, got {}",
                json_kind(&other)
            )))
        }
        None => return Err(SessionError::malformed("missing keyword")),
    };

    Ok(Message {
        keyword,
        content,
        options,
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
