//! Singer protocol messages
//!
//! One message per input line, newline-delimited JSON. Four kinds are
//! recognized; anything else is a hard protocol error, and a malformed line
//! aborts the run rather than being skipped.

use serde_json::{Map, Value};

use crate::error::{Result, TargetError};

/// A parsed protocol line.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Schema {
        stream: String,
        schema: Value,
        key_properties: Vec<String>,
    },
    Record {
        stream: String,
        record: Value,
    },
    State {
        value: Value,
    },
    ActivateVersion,
}

impl Message {
    /// Parse one input line. Fields are pulled out one at a time so each
    /// missing key reports its own name together with the offending line.
    pub fn parse(line: &str) -> Result<Message> {
        let mut obj = match serde_json::from_str::<Value>(line) {
            Ok(Value::Object(obj)) => obj,
            _ => {
                return Err(TargetError::MalformedLine {
                    line: line.to_string(),
                })
            }
        };

        let message_type = match obj.get("type") {
            Some(Value::String(t)) => t.clone(),
            Some(other) => {
                return Err(TargetError::UnknownMessageType {
                    message_type: other.to_string(),
                    line: line.to_string(),
                })
            }
            None => {
                return Err(TargetError::MissingKey {
                    key: "type",
                    line: line.to_string(),
                })
            }
        };

        match message_type.as_str() {
            "SCHEMA" => {
                let stream = take_string(&mut obj, "stream", line)?;
                let schema = take(&mut obj, "schema", line)?;
                let key_properties = take_key_properties(&mut obj)?;
                Ok(Message::Schema {
                    stream,
                    schema,
                    key_properties,
                })
            }
            "RECORD" => {
                let stream = take_string(&mut obj, "stream", line)?;
                let record = take(&mut obj, "record", line)?;
                Ok(Message::Record { stream, record })
            }
            "STATE" => {
                let value = take(&mut obj, "value", line)?;
                Ok(Message::State { value })
            }
            "ACTIVATE_VERSION" => Ok(Message::ActivateVersion),
            _ => Err(TargetError::UnknownMessageType {
                message_type,
                line: line.to_string(),
            }),
        }
    }
}

fn take(obj: &mut Map<String, Value>, key: &'static str, line: &str) -> Result<Value> {
    obj.remove(key).ok_or_else(|| TargetError::MissingKey {
        key,
        line: line.to_string(),
    })
}

fn take_string(obj: &mut Map<String, Value>, key: &'static str, line: &str) -> Result<String> {
    match take(obj, key, line)? {
        Value::String(s) => Ok(s),
        _ => Err(TargetError::InvalidKeyType {
            key,
            line: line.to_string(),
        }),
    }
}

/// `key_properties` must be present and an array of field names; a SCHEMA
/// without it is a configuration problem on the tap side.
fn take_key_properties(obj: &mut Map<String, Value>) -> Result<Vec<String>> {
    let value = obj
        .remove("key_properties")
        .ok_or(TargetError::KeyPropertiesRequired)?;
    let items = value.as_array().ok_or(TargetError::KeyPropertiesRequired)?;
    items
        .iter()
        .map(|v| {
            v.as_str()
                .map(String::from)
                .ok_or(TargetError::KeyPropertiesRequired)
        })
        .collect()
}
