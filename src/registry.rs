//! Schema Registry
//!
//! Tracks, per stream, the most recently declared schema together with its
//! compiled validator and key properties. Purely in-memory; lives for one run.

use std::collections::HashMap;

use jsonschema::{Draft, JSONSchema};
use serde_json::Value;

use crate::error::{Result, TargetError};

/// The current declaration for one stream.
pub struct StreamSchema {
    /// The schema document as declared on the wire
    pub schema: Value,
    /// Validator compiled once per declaration
    pub validator: JSONSchema,
    /// Key properties declared alongside the schema
    pub key_properties: Vec<String>,
}

/// Per-stream schema map. A later SCHEMA message for the same stream fully
/// replaces the earlier declaration; nothing is merged.
#[derive(Default)]
pub struct SchemaRegistry {
    streams: HashMap<String, StreamSchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare (or redeclare) a stream's schema. Singer schemas are draft 4,
    /// so compilation is pinned to that draft.
    pub fn declare(
        &mut self,
        stream: &str,
        schema: Value,
        key_properties: Vec<String>,
    ) -> Result<()> {
        let validator = match JSONSchema::options()
            .with_draft(Draft::Draft4)
            .compile(&schema)
        {
            Ok(validator) => validator,
            Err(e) => {
                return Err(TargetError::InvalidSchema {
                    stream: stream.to_string(),
                    reason: e.to_string(),
                })
            }
        };

        self.streams.insert(
            stream.to_string(),
            StreamSchema {
                schema,
                validator,
                key_properties,
            },
        );
        Ok(())
    }

    /// Get the validator for a stream, failing if no SCHEMA was seen for it.
    pub fn validator(&self, stream: &str) -> Result<&JSONSchema> {
        self.streams
            .get(stream)
            .map(|s| &s.validator)
            .ok_or_else(|| TargetError::UndeclaredStream {
                stream: stream.to_string(),
            })
    }
}
