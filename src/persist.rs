//! Message Interpreter
//!
//! The run-loop state machine: parses each input line, dispatches to the
//! schema registry, batch writer, and checkpoint store, and tracks the final
//! checkpoint to emit. Processing is strictly sequential; the first error of
//! any kind aborts the run.
//!
//! Checkpoint persistence is keyed off the *active stream* — the stream of
//! the most recent SCHEMA message — because Singer STATE messages carry no
//! stream field. With taps that interleave streams the bookmark written may
//! belong to a different stream than the state does; this is an accepted
//! protocol assumption (single-stream-at-a-time taps) and is kept as is.

use std::io::BufRead;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::batch::BatchWriter;
use crate::config::TargetConfig;
use crate::error::{Result, TargetError};
use crate::message::Message;
use crate::registry::SchemaRegistry;
use crate::sanitize::sanitize_field_names;
use crate::state::save_state;
use crate::upload::Uploader;

/// All mutable run state, threaded through each message-handling call.
pub struct Interpreter<'a> {
    config: &'a TargetConfig,
    state_path: Option<&'a Path>,
    registry: SchemaRegistry,
    batches: BatchWriter,
    /// The most recently schema-declared stream; never reset by RECORD or STATE
    active_stream: Option<String>,
    /// The running checkpoint; cleared by every RECORD
    checkpoint: Option<Value>,
}

impl<'a> Interpreter<'a> {
    pub fn new(
        config: &'a TargetConfig,
        state_path: Option<&'a Path>,
        scratch_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            config,
            state_path,
            registry: SchemaRegistry::new(),
            batches: BatchWriter::new(
                scratch_dir.into(),
                config.delimiter.clone(),
                config.include_time_suffix,
            ),
            active_stream: None,
            checkpoint: None,
        }
    }

    /// Process one input line to completion.
    pub fn handle_line(&mut self, line: &str) -> Result<()> {
        match Message::parse(line)? {
            Message::Schema {
                stream,
                schema,
                key_properties,
            } => {
                self.registry.declare(&stream, schema, key_properties)?;
                self.active_stream = Some(stream);
            }
            Message::Record { stream, record } => {
                let validator = self.registry.validator(&stream)?;
                if let Err(errors) = validator.validate(&record) {
                    let reason = errors
                        .map(|e| e.to_string())
                        .collect::<Vec<_>>()
                        .join("; ");
                    return Err(TargetError::RecordInvalid { stream, reason });
                }

                let mut record = record;
                if self.config.bq_field_name_hook {
                    sanitize_field_names(&mut record);
                }
                self.batches.append(&stream, &record)?;

                // A record invalidates the running checkpoint until the next STATE
                self.checkpoint = None;
            }
            Message::State { value } => {
                tracing::debug!("Setting state to {}", value);
                if let (Some(state_path), Some(stream)) = (self.state_path, &self.active_stream) {
                    save_state(state_path, stream, &value, &self.config.bookmark_keys)?;
                }
                self.checkpoint = Some(value);
            }
            Message::ActivateVersion => {
                tracing::debug!("ACTIVATE_VERSION message");
            }
        }
        Ok(())
    }

    /// End-of-input: hand every batch file to the uploader in creation order,
    /// deleting each local file only after its upload succeeds. A failed
    /// upload aborts immediately, leaving the failed file and all later ones
    /// on disk. Returns the checkpoint to emit.
    pub fn finish(self, uploader: &dyn Uploader) -> Result<Option<Value>> {
        let bucket = self.config.s3_bucket.clone().unwrap_or_default();
        for file in self.batches.finalize() {
            uploader.upload(&file.path, &bucket, &self.config.s3_key_prefix)?;
            std::fs::remove_file(&file.path)?;
            tracing::debug!("Uploaded and removed {}", file.path.display());
        }
        Ok(self.checkpoint)
    }
}

/// Drive an interpreter over a line-oriented input, batching under the
/// system temp directory. This is the entry point the binary uses.
pub fn persist_lines<R: BufRead>(
    input: R,
    config: &TargetConfig,
    state_path: Option<&Path>,
    uploader: &dyn Uploader,
) -> Result<Option<Value>> {
    let mut interpreter = Interpreter::new(config, state_path, std::env::temp_dir());
    for line in input.lines() {
        let line = line?;
        if let Err(e) = interpreter.handle_line(&line) {
            tracing::error!("Failed to process line: {}", e);
            return Err(e);
        }
    }
    interpreter.finish(uploader)
}
