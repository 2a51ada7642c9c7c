//! Checkpoint Store
//!
//! Reconciles an incoming STATE value against a previously persisted state
//! file and emits the final checkpoint on stdout at run end. The persisted
//! document must already contain a `bookmarks` object with an entry for the
//! stream being reconciled; only that stream's single configured bookmark
//! cell is ever rewritten, all other streams' bookmarks are left untouched.
//!
//! Read-modify-write with no locking: the state file is single-writer per
//! run by caller contract.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use serde_json::Value;

use crate::error::{Result, TargetError};

/// Copy `state.bookmarks[stream][bookmark_keys[stream]]` into the persisted
/// state file at `state_path`, rewriting the whole file.
pub fn save_state(
    state_path: &Path,
    stream: &str,
    state: &Value,
    bookmark_keys: &HashMap<String, String>,
) -> Result<()> {
    let bookmark_key =
        bookmark_keys
            .get(stream)
            .ok_or_else(|| TargetError::MissingBookmarkKey {
                stream: stream.to_string(),
            })?;

    let text = fs::read_to_string(state_path).map_err(|e| TargetError::StateFile {
        path: state_path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let mut persisted: Value =
        serde_json::from_str(&text).map_err(|e| TargetError::StateFile {
            path: state_path.to_path_buf(),
            reason: format!("not valid JSON: {e}"),
        })?;

    let bookmark_value = state
        .get("bookmarks")
        .and_then(|b| b.get(stream))
        .and_then(|s| s.get(bookmark_key))
        .ok_or_else(|| TargetError::MissingBookmark {
            stream: stream.to_string(),
            key: bookmark_key.clone(),
        })?
        .clone();

    let cell = persisted
        .get_mut("bookmarks")
        .and_then(|b| b.get_mut(stream))
        .and_then(Value::as_object_mut)
        .ok_or_else(|| TargetError::StateFile {
            path: state_path.to_path_buf(),
            reason: format!("missing bookmarks.{stream} object"),
        })?;
    cell.insert(bookmark_key.clone(), bookmark_value);

    fs::write(state_path, serde_json::to_string(&persisted)?)?;
    Ok(())
}

/// Write the final checkpoint as a single JSON line and flush. Writes
/// nothing when no STATE survived the run.
pub fn emit_state<W: Write>(out: &mut W, state: Option<&Value>) -> Result<()> {
    if let Some(state) = state {
        let line = serde_json::to_string(state)?;
        tracing::debug!("Emitting state {}", line);
        writeln!(out, "{line}")?;
        out.flush()?;
    }
    Ok(())
}
