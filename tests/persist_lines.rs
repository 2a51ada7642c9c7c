//! End-to-end tests for the message interpreter
//!
//! Drives synthetic Singer message sequences through the interpreter with a
//! recording uploader, checking the ordering and failure-safety contract
//! between schema arrival, record validation, and checkpoint emission.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use tempfile::tempdir;

use target_s3_json::{Interpreter, TargetConfig, TargetError, Uploader};

/// Records every upload instead of talking to S3.
#[derive(Default)]
struct RecordingUploader {
    uploads: RefCell<Vec<(PathBuf, String, String)>>,
    /// Uploads with index >= fail_after fail
    fail_after: Option<usize>,
}

impl Uploader for RecordingUploader {
    fn upload(
        &self,
        local_path: &Path,
        bucket: &str,
        key_prefix: &str,
    ) -> target_s3_json::Result<()> {
        let mut uploads = self.uploads.borrow_mut();
        if self.fail_after.is_some_and(|n| uploads.len() >= n) {
            return Err(TargetError::Upload {
                path: local_path.to_path_buf(),
                reason: "injected failure".to_string(),
            });
        }
        uploads.push((
            local_path.to_path_buf(),
            bucket.to_string(),
            key_prefix.to_string(),
        ));
        Ok(())
    }
}

fn base_config() -> TargetConfig {
    let mut config: TargetConfig = serde_json::from_str(r#"{"s3_bucket": "test-bucket"}"#).unwrap();
    config.include_time_suffix = false;
    config
}

fn users_schema_line() -> String {
    json!({
        "type": "SCHEMA",
        "stream": "users",
        "schema": {
            "type": "object",
            "properties": {"id": {"type": "integer"}},
            "required": ["id"]
        },
        "key_properties": ["id"]
    })
    .to_string()
}

fn record_line(stream: &str, record: Value) -> String {
    json!({"type": "RECORD", "stream": stream, "record": record}).to_string()
}

#[test]
fn record_before_schema_is_a_protocol_error() {
    let dir = tempdir().unwrap();
    let config = base_config();
    let mut interp = Interpreter::new(&config, None, dir.path());

    let err = interp
        .handle_line(&record_line("users", json!({"id": 1})))
        .unwrap_err();
    assert!(matches!(err, TargetError::UndeclaredStream { .. }));
}

#[test]
fn later_schema_declaration_replaces_earlier() {
    let dir = tempdir().unwrap();
    let config = base_config();
    let mut interp = Interpreter::new(&config, None, dir.path());

    interp.handle_line(&users_schema_line()).unwrap();
    // Redeclare with a string id
    interp
        .handle_line(
            &json!({
                "type": "SCHEMA",
                "stream": "users",
                "schema": {
                    "type": "object",
                    "properties": {"id": {"type": "string"}},
                    "required": ["id"]
                },
                "key_properties": ["id"]
            })
            .to_string(),
        )
        .unwrap();

    // Valid against the second schema only
    interp
        .handle_line(&record_line("users", json!({"id": "u-1"})))
        .unwrap();
    let err = interp
        .handle_line(&record_line("users", json!({"id": 1})))
        .unwrap_err();
    assert!(matches!(err, TargetError::RecordInvalid { .. }));
}

#[test]
fn invalid_record_is_never_appended() {
    let dir = tempdir().unwrap();
    let config = base_config();
    let mut interp = Interpreter::new(&config, None, dir.path());

    interp.handle_line(&users_schema_line()).unwrap();
    let err = interp
        .handle_line(&record_line("users", json!({"id": "not-an-int"})))
        .unwrap_err();
    assert!(matches!(err, TargetError::RecordInvalid { .. }));

    // Nothing was written for the stream
    assert!(!dir.path().join("users.json").exists());
}

#[test]
fn one_file_per_stream_in_input_order() {
    let dir = tempdir().unwrap();
    let config = base_config();
    let mut interp = Interpreter::new(&config, None, dir.path());

    interp.handle_line(&users_schema_line()).unwrap();
    interp
        .handle_line(
            &json!({
                "type": "SCHEMA",
                "stream": "orders",
                "schema": {"type": "object"},
                "key_properties": ["id"]
            })
            .to_string(),
        )
        .unwrap();

    interp
        .handle_line(&record_line("users", json!({"id": 1})))
        .unwrap();
    interp
        .handle_line(&record_line("orders", json!({"id": 10})))
        .unwrap();
    interp
        .handle_line(&record_line("users", json!({"id": 2})))
        .unwrap();

    let users = fs::read_to_string(dir.path().join("users.json")).unwrap();
    assert_eq!(users, r#"{"id":1}{"id":2}"#);
    let orders = fs::read_to_string(dir.path().join("orders.json")).unwrap();
    assert_eq!(orders, r#"{"id":10}"#);

    // Upload happens in first-creation order
    let uploader = RecordingUploader::default();
    interp.finish(&uploader).unwrap();
    let uploads = uploader.uploads.borrow();
    assert_eq!(uploads.len(), 2);
    assert_eq!(uploads[0].0, dir.path().join("users.json"));
    assert_eq!(uploads[1].0, dir.path().join("orders.json"));
    assert_eq!(uploads[0].1, "test-bucket");
}

#[test]
fn successful_upload_deletes_local_files() {
    let dir = tempdir().unwrap();
    let config = base_config();
    let mut interp = Interpreter::new(&config, None, dir.path());

    interp.handle_line(&users_schema_line()).unwrap();
    interp
        .handle_line(&record_line("users", json!({"id": 1})))
        .unwrap();

    let uploader = RecordingUploader::default();
    interp.finish(&uploader).unwrap();
    assert!(!dir.path().join("users.json").exists());
}

#[test]
fn failed_upload_leaves_remaining_files_on_disk() {
    let dir = tempdir().unwrap();
    let config = base_config();
    let mut interp = Interpreter::new(&config, None, dir.path());

    interp.handle_line(&users_schema_line()).unwrap();
    interp
        .handle_line(
            &json!({
                "type": "SCHEMA",
                "stream": "orders",
                "schema": {"type": "object"},
                "key_properties": ["id"]
            })
            .to_string(),
        )
        .unwrap();
    interp
        .handle_line(&record_line("users", json!({"id": 1})))
        .unwrap();
    interp
        .handle_line(&record_line("orders", json!({"id": 10})))
        .unwrap();

    // First upload succeeds, second fails
    let uploader = RecordingUploader {
        fail_after: Some(1),
        ..Default::default()
    };
    let err = interp.finish(&uploader).unwrap_err();
    assert!(matches!(err, TargetError::Upload { .. }));

    // The uploaded file is gone, the failed one remains for the operator
    assert!(!dir.path().join("users.json").exists());
    assert!(dir.path().join("orders.json").exists());
}

#[test]
fn bq_field_name_hook_rewrites_keys_before_writing() {
    let dir = tempdir().unwrap();
    let mut config = base_config();
    config.bq_field_name_hook = true;
    let mut interp = Interpreter::new(&config, None, dir.path());

    interp
        .handle_line(
            &json!({
                "type": "SCHEMA",
                "stream": "users",
                "schema": {"type": "object"},
                "key_properties": ["id"]
            })
            .to_string(),
        )
        .unwrap();
    interp
        .handle_line(&record_line("users", json!({"id": 1, "a.b": 2})))
        .unwrap();

    // Byte-level check: field order survives the rewrite and the rename
    // lands where a dict rewrite would put it
    let content = fs::read_to_string(dir.path().join("users.json")).unwrap();
    assert_eq!(content, r#"{"id":1,"a_b":2}"#);
}

#[test]
fn trailing_state_without_state_file_becomes_the_checkpoint() {
    let dir = tempdir().unwrap();
    let config = base_config();
    let mut interp = Interpreter::new(&config, None, dir.path());

    let value = json!({"bookmarks": {"users": {"updated_at": "2020-01-01"}}});
    interp
        .handle_line(&json!({"type": "STATE", "value": value}).to_string())
        .unwrap();

    let uploader = RecordingUploader::default();
    let checkpoint = interp.finish(&uploader).unwrap();
    assert_eq!(checkpoint, Some(value));
}

#[test]
fn record_clears_the_running_checkpoint() {
    let dir = tempdir().unwrap();
    let config = base_config();
    let mut interp = Interpreter::new(&config, None, dir.path());

    interp.handle_line(&users_schema_line()).unwrap();
    interp
        .handle_line(
            &json!({"type": "STATE", "value": {"bookmarks": {}}}).to_string(),
        )
        .unwrap();
    interp
        .handle_line(&record_line("users", json!({"id": 1})))
        .unwrap();

    let uploader = RecordingUploader::default();
    let checkpoint = interp.finish(&uploader).unwrap();
    assert_eq!(checkpoint, None);
}

#[test]
fn state_reconciles_against_the_active_stream() {
    let scratch = tempdir().unwrap();
    let state_dir = tempdir().unwrap();
    let state_path = state_dir.path().join("state.json");
    fs::write(
        &state_path,
        r#"{"bookmarks":{"users":{"updated_at":"2019-12-31"},"orders":{"id":5}}}"#,
    )
    .unwrap();

    let mut config = base_config();
    config.bookmark_keys = HashMap::from([
        ("users".to_string(), "updated_at".to_string()),
        ("orders".to_string(), "id".to_string()),
    ]);
    let mut interp = Interpreter::new(&config, Some(state_path.as_path()), scratch.path());

    // SCHEMA for orders makes it the active stream; the STATE carries
    // bookmarks for both streams but only orders' cell is reconciled.
    interp
        .handle_line(
            &json!({
                "type": "SCHEMA",
                "stream": "orders",
                "schema": {"type": "object"},
                "key_properties": ["id"]
            })
            .to_string(),
        )
        .unwrap();
    interp
        .handle_line(
            &json!({
                "type": "STATE",
                "value": {"bookmarks": {
                    "users": {"updated_at": "2020-06-01"},
                    "orders": {"id": 9}
                }}
            })
            .to_string(),
        )
        .unwrap();

    let persisted: Value =
        serde_json::from_str(&fs::read_to_string(&state_path).unwrap()).unwrap();
    assert_eq!(persisted["bookmarks"]["orders"]["id"], 9);
    // users' bookmark is untouched even though the state carried a newer one
    assert_eq!(persisted["bookmarks"]["users"]["updated_at"], "2019-12-31");
}

#[test]
fn state_before_any_schema_is_not_persisted() {
    let scratch = tempdir().unwrap();
    let state_dir = tempdir().unwrap();
    let state_path = state_dir.path().join("state.json");
    fs::write(&state_path, r#"{"bookmarks":{"users":{"updated_at":"x"}}}"#).unwrap();

    let config = base_config();
    let mut interp = Interpreter::new(&config, Some(state_path.as_path()), scratch.path());

    // No active stream yet, so the file is left alone
    interp
        .handle_line(
            &json!({
                "type": "STATE",
                "value": {"bookmarks": {"users": {"updated_at": "y"}}}
            })
            .to_string(),
        )
        .unwrap();

    let persisted: Value =
        serde_json::from_str(&fs::read_to_string(&state_path).unwrap()).unwrap();
    assert_eq!(persisted["bookmarks"]["users"]["updated_at"], "x");
}

#[test]
fn activate_version_changes_nothing() {
    let dir = tempdir().unwrap();
    let config = base_config();
    let mut interp = Interpreter::new(&config, None, dir.path());

    interp.handle_line(&users_schema_line()).unwrap();
    interp
        .handle_line(&json!({"type": "ACTIVATE_VERSION", "stream": "users"}).to_string())
        .unwrap();
    interp
        .handle_line(&record_line("users", json!({"id": 1})))
        .unwrap();

    let uploader = RecordingUploader::default();
    interp.finish(&uploader).unwrap();
    assert_eq!(uploader.uploads.borrow().len(), 1);
}

#[test]
fn unknown_message_type_aborts() {
    let dir = tempdir().unwrap();
    let config = base_config();
    let mut interp = Interpreter::new(&config, None, dir.path());

    let err = interp
        .handle_line(r#"{"type": "FLUSH", "stream": "users"}"#)
        .unwrap_err();
    assert!(matches!(err, TargetError::UnknownMessageType { .. }));

    let err = interp.handle_line("{not json").unwrap_err();
    assert!(matches!(err, TargetError::MalformedLine { .. }));
}
