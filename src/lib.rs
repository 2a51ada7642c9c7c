//! Singer target for S3
//!
//! Consumes newline-delimited Singer protocol messages on a line-oriented
//! input, validates records against their declared draft-4 schemas, batches
//! them per stream into local JSON files, uploads each completed batch to an
//! S3 bucket, and emits the final state line so an orchestrator can resume.
//!
//! ## Pipeline
//!
//! ```text
//! input lines
//!   └── Interpreter (persist)
//!         ├── SchemaRegistry   per-stream schema + compiled validator
//!         ├── BatchWriter      one append-only file per stream per run
//!         └── save_state       reconcile bookmarks into the state file
//! end of input
//!   └── Uploader per batch file, then delete local file
//! stdout
//!   └── emit_state (at most one JSON line)
//! ```
//!
//! Processing is strictly sequential and fail-fast: the first error aborts
//! the run without emitting state, leaving local batch files in place for
//! operator recovery.

pub mod batch;
pub mod config;
pub mod error;
pub mod message;
pub mod persist;
pub mod registry;
pub mod sanitize;
pub mod state;
pub mod upload;

pub use batch::{BatchFile, BatchWriter};
pub use config::TargetConfig;
pub use error::{Result, TargetError};
pub use message::Message;
pub use persist::{persist_lines, Interpreter};
pub use registry::SchemaRegistry;
pub use sanitize::sanitize_field_names;
pub use state::{emit_state, save_state};
pub use upload::{S3Uploader, Uploader};
