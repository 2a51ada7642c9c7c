//! Run configuration
//!
//! Loaded from the JSON file given by `-c/--config`; when no file is given
//! every option takes its default. Validation collects every problem before
//! the run starts so the operator sees the full list at once.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Configuration for one run, immutable once loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// String appended after each serialized record in a batch file
    #[serde(default)]
    pub delimiter: String,

    /// Append a run-start timestamp to each batch filename
    #[serde(default = "default_true")]
    pub include_time_suffix: bool,

    /// Rewrite record field names for BigQuery before writing
    #[serde(default)]
    pub bq_field_name_hook: bool,

    /// Stream name -> bookmark field tracked in the state file
    #[serde(default)]
    pub bookmark_keys: HashMap<String, String>,

    /// Target bucket for uploaded batch files
    #[serde(default)]
    pub s3_bucket: Option<String>,

    /// Object key prefix for uploaded batch files
    #[serde(default)]
    pub s3_key_prefix: String,

    /// Optional static credentials; the default AWS chain applies otherwise
    #[serde(default)]
    pub aws_access_key_id: Option<String>,
    #[serde(default)]
    pub aws_secret_access_key: Option<String>,

    /// Optional S3-compatible endpoint (path-style addressing)
    #[serde(default)]
    pub aws_endpoint_url: Option<String>,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            delimiter: String::new(),
            include_time_suffix: true,
            bq_field_name_hook: false,
            bookmark_keys: HashMap::new(),
            s3_bucket: None,
            s3_key_prefix: String::new(),
            aws_access_key_id: None,
            aws_secret_access_key: None,
            aws_endpoint_url: None,
        }
    }
}

impl TargetConfig {
    /// Load from the config file, or all defaults when no file was given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let content = fs::read_to_string(path)?;
                Ok(serde_json::from_str(&content)?)
            }
            None => Ok(Self::default()),
        }
    }

    /// Collect every configuration problem. An empty list means the run may
    /// proceed; a non-empty one terminates before anything is read.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.s3_bucket.as_deref().unwrap_or("").is_empty() {
            problems.push("Required key 's3_bucket' is missing or empty".to_string());
        }
        if self.aws_access_key_id.is_some() != self.aws_secret_access_key.is_some() {
            problems.push(
                "'aws_access_key_id' and 'aws_secret_access_key' must be set together".to_string(),
            );
        }
        problems
    }
}

fn default_true() -> bool {
    true
}
