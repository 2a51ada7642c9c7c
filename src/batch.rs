//! Batch Writer
//!
//! Accumulates each stream's validated records in one append-only local file
//! per run. Files live under a scratch directory and are named
//! `<stream><optional -timestamp>.json`; the timestamp is fixed at writer
//! construction so every file of a run shares the same suffix.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde_json::Value;

use crate::error::Result;

/// A completed batch file, handed to the uploader at run end.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchFile {
    pub stream: String,
    pub path: PathBuf,
}

pub struct BatchWriter {
    scratch_dir: PathBuf,
    delimiter: String,
    time_suffix: String,
    /// Files in first-creation order
    files: Vec<BatchFile>,
}

impl BatchWriter {
    pub fn new(
        scratch_dir: impl AsRef<Path>,
        delimiter: impl Into<String>,
        include_time_suffix: bool,
    ) -> Self {
        let time_suffix = if include_time_suffix {
            format!("-{}", Local::now().format("%Y%m%dT%H%M%S"))
        } else {
            String::new()
        };
        Self {
            scratch_dir: scratch_dir.as_ref().to_path_buf(),
            delimiter: delimiter.into(),
            time_suffix,
            files: Vec::new(),
        }
    }

    /// Append one serialized record (plus the configured delimiter) to the
    /// stream's batch file, creating it on first use. The same stream always
    /// resolves to the same path for the life of the writer, however its
    /// appends interleave with other streams'.
    pub fn append(&mut self, stream: &str, record: &Value) -> Result<()> {
        let path = self.resolve(stream)?;
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(serde_json::to_string(record)?.as_bytes())?;
        file.write_all(self.delimiter.as_bytes())?;
        Ok(())
    }

    /// Every batch file created this run, in first-creation order. Consumes
    /// the writer so the handoff happens exactly once; deleting the files is
    /// the caller's job, after each upload succeeds.
    pub fn finalize(self) -> Vec<BatchFile> {
        self.files
    }

    fn resolve(&mut self, stream: &str) -> Result<PathBuf> {
        if let Some(existing) = self.files.iter().find(|f| f.stream == stream) {
            return Ok(existing.path.clone());
        }
        std::fs::create_dir_all(&self.scratch_dir)?;
        let path = self
            .scratch_dir
            .join(format!("{}{}.json", stream, self.time_suffix));
        self.files.push(BatchFile {
            stream: stream.to_string(),
            path: path.clone(),
        });
        Ok(path)
    }
}
