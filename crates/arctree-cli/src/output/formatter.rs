//! Output formatter trait for CLI results.

use anyhow::Result;
use arctree_core::ContentTree;
use serde::Serialize;
use std::path::PathBuf;

/// Common output formatter trait
pub trait OutputFormatter {
    /// Format the flat entry listing of an archive
    fn format_listing(&self, tree: &ContentTree, long: bool, human_readable: bool) -> Result<()>;

    /// Format the hierarchical content tree
    fn format_tree(&self, tree: &ContentTree, sizes: bool) -> Result<()>;

    /// Format extraction result
    fn format_extraction_result(&self, summary: &ExtractionSummary) -> Result<()>;

    /// Format error message
    fn format_error(&self, error: &anyhow::Error);

    /// Format warning message
    fn format_warning(&self, message: &str);
}

/// One entry written to the output directory.
#[derive(Debug, Serialize)]
pub struct ExtractedEntry {
    pub index: usize,
    pub path: String,
    pub destination: PathBuf,
    pub size: u64,
}

/// One entry that could not be extracted or written.
#[derive(Debug, Serialize)]
pub struct FailedEntry {
    pub index: usize,
    pub path: String,
    pub category: String,
    pub message: String,
}

/// Outcome of the `extract` command.
#[derive(Debug, Default, Serialize)]
pub struct ExtractionSummary {
    pub archive: String,
    pub output_dir: PathBuf,
    pub requested: usize,
    pub extracted: Vec<ExtractedEntry>,
    pub failed: Vec<FailedEntry>,
    pub skipped: Vec<String>,
    pub cancelled: bool,
    pub bytes_written: u64,
    pub duration_ms: u128,
}

/// Generic JSON output structure
#[derive(Debug, Serialize)]
pub struct JsonOutput<T> {
    pub operation: String,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Partial,
    Error,
}

impl<T: Serialize> JsonOutput<T> {
    pub fn success(operation: impl Into<String>, data: T) -> Self {
        Self {
            operation: operation.into(),
            status: Status::Success,
            data: Some(data),
            error: None,
        }
    }

    pub fn partial(operation: impl Into<String>, data: T) -> Self {
        Self {
            status: Status::Partial,
            ..Self::success(operation, data)
        }
    }

    pub fn error(operation: impl Into<String>, error: impl Into<String>) -> JsonOutput<()> {
        JsonOutput {
            operation: operation.into(),
            status: Status::Error,
            data: None,
            error: Some(error.into()),
        }
    }
}
