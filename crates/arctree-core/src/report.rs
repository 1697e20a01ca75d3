//! Extraction results, failure reporting and progress callbacks.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Duration;

use tempfile::TempPath;

use crate::ArchiveError;
use crate::tree::TreeNode;
use crate::types::EntryIndex;
use crate::types::InnerPath;

/// How a batch extraction ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnpackStatus {
    /// Every requested entry was either extracted or reported as failed.
    #[default]
    Complete,
    /// Cancellation was requested; entries not reached are neither in the
    /// files map nor in the failure list.
    Cancelled,
}

/// Category of a per-entry failure, passed to [`FailReporter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureCategory {
    /// Entry data could not be read or did not match its declared size.
    EntryData,
    /// The temporary output file could not be created or written.
    TempFile,
    /// The entry is individually password protected.
    Encrypted,
    /// The entry exceeds the configured size limit.
    Quota,
    /// The decode pass never produced the entry.
    Missing,
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::EntryData => "entry data",
            Self::TempFile => "temp file",
            Self::Encrypted => "encrypted",
            Self::Quota => "quota",
            Self::Missing => "missing",
        };
        f.write_str(name)
    }
}

/// One entry that could not be extracted.
#[derive(Debug)]
pub struct EntryFailure {
    /// Index of the failed entry.
    pub index: EntryIndex,
    /// Inner path of the failed entry.
    pub path: InnerPath,
    /// Failure category.
    pub category: FailureCategory,
    /// What went wrong.
    pub error: ArchiveError,
}

/// Result of one batch extraction.
///
/// Owns the temporary files of every successfully extracted entry. Dropping
/// the result (or an individual [`TempPath`]) deletes the file; call
/// [`TempPath::keep`] or [`TempPath::persist`] to retain it.
#[derive(Debug, Default)]
pub struct UnpackResult {
    /// Successfully extracted entries.
    pub files: BTreeMap<EntryIndex, TempPath>,

    /// Entries that failed, in the order they failed.
    pub failures: Vec<EntryFailure>,

    /// Whether the batch ran to completion.
    pub status: UnpackStatus,

    /// Total bytes written to temporary files.
    pub bytes_written: u64,

    /// Duration of the decode pass.
    pub duration: Duration,
}

impl UnpackResult {
    /// Creates an empty, complete result.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of extracted files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns `true` if nothing was extracted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Temporary file holding the data of `index`.
    #[must_use]
    pub fn get(&self, index: EntryIndex) -> Option<&Path> {
        self.files.get(&index).map(AsRef::as_ref)
    }

    /// Removes and returns the temporary file of `index`, transferring its
    /// ownership to the caller.
    pub fn take(&mut self, index: EntryIndex) -> Option<TempPath> {
        self.files.remove(&index)
    }

    /// Returns `true` if at least one entry failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Returns `true` if the batch was cut short by cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.status == UnpackStatus::Cancelled
    }
}

/// Sink for per-entry failures.
///
/// Called exactly once per failed entry. Implementations must not fail.
pub trait FailReporter {
    /// Records that `node` could not be extracted.
    fn report(&self, category: FailureCategory, node: &TreeNode, error: &ArchiveError);
}

/// Reports failures through the `log` facade: warn for failures the batch
/// can step over, error otherwise.
#[derive(Debug, Default, Clone)]
pub struct LogReporter {
    archive: String,
}

impl LogReporter {
    /// Creates a reporter that prefixes messages with the archive's display
    /// path.
    #[must_use]
    pub fn new(archive: impl Into<String>) -> Self {
        Self {
            archive: archive.into(),
        }
    }
}

const fn log_level(error: &ArchiveError) -> log::Level {
    if error.is_recoverable() {
        log::Level::Warn
    } else {
        log::Level::Error
    }
}

impl FailReporter for LogReporter {
    fn report(&self, category: FailureCategory, node: &TreeNode, error: &ArchiveError) {
        let level = log_level(error);
        if self.archive.is_empty() {
            log::log!(level, "{category} failure for {}: {error}", node.path());
        } else {
            log::log!(
                level,
                "{category} failure for {}/{}: {error}",
                self.archive,
                node.path()
            );
        }
    }
}

/// Ignores failures. They are still recorded in [`UnpackResult::failures`].
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl FailReporter for NoopReporter {
    fn report(&self, _category: FailureCategory, _node: &TreeNode, _error: &ArchiveError) {}
}

/// A failure captured by [`CollectingReporter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportedFailure {
    /// Failure category.
    pub category: FailureCategory,
    /// Inner path of the failed entry.
    pub path: String,
    /// Rendered error message.
    pub message: String,
}

/// Keeps failure reports in memory.
///
/// Clones share the same storage, so a clone can be handed to a session and
/// inspected afterwards.
///
/// # Examples
///
/// ```
/// use arctree_core::CollectingReporter;
///
/// let reporter = CollectingReporter::new();
/// let handle = reporter.clone();
/// assert!(handle.records().is_empty());
/// ```
#[derive(Debug, Default, Clone)]
pub struct CollectingReporter {
    records: Arc<Mutex<Vec<ReportedFailure>>>,
}

impl CollectingReporter {
    /// Creates an empty reporter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every failure reported so far.
    #[must_use]
    pub fn records(&self) -> Vec<ReportedFailure> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of failures reported so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if nothing was reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FailReporter for CollectingReporter {
    fn report(&self, category: FailureCategory, node: &TreeNode, error: &ArchiveError) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ReportedFailure {
                category,
                path: node.path().to_string(),
                message: error.to_string(),
            });
    }
}

/// Callback trait for progress reporting during batch extraction.
///
/// The trait requires `Send` to allow use in multi-threaded contexts.
///
/// # Examples
///
/// ```
/// use arctree_core::ProgressCallback;
/// use std::path::Path;
///
/// struct SimpleProgress;
///
/// impl ProgressCallback for SimpleProgress {
///     fn on_entry_start(&mut self, path: &Path, total: usize, current: usize) {
///         println!("Extracting {}/{}: {}", current, total, path.display());
///     }
///
///     fn on_bytes_written(&mut self, bytes: u64) {}
///
///     fn on_entry_complete(&mut self, path: &Path) {
///         println!("Completed: {}", path.display());
///     }
///
///     fn on_complete(&mut self) {}
/// }
/// ```
pub trait ProgressCallback: Send {
    /// Called when the decode pass reaches a requested entry.
    ///
    /// # Arguments
    ///
    /// * `path` - Inner path of the entry
    /// * `total` - Number of entries in the request
    /// * `current` - Current entry number (1-indexed)
    fn on_entry_start(&mut self, path: &Path, total: usize, current: usize);

    /// Called after each chunk written to a temporary file.
    fn on_bytes_written(&mut self, bytes: u64);

    /// Called when an entry has been written and verified.
    fn on_entry_complete(&mut self, path: &Path);

    /// Called once when the batch ends, whatever its outcome.
    fn on_complete(&mut self);
}

/// No-op implementation of `ProgressCallback`.
#[derive(Debug, Default)]
pub struct NoopProgress;

impl ProgressCallback for NoopProgress {
    fn on_entry_start(&mut self, _path: &Path, _total: usize, _current: usize) {}

    fn on_bytes_written(&mut self, _bytes: u64) {}

    fn on_entry_complete(&mut self, _path: &Path) {}

    fn on_complete(&mut self) {}
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::tree::NodeId;

    fn file_node(path: &str) -> TreeNode {
        let mut node = TreeNode::folder(NodeId(1), InnerPath::normalize(path), Some(NodeId::ROOT));
        node.kind = crate::tree::NodeKind::File;
        node
    }

    #[test]
    fn test_new_result_is_empty_and_complete() {
        let result = UnpackResult::new();
        assert!(result.is_empty());
        assert_eq!(result.status, UnpackStatus::Complete);
        assert!(!result.has_failures());
        assert!(!result.is_cancelled());
    }

    #[test]
    fn test_take_transfers_ownership() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut result = UnpackResult::new();
        result.files.insert(EntryIndex::new(4), file.into_temp_path());

        assert!(result.get(EntryIndex::new(4)).is_some());
        let taken = result.take(EntryIndex::new(4)).unwrap();
        assert!(taken.exists());
        assert!(result.is_empty());
    }

    #[test]
    fn test_collecting_reporter_shares_storage() {
        let reporter = CollectingReporter::new();
        let clone = reporter.clone();
        let node = file_node("dir/b.txt");

        clone.report(
            FailureCategory::TempFile,
            &node,
            &ArchiveError::entry_failed("dir/b.txt", "no space"),
        );

        let records = reporter.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].category, FailureCategory::TempFile);
        assert_eq!(records[0].path, "dir/b.txt");
        assert!(records[0].message.contains("no space"));
    }

    #[test]
    fn test_category_display() {
        assert_eq!(FailureCategory::Encrypted.to_string(), "encrypted");
        assert_eq!(FailureCategory::Missing.to_string(), "missing");
    }

    #[test]
    fn test_log_level_follows_recoverability() {
        let quota = ArchiveError::QuotaExceeded {
            resource: crate::error::QuotaResource::EntrySize { size: 9, max: 4 },
        };
        assert_eq!(log_level(&quota), log::Level::Warn);
        assert_eq!(log_level(&ArchiveError::entry_failed("a", "gone")), log::Level::Warn);
        assert_eq!(log_level(&ArchiveError::Corrupt("bad".into())), log::Level::Error);
    }

    #[test]
    fn test_noop_reporters_do_not_panic() {
        let node = file_node("a.txt");
        let err = ArchiveError::Cancelled;
        NoopReporter.report(FailureCategory::EntryData, &node, &err);
        LogReporter::new("x.zip").report(FailureCategory::EntryData, &node, &err);

        let mut progress = NoopProgress;
        progress.on_entry_start(Path::new("a.txt"), 1, 1);
        progress.on_bytes_written(10);
        progress.on_entry_complete(Path::new("a.txt"));
        progress.on_complete();
    }
}
