//! Single-pass extraction of a set of entries to temporary files.
//!
//! The extractor turns one [`UnpackRequest`] into one decode pass over the
//! archive. The format adapter walks entries in archive order and hands the
//! requested ones to a sink owned by the extractor, which writes each to a
//! fresh temp file. Failures local to one entry are reported and recorded,
//! and the pass goes on. The pass ends early once every requested entry has
//! been seen.

use std::collections::BTreeSet;
use std::io::BufWriter;
use std::io::Read;
use std::path::Path;
use std::path::PathBuf;
use std::time::Instant;

use crate::ArchiveError;
use crate::Result;
use crate::SessionConfig;
use crate::cancel::CancellationSource;
use crate::error::QuotaResource;
use crate::extraction::copy::CopyBuffer;
use crate::extraction::copy::CopyError;
use crate::extraction::copy::copy_bounded;
use crate::extraction::temp::TempFileFactory;
use crate::formats::traits::ArchiveFormat;
use crate::formats::traits::EntrySink;
use crate::formats::traits::Flow;
use crate::report::EntryFailure;
use crate::report::FailReporter;
use crate::report::FailureCategory;
use crate::report::ProgressCallback;
use crate::report::UnpackResult;
use crate::report::UnpackStatus;
use crate::tree::ContentTree;
use crate::tree::TreeNode;
use crate::types::EntryIndex;
use crate::types::UnpackRequest;

/// Extracts sets of entries of one archive in single decode passes.
///
/// Borrows everything it needs; sessions build one per request.
pub struct BatchExtractor<'a> {
    tree: &'a ContentTree,
    config: &'a SessionConfig,
    factory: &'a dyn TempFileFactory,
    reporter: &'a dyn FailReporter,
    cancel: &'a dyn CancellationSource,
}

impl<'a> BatchExtractor<'a> {
    /// Creates an extractor over `tree`.
    #[must_use]
    pub fn new(
        tree: &'a ContentTree,
        config: &'a SessionConfig,
        factory: &'a dyn TempFileFactory,
        reporter: &'a dyn FailReporter,
        cancel: &'a dyn CancellationSource,
    ) -> Self {
        Self {
            tree,
            config,
            factory,
            reporter,
            cancel,
        }
    }

    /// Checks that every requested index names a file of the tree.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` for an index outside the tree, a folder, or
    /// an entry shadowed by an earlier entry with the same path.
    pub fn validate(&self, request: &UnpackRequest) -> Result<()> {
        for index in request.iter() {
            let Some(node) = self.tree.node_for(index) else {
                return Err(ArchiveError::InvalidRequest(format!(
                    "entry {index} out of range ({} entries)",
                    self.tree.entry_count()
                )));
            };
            if node.is_folder() {
                return Err(ArchiveError::InvalidRequest(format!(
                    "entry {index} ({}) is a folder",
                    node.path()
                )));
            }
            if let Some(first) = node.entry_index().filter(|first| *first != index) {
                return Err(ArchiveError::InvalidRequest(format!(
                    "entry {index} ({}) is shadowed by entry {first}",
                    node.path()
                )));
            }
        }
        Ok(())
    }

    /// Extracts every entry of `request` in one decode pass over `handle`.
    ///
    /// An empty request returns an empty result without touching the handle.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest` if the request names an unknown index or a folder
    /// - `Corrupt` or `Io` if the decode stream broke; temp files written so
    ///   far are deleted
    ///
    /// Per-entry failures are not errors: they are reported to the
    /// [`FailReporter`] and listed in [`UnpackResult::failures`].
    pub fn extract<A: ArchiveFormat + ?Sized>(
        &self,
        handle: &mut A,
        request: &UnpackRequest,
        progress: &mut dyn ProgressCallback,
    ) -> Result<UnpackResult> {
        self.validate(request)?;

        if request.is_empty() {
            progress.on_complete();
            return Ok(UnpackResult::new());
        }

        let start = Instant::now();
        let mut sink = BatchSink {
            extractor: self,
            progress,
            remaining: request.indices().clone(),
            total: request.len(),
            current: 0,
            buffer: CopyBuffer::new(),
            result: UnpackResult::new(),
        };

        log::debug!(
            "extracting {} entries from {} in one {} pass",
            request.len(),
            self.tree.display_root(),
            handle.format_name()
        );

        let outcome = handle.unpack(request, &mut sink);
        let BatchSink {
            progress,
            remaining,
            mut result,
            ..
        } = sink;
        progress.on_complete();

        if let Err(e) = outcome {
            log::error!(
                "decode pass over {} failed after {} of {} entries: {e}",
                self.tree.display_root(),
                result.files.len() + result.failures.len(),
                request.len()
            );
            // dropping `result` deletes every temp file written so far
            return Err(match e {
                ArchiveError::Corrupt(_)
                | ArchiveError::Io(_)
                | ArchiveError::EncryptedArchive { .. } => e,
                other => ArchiveError::Corrupt(other.to_string()),
            });
        }

        if !remaining.is_empty() {
            if self.cancel.is_cancelled() {
                log::debug!(
                    "extraction from {} cancelled with {} entries pending",
                    self.tree.display_root(),
                    remaining.len()
                );
                result.status = UnpackStatus::Cancelled;
            } else {
                for index in remaining {
                    if let Some(node) = self.tree.node_for(index) {
                        let error = ArchiveError::entry_failed(
                            node.path().as_str(),
                            "entry not produced by the decode pass",
                        );
                        self.fail(&mut result, index, node, FailureCategory::Missing, error);
                    }
                }
            }
        }

        result.duration = start.elapsed();
        Ok(result)
    }

    fn fail(
        &self,
        result: &mut UnpackResult,
        index: EntryIndex,
        node: &TreeNode,
        category: FailureCategory,
        error: ArchiveError,
    ) {
        self.reporter.report(category, node, &error);
        result.failures.push(EntryFailure {
            index,
            path: node.path().clone(),
            category,
            error,
        });
    }
}

struct BatchSink<'e, 'a, 'p> {
    extractor: &'e BatchExtractor<'a>,
    progress: &'p mut dyn ProgressCallback,
    remaining: BTreeSet<EntryIndex>,
    total: usize,
    current: usize,
    buffer: CopyBuffer,
    result: UnpackResult,
}

impl BatchSink<'_, '_, '_> {
    fn next_flow(&self) -> Flow {
        if self.should_stop() {
            Flow::Stop
        } else {
            Flow::Continue
        }
    }

    /// Writes one entry; the temp file is deleted on every error path.
    fn write_entry(
        &mut self,
        index: EntryIndex,
        node: &TreeNode,
        data: &mut dyn Read,
    ) -> std::result::Result<(), (FailureCategory, ArchiveError)> {
        let config = self.extractor.config;
        let path = node.path().as_str();

        if node.is_encrypted() {
            return Err((
                FailureCategory::Encrypted,
                ArchiveError::EncryptedArchive {
                    path: PathBuf::from(path),
                },
            ));
        }

        if !config.is_entry_size_allowed(node.size()) {
            return Err((
                FailureCategory::Quota,
                ArchiveError::QuotaExceeded {
                    resource: QuotaResource::EntrySize {
                        size: node.size(),
                        max: config.max_entry_size,
                    },
                },
            ));
        }

        let file = self.extractor.factory.create_temp_file(node).map_err(|e| {
            (
                FailureCategory::TempFile,
                ArchiveError::entry_failed(path, format_args!("cannot create temp file: {e}")),
            )
        })?;

        let progress = &mut *self.progress;
        let mut writer = BufWriter::new(file);
        let written = copy_bounded(
            data,
            &mut writer,
            &mut self.buffer,
            config.max_entry_size,
            self.extractor.cancel,
            &mut |bytes| progress.on_bytes_written(bytes),
        )
        .map_err(|e| (e.category(), e.into_archive_error(path)))?;

        let file = writer
            .into_inner()
            .map_err(|e| CopyError::Write(e.into_error()))
            .map_err(|e| (e.category(), e.into_archive_error(path)))?;

        if config.verify_sizes && written != node.size() {
            return Err((
                FailureCategory::EntryData,
                ArchiveError::entry_failed(
                    path,
                    format_args!("size mismatch: wrote {written} bytes, expected {}", node.size()),
                ),
            ));
        }

        self.result.bytes_written = self.result.bytes_written.saturating_add(written);
        self.result.files.insert(index, file.into_temp_path());
        Ok(())
    }
}

impl EntrySink for BatchSink<'_, '_, '_> {
    fn accept(&mut self, index: EntryIndex, data: &mut dyn Read) -> Flow {
        if self.extractor.cancel.is_cancelled() {
            return Flow::Stop;
        }
        if !self.remaining.remove(&index) {
            return self.next_flow();
        }
        let tree = self.extractor.tree;
        let Some(node) = tree.node_for(index) else {
            return self.next_flow();
        };

        self.current += 1;
        self.progress
            .on_entry_start(Path::new(node.path().as_str()), self.total, self.current);

        match self.write_entry(index, node, data) {
            Ok(()) => {
                self.progress.on_entry_complete(Path::new(node.path().as_str()));
            }
            Err((_, ArchiveError::Cancelled)) => {
                // the partial temp file is already gone; the entry stays pending
                log::debug!("entry {index} ({}) cancelled mid-copy", node.path());
                self.remaining.insert(index);
                return Flow::Stop;
            }
            Err((category, error)) => {
                log::debug!("entry {index} ({}) failed: {error}", node.path());
                self.extractor
                    .fail(&mut self.result, index, node, category, error);
            }
        }
        self.next_flow()
    }

    fn reject(&mut self, index: EntryIndex, error: ArchiveError) -> Flow {
        let tree = self.extractor.tree;
        if self.remaining.remove(&index)
            && let Some(node) = tree.node_for(index)
        {
            let category = match &error {
                ArchiveError::EncryptedArchive { .. } => FailureCategory::Encrypted,
                ArchiveError::QuotaExceeded { .. } => FailureCategory::Quota,
                _ => FailureCategory::EntryData,
            };
            self.extractor
                .fail(&mut self.result, index, node, category, error);
        }
        self.next_flow()
    }

    fn should_stop(&self) -> bool {
        self.remaining.is_empty() || self.extractor.cancel.is_cancelled()
    }
}
