//! Test utilities for archive creation and scripted archive handles.
//!
//! Provides in-memory builders for real TAR, ZIP and 7z images, and
//! [`MemoryArchive`], an [`ArchiveFormat`] whose entries and failure modes
//! are scripted by the test.
//!
//! # Panics
//!
//! All functions in this module may panic on I/O errors since they are
//! designed for test use only where panics are acceptable.

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::BTreeSet;
use std::io::Cursor;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use tempfile::NamedTempFile;

use crate::ArchiveError;
use crate::Result;
use crate::extraction::temp::TempDirFactory;
use crate::extraction::temp::TempFileFactory;
use crate::formats::traits::ArchiveFormat;
use crate::formats::traits::CachedEntry;
use crate::formats::traits::EntryEnumerator;
use crate::formats::traits::EntryMetadata;
use crate::formats::traits::EntrySink;
use crate::formats::traits::Flow;
use crate::tree::TreeNode;
use crate::types::EntryIndex;
use crate::types::InnerPath;
use crate::types::UnpackRequest;

/// Creates an in-memory TAR archive from a list of entries.
///
/// Each entry is a tuple of (path, content). Files are created with mode 0o644.
///
/// # Examples
///
/// ```
/// use arctree_core::test_utils::create_test_tar;
///
/// let tar_data = create_test_tar(&[("file.txt", b"hello"), ("dir/nested.txt", b"world")]);
/// ```
#[must_use]
pub fn create_test_tar(entries: &[(&str, &[u8])]) -> Vec<u8> {
    entries
        .iter()
        .fold(TarTestBuilder::new(), |builder, (path, data)| builder.add_file(path, data))
        .build()
}

/// Creates an in-memory ZIP archive from a list of entries.
///
/// Each entry is a tuple of (path, content). Files are stored uncompressed
/// with mode 0o644.
///
/// # Examples
///
/// ```
/// use arctree_core::test_utils::create_test_zip;
///
/// let zip_data = create_test_zip(&[("file.txt", b"hello"), ("dir/nested.txt", b"world")]);
/// ```
#[must_use]
pub fn create_test_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    entries
        .iter()
        .fold(ZipTestBuilder::new(), |builder, (path, data)| builder.add_file(path, data))
        .build()
}

/// Creates an in-memory solid 7z archive from a list of entries.
#[must_use]
pub fn create_test_7z(entries: &[(&str, &[u8])]) -> Vec<u8> {
    entries
        .iter()
        .fold(SevenZTestBuilder::new(), |builder, (path, data)| builder.add_file(path, data))
        .build()
}

/// Builder for creating TAR test archives.
///
/// # Examples
///
/// ```
/// use arctree_core::test_utils::TarTestBuilder;
///
/// let tar_data = TarTestBuilder::new()
///     .add_file("file.txt", b"content")
///     .add_directory("dir/")
///     .build();
/// ```
pub struct TarTestBuilder {
    builder: tar::Builder<Vec<u8>>,
}

impl TarTestBuilder {
    /// Creates a new TAR test builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            builder: tar::Builder::new(Vec::new()),
        }
    }

    /// Adds a regular file to the archive.
    #[must_use]
    pub fn add_file(mut self, path: &str, data: &[u8]) -> Self {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(1_700_000_000);
        header.set_cksum();
        self.builder.append_data(&mut header, path, data).unwrap();
        self
    }

    /// Adds a directory to the archive.
    #[must_use]
    pub fn add_directory(mut self, path: &str) -> Self {
        let mut header = tar::Header::new_gnu();
        header.set_size(0);
        header.set_mode(0o755);
        header.set_entry_type(tar::EntryType::Directory);
        header.set_cksum();
        self.builder
            .append_data(&mut header, path, std::io::empty())
            .unwrap();
        self
    }

    /// Adds a pax global extended header (`g` entry) with raw `records`,
    /// e.g. `b"19 comment=arctree\n"`.
    #[must_use]
    pub fn add_pax_global_header(mut self, records: &[u8]) -> Self {
        let mut header = tar::Header::new_ustar();
        header.set_size(records.len() as u64);
        header.set_mode(0o644);
        header.set_entry_type(tar::EntryType::XGlobalHeader);
        self.builder
            .append_data(&mut header, "pax_global_header", records)
            .unwrap();
        self
    }

    /// Adds a symbolic link pointing at `target`.
    #[must_use]
    pub fn add_symlink(mut self, path: &str, target: &str) -> Self {
        let mut header = tar::Header::new_gnu();
        header.set_size(0);
        header.set_mode(0o777);
        header.set_entry_type(tar::EntryType::Symlink);
        self.builder.append_link(&mut header, path, target).unwrap();
        self
    }

    /// Builds and returns the TAR archive data.
    #[must_use]
    pub fn build(self) -> Vec<u8> {
        self.builder.into_inner().unwrap()
    }
}

impl Default for TarTestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating ZIP test archives.
///
/// # Examples
///
/// ```
/// use arctree_core::test_utils::ZipTestBuilder;
///
/// let zip_data = ZipTestBuilder::new()
///     .add_file("file.txt", b"content")
///     .add_directory("dir/")
///     .build();
/// ```
pub struct ZipTestBuilder {
    zip: zip::ZipWriter<Cursor<Vec<u8>>>,
}

impl ZipTestBuilder {
    /// Creates a new ZIP test builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            zip: zip::ZipWriter::new(Cursor::new(Vec::new())),
        }
    }

    /// Adds a stored file to the archive.
    #[must_use]
    pub fn add_file(mut self, path: &str, data: &[u8]) -> Self {
        self.write_file(path, data, zip::CompressionMethod::Stored);
        self
    }

    /// Adds a deflate-compressed file to the archive.
    #[must_use]
    pub fn add_deflated_file(mut self, path: &str, data: &[u8]) -> Self {
        self.write_file(path, data, zip::CompressionMethod::Deflated);
        self
    }

    fn write_file(&mut self, path: &str, data: &[u8], method: zip::CompressionMethod) {
        use zip::write::SimpleFileOptions;

        let options = SimpleFileOptions::default()
            .compression_method(method)
            .unix_permissions(0o644);

        self.zip.start_file(path, options).unwrap();
        self.zip.write_all(data).unwrap();
    }

    /// Adds a directory to the archive.
    #[must_use]
    pub fn add_directory(mut self, path: &str) -> Self {
        use zip::write::SimpleFileOptions;

        let options = SimpleFileOptions::default().unix_permissions(0o755);
        self.zip.add_directory(path, options).unwrap();
        self
    }

    /// Builds and returns the ZIP archive data.
    #[must_use]
    pub fn build(self) -> Vec<u8> {
        self.zip.finish().unwrap().into_inner()
    }
}

impl Default for ZipTestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for 7z test archives, written with sevenz-rust2's
/// [`ArchiveWriter`](sevenz_rust2::ArchiveWriter) using LZMA2.
///
/// In solid mode (the default) consecutive non-empty files share one block.
/// Directories and empty files carry no stream, so each one closes the
/// current block; header order always matches insertion order.
///
/// # Examples
///
/// ```
/// use arctree_core::test_utils::SevenZTestBuilder;
///
/// let data = SevenZTestBuilder::new()
///     .add_directory("docs")
///     .add_file("docs/a.txt", b"alpha")
///     .build();
/// assert!(data.starts_with(b"7z"));
/// ```
#[derive(Debug, Clone)]
pub struct SevenZTestBuilder {
    entries: Vec<(String, Option<Vec<u8>>)>,
    solid: bool,
}

impl SevenZTestBuilder {
    /// Creates a new 7z test builder producing a solid archive.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
            solid: true,
        }
    }

    /// Packs consecutive files into shared blocks when `solid` is `true`.
    #[must_use]
    pub const fn solid(mut self, solid: bool) -> Self {
        self.solid = solid;
        self
    }

    /// Adds a regular file to the archive.
    #[must_use]
    pub fn add_file(mut self, path: &str, data: &[u8]) -> Self {
        self.entries.push((path.to_string(), Some(data.to_vec())));
        self
    }

    /// Adds a directory to the archive.
    #[must_use]
    pub fn add_directory(mut self, path: &str) -> Self {
        self.entries.push((path.trim_end_matches('/').to_string(), None));
        self
    }

    /// Builds and returns the 7z archive data.
    #[must_use]
    pub fn build(self) -> Vec<u8> {
        use sevenz_rust2::ArchiveEntry;
        use sevenz_rust2::ArchiveWriter;
        use sevenz_rust2::SourceReader;

        fn flush(writer: &mut ArchiveWriter<Cursor<Vec<u8>>>, block: &mut Vec<(String, Vec<u8>)>) {
            if block.is_empty() {
                return;
            }
            let (entries, readers): (Vec<_>, Vec<_>) = block
                .drain(..)
                .map(|(name, data)| {
                    (ArchiveEntry::new_file(&name), SourceReader::new(Cursor::new(data)))
                })
                .unzip();
            writer.push_archive_entries(entries, readers).unwrap();
        }

        let mut writer = ArchiveWriter::new(Cursor::new(Vec::new())).unwrap();
        let mut block = Vec::new();
        for (name, data) in self.entries {
            match data {
                Some(data) if !data.is_empty() && self.solid => block.push((name, data)),
                Some(data) if !data.is_empty() => {
                    writer
                        .push_archive_entry(ArchiveEntry::new_file(&name), Some(Cursor::new(data)))
                        .unwrap();
                }
                Some(_) => {
                    flush(&mut writer, &mut block);
                    writer
                        .push_archive_entry(ArchiveEntry::new_file(&name), None::<&[u8]>)
                        .unwrap();
                }
                None => {
                    flush(&mut writer, &mut block);
                    writer
                        .push_archive_entry(ArchiveEntry::new_directory(&name), None::<&[u8]>)
                        .unwrap();
                }
            }
        }
        flush(&mut writer, &mut block);
        writer.finish().unwrap().into_inner()
    }
}

impl Default for SevenZTestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Sink that keeps everything it is handed.
#[derive(Debug, Default)]
pub struct RecordingSink {
    /// Accepted entries with their full content, in the order received.
    pub accepted: Vec<(EntryIndex, Vec<u8>)>,
    /// Rejected entries with the error message.
    pub rejected: Vec<(EntryIndex, String)>,
    stop_after: Option<usize>,
}

impl RecordingSink {
    /// Sink that asks the adapter to stop after `count` accepted entries.
    #[must_use]
    pub fn stopping_after(count: usize) -> Self {
        Self {
            stop_after: Some(count),
            ..Self::default()
        }
    }

    fn flow(&self) -> Flow {
        if self.stop_after.is_some_and(|n| self.accepted.len() >= n) {
            Flow::Stop
        } else {
            Flow::Continue
        }
    }
}

impl EntrySink for RecordingSink {
    fn accept(&mut self, index: EntryIndex, data: &mut dyn Read) -> Flow {
        let mut content = Vec::new();
        match data.read_to_end(&mut content) {
            Ok(_) => self.accepted.push((index, content)),
            Err(e) => self.rejected.push((index, e.to_string())),
        }
        self.flow()
    }

    fn reject(&mut self, index: EntryIndex, error: ArchiveError) -> Flow {
        self.rejected.push((index, error.to_string()));
        self.flow()
    }

    fn should_stop(&self) -> bool {
        self.flow() == Flow::Stop
    }
}

/// Temp file factory that fails for one inner path.
#[derive(Debug)]
pub struct FailingFactory {
    inner: TempDirFactory,
    failing_path: String,
}

impl FailingFactory {
    /// Creates temp files in `dir`, except for the entry at `failing_path`.
    #[must_use]
    pub fn new(dir: &Path, failing_path: &str) -> Self {
        Self {
            inner: TempDirFactory::new(Some(dir.to_path_buf()), "t-"),
            failing_path: failing_path.to_string(),
        }
    }
}

impl TempFileFactory for FailingFactory {
    fn create_temp_file(&self, node: &TreeNode) -> Result<NamedTempFile> {
        if node.path().as_str() == self.failing_path {
            return Err(ArchiveError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "temp directory is read-only",
            )));
        }
        self.inner.create_temp_file(node)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Script {
    Normal,
    Unreadable,
    Rejected,
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    meta: CachedEntry,
    data: Vec<u8>,
    script: Script,
}

/// Shared counters of a [`MemoryArchive`], readable after the archive was
/// moved into a session.
#[derive(Debug, Clone, Default)]
pub struct MemoryCounters {
    finished: Arc<AtomicUsize>,
    passes: Arc<AtomicUsize>,
    visited: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl MemoryCounters {
    /// Times an enumeration was finalized.
    #[must_use]
    pub fn finish_count(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    /// Number of decode passes started.
    #[must_use]
    pub fn pass_count(&self) -> usize {
        self.passes.load(Ordering::SeqCst)
    }

    /// Entries visited by decode passes, over all passes.
    #[must_use]
    pub fn entries_visited(&self) -> usize {
        self.visited.load(Ordering::SeqCst)
    }

    /// Times the handle was closed.
    #[must_use]
    pub fn close_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Scripted in-memory archive handle.
///
/// # Examples
///
/// ```
/// use arctree_core::test_utils::MemoryArchive;
/// use arctree_core::formats::traits::ArchiveFormat;
///
/// let mut archive = MemoryArchive::builder()
///     .file("a.txt", b"alpha")
///     .directory("docs/")
///     .build();
/// assert_eq!(archive.format_name(), "memory");
/// assert!(archive.entries().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct MemoryArchive {
    entries: Vec<MemoryEntry>,
    missing: BTreeSet<usize>,
    corrupt_listing_at: Option<usize>,
    corrupt_stream_at: Option<usize>,
    encrypted: bool,
    solid: bool,
    counters: MemoryCounters,
}

impl MemoryArchive {
    /// Starts building a scripted archive.
    #[must_use]
    pub fn builder() -> MemoryArchiveBuilder {
        MemoryArchiveBuilder::default()
    }

    /// Counters shared with every clone of this archive.
    #[must_use]
    pub fn counters(&self) -> MemoryCounters {
        self.counters.clone()
    }

    /// See [`MemoryCounters::finish_count`].
    #[must_use]
    pub fn finish_count(&self) -> usize {
        self.counters.finish_count()
    }

    /// See [`MemoryCounters::pass_count`].
    #[must_use]
    pub fn pass_count(&self) -> usize {
        self.counters.pass_count()
    }

    /// See [`MemoryCounters::entries_visited`].
    #[must_use]
    pub fn entries_visited(&self) -> usize {
        self.counters.entries_visited()
    }

    /// See [`MemoryCounters::close_count`].
    #[must_use]
    pub fn close_count(&self) -> usize {
        self.counters.close_count()
    }
}

/// Builder for [`MemoryArchive`].
#[derive(Debug, Default)]
pub struct MemoryArchiveBuilder {
    entries: Vec<MemoryEntry>,
    missing: BTreeSet<usize>,
    corrupt_listing_at: Option<usize>,
    corrupt_stream_at: Option<usize>,
    encrypted: bool,
    solid: bool,
}

impl MemoryArchiveBuilder {
    fn push(mut self, path: &str, data: &[u8], is_directory: bool, script: Script) -> Self {
        self.entries.push(MemoryEntry {
            meta: CachedEntry {
                path: InnerPath::normalize(path).as_str().to_string(),
                size: data.len() as u64,
                is_directory,
                is_encrypted: false,
                modified: None,
            },
            data: data.to_vec(),
            script,
        });
        self
    }

    fn last_mut(&mut self) -> &mut MemoryEntry {
        self.entries.last_mut().unwrap()
    }

    /// Adds a regular file.
    #[must_use]
    pub fn file(self, path: &str, data: &[u8]) -> Self {
        self.push(path, data, false, Script::Normal)
    }

    /// Adds an explicit directory entry.
    #[must_use]
    pub fn directory(self, path: &str) -> Self {
        self.push(path, &[], true, Script::Normal)
    }

    /// Adds a file flagged as individually encrypted.
    #[must_use]
    pub fn encrypted_file(self, path: &str, data: &[u8]) -> Self {
        let mut builder = self.push(path, data, false, Script::Normal);
        builder.last_mut().meta.is_encrypted = true;
        builder
    }

    /// Adds a file whose reader fails halfway through.
    #[must_use]
    pub fn unreadable_file(self, path: &str, data: &[u8]) -> Self {
        self.push(path, data, false, Script::Unreadable)
    }

    /// Adds a file the decoder rejects before handing out data.
    #[must_use]
    pub fn rejected_file(self, path: &str, data: &[u8]) -> Self {
        self.push(path, data, false, Script::Rejected)
    }

    /// Adds a file whose header declares `declared` bytes.
    #[must_use]
    pub fn file_with_declared_size(self, path: &str, data: &[u8], declared: u64) -> Self {
        let mut builder = self.push(path, data, false, Script::Normal);
        builder.last_mut().meta.size = declared;
        builder
    }

    /// Listed, but never produced by a decode pass.
    #[must_use]
    pub fn missing_from_stream(mut self, index: usize) -> Self {
        self.missing.insert(index);
        self
    }

    /// Enumeration fails when it reaches `index`.
    #[must_use]
    pub const fn corrupt_listing_at(mut self, index: usize) -> Self {
        self.corrupt_listing_at = Some(index);
        self
    }

    /// Decode passes fail when they reach `index`.
    #[must_use]
    pub const fn corrupt_stream_at(mut self, index: usize) -> Self {
        self.corrupt_stream_at = Some(index);
        self
    }

    /// The archive as a whole requires a password.
    #[must_use]
    pub const fn encrypted(mut self) -> Self {
        self.encrypted = true;
        self
    }

    /// The archive reports itself as solid.
    #[must_use]
    pub const fn solid(mut self) -> Self {
        self.solid = true;
        self
    }

    /// Finishes the archive.
    #[must_use]
    pub fn build(self) -> MemoryArchive {
        MemoryArchive {
            entries: self.entries,
            missing: self.missing,
            corrupt_listing_at: self.corrupt_listing_at,
            corrupt_stream_at: self.corrupt_stream_at,
            encrypted: self.encrypted,
            solid: self.solid,
            counters: MemoryCounters::default(),
        }
    }
}

struct MemoryEnumerator<'a> {
    entries: &'a [MemoryEntry],
    position: usize,
    corrupt_at: Option<usize>,
    finished: &'a AtomicUsize,
}

impl EntryEnumerator for MemoryEnumerator<'_> {
    fn next_entry(&mut self) -> Option<Result<Box<dyn EntryMetadata + '_>>> {
        if self.corrupt_at == Some(self.position) {
            self.position = usize::MAX;
            return Some(Err(ArchiveError::Corrupt("truncated entry header".into())));
        }
        let entry = self.entries.get(self.position)?;
        self.position += 1;
        Some(Ok(Box::new(entry.meta.clone())))
    }

    fn finish(&mut self) {
        self.finished.fetch_add(1, Ordering::SeqCst);
    }
}

struct BrokenReader;

impl Read for BrokenReader {
    fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
        Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "invalid block checksum",
        ))
    }
}

impl ArchiveFormat for MemoryArchive {
    fn format_name(&self) -> &'static str {
        "memory"
    }

    fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    fn is_solid(&self) -> bool {
        self.solid
    }

    fn entries(&mut self) -> Result<Box<dyn EntryEnumerator + '_>> {
        Ok(Box::new(MemoryEnumerator {
            entries: &self.entries,
            position: 0,
            corrupt_at: self.corrupt_listing_at,
            finished: &self.counters.finished,
        }))
    }

    fn unpack(&mut self, request: &UnpackRequest, sink: &mut dyn EntrySink) -> Result<()> {
        self.counters.passes.fetch_add(1, Ordering::SeqCst);

        for (i, entry) in self.entries.iter().enumerate() {
            if sink.should_stop() {
                break;
            }
            self.counters.visited.fetch_add(1, Ordering::SeqCst);
            if self.corrupt_stream_at == Some(i) {
                return Err(ArchiveError::Corrupt(format!("bad block at entry {i}")));
            }

            let index = EntryIndex::new(i);
            if !request.contains(index) || self.missing.contains(&i) {
                continue;
            }

            let flow = match entry.script {
                Script::Normal => sink.accept(index, &mut entry.data.as_slice()),
                Script::Unreadable => {
                    let half = &entry.data[..entry.data.len() / 2];
                    sink.accept(index, &mut half.chain(BrokenReader))
                }
                Script::Rejected => sink.reject(
                    index,
                    ArchiveError::entry_failed(&entry.meta.path, "unsupported compression method"),
                ),
            };
            if flow == Flow::Stop {
                break;
            }
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
