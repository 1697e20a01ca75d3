//! TAR archive adapter, plain or wrapped in a compression codec.
//!
//! TAR is purely sequential: there is no central directory, and a compressed
//! TAR can only be read front to back. Every enumeration or decode pass
//! therefore reopens the source and rebuilds the decoder chain. Entry indices
//! are ordinals among content entries (files and directories), which are
//! identical across passes. Pax global headers, links and device nodes are
//! passed over in every pass.

use std::fs::File;
use std::io::BufReader;
use std::io::Cursor;
use std::io::Read;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use crate::ArchiveError;
use crate::Result;
use crate::types::EntryIndex;
use crate::types::InnerPath;
use crate::types::UnpackRequest;

use super::compression::CompressionCodec;
use super::traits::ArchiveFormat;
use super::traits::CachedEntry;
use super::traits::EntryEnumerator;
use super::traits::EntryMetadata;
use super::traits::EntrySink;
use super::traits::Flow;

#[derive(Debug)]
enum TarSource {
    File(PathBuf),
    Memory(Arc<[u8]>),
}

impl TarSource {
    fn open(&self) -> std::io::Result<Box<dyn Read>> {
        Ok(match self {
            Self::File(path) => Box::new(BufReader::new(File::open(path)?)),
            Self::Memory(data) => Box::new(Cursor::new(Arc::clone(data))),
        })
    }
}

/// TAR archive handle.
///
/// # Examples
///
/// ```
/// use arctree_core::formats::TarArchive;
/// use arctree_core::formats::traits::ArchiveFormat;
/// use arctree_core::test_utils::create_test_tar;
///
/// let data = create_test_tar(&[("a.txt", b"hello")]);
/// let mut archive = TarArchive::from_bytes(data, None);
/// assert_eq!(archive.format_name(), "tar");
/// assert!(archive.entries().is_ok());
/// ```
pub struct TarArchive {
    source: TarSource,
    codec: Option<CompressionCodec>,
    pass: Option<::tar::Archive<Box<dyn Read>>>,
}

impl std::fmt::Debug for TarArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TarArchive")
            .field("source", &self.source)
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}

impl TarArchive {
    /// Opens a TAR file, optionally compressed with `codec`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be opened.
    pub fn open(path: &Path, codec: Option<CompressionCodec>) -> Result<Self> {
        // fail early on unreadable files; every pass reopens by path
        File::open(path)?;
        Ok(Self {
            source: TarSource::File(path.to_path_buf()),
            codec,
            pass: None,
        })
    }

    /// Wraps an in-memory TAR image.
    #[must_use]
    pub fn from_bytes(data: impl Into<Arc<[u8]>>, codec: Option<CompressionCodec>) -> Self {
        Self {
            source: TarSource::Memory(data.into()),
            codec,
            pass: None,
        }
    }

    /// Compression codec wrapped around the TAR stream.
    #[must_use]
    pub const fn codec(&self) -> Option<CompressionCodec> {
        self.codec
    }

    fn start_pass(&self) -> Result<::tar::Archive<Box<dyn Read>>> {
        let raw = self.source.open()?;
        let stream = match self.codec {
            Some(codec) => codec
                .decoder(raw)
                .map_err(|e| ArchiveError::Corrupt(format!("{} stream: {e}", codec.name())))?,
            None => raw,
        };
        Ok(::tar::Archive::new(stream))
    }
}

fn corrupt(e: &std::io::Error) -> ArchiveError {
    ArchiveError::Corrupt(format!("tar stream: {e}"))
}

fn header_mtime(header: &::tar::Header) -> Option<SystemTime> {
    header
        .mtime()
        .ok()
        .and_then(|secs| UNIX_EPOCH.checked_add(Duration::from_secs(secs)))
}

/// Whether an entry of this type is listed and extractable.
fn is_content(entry_type: ::tar::EntryType) -> bool {
    entry_type.is_file()
        || entry_type.is_dir()
        || entry_type.is_contiguous()
        || entry_type.is_gnu_sparse()
}

fn cache_entry<R: Read>(entry: &::tar::Entry<'_, R>) -> Result<CachedEntry> {
    let header = entry.header();
    let raw_path = entry.path().map_err(|e| corrupt(&e))?;
    let path = InnerPath::normalize(&raw_path.to_string_lossy());
    let is_directory = header.entry_type().is_dir();
    let modified = header_mtime(header);

    Ok(CachedEntry {
        path: path.as_str().to_string(),
        size: if is_directory { 0 } else { entry.size() },
        is_directory,
        is_encrypted: false,
        modified,
    })
}

struct TarEnumerator<'a> {
    entries: ::tar::Entries<'a, Box<dyn Read>>,
    failed: bool,
}

impl EntryEnumerator for TarEnumerator<'_> {
    fn next_entry(&mut self) -> Option<Result<Box<dyn EntryMetadata + '_>>> {
        if self.failed {
            return None;
        }
        let cached = loop {
            match self.entries.next()? {
                Ok(entry) if !is_content(entry.header().entry_type()) => {
                    log::trace!("skipping tar entry of type {:?}", entry.header().entry_type());
                }
                Ok(entry) => break cache_entry(&entry),
                Err(e) => break Err(corrupt(&e)),
            }
        };
        if cached.is_err() {
            self.failed = true;
        }
        Some(cached.map(|entry| Box::new(entry) as Box<dyn EntryMetadata>))
    }
}

impl ArchiveFormat for TarArchive {
    fn format_name(&self) -> &'static str {
        match self.codec {
            None => "tar",
            Some(codec) => codec.extension(),
        }
    }

    fn is_encrypted(&self) -> bool {
        false
    }

    fn entries(&mut self) -> Result<Box<dyn EntryEnumerator + '_>> {
        let archive = self.start_pass()?;
        let archive = self.pass.insert(archive);
        let entries = archive.entries().map_err(|e| corrupt(&e))?;
        Ok(Box::new(TarEnumerator {
            entries,
            failed: false,
        }))
    }

    fn unpack(&mut self, request: &UnpackRequest, sink: &mut dyn EntrySink) -> Result<()> {
        let mut archive = self.start_pass()?;
        let last = request.indices().last().copied();

        let content = archive
            .entries()
            .map_err(|e| corrupt(&e))?
            .filter(|entry| {
                entry
                    .as_ref()
                    .map_or(true, |entry| is_content(entry.header().entry_type()))
            });
        for (ordinal, entry) in content.enumerate() {
            if sink.should_stop() {
                break;
            }
            let mut entry = entry.map_err(|e| corrupt(&e))?;
            let index = EntryIndex::new(ordinal);
            if request.contains(index) && sink.accept(index, &mut entry) == Flow::Stop {
                break;
            }
            if last.is_some_and(|last| index >= last) {
                break;
            }
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.pass = None;
        Ok(())
    }
}
