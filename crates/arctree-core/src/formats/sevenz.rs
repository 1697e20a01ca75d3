//! 7z archive adapter.
//!
//! 7z archives may be "solid": many entries compressed together in one
//! block, so reaching any entry means decoding everything stored before it
//! in the same block. This is why extraction is batched: one decode pass
//! serves a whole [`UnpackRequest`]. Blocks holding no requested entry are
//! never decoded, and a block is abandoned once its last requested entry
//! has been handed over.
//!
//! # Limitations (sevenz-rust2 0.20)
//!
//! - Modification times are not exposed; entries report none.
//! - Per-entry encryption is not exposed. Archives with encrypted headers are
//!   reported as encrypted when the handle is opened; archives that only
//!   encrypt content fail their first decode pass with `EncryptedArchive`.
//! - Windows reparse points (symlinks, junctions) are listed as files.

use std::fs::File;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use std::ops::Range;
use std::path::Path;
use std::path::PathBuf;

use sevenz_rust2::Archive;
use sevenz_rust2::ArchiveEntry;
use sevenz_rust2::BlockDecoder;
use sevenz_rust2::Password;

use crate::ArchiveError;
use crate::Result;
use crate::types::EntryIndex;
use crate::types::InnerPath;
use crate::types::UnpackRequest;

use super::traits::ArchiveFormat;
use super::traits::CachedEntry;
use super::traits::CachedEnumerator;
use super::traits::EntryEnumerator;
use super::traits::EntrySink;
use super::traits::Flow;

/// 7z archive handle.
///
/// # Examples
///
/// ```
/// use arctree_core::formats::SevenZArchive;
/// use arctree_core::formats::traits::ArchiveFormat;
/// use arctree_core::test_utils::SevenZTestBuilder;
/// use std::io::Cursor;
///
/// let data = SevenZTestBuilder::new().add_file("a.txt", b"hello").build();
/// let archive = SevenZArchive::new(Cursor::new(data))?;
/// assert_eq!(archive.format_name(), "7z");
/// assert!(!archive.is_encrypted());
/// # Ok::<(), arctree_core::ArchiveError>(())
/// ```
#[derive(Debug)]
pub struct SevenZArchive<R: Read + Seek> {
    source: R,
    entries: Vec<CachedEntry>,
    /// `None` when the header itself is encrypted.
    layout: Option<StreamLayout>,
    password: Password,
    is_solid: bool,
}

/// Decode-side view of the header.
///
/// The header may list stream-less entries (directories, empty files)
/// between the streams of one block. The decoder walks a block's entries as
/// one contiguous run, so the view keeps only stream entries, grouped by
/// block in stream order, and remembers which header entry owns each stream.
#[derive(Debug)]
struct StreamLayout {
    archive: Archive,
    owners: Vec<EntryIndex>,
    blocks: Vec<Range<usize>>,
    streamless: Vec<EntryIndex>,
}

impl StreamLayout {
    fn new(mut archive: Archive) -> Self {
        let file_blocks = std::mem::take(&mut archive.stream_map.file_block_index);
        let mut per_block: Vec<Vec<(EntryIndex, ArchiveEntry)>> =
            archive.blocks.iter().map(|_| Vec::new()).collect();
        let mut streamless = Vec::new();

        for (i, file) in std::mem::take(&mut archive.files).into_iter().enumerate() {
            let index = EntryIndex::new(i);
            if !file.has_stream {
                streamless.push(index);
                continue;
            }
            match file_blocks.get(i).copied().flatten().and_then(|b| per_block.get_mut(b)) {
                Some(members) => members.push((index, file)),
                None => log::warn!("7z entry {i} ({}) has a stream but no block", file.name),
            }
        }

        let mut owners = Vec::new();
        let mut blocks = Vec::with_capacity(per_block.len());
        let mut file_block_index = Vec::new();
        for (block, members) in per_block.into_iter().enumerate() {
            let start = owners.len();
            for (index, file) in members {
                owners.push(index);
                archive.files.push(file);
                file_block_index.push(Some(block));
            }
            blocks.push(start..owners.len());
        }
        archive.stream_map.block_first_file_index = blocks.iter().map(|r| r.start).collect();
        archive.stream_map.file_block_index = file_block_index;

        Self {
            archive,
            owners,
            blocks,
            streamless,
        }
    }

    fn owner(&self, ordinal: usize) -> Option<EntryIndex> {
        self.owners.get(ordinal).copied()
    }
}

impl SevenZArchive<BufReader<File>> {
    /// Opens a 7z file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or its header is
    /// unreadable.
    pub fn open(path: &Path) -> Result<Self> {
        Self::new(BufReader::new(File::open(path)?))
    }
}

impl<R: Read + Seek> SevenZArchive<R> {
    /// Reads the archive header and caches entry metadata.
    ///
    /// An archive whose header cannot be read without a password yields a
    /// handle that reports itself as encrypted and lists no entries.
    ///
    /// # Errors
    ///
    /// Returns `Corrupt` if the header is invalid.
    pub fn new(mut source: R) -> Result<Self> {
        let password = Password::empty();
        match Archive::read(&mut source, &password) {
            Ok(archive) => Self::with_header(source, archive),
            Err(e) if is_password_error(&e.to_string()) => {
                log::debug!("7z header is encrypted: {e}");
                Ok(Self {
                    source,
                    entries: Vec::new(),
                    layout: None,
                    password,
                    is_solid: false,
                })
            }
            Err(e) => Err(ArchiveError::Corrupt(format!("failed to open 7z archive: {e}"))),
        }
    }

    fn with_header(mut source: R, archive: Archive) -> Result<Self> {
        let entries = archive
            .files
            .iter()
            .map(|e| {
                let is_directory = e.is_directory();
                CachedEntry {
                    path: InnerPath::normalize(&e.name).as_str().to_string(),
                    size: if is_directory { 0 } else { e.size },
                    is_directory,
                    is_encrypted: false,
                    modified: None,
                }
            })
            .collect();

        source.rewind()?;

        Ok(Self {
            source,
            entries,
            is_solid: archive.is_solid,
            layout: Some(StreamLayout::new(archive)),
            password: Password::empty(),
        })
    }
}

fn is_password_error(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("password") || lower.contains("encrypt")
}

fn into_archive_error(err: &sevenz_rust2::Error) -> ArchiveError {
    let message = err.to_string();
    if is_password_error(&message) {
        return ArchiveError::EncryptedArchive {
            path: PathBuf::new(),
        };
    }
    ArchiveError::Corrupt(format!("7z stream: {message}"))
}

impl<R: Read + Seek> ArchiveFormat for SevenZArchive<R> {
    fn format_name(&self) -> &'static str {
        "7z"
    }

    fn is_encrypted(&self) -> bool {
        self.layout.is_none()
    }

    fn is_solid(&self) -> bool {
        self.is_solid
    }

    fn entries(&mut self) -> Result<Box<dyn EntryEnumerator + '_>> {
        Ok(Box::new(CachedEnumerator::new(&self.entries)))
    }

    fn unpack(&mut self, request: &UnpackRequest, sink: &mut dyn EntrySink) -> Result<()> {
        let Some(layout) = &self.layout else {
            return Err(ArchiveError::EncryptedArchive {
                path: PathBuf::new(),
            });
        };

        // Stream-less entries have nothing to decode.
        for &index in &layout.streamless {
            if !request.contains(index) {
                continue;
            }
            if sink.should_stop() || sink.accept(index, &mut std::io::empty()) == Flow::Stop {
                return Ok(());
            }
        }

        for (block, streams) in layout.blocks.iter().enumerate() {
            let mut remaining = streams
                .clone()
                .filter(|&s| layout.owner(s).is_some_and(|index| request.contains(index)))
                .count();
            if remaining == 0 {
                continue;
            }
            if sink.should_stop() {
                return Ok(());
            }

            let mut ordinal = streams.start;
            let mut stopped = false;
            let decoder =
                BlockDecoder::new(1, block, &layout.archive, &self.password, &mut self.source);
            decoder
                .for_each_entries(&mut |_entry, reader| {
                    if sink.should_stop() {
                        stopped = true;
                        return Ok(false);
                    }
                    let owner = layout.owner(ordinal);
                    ordinal += 1;

                    if let Some(index) = owner.filter(|&index| request.contains(index)) {
                        if sink.accept(index, reader) == Flow::Stop {
                            stopped = true;
                            return Ok(false);
                        }
                        remaining -= 1;
                        if remaining == 0 {
                            // the rest of a solid block is never needed
                            return Ok(false);
                        }
                    }
                    // the next stream starts where this reader ends
                    std::io::copy(reader, &mut std::io::sink())?;
                    Ok(true)
                })
                .map_err(|e| into_archive_error(&e))?;

            if stopped {
                return Ok(());
            }
        }
        Ok(())
    }
}
