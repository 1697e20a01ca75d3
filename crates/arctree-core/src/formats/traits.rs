//! Capability traits implemented by every archive format adapter.
//!
//! A format adapter is split in three:
//!
//! - [`ArchiveFormat`]: the open handle. Owns decoder state, answers the
//!   archive-level encryption check, hands out enumerators and runs decode
//!   passes.
//! - [`EntryEnumerator`]: a forward-only, single-pass sequence of raw entries.
//! - [`EntryMetadata`]: read access to one raw entry.
//!
//! Sessions and the content tree are written against these traits only.

use std::io::Read;
use std::time::SystemTime;

use crate::Result;
use crate::types::EntryIndex;
use crate::types::UnpackRequest;

/// Metadata of one raw archive entry.
pub trait EntryMetadata {
    /// Path relative to the archive root.
    ///
    /// Uses `/` as the only separator and never starts with `/`. Adapters
    /// normalize with [`InnerPath::normalize`](crate::types::InnerPath::normalize).
    fn inner_path(&self) -> &str;

    /// Last modification time, if the format records one.
    fn last_modified(&self) -> Option<SystemTime>;

    /// Returns `true` for directory entries.
    fn is_directory(&self) -> bool;

    /// Declared uncompressed size in bytes.
    fn unpacked_size(&self) -> u64;

    /// Returns `true` if this entry is individually password protected.
    fn is_encrypted(&self) -> bool;
}

/// Forward-only sequence of raw entries.
///
/// The entry returned by [`next_entry`](Self::next_entry) borrows the
/// enumerator and is therefore only valid until the enumerator is advanced.
pub trait EntryEnumerator {
    /// Advances to the next entry.
    ///
    /// Returns `None` once the archive is exhausted. An `Err` means the
    /// container could not be read further.
    fn next_entry(&mut self) -> Option<Result<Box<dyn EntryMetadata + '_>>>;

    /// Releases format-specific scratch resources.
    ///
    /// Called exactly once after enumeration ends, whether it succeeded or
    /// not.
    fn finish(&mut self) {}
}

/// What the decode pass should do after handing over an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep decoding.
    Continue,
    /// Stop the pass; this is not an error.
    Stop,
}

/// Receiver of entry data during a decode pass.
pub trait EntrySink {
    /// Receives the data stream of a requested entry.
    ///
    /// The reader is only valid for the duration of the call.
    fn accept(&mut self, index: EntryIndex, data: &mut dyn Read) -> Flow;

    /// Receives an entry the format could not open for reading.
    ///
    /// Used for failures that are local to one entry (e.g. a ZIP member with
    /// an unsupported compression method); the pass goes on afterwards.
    fn reject(&mut self, index: EntryIndex, error: crate::ArchiveError) -> Flow;

    /// Polled between entries; `true` stops the pass.
    fn should_stop(&self) -> bool {
        false
    }
}

/// An open archive handle.
///
/// Handles are exclusively owned by one session and are never cloned.
pub trait ArchiveFormat {
    /// Returns the archive format name.
    fn format_name(&self) -> &'static str;

    /// Returns `true` if the archive as a whole cannot be read without a
    /// password. Evaluated when the handle is constructed.
    fn is_encrypted(&self) -> bool;

    /// Returns `true` if entries share compressed blocks.
    fn is_solid(&self) -> bool {
        false
    }

    /// Starts a single enumeration pass.
    fn entries(&mut self) -> Result<Box<dyn EntryEnumerator + '_>>;

    /// Runs one decode pass, handing every requested entry to `sink` in
    /// archive order.
    ///
    /// Entries that are not requested are skipped. Returns `Ok(())` when the
    /// archive is exhausted or the sink asked to stop; an `Err` means the
    /// decode stream itself broke and the handle is unusable.
    fn unpack(&mut self, request: &UnpackRequest, sink: &mut dyn EntrySink) -> Result<()>;

    /// Releases the handle's resources.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<A: ArchiveFormat + ?Sized> ArchiveFormat for Box<A> {
    fn format_name(&self) -> &'static str {
        (**self).format_name()
    }

    fn is_encrypted(&self) -> bool {
        (**self).is_encrypted()
    }

    fn is_solid(&self) -> bool {
        (**self).is_solid()
    }

    fn entries(&mut self) -> Result<Box<dyn EntryEnumerator + '_>> {
        (**self).entries()
    }

    fn unpack(&mut self, request: &UnpackRequest, sink: &mut dyn EntrySink) -> Result<()> {
        (**self).unpack(request, sink)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

/// Owned snapshot of entry metadata.
///
/// Adapters whose native entries are expensive to hold (or borrow the decoder)
/// cache their metadata in this form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedEntry {
    /// Normalized inner path.
    pub path: String,
    /// Declared uncompressed size.
    pub size: u64,
    /// Directory flag.
    pub is_directory: bool,
    /// Per-entry encryption flag.
    pub is_encrypted: bool,
    /// Last modification time.
    pub modified: Option<SystemTime>,
}

impl EntryMetadata for CachedEntry {
    fn inner_path(&self) -> &str {
        &self.path
    }

    fn last_modified(&self) -> Option<SystemTime> {
        self.modified
    }

    fn is_directory(&self) -> bool {
        self.is_directory
    }

    fn unpacked_size(&self) -> u64 {
        self.size
    }

    fn is_encrypted(&self) -> bool {
        self.is_encrypted
    }
}

/// Enumerator over a slice of cached entries.
#[derive(Debug)]
pub struct CachedEnumerator<'a> {
    entries: std::slice::Iter<'a, CachedEntry>,
}

impl<'a> CachedEnumerator<'a> {
    /// Creates an enumerator over `entries`.
    #[must_use]
    pub fn new(entries: &'a [CachedEntry]) -> Self {
        Self {
            entries: entries.iter(),
        }
    }
}

impl EntryEnumerator for CachedEnumerator<'_> {
    fn next_entry(&mut self) -> Option<Result<Box<dyn EntryMetadata + '_>>> {
        self.entries
            .next()
            .map(|entry| Ok(Box::new(entry.clone()) as Box<dyn EntryMetadata>))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cached(path: &str, is_directory: bool) -> CachedEntry {
        CachedEntry {
            path: path.to_string(),
            size: 3,
            is_directory,
            is_encrypted: false,
            modified: None,
        }
    }

    #[test]
    fn test_cached_entry_metadata() {
        let entry = cached("dir/a.txt", false);
        assert_eq!(entry.inner_path(), "dir/a.txt");
        assert_eq!(entry.unpacked_size(), 3);
        assert!(!entry.is_directory());
        assert!(!entry.is_encrypted());
        assert!(entry.last_modified().is_none());
    }

    #[test]
    fn test_cached_enumerator_is_single_pass() {
        let entries = vec![cached("a", false), cached("b", true)];
        let mut enumerator = CachedEnumerator::new(&entries);

        let first = enumerator.next_entry().map(|e| e.map(|m| m.inner_path().to_string()));
        assert!(matches!(first, Some(Ok(ref p)) if p == "a"));
        assert!(enumerator.next_entry().is_some());
        assert!(enumerator.next_entry().is_none());
        assert!(enumerator.next_entry().is_none());
    }
}
