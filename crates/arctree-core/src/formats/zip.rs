//! ZIP archive adapter.
//!
//! ZIP has a central directory, so entry metadata is read once when the
//! handle is opened and extraction seeks directly to requested members.
//! Encryption is per entry; a ZIP archive as a whole is never reported as
//! encrypted.

use std::fs::File;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use std::path::Path;
use std::path::PathBuf;
use std::time::SystemTime;

use ::zip::DateTime;
use ::zip::result::ZipError;

use crate::ArchiveError;
use crate::Result;
use crate::types::InnerPath;
use crate::types::UnpackRequest;

use super::traits::ArchiveFormat;
use super::traits::CachedEntry;
use super::traits::CachedEnumerator;
use super::traits::EntryEnumerator;
use super::traits::EntrySink;
use super::traits::Flow;

/// ZIP archive handle.
///
/// # Examples
///
/// ```
/// use arctree_core::formats::ZipArchive;
/// use arctree_core::formats::traits::ArchiveFormat;
/// use arctree_core::test_utils::create_test_zip;
/// use std::io::Cursor;
///
/// let data = create_test_zip(&[("a.txt", b"hello")]);
/// let archive = ZipArchive::new(Cursor::new(data))?;
/// assert_eq!(archive.format_name(), "zip");
/// assert_eq!(archive.len(), 1);
/// # Ok::<(), arctree_core::ArchiveError>(())
/// ```
pub struct ZipArchive<R: Read + Seek> {
    inner: ::zip::ZipArchive<R>,
    entries: Vec<CachedEntry>,
}

impl<R: Read + Seek> std::fmt::Debug for ZipArchive<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipArchive")
            .field("entries", &self.entries.len())
            .finish_non_exhaustive()
    }
}

impl ZipArchive<BufReader<File>> {
    /// Opens a ZIP file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or its central
    /// directory is unreadable.
    pub fn open(path: &Path) -> Result<Self> {
        Self::new(BufReader::new(File::open(path)?))
    }
}

impl<R: Read + Seek> ZipArchive<R> {
    /// Reads the central directory of `source`.
    ///
    /// # Errors
    ///
    /// Returns `Corrupt` if the central directory cannot be parsed.
    pub fn new(source: R) -> Result<Self> {
        let mut inner = ::zip::ZipArchive::new(source).map_err(into_archive_error)?;
        let mut entries = Vec::with_capacity(inner.len());

        for i in 0..inner.len() {
            let file = inner.by_index_raw(i).map_err(into_archive_error)?;
            let is_directory = file.is_dir();
            entries.push(CachedEntry {
                path: InnerPath::normalize(file.name()).as_str().to_string(),
                size: if is_directory { 0 } else { file.size() },
                is_directory,
                is_encrypted: file.encrypted(),
                modified: file.last_modified().and_then(dos_time_to_system),
            });
        }

        Ok(Self { inner, entries })
    }

    /// Number of entries in the central directory.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the archive has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Converts an MS-DOS timestamp (local time, 2-second resolution, no zone)
/// to a `SystemTime`, interpreting it as UTC.
fn dos_time_to_system(dt: DateTime) -> Option<SystemTime> {
    let timestamp = chrono::NaiveDate::from_ymd_opt(
        i32::from(dt.year()),
        u32::from(dt.month()),
        u32::from(dt.day()),
    )?
    .and_hms_opt(
        u32::from(dt.hour()),
        u32::from(dt.minute()),
        u32::from(dt.second()),
    )?
    .and_utc()
    .timestamp();

    let secs = u64::try_from(timestamp).ok()?;
    SystemTime::UNIX_EPOCH.checked_add(std::time::Duration::from_secs(secs))
}

fn into_archive_error(err: ZipError) -> ArchiveError {
    match err {
        ZipError::Io(e) => ArchiveError::Io(e),
        other => ArchiveError::Corrupt(format!("zip: {other}")),
    }
}

impl<R: Read + Seek> ArchiveFormat for ZipArchive<R> {
    fn format_name(&self) -> &'static str {
        "zip"
    }

    fn is_encrypted(&self) -> bool {
        false
    }

    fn entries(&mut self) -> Result<Box<dyn EntryEnumerator + '_>> {
        Ok(Box::new(CachedEnumerator::new(&self.entries)))
    }

    fn unpack(&mut self, request: &UnpackRequest, sink: &mut dyn EntrySink) -> Result<()> {
        for index in request.iter() {
            if sink.should_stop() {
                break;
            }
            let Some(entry) = self.entries.get(index.get()) else {
                continue;
            };

            if entry.is_encrypted {
                let error = ArchiveError::EncryptedArchive {
                    path: PathBuf::from(&entry.path),
                };
                if sink.reject(index, error) == Flow::Stop {
                    break;
                }
                continue;
            }

            let flow = match self.inner.by_index(index.get()) {
                Ok(mut file) => sink.accept(index, &mut file),
                Err(ZipError::Io(e)) => return Err(ArchiveError::Io(e)),
                Err(e) => sink.reject(index, ArchiveError::entry_failed(&entry.path, e)),
            };
            if flow == Flow::Stop {
                break;
            }
        }
        Ok(())
    }
}
