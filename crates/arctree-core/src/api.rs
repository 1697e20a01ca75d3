//! High-level public API for opening archives.

use std::path::Path;

use crate::ArchiveSession;
use crate::Result;
use crate::SessionConfig;
use crate::formats::ArchiveFormat;

/// Opens the archive at `path` and builds its content tree.
///
/// The format is detected from the file extension, falling back to the
/// file's leading bytes. `enclosing` is the display path of the archive this
/// file was extracted from, if any; the session's display path is then
/// `<enclosing>/<file name>`.
///
/// # Errors
///
/// Returns an error if:
/// - the file cannot be opened (`Io`)
/// - the format is not recognized (`UnsupportedFormat`)
/// - the archive as a whole is encrypted (`EncryptedArchive`)
/// - the entry listing is unreadable (`Corrupt`) or too large
///   (`QuotaExceeded`)
///
/// # Examples
///
/// ```no_run
/// use arctree_core::SessionConfig;
/// use arctree_core::open_archive;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let session = open_archive("archive.tar.gz", None, SessionConfig::default())?;
/// if let Some(tree) = session.tree() {
///     println!("{} entries", tree.entry_count());
/// }
/// # Ok(())
/// # }
/// ```
pub fn open_archive<P: AsRef<Path>>(
    path: P,
    enclosing: Option<&str>,
    config: SessionConfig,
) -> Result<ArchiveSession<Box<dyn ArchiveFormat>>> {
    let path = path.as_ref();
    let mut session = ArchiveSession::new(display_path_for(path, enclosing), config);
    session.open_path(path)?;
    Ok(session)
}

/// Display path of the archive at `path`, optionally nested in `enclosing`.
///
/// # Examples
///
/// ```
/// use arctree_core::api::display_path_for;
/// use std::path::Path;
///
/// assert_eq!(display_path_for(Path::new("/tmp/a.zip"), None), "/tmp/a.zip");
/// assert_eq!(display_path_for(Path::new("/tmp/b.7z"), Some("mail.pst/att")), "mail.pst/att/b.7z");
/// ```
#[must_use]
pub fn display_path_for(path: &Path, enclosing: Option<&str>) -> String {
    match enclosing {
        None => path.display().to_string(),
        Some(parent) => {
            let name = path
                .file_name()
                .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
            format!("{}/{name}", parent.trim_end_matches('/'))
        }
    }
}
