//! Error conversion utilities for CLI.
//!
//! Converts arctree-core's typed errors (thiserror) into user-friendly
//! contextual errors (anyhow) with actionable guidance.

use anyhow::anyhow;
use arctree_core::ArchiveError;
use arctree_core::QuotaResource;
use std::path::Path;

/// Converts `ArchiveError` to user-friendly anyhow error with context
pub fn convert_archive_error(err: ArchiveError, archive: &Path) -> anyhow::Error {
    match err {
        ArchiveError::EncryptedArchive { path } => {
            anyhow!(
                "Archive '{}' is password protected: {}\n\
                 HINT: Encrypted archives and entries cannot be extracted.",
                archive.display(),
                path.display()
            )
        }
        ArchiveError::QuotaExceeded { .. } => {
            let flag = match err.quota_resource() {
                Some(QuotaResource::EntryCount { .. }) => "--max-entries",
                _ => "--max-entry-size",
            };
            anyhow!(
                "Extraction limit exceeded for '{}': {err}\n\
                 HINT: Use {flag} to raise the limit.",
                archive.display()
            )
        }
        ArchiveError::Io(io_err) => {
            anyhow!(
                "I/O error while processing '{}': {}",
                archive.display(),
                io_err
            )
        }
        ArchiveError::UnsupportedFormat => {
            anyhow!(
                "Archive format not supported: {}\n\
                 HINT: Supported formats: tar, tar.gz, tar.bz2, tar.xz, tar.zst, zip, 7z",
                archive.display()
            )
        }
        ArchiveError::Corrupt(reason) => {
            anyhow!(
                "Invalid archive '{}': {}\n\
                 HINT: The archive may be corrupted or truncated.",
                archive.display(),
                reason
            )
        }
        ArchiveError::InvalidRequest(reason) => {
            anyhow!(
                "Invalid entry selection for '{}': {}\n\
                 HINT: Run 'arctree list' to see entry indices; folders cannot be selected by index.",
                archive.display(),
                reason
            )
        }
        _ => anyhow::Error::from(err)
            .context(format!("Error processing archive '{}'", archive.display())),
    }
}

/// Adds context to a generic error about archive operations
pub fn add_archive_context<T>(
    result: Result<T, ArchiveError>,
    archive: &Path,
) -> anyhow::Result<T> {
    result.map_err(|e| convert_archive_error(e, archive))
}
