//! Error types for archive sessions and entry extraction.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using `ArchiveError`.
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Represents a specific quota resource that was exceeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotaResource {
    /// Archive holds more entries than allowed.
    EntryCount {
        /// Entries seen so far.
        current: usize,
        /// Maximum allowed entry count.
        max: usize,
    },
    /// Single entry is larger than allowed.
    EntrySize {
        /// Declared entry size in bytes.
        size: u64,
        /// Maximum allowed entry size in bytes.
        max: u64,
    },
}

impl std::fmt::Display for QuotaResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EntryCount { current, max } => {
                write!(f, "quota exceeded: entry count ({current} > {max})")
            }
            Self::EntrySize { size, max } => {
                write!(f, "quota exceeded: entry size ({size} > {max})")
            }
        }
    }
}

/// Errors that can occur while opening, enumerating or extracting archives.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Archive format is unsupported or unrecognized.
    #[error("unsupported archive format")]
    UnsupportedFormat,

    /// Archive or entry is password protected.
    #[error("encrypted archive content: {path}")]
    EncryptedArchive {
        /// The archive, or the entry inside it, that is encrypted.
        path: PathBuf,
    },

    /// Container or decode stream is structurally unreadable.
    #[error("corrupt archive: {0}")]
    Corrupt(String),

    /// A single entry could not be materialized.
    #[error("failed to extract entry {path}: {reason}")]
    EntryExtractionFailed {
        /// Inner path of the entry.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// Configured limits exceeded.
    #[error("{resource}")]
    QuotaExceeded {
        /// Description of the exceeded resource.
        resource: QuotaResource,
    },

    /// Unpack request refers to entries that cannot be extracted.
    #[error("invalid unpack request: {0}")]
    InvalidRequest(String),

    /// Operation attempted on a session that was never opened.
    #[error("archive session is not open")]
    SessionNotOpen,

    /// Operation attempted after the session was closed.
    #[error("archive session is closed")]
    SessionClosed,

    /// Cooperative cancellation was requested.
    #[error("operation cancelled")]
    Cancelled,
}

impl ArchiveError {
    /// Creates an `EntryExtractionFailed` error for the given inner path.
    pub fn entry_failed(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Self::EntryExtractionFailed {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Returns `true` if the caller can skip the affected entry or archive
    /// and carry on with its siblings.
    ///
    /// # Examples
    ///
    /// ```
    /// use arctree_core::ArchiveError;
    ///
    /// let err = ArchiveError::entry_failed("dir/a.txt", "disk full");
    /// assert!(err.is_recoverable());
    ///
    /// let err = ArchiveError::Corrupt("truncated header".to_string());
    /// assert!(!err.is_recoverable());
    /// ```
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::EncryptedArchive { .. }
                | Self::EntryExtractionFailed { .. }
                | Self::QuotaExceeded { .. }
                | Self::Cancelled
        )
    }

    /// Returns `true` if the archive handle that produced this error can no
    /// longer serve extraction requests.
    #[must_use]
    pub const fn is_fatal_for_handle(&self) -> bool {
        matches!(self, Self::Corrupt(_) | Self::Io(_))
    }

    /// Returns a context string for this error, if available.
    ///
    /// # Examples
    ///
    /// ```
    /// use arctree_core::ArchiveError;
    ///
    /// let err = ArchiveError::Corrupt("bad header".to_string());
    /// assert_eq!(err.context(), Some("bad header"));
    ///
    /// let err = ArchiveError::UnsupportedFormat;
    /// assert_eq!(err.context(), None);
    /// ```
    #[must_use]
    pub fn context(&self) -> Option<&str> {
        match self {
            Self::Corrupt(msg) | Self::InvalidRequest(msg) => Some(msg),
            Self::EntryExtractionFailed { reason, .. } => Some(reason),
            _ => None,
        }
    }

    /// Returns the quota resource that was exceeded, if applicable.
    #[must_use]
    pub const fn quota_resource(&self) -> Option<&QuotaResource> {
        match self {
            Self::QuotaExceeded { resource } => Some(resource),
            _ => None,
        }
    }
}
