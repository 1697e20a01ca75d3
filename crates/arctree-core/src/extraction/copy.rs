//! Bounded copy of entry data into temporary files with a reusable buffer.
//!
//! One [`CopyBuffer`] lives for a whole batch, so entries are copied without
//! a heap allocation per entry. The copy enforces a byte limit while data is
//! flowing: a declared size cannot be trusted, and an entry that produces
//! more bytes than allowed is cut off instead of filling the disk. The
//! cancellation source is polled before every chunk, so a large entry does
//! not delay cancellation until it is fully written.

use std::io::Read;
use std::io::Write;
use std::io::{self};

use crate::ArchiveError;
use crate::cancel::CancellationSource;
use crate::error::QuotaResource;
use crate::report::FailureCategory;

/// Buffer size for entry copies (64KB).
const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Stack-allocated buffer reused across the entries of one batch.
#[derive(Debug)]
pub struct CopyBuffer {
    #[allow(clippy::large_stack_arrays)]
    buf: [u8; COPY_BUFFER_SIZE],
}

impl CopyBuffer {
    /// Creates a new zero-initialized copy buffer.
    #[inline]
    #[must_use]
    #[allow(clippy::large_stack_arrays)]
    pub fn new() -> Self {
        Self {
            buf: [0u8; COPY_BUFFER_SIZE],
        }
    }

    /// Returns the buffer size in bytes.
    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        COPY_BUFFER_SIZE
    }
}

impl Default for CopyBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Why a copy stopped early.
#[derive(Debug)]
pub enum CopyError {
    /// Reading entry data failed.
    Read(io::Error),
    /// Writing the output failed.
    Write(io::Error),
    /// The entry produced more bytes than allowed.
    LimitExceeded {
        /// Bytes seen when the limit was crossed.
        written: u64,
        /// The limit.
        limit: u64,
    },
    /// Cancellation was requested mid-entry.
    Cancelled,
}

impl CopyError {
    /// Failure category reported for this error.
    #[must_use]
    pub const fn category(&self) -> FailureCategory {
        match self {
            Self::Read(_) | Self::Cancelled => FailureCategory::EntryData,
            Self::Write(_) => FailureCategory::TempFile,
            Self::LimitExceeded { .. } => FailureCategory::Quota,
        }
    }

    /// Converts into the error recorded for the entry at `path`.
    #[must_use]
    pub fn into_archive_error(self, path: &str) -> ArchiveError {
        match self {
            Self::Read(e) => ArchiveError::entry_failed(path, format_args!("read failed: {e}")),
            Self::Write(e) => ArchiveError::entry_failed(path, format_args!("write failed: {e}")),
            Self::LimitExceeded { written, limit } => ArchiveError::QuotaExceeded {
                resource: QuotaResource::EntrySize {
                    size: written,
                    max: limit,
                },
            },
            Self::Cancelled => ArchiveError::Cancelled,
        }
    }
}

/// Copies at most `limit` bytes from `reader` to `writer`, checking `cancel`
/// before each chunk.
///
/// `on_chunk` is invoked with the size of every chunk written. Returns the
/// total number of bytes copied.
///
/// # Errors
///
/// - [`CopyError::Read`] if reading fails
/// - [`CopyError::Write`] if writing fails
/// - [`CopyError::LimitExceeded`] if the reader yields more than `limit` bytes
/// - [`CopyError::Cancelled`] if `cancel` fired before the reader was drained
///
/// # Examples
///
/// ```
/// use arctree_core::NeverCancel;
/// use arctree_core::extraction::copy::{CopyBuffer, copy_bounded};
///
/// let mut buffer = CopyBuffer::new();
/// let mut output = Vec::new();
/// let copied =
///     copy_bounded(&mut &b"hello"[..], &mut output, &mut buffer, 16, &NeverCancel, &mut |_| {})
///         .map_err(|e| e.into_archive_error("a.txt"))?;
/// assert_eq!(copied, 5);
/// # Ok::<(), arctree_core::ArchiveError>(())
/// ```
#[inline]
pub fn copy_bounded<R: Read + ?Sized, W: Write + ?Sized>(
    reader: &mut R,
    writer: &mut W,
    buffer: &mut CopyBuffer,
    limit: u64,
    cancel: &dyn CancellationSource,
    on_chunk: &mut dyn FnMut(u64),
) -> Result<u64, CopyError> {
    let mut total: u64 = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(CopyError::Cancelled);
        }
        let bytes_read = match reader.read(&mut buffer.buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(CopyError::Read(e)),
        };

        let next = total.saturating_add(bytes_read as u64);
        if next > limit {
            return Err(CopyError::LimitExceeded {
                written: next,
                limit,
            });
        }

        writer
            .write_all(&buffer.buf[..bytes_read])
            .map_err(CopyError::Write)?;
        total = next;
        on_chunk(bytes_read as u64);
    }

    Ok(total)
}
