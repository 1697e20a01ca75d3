//! Archive format detection.
//!
//! Detection looks at the file extension first. Temp files of nested
//! archives keep their entry name as suffix, but entries are not always
//! named after their format, so unknown extensions fall back to the
//! leading magic bytes.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::ArchiveError;
use crate::Result;

use super::SevenZArchive;
use super::TarArchive;
use super::ZipArchive;
use super::compression::CompressionCodec;
use super::traits::ArchiveFormat;

/// 7z archives start with the signature: `37 7A BC AF 27 1C`.
pub const SEVENZ_MAGIC: [u8; 6] = [0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C];

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const ZIP_EMPTY_MAGIC: &[u8] = b"PK\x05\x06";
const USTAR_MAGIC: &[u8] = b"ustar";
const USTAR_OFFSET: usize = 257;

/// Bytes needed to recognize every supported format.
const SNIFF_LEN: usize = USTAR_OFFSET + 8;

/// Supported archive formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveType {
    /// Tar archive (uncompressed).
    Tar,
    /// Gzip-compressed tar archive.
    TarGz,
    /// Bzip2-compressed tar archive.
    TarBz2,
    /// XZ-compressed tar archive.
    TarXz,
    /// Zstd-compressed tar archive.
    TarZst,
    /// ZIP archive.
    Zip,
    /// 7z archive.
    SevenZ,
}

impl ArchiveType {
    /// Compression codec wrapped around a TAR stream, if any.
    #[must_use]
    pub const fn codec(self) -> Option<CompressionCodec> {
        match self {
            Self::TarGz => Some(CompressionCodec::Gzip),
            Self::TarBz2 => Some(CompressionCodec::Bzip2),
            Self::TarXz => Some(CompressionCodec::Xz),
            Self::TarZst => Some(CompressionCodec::Zstd),
            Self::Tar | Self::Zip | Self::SevenZ => None,
        }
    }

    const fn from_codec(codec: CompressionCodec) -> Self {
        match codec {
            CompressionCodec::Gzip => Self::TarGz,
            CompressionCodec::Bzip2 => Self::TarBz2,
            CompressionCodec::Xz => Self::TarXz,
            CompressionCodec::Zstd => Self::TarZst,
        }
    }
}

/// Detects the archive type from a file extension.
///
/// # Errors
///
/// Returns `UnsupportedFormat` if the extension is missing or unknown.
///
/// # Examples
///
/// ```
/// use arctree_core::formats::detect::{ArchiveType, detect_format};
/// use std::path::Path;
///
/// assert_eq!(detect_format(Path::new("a.tar.gz"))?, ArchiveType::TarGz);
/// assert_eq!(detect_format(Path::new("B.ZIP"))?, ArchiveType::Zip);
/// # Ok::<(), arctree_core::ArchiveError>(())
/// ```
pub fn detect_format(path: &Path) -> Result<ArchiveType> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .ok_or(ArchiveError::UnsupportedFormat)?;

    match extension.to_ascii_lowercase().as_str() {
        "tar" => Ok(ArchiveType::Tar),
        "gz" | "tgz" => Ok(ArchiveType::TarGz),
        "bz2" | "tbz" | "tbz2" => Ok(ArchiveType::TarBz2),
        "xz" | "txz" => Ok(ArchiveType::TarXz),
        "zst" | "tzst" => Ok(ArchiveType::TarZst),
        "zip" => Ok(ArchiveType::Zip),
        "7z" => Ok(ArchiveType::SevenZ),
        _ => Err(ArchiveError::UnsupportedFormat),
    }
}

/// Detects the archive type from the leading bytes of a file.
///
/// A compressed stream is assumed to hold a TAR archive.
#[must_use]
pub fn detect_from_magic(header: &[u8]) -> Option<ArchiveType> {
    if header.starts_with(&SEVENZ_MAGIC) {
        return Some(ArchiveType::SevenZ);
    }
    if header.starts_with(ZIP_MAGIC) || header.starts_with(ZIP_EMPTY_MAGIC) {
        return Some(ArchiveType::Zip);
    }
    if let Some(codec) = CompressionCodec::from_magic(header) {
        return Some(ArchiveType::from_codec(codec));
    }
    header
        .get(USTAR_OFFSET..USTAR_OFFSET + USTAR_MAGIC.len())
        .is_some_and(|magic| magic == USTAR_MAGIC)
        .then_some(ArchiveType::Tar)
}

/// Detects the archive type of a file on disk, by extension and then by
/// content.
///
/// # Errors
///
/// Returns `Io` if the file cannot be read and `UnsupportedFormat` if
/// neither its name nor its content is recognized.
pub fn sniff_file(path: &Path) -> Result<ArchiveType> {
    if let Ok(archive_type) = detect_format(path) {
        return Ok(archive_type);
    }

    let mut header = Vec::with_capacity(SNIFF_LEN);
    File::open(path)?
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut header)?;

    detect_from_magic(&header).ok_or(ArchiveError::UnsupportedFormat)
}

/// Opens a format adapter for the file at `path`.
///
/// # Errors
///
/// Returns `UnsupportedFormat` for unknown formats, `Io` if the file cannot
/// be opened, and `Corrupt` if its header cannot be parsed.
pub fn open_format(path: &Path) -> Result<Box<dyn ArchiveFormat>> {
    let archive_type = sniff_file(path)?;
    log::debug!("opening {} as {archive_type:?}", path.display());

    let handle: Box<dyn ArchiveFormat> = match archive_type {
        ArchiveType::Zip => Box::new(ZipArchive::open(path)?),
        ArchiveType::SevenZ => Box::new(SevenZArchive::open(path)?),
        tar => Box::new(TarArchive::open(path, tar.codec())?),
    };
    Ok(handle)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_tar;
    use crate::test_utils::create_test_zip;
    use std::path::PathBuf;

    #[test]
    fn test_detect_tar_variants() {
        for (name, expected) in [
            ("archive.tar", ArchiveType::Tar),
            ("archive.tar.gz", ArchiveType::TarGz),
            ("archive.tgz", ArchiveType::TarGz),
            ("archive.tar.bz2", ArchiveType::TarBz2),
            ("archive.tbz2", ArchiveType::TarBz2),
            ("archive.txz", ArchiveType::TarXz),
            ("archive.tar.zst", ArchiveType::TarZst),
        ] {
            assert_eq!(detect_format(&PathBuf::from(name)).unwrap(), expected, "{name}");
        }
    }

    #[test]
    fn test_detect_case_insensitive() {
        assert_eq!(detect_format(Path::new("ARCHIVE.7Z")).unwrap(), ArchiveType::SevenZ);
        assert_eq!(detect_format(Path::new("Archive.Zip")).unwrap(), ArchiveType::Zip);
    }

    #[test]
    fn test_detect_unsupported() {
        assert!(matches!(
            detect_format(Path::new("archive.rar")),
            Err(ArchiveError::UnsupportedFormat)
        ));
        assert!(matches!(
            detect_format(Path::new("no_extension")),
            Err(ArchiveError::UnsupportedFormat)
        ));
    }

    #[test]
    fn test_detect_from_magic() {
        assert_eq!(detect_from_magic(&create_test_zip(&[("a", b"1")])), Some(ArchiveType::Zip));
        assert_eq!(detect_from_magic(&create_test_tar(&[("a", b"1")])), Some(ArchiveType::Tar));
        assert_eq!(detect_from_magic(&SEVENZ_MAGIC), Some(ArchiveType::SevenZ));
        assert_eq!(detect_from_magic(&[0x1F, 0x8B, 0x08]), Some(ArchiveType::TarGz));
        assert_eq!(detect_from_magic(b"plain text"), None);
        assert_eq!(detect_from_magic(&[]), None);
    }

    #[test]
    fn test_sniff_file_without_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attachment.bin");
        std::fs::write(&path, create_test_zip(&[("a.txt", b"hello")])).unwrap();

        assert_eq!(sniff_file(&path).unwrap(), ArchiveType::Zip);
        let handle = open_format(&path).unwrap();
        assert_eq!(handle.format_name(), "zip");
    }

    #[test]
    fn test_open_format_unknown_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"just some text").unwrap();

        assert!(matches!(open_format(&path), Err(ArchiveError::UnsupportedFormat)));
    }
}
