//! Compression codecs wrapped around TAR streams.
//!
//! # Supported Codecs
//!
//! - **Gzip** (.tar.gz, .tgz)
//! - **Bzip2** (.tar.bz2, .tbz2)
//! - **Xz** (.tar.xz, .txz)
//! - **Zstd** (.tar.zst, .tzst)

use std::io::BufReader;
use std::io::Read;
use std::io::{self};

use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use xz2::read::XzDecoder;
use zstd::stream::read::Decoder as ZstdDecoder;

/// Compression codec of a compressed TAR archive.
///
/// # Examples
///
/// ```
/// use arctree_core::formats::compression::CompressionCodec;
///
/// assert_eq!(CompressionCodec::Gzip.extension(), "tar.gz");
/// assert_eq!(CompressionCodec::from_magic(&[0x1F, 0x8B, 0x08]), Some(CompressionCodec::Gzip));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionCodec {
    /// Gzip compression (deflate algorithm).
    Gzip,
    /// Bzip2 compression (Burrows-Wheeler algorithm).
    Bzip2,
    /// Xz compression (LZMA2 algorithm).
    Xz,
    /// Zstd compression (Zstandard algorithm).
    Zstd,
}

const GZIP_MAGIC: &[u8] = &[0x1F, 0x8B];
const BZIP2_MAGIC: &[u8] = b"BZh";
const XZ_MAGIC: &[u8] = &[0xFD, b'7', b'z', b'X', b'Z', 0x00];
const ZSTD_MAGIC: &[u8] = &[0x28, 0xB5, 0x2F, 0xFD];

impl CompressionCodec {
    /// Returns the typical file extension for this codec when used with TAR.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Gzip => "tar.gz",
            Self::Bzip2 => "tar.bz2",
            Self::Xz => "tar.xz",
            Self::Zstd => "tar.zst",
        }
    }

    /// Returns a human-readable name for this codec.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Gzip => "gzip",
            Self::Bzip2 => "bzip2",
            Self::Xz => "xz",
            Self::Zstd => "zstd",
        }
    }

    /// Recognizes a codec from the first bytes of a stream.
    #[must_use]
    pub fn from_magic(header: &[u8]) -> Option<Self> {
        [
            (GZIP_MAGIC, Self::Gzip),
            (BZIP2_MAGIC, Self::Bzip2),
            (XZ_MAGIC, Self::Xz),
            (ZSTD_MAGIC, Self::Zstd),
        ]
        .into_iter()
        .find_map(|(magic, codec)| header.starts_with(magic).then_some(codec))
    }

    /// Wraps `reader` in a decoder for this codec.
    ///
    /// # Errors
    ///
    /// Returns an error if the decoder cannot be initialized (zstd reads its
    /// frame header eagerly).
    pub fn decoder<'a, R: Read + 'a>(self, reader: R) -> io::Result<Box<dyn Read + 'a>> {
        Ok(match self {
            Self::Gzip => Box::new(GzDecoder::new(reader)),
            Self::Bzip2 => Box::new(BzDecoder::new(reader)),
            Self::Xz => Box::new(XzDecoder::new(reader)),
            Self::Zstd => Box::new(ZstdDecoder::with_buffer(BufReader::new(reader))?),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_codec_extension_and_name() {
        assert_eq!(CompressionCodec::Bzip2.extension(), "tar.bz2");
        assert_eq!(CompressionCodec::Zstd.extension(), "tar.zst");
        assert_eq!(CompressionCodec::Xz.name(), "xz");
    }

    #[test]
    fn test_from_magic() {
        assert_eq!(CompressionCodec::from_magic(b"BZh91AY"), Some(CompressionCodec::Bzip2));
        assert_eq!(
            CompressionCodec::from_magic(&[0xFD, b'7', b'z', b'X', b'Z', 0x00, 0x00]),
            Some(CompressionCodec::Xz)
        );
        assert_eq!(
            CompressionCodec::from_magic(&[0x28, 0xB5, 0x2F, 0xFD, 0x00]),
            Some(CompressionCodec::Zstd)
        );
        assert_eq!(CompressionCodec::from_magic(b"PK\x03\x04"), None);
        assert_eq!(CompressionCodec::from_magic(&[]), None);
    }

    #[test]
    fn test_gzip_decoder_roundtrip() {
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"payload").unwrap();
        let compressed = encoder.finish().unwrap();
        assert_eq!(CompressionCodec::from_magic(&compressed), Some(CompressionCodec::Gzip));

        let mut out = String::new();
        CompressionCodec::Gzip
            .decoder(&compressed[..])
            .unwrap()
            .read_to_string(&mut out)
            .unwrap();
        assert_eq!(out, "payload");
    }

    #[test]
    fn test_zstd_decoder_rejects_garbage() {
        let mut out = Vec::new();
        let result = CompressionCodec::Zstd
            .decoder(&b"not zstd at all"[..])
            .and_then(|mut d| d.read_to_end(&mut out));
        assert!(result.is_err());
    }
}
