//! Archive format adapters.

pub mod compression;
pub mod detect;
pub mod sevenz;
pub mod tar;
pub mod traits;
pub mod zip;

pub use sevenz::SevenZArchive;
pub use self::tar::TarArchive;
pub use traits::ArchiveFormat;
pub use self::zip::ZipArchive;
