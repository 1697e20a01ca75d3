//! Batch extraction of archive entries to temporary files.

pub mod batch;
pub mod copy;
pub mod temp;

pub use batch::BatchExtractor;
pub use temp::TempDirFactory;
pub use temp::TempFileFactory;
