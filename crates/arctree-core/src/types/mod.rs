//! Value types shared by the content tree, extractor and sessions.
//!
//! - [`EntryIndex`]: stable position of a raw entry in enumeration order
//! - [`UnpackRequest`]: ordered, duplicate-free set of indices to extract
//! - [`InnerPath`]: normalized archive-relative path

pub mod entry_index;
pub mod inner_path;

pub use entry_index::EntryIndex;
pub use entry_index::UnpackRequest;
pub use inner_path::InnerPath;
