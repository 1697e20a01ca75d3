//! Archive content trees and batched extraction of archive entries.
//!
//! `arctree-core` opens an archive (zip, tar, compressed tar, 7z), builds a
//! hierarchical tree of its entries, and extracts any subset of those
//! entries to temporary files in a single decode pass. Solid archives are
//! decoded once per request instead of once per entry. A corrupt or
//! unreadable entry fails alone: it is reported, and the rest of the batch
//! is extracted.
//!
//! # Examples
//!
//! ```no_run
//! use arctree_core::SessionConfig;
//! use arctree_core::UnpackRequest;
//! use arctree_core::open_archive;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut session = open_archive("archive.7z", None, SessionConfig::default())?;
//!
//! let request: UnpackRequest = session
//!     .tree()
//!     .map(|tree| tree.file_indices().collect())
//!     .unwrap_or_default();
//!
//! let result = session.extract(&request)?;
//! for (index, file) in &result.files {
//!     println!("{index} -> {}", file.display());
//! }
//! for failure in &result.failures {
//!     eprintln!("{}: {}", failure.path, failure.error);
//! }
//! session.close()?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod cancel;
pub mod config;
pub mod error;
pub mod extraction;
pub mod formats;
pub mod report;
pub mod session;
#[doc(hidden)]
pub mod test_utils;
pub mod tree;
pub mod types;

// Re-export main API types
pub use api::open_archive;
pub use cancel::CancellationSource;
pub use cancel::CancellationToken;
pub use cancel::NeverCancel;
pub use config::SessionConfig;
pub use error::ArchiveError;
pub use error::QuotaResource;
pub use error::Result;
pub use formats::ArchiveFormat;
pub use report::CollectingReporter;
pub use report::EntryFailure;
pub use report::FailReporter;
pub use report::FailureCategory;
pub use report::LogReporter;
pub use report::NoopProgress;
pub use report::NoopReporter;
pub use report::ProgressCallback;
pub use report::UnpackResult;
pub use report::UnpackStatus;
pub use session::ArchiveSession;
pub use session::SessionState;
pub use tree::ContentTree;
pub use tree::TreeNode;

// Re-export types module for easier access
pub use types::EntryIndex;
pub use types::InnerPath;
pub use types::UnpackRequest;
