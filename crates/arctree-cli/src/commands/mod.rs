//! Subcommand implementations.

pub mod completion;
pub mod extract;
pub mod list;
pub mod tree;

use crate::error::add_archive_context;
use anyhow::Result;
use arctree_core::ArchiveFormat;
use arctree_core::ArchiveSession;
use arctree_core::SessionConfig;
use arctree_core::api::display_path_for;
use std::path::Path;

type Session = ArchiveSession<Box<dyn ArchiveFormat>>;

/// Opens `archive` and builds its content tree, converting failures into
/// user-facing errors.
fn open_session(archive: &Path, mut session: Session) -> Result<Session> {
    add_archive_context(session.open_path(archive), archive)?;
    Ok(session)
}

/// A fresh, unopened session for `archive`.
fn new_session(archive: &Path, config: SessionConfig) -> Session {
    ArchiveSession::new(display_path_for(archive, None), config)
}
