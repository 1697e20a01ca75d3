//! Archive session lifecycle.
//!
//! A session owns one archive handle from `open` to `close`. Opening builds
//! the content tree once; afterwards any number of extraction requests can be
//! served, each as a single decode pass. Closing releases the handle exactly
//! once. The tree stays readable after close, extraction does not.
//!
//! # Examples
//!
//! ```
//! use arctree_core::ArchiveSession;
//! use arctree_core::SessionConfig;
//! use arctree_core::UnpackRequest;
//! use arctree_core::test_utils::MemoryArchive;
//!
//! let archive = MemoryArchive::builder()
//!     .file("a.txt", b"alpha")
//!     .file("dir/b.txt", b"bravo")
//!     .build();
//!
//! let mut session = ArchiveSession::new("mem.zip", SessionConfig::default());
//! session.open(archive)?;
//!
//! let index = session.tree().and_then(|t| t.find("dir/b.txt")).and_then(|n| n.entry_index());
//! let request: UnpackRequest = index.into_iter().collect();
//! let result = session.extract(&request)?;
//! assert_eq!(result.len(), 1);
//!
//! session.close()?;
//! # Ok::<(), arctree_core::ArchiveError>(())
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use crate::ArchiveError;
use crate::Result;
use crate::SessionConfig;
use crate::cancel::CancellationSource;
use crate::cancel::NeverCancel;
use crate::extraction::BatchExtractor;
use crate::extraction::TempDirFactory;
use crate::extraction::TempFileFactory;
use crate::formats::detect::open_format;
use crate::formats::traits::ArchiveFormat;
use crate::report::FailReporter;
use crate::report::LogReporter;
use crate::report::NoopProgress;
use crate::report::ProgressCallback;
use crate::report::UnpackResult;
use crate::tree::ContentTree;
use crate::types::EntryIndex;
use crate::types::UnpackRequest;

/// Lifecycle state of an [`ArchiveSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, no handle attached yet.
    Unopened,
    /// Handle attached and tree built.
    Open,
    /// Handle released; terminal.
    Closed,
}

/// Session over one archive handle.
///
/// `A` is the format adapter; sessions opened from a path use
/// `Box<dyn ArchiveFormat>`.
pub struct ArchiveSession<A: ArchiveFormat> {
    display_path: String,
    config: SessionConfig,
    state: SessionState,
    handle: Option<A>,
    tree: Option<ContentTree>,
    broken: bool,
    factory: Arc<dyn TempFileFactory>,
    reporter: Option<Arc<dyn FailReporter>>,
    log_reporter: LogReporter,
    cancel: Arc<dyn CancellationSource>,
}

impl<A: ArchiveFormat> std::fmt::Debug for ArchiveSession<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveSession")
            .field("display_path", &self.display_path)
            .field("state", &self.state)
            .field("broken", &self.broken)
            .finish_non_exhaustive()
    }
}

impl<A: ArchiveFormat> ArchiveSession<A> {
    /// Creates an unopened session.
    ///
    /// `display_path` names the archive in logs, errors and
    /// [`ContentTree::display_path`]; for nested archives it includes the
    /// enclosing archives (`outer.zip/inner.7z`).
    pub fn new(display_path: impl Into<String>, config: SessionConfig) -> Self {
        let display_path = display_path.into();
        Self {
            factory: Arc::new(TempDirFactory::from_config(&config)),
            log_reporter: LogReporter::new(display_path.clone()),
            display_path,
            config,
            state: SessionState::Unopened,
            handle: None,
            tree: None,
            broken: false,
            reporter: None,
            cancel: Arc::new(NeverCancel),
        }
    }

    /// Replaces the temp file factory.
    #[must_use]
    pub fn with_temp_factory(mut self, factory: impl TempFileFactory + 'static) -> Self {
        self.factory = Arc::new(factory);
        self
    }

    /// Replaces the default [`LogReporter`].
    #[must_use]
    pub fn with_reporter(mut self, reporter: impl FailReporter + 'static) -> Self {
        self.reporter = Some(Arc::new(reporter));
        self
    }

    /// Installs a cancellation source polled during tree construction and
    /// extraction.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: impl CancellationSource + 'static) -> Self {
        self.cancel = Arc::new(cancel);
        self
    }

    /// Attaches `handle` and builds the content tree.
    ///
    /// # Errors
    ///
    /// - `EncryptedArchive` if the archive as a whole is encrypted; no tree
    ///   is built
    /// - `Corrupt`, `Cancelled` or `QuotaExceeded` if the tree cannot be
    ///   built
    /// - `SessionClosed` if the session was already closed
    ///
    /// On error the handle is closed and the session ends up `Closed`.
    ///
    /// # Panics
    ///
    /// Panics if the session is already open.
    pub fn open(&mut self, mut handle: A) -> Result<()> {
        match self.state {
            SessionState::Unopened => {}
            SessionState::Open => panic!("archive session {} opened twice", self.display_path),
            SessionState::Closed => {
                log::error!("open called on closed archive session {}", self.display_path);
                return Err(ArchiveError::SessionClosed);
            }
        }

        if handle.is_encrypted() {
            log::warn!("{} is encrypted, skipping", self.display_path);
            self.abandon(handle);
            return Err(ArchiveError::EncryptedArchive {
                path: PathBuf::from(&self.display_path),
            });
        }

        let built = handle.entries().and_then(|entries| {
            ContentTree::build(entries, self.display_path.as_str(), &self.config, &*self.cancel)
        });

        match built {
            Ok(tree) => {
                log::debug!(
                    "opened {} ({}, {} entries{})",
                    self.display_path,
                    handle.format_name(),
                    tree.entry_count(),
                    if handle.is_solid() { ", solid" } else { "" }
                );
                self.tree = Some(tree);
                self.handle = Some(handle);
                self.state = SessionState::Open;
                Ok(())
            }
            Err(e) => {
                log::warn!("failed to read entries of {}: {e}", self.display_path);
                self.abandon(handle);
                Err(e)
            }
        }
    }

    fn abandon(&mut self, mut handle: A) {
        self.state = SessionState::Closed;
        if let Err(e) = handle.close() {
            log::warn!("failed to close {}: {e}", self.display_path);
        }
    }

    /// Current lifecycle state.
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Returns `true` once a decode pass failed structurally; further
    /// extraction requests fail with `Corrupt`.
    pub const fn is_broken(&self) -> bool {
        self.broken
    }

    /// Display path of the archive.
    pub fn display_path(&self) -> &str {
        &self.display_path
    }

    /// Configuration of this session.
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Content tree, once the session was opened successfully.
    pub const fn tree(&self) -> Option<&ContentTree> {
        self.tree.as_ref()
    }

    /// The open handle.
    pub const fn handle(&self) -> Option<&A> {
        self.handle.as_ref()
    }

    /// Extracts every entry of `request` to temp files in one decode pass.
    ///
    /// # Errors
    ///
    /// - `SessionNotOpen` before `open`, `SessionClosed` after `close`
    /// - `InvalidRequest` for unknown indices or folders
    /// - `Corrupt` or `Io` if the decode stream broke; the session is then
    ///   unusable
    ///
    /// Failures of single entries are not errors; see
    /// [`UnpackResult::failures`].
    pub fn extract(&mut self, request: &UnpackRequest) -> Result<UnpackResult> {
        self.extract_with_progress(request, &mut NoopProgress)
    }

    /// Like [`extract`](Self::extract), reporting progress to `progress`.
    pub fn extract_with_progress(
        &mut self,
        request: &UnpackRequest,
        progress: &mut dyn ProgressCallback,
    ) -> Result<UnpackResult> {
        match self.state {
            SessionState::Unopened => return Err(ArchiveError::SessionNotOpen),
            SessionState::Closed => {
                log::error!(
                    "extraction of {} entries requested from closed archive session {}",
                    request.len(),
                    self.display_path
                );
                return Err(ArchiveError::SessionClosed);
            }
            SessionState::Open => {}
        }
        if self.broken {
            return Err(ArchiveError::Corrupt(format!(
                "{} is unreadable after an earlier decode failure",
                self.display_path
            )));
        }

        let (Some(handle), Some(tree)) = (self.handle.as_mut(), self.tree.as_ref()) else {
            return Err(ArchiveError::SessionNotOpen);
        };
        let reporter: &dyn FailReporter = match &self.reporter {
            Some(reporter) => reporter.as_ref(),
            None => &self.log_reporter,
        };
        let extractor =
            BatchExtractor::new(tree, &self.config, &*self.factory, reporter, &*self.cancel);

        match extractor.extract(handle, request, progress) {
            Ok(result) => Ok(result),
            Err(ArchiveError::EncryptedArchive { path }) if path.as_os_str().is_empty() => {
                Err(ArchiveError::EncryptedArchive {
                    path: PathBuf::from(&self.display_path),
                })
            }
            Err(e) => {
                if e.is_fatal_for_handle() {
                    log::error!("{} is no longer readable: {e}", self.display_path);
                    self.broken = true;
                }
                Err(e)
            }
        }
    }

    /// Extracts the archive stored at `index` and runs `f` on a session over
    /// it.
    ///
    /// The child session inherits configuration, temp file factory,
    /// cancellation and any custom reporter. It is closed when `f` returns,
    /// and only then is the temp file of the inner archive deleted.
    ///
    /// # Errors
    ///
    /// - errors of [`extract`](Self::extract)
    /// - the entry's own failure if it could not be extracted
    /// - `Cancelled` if extraction was cancelled
    /// - errors opening the inner archive, or returned by `f`
    pub fn extract_nested<T, F>(&mut self, index: EntryIndex, f: F) -> Result<T>
    where
        F: FnOnce(&mut ArchiveSession<Box<dyn ArchiveFormat>>) -> Result<T>,
    {
        let request: UnpackRequest = std::iter::once(index).collect();
        let mut result = self.extract(&request)?;

        if let Some(failure) = result.failures.pop() {
            return Err(failure.error);
        }
        if result.is_cancelled() {
            return Err(ArchiveError::Cancelled);
        }
        let Some(temp) = result.take(index) else {
            return Err(ArchiveError::Cancelled);
        };

        let inner_path = self
            .tree
            .as_ref()
            .and_then(|tree| tree.node_for(index))
            .map(|node| node.path().as_str().to_string())
            .unwrap_or_default();
        let child_display = format!("{}/{inner_path}", self.display_path);

        let handle = open_format(&temp)?;
        let mut child: ArchiveSession<Box<dyn ArchiveFormat>> =
            ArchiveSession::new(child_display, self.config.clone());
        child.factory = Arc::clone(&self.factory);
        child.reporter = self.reporter.clone();
        child.cancel = Arc::clone(&self.cancel);

        let outcome = child.open(handle).and_then(|()| f(&mut child));
        let closed = child.close();
        drop(child);
        drop(temp);

        let value = outcome?;
        closed?;
        Ok(value)
    }

    /// Releases the handle.
    ///
    /// Safe to call in any state; only the first call has an effect.
    ///
    /// # Errors
    ///
    /// Returns the handle's error if releasing it failed. The session is
    /// closed either way.
    pub fn close(&mut self) -> Result<()> {
        if self.state == SessionState::Closed {
            return Ok(());
        }
        self.state = SessionState::Closed;

        if let Some(mut handle) = self.handle.take() {
            handle.close()?;
            log::debug!("closed {}", self.display_path);
        }
        Ok(())
    }
}

impl ArchiveSession<Box<dyn ArchiveFormat>> {
    /// Detects the format of the file at `path` and opens this session over
    /// it.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedFormat`, `Io` or `Corrupt` if no handle can be
    /// created, and any error of [`open`](Self::open).
    pub fn open_path(&mut self, path: &std::path::Path) -> Result<()> {
        let handle = open_format(path)?;
        self.open(handle)
    }
}

impl<A: ArchiveFormat> Drop for ArchiveSession<A> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("failed to close {}: {e}", self.display_path);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cancel::CancellationToken;
    use crate::report::CollectingReporter;
    use crate::test_utils::FailingFactory;
    use crate::test_utils::MemoryArchive;
    use crate::test_utils::create_test_zip;

    fn scenario() -> MemoryArchive {
        MemoryArchive::builder()
            .file("a.txt", b"alpha")
            .file("dir/b.txt", b"bravo")
            .file("dir/c.txt", b"charlie")
            .build()
    }

    fn request(indices: &[usize]) -> UnpackRequest {
        indices.iter().copied().collect()
    }

    #[test]
    fn test_open_extract_close() {
        let archive = scenario();
        let counters = archive.counters();
        let mut session = ArchiveSession::new("mem.zip", SessionConfig::default());
        assert_eq!(session.state(), SessionState::Unopened);

        session.open(archive).unwrap();
        assert_eq!(session.state(), SessionState::Open);
        assert_eq!(session.tree().unwrap().entry_count(), 3);
        assert_eq!(counters.finish_count(), 1);

        let result = session.extract(&request(&[1, 2])).unwrap();
        assert_eq!(
            std::fs::read(result.get(EntryIndex::new(2)).unwrap()).unwrap(),
            b"charlie"
        );

        session.close().unwrap();
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(counters.close_count(), 1);
        assert!(session.tree().is_some());
    }

    #[test]
    fn test_extract_before_open() {
        let mut session = ArchiveSession::<MemoryArchive>::new("x.zip", SessionConfig::default());
        assert!(matches!(
            session.extract(&request(&[0])),
            Err(ArchiveError::SessionNotOpen)
        ));
    }

    #[test]
    fn test_extract_after_close_fails_loudly() {
        let mut session = ArchiveSession::new("mem.zip", SessionConfig::default());
        session.open(scenario()).unwrap();
        session.close().unwrap();

        assert!(matches!(
            session.extract(&request(&[0])),
            Err(ArchiveError::SessionClosed)
        ));
        assert!(matches!(
            session.extract(&UnpackRequest::new()),
            Err(ArchiveError::SessionClosed)
        ));
    }

    #[test]
    fn test_close_is_idempotent_and_drop_closes_once() {
        let archive = scenario();
        let counters = archive.counters();
        {
            let mut session = ArchiveSession::new("mem.zip", SessionConfig::default());
            session.open(archive).unwrap();
            session.close().unwrap();
            session.close().unwrap();
        }
        assert_eq!(counters.close_count(), 1);

        let archive = scenario();
        let counters = archive.counters();
        {
            let mut session = ArchiveSession::new("mem.zip", SessionConfig::default());
            session.open(archive).unwrap();
        }
        assert_eq!(counters.close_count(), 1);
    }

    #[test]
    fn test_close_unopened_session() {
        let mut session = ArchiveSession::<MemoryArchive>::new("x.zip", SessionConfig::default());
        session.close().unwrap();
        assert_eq!(session.state(), SessionState::Closed);
        assert!(matches!(session.open(scenario()), Err(ArchiveError::SessionClosed)));
    }

    #[test]
    #[should_panic(expected = "opened twice")]
    fn test_open_twice_panics() {
        let mut session = ArchiveSession::new("mem.zip", SessionConfig::default());
        session.open(scenario()).unwrap();
        let _ = session.open(scenario());
    }

    #[test]
    fn test_encrypted_archive_rejected_before_tree() {
        let archive = MemoryArchive::builder().file("a", b"1").encrypted().build();
        let counters = archive.counters();
        let mut session = ArchiveSession::new("secret.7z", SessionConfig::default());

        let err = session.open(archive).unwrap_err();
        assert!(matches!(err, ArchiveError::EncryptedArchive { ref path } if path.ends_with("secret.7z")));
        assert!(session.tree().is_none());
        assert_eq!(counters.finish_count(), 0);
        assert_eq!(counters.close_count(), 1);
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn test_corrupt_listing_closes_handle() {
        let archive = MemoryArchive::builder()
            .file("a", b"1")
            .file("b", b"2")
            .corrupt_listing_at(1)
            .build();
        let counters = archive.counters();
        let mut session = ArchiveSession::new("bad.zip", SessionConfig::default());

        assert!(matches!(session.open(archive), Err(ArchiveError::Corrupt(_))));
        assert_eq!(counters.finish_count(), 1);
        assert_eq!(counters.close_count(), 1);
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn test_cancelled_open() {
        let token = CancellationToken::new();
        token.cancel();
        let archive = scenario();
        let counters = archive.counters();
        let mut session =
            ArchiveSession::new("mem.zip", SessionConfig::default()).with_cancellation(token);

        assert!(matches!(session.open(archive), Err(ArchiveError::Cancelled)));
        assert_eq!(counters.finish_count(), 1);
        assert_eq!(counters.close_count(), 1);
    }

    #[test]
    fn test_corrupt_stream_breaks_session() {
        let archive = MemoryArchive::builder()
            .file("a", b"1")
            .file("b", b"2")
            .corrupt_stream_at(1)
            .build();
        let counters = archive.counters();
        let mut session = ArchiveSession::new("bad.tar", SessionConfig::default());
        session.open(archive).unwrap();

        assert!(matches!(
            session.extract(&request(&[0, 1])),
            Err(ArchiveError::Corrupt(_))
        ));
        assert!(session.is_broken());
        assert!(matches!(
            session.extract(&request(&[0])),
            Err(ArchiveError::Corrupt(_))
        ));
        assert_eq!(counters.pass_count(), 1);
    }

    #[test]
    fn test_custom_reporter_and_factory() {
        let dir = tempfile::tempdir().unwrap();
        let reporter = CollectingReporter::new();
        let mut session = ArchiveSession::new("mem.zip", SessionConfig::default())
            .with_temp_factory(FailingFactory::new(dir.path(), "a.txt"))
            .with_reporter(reporter.clone());
        session.open(scenario()).unwrap();

        let result = session.extract(&request(&[0, 1, 2])).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(reporter.len(), 1);
        assert_eq!(reporter.records()[0].path, "a.txt");
    }

    #[test]
    fn test_extract_nested_zip() {
        let inner = create_test_zip(&[("deep/note.txt", b"nested hello")]);
        let archive = MemoryArchive::builder()
            .file("readme.txt", b"outer")
            .file("bundle/inner.zip", &inner)
            .build();
        let dir = tempfile::tempdir().unwrap();
        let config = SessionConfig::default().with_temp_dir(dir.path());
        let mut session = ArchiveSession::new("outer.tar", config);
        session.open(archive).unwrap();

        let content = session
            .extract_nested(EntryIndex::new(1), |child| {
                assert_eq!(child.display_path(), "outer.tar/bundle/inner.zip");
                let tree = child.tree().unwrap();
                let node = tree.find("deep/note.txt").unwrap();
                assert_eq!(tree.display_path(node), "outer.tar/bundle/inner.zip/deep/note.txt");

                let request: UnpackRequest = node.entry_index().into_iter().collect();
                let mut result = child.extract(&request)?;
                let temp = result.take(EntryIndex::new(0)).unwrap();
                Ok(std::fs::read(&temp)?)
            })
            .unwrap();

        assert_eq!(content, b"nested hello");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_extract_nested_not_an_archive() {
        let mut session = ArchiveSession::new("outer.tar", SessionConfig::default());
        session.open(scenario()).unwrap();

        let result = session.extract_nested(EntryIndex::new(0), |_| Ok(()));
        assert!(matches!(result, Err(ArchiveError::UnsupportedFormat)));
    }
}
