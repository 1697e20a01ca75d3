//! Integration tests for 7z archives through sessions.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use arctree_core::CancellationToken;
use arctree_core::EntryIndex;
use arctree_core::ProgressCallback;
use arctree_core::SessionConfig;
use arctree_core::UnpackRequest;
use arctree_core::UnpackStatus;
use arctree_core::formats::SevenZArchive;
use arctree_core::formats::traits::ArchiveFormat;
use arctree_core::open_archive;
use arctree_core::session::ArchiveSession;
use arctree_core::test_utils::SevenZTestBuilder;
use arctree_core::test_utils::create_test_7z;
use arctree_core::test_utils::create_test_zip;
use std::io::Cursor;
use std::path::Path;
use tempfile::TempDir;

fn mailbox(solid: bool) -> Vec<u8> {
    SevenZTestBuilder::new()
        .solid(solid)
        .add_directory("inbox")
        .add_file("inbox/001.eml", b"From: a\n\nhello")
        .add_file("inbox/002.eml", b"From: b\n\nworld")
        .add_directory("inbox/empty")
        .add_file("notes.txt", b"remember the milk")
        .build()
}

#[test]
fn test_7z_session_tree() {
    let mut session = ArchiveSession::new("mail.7z", SessionConfig::default());
    session
        .open(SevenZArchive::new(Cursor::new(mailbox(true))).unwrap())
        .unwrap();

    assert!(session.handle().unwrap().is_solid());
    let tree = session.tree().unwrap();
    assert_eq!(tree.entry_count(), 5);

    let inbox = tree.find("inbox").unwrap();
    assert!(inbox.is_folder());
    assert!(!inbox.is_implicit());
    let names: Vec<_> = tree.children(inbox.id()).map(|n| n.name().to_string()).collect();
    assert_eq!(names, vec!["001.eml", "002.eml", "empty"]);
}

#[test]
fn test_7z_batch_extraction_solid_and_not() {
    for solid in [true, false] {
        let temp = TempDir::new().unwrap();
        let config = SessionConfig::default().with_temp_dir(temp.path());
        let mut session = ArchiveSession::new("mail.7z", config);
        session
            .open(SevenZArchive::new(Cursor::new(mailbox(solid))).unwrap())
            .unwrap();

        let request: UnpackRequest = session.tree().unwrap().file_indices().collect();
        assert_eq!(request.len(), 3);
        let result = session.extract(&request).unwrap();

        assert!(!result.has_failures(), "solid = {solid}: {:?}", result.failures);
        assert_eq!(
            std::fs::read(result.get(EntryIndex::new(2)).unwrap()).unwrap(),
            b"From: b\n\nworld"
        );
        assert_eq!(
            std::fs::read(result.get(EntryIndex::new(4)).unwrap()).unwrap(),
            b"remember the milk"
        );
    }
}

#[test]
fn test_7z_subset_never_produces_other_entries() {
    let temp = TempDir::new().unwrap();
    let config = SessionConfig::default().with_temp_dir(temp.path());
    let mut session = ArchiveSession::new("mail.7z", config);
    session
        .open(SevenZArchive::new(Cursor::new(mailbox(true))).unwrap())
        .unwrap();

    let request: UnpackRequest = [1usize].into_iter().collect();
    let result = session.extract(&request).unwrap();

    assert_eq!(result.files.keys().copied().collect::<Vec<_>>(), vec![EntryIndex::new(1)]);
    assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 1);
}

/// Cancels the token once the first entry has been written.
struct CancelOnFirst(CancellationToken);

impl ProgressCallback for CancelOnFirst {
    fn on_entry_start(&mut self, _path: &Path, _total: usize, _current: usize) {}
    fn on_bytes_written(&mut self, _bytes: u64) {}
    fn on_entry_complete(&mut self, _path: &Path) {
        self.0.cancel();
    }
    fn on_complete(&mut self) {}
}

#[test]
fn test_7z_cancel_inside_solid_block() {
    let temp = TempDir::new().unwrap();
    let token = CancellationToken::new();
    let config = SessionConfig::default().with_temp_dir(temp.path());
    let mut session = ArchiveSession::new("mail.7z", config).with_cancellation(token.clone());
    session
        .open(SevenZArchive::new(Cursor::new(mailbox(true))).unwrap())
        .unwrap();

    let request: UnpackRequest = [1usize, 2, 4].into_iter().collect();
    let result = session
        .extract_with_progress(&request, &mut CancelOnFirst(token))
        .unwrap();

    assert_eq!(result.status, UnpackStatus::Cancelled);
    assert!(result.failures.is_empty());
    assert_eq!(result.files.keys().copied().collect::<Vec<_>>(), vec![EntryIndex::new(1)]);
    assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 1);
}

#[test]
fn test_7z_empty_file_between_blocks() {
    let data = SevenZTestBuilder::new()
        .add_file("a.txt", b"alpha")
        .add_file("empty.txt", b"")
        .add_directory("d")
        .add_file("b.txt", b"bravo")
        .build();
    let temp = TempDir::new().unwrap();
    let config = SessionConfig::default().with_temp_dir(temp.path());
    let mut session = ArchiveSession::new("gaps.7z", config);
    session.open(SevenZArchive::new(Cursor::new(data)).unwrap()).unwrap();

    let request: UnpackRequest = session.tree().unwrap().file_indices().collect();
    assert_eq!(request.len(), 3);
    let result = session.extract(&request).unwrap();

    assert!(!result.has_failures(), "{:?}", result.failures);
    assert_eq!(std::fs::read(result.get(EntryIndex::new(0)).unwrap()).unwrap(), b"alpha");
    assert!(std::fs::read(result.get(EntryIndex::new(1)).unwrap()).unwrap().is_empty());
    assert_eq!(std::fs::read(result.get(EntryIndex::new(3)).unwrap()).unwrap(), b"bravo");
}

#[test]
fn test_7z_opened_from_disk() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("docs.7z");
    std::fs::write(&path, create_test_7z(&[("a.txt", b"one"), ("b/c.txt", b"two")])).unwrap();

    let mut session = open_archive(&path, None, SessionConfig::default()).unwrap();
    assert_eq!(session.tree().unwrap().entry_count(), 2);

    let request: UnpackRequest = [1usize].into_iter().collect();
    let result = session.extract(&request).unwrap();
    assert_eq!(std::fs::read(result.get(EntryIndex::new(1)).unwrap()).unwrap(), b"two");
}

#[test]
fn test_zip_nested_in_7z() {
    let temp = TempDir::new().unwrap();
    let inner = create_test_zip(&[("scan.pdf", b"%PDF-1.4")]);
    let path = temp.path().join("outer.7z");
    std::fs::write(
        &path,
        create_test_7z(&[("readme.txt", b"hi"), ("attachments/scans.zip", &inner)]),
    )
    .unwrap();

    let config = SessionConfig::default().with_temp_dir(temp.path());
    let mut session = open_archive(&path, None, config).unwrap();

    let content = session
        .extract_nested(EntryIndex::new(1), |child| {
            let request: UnpackRequest = [0usize].into_iter().collect();
            let result = child.extract(&request)?;
            Ok(std::fs::read(result.get(EntryIndex::new(0)).unwrap())?)
        })
        .unwrap();

    assert_eq!(content, b"%PDF-1.4");
}
