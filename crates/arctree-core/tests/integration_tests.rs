//! Integration tests for arctree-core.
//!
//! These tests open real archives from disk and check the whole path from
//! format detection through tree construction to batch extraction.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use arctree_core::ArchiveError;
use arctree_core::CancellationToken;
use arctree_core::CollectingReporter;
use arctree_core::EntryIndex;
use arctree_core::ProgressCallback;
use arctree_core::SessionConfig;
use arctree_core::SessionState;
use arctree_core::UnpackRequest;
use arctree_core::UnpackStatus;
use arctree_core::open_archive;
use arctree_core::session::ArchiveSession;
use arctree_core::test_utils::TarTestBuilder;
use arctree_core::test_utils::ZipTestBuilder;
use arctree_core::test_utils::create_test_tar;
use arctree_core::test_utils::create_test_zip;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use tempfile::TempDir;

const SCENARIO: &[(&str, &[u8])] = &[
    ("a.txt", b"alpha"),
    ("dir/b.txt", b"bravo"),
    ("dir/c.txt", b"charlie"),
];

fn write_archive(dir: &TempDir, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, data).unwrap();
    path
}

fn config_in(dir: &Path) -> SessionConfig {
    SessionConfig::default().with_temp_dir(dir)
}

fn all_files(session: &ArchiveSession<Box<dyn arctree_core::ArchiveFormat>>) -> UnpackRequest {
    session.tree().unwrap().file_indices().collect()
}

fn compressed_tars() -> Vec<(&'static str, Vec<u8>)> {
    let tar = create_test_tar(SCENARIO);

    let mut gz = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    gz.write_all(&tar).unwrap();
    let mut bz = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
    bz.write_all(&tar).unwrap();
    let mut xz = xz2::write::XzEncoder::new(Vec::new(), 6);
    xz.write_all(&tar).unwrap();

    vec![
        ("scenario.tar", tar.clone()),
        ("scenario.tar.gz", gz.finish().unwrap()),
        ("scenario.tar.bz2", bz.finish().unwrap()),
        ("scenario.tar.xz", xz.finish().unwrap()),
        ("scenario.tar.zst", zstd::encode_all(&tar[..], 0).unwrap()),
    ]
}

#[test]
fn test_scenario_tree_shape_from_zip() {
    let temp = TempDir::new().unwrap();
    let path = write_archive(&temp, "scenario.zip", &create_test_zip(SCENARIO));

    let session = open_archive(&path, None, config_in(temp.path())).unwrap();
    let tree = session.tree().unwrap();

    let top: Vec<_> = tree.children(tree.root().id()).map(|n| n.name().to_string()).collect();
    assert_eq!(top, vec!["a.txt", "dir"]);

    let dir = tree.find("dir").unwrap();
    assert!(dir.is_folder());
    assert!(dir.is_implicit());
    let inner: Vec<_> = tree.children(dir.id()).map(|n| n.name().to_string()).collect();
    assert_eq!(inner, vec!["b.txt", "c.txt"]);

    assert_eq!(tree.node_for(EntryIndex::new(2)).unwrap().path().as_str(), "dir/c.txt");
}

#[test]
fn test_zip_extract_subset() {
    let temp = TempDir::new().unwrap();
    let path = write_archive(&temp, "scenario.zip", &create_test_zip(SCENARIO));
    let mut session = open_archive(&path, None, config_in(temp.path())).unwrap();

    let request: UnpackRequest = [1usize, 2].into_iter().collect();
    let result = session.extract(&request).unwrap();

    assert_eq!(result.len(), 2);
    assert!(result.get(EntryIndex::new(0)).is_none());
    assert_eq!(fs::read(result.get(EntryIndex::new(1)).unwrap()).unwrap(), b"bravo");
    assert_eq!(fs::read(result.get(EntryIndex::new(2)).unwrap()).unwrap(), b"charlie");
}

#[test]
fn test_every_tar_codec_round_trips() {
    for (name, data) in compressed_tars() {
        let temp = TempDir::new().unwrap();
        let path = write_archive(&temp, name, &data);
        let mut session = open_archive(&path, None, config_in(temp.path())).unwrap();
        assert_eq!(session.tree().unwrap().entry_count(), 3, "{name}");

        let request = all_files(&session);
        let result = session.extract(&request).unwrap();
        assert_eq!(result.len(), 3, "{name}");
        for (i, (_, content)) in SCENARIO.iter().enumerate() {
            let file = result.get(EntryIndex::new(i)).unwrap();
            assert_eq!(fs::read(file).unwrap(), *content, "{name} #{i}");
        }
    }
}

#[test]
fn test_extracted_sizes_match_declared_sizes() {
    let temp = TempDir::new().unwrap();
    let big = vec![0xA5u8; 200_000];
    let data = ZipTestBuilder::new()
        .add_deflated_file("big.bin", &big)
        .add_file("empty.txt", b"")
        .add_deflated_file("text.txt", b"some text, compressed")
        .build();
    let path = write_archive(&temp, "sizes.zip", &data);
    let mut session = open_archive(&path, None, config_in(temp.path())).unwrap();

    let request = all_files(&session);
    let result = session.extract(&request).unwrap();
    let tree = session.tree().unwrap();

    for (index, file) in &result.files {
        let declared = tree.node_for(*index).unwrap().size();
        assert_eq!(fs::metadata(file).unwrap().len(), declared);
    }
    assert_eq!(result.bytes_written, tree.total_size());
}

#[test]
fn test_repeated_extraction_is_independent() {
    let temp = TempDir::new().unwrap();
    let path = write_archive(&temp, "scenario.tar", &create_test_tar(SCENARIO));
    let mut session = open_archive(&path, None, config_in(temp.path())).unwrap();
    let request: UnpackRequest = [0usize, 2].into_iter().collect();

    let first = session.extract(&request).unwrap();
    let second = session.extract(&request).unwrap();

    for index in request.iter() {
        let a = first.get(index).unwrap();
        let b = second.get(index).unwrap();
        assert_ne!(a, b);
        assert_eq!(fs::read(a).unwrap(), fs::read(b).unwrap());
    }
}

#[test]
fn test_temp_files_deleted_with_result() {
    let temp = TempDir::new().unwrap();
    let archive_dir = TempDir::new().unwrap();
    let path = write_archive(&archive_dir, "scenario.zip", &create_test_zip(SCENARIO));
    let mut session = open_archive(&path, None, config_in(temp.path())).unwrap();

    let mut result = session.extract(&all_files(&session)).unwrap();
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 3);

    let kept = result.take(EntryIndex::new(0)).unwrap();
    drop(result);
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 1);

    let kept = kept.keep().unwrap();
    assert!(kept.exists());
}

#[test]
fn test_temp_file_names_keep_entry_name() {
    let temp = TempDir::new().unwrap();
    let path = write_archive(&temp, "scenario.zip", &create_test_zip(SCENARIO));
    let mut session = open_archive(&path, None, config_in(temp.path())).unwrap();

    let request: UnpackRequest = [1usize].into_iter().collect();
    let result = session.extract(&request).unwrap();
    let name = result
        .get(EntryIndex::new(1))
        .unwrap()
        .file_name()
        .unwrap()
        .to_string_lossy()
        .into_owned();
    assert!(name.starts_with("arctree-"), "{name}");
    assert!(name.ends_with("b.txt"), "{name}");
}

#[test]
fn test_nested_zip_inside_tar() {
    let temp = TempDir::new().unwrap();
    let inner = create_test_zip(&[("report/q1.txt", b"numbers"), ("report/q2.txt", b"more")]);
    let outer = TarTestBuilder::new()
        .add_directory("attachments/")
        .add_file("attachments/reports.zip", &inner)
        .add_file("body.txt", b"see attached")
        .build();
    let path = write_archive(&temp, "mail.tar", &outer);
    let mut session = open_archive(&path, None, config_in(temp.path())).unwrap();

    let index = session
        .tree()
        .unwrap()
        .find("attachments/reports.zip")
        .unwrap()
        .entry_index()
        .unwrap();

    let (display, contents) = session
        .extract_nested(index, |child| {
            let request = child.tree().unwrap().file_indices().collect();
            let result = child.extract(&request)?;
            let mut contents = Vec::new();
            for file in result.files.values() {
                contents.push(fs::read(file)?);
            }
            Ok((child.display_path().to_string(), contents))
        })
        .unwrap();

    assert!(display.ends_with("mail.tar/attachments/reports.zip"), "{display}");
    assert_eq!(contents, vec![b"numbers".to_vec(), b"more".to_vec()]);

    // only the outer archive is left in the directory
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 1);
}

#[test]
fn test_corrupt_tar_stream_breaks_session() {
    let temp = TempDir::new().unwrap();
    let data = create_test_tar(&[("a.bin", &[1u8; 4096][..]), ("b.bin", &[2u8; 4096][..])]);
    let path = write_archive(&temp, "broken.tar", &data);
    let mut session = open_archive(&path, None, config_in(temp.path())).unwrap();

    // truncate after the tree was built
    fs::write(&path, &data[..3000]).unwrap();

    let request: UnpackRequest = [0usize, 1].into_iter().collect();
    let err = session.extract(&request).unwrap_err();
    assert!(err.is_fatal_for_handle(), "{err}");
    assert!(session.is_broken());

    let err = session.extract(&request).unwrap_err();
    assert!(matches!(err, ArchiveError::Corrupt(_)));
}

#[test]
fn test_corrupt_zip_fails_to_open() {
    let temp = TempDir::new().unwrap();
    let mut data = create_test_zip(SCENARIO);
    data.truncate(data.len() / 2);
    let path = write_archive(&temp, "half.zip", &data);

    let result = open_archive(&path, None, config_in(temp.path()));
    assert!(matches!(result, Err(ArchiveError::Corrupt(_))));
}

#[test]
fn test_entry_count_quota() {
    let temp = TempDir::new().unwrap();
    let path = write_archive(&temp, "scenario.zip", &create_test_zip(SCENARIO));
    let config = SessionConfig {
        max_entry_count: 2,
        ..config_in(temp.path())
    };

    let result = open_archive(&path, None, config);
    assert!(matches!(result, Err(ArchiveError::QuotaExceeded { .. })));
}

#[test]
fn test_cancellation_mid_batch() {
    struct CancelAfter {
        token: CancellationToken,
        after: usize,
        seen: usize,
    }

    impl ProgressCallback for CancelAfter {
        fn on_entry_start(&mut self, _path: &Path, _total: usize, _current: usize) {}
        fn on_bytes_written(&mut self, _bytes: u64) {}
        fn on_entry_complete(&mut self, _path: &Path) {
            self.seen += 1;
            if self.seen == self.after {
                self.token.cancel();
            }
        }
        fn on_complete(&mut self) {}
    }

    let temp = TempDir::new().unwrap();
    let archive_dir = TempDir::new().unwrap();
    let names: Vec<String> = (0..100).map(|i| format!("f{i:03}.txt")).collect();
    let entries: Vec<(&str, &[u8])> = names.iter().map(|n| (n.as_str(), &b"payload"[..])).collect();
    let path = write_archive(&archive_dir, "many.zip", &create_test_zip(&entries));

    let token = CancellationToken::new();
    let mut session = ArchiveSession::new("many.zip", config_in(temp.path()))
        .with_cancellation(token.clone());
    session.open_path(&path).unwrap();

    let request = all_files(&session);
    let mut progress = CancelAfter {
        token,
        after: 10,
        seen: 0,
    };
    let result = session.extract_with_progress(&request, &mut progress).unwrap();

    assert_eq!(result.status, UnpackStatus::Cancelled);
    assert!(result.len() <= 10);
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), result.len());
    assert_eq!(session.state(), SessionState::Open);
}

#[test]
fn test_custom_reporter_sees_nothing_on_success() {
    let temp = TempDir::new().unwrap();
    let path = write_archive(&temp, "scenario.zip", &create_test_zip(SCENARIO));
    let reporter = CollectingReporter::new();
    let mut session =
        ArchiveSession::new("scenario.zip", config_in(temp.path())).with_reporter(reporter.clone());
    session.open_path(&path).unwrap();

    let result = session.extract(&all_files(&session)).unwrap();
    assert!(!result.has_failures());
    assert!(reporter.is_empty());
}
