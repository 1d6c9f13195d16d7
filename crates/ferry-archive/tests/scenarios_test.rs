//! Concrete split scenarios and abort handling.

use ferry_archive::{
    discover_segments, extract_all, list_entries, read_manifest, sha256_file, split,
    ArchiveError, ArchiveOptions, ArchiveOptionsOverrides, ArchiveResult, ChecksumManifest,
    CleanupPolicy, Codec, EntryKind, Segment, SegmentObserver, SourceRoot, Splitter,
    MANIFEST_FILE_NAME,
};
use std::fs;
use std::path::PathBuf;

fn names(codec: Codec, segment: &Segment) -> Vec<String> {
    list_entries(codec, &segment.path)
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect()
}

#[test]
fn three_files_budget_1000() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    fs::create_dir(&src).unwrap();
    fs::write(src.join("a"), vec![1u8; 800]).unwrap();
    fs::write(src.join("b"), vec![2u8; 300]).unwrap();
    fs::write(src.join("c"), vec![3u8; 50]).unwrap();

    let options = ArchiveOptions::new("bundle", 1000);
    let outcome = split(Codec::Tar, &dir.path().join("out"), &options, &src).unwrap();

    assert_eq!(outcome.segments.len(), 2);
    assert_eq!(outcome.records.len(), 2);
    assert_eq!(outcome.segments[0].written_bytes, 800);
    assert_eq!(outcome.segments[1].written_bytes, 350);
    assert_eq!(names(Codec::Tar, &outcome.segments[0]), ["src", "src/a"]);
    assert_eq!(names(Codec::Tar, &outcome.segments[1]), ["src/b", "src/c"]);
}

#[test]
fn single_oversized_file() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    fs::create_dir(&src).unwrap();
    fs::write(src.join("big"), vec![9u8; 5000]).unwrap();

    let options = ArchiveOptions::new("bundle", 1000);
    let outcome = split(Codec::Tar, &dir.path().join("out"), &options, &src).unwrap();

    assert_eq!(outcome.segments.len(), 1);
    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.segments[0].written_bytes, 5000);
    assert_eq!(names(Codec::Tar, &outcome.segments[0]), ["src", "src/big"]);
}

#[test]
fn empty_directory_still_produces_a_segment() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    fs::create_dir(&src).unwrap();

    let codec = Codec::select(".tar.zst").unwrap();
    let options = ArchiveOptions::new("bundle", 1000);
    let outcome = split(codec, &dir.path().join("out"), &options, &src).unwrap();

    assert_eq!(outcome.segments.len(), 1);
    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.segments[0].written_bytes, 0);
    let entries = list_entries(codec, &outcome.segments[0].path).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].kind, EntryKind::Directory);
}

#[test]
fn missing_source_fails_before_any_output() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let err = split(Codec::Tar, &out, &ArchiveOptions::default(), &dir.path().join("absent"))
        .unwrap_err();

    assert!(matches!(err, ArchiveError::Path { .. }));
    assert!(err.is_precondition());
    assert!(!out.exists());
}

#[test]
fn unsupported_extension_is_rejected() {
    let err = Codec::select(".zip").unwrap_err();
    assert!(matches!(
        err,
        ArchiveError::UnsupportedFormat { ref extension } if extension == ".zip"
    ));
    assert_eq!(err.exit_code(), 2);
}

/// Fails once `fail_at` segments have been reported.
struct FailingObserver {
    seen: Vec<PathBuf>,
    fail_at: usize,
}

impl SegmentObserver for FailingObserver {
    fn segment_finalized(&mut self, segment: &Segment) -> ArchiveResult<()> {
        self.seen.push(segment.path.clone());
        if self.seen.len() == self.fail_at {
            return Err(ArchiveError::Io {
                path: segment.path.clone(),
                operation: "checksum",
                source: std::io::Error::other("injected"),
            });
        }
        Ok(())
    }
}

fn aborted_run(policy: CleanupPolicy) -> (tempfile::TempDir, Vec<PathBuf>) {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    fs::create_dir(&src).unwrap();
    for name in ["a", "b", "c"] {
        fs::write(src.join(name), vec![0u8; 600]).unwrap();
    }

    let options = ArchiveOptions::new("bundle", 1000).with_cleanup(policy);
    let splitter = Splitter::new(Codec::Tar, dir.path().join("out"), options).unwrap();
    let source = SourceRoot::resolve(&src).unwrap();
    splitter.prepare_destination(&source).unwrap();

    let mut observer = FailingObserver {
        seen: Vec::new(),
        fail_at: 2,
    };
    let err = splitter.run(&source, &mut observer).unwrap_err();
    assert!(matches!(err, ArchiveError::Io { .. }));
    (dir, observer.seen)
}

#[test]
fn abort_keeps_output_by_default() {
    let (_dir, seen) = aborted_run(CleanupPolicy::Keep);
    assert_eq!(seen.len(), 2);
    assert!(seen.iter().all(|p| p.exists()));
}

#[test]
fn abort_removes_output_when_asked() {
    let (dir, seen) = aborted_run(CleanupPolicy::Remove);
    assert_eq!(seen.len(), 2);
    assert!(seen.iter().all(|p| !p.exists()));
    assert_eq!(fs::read_dir(dir.path().join("out")).unwrap().count(), 0);
}

#[test]
fn options_loaded_from_yaml_drive_the_split() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    fs::create_dir(&src).unwrap();
    fs::write(src.join("a"), vec![0u8; 10]).unwrap();
    fs::write(src.join("b"), vec![0u8; 10]).unwrap();

    let overrides =
        ArchiveOptionsOverrides::from_yaml_str("prefix: release\nmax_segment_bytes: 15\n").unwrap();
    let options = ArchiveOptions::default().apply(overrides);
    let outcome = split(Codec::Tar, &dir.path().join("out"), &options, &src).unwrap();

    assert_eq!(outcome.segments.len(), 2);
    assert!(outcome.segments[1].path.ends_with("release_000001.tar"));
}

/// Records checksums like `split` does, then shrinks a file the walk has
/// already sized but not yet written.
struct ShrinkAfterFirstSegment {
    manifest: ChecksumManifest,
    victim: PathBuf,
}

impl SegmentObserver for ShrinkAfterFirstSegment {
    fn segment_finalized(&mut self, segment: &Segment) -> ArchiveResult<()> {
        self.manifest.segment_finalized(segment)?;
        if segment.ordinal == 0 {
            fs::write(&self.victim, b"short").unwrap();
        }
        Ok(())
    }
}

#[test]
fn walk_failure_keeps_closed_segments_and_their_records() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    fs::create_dir(&src).unwrap();
    fs::write(src.join("a"), vec![1u8; 600]).unwrap();
    fs::write(src.join("b"), vec![2u8; 600]).unwrap();

    let out = dir.path().join("out");
    let splitter = Splitter::new(Codec::Tar, &out, ArchiveOptions::new("bundle", 1000)).unwrap();
    let source = SourceRoot::resolve(&src).unwrap();
    splitter.prepare_destination(&source).unwrap();

    let mut observer = ShrinkAfterFirstSegment {
        manifest: ChecksumManifest::create(&out).unwrap(),
        victim: src.join("b"),
    };
    let err = splitter.run(&source, &mut observer).unwrap_err();
    drop(observer);

    assert!(err.is_walk(), "expected a walk error, got {err}");
    assert!(matches!(err, ArchiveError::Walk { ref path, .. } if path == &src.join("b")));

    let first = out.join("bundle_000000.tar");
    assert!(first.exists());
    let records = read_manifest(&out.join(MANIFEST_FILE_NAME)).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].path, first);
    assert_eq!(records[0].digest, sha256_file(&first).unwrap());
}

#[test]
fn resplit_into_same_directory_drops_stale_segments() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    fs::create_dir(&src).unwrap();
    for name in ["a", "b", "c"] {
        fs::write(src.join(name), vec![b'x'; 600]).unwrap();
    }

    let out = dir.path().join("out");
    let options = ArchiveOptions::new("bundle", 1000);
    assert_eq!(split(Codec::Tar, &out, &options, &src).unwrap().segments.len(), 3);

    fs::remove_file(src.join("b")).unwrap();
    fs::remove_file(src.join("c")).unwrap();
    let outcome = split(Codec::Tar, &out, &options, &src).unwrap();
    assert_eq!(outcome.segments.len(), 1);

    let found = discover_segments(&out, "bundle", Codec::Tar).unwrap();
    assert_eq!(found, outcome.segment_paths());

    let dest = dir.path().join("restore");
    extract_all(Codec::Tar, &out, "bundle", &dest).unwrap();
    assert!(dest.join("src/a").exists());
    assert!(!dest.join("src/b").exists());
    assert!(!dest.join("src/c").exists());
}
