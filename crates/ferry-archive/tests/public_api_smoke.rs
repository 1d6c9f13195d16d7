//! Compile-test for the crate facade: ensures public API symbols are re-exported.

use std::path::Path;

#[test]
fn public_api_smoke() {
    use ferry_archive::{
        create_archive, discover_segments, extract, extract_all, list_entries, name_in_archive,
        read_manifest, segment_file_name, segment_path, sha256_file, split, verify, verify_report,
        ArchiveEntry, ArchiveError, ArchiveOptions, ArchiveOptionsOverrides, ChecksumManifest,
        CleanupPolicy, Codec, CodecPolicy, ManifestRecord, Segment, SourceEntry, SplitOutcome,
        Splitter, VerificationResult, VerifyReport, VerifyStatus, Walk,
    };

    let _ = ArchiveOptions::default().apply(ArchiveOptionsOverrides::default());
    assert_eq!(CleanupPolicy::default(), CleanupPolicy::Keep);
    assert_eq!(Codec::Tar.policy(), CodecPolicy::FIXED);
    assert_eq!(
        segment_file_name("bundle", 3, Codec::Tar),
        "bundle_000003.tar"
    );

    // Type-check: functions exist and have expected signatures
    let _ = split as fn(Codec, &Path, &ArchiveOptions, &Path) -> _;
    let _ = create_archive as fn(Codec, &Path, &Path) -> _;
    let _ = extract as fn(Codec, &Path, &Path) -> _;
    let _ = extract_all as fn(Codec, &Path, &str, &Path) -> _;
    let _ = list_entries as fn(Codec, &Path) -> _;
    let _ = verify as fn(&Path, &Path) -> _;
    let _ = verify_report as fn(&Path, &Path) -> _;
    let _ = read_manifest as fn(&Path) -> _;
    let _ = sha256_file as fn(&Path) -> _;
    let _ = discover_segments as fn(&Path, &str, Codec) -> _;
    let _ = name_in_archive as fn(bool, &Path, &Path) -> _;
    let _ = segment_path as fn(&Path, &str, u32, Codec) -> _;

    // Symbols exist; no I/O needed
    let _ = std::mem::size_of::<ArchiveEntry>();
    let _ = std::mem::size_of::<ArchiveError>();
    let _ = std::mem::size_of::<ChecksumManifest>();
    let _ = std::mem::size_of::<ManifestRecord>();
    let _ = std::mem::size_of::<Segment>();
    let _ = std::mem::size_of::<SourceEntry>();
    let _ = std::mem::size_of::<SplitOutcome>();
    let _ = std::mem::size_of::<Splitter>();
    let _ = std::mem::size_of::<VerificationResult>();
    let _ = std::mem::size_of::<VerifyReport>();
    let _ = std::mem::size_of::<VerifyStatus>();
    let _ = std::mem::size_of::<Walk>();
}
