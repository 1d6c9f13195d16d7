//! Segmented, checksummed tar archives.
//!
//! A source tree is written into a sequence of size-bounded segments
//! `{prefix}_{NNNNNN}.{ext}` plus a `sha256sum.txt` manifest. On the far side
//! the segments are verified against the manifest and unpacked in ordinal
//! order.
//!
//! ```no_run
//! use ferry_archive::{extract_all, split, verify_report, ArchiveOptions, Codec};
//! use std::path::Path;
//!
//! # fn main() -> ferry_archive::ArchiveResult<()> {
//! let codec = Codec::select(".tar.zst")?;
//! let options = ArchiveOptions::new("mirror", 512 * 1024 * 1024);
//! let outcome = split(codec, Path::new("out"), &options, Path::new("mirror"))?;
//!
//! let report = verify_report(&outcome.manifest_path, Path::new("out"))?;
//! assert!(report.is_clean());
//! extract_all(codec, Path::new("out"), "mirror", Path::new("restore"))?;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod extract;
mod io;
pub mod manifest;
pub mod naming;
pub mod segment;
pub mod verify;
pub mod walk;

// Convenience re-exports
pub use codec::{ArchiveWriter, Codec, CodecPolicy};
pub use config::{ArchiveOptions, ArchiveOptionsOverrides, CleanupPolicy};
pub use error::{ArchiveError, ArchiveResult};
pub use extract::{extract, extract_all, list_entries, ArchiveEntry};
pub use manifest::{
    read_manifest, sha256_file, ChecksumManifest, ManifestRecord, MANIFEST_FILE_NAME,
};
pub use naming::{discover_segments, name_in_archive, segment_file_name, segment_path};
pub use segment::{
    create_archive, split, Segment, SegmentObserver, SourceRoot, SplitOutcome, Splitter,
};
pub use verify::{verify, verify_report, VerificationResult, VerifyReport, VerifyStatus};
pub use walk::{EntryKind, SourceEntry, Walk};
