//! Checksum manifest for produced segments.
//!
//! The manifest is a plain text file next to the segments:
//!
//! ```text
//! <64 hex chars sha256>\t<segment path>\n
//! ```
//!
//! One line per segment, in the order the segments were closed. Digests are
//! computed by re-reading each closed segment from disk, so a record always
//! describes the bytes that were actually persisted.

use crate::error::{ArchiveError, ArchiveResult};
use crate::segment::{Segment, SegmentObserver};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

/// File name of the manifest inside the destination directory.
pub const MANIFEST_FILE_NAME: &str = "sha256sum.txt";

const READ_CHUNK: usize = 64 * 1024;

/// One manifest line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestRecord {
    /// Lowercase hex SHA-256 of the segment file.
    pub digest: String,
    pub path: PathBuf,
}

impl ManifestRecord {
    pub fn to_line(&self) -> String {
        format!("{}\t{}\n", self.digest, self.path.display())
    }

    /// Parse one line (without its trailing newline).
    pub fn parse_line(line: &str) -> Result<Self, String> {
        let (digest, path) = line
            .split_once('\t')
            .ok_or_else(|| "expected '<sha256>\\t<path>'".to_string())?;

        if !is_sha256_hex(digest) {
            return Err(format!("invalid sha256 digest '{digest}'"));
        }
        if path.is_empty() {
            return Err("empty segment path".to_string());
        }

        Ok(Self {
            digest: digest.to_string(),
            path: PathBuf::from(path),
        })
    }
}

/// A path can be written to a manifest line only if it is valid UTF-8 and
/// carries no tab or line break.
pub(crate) fn check_recordable(path: &Path) -> Result<&str, String> {
    let text = path
        .to_str()
        .ok_or_else(|| "path is not valid UTF-8".to_string())?;
    if text.contains(['\t', '\n', '\r']) {
        return Err("path contains a tab or line break".to_string());
    }
    Ok(text)
}

fn is_sha256_hex(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// SHA-256 over the full content of a file, hex encoded.
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; READ_CHUNK];

    loop {
        let n = match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Append-only manifest writer for one create operation.
///
/// The file is opened once and held until [`ChecksumManifest::close`].
/// Every record is written straight to the file, so records of segments
/// closed before an abort survive it.
pub struct ChecksumManifest {
    path: PathBuf,
    file: File,
    records: Vec<ManifestRecord>,
}

impl ChecksumManifest {
    /// Create `<dest_dir>/sha256sum.txt`, replacing any previous manifest.
    pub fn create(dest_dir: &Path) -> ArchiveResult<Self> {
        let path = dest_dir.join(MANIFEST_FILE_NAME);
        let file = File::create(&path).map_err(|e| ArchiveError::io(&path, "create", e))?;

        Ok(Self {
            path,
            file,
            records: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> &[ManifestRecord] {
        &self.records
    }

    /// Checksum a closed segment file and append its record.
    pub fn record(&mut self, segment_path: &Path) -> ArchiveResult<&ManifestRecord> {
        check_recordable(segment_path).map_err(|reason| {
            ArchiveError::io(
                segment_path,
                "append",
                io::Error::new(io::ErrorKind::InvalidInput, reason),
            )
        })?;
        let digest =
            sha256_file(segment_path).map_err(|e| ArchiveError::io(segment_path, "checksum", e))?;
        let record = ManifestRecord {
            digest,
            path: segment_path.to_path_buf(),
        };

        self.file
            .write_all(record.to_line().as_bytes())
            .map_err(|e| ArchiveError::io(&self.path, "append", e))?;

        tracing::debug!(
            segment = %segment_path.display(),
            sha256 = %record.digest,
            "recorded segment checksum"
        );

        self.records.push(record);
        Ok(&self.records[self.records.len() - 1])
    }

    /// Sync and close the manifest file.
    pub fn close(self) -> ArchiveResult<Vec<ManifestRecord>> {
        self.file
            .sync_all()
            .map_err(|e| ArchiveError::io(&self.path, "close", e))?;
        Ok(self.records)
    }
}

impl SegmentObserver for ChecksumManifest {
    fn segment_finalized(&mut self, segment: &Segment) -> ArchiveResult<()> {
        self.record(&segment.path).map(|_| ())
    }
}

/// Read every record of a manifest file. Blank lines are ignored.
pub fn read_manifest(path: &Path) -> ArchiveResult<Vec<ManifestRecord>> {
    let content = fs::read_to_string(path).map_err(|e| ArchiveError::io(path, "read", e))?;

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            ManifestRecord::parse_line(line.trim_end_matches('\r')).map_err(|reason| {
                ArchiveError::Manifest {
                    path: path.to_path_buf(),
                    line: i + 1,
                    reason,
                }
            })
        })
        .collect()
}
