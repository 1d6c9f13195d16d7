//! Integrity check of delivered segments against their manifest.
//!
//! Verification never extracts. Every record is checked and every finding
//! returned; a mismatch, a missing segment or an unreadable one does not stop
//! the pass. Only a manifest that cannot be read or parsed is an error.

use crate::error::ArchiveResult;
use crate::manifest::{read_manifest, sha256_file, ManifestRecord};
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyStatus {
    Ok,
    Mismatch { expected: String, actual: String },
    MissingSegment,
    /// The segment exists but could not be read.
    Unreadable { reason: String },
}

impl VerifyStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// Outcome for one manifest record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationResult {
    /// Where the segment was looked up.
    pub segment: PathBuf,
    pub record: ManifestRecord,
    pub status: VerifyStatus,
}

/// All results of one verification pass, in manifest order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    pub results: Vec<VerificationResult>,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.results.iter().all(|r| r.status.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &VerificationResult> {
        self.results.iter().filter(|r| !r.status.is_ok())
    }
}

impl From<Vec<VerificationResult>> for VerifyReport {
    fn from(results: Vec<VerificationResult>) -> Self {
        Self { results }
    }
}

/// Where a record's segment is expected inside `segments_dir`: the recorded
/// file name, whatever directory it was written to.
fn resolve(record: &ManifestRecord, segments_dir: &Path) -> PathBuf {
    match record.path.file_name() {
        Some(name) => segments_dir.join(name),
        None => segments_dir.join(&record.path),
    }
}

/// Recompute the digest of every segment listed in `manifest_path` and
/// compare it with the recorded one.
pub fn verify(
    manifest_path: &Path,
    segments_dir: &Path,
) -> ArchiveResult<Vec<VerificationResult>> {
    let records = read_manifest(manifest_path)?;
    let mut results = Vec::with_capacity(records.len());

    for record in records {
        let segment = resolve(&record, segments_dir);

        let status = match sha256_file(&segment) {
            Ok(actual) if actual == record.digest => VerifyStatus::Ok,
            Ok(actual) => {
                tracing::warn!(
                    segment = %segment.display(),
                    expected = %record.digest,
                    actual = %actual,
                    "segment checksum mismatch"
                );
                VerifyStatus::Mismatch {
                    expected: record.digest.clone(),
                    actual,
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::warn!(segment = %segment.display(), "segment missing");
                VerifyStatus::MissingSegment
            }
            Err(e) => {
                tracing::warn!(segment = %segment.display(), error = %e, "segment unreadable");
                VerifyStatus::Unreadable {
                    reason: e.to_string(),
                }
            }
        };

        results.push(VerificationResult {
            segment,
            record,
            status,
        });
    }

    let failed = results.iter().filter(|r| !r.status.is_ok()).count();
    tracing::info!(
        manifest = %manifest_path.display(),
        checked = results.len(),
        failed,
        "verification finished"
    );

    Ok(results)
}

/// [`verify`], collected into a [`VerifyReport`].
pub fn verify_report(manifest_path: &Path, segments_dir: &Path) -> ArchiveResult<VerifyReport> {
    verify(manifest_path, segments_dir).map(VerifyReport::from)
}
