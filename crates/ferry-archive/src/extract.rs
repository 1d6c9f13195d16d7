//! Unpacking and listing segments.
//!
//! Extraction follows the fixed codec policy: existing files are overwritten,
//! missing parents are created, no leading components are stripped and the
//! first failing entry aborts. Entry paths that would escape the destination
//! are refused by the tar unpacker.

use crate::codec::Codec;
use crate::error::{ArchiveError, ArchiveResult};
use crate::naming::discover_segments;
use crate::walk::EntryKind;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// One entry as stored in a segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Entry path with its stored bytes intact.
    pub path: PathBuf,
    /// `path` for display; lossy if the stored name is not UTF-8.
    pub name: String,
    pub size: u64,
    pub kind: EntryKind,
    pub mode: u32,
}

fn open_segment(
    codec: Codec,
    segment_path: &Path,
) -> ArchiveResult<tar::Archive<Box<dyn std::io::Read>>> {
    let file = File::open(segment_path).map_err(|e| ArchiveError::io(segment_path, "open", e))?;
    codec
        .open_reader(BufReader::new(file))
        .map_err(|e| ArchiveError::io(segment_path, "open", e))
}

/// Unpack one segment into `dest_dir`, recreating its directory structure
/// and file modes.
pub fn extract(codec: Codec, segment_path: &Path, dest_dir: &Path) -> ArchiveResult<()> {
    let mut archive = open_segment(codec, segment_path)?;

    if codec.policy().mkdir_all {
        fs::create_dir_all(dest_dir).map_err(|e| ArchiveError::io(dest_dir, "create_dir", e))?;
    }

    archive
        .unpack(dest_dir)
        .map_err(|e| ArchiveError::io(segment_path, "extract", e))?;

    tracing::info!(
        segment = %segment_path.display(),
        dest = %dest_dir.display(),
        "extracted segment"
    );
    Ok(())
}

/// Unpack every `{prefix}_NNNNNN.{ext}` segment found in `segments_dir`, in
/// ordinal order. Returns the segments that were extracted.
pub fn extract_all(
    codec: Codec,
    segments_dir: &Path,
    prefix: &str,
    dest_dir: &Path,
) -> ArchiveResult<Vec<PathBuf>> {
    let segments = discover_segments(segments_dir, prefix, codec)?;
    if segments.is_empty() {
        tracing::warn!(
            dir = %segments_dir.display(),
            prefix,
            codec = %codec,
            "no segments found"
        );
    }

    for segment in &segments {
        extract(codec, segment, dest_dir)?;
    }
    Ok(segments)
}

/// List the entries of a segment without unpacking it.
pub fn list_entries(codec: Codec, segment_path: &Path) -> ArchiveResult<Vec<ArchiveEntry>> {
    let mut archive = open_segment(codec, segment_path)?;
    let read_err = |e| ArchiveError::io(segment_path, "read", e);

    let mut entries = Vec::new();
    for entry in archive.entries().map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let header = entry.header();

        let kind = match header.entry_type() {
            tar::EntryType::Regular | tar::EntryType::Continuous => EntryKind::File,
            tar::EntryType::Directory => EntryKind::Directory,
            tar::EntryType::Symlink => EntryKind::Symlink,
            _ => EntryKind::Other,
        };
        let path = entry.path().map_err(read_err)?.into_owned();

        entries.push(ArchiveEntry {
            name: path.to_string_lossy().into_owned(),
            path,
            size: header.size().map_err(read_err)?,
            kind,
            mode: header.mode().map_err(read_err)?,
        });
    }

    tracing::debug!(
        segment = %segment_path.display(),
        entries = entries.len(),
        "listed segment"
    );
    Ok(entries)
}
