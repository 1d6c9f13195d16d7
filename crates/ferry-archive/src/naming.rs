//! Naming conventions for archive entries and segment files.
//!
//! # Entry names
//!
//! ```text
//! source root /data/mirror (dir)      /data/mirror/v4/blobs/sha256  ->  mirror/v4/blobs/sha256
//! source root /data/mirror/meta.json  /data/mirror/meta.json        ->  meta.json
//! ```
//!
//! A directory root always appears as the single top-level folder of the
//! archive. Names use `/` on every platform.
//!
//! # Segment files
//!
//! ```text
//! {dest_dir}/{prefix}_{ordinal:06}.{ext}     e.g. out/bundle_000002.tar.gz
//! ```

use crate::codec::Codec;
use crate::error::{ArchiveError, ArchiveResult};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Compute the archive entry name for `entry_path` under `source_root`.
///
/// The name is built from the raw path components, so file names that are
/// not valid UTF-8 keep their exact bytes.
pub fn name_in_archive(
    source_root_is_dir: bool,
    source_root: &Path,
    entry_path: &Path,
) -> ArchiveResult<PathBuf> {
    if !source_root_is_dir {
        let base = source_root.file_name().ok_or_else(|| unnamed(source_root))?;
        return Ok(PathBuf::from(base));
    }

    let base = source_root.parent().unwrap_or_else(|| Path::new(""));
    let relative = entry_path.strip_prefix(base).map_err(|_| {
        let reason = format!("not under source root {}", source_root.display());
        ArchiveError::walk(entry_path, std::io::Error::other(reason))
    })?;

    let mut name = PathBuf::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => name.push(part),
            Component::CurDir => {}
            _ => return Err(unnamed(entry_path)),
        }
    }

    if name.as_os_str().is_empty() {
        return Err(unnamed(entry_path));
    }
    Ok(name)
}

fn unnamed(path: &Path) -> ArchiveError {
    ArchiveError::walk(
        path,
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "path has no nameable final component",
        ),
    )
}

/// `{prefix}_{ordinal:06}.{ext}`
pub fn segment_file_name(prefix: &str, ordinal: u32, codec: Codec) -> String {
    format!("{}_{:06}.{}", prefix, ordinal, codec.extension())
}

pub fn segment_path(dest_dir: &Path, prefix: &str, ordinal: u32, codec: Codec) -> PathBuf {
    dest_dir.join(segment_file_name(prefix, ordinal, codec))
}

/// Recover the ordinal from a segment file name, if it follows the scheme.
pub fn parse_segment_file_name(file_name: &str, prefix: &str, codec: Codec) -> Option<u32> {
    let rest = file_name.strip_prefix(prefix)?.strip_prefix('_')?;
    let digits = rest.strip_suffix(codec.extension())?.strip_suffix('.')?;

    if digits.len() < 6 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// List the segment files for `prefix` in `dir`, ordered by ordinal.
pub fn discover_segments(dir: &Path, prefix: &str, codec: Codec) -> ArchiveResult<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| ArchiveError::Path {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut found = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ArchiveError::walk(dir, e))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if let Some(ordinal) = parse_segment_file_name(name, prefix, codec) {
            found.push((ordinal, entry.path()));
        }
    }

    found.sort_by_key(|(ordinal, _)| *ordinal);
    Ok(found.into_iter().map(|(_, path)| path).collect())
}
