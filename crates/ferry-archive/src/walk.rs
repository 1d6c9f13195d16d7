//! Deterministic source tree traversal.
//!
//! Pre-order, depth-first; the children of every directory are visited in
//! byte-wise file name order. Two walks of an unchanged tree therefore yield
//! the same sequence regardless of what order the filesystem lists entries.
//!
//! Symlinks below the root are recorded as links and never followed, so the
//! walk cannot loop. The root itself is resolved so that a symlinked source
//! directory is archived by its content.

use crate::error::{ArchiveError, ArchiveResult};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// What kind of filesystem object an entry is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
    Other,
}

/// Snapshot of one filesystem object taken when the walk reached it.
#[derive(Debug, Clone)]
pub struct SourceEntry {
    pub path: PathBuf,
    /// Content length for regular files, 0 for metadata-only entries.
    pub size: u64,
    pub kind: EntryKind,
    /// Permission bits.
    pub mode: u32,
    pub modified: Option<SystemTime>,
    /// Link target, for symlinks.
    pub link_target: Option<PathBuf>,
    pub(crate) metadata: fs::Metadata,
}

impl SourceEntry {
    fn from_metadata(path: PathBuf, metadata: fs::Metadata) -> ArchiveResult<Self> {
        let file_type = metadata.file_type();
        let kind = if file_type.is_file() {
            EntryKind::File
        } else if file_type.is_dir() {
            EntryKind::Directory
        } else if file_type.is_symlink() {
            EntryKind::Symlink
        } else {
            EntryKind::Other
        };

        let link_target = if kind == EntryKind::Symlink {
            Some(fs::read_link(&path).map_err(|e| ArchiveError::walk(&path, e))?)
        } else {
            None
        };

        Ok(Self {
            size: if kind == EntryKind::File {
                metadata.len()
            } else {
                0
            },
            kind,
            mode: permission_bits(&metadata),
            modified: metadata.modified().ok(),
            link_target,
            metadata,
            path,
        })
    }

    /// Entries without a content stream.
    pub fn is_metadata_only(&self) -> bool {
        self.kind != EntryKind::File
    }
}

#[cfg(unix)]
fn permission_bits(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn permission_bits(metadata: &fs::Metadata) -> u32 {
    match (metadata.is_dir(), metadata.permissions().readonly()) {
        (true, _) => 0o755,
        (false, true) => 0o444,
        (false, false) => 0o644,
    }
}

/// Iterator over the entries below (and including) a root path.
///
/// The first error ends the walk.
pub struct Walk {
    root: PathBuf,
    pending: Vec<PathBuf>,
    done: bool,
}

impl Walk {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            pending: vec![root.clone()],
            root,
            done: false,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn visit(&mut self, path: PathBuf) -> ArchiveResult<SourceEntry> {
        let metadata = if path == self.root {
            fs::metadata(&path)
        } else {
            fs::symlink_metadata(&path)
        }
        .map_err(|e| ArchiveError::walk(&path, e))?;

        let entry = SourceEntry::from_metadata(path, metadata)?;

        if entry.kind == EntryKind::Directory {
            let mut children = fs::read_dir(&entry.path)
                .and_then(|dir| {
                    dir.map(|child| child.map(|c| c.file_name()))
                        .collect::<std::io::Result<Vec<_>>>()
                })
                .map_err(|e| ArchiveError::walk(&entry.path, e))?;
            children.sort();

            self.pending
                .extend(children.into_iter().rev().map(|name| entry.path.join(name)));
        }

        Ok(entry)
    }
}

impl Iterator for Walk {
    type Item = ArchiveResult<SourceEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let path = self.pending.pop()?;

        let result = self.visit(path);
        if result.is_err() {
            self.done = true;
            self.pending.clear();
        }
        Some(result)
    }
}
