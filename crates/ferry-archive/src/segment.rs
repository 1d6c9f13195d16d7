//! Size-bounded segment writer.
//!
//! Walks a source tree and writes it into a sequence of archive segments
//! `{prefix}_{ordinal:06}.{ext}`, rolling over to a new segment whenever the
//! next entry would push the current one past the size budget.
//!
//! # Guarantees
//!
//! - Ordinals are contiguous from 0.
//! - No entry is ever split across two segments. An entry larger than the
//!   budget is written whole into a segment of its own.
//! - A segment's summed entry sizes stay within the budget unless it holds
//!   such an oversized entry.
//! - Every segment is closed exactly once, and observers see the close
//!   events in ordinal order.
//! - Entry names and segment contents depend only on the tree and the
//!   budget, not on filesystem listing order.
//!
//! # Process
//!
//! 1. Resolve the source root (must exist)
//! 2. Open segment 0
//! 3. For each walked entry: name it, decide on rollover, append it
//! 4. Close the last segment, even if it is below budget
//!
//! Budget accounting uses content bytes: regular files count their length,
//! directories and symlinks count 0. A segment that holds only metadata
//! entries is still "empty" for the rollover decision, so a leading
//! directory header never forces an oversized file into a segment of its own.

use crate::codec::{ArchiveWriter, Codec};
use crate::config::{ArchiveOptions, CleanupPolicy};
use crate::error::{ArchiveError, ArchiveResult};
use crate::io::ExactReader;
use crate::manifest::{check_recordable, ChecksumManifest, ManifestRecord};
use crate::naming::{discover_segments, name_in_archive, segment_path};
use crate::walk::{EntryKind, SourceEntry, Walk};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// A closed segment file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub ordinal: u32,
    pub path: PathBuf,
    /// Summed sizes of the entries written into this segment.
    pub written_bytes: u64,
    pub entry_count: usize,
}

/// Receives a segment once it is closed and its file is complete on disk.
pub trait SegmentObserver {
    fn segment_finalized(&mut self, segment: &Segment) -> ArchiveResult<()>;
}

/// Observer that ignores every event.
impl SegmentObserver for () {
    fn segment_finalized(&mut self, _segment: &Segment) -> ArchiveResult<()> {
        Ok(())
    }
}

/// A segment still being written. Owns its file and archive writer;
/// [`OpenSegment::close`] consumes it.
struct OpenSegment {
    ordinal: u32,
    path: PathBuf,
    writer: ArchiveWriter<BufWriter<File>>,
    written_bytes: u64,
    entry_count: usize,
}

impl OpenSegment {
    fn create(codec: Codec, path: PathBuf, ordinal: u32) -> ArchiveResult<Self> {
        let file = File::create(&path).map_err(|e| ArchiveError::io(&path, "create", e))?;
        let writer = codec
            .open_writer(BufWriter::new(file))
            .map_err(|e| ArchiveError::io(&path, "open", e))?;

        tracing::info!(segment = %path.display(), ordinal, "creating segment");

        Ok(Self {
            ordinal,
            path,
            writer,
            written_bytes: 0,
            entry_count: 0,
        })
    }

    fn holds_payload(&self) -> bool {
        self.written_bytes > 0
    }

    fn append(&mut self, entry: &SourceEntry, name: &Path) -> ArchiveResult<()> {
        let mut header = tar::Header::new_gnu();
        header.set_metadata_in_mode(&entry.metadata, tar::HeaderMode::Complete);
        header.set_size(entry.size);

        match entry.kind {
            EntryKind::File => {
                let file =
                    File::open(&entry.path).map_err(|e| ArchiveError::walk(&entry.path, e))?;
                let mut content = ExactReader::new(file, entry.size);
                if let Err(e) = self.writer.append_data(&mut header, name, &mut content) {
                    return Err(if content.source_failed() {
                        ArchiveError::walk(&entry.path, e)
                    } else {
                        ArchiveError::io(&self.path, "write", e)
                    });
                }
            }
            EntryKind::Directory => self
                .writer
                .append_data(&mut header, name, std::io::empty())
                .map_err(|e| ArchiveError::io(&self.path, "write", e))?,
            EntryKind::Symlink => {
                let target = entry.link_target.as_deref().ok_or_else(|| {
                    ArchiveError::walk(
                        &entry.path,
                        std::io::Error::other("symlink without a recorded target"),
                    )
                })?;
                self.writer
                    .append_link(&mut header, name, target)
                    .map_err(|e| ArchiveError::io(&self.path, "write", e))?;
            }
            EntryKind::Other => return Ok(()),
        }

        tracing::debug!(
            entry = %name.display(),
            size = entry.size,
            segment = self.ordinal,
            "appended entry"
        );

        self.written_bytes = self.written_bytes.saturating_add(entry.size);
        self.entry_count += 1;
        Ok(())
    }

    fn close(self) -> ArchiveResult<Segment> {
        let path = self.path;
        let buffered = self
            .writer
            .finish()
            .map_err(|e| ArchiveError::io(&path, "close", e))?;
        let file = buffered
            .into_inner()
            .map_err(|e| ArchiveError::io(&path, "close", e.into_error()))?;
        file.sync_all()
            .map_err(|e| ArchiveError::io(&path, "close", e))?;

        tracing::info!(
            segment = %path.display(),
            ordinal = self.ordinal,
            bytes = self.written_bytes,
            entries = self.entry_count,
            "closed segment"
        );

        Ok(Segment {
            ordinal: self.ordinal,
            path,
            written_bytes: self.written_bytes,
            entry_count: self.entry_count,
        })
    }
}

/// A validated source root.
#[derive(Debug, Clone)]
pub struct SourceRoot {
    path: PathBuf,
    is_dir: bool,
}

impl SourceRoot {
    /// Check that `path` exists. Roots without a nameable final component
    /// (`.`, `..`, `dir/..`) are canonicalized so the archive still gets a
    /// top-level folder name.
    pub fn resolve(path: &Path) -> ArchiveResult<Self> {
        let metadata = fs::metadata(path).map_err(|e| ArchiveError::Path {
            path: path.to_path_buf(),
            source: e,
        })?;

        let named = matches!(
            path.components().next_back(),
            Some(std::path::Component::Normal(_))
        );
        let path = if named {
            path.to_path_buf()
        } else {
            fs::canonicalize(path).map_err(|e| ArchiveError::Path {
                path: path.to_path_buf(),
                source: e,
            })?
        };

        Ok(Self {
            path,
            is_dir: metadata.is_dir(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    fn entry_name(&self, entry: &SourceEntry) -> ArchiveResult<PathBuf> {
        name_in_archive(self.is_dir, &self.path, &entry.path)
    }
}

/// Splits one source tree into segments under a destination directory.
#[derive(Debug, Clone)]
pub struct Splitter {
    codec: Codec,
    dest_dir: PathBuf,
    options: ArchiveOptions,
}

impl Splitter {
    pub fn new(
        codec: Codec,
        dest_dir: impl Into<PathBuf>,
        options: ArchiveOptions,
    ) -> ArchiveResult<Self> {
        options.validate()?;
        Ok(Self {
            codec,
            dest_dir: dest_dir.into(),
            options,
        })
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    pub fn dest_dir(&self) -> &Path {
        &self.dest_dir
    }

    pub fn options(&self) -> &ArchiveOptions {
        &self.options
    }

    pub fn segment_path(&self, ordinal: u32) -> PathBuf {
        segment_path(&self.dest_dir, &self.options.prefix, ordinal, self.codec)
    }

    /// Create the destination directory, make sure it is not inside the
    /// tree being archived, and remove segments a previous run left under
    /// the same prefix and codec.
    ///
    /// Segment paths must be representable in the manifest: valid UTF-8
    /// with no tab or line break.
    pub fn prepare_destination(&self, source: &SourceRoot) -> ArchiveResult<()> {
        let first = self.segment_path(0);
        if let Err(reason) = check_recordable(&first) {
            return Err(ArchiveError::InvalidOptions {
                reason: format!("destination {}: {reason}", self.dest_dir.display()),
            });
        }

        fs::create_dir_all(&self.dest_dir)
            .map_err(|e| ArchiveError::io(&self.dest_dir, "create_dir", e))?;

        if source.is_dir() {
            let dest = fs::canonicalize(&self.dest_dir)
                .map_err(|e| ArchiveError::io(&self.dest_dir, "resolve", e))?;
            let src = fs::canonicalize(source.path()).map_err(|e| ArchiveError::Path {
                path: source.path().to_path_buf(),
                source: e,
            })?;
            if dest.starts_with(&src) {
                return Err(ArchiveError::InvalidOptions {
                    reason: format!(
                        "destination {} lies inside source tree {}",
                        self.dest_dir.display(),
                        source.path().display()
                    ),
                });
            }
        }

        for stale in discover_segments(&self.dest_dir, &self.options.prefix, self.codec)? {
            fs::remove_file(&stale).map_err(|e| ArchiveError::io(&stale, "remove", e))?;
            tracing::info!(segment = %stale.display(), "removed segment from previous run");
        }
        Ok(())
    }

    /// Write `source` into segments, reporting each closed segment to
    /// `observer` before the next one is opened.
    ///
    /// On error, output already on disk is handled per
    /// [`ArchiveOptions::on_abort`].
    pub fn run<O: SegmentObserver>(
        &self,
        source: &SourceRoot,
        observer: &mut O,
    ) -> ArchiveResult<Vec<Segment>> {
        let mut created = Vec::new();
        let result = self.write_segments(source, observer, &mut created);

        if let Err(err) = &result {
            tracing::warn!(
                error = %err,
                segments = created.len(),
                policy = ?self.options.on_abort,
                "archive operation aborted"
            );
            if self.options.on_abort == CleanupPolicy::Remove {
                remove_all(&created);
            }
        }
        result
    }

    fn write_segments<O: SegmentObserver>(
        &self,
        source: &SourceRoot,
        observer: &mut O,
        created: &mut Vec<PathBuf>,
    ) -> ArchiveResult<Vec<Segment>> {
        let max = self.options.max_segment_bytes;
        let mut segments = Vec::new();

        let first = self.segment_path(0);
        created.push(first.clone());
        let mut current = OpenSegment::create(self.codec, first, 0)?;

        for entry in Walk::new(source.path()) {
            let entry = entry?;
            if entry.kind == EntryKind::Other {
                tracing::warn!(path = %entry.path.display(), "skipping special file");
                continue;
            }

            let name = source.entry_name(&entry)?;

            if entry.size.saturating_add(current.written_bytes) > max && current.holds_payload() {
                let ordinal = current.ordinal + 1;
                let closed = current.close()?;
                observer.segment_finalized(&closed)?;
                segments.push(closed);

                let next = self.segment_path(ordinal);
                created.push(next.clone());
                current = OpenSegment::create(self.codec, next, ordinal)?;
            }

            if entry.size > max {
                tracing::warn!(
                    entry = %name.display(),
                    size = entry.size,
                    max,
                    "entry exceeds segment budget, writing it whole"
                );
            }

            current.append(&entry, &name)?;
        }

        let closed = current.close()?;
        observer.segment_finalized(&closed)?;
        segments.push(closed);

        Ok(segments)
    }
}

fn remove_all(paths: &[PathBuf]) {
    for path in paths {
        match fs::remove_file(path) {
            Ok(()) => tracing::debug!(path = %path.display(), "removed partial output"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %path.display(),
                error = %e,
                "could not remove partial output"
            ),
        }
    }
}

/// Result of a completed split.
#[derive(Debug, Clone)]
pub struct SplitOutcome {
    pub segments: Vec<Segment>,
    pub records: Vec<ManifestRecord>,
    pub manifest_path: PathBuf,
}

impl SplitOutcome {
    pub fn segment_paths(&self) -> Vec<&Path> {
        self.segments.iter().map(|s| s.path.as_path()).collect()
    }
}

/// Split `source_dir` into segments under `dest_dir` and record their
/// checksums in `<dest_dir>/sha256sum.txt`.
pub fn split(
    codec: Codec,
    dest_dir: &Path,
    options: &ArchiveOptions,
    source_dir: &Path,
) -> ArchiveResult<SplitOutcome> {
    let splitter = Splitter::new(codec, dest_dir, options.clone())?;
    let source = SourceRoot::resolve(source_dir)?;
    splitter.prepare_destination(&source)?;

    tracing::info!(
        source = %source.path().display(),
        dest = %dest_dir.display(),
        codec = %codec,
        max_segment_bytes = options.max_segment_bytes,
        "splitting source tree"
    );

    let mut manifest = ChecksumManifest::create(dest_dir)?;
    let manifest_path = manifest.path().to_path_buf();

    let segments = match splitter.run(&source, &mut manifest) {
        Ok(segments) => segments,
        Err(err) => {
            drop(manifest);
            if options.on_abort == CleanupPolicy::Remove {
                remove_all(std::slice::from_ref(&manifest_path));
            }
            return Err(err);
        }
    };
    let records = manifest.close()?;

    tracing::info!(
        segments = segments.len(),
        manifest = %manifest_path.display(),
        "split complete"
    );

    Ok(SplitOutcome {
        segments,
        records,
        manifest_path,
    })
}

/// Write `source` into one archive at `output`, with no size budget and no
/// manifest.
pub fn create_archive(codec: Codec, source: &Path, output: &Path) -> ArchiveResult<Segment> {
    let source = SourceRoot::resolve(source)?;
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| ArchiveError::io(parent, "create_dir", e))?;
    }

    tracing::info!(
        source = %source.path().display(),
        output = %output.display(),
        "building archive"
    );

    let mut archive = OpenSegment::create(codec, output.to_path_buf(), 0)?;
    for entry in Walk::new(source.path()) {
        let entry = entry?;
        if entry.kind == EntryKind::Other {
            continue;
        }
        let name = source.entry_name(&entry)?;
        archive.append(&entry, &name)?;
    }
    archive.close()
}
