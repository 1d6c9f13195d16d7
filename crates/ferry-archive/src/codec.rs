//! Archive/compression codecs.
//!
//! A [`Codec`] is one of four tar variants. Selection from an extension is
//! pure and total: the same suffix always yields the same configuration, and
//! anything unrecognised is rejected before any file is touched.
//!
//! | suffix                 | codec     | level |
//! |------------------------|-----------|-------|
//! | `.tar`                 | `Tar`     | -     |
//! | `.tar.gz`, `.tgz`      | `TarGz`   | 6     |
//! | `.tar.bz2`             | `TarBz2`  | 6     |
//! | `.tar.zst`             | `TarZstd` | 3     |

use crate::error::{ArchiveError, ArchiveResult};
use std::io::{self, Read, Write};
use std::path::Path;

/// Fixed gzip level (flate2 default).
pub const GZIP_LEVEL: u32 = 6;
/// Fixed bzip2 block-size level.
pub const BZIP2_LEVEL: u32 = 6;
/// Fixed zstd level (zstd's own default).
pub const ZSTD_LEVEL: i32 = 3;

/// Suffixes accepted by [`Codec::select`], longest first.
const SUFFIXES: &[(&str, Codec)] = &[
    (".tar.bz2", Codec::TarBz2 { level: BZIP2_LEVEL }),
    (".tar.zst", Codec::TarZstd { level: ZSTD_LEVEL }),
    (".tar.gz", Codec::TarGz { level: GZIP_LEVEL }),
    (".tgz", Codec::TarGz { level: GZIP_LEVEL }),
    (".tar", Codec::Tar),
];

/// Archive format variant with its compression configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Tar,
    TarGz { level: u32 },
    TarBz2 { level: u32 },
    TarZstd { level: i32 },
}

/// Operational policy shared by every codec. Not configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecPolicy {
    pub overwrite_existing: bool,
    pub mkdir_all: bool,
    pub implicit_top_level_folder: bool,
    pub strip_components: usize,
    pub continue_on_error: bool,
}

impl CodecPolicy {
    pub const FIXED: CodecPolicy = CodecPolicy {
        overwrite_existing: true,
        mkdir_all: true,
        implicit_top_level_folder: false,
        strip_components: 0,
        continue_on_error: false,
    };
}

impl Codec {
    /// Select a codec from a file extension such as `.tar.gz` or `tgz`.
    pub fn select(extension: &str) -> ArchiveResult<Self> {
        let normalized = extension.trim().to_ascii_lowercase();
        let dotted = if normalized.starts_with('.') {
            normalized
        } else {
            format!(".{normalized}")
        };

        SUFFIXES
            .iter()
            .find(|(suffix, _)| *suffix == dotted)
            .map(|(_, codec)| *codec)
            .ok_or_else(|| ArchiveError::UnsupportedFormat {
                extension: extension.to_string(),
            })
    }

    /// Select a codec from the suffix of a file name, e.g. `bundle_000003.tar.zst`.
    pub fn for_path(path: &Path) -> ArchiveResult<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();

        SUFFIXES
            .iter()
            .find(|(suffix, _)| name.len() > suffix.len() && name.ends_with(suffix))
            .map(|(_, codec)| *codec)
            .ok_or_else(|| ArchiveError::UnsupportedFormat {
                extension: path.display().to_string(),
            })
    }

    /// Canonical extension, without the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Codec::Tar => "tar",
            Codec::TarGz { .. } => "tar.gz",
            Codec::TarBz2 { .. } => "tar.bz2",
            Codec::TarZstd { .. } => "tar.zst",
        }
    }

    pub fn policy(&self) -> CodecPolicy {
        CodecPolicy::FIXED
    }

    /// Open a tar writer on `sink`, compressing according to the variant.
    pub fn open_writer<W: Write>(&self, sink: W) -> io::Result<ArchiveWriter<W>> {
        let encoder = match *self {
            Codec::Tar => Encoder::Plain(sink),
            Codec::TarGz { level } => Encoder::Gzip(
                flate2::GzBuilder::new()
                    .mtime(0)
                    .operating_system(255)
                    .write(sink, flate2::Compression::new(level)),
            ),
            Codec::TarBz2 { level } => Encoder::Bzip2(bzip2::write::BzEncoder::new(
                sink,
                bzip2::Compression::new(level),
            )),
            Codec::TarZstd { level } => {
                Encoder::Zstd(zstd::stream::write::Encoder::new(sink, level)?)
            }
        };

        let mut builder = tar::Builder::new(encoder);
        builder.follow_symlinks(false);
        Ok(ArchiveWriter { builder })
    }

    /// Open a decompressing tar reader on `source`.
    pub fn open_reader<'a, R: Read + 'a>(
        &self,
        source: R,
    ) -> io::Result<tar::Archive<Box<dyn Read + 'a>>> {
        let reader: Box<dyn Read + 'a> = match self {
            Codec::Tar => Box::new(source),
            Codec::TarGz { .. } => Box::new(flate2::read::GzDecoder::new(source)),
            Codec::TarBz2 { .. } => Box::new(bzip2::read::BzDecoder::new(source)),
            Codec::TarZstd { .. } => Box::new(zstd::stream::read::Decoder::new(source)?),
        };

        let policy = self.policy();
        let mut archive = tar::Archive::new(reader);
        archive.set_overwrite(policy.overwrite_existing);
        archive.set_preserve_permissions(true);
        archive.set_preserve_mtime(true);
        Ok(archive)
    }
}

impl std::fmt::Display for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Compressing sink under the tar builder.
pub(crate) enum Encoder<W: Write> {
    Plain(W),
    Gzip(flate2::write::GzEncoder<W>),
    Bzip2(bzip2::write::BzEncoder<W>),
    Zstd(zstd::stream::write::Encoder<'static, W>),
}

impl<W: Write> Encoder<W> {
    fn finish(self) -> io::Result<W> {
        match self {
            Encoder::Plain(w) => Ok(w),
            Encoder::Gzip(e) => e.finish(),
            Encoder::Bzip2(e) => e.finish(),
            Encoder::Zstd(e) => e.finish(),
        }
    }
}

impl<W: Write> Write for Encoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Encoder::Plain(w) => w.write(buf),
            Encoder::Gzip(e) => e.write(buf),
            Encoder::Bzip2(e) => e.write(buf),
            Encoder::Zstd(e) => e.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Encoder::Plain(w) => w.flush(),
            Encoder::Gzip(e) => e.flush(),
            Encoder::Bzip2(e) => e.flush(),
            Encoder::Zstd(e) => e.flush(),
        }
    }
}

/// Tar writer bound to one output sink.
pub struct ArchiveWriter<W: Write> {
    builder: tar::Builder<Encoder<W>>,
}

impl<W: Write> ArchiveWriter<W> {
    /// Append an entry; `data` is consumed only for regular files.
    pub(crate) fn append_data<P: AsRef<Path>, R: Read>(
        &mut self,
        header: &mut tar::Header,
        name: P,
        data: R,
    ) -> io::Result<()> {
        self.builder.append_data(header, name, data)
    }

    pub(crate) fn append_link<P: AsRef<Path>>(
        &mut self,
        header: &mut tar::Header,
        name: P,
        target: &Path,
    ) -> io::Result<()> {
        self.builder.append_link(header, name, target)
    }

    /// Write the tar trailer, flush the compressor and return the sink.
    pub fn finish(self) -> io::Result<W> {
        let encoder = self.builder.into_inner()?;
        let mut sink = encoder.finish()?;
        sink.flush()?;
        Ok(sink)
    }
}
