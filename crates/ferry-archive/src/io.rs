//! Readers that pin file content to the size recorded at walk time.

use std::io::{self, Read};

/// A reader that yields exactly `expected` bytes.
///
/// Bytes beyond `expected` are never read, and hitting EOF early is an
/// explicit `UnexpectedEof` error. A tar header carries the size captured
/// during the walk, so the content stream has to match it.
///
/// Failures on the source side are remembered so the caller can tell them
/// apart from failures of the sink the content is copied into.
pub(crate) struct ExactReader<R> {
    inner: R,
    expected: u64,
    read: u64,
    source_failed: bool,
}

impl<R: Read> ExactReader<R> {
    pub(crate) fn new(inner: R, expected: u64) -> Self {
        Self {
            inner,
            expected,
            read: 0,
            source_failed: false,
        }
    }

    pub(crate) fn source_failed(&self) -> bool {
        self.source_failed
    }
}

impl<R: Read> Read for ExactReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.expected - self.read;
        if remaining == 0 || buf.is_empty() {
            return Ok(0);
        }

        let max_to_read = remaining.min(buf.len() as u64) as usize;
        let n = match self.inner.read(&mut buf[..max_to_read]) {
            Ok(n) => n,
            Err(e) => {
                // Interrupted is retried by the copy loop.
                if e.kind() != io::ErrorKind::Interrupted {
                    self.source_failed = true;
                }
                return Err(e);
            }
        };
        if n == 0 {
            self.source_failed = true;
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "file shrank while archiving: expected {} bytes, got {}",
                    self.expected, self.read
                ),
            ));
        }
        self.read += n as u64;

        Ok(n)
    }
}
