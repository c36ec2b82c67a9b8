//! Bounded buffered streaming I/O over a plain, gzip, or xz/lzma
//! sink/source (spec.md §4.2).
//!
//! Two independent buffer types — [`ReadBuffer`] and [`WriteBuffer`] —
//! rather than one bidirectional struct, matching the spec's framing of
//! read and write as "two independent semantics" sharing only the
//! capacity/overflow policy. Both are generic over a small capability-set
//! backend ([`ReadBackend`]/[`WriteBackend`], spec.md §9 "Design Notes")
//! so the codec layer never has to know whether it's talking to a plain
//! file or a compressed stream — except that compressed backends refuse
//! `seek`, which `update_page` and follow-mode check for up front.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use xz2::read::XzDecoder;
use xz2::write::XzEncoder;

/// Compression envelope dispatched by file extension (spec.md §6.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression_ {
    Plain,
    Gzip,
    Xz,
}

/// Pick the compression envelope for a path by its extension.
pub fn compression_for_path(path: &std::path::Path) -> Compression_ {
    match path.extension().and_then(|e| e.to_str()) {
        Some("gz") => Compression_::Gzip,
        Some("lzma") | Some("xz") => Compression_::Xz,
        _ => Compression_::Plain,
    }
}

/// Outcome of a [`ReadBuffer::read`] call: either every requested byte
/// was consumed, or the source was already at a clean end-of-stream with
/// nothing consumed (spec.md §4.2's "Err(Eof) on short read at EOF",
/// distinguished here from a partial [`crate::SddsError::ShortRead`] so
/// callers — specifically `PageEngine::read_page` — can tell "nothing
/// left" from "the stream broke mid-record").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    Complete,
    Eof,
}

/// A read source with a declared capability set (spec.md §9: "Represent
/// sink and source as capability sets").
pub enum ReadBackend {
    Plain(File),
    Gzip(GzDecoder<File>),
    Xz(XzDecoder<File>),
}

impl ReadBackend {
    pub fn open(path: &std::path::Path) -> crate::Result<Self> {
        let file = File::open(path).map_err(|e| crate::SddsError::Io(e.to_string()))?;
        Ok(match compression_for_path(path) {
            Compression_::Plain => ReadBackend::Plain(file),
            Compression_::Gzip => ReadBackend::Gzip(GzDecoder::new(file)),
            Compression_::Xz => ReadBackend::Xz(XzDecoder::new(file)),
        })
    }

    pub fn supports_seek(&self) -> bool {
        matches!(self, ReadBackend::Plain(_))
    }

    pub fn seek(&mut self, pos: SeekFrom) -> crate::Result<u64> {
        match self {
            ReadBackend::Plain(f) => f.seek(pos).map_err(|e| crate::SddsError::Io(e.to_string())),
            _ => Err(crate::SddsError::State(
                "seek is not supported on a compressed read backend".into(),
            )),
        }
    }
}

impl Read for ReadBackend {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            ReadBackend::Plain(f) => f.read(buf),
            ReadBackend::Gzip(d) => d.read(buf),
            ReadBackend::Xz(d) => d.read(buf),
        }
    }
}

/// A write sink with a declared capability set.
pub enum WriteBackend {
    Plain(File),
    Gzip(GzEncoder<File>),
    Xz(XzEncoder<File>),
}

impl WriteBackend {
    pub fn create(path: &std::path::Path) -> crate::Result<Self> {
        let file = File::create(path).map_err(|e| crate::SddsError::Io(e.to_string()))?;
        Ok(match compression_for_path(path) {
            Compression_::Plain => WriteBackend::Plain(file),
            Compression_::Gzip => WriteBackend::Gzip(GzEncoder::new(file, Compression::default())),
            Compression_::Xz => WriteBackend::Xz(XzEncoder::new(file, 6)),
        })
    }

    pub fn supports_seek(&self) -> bool {
        matches!(self, WriteBackend::Plain(_))
    }

    pub fn seek(&mut self, pos: SeekFrom) -> crate::Result<u64> {
        match self {
            WriteBackend::Plain(f) => f.seek(pos).map_err(|e| crate::SddsError::Io(e.to_string())),
            _ => Err(crate::SddsError::State(
                "seek is not supported on a compressed write backend".into(),
            )),
        }
    }

    pub fn stream_position(&mut self) -> crate::Result<u64> {
        self.seek(SeekFrom::Current(0))
    }
}

impl Write for WriteBackend {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            WriteBackend::Plain(f) => f.write(buf),
            WriteBackend::Gzip(e) => e.write(buf),
            WriteBackend::Xz(e) => e.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            WriteBackend::Plain(f) => f.flush(),
            WriteBackend::Gzip(e) => e.flush(),
            WriteBackend::Xz(e) => e.flush(),
        }
    }
}

/// Buffered reader over a [`ReadBackend`]. See the module doc for the
/// overflow/bypass policy.
pub struct ReadBuffer {
    backend: ReadBackend,
    capacity: usize,
    bytes: Vec<u8>,
    cursor: usize,
    bytes_left: usize,
}

impl ReadBuffer {
    pub fn new(backend: ReadBackend, capacity: usize) -> Self {
        ReadBuffer {
            backend,
            capacity,
            bytes: Vec::new(),
            cursor: 0,
            bytes_left: 0,
        }
    }

    pub fn backend(&self) -> &ReadBackend {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut ReadBackend {
        &mut self.backend
    }

    /// Bytes currently buffered and not yet consumed — used by
    /// `read_new_rows`/follow-mode to compute bytes remaining in the
    /// current page without touching the underlying source.
    pub fn bytes_left(&self) -> usize {
        self.bytes_left
    }

    /// Discard any buffered bytes. Callers that seek the backend directly
    /// (follow-mode's jump to `rowcount_offset`) must invalidate the
    /// buffer first or a subsequent `read` would serve stale bytes.
    pub fn invalidate(&mut self) {
        self.cursor = 0;
        self.bytes_left = 0;
    }

    fn refill(&mut self) -> crate::Result<usize> {
        self.bytes.resize(self.capacity, 0);
        let mut total = 0;
        // Fill as much as is available in one call; short reads from
        // compressed streams are common, so loop until either full or
        // the source returns 0.
        while total < self.capacity {
            let n = self
                .backend
                .read(&mut self.bytes[total..])
                .map_err(|e| crate::SddsError::Io(e.to_string()))?;
            if n == 0 {
                break;
            }
            total += n;
        }
        self.bytes.truncate(total);
        self.cursor = 0;
        self.bytes_left = total;
        Ok(total)
    }

    /// Read exactly `n` bytes, or skip `n` bytes if `dst` is `None`.
    /// Returns [`ReadOutcome::Eof`] if the source was already exhausted
    /// with nothing consumed for this call; returns
    /// [`crate::SddsError::ShortRead`] if fewer than `n` bytes were
    /// available after some were already consumed.
    pub fn read(&mut self, mut dst: Option<&mut [u8]>, n: usize) -> crate::Result<ReadOutcome> {
        if n == 0 {
            return Ok(ReadOutcome::Complete);
        }

        if self.capacity == 0 {
            return self.read_bypass(dst, n);
        }

        if n <= self.bytes_left {
            if let Some(d) = dst.as_deref_mut() {
                d[..n].copy_from_slice(&self.bytes[self.cursor..self.cursor + n]);
            }
            self.cursor += n;
            self.bytes_left -= n;
            return Ok(ReadOutcome::Complete);
        }

        let mut consumed = 0usize;
        if self.bytes_left > 0 {
            if let Some(d) = dst.as_deref_mut() {
                d[..self.bytes_left].copy_from_slice(&self.bytes[self.cursor..self.cursor + self.bytes_left]);
            }
            consumed = self.bytes_left;
            self.cursor += self.bytes_left;
            self.bytes_left = 0;
        }

        let remaining = n - consumed;
        if remaining > self.capacity {
            self.read_direct(dst.as_deref_mut().map(|d| &mut d[consumed..]), remaining, consumed)
        } else {
            let got = self.refill()?;
            if got == 0 && consumed == 0 {
                return Ok(ReadOutcome::Eof);
            }
            if got < remaining {
                return Err(crate::SddsError::ShortRead(format!(
                    "expected {remaining} bytes after refill, got {got}"
                )));
            }
            if let Some(d) = dst.as_deref_mut() {
                d[consumed..consumed + remaining].copy_from_slice(&self.bytes[..remaining]);
            }
            self.cursor = remaining;
            self.bytes_left = got - remaining;
            Ok(ReadOutcome::Complete)
        }
    }

    fn read_direct(
        &mut self,
        dst: Option<&mut [u8]>,
        n: usize,
        already_consumed: usize,
    ) -> crate::Result<ReadOutcome> {
        match dst {
            Some(d) => {
                let mut total = 0;
                while total < n {
                    let got = self
                        .backend
                        .read(&mut d[total..n])
                        .map_err(|e| crate::SddsError::Io(e.to_string()))?;
                    if got == 0 {
                        break;
                    }
                    total += got;
                }
                if total == 0 && already_consumed == 0 {
                    return Ok(ReadOutcome::Eof);
                }
                if total < n {
                    return Err(crate::SddsError::ShortRead(format!(
                        "expected {n} bytes directly from source, got {total}"
                    )));
                }
                Ok(ReadOutcome::Complete)
            }
            None => {
                // Skip: seek forward if possible, otherwise discard via a
                // scratch buffer.
                if self.backend.supports_seek() {
                    self.backend
                        .seek(SeekFrom::Current(n as i64))
                        .map_err(|_| crate::SddsError::Io("seek failed while skipping".into()))?;
                    Ok(ReadOutcome::Complete)
                } else {
                    let mut scratch = vec![0u8; n];
                    let mut total = 0;
                    while total < n {
                        let got = self
                            .backend
                            .read(&mut scratch[total..])
                            .map_err(|e| crate::SddsError::Io(e.to_string()))?;
                        if got == 0 {
                            break;
                        }
                        total += got;
                    }
                    if total == 0 && already_consumed == 0 {
                        return Ok(ReadOutcome::Eof);
                    }
                    if total < n {
                        return Err(crate::SddsError::ShortRead(format!(
                            "expected to skip {n} bytes, only {total} were available"
                        )));
                    }
                    Ok(ReadOutcome::Complete)
                }
            }
        }
    }

    fn read_bypass(&mut self, dst: Option<&mut [u8]>, n: usize) -> crate::Result<ReadOutcome> {
        self.read_direct(dst, n, 0)
    }
}

/// Buffered writer over a [`WriteBackend`]. See the module doc for the
/// overflow/flush policy.
pub struct WriteBuffer {
    backend: WriteBackend,
    capacity: usize,
    bytes: Vec<u8>,
}

impl WriteBuffer {
    pub fn new(backend: WriteBackend, capacity: usize) -> Self {
        WriteBuffer {
            backend,
            capacity,
            bytes: Vec::with_capacity(capacity),
        }
    }

    pub fn backend(&self) -> &WriteBackend {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut WriteBackend {
        &mut self.backend
    }

    /// Write `n` bytes from `src` (`src.len() == n`). If `capacity == 0`,
    /// writes straight through to the backend.
    pub fn write(&mut self, src: &[u8]) -> crate::Result<()> {
        let n = src.len();
        if self.capacity == 0 {
            return self.write_direct(src);
        }

        if self.bytes.len() + n <= self.capacity {
            self.bytes.extend_from_slice(src);
            return Ok(());
        }

        // Fill the buffer to capacity, flush, then handle the remainder.
        let fill = self.capacity - self.bytes.len();
        self.bytes.extend_from_slice(&src[..fill]);
        self.flush()?;

        let remaining = &src[fill..];
        if remaining.len() > self.capacity {
            self.write_direct(remaining)
        } else {
            self.bytes.extend_from_slice(remaining);
            Ok(())
        }
    }

    fn write_direct(&mut self, src: &[u8]) -> crate::Result<()> {
        self.backend
            .write_all(src)
            .map_err(|e| crate::SddsError::Io(e.to_string()))
    }

    /// Empty the buffer through the sink.
    pub fn flush(&mut self) -> crate::Result<()> {
        if !self.bytes.is_empty() {
            self.backend
                .write_all(&self.bytes)
                .map_err(|e| crate::SddsError::Io(e.to_string()))?;
            self.bytes.clear();
        }
        self.backend.flush().map_err(|e| crate::SddsError::Io(e.to_string()))
    }
}
