//! Top-level file handle: ties [`crate::header::HeaderIo`],
//! [`crate::buffer`], and [`crate::page::PageHandle`] together behind
//! `open`/`create` constructors (spec.md §2 "control flow for a
//! read/write").

use std::path::Path;

use crate::buffer::{ReadBackend, ReadBuffer, WriteBackend, WriteBuffer};
use crate::header::{HeaderIo, PlainTextHeader};
use crate::layout::Layout;
use crate::page::PageHandle;

/// An open SDDS-format file, positioned at the start of its page stream.
///
/// `open` parses the textual header via [`PlainTextHeader`] and hands the
/// remaining reader to a read-mode [`PageHandle`]; `create` writes the
/// header and hands a write-mode `PageHandle`. Callers drive pages
/// through [`SddsFile::pages`].
pub struct SddsFile {
    pages: PageHandle,
}

impl SddsFile {
    /// Open an existing file for reading. Compression is dispatched by
    /// file extension (spec.md §6.4).
    pub fn open(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        let backend = ReadBackend::open(path)?;

        // A one-byte-at-a-time BufReader never reads past the header's
        // trailing "end" line, so the wrapped backend is left positioned
        // exactly at the start of the binary page stream once `into_inner`
        // hands it back.
        let mut header_reader = std::io::BufReader::with_capacity(1, backend);
        let layout = PlainTextHeader.read_layout(&mut header_reader)?;
        let backend = header_reader.into_inner();

        let capacity = crate::config::io_buffer_capacity();
        let read_buf = ReadBuffer::new(backend, capacity);

        Ok(SddsFile {
            pages: PageHandle::for_reading(layout, read_buf),
        })
    }

    /// Create (truncating) a new file for writing, emitting `layout`'s
    /// textual header immediately.
    ///
    /// If `SDDS_OUTPUT_ENDIANESS` forces a non-host byte order (spec.md
    /// §4.5 write-page step 1, §6.5), `layout.declared_byte_order` is
    /// overridden before the header is emitted, so every page written
    /// through this handle — and the header a reader parses back — agree
    /// on the order actually used on the wire.
    pub fn create(path: impl AsRef<Path>, mut layout: Layout) -> crate::Result<Self> {
        let path = path.as_ref();
        if let Some(forced) = crate::config::forced_output_byte_order() {
            layout.declared_byte_order = forced;
        }
        let mut header_bytes = Vec::new();
        PlainTextHeader.write_layout(&mut header_bytes, &layout)?;

        let supports_seek = matches!(crate::buffer::compression_for_path(path), crate::buffer::Compression_::Plain);
        let backend = WriteBackend::create(path)?;
        let capacity = crate::config::io_buffer_capacity();

        let mut write_buf = WriteBuffer::new(backend, capacity);
        write_buf.write(&header_bytes)?;

        Ok(SddsFile {
            pages: PageHandle::for_writing(layout, write_buf, supports_seek),
        })
    }

    /// The underlying page handle (write_page/read_page/update_page/
    /// end_page/terminate/read_new_rows).
    pub fn pages(&mut self) -> &mut PageHandle {
        &mut self.pages
    }

    pub fn layout(&self) -> &Layout {
        self.pages.layout()
    }
}
