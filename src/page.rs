//! Page lifecycle: `write_page`, `update_page`, `read_page`, sparsing,
//! recovery (spec.md §4.5, §7).
//!
//! A handle is a small state machine (`Idle → HeaderRead → PageOpen{...} →
//! PageClosed → ... → Terminated`); each public method checks the current
//! state before touching the buffer and returns `SddsError::State` rather
//! than panicking on a misordered call sequence.

use std::collections::VecDeque;

use crate::buffer::{ReadBuffer, ReadOutcome, WriteBuffer};
use crate::byteorder::{self, ByteOrderKind};
use crate::codec::{self, Value};
use crate::constants::ROW_COUNT_ESCAPE;
use crate::layout::Layout;
use crate::tokenizer::FixedValueParser;

/// Lifecycle state of one page handle (spec.md §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    Idle,
    HeaderRead,
    PageOpenReading,
    PageOpenWriting,
    PageClosed,
    Terminated,
}

/// One array's dimensions and flattened element values, in the order the
/// wire format expects (spec.md §6.1).
#[derive(Debug, Clone)]
pub struct ArrayData {
    pub dimensions: Vec<i32>,
    pub elements: Vec<Value>,
}

impl ArrayData {
    /// `Π dimensions[i]`; zero if any dimension is zero (invariant 4).
    pub fn element_count(&self) -> usize {
        self.dimensions.iter().map(|&d| d.max(0) as usize).product()
    }
}

/// In-memory page contents supplied to [`PageHandle::write_page`] or
/// returned from [`PageHandle::read_page`].
#[derive(Debug, Clone, Default)]
pub struct PageData {
    /// On [`PageHandle::write_page`]: one value per parameter def with no
    /// `fixed_value` — fixed-value defs are skipped, their value already
    /// baked into the header text (spec.md §4.4). On
    /// [`PageHandle::read_page`]: one value per parameter def in
    /// layout order, with fixed-value defs filled in from the parsed
    /// fixed value rather than read from the wire (spec.md §8: "write_page
    /// then read_page returns the parsed fixed value, not re-encoded").
    pub parameters: Vec<Value>,
    pub arrays: Vec<ArrayData>,
    /// `rows[i][c]` — row-major regardless of `layout.column_major`;
    /// `write_page` transposes internally for column-major files.
    pub rows: Vec<Vec<Value>>,
    /// `row_flag` (spec.md §3): 1 = row of interest. Ignored for
    /// column-major writes.
    pub row_flags: Vec<bool>,
}

/// Aggregate requested by `sparse_statistics` (spec.md §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SparseStatistic {
    #[default]
    None,
    Mean,
    Median,
    Min,
    Max,
}

/// Row-selection and aggregation options for [`PageHandle::read_page`].
#[derive(Debug, Clone, Copy)]
pub struct ReadOptions {
    pub sparse_interval: usize,
    pub sparse_offset: usize,
    pub last_rows: usize,
    pub sparse_statistics: SparseStatistic,
    pub auto_recover: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        ReadOptions {
            sparse_interval: 1,
            sparse_offset: 0,
            last_rows: 0,
            sparse_statistics: SparseStatistic::None,
            auto_recover: false,
        }
    }
}

/// `FLUSH_TABLE` semantics for [`PageHandle::update_page`] (spec.md §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    Append,
    AppendAndFlushTable,
}

fn aggregate(values: &[f64], stat: SparseStatistic) -> f64 {
    match stat {
        SparseStatistic::None => values.last().copied().unwrap_or(0.0),
        SparseStatistic::Mean => values.iter().sum::<f64>() / values.len() as f64,
        SparseStatistic::Median => {
            let mut sorted = values.to_vec();
            sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
            let mid = sorted.len() / 2;
            if sorted.len() % 2 == 0 {
                (sorted[mid - 1] + sorted[mid]) / 2.0
            } else {
                sorted[mid]
            }
        }
        SparseStatistic::Min => values.iter().cloned().fold(f64::INFINITY, f64::min),
        SparseStatistic::Max => values.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
    }
}

/// Round a row count up per `fixed_row_count` (spec.md §6.3):
/// `(count / increment + 2) × increment`.
pub fn rounded_fixed_count(count: i64, increment: u32) -> i64 {
    let increment = increment as i64;
    (count / increment + 2) * increment
}

/// A single handle over one SDDS-format file's page stream. Does not own
/// the header text itself (see [`crate::header::HeaderIo`]); the caller
/// is responsible for reading/writing the header before constructing a
/// handle for the binary page region.
pub struct PageHandle {
    layout: Layout,
    state: PageState,
    read_buf: Option<ReadBuffer>,
    write_buf: Option<WriteBuffer>,
    supports_seek: bool,
    row_count_limit: i64,

    rowcount_offset: u64,
    n_rows_written: i64,
    first_row_in_mem: i64,
    last_row_written: i64,

    error_ring: VecDeque<String>,
    read_recovery_possible: bool,

    page_number: i64,
}

impl PageHandle {
    /// Begin a write handle over `write_buf`, whose cursor is positioned
    /// immediately after the textual header.
    pub fn for_writing(layout: Layout, write_buf: WriteBuffer, supports_seek: bool) -> Self {
        PageHandle {
            layout,
            state: PageState::HeaderRead,
            read_buf: None,
            write_buf: Some(write_buf),
            supports_seek,
            row_count_limit: crate::config::row_count_limit(),
            rowcount_offset: 0,
            n_rows_written: 0,
            first_row_in_mem: 0,
            last_row_written: -1,
            error_ring: VecDeque::new(),
            read_recovery_possible: false,
            page_number: 0,
        }
    }

    /// Begin a read handle over `read_buf`, positioned immediately after
    /// the textual header.
    pub fn for_reading(layout: Layout, read_buf: ReadBuffer) -> Self {
        PageHandle {
            layout,
            state: PageState::HeaderRead,
            read_buf: Some(read_buf),
            write_buf: None,
            supports_seek: false,
            row_count_limit: crate::config::row_count_limit(),
            rowcount_offset: 0,
            n_rows_written: 0,
            first_row_in_mem: 0,
            last_row_written: -1,
            error_ring: VecDeque::new(),
            read_recovery_possible: false,
            page_number: 0,
        }
    }

    pub fn state(&self) -> PageState {
        self.state
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    fn push_error(&mut self, msg: impl Into<String>) {
        self.error_ring.push_back(msg.into());
    }

    /// Pop and format all queued error messages, oldest first (spec.md
    /// §7's `print_errors` entry point).
    pub fn print_errors(&mut self) -> Vec<String> {
        self.error_ring.drain(..).collect()
    }

    /// One-shot latch: true if the last `read_page` failed mid-page with
    /// a short read and recovery was not enabled. Clears on read.
    pub fn read_recovery_possible(&mut self) -> bool {
        std::mem::replace(&mut self.read_recovery_possible, false)
    }

    fn order(&self) -> ByteOrderKind {
        self.layout.declared_byte_order
    }

    fn write_row_count(buf: &mut WriteBuffer, count: i64, order: ByteOrderKind) -> crate::Result<()> {
        if count > i32::MAX as i64 {
            let escape = ROW_COUNT_ESCAPE;
            let mut escape_u = escape as u32;
            let mut count_u = count as u64;
            if byteorder::needs_swap(order) {
                byteorder::swap32(&mut escape_u);
                byteorder::swap64(&mut count_u);
            }
            buf.write(&escape_u.to_ne_bytes())?;
            buf.write(&count_u.to_ne_bytes())?;
        } else {
            let mut count_u = count as u32;
            if byteorder::needs_swap(order) {
                byteorder::swap32(&mut count_u);
            }
            buf.write(&count_u.to_ne_bytes())?;
        }
        Ok(())
    }

    fn declared_row_count(&self, raw_rows: i64) -> i64 {
        if self.layout.fixed_row_count {
            rounded_fixed_count(raw_rows, self.layout.fixed_row_increment)
        } else {
            raw_rows
        }
    }

    /// Write a complete page: row count, parameters, arrays, then
    /// columns (column-major) or rows (row-major) (spec.md §4.5 "Write
    /// page").
    pub fn write_page(&mut self, page: &PageData) -> crate::Result<()> {
        if !matches!(self.state, PageState::HeaderRead | PageState::PageClosed) {
            return Err(crate::SddsError::State(format!(
                "write_page is illegal in state {:?}",
                self.state
            )));
        }
        let order = self.order();
        let raw_rows = if self.layout.column_major {
            page.rows.len() as i64
        } else {
            page.row_flags.iter().filter(|&&f| f).count() as i64
        };
        let stored_rows = self.declared_row_count(raw_rows);

        let write_buf = self
            .write_buf
            .as_mut()
            .ok_or_else(|| crate::SddsError::State("no write buffer attached".into()))?;

        self.rowcount_offset = write_buf.backend_mut().stream_position().unwrap_or(0);
        Self::write_row_count(write_buf, stored_rows, order)?;

        write_parameters(write_buf, &self.layout, &page.parameters, order)?;
        write_arrays(write_buf, &self.layout, &page.arrays, order)?;

        if self.layout.column_major {
            write_columns(write_buf, &self.layout, &page.rows, order)?;
        } else {
            write_rows(write_buf, &self.layout, &page.rows, &page.row_flags, order)?;
        }

        write_buf.flush()?;
        self.n_rows_written = raw_rows;
        self.first_row_in_mem = 0;
        self.last_row_written = raw_rows - 1;
        self.state = PageState::PageOpenWriting;
        self.page_number += 1;
        Ok(())
    }

    /// Patch the row count and append rows beyond `last_row_written`
    /// (spec.md §4.5 "Update page"). Only legal on a seekable (plain)
    /// sink already in the "writing" state.
    pub fn update_page(
        &mut self,
        page: &PageData,
        total_in_memory_rows: i64,
        mode: UpdateMode,
    ) -> crate::Result<()> {
        if self.state != PageState::PageOpenWriting {
            return Err(crate::SddsError::State(
                "update_page requires a page already opened for writing".into(),
            ));
        }
        if !self.supports_seek {
            return Err(crate::SddsError::State(
                "update_page is not supported on a non-seekable (compressed) sink".into(),
            ));
        }
        let order = self.order();
        let new_rows = total_in_memory_rows + self.first_row_in_mem;
        if new_rows < self.n_rows_written {
            return Err(crate::SddsError::Format(
                "update_page: in-memory row count decreased since last write".into(),
            ));
        }

        let write_buf = self
            .write_buf
            .as_mut()
            .ok_or_else(|| crate::SddsError::State("no write buffer attached".into()))?;
        write_buf.flush()?;
        let tail = write_buf.backend_mut().stream_position()?;

        let old_stored = self.declared_row_count(self.n_rows_written);
        let new_stored = self.declared_row_count(new_rows);
        if new_stored != old_stored {
            if old_stored <= i32::MAX as i64 && new_stored > i32::MAX as i64 && self.n_rows_written > 0 {
                return Err(crate::SddsError::Format(
                    "update_page: cannot cross the 32-bit row-count escape boundary mid-page".into(),
                ));
            }
            write_buf.backend_mut().seek(std::io::SeekFrom::Start(self.rowcount_offset))?;
            Self::write_row_count(write_buf, new_stored, order)?;
            write_buf.backend_mut().seek(std::io::SeekFrom::Start(tail))?;
        }

        if new_rows != self.n_rows_written {
            let start = (self.last_row_written + 1) as usize;
            let end = new_rows as usize;
            for i in start..end {
                if page.row_flags.get(i).copied().unwrap_or(true) {
                    write_row(write_buf, &self.layout, &page.rows[i], order)?;
                }
            }
        }

        write_buf.flush()?;
        self.n_rows_written = new_rows;
        self.last_row_written = new_rows - 1;

        if mode == UpdateMode::AppendAndFlushTable {
            self.first_row_in_mem = new_rows;
            self.last_row_written = -1;
            self.n_rows_written = new_rows;
        }
        Ok(())
    }

    /// Read one page, applying sparsing/statistics on the row-major path.
    /// Returns `Ok(None)` at a clean end of stream (spec.md §4.5 "never
    /// raises on EOF; returns page number -1" — modeled here as `None`).
    pub fn read_page(&mut self, opts: ReadOptions) -> crate::Result<Option<PageData>> {
        if !matches!(self.state, PageState::HeaderRead | PageState::PageClosed) {
            return Err(crate::SddsError::State(format!(
                "read_page is illegal in state {:?}",
                self.state
            )));
        }
        self.read_recovery_possible = false;
        let order = self.order();

        let read_buf = self
            .read_buf
            .as_mut()
            .ok_or_else(|| crate::SddsError::State("no read buffer attached".into()))?;

        let mut count_bytes = [0u8; 4];
        let outcome = read_buf.read(Some(&mut count_bytes), 4)?;
        if outcome == ReadOutcome::Eof {
            self.state = PageState::Terminated;
            return Ok(None);
        }
        let mut raw_count = i32::from_ne_bytes(count_bytes);
        if byteorder::needs_swap(order) {
            let mut u = raw_count as u32;
            byteorder::swap32(&mut u);
            raw_count = u as i32;
        }

        let row_count: i64 = if raw_count == ROW_COUNT_ESCAPE {
            let mut count64 = [0u8; 8];
            read_buf.read(Some(&mut count64), 8)?;
            let mut v = u64::from_ne_bytes(count64);
            if byteorder::needs_swap(order) {
                byteorder::swap64(&mut v);
            }
            v as i64
        } else {
            raw_count as i64
        };

        if row_count < 0 {
            self.push_error("negative row count on read".into());
            return Err(crate::SddsError::Format("negative row count".into()));
        }
        if order == ByteOrderKind::Unspecified
            && row_count > crate::constants::UNSPECIFIED_ORDER_PLAUSIBILITY_LIMIT
        {
            self.state = PageState::Terminated;
            return Ok(None);
        }
        if row_count > self.row_count_limit {
            self.state = PageState::Terminated;
            return Ok(None);
        }

        let parameters = read_parameters(read_buf, &self.layout, order)?;
        let arrays = read_arrays(read_buf, &self.layout, order)?;

        let result = if self.layout.column_major {
            let rows = read_columns(read_buf, &self.layout, row_count as usize, order);
            match rows {
                Ok(rows) => PageData {
                    parameters,
                    arrays,
                    rows,
                    row_flags: vec![true; row_count as usize],
                },
                Err(e) => {
                    self.push_error(e.to_string());
                    self.read_recovery_possible = true;
                    return Err(e);
                }
            }
        } else {
            match read_rows_sparse(read_buf, &self.layout, row_count as usize, order, &opts) {
                Ok(rows) => {
                    let flags = vec![true; rows.len()];
                    PageData {
                        parameters,
                        arrays,
                        rows,
                        row_flags: flags,
                    }
                }
                Err((partial_rows, e)) => {
                    if opts.auto_recover {
                        self.error_ring.clear();
                        let flags = vec![true; partial_rows.len()];
                        PageData {
                            parameters,
                            arrays,
                            rows: partial_rows,
                            row_flags: flags,
                        }
                    } else {
                        self.push_error(e.to_string());
                        self.read_recovery_possible = true;
                        return Err(e);
                    }
                }
            }
        };

        self.n_rows_written = row_count;
        self.last_row_written = row_count - 1;
        self.state = PageState::PageOpenReading;
        self.page_number += 1;
        Ok(Some(result))
    }

    /// Close the current page without terminating the handle.
    pub fn end_page(&mut self) -> crate::Result<()> {
        if let Some(buf) = self.write_buf.as_mut() {
            buf.flush()?;
        }
        self.state = PageState::PageClosed;
        Ok(())
    }

    /// Terminate the handle: flush and release buffers.
    pub fn terminate(&mut self) -> crate::Result<()> {
        if let Some(buf) = self.write_buf.as_mut() {
            buf.flush()?;
        }
        self.state = PageState::Terminated;
        Ok(())
    }

    /// Read-new-rows / follow mode (spec.md §4.5): on a plain, row-major,
    /// native-order file, query the on-disk row count and read any rows
    /// beyond `already_read`. Rejects compressed, column-major, or
    /// non-native files with `SddsError::State`.
    pub fn read_new_rows(&mut self, already_read: usize) -> crate::Result<Vec<Vec<Value>>> {
        if !self.supports_seek {
            return Err(crate::SddsError::State(
                "read_new_rows requires a seekable (plain) sink".into(),
            ));
        }
        if self.layout.column_major {
            return Err(crate::SddsError::State(
                "read_new_rows is not supported for column-major layouts".into(),
            ));
        }
        let order = self.order();
        if byteorder::needs_swap(order) {
            return Err(crate::SddsError::State(
                "read_new_rows requires native byte order".into(),
            ));
        }

        let read_buf = self
            .read_buf
            .as_mut()
            .ok_or_else(|| crate::SddsError::State("no read buffer attached".into()))?;

        let mut count_bytes = [0u8; 4];
        read_buf.backend_mut().seek(std::io::SeekFrom::Start(self.rowcount_offset))?;
        read_buf.invalidate();
        read_buf.read(Some(&mut count_bytes), 4)?;
        let on_disk_count = i32::from_ne_bytes(count_bytes) as i64;

        if on_disk_count as usize <= already_read {
            return Ok(Vec::new());
        }

        let mut rows = Vec::new();
        for _ in already_read..on_disk_count as usize {
            rows.push(read_row(read_buf, &self.layout, order)?);
        }
        Ok(rows)
    }
}

fn write_parameters(buf: &mut WriteBuffer, layout: &Layout, values: &[Value], order: ByteOrderKind) -> crate::Result<()> {
    let mut vi = 0;
    for def in layout.parameters() {
        if def.fixed_value.is_some() {
            continue;
        }
        let value = values
            .get(vi)
            .ok_or_else(|| crate::SddsError::Schema(format!("missing value for parameter {}", def.name)))?;
        codec::write_scalar(buf, value, order)?;
        vi += 1;
    }
    Ok(())
}

fn read_parameters(buf: &mut ReadBuffer, layout: &Layout, order: ByteOrderKind) -> crate::Result<Vec<Value>> {
    let tokenizer = crate::tokenizer::DefaultFixedValueParser;
    let mut out = Vec::with_capacity(layout.parameters().len());
    for def in layout.parameters() {
        if let Some(text) = &def.fixed_value {
            out.push(tokenizer.parse(text, def.scalar_type)?);
            continue;
        }
        let (value, outcome) = codec::read_scalar(buf, def.scalar_type, order)?;
        if outcome == ReadOutcome::Eof {
            return Err(crate::SddsError::ShortRead(format!(
                "unexpected end of stream reading parameter {}",
                def.name
            )));
        }
        out.push(value);
    }
    Ok(out)
}

fn write_arrays(buf: &mut WriteBuffer, layout: &Layout, arrays: &[ArrayData], order: ByteOrderKind) -> crate::Result<()> {
    let swap = byteorder::needs_swap(order);
    for (i, def) in layout.arrays().iter().enumerate() {
        // A def with no corresponding entry (caller supplied fewer arrays
        // than the layout declares) is written as a null array: all-zero
        // dimensions, no element bytes (spec.md §4.4/§6.1).
        let null = ArrayData {
            dimensions: vec![0; def.dimension_count],
            elements: Vec::new(),
        };
        let data = arrays.get(i).unwrap_or(&null);
        for &d in &data.dimensions {
            let mut u = d as u32;
            if swap {
                byteorder::swap32(&mut u);
            }
            buf.write(&u.to_ne_bytes())?;
        }
        let elements = data.element_count();
        if elements == 0 {
            continue;
        }
        for v in &data.elements {
            codec::write_scalar(buf, v, order)?;
        }
    }
    Ok(())
}

fn read_arrays(buf: &mut ReadBuffer, layout: &Layout, order: ByteOrderKind) -> crate::Result<Vec<ArrayData>> {
    let swap = byteorder::needs_swap(order);
    let mut out = Vec::new();
    for def in layout.arrays() {
        let mut dims = Vec::with_capacity(def.dimension_count);
        for _ in 0..def.dimension_count {
            let mut dim_bytes = [0u8; 4];
            buf.read(Some(&mut dim_bytes), 4)?;
            let mut d = u32::from_ne_bytes(dim_bytes) as i32;
            if swap {
                let mut u = d as u32;
                byteorder::swap32(&mut u);
                d = u as i32;
            }
            if d < 0 {
                return Err(crate::SddsError::Format(format!("negative dimension in array {}", def.field.name)));
            }
            dims.push(d);
        }
        let elements = dims.iter().map(|&d| d as usize).product::<usize>();
        let mut values = Vec::with_capacity(elements);
        for _ in 0..elements {
            let (v, outcome) = codec::read_scalar(buf, def.field.scalar_type, order)?;
            if outcome == ReadOutcome::Eof {
                return Err(crate::SddsError::ShortRead(format!(
                    "unexpected end of stream reading array {}",
                    def.field.name
                )));
            }
            values.push(v);
        }
        out.push(ArrayData {
            dimensions: dims,
            elements: values,
        });
    }
    Ok(out)
}

fn write_row(buf: &mut WriteBuffer, layout: &Layout, row: &[Value], order: ByteOrderKind) -> crate::Result<()> {
    for (def, value) in layout.columns().iter().zip(row) {
        if def.write_only {
            continue;
        }
        codec::write_scalar(buf, value, order)?;
    }
    Ok(())
}

fn write_rows(
    buf: &mut WriteBuffer,
    layout: &Layout,
    rows: &[Vec<Value>],
    row_flags: &[bool],
    order: ByteOrderKind,
) -> crate::Result<()> {
    for (i, row) in rows.iter().enumerate() {
        if row_flags.get(i).copied().unwrap_or(true) {
            write_row(buf, layout, row, order)?;
        }
    }
    Ok(())
}

fn write_columns(buf: &mut WriteBuffer, layout: &Layout, rows: &[Vec<Value>], order: ByteOrderKind) -> crate::Result<()> {
    for (c, def) in layout.columns().iter().enumerate() {
        if def.write_only {
            continue;
        }
        if def.scalar_type == crate::layout::ScalarType::Str {
            return Err(crate::SddsError::Format(
                "string columns are not permitted in column-major pages (invariant 2)".into(),
            ));
        }
        for row in rows {
            codec::write_scalar(buf, &row[c], order)?;
        }
    }
    Ok(())
}

fn read_row(buf: &mut ReadBuffer, layout: &Layout, order: ByteOrderKind) -> crate::Result<Vec<Value>> {
    let mut out = Vec::with_capacity(layout.columns().len());
    for def in layout.columns() {
        if def.write_only {
            codec::skip_scalar(buf, def.scalar_type, order)?;
            out.push(Value::I32(0));
            continue;
        }
        let (v, outcome) = codec::read_scalar(buf, def.scalar_type, order)?;
        if outcome == ReadOutcome::Eof {
            return Err(crate::SddsError::ShortRead(format!(
                "unexpected end of stream reading column {}",
                def.name
            )));
        }
        out.push(v);
    }
    Ok(out)
}

fn skip_row(buf: &mut ReadBuffer, layout: &Layout, order: ByteOrderKind) -> crate::Result<()> {
    for def in layout.columns() {
        codec::skip_scalar(buf, def.scalar_type, order)?;
    }
    Ok(())
}

fn read_columns(
    buf: &mut ReadBuffer,
    layout: &Layout,
    row_count: usize,
    order: ByteOrderKind,
) -> crate::Result<Vec<Vec<Value>>> {
    let mut columns: Vec<Vec<Value>> = Vec::with_capacity(layout.columns().len());
    for def in layout.columns() {
        if def.scalar_type == crate::layout::ScalarType::Str {
            return Err(crate::SddsError::Format(
                "string columns are not permitted in column-major pages (invariant 2)".into(),
            ));
        }
        let mut col = Vec::with_capacity(row_count);
        for _ in 0..row_count {
            let (v, outcome) = codec::read_scalar(buf, def.scalar_type, order)?;
            if outcome == ReadOutcome::Eof {
                return Err(crate::SddsError::ShortRead(format!(
                    "unexpected end of stream reading column {}",
                    def.name
                )));
            }
            col.push(v);
        }
        columns.push(col);
    }
    // transpose column-major storage into row-major PageData
    let mut rows = vec![Vec::with_capacity(columns.len()); row_count];
    for col in columns {
        for (r, v) in col.into_iter().enumerate() {
            rows[r].push(v);
        }
    }
    Ok(rows)
}

/// Row-major read with sparsing/statistics (spec.md §4.5 "Sparsing
/// semantics"). On a mid-page failure returns the rows decoded so far
/// alongside the error, letting the caller decide on `auto_recover`.
fn read_rows_sparse(
    buf: &mut ReadBuffer,
    layout: &Layout,
    row_count: usize,
    order: ByteOrderKind,
    opts: &ReadOptions,
) -> Result<Vec<Vec<Value>>, (Vec<Vec<Value>>, crate::SddsError)> {
    let mut sparse_interval = opts.sparse_interval.max(1);
    let mut sparse_offset = opts.sparse_offset;
    if opts.last_rows > 0 {
        sparse_interval = 1;
        sparse_offset = row_count.saturating_sub(opts.last_rows);
    }
    if sparse_offset > row_count {
        sparse_offset = row_count;
    }

    let mut out = Vec::new();

    for _ in 0..sparse_offset {
        if let Err(e) = skip_row(buf, layout, order) {
            return Err((out, e));
        }
    }

    let remaining = row_count - sparse_offset;
    let float_columns: Vec<usize> = layout
        .columns()
        .iter()
        .enumerate()
        .filter(|(_, d)| d.scalar_type.supports_statistics())
        .map(|(i, _)| i)
        .collect();

    if opts.sparse_statistics == SparseStatistic::None {
        for j in 0..remaining {
            if j % sparse_interval == 0 {
                match read_row(buf, layout, order) {
                    Ok(row) => out.push(row),
                    Err(e) => return Err((out, e)),
                }
            } else if let Err(e) = skip_row(buf, layout, order) {
                return Err((out, e));
            }
        }
    } else {
        let mut window: Vec<Vec<Value>> = Vec::new();
        for j in 0..remaining {
            match read_row(buf, layout, order) {
                Ok(row) => window.push(row),
                Err(e) => return Err((out, e)),
            }
            let window_full = (j + 1) % sparse_interval == 0;
            let last_row = j + 1 == remaining;
            if window_full || last_row {
                let mut representative = window.last().unwrap().clone();
                for &c in &float_columns {
                    let values: Vec<f64> = window.iter().filter_map(|r| r[c].as_f64()).collect();
                    if !values.is_empty() {
                        representative[c] = Value::F64(aggregate(&values, opts.sparse_statistics));
                    }
                }
                out.push(representative);
                window.clear();
            }
        }
    }

    Ok(out)
}
