//! Rank-partitioned ("MPI-like") parallel page I/O over a shared file
//! (spec.md §4.6).
//!
//! No MPI crate exists anywhere in the example pack, so the collective
//! primitives this module needs — broadcast, all-reduce, barrier — are
//! implemented over `crossbeam-channel` for an in-process, multi-thread
//! "communicator" of ranks sharing one file handle. A real deployment
//! would swap [`ThreadCommunicator`] for an MPI binding behind the same
//! [`Communicator`] trait; nothing above this module depends on which one
//! is in use.

use std::sync::{Arc, Barrier};

use crossbeam_channel::{Receiver, Sender};

use crate::codec::{self, Value};
use crate::layout::Layout;

/// Collective operations a parallel page engine needs across `N` ranks
/// sharing one file (spec.md §4.6). Implementations must guarantee that
/// `broadcast_from_root`/`all_reduce_sum_u64`/`all_reduce_min_u64`/`barrier`
/// observe every rank's call before any rank proceeds past them.
pub trait Communicator: Clone {
    fn rank(&self) -> usize;
    fn size(&self) -> usize;
    fn broadcast_from_root(&self, payload: &mut Vec<u8>);
    fn all_reduce_sum_u64(&self, local: u64) -> u64;
    fn all_reduce_min_u64(&self, local: u64) -> u64;
    fn barrier(&self);
}

/// A trivial single-rank communicator — `N = 1`, every collective call is
/// a no-op. Useful for testing the row-partition math and for a
/// single-process fallback.
#[derive(Debug, Clone, Copy)]
pub struct SingleRankCommunicator;

impl Communicator for SingleRankCommunicator {
    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
    fn broadcast_from_root(&self, _payload: &mut Vec<u8>) {}
    fn all_reduce_sum_u64(&self, local: u64) -> u64 {
        local
    }
    fn all_reduce_min_u64(&self, local: u64) -> u64 {
        local
    }
    fn barrier(&self) {}
}

/// An in-process communicator backed by one broadcast channel and a
/// shared barrier, used to simulate `N` MPI ranks with `N` threads in the
/// same process (tests, and the single-machine "no real MPI available"
/// deployment case).
pub struct ThreadCommunicator {
    rank: usize,
    size: usize,
    barrier: Arc<Barrier>,
    bcast_tx: Sender<Vec<u8>>,
    bcast_rx: Receiver<Vec<u8>>,
    reduce_tx: Sender<u64>,
    reduce_rx: Receiver<u64>,
    min_reduce_tx: Sender<u64>,
    min_reduce_rx: Receiver<u64>,
}

impl Clone for ThreadCommunicator {
    fn clone(&self) -> Self {
        ThreadCommunicator {
            rank: self.rank,
            size: self.size,
            barrier: Arc::clone(&self.barrier),
            bcast_tx: self.bcast_tx.clone(),
            bcast_rx: self.bcast_rx.clone(),
            reduce_tx: self.reduce_tx.clone(),
            reduce_rx: self.reduce_rx.clone(),
            min_reduce_tx: self.min_reduce_tx.clone(),
            min_reduce_rx: self.min_reduce_rx.clone(),
        }
    }
}

impl ThreadCommunicator {
    /// Build `size` communicators, one per simulated rank, sharing one
    /// barrier and one pair of broadcast channels.
    pub fn group(size: usize) -> Vec<ThreadCommunicator> {
        let barrier = Arc::new(Barrier::new(size));
        let (bcast_tx, bcast_rx) = crossbeam_channel::unbounded();
        let (reduce_tx, reduce_rx) = crossbeam_channel::unbounded();
        let (min_reduce_tx, min_reduce_rx) = crossbeam_channel::unbounded();
        (0..size)
            .map(|rank| ThreadCommunicator {
                rank,
                size,
                barrier: Arc::clone(&barrier),
                bcast_tx: bcast_tx.clone(),
                bcast_rx: bcast_rx.clone(),
                reduce_tx: reduce_tx.clone(),
                reduce_rx: reduce_rx.clone(),
                min_reduce_tx: min_reduce_tx.clone(),
                min_reduce_rx: min_reduce_rx.clone(),
            })
            .collect()
    }
}

impl Communicator for ThreadCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn broadcast_from_root(&self, payload: &mut Vec<u8>) {
        if self.rank == 0 {
            for _ in 1..self.size {
                self.bcast_tx.send(payload.clone()).expect("broadcast channel closed");
            }
        } else {
            *payload = self.bcast_rx.recv().expect("broadcast channel closed");
        }
        self.barrier.wait();
    }

    fn all_reduce_sum_u64(&self, local: u64) -> u64 {
        self.reduce_tx.send(local).expect("reduce channel closed");
        self.barrier.wait();
        let mut total = 0;
        for _ in 0..self.size {
            total += self.reduce_rx.recv().expect("reduce channel closed");
        }
        self.barrier.wait();
        total
    }

    fn all_reduce_min_u64(&self, local: u64) -> u64 {
        self.min_reduce_tx.send(local).expect("min-reduce channel closed");
        self.barrier.wait();
        let mut min = u64::MAX;
        for _ in 0..self.size {
            min = min.min(self.min_reduce_rx.recv().expect("min-reduce channel closed"));
        }
        self.barrier.wait();
        min
    }

    fn barrier(&self) {
        self.barrier.wait();
    }
}

/// This rank's contiguous slice of `[0, total_rows)` (spec.md §4.6 "Row
/// partition"). `master_read = false` excludes rank 0 from the
/// partition; otherwise all `N` ranks share it.
pub fn row_partition(total_rows: usize, rank: usize, size: usize, master_read: bool) -> (usize, usize) {
    if !master_read {
        if rank == 0 || size <= 1 {
            return (0, 0);
        }
        let workers = size - 1;
        let worker_rank = rank - 1;
        let base = total_rows / workers;
        let extra = total_rows % workers;
        let start = worker_rank * base + worker_rank.min(extra);
        let count = base + if worker_rank < extra { 1 } else { 0 };
        (start, count)
    } else {
        let base = total_rows / size;
        let extra = total_rows % size;
        let start = rank * base + rank.min(extra);
        let count = base + if rank < extra { 1 } else { 0 };
        (start, count)
    }
}

/// Fixed width used for string columns in parallel row-mode I/O when the
/// caller hasn't overridden [`crate::config::string_column_width`].
pub fn default_string_width() -> usize {
    crate::config::string_column_width()
}

/// Row-major on-wire stride for parallel row-mode I/O: `Str` columns carry
/// no length prefix there (spec.md §4.6 — "right-padded or truncated to a
/// fixed width `W`"), unlike the length-prefixed general-purpose stride
/// [`Layout::fixed_row_stride`] computes, so this is not reused.
fn parallel_row_stride(layout: &Layout, string_width: usize) -> usize {
    layout
        .columns()
        .iter()
        .map(|col| col.scalar_type.fixed_size().unwrap_or(string_width))
        .sum()
}

/// Rank-partitioned writer for one page: every rank writes its local rows
/// row-major at its partition's byte offset, then participates in an
/// all-reduce to compute the new file-level row count (spec.md §4.6
/// "Write"). String columns are fixed-width truncated/padded in row-mode
/// (§4.6); only collective writes and column-major I/O reject them.
pub struct ParallelPageWriter<'a, C: Communicator> {
    comm: &'a C,
    layout: &'a Layout,
    column_stride: usize,
    string_width: usize,
    header_end_offset: u64,
}

impl<'a, C: Communicator> ParallelPageWriter<'a, C> {
    pub fn new(comm: &'a C, layout: &'a Layout, header_end_offset: u64) -> crate::Result<Self> {
        let string_width = default_string_width();
        let stride = parallel_row_stride(layout, string_width);
        Ok(ParallelPageWriter {
            comm,
            layout,
            column_stride: stride,
            string_width,
            header_end_offset,
        })
    }

    pub fn column_stride(&self) -> usize {
        self.column_stride
    }

    /// Write this rank's rows at its partitioned offset in `backend`.
    /// Returns the global row count after the all-reduce barrier. Only
    /// rank 0's caller should act on the returned count to patch the
    /// row-count field (per spec.md's "only rank 0 rewrites the
    /// row-count field").
    pub fn write_rows(
        &self,
        write_buf: &mut crate::buffer::WriteBuffer,
        rows: &[Vec<Value>],
        total_rows_hint: usize,
        master_read: bool,
    ) -> crate::Result<u64> {
        let (start_row, count) = row_partition(total_rows_hint, self.comm.rank(), self.comm.size(), master_read);
        if rows.len() != count {
            return Err(crate::SddsError::Format(format!(
                "rank {} expected {} rows for its partition, got {}",
                self.comm.rank(),
                count,
                rows.len()
            )));
        }

        let offset = self.header_end_offset + (start_row * self.column_stride) as u64;
        write_buf.flush()?;
        write_buf.backend_mut().seek(std::io::SeekFrom::Start(offset))?;
        for row in rows {
            self.write_one_row_fixed_width(write_buf, row)?;
        }
        write_buf.flush()?;

        self.comm.barrier();
        let local = rows.len() as u64;
        Ok(self.comm.all_reduce_sum_u64(local))
    }

    /// Write one row, truncating/padding `Str` columns to `self.string_width`
    /// (spec.md §4.6 row-mode string handling). Used by [`Self::write_rows`]
    /// only — the collective path (`write_rows_collective`) rejects strings
    /// entirely and uses [`Self::write_one_row`] instead.
    fn write_one_row_fixed_width(&self, write_buf: &mut crate::buffer::WriteBuffer, row: &[Value]) -> crate::Result<()> {
        for (def, value) in self.layout.columns().iter().zip(row) {
            if def.write_only {
                continue;
            }
            match value {
                Value::Str(s) => codec::write_fixed_width_string(write_buf, s, self.string_width)?,
                other => codec::write_scalar(write_buf, other, self.layout.declared_byte_order)?,
            }
        }
        Ok(())
    }

    /// Collective-mode write (spec.md §4.6 "Collective mode"): every rank
    /// must issue the same number of row-writes, so the ranks first
    /// reduce their local row counts to the global minimum and write that
    /// many rows together; any rows past the minimum are each rank's own
    /// "surplus" and are written individually afterward, before the final
    /// flush and row-count all-reduce.
    pub fn write_rows_collective(
        &self,
        write_buf: &mut crate::buffer::WriteBuffer,
        rows: &[Vec<Value>],
        start_row: usize,
    ) -> crate::Result<u64> {
        if self.layout.columns().iter().any(|c| c.scalar_type == crate::layout::ScalarType::Str) {
            return Err(crate::SddsError::Format(
                "string columns are not supported in collective parallel I/O".into(),
            ));
        }
        let local = rows.len() as u64;
        let collective_count = self.comm.all_reduce_min_u64(local) as usize;

        let offset = self.header_end_offset + (start_row * self.column_stride) as u64;
        write_buf.flush()?;
        write_buf.backend_mut().seek(std::io::SeekFrom::Start(offset))?;
        for row in &rows[..collective_count] {
            self.write_one_row(write_buf, row)?;
        }
        write_buf.flush()?;
        self.comm.barrier();

        for row in &rows[collective_count..] {
            self.write_one_row(write_buf, row)?;
        }
        write_buf.flush()?;

        self.comm.barrier();
        Ok(self.comm.all_reduce_sum_u64(local))
    }

    fn write_one_row(&self, write_buf: &mut crate::buffer::WriteBuffer, row: &[Value]) -> crate::Result<()> {
        for (def, value) in self.layout.columns().iter().zip(row) {
            if def.write_only {
                continue;
            }
            codec::write_scalar(write_buf, value, self.layout.declared_byte_order)?;
        }
        Ok(())
    }
}

/// Rank-partitioned reader for one page: every rank seeks to its
/// partition's byte offset and reads its row slice (spec.md §4.6 "Read").
/// `Str` columns are read back via the same fixed-width codec the writer
/// uses; only the collective path rejects them.
pub struct ParallelPageReader<'a, C: Communicator> {
    comm: &'a C,
    layout: &'a Layout,
    column_stride: usize,
    string_width: usize,
    header_end_offset: u64,
}

impl<'a, C: Communicator> ParallelPageReader<'a, C> {
    pub fn new(comm: &'a C, layout: &'a Layout, header_end_offset: u64) -> crate::Result<Self> {
        let string_width = default_string_width();
        let stride = parallel_row_stride(layout, string_width);
        Ok(ParallelPageReader {
            comm,
            layout,
            column_stride: stride,
            string_width,
            header_end_offset,
        })
    }

    pub fn column_stride(&self) -> usize {
        self.column_stride
    }

    /// Read this rank's partition of `total_rows` rows, row-major, at its
    /// partitioned seek offset. Returns `(start_row, rows)`.
    pub fn read_rows(
        &self,
        read_buf: &mut crate::buffer::ReadBuffer,
        total_rows: usize,
        master_read: bool,
    ) -> crate::Result<(usize, Vec<Vec<Value>>)> {
        let (start_row, count) = row_partition(total_rows, self.comm.rank(), self.comm.size(), master_read);
        let offset = self.header_end_offset + (start_row * self.column_stride) as u64;
        read_buf.backend_mut().seek(std::io::SeekFrom::Start(offset))?;
        read_buf.invalidate();

        let mut rows = Vec::with_capacity(count);
        for _ in 0..count {
            let mut row = Vec::with_capacity(self.layout.columns().len());
            for def in self.layout.columns() {
                if def.scalar_type == crate::layout::ScalarType::Str {
                    let (value, _) = codec::read_fixed_width_string(read_buf, self.string_width)?;
                    if !def.write_only {
                        row.push(Value::Str(value));
                    }
                    continue;
                }
                if def.write_only {
                    codec::skip_scalar(read_buf, def.scalar_type, self.layout.declared_byte_order)?;
                    continue;
                }
                let (value, _) = codec::read_scalar(read_buf, def.scalar_type, self.layout.declared_byte_order)?;
                row.push(value);
            }
            rows.push(row);
        }
        Ok((start_row, rows))
    }
}

/// Manual binary encoding for the per-page "title" (row count, parameters,
/// and arrays) broadcast from rank 0 to every other rank (spec.md §4.6
/// "Title broadcast"). This is an in-process rank-to-rank transport, always
/// host-endian, distinct from the on-disk wire format the title describes.
fn encode_title(total_rows: i64, parameters: &[Value], arrays: &[crate::page::ArrayData]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&total_rows.to_ne_bytes());

    out.extend_from_slice(&(parameters.len() as u32).to_ne_bytes());
    for p in parameters {
        encode_value(&mut out, p);
    }

    out.extend_from_slice(&(arrays.len() as u32).to_ne_bytes());
    for a in arrays {
        out.extend_from_slice(&(a.dimensions.len() as u32).to_ne_bytes());
        for d in &a.dimensions {
            out.extend_from_slice(&d.to_ne_bytes());
        }
        out.extend_from_slice(&(a.elements.len() as u32).to_ne_bytes());
        for v in &a.elements {
            encode_value(&mut out, v);
        }
    }
    out
}

fn decode_title(bytes: &[u8]) -> (i64, Vec<Value>, Vec<crate::page::ArrayData>) {
    let mut pos = 0usize;
    let total_rows = i64::from_ne_bytes(bytes[pos..pos + 8].try_into().unwrap());
    pos += 8;

    let nparams = u32::from_ne_bytes(bytes[pos..pos + 4].try_into().unwrap()) as usize;
    pos += 4;
    let mut parameters = Vec::with_capacity(nparams);
    for _ in 0..nparams {
        parameters.push(decode_value(bytes, &mut pos));
    }

    let narrays = u32::from_ne_bytes(bytes[pos..pos + 4].try_into().unwrap()) as usize;
    pos += 4;
    let mut arrays = Vec::with_capacity(narrays);
    for _ in 0..narrays {
        let ndims = u32::from_ne_bytes(bytes[pos..pos + 4].try_into().unwrap()) as usize;
        pos += 4;
        let mut dimensions = Vec::with_capacity(ndims);
        for _ in 0..ndims {
            dimensions.push(i32::from_ne_bytes(bytes[pos..pos + 4].try_into().unwrap()));
            pos += 4;
        }
        let nelem = u32::from_ne_bytes(bytes[pos..pos + 4].try_into().unwrap()) as usize;
        pos += 4;
        let mut elements = Vec::with_capacity(nelem);
        for _ in 0..nelem {
            elements.push(decode_value(bytes, &mut pos));
        }
        arrays.push(crate::page::ArrayData { dimensions, elements });
    }

    (total_rows, parameters, arrays)
}

fn encode_value(out: &mut Vec<u8>, v: &Value) {
    match v {
        Value::I16(x) => {
            out.push(0);
            out.extend_from_slice(&x.to_ne_bytes());
        }
        Value::U16(x) => {
            out.push(1);
            out.extend_from_slice(&x.to_ne_bytes());
        }
        Value::I32(x) => {
            out.push(2);
            out.extend_from_slice(&x.to_ne_bytes());
        }
        Value::U32(x) => {
            out.push(3);
            out.extend_from_slice(&x.to_ne_bytes());
        }
        Value::I64(x) => {
            out.push(4);
            out.extend_from_slice(&x.to_ne_bytes());
        }
        Value::U64(x) => {
            out.push(5);
            out.extend_from_slice(&x.to_ne_bytes());
        }
        Value::F32(x) => {
            out.push(6);
            out.extend_from_slice(&x.to_ne_bytes());
        }
        Value::F64(x) => {
            out.push(7);
            out.extend_from_slice(&x.to_ne_bytes());
        }
        Value::Char(x) => {
            out.push(8);
            out.push(*x);
        }
        Value::Str(s) => {
            out.push(9);
            let bytes = s.as_bytes();
            out.extend_from_slice(&(bytes.len() as u32).to_ne_bytes());
            out.extend_from_slice(bytes);
        }
    }
}

fn decode_value(bytes: &[u8], pos: &mut usize) -> Value {
    let tag = bytes[*pos];
    *pos += 1;
    macro_rules! take {
        ($n:expr) => {{
            let s = &bytes[*pos..*pos + $n];
            *pos += $n;
            s
        }};
    }
    match tag {
        0 => Value::I16(i16::from_ne_bytes(take!(2).try_into().unwrap())),
        1 => Value::U16(u16::from_ne_bytes(take!(2).try_into().unwrap())),
        2 => Value::I32(i32::from_ne_bytes(take!(4).try_into().unwrap())),
        3 => Value::U32(u32::from_ne_bytes(take!(4).try_into().unwrap())),
        4 => Value::I64(i64::from_ne_bytes(take!(8).try_into().unwrap())),
        5 => Value::U64(u64::from_ne_bytes(take!(8).try_into().unwrap())),
        6 => Value::F32(f32::from_ne_bytes(take!(4).try_into().unwrap())),
        7 => Value::F64(f64::from_ne_bytes(take!(8).try_into().unwrap())),
        8 => Value::Char(take!(1)[0]),
        9 => {
            let len = u32::from_ne_bytes(take!(4).try_into().unwrap()) as usize;
            let s = String::from_utf8(take!(len).to_vec()).expect("utf8 title payload");
            Value::Str(s)
        }
        _ => unreachable!("unknown title value tag {tag}"),
    }
}

/// Broadcast one page's row count, parameters, and arrays from rank 0 to
/// every rank (spec.md §4.6 "Title broadcast"), so every rank reconstructs
/// identical in-memory state before reading or writing its row partition.
/// Rank 0 passes `Some(title)`; every other rank passes `None` and gets the
/// reconstructed title back in the return value.
pub fn broadcast_title<C: Communicator>(
    comm: &C,
    title: Option<(i64, &[Value], &[crate::page::ArrayData])>,
) -> (i64, Vec<Value>, Vec<crate::page::ArrayData>) {
    let mut payload = match title {
        Some((total_rows, parameters, arrays)) => encode_title(total_rows, parameters, arrays),
        None => Vec::new(),
    };
    comm.broadcast_from_root(&mut payload);
    decode_title(&payload)
}
