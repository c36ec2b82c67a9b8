//! End-to-end scenarios exercising the public API together: header,
//! buffer, byteorder, codec, layout, and page modules driven through
//! [`sdds::file::SddsFile`] and [`sdds::page::PageHandle`] the way a real
//! caller would, rather than any one module's unit tests in isolation.

use sdds::buffer::{ReadBackend, ReadBuffer, WriteBackend, WriteBuffer};
use sdds::byteorder::ByteOrderKind;
use sdds::codec::{self, Value};
use sdds::constants::ROW_COUNT_ESCAPE;
use sdds::file::SddsFile;
use sdds::header::{HeaderIo, PlainTextHeader};
use sdds::layout::{DataMode, FieldDef, Layout, ScalarType};
use sdds::page::{ArrayData, PageData, ReadOptions, SparseStatistic, UpdateMode};
use sdds::parallel::{
    broadcast_title, row_partition, Communicator, ParallelPageReader, ParallelPageWriter, SingleRankCommunicator,
    ThreadCommunicator,
};
use tempfile::NamedTempFile;

fn two_column_layout() -> Layout {
    let mut layout = Layout::new(ByteOrderKind::Little, DataMode::Binary);
    layout.define_column(FieldDef::new("step", ScalarType::I32)).unwrap();
    layout.define_column(FieldDef::new("value", ScalarType::F64)).unwrap();
    layout
}

// ---------- S1: small native round trip ----------

#[test]
fn s1_small_native_round_trip() {
    let tmp = NamedTempFile::new().expect("create temp file");
    let layout = two_column_layout();

    let mut file = SddsFile::create(tmp.path(), layout).expect("create file");
    file.pages()
        .write_page(&PageData {
            parameters: vec![],
            arrays: vec![],
            rows: vec![
                vec![Value::I32(1), Value::F64(1.5)],
                vec![Value::I32(2), Value::F64(2.5)],
                vec![Value::I32(3), Value::F64(3.5)],
            ],
            row_flags: vec![true, true, true],
        })
        .expect("write page");
    file.pages().terminate().expect("terminate");

    let mut reopened = SddsFile::open(tmp.path()).expect("reopen file");
    assert_eq!(reopened.layout().columns().len(), 2);

    let page = reopened
        .pages()
        .read_page(ReadOptions::default())
        .expect("read page")
        .expect("page present");
    assert_eq!(page.rows.len(), 3);
    assert_eq!(page.rows[0], vec![Value::I32(1), Value::F64(1.5)]);
    assert_eq!(page.rows[2], vec![Value::I32(3), Value::F64(3.5)]);

    assert!(reopened.pages().read_page(ReadOptions::default()).unwrap().is_none());
}

#[test]
fn s1_fixed_value_parameter_round_trips_without_reencoding() {
    let tmp = NamedTempFile::new().expect("create temp file");
    let mut layout = two_column_layout();
    let mut step = FieldDef::new("step", ScalarType::I32);
    step.fixed_value = Some("7".to_string());
    layout.define_parameter(step).unwrap();

    let mut file = SddsFile::create(tmp.path(), layout).expect("create file");
    file.pages()
        .write_page(&PageData {
            // "step" has a fixed_value, so it contributes no entry here —
            // its value is baked into the header text, never the wire.
            parameters: vec![],
            arrays: vec![],
            rows: vec![vec![Value::I32(1), Value::F64(1.5)]],
            row_flags: vec![true],
        })
        .expect("write page");
    file.pages().terminate().expect("terminate");

    let mut reopened = SddsFile::open(tmp.path()).expect("reopen file");
    let page = reopened
        .pages()
        .read_page(ReadOptions::default())
        .expect("read page")
        .expect("page present");
    assert_eq!(page.parameters, vec![Value::I32(7)]);
}

#[test]
fn s1_gzip_and_xz_round_trip() {
    for ext in ["gz", "xz"] {
        let tmp = NamedTempFile::new().expect("create temp file");
        let path = tmp.path().with_extension(ext);

        let layout = two_column_layout();
        let mut file = SddsFile::create(&path, layout).expect("create compressed file");
        file.pages()
            .write_page(&PageData {
                parameters: vec![],
                arrays: vec![],
                rows: vec![vec![Value::I32(10), Value::F64(0.5)]],
                row_flags: vec![true],
            })
            .unwrap();
        file.pages().terminate().unwrap();

        let mut reopened = SddsFile::open(&path).expect("reopen compressed file");
        let page = reopened.pages().read_page(ReadOptions::default()).unwrap().unwrap();
        assert_eq!(page.rows, vec![vec![Value::I32(10), Value::F64(0.5)]]);

        let _ = std::fs::remove_file(&path);
    }
}

// ---------- S2: 32-bit escape to 64-bit row count ----------

#[test]
fn s2_escape_sentinel_decodes_a_64_bit_row_count() {
    // Hand-assemble a page whose row count is carried via the escape
    // protocol even though the actual count is small: i32::MIN sentinel
    // followed by the true count as a little-endian u64.
    let mut layout = Layout::new(ByteOrderKind::Little, DataMode::Binary);
    layout.define_column(FieldDef::new("x", ScalarType::I32)).unwrap();

    let tmp = NamedTempFile::new().unwrap();
    {
        let backend = WriteBackend::create(tmp.path()).unwrap();
        let mut wb = WriteBuffer::new(backend, 1024);
        wb.write(&ROW_COUNT_ESCAPE.to_le_bytes()).unwrap();
        wb.write(&3u64.to_le_bytes()).unwrap();
        for v in [Value::I32(7), Value::I32(8), Value::I32(9)] {
            codec::write_scalar(&mut wb, &v, ByteOrderKind::Little).unwrap();
        }
        wb.flush().unwrap();
    }

    let rbuf = ReadBuffer::new(ReadBackend::open(tmp.path()).unwrap(), 1024);
    let mut handle = sdds::page::PageHandle::for_reading(layout, rbuf);
    let page = handle.read_page(ReadOptions::default()).unwrap().unwrap();
    assert_eq!(page.rows, vec![vec![Value::I32(7)], vec![Value::I32(8)], vec![Value::I32(9)]]);
}

// ---------- S3: update_page grows a fixed-row-count bucket ----------

#[test]
fn s3_update_page_patches_count_and_appends_rows() {
    let tmp = NamedTempFile::new().unwrap();
    let layout = two_column_layout();

    let mut file = SddsFile::create(tmp.path(), layout).unwrap();

    let mut rows = vec![
        vec![Value::I32(1), Value::F64(1.0)],
        vec![Value::I32(2), Value::F64(2.0)],
    ];
    let mut flags = vec![true, true];
    file.pages()
        .write_page(&PageData {
            parameters: vec![],
            arrays: vec![],
            rows: rows.clone(),
            row_flags: flags.clone(),
        })
        .unwrap();

    for i in 3..=15 {
        rows.push(vec![Value::I32(i), Value::F64(i as f64)]);
        flags.push(true);
    }
    file.pages()
        .update_page(
            &PageData {
                parameters: vec![],
                arrays: vec![],
                rows: rows.clone(),
                row_flags: flags.clone(),
            },
            15,
            UpdateMode::Append,
        )
        .unwrap();
    file.pages().terminate().unwrap();

    let mut reopened = SddsFile::open(tmp.path()).unwrap();
    let page = reopened.pages().read_page(ReadOptions::default()).unwrap().unwrap();
    assert_eq!(page.rows.len(), 15);
    assert_eq!(page.rows[0], vec![Value::I32(1), Value::F64(1.0)]);
    assert_eq!(page.rows[14], vec![Value::I32(15), Value::F64(15.0)]);
}

#[test]
fn s3_rounded_fixed_count_grows_in_increment_sized_buckets() {
    use sdds::page::rounded_fixed_count;

    assert_eq!(rounded_fixed_count(2, 10), 20);
    assert_eq!(rounded_fixed_count(7, 10), 20);
    assert_eq!(rounded_fixed_count(11, 10), 30);
}

// ---------- S4: sparsing with per-window median ----------

#[test]
fn s4_sparse_interval_with_median_statistic() {
    let tmp = NamedTempFile::new().unwrap();
    let mut layout = Layout::new(ByteOrderKind::Little, DataMode::Binary);
    layout.define_column(FieldDef::new("v", ScalarType::F64)).unwrap();

    let mut file = SddsFile::create(tmp.path(), layout).unwrap();
    let rows: Vec<Vec<Value>> = (0..100).map(|i| vec![Value::F64(i as f64)]).collect();
    file.pages()
        .write_page(&PageData {
            parameters: vec![],
            arrays: vec![],
            rows,
            row_flags: vec![true; 100],
        })
        .unwrap();
    file.pages().terminate().unwrap();

    let mut reopened = SddsFile::open(tmp.path()).unwrap();
    let opts = ReadOptions {
        sparse_interval: 10,
        sparse_offset: 0,
        last_rows: 0,
        sparse_statistics: SparseStatistic::Median,
        auto_recover: false,
    };
    let page = reopened.pages().read_page(opts).unwrap().unwrap();
    assert_eq!(page.rows.len(), 10);
    let expected = [4.5, 14.5, 24.5, 34.5, 44.5, 54.5, 64.5, 74.5, 84.5, 94.5];
    for (row, exp) in page.rows.iter().zip(expected) {
        assert_eq!(row[0], Value::F64(exp));
    }
}

#[test]
fn s4_last_rows_overrides_interval_and_offset() {
    let tmp = NamedTempFile::new().unwrap();
    let mut layout = Layout::new(ByteOrderKind::Little, DataMode::Binary);
    layout.define_column(FieldDef::new("v", ScalarType::I32)).unwrap();

    let mut file = SddsFile::create(tmp.path(), layout).unwrap();
    let rows: Vec<Vec<Value>> = (0..20).map(|i| vec![Value::I32(i)]).collect();
    file.pages()
        .write_page(&PageData {
            parameters: vec![],
            arrays: vec![],
            rows,
            row_flags: vec![true; 20],
        })
        .unwrap();
    file.pages().terminate().unwrap();

    let mut reopened = SddsFile::open(tmp.path()).unwrap();
    let opts = ReadOptions {
        sparse_interval: 3,
        sparse_offset: 5,
        last_rows: 4,
        sparse_statistics: SparseStatistic::None,
        auto_recover: false,
    };
    let page = reopened.pages().read_page(opts).unwrap().unwrap();
    assert_eq!(page.rows, vec![vec![Value::I32(16)], vec![Value::I32(17)], vec![Value::I32(18)], vec![Value::I32(19)]]);
}

// ---------- S5: rank-partitioned parallel collective write ----------

#[test]
fn s5_three_rank_parallel_write_is_readable_as_one_page() {
    let layout = two_column_layout();
    let total_rows = 30usize;

    let mut header_bytes = Vec::new();
    PlainTextHeader.write_layout(&mut header_bytes, &layout).unwrap();
    let header_end_offset = (header_bytes.len() + 4) as u64; // +4 for the row-count slot

    let tmp = NamedTempFile::new().unwrap();
    {
        let mut preamble = header_bytes.clone();
        preamble.extend_from_slice(&0i32.to_le_bytes()); // row-count placeholder, patched below
        std::fs::write(tmp.path(), &preamble).unwrap();
    }

    let all_rows: Vec<Vec<Value>> = (0..total_rows as i32)
        .map(|i| vec![Value::I32(i), Value::F64(i as f64)])
        .collect();

    let comms = ThreadCommunicator::group(3);
    let path = tmp.path().to_path_buf();
    let layout_for_threads = layout.clone();
    let all_rows_for_threads = all_rows.clone();

    let handles: Vec<_> = comms
        .into_iter()
        .map(|comm| {
            let path = path.clone();
            let layout = layout_for_threads.clone();
            let rows = all_rows_for_threads.clone();
            std::thread::spawn(move || {
                let (start, count) = row_partition(total_rows, comm.rank(), comm.size(), true);
                let local_rows = rows[start..start + count].to_vec();

                let file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
                let mut write_buf = WriteBuffer::new(WriteBackend::Plain(file), 4096);

                let writer = ParallelPageWriter::new(&comm, &layout, header_end_offset).unwrap();
                writer.write_rows(&mut write_buf, &local_rows, total_rows, true).unwrap()
            })
        })
        .collect();

    let totals: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for total in totals {
        assert_eq!(total, total_rows as u64);
    }

    // Only rank 0 patches the row-count field, per the parallel engine's
    // contract (spec.md: "only rank 0 rewrites the row-count field").
    {
        let mut file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
        use std::io::{Seek, SeekFrom, Write as _};
        file.seek(SeekFrom::Start(header_bytes.len() as u64)).unwrap();
        file.write_all(&(total_rows as i32).to_le_bytes()).unwrap();
    }

    let mut reopened = SddsFile::open(&path).unwrap();
    let page = reopened.pages().read_page(ReadOptions::default()).unwrap().unwrap();
    assert_eq!(page.rows.len(), total_rows);
    assert_eq!(page.rows[0], vec![Value::I32(0), Value::F64(0.0)]);
    assert_eq!(page.rows[29], vec![Value::I32(29), Value::F64(29.0)]);
}

#[test]
fn s5_rank_partitioned_read_recovers_every_rows_owner() {
    let layout = two_column_layout();
    let total_rows = 30usize;

    let mut header_bytes = Vec::new();
    PlainTextHeader.write_layout(&mut header_bytes, &layout).unwrap();
    let header_end_offset = (header_bytes.len() + 4) as u64;

    let tmp = NamedTempFile::new().unwrap();
    {
        let mut file = SddsFile::create(tmp.path(), layout.clone()).unwrap();
        let rows: Vec<Vec<Value>> = (0..total_rows as i32)
            .map(|i| vec![Value::I32(i), Value::F64(i as f64)])
            .collect();
        file.pages()
            .write_page(&PageData {
                parameters: vec![],
                arrays: vec![],
                rows,
                row_flags: vec![true; total_rows],
            })
            .unwrap();
        file.pages().terminate().unwrap();
    }

    let comms = ThreadCommunicator::group(3);
    let path = tmp.path().to_path_buf();
    let layout_for_threads = layout.clone();

    let handles: Vec<_> = comms
        .into_iter()
        .map(|comm| {
            let path = path.clone();
            let layout = layout_for_threads.clone();
            std::thread::spawn(move || {
                let file = std::fs::File::open(&path).unwrap();
                let mut read_buf = ReadBuffer::new(ReadBackend::Plain(file), 4096);

                let reader = ParallelPageReader::new(&comm, &layout, header_end_offset).unwrap();
                reader.read_rows(&mut read_buf, total_rows, true).unwrap()
            })
        })
        .collect();

    let mut reassembled = vec![None; total_rows];
    for h in handles {
        let (start, rows) = h.join().unwrap();
        for (i, row) in rows.into_iter().enumerate() {
            reassembled[start + i] = Some(row);
        }
    }

    for (i, row) in reassembled.into_iter().enumerate() {
        assert_eq!(row.unwrap(), vec![Value::I32(i as i32), Value::F64(i as f64)]);
    }
}

#[test]
fn s5_broadcast_title_reconstructs_parameters_and_arrays_on_every_rank() {
    let comms = ThreadCommunicator::group(3);
    let handles: Vec<_> = comms
        .into_iter()
        .map(|comm| {
            std::thread::spawn(move || {
                let title = if comm.rank() == 0 {
                    let parameters = vec![Value::I32(7), Value::Str("run-42".to_string())];
                    let arrays = vec![ArrayData {
                        dimensions: vec![2, 2],
                        elements: vec![Value::F64(1.0), Value::F64(2.0), Value::F64(3.0), Value::F64(4.0)],
                    }];
                    Some((42i64, parameters, arrays))
                } else {
                    None
                };
                broadcast_title(&comm, title.as_ref().map(|(rows, p, a)| (*rows, p.as_slice(), a.as_slice())))
            })
        })
        .collect();

    for h in handles {
        let (total_rows, parameters, arrays) = h.join().unwrap();
        assert_eq!(total_rows, 42);
        assert_eq!(parameters, vec![Value::I32(7), Value::Str("run-42".to_string())]);
        assert_eq!(arrays.len(), 1);
        assert_eq!(arrays[0].dimensions, vec![2, 2]);
        assert_eq!(arrays[0].elements.len(), 4);
    }
}

#[test]
fn s5_collective_write_mode_writes_minimum_then_each_ranks_surplus() {
    let layout = two_column_layout();

    let mut header_bytes = Vec::new();
    PlainTextHeader.write_layout(&mut header_bytes, &layout).unwrap();
    let header_end_offset = (header_bytes.len() + 4) as u64;

    let tmp = NamedTempFile::new().unwrap();
    {
        let mut preamble = header_bytes.clone();
        preamble.extend_from_slice(&0i32.to_le_bytes());
        std::fs::write(tmp.path(), &preamble).unwrap();
    }

    // Ranks have uneven local row counts: 5, 3, 7. The collective portion
    // is min(5, 3, 7) = 3 rows per rank, written at contiguous offsets;
    // each rank's remaining rows are its own surplus written afterward.
    let per_rank_counts = [5usize, 3, 7];
    let comms = ThreadCommunicator::group(3);
    let path = tmp.path().to_path_buf();
    let layout_for_threads = layout.clone();

    let handles: Vec<_> = comms
        .into_iter()
        .map(|comm| {
            let path = path.clone();
            let layout = layout_for_threads.clone();
            let rank = comm.rank();
            let count = per_rank_counts[rank];
            std::thread::spawn(move || {
                let rows: Vec<Vec<Value>> = (0..count as i32)
                    .map(|i| vec![Value::I32((rank * 100) as i32 + i), Value::F64(i as f64)])
                    .collect();
                let start_row = rank * 10; // disjoint regions, independent of the min-reduce count

                let file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
                let mut write_buf = WriteBuffer::new(WriteBackend::Plain(file), 4096);

                let writer = ParallelPageWriter::new(&comm, &layout, header_end_offset).unwrap();
                writer.write_rows_collective(&mut write_buf, &rows, start_row).unwrap()
            })
        })
        .collect();

    let totals: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for total in totals {
        assert_eq!(total, 5 + 3 + 7);
    }
}

#[test]
fn s5_row_mode_parallel_io_truncates_and_roundtrips_string_columns() {
    let mut layout = Layout::new(ByteOrderKind::Little, DataMode::Binary);
    layout.define_column(FieldDef::new("id", ScalarType::I32)).unwrap();
    layout.define_column(FieldDef::new("label", ScalarType::Str)).unwrap();

    let mut header_bytes = Vec::new();
    PlainTextHeader.write_layout(&mut header_bytes, &layout).unwrap();
    let header_end_offset = (header_bytes.len() + 4) as u64;

    let tmp = NamedTempFile::new().unwrap();
    {
        let mut preamble = header_bytes.clone();
        preamble.extend_from_slice(&0i32.to_le_bytes());
        std::fs::write(tmp.path(), &preamble).unwrap();
    }

    let comm = SingleRankCommunicator;
    let rows = vec![
        vec![Value::I32(0), Value::Str("short".into())],
        vec![Value::I32(1), Value::Str("this label is far too long for the fixed width".into())],
    ];

    {
        let file = std::fs::OpenOptions::new().write(true).open(tmp.path()).unwrap();
        let mut write_buf = WriteBuffer::new(WriteBackend::Plain(file), 4096);
        let writer = ParallelPageWriter::new(&comm, &layout, header_end_offset).unwrap();
        let total = writer.write_rows(&mut write_buf, &rows, rows.len(), true).unwrap();
        assert_eq!(total, rows.len() as u64);
    }

    let file = std::fs::File::open(tmp.path()).unwrap();
    let mut read_buf = ReadBuffer::new(ReadBackend::Plain(file), 4096);
    let reader = ParallelPageReader::new(&comm, &layout, header_end_offset).unwrap();
    let (start, read_rows) = reader.read_rows(&mut read_buf, rows.len(), true).unwrap();
    assert_eq!(start, 0);
    assert_eq!(read_rows[0], vec![Value::I32(0), Value::Str("short".into())]);
    let width = sdds::config::string_column_width();
    let expected_truncated: String = "this label is far too long for the fixed width"
        .chars()
        .take(width)
        .collect();
    assert_eq!(read_rows[1], vec![Value::I32(1), Value::Str(expected_truncated)]);
}

#[test]
fn s5_collective_write_rejects_string_columns() {
    let mut layout = Layout::new(ByteOrderKind::Little, DataMode::Binary);
    layout.define_column(FieldDef::new("id", ScalarType::I32)).unwrap();
    layout.define_column(FieldDef::new("label", ScalarType::Str)).unwrap();

    let mut header_bytes = Vec::new();
    PlainTextHeader.write_layout(&mut header_bytes, &layout).unwrap();
    let header_end_offset = (header_bytes.len() + 4) as u64;

    let tmp = NamedTempFile::new().unwrap();
    {
        let mut preamble = header_bytes.clone();
        preamble.extend_from_slice(&0i32.to_le_bytes());
        std::fs::write(tmp.path(), &preamble).unwrap();
    }

    let comm = SingleRankCommunicator;
    let file = std::fs::OpenOptions::new().write(true).open(tmp.path()).unwrap();
    let mut write_buf = WriteBuffer::new(WriteBackend::Plain(file), 4096);
    let writer = ParallelPageWriter::new(&comm, &layout, header_end_offset).unwrap();
    let rows = vec![vec![Value::I32(0), Value::Str("x".into())]];
    let err = writer.write_rows_collective(&mut write_buf, &rows, 0).unwrap_err();
    assert!(matches!(err, sdds::SddsError::Format(_)));
}

// ---------- S6: f80 narrowing truncates below the f64 ulp ----------

#[test]
fn s6_f80_scalar_narrows_to_f64_through_the_codec_layer() {
    let tmp = NamedTempFile::new().unwrap();
    // 1.0 + 2^-60 in 80-bit extended: the mantissa bit for 2^-60 sits
    // below the 11 bits dropped when narrowing a 64-bit f80 mantissa to a
    // 52-bit f64 mantissa, so the codec layer should hand back exactly 1.0.
    let mantissa = 0x8000_0000_0000_0000u64 | (1u64 << (63 - 60));
    let mut record = [0u8; 16];
    record[0..8].copy_from_slice(&mantissa.to_le_bytes());
    record[8..10].copy_from_slice(&0x3FFFu16.to_le_bytes());

    {
        let backend = WriteBackend::create(tmp.path()).unwrap();
        let mut wb = WriteBuffer::new(backend, 64);
        wb.write(&record).unwrap();
        wb.flush().unwrap();
    }

    let backend = ReadBackend::open(tmp.path()).unwrap();
    let mut rb = ReadBuffer::new(backend, 64);
    let (value, _) = codec::read_scalar(&mut rb, ScalarType::F80, ByteOrderKind::Little).unwrap();
    assert_eq!(value, Value::F64(1.0));
}

// ---------- Error paths ----------

#[test]
fn opening_a_nonexistent_file_is_an_error() {
    assert!(SddsFile::open("/nonexistent/path/to/file.sdds").is_err());
}

#[test]
fn reading_past_the_last_page_returns_none_not_an_error() {
    let tmp = NamedTempFile::new().unwrap();
    let layout = Layout::new(ByteOrderKind::Little, DataMode::Binary);
    let mut file = SddsFile::create(tmp.path(), layout).unwrap();
    file.pages().terminate().unwrap();

    let mut reopened = SddsFile::open(tmp.path()).unwrap();
    assert!(reopened.pages().read_page(ReadOptions::default()).unwrap().is_none());
}
