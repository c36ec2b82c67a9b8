//! Process-wide tunables (spec.md §5, §6.5, §9 "Global state").
//!
//! Each knob is a lazily-read hint for the *next* handle-level operation,
//! not a live control: a handle snapshots these at open time. Every
//! setter returns the previous value and never fails, matching the
//! "get/set API, setter returns previous value" contract. No mutable
//! global is read from the I/O hot loops themselves — only at
//! `SddsFile::open`/`create` and `ParallelPageEngine::open`.

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

static DEFAULT_BUFFER_CAPACITY: AtomicUsize = AtomicUsize::new(crate::constants::DEFAULT_BUFFER_CAPACITY);
static DEFAULT_READ_BUFFER_CAPACITY: AtomicUsize =
    AtomicUsize::new(crate::constants::DEFAULT_PARALLEL_BUFFER_CAPACITY);
static DEFAULT_WRITE_BUFFER_CAPACITY: AtomicUsize =
    AtomicUsize::new(crate::constants::DEFAULT_PARALLEL_BUFFER_CAPACITY);
static DEFAULT_TITLE_BUFFER_CAPACITY: AtomicUsize =
    AtomicUsize::new(crate::constants::DEFAULT_PARALLEL_BUFFER_CAPACITY);
static DEFAULT_STRING_COLUMN_WIDTH: AtomicUsize =
    AtomicUsize::new(crate::constants::DEFAULT_PARALLEL_STRING_WIDTH);
static ROW_COUNT_LIMIT: AtomicI64 = AtomicI64::new(crate::constants::DEFAULT_ROW_COUNT_LIMIT);

/// Count of strings truncated to [`string_column_width`] during parallel
/// row-major writes (spec.md §4.6: "truncation increments a process-global
/// counter"). Monotonic; never reset automatically.
static TRUNCATED_STRING_COUNT: AtomicUsize = AtomicUsize::new(0);

/// Get the default per-handle I/O buffer capacity, in bytes.
pub fn io_buffer_capacity() -> usize {
    DEFAULT_BUFFER_CAPACITY.load(Ordering::Relaxed)
}

/// Set the default per-handle I/O buffer capacity. Returns the previous value.
pub fn set_io_buffer_capacity(bytes: usize) -> usize {
    DEFAULT_BUFFER_CAPACITY.swap(bytes, Ordering::Relaxed)
}

/// Get the default parallel-engine read-buffer capacity, in bytes.
pub fn parallel_read_buffer_capacity() -> usize {
    DEFAULT_READ_BUFFER_CAPACITY.load(Ordering::Relaxed)
}

/// Set the default parallel-engine read-buffer capacity. Returns the previous value.
pub fn set_parallel_read_buffer_capacity(bytes: usize) -> usize {
    DEFAULT_READ_BUFFER_CAPACITY.swap(bytes, Ordering::Relaxed)
}

/// Get the default parallel-engine write-buffer capacity, in bytes.
pub fn parallel_write_buffer_capacity() -> usize {
    DEFAULT_WRITE_BUFFER_CAPACITY.load(Ordering::Relaxed)
}

/// Set the default parallel-engine write-buffer capacity. Returns the previous value.
pub fn set_parallel_write_buffer_capacity(bytes: usize) -> usize {
    DEFAULT_WRITE_BUFFER_CAPACITY.swap(bytes, Ordering::Relaxed)
}

/// Get the default parallel-engine title-broadcast buffer capacity, in bytes.
pub fn parallel_title_buffer_capacity() -> usize {
    DEFAULT_TITLE_BUFFER_CAPACITY.load(Ordering::Relaxed)
}

/// Set the default parallel-engine title-broadcast buffer capacity. Returns the previous value.
pub fn set_parallel_title_buffer_capacity(bytes: usize) -> usize {
    DEFAULT_TITLE_BUFFER_CAPACITY.swap(bytes, Ordering::Relaxed)
}

/// Get the default fixed width for string columns in parallel row-major I/O.
pub fn string_column_width() -> usize {
    DEFAULT_STRING_COLUMN_WIDTH.load(Ordering::Relaxed)
}

/// Set the default fixed width for string columns in parallel row-major I/O.
/// Returns the previous value.
pub fn set_string_column_width(width: usize) -> usize {
    DEFAULT_STRING_COLUMN_WIDTH.swap(width, Ordering::Relaxed)
}

/// Get the maximum accepted row count on read; larger values are treated as EOF.
pub fn row_count_limit() -> i64 {
    ROW_COUNT_LIMIT.load(Ordering::Relaxed)
}

/// Set the maximum accepted row count on read. Returns the previous value.
pub fn set_row_count_limit(limit: i64) -> i64 {
    ROW_COUNT_LIMIT.swap(limit, Ordering::Relaxed)
}

/// Increment the process-wide truncated-string counter by one and return
/// the new total. Called whenever the parallel engine truncates a string
/// to [`string_column_width`].
pub fn record_truncated_string() -> usize {
    TRUNCATED_STRING_COUNT.fetch_add(1, Ordering::Relaxed) + 1
}

/// Current value of the truncated-string counter.
pub fn truncated_string_count() -> usize {
    TRUNCATED_STRING_COUNT.load(Ordering::Relaxed)
}

/// Force a non-host output byte order on write, mirroring the
/// `SDDS_OUTPUT_ENDIANESS` environment variable (spec.md §6.5). Reads the
/// variable once per call; callers that need it cached should snapshot at
/// handle-open time.
pub fn forced_output_byte_order() -> Option<crate::byteorder::ByteOrderKind> {
    match std::env::var("SDDS_OUTPUT_ENDIANESS").ok()?.as_str() {
        "big" => Some(crate::byteorder::ByteOrderKind::Big),
        "little" => Some(crate::byteorder::ByteOrderKind::Little),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Tests that mutate process-wide atomics serialize on this lock so
    // they don't stomp on each other when run concurrently.
    static GUARD: Mutex<()> = Mutex::new(());

    #[test]
    fn setter_returns_previous_value() {
        let _g = GUARD.lock().unwrap();
        let original = io_buffer_capacity();
        let prev = set_io_buffer_capacity(4096);
        assert_eq!(prev, original);
        assert_eq!(io_buffer_capacity(), 4096);
        set_io_buffer_capacity(original);
    }

    #[test]
    fn truncated_string_counter_is_monotonic() {
        let _g = GUARD.lock().unwrap();
        let before = truncated_string_count();
        let after = record_truncated_string();
        assert_eq!(after, before + 1);
        assert_eq!(truncated_string_count(), before + 1);
    }

    #[test]
    fn row_count_limit_roundtrip() {
        let _g = GUARD.lock().unwrap();
        let original = row_count_limit();
        let prev = set_row_count_limit(42);
        assert_eq!(prev, original);
        assert_eq!(row_count_limit(), 42);
        set_row_count_limit(original);
    }
}
