//! Wire-format constants for the page engine.
//!
//! Values mirror the external interfaces section of the format
//! specification: the 32-bit row-count escape sentinel, default tunable
//! values, and the parallel engine's default string-column width.

// ── Row count ───────────────────────────────────────────────────────

/// Sentinel value in the 32-bit row-count slot meaning "the true row
/// count follows as a 64-bit integer".
pub const ROW_COUNT_ESCAPE: i32 = i32::MIN;

/// Default maximum accepted row count on read. A larger decoded value is
/// treated as a plausibility failure (declared byte order `unspecified`)
/// or as end-of-file (§4.5 step 3).
pub const DEFAULT_ROW_COUNT_LIMIT: i64 = 100_000_000;

/// Plausibility ceiling used when `declared_byte_order = unspecified`
/// (invariant 6): reading is only permitted if the decoded row count is
/// at or below this value.
pub const UNSPECIFIED_ORDER_PLAUSIBILITY_LIMIT: i64 = 10_000_000;

// ── Buffering ───────────────────────────────────────────────────────

/// Default per-handle I/O buffer capacity (256 KiB).
pub const DEFAULT_BUFFER_CAPACITY: usize = 256 * 1024;

/// Default read/write/title buffer capacity for the parallel engine.
pub const DEFAULT_PARALLEL_BUFFER_CAPACITY: usize = 256 * 1024;

// ── Parallel engine ─────────────────────────────────────────────────

/// Default fixed width for string columns in parallel row-major I/O.
/// Strings longer than this are truncated (spec.md §4.6) and shorter
/// ones are right-padded.
pub const DEFAULT_PARALLEL_STRING_WIDTH: usize = 16;

// ── f80 ─────────────────────────────────────────────────────────────

/// Size in bytes of an on-wire `f80` record (80-bit extended precision
/// padded to a 16-byte slot).
pub const F80_RECORD_SIZE: usize = 16;

/// Number of significant bytes in an `f80` record (sign + exponent +
/// mantissa); the remaining bytes in the 16-byte slot are padding.
pub const F80_SIGNIFICANT_BYTES: usize = 10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_count_escape_is_i32_min() {
        assert_eq!(ROW_COUNT_ESCAPE, i32::MIN);
        assert_ne!(ROW_COUNT_ESCAPE as i64, i32::MAX as i64 + 1);
    }

    #[test]
    fn plausibility_limit_below_default_limit() {
        assert!(UNSPECIFIED_ORDER_PLAUSIBILITY_LIMIT < DEFAULT_ROW_COUNT_LIMIT);
    }
}
