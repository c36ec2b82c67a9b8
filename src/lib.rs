//! `sdds`: a binary page engine for a self-describing tabular scientific
//! data format.
//!
//! A file declares its own schema in a text header (see [`header`]) and
//! then carries zero or more *pages*. Each page holds parameter values,
//! multi-dimensional arrays, and a row- or column-oriented table, encoded
//! in a declared byte order with an escaping row-count field so the same
//! on-wire layout scales from a handful of rows to billions.
//!
//! # Module overview
//!
//! | Module | Responsibility |
//! |---|---|
//! | [`byteorder`] | host-endian detection, scalar byte swaps, f80→f64 narrowing |
//! | [`buffer`] | bounded streaming I/O over plain/gzip/xz sinks and sources |
//! | [`layout`] | schema: parameter/array/column/associate definitions |
//! | [`header`] | external collaborator interface for the textual header |
//! | [`codec`] | typed scalar/string/row/column encode and decode |
//! | [`page`] | per-handle page state machine: write/update/read/sparse |
//! | [`file`] | [`file::SddsFile`], the top-level open/create handle |
//! | [`parallel`] | rank-partitioned collective page I/O |
//! | [`config`] | process-wide tunables (buffer sizes, row-count limit) |
//! | [`tokenizer`] | external collaborator: fixed-value parameter parsing |
//!
//! # Quick example
//!
//! ```no_run
//! use sdds::file::SddsFile;
//! use sdds::page::ReadOptions;
//!
//! let mut file = SddsFile::open("run.sdds").unwrap();
//! while let Some(page) = file.pages().read_page(ReadOptions::default()).unwrap() {
//!     println!("page has {} rows", page.rows.len());
//! }
//! ```
//!
//! # Feature flags
//!
//! | Feature | Enables |
//! |---|---|
//! | `cli` (default) | the `sddsinfo` diagnostic binary |

pub mod buffer;
pub mod byteorder;
pub mod codec;
pub mod config;
pub mod constants;
pub mod file;
pub mod header;
pub mod layout;
pub mod page;
pub mod parallel;
pub mod tokenizer;

#[cfg(feature = "cli")]
pub mod cli;

pub mod util;

use thiserror::Error;

/// Error taxonomy for the page engine.
///
/// `EndOfFile` is deliberately not a variant: per the read-page protocol,
/// a clean end of stream is signaled by [`page::PageHandle::read_page`]
/// returning `Ok(None)`, never raised as an error.
#[derive(Error, Debug)]
pub enum SddsError {
    /// Underlying sink/source error, including a compressed-stream error.
    #[error("I/O error: {0}")]
    Io(String),
    /// Fewer bytes than requested were available, not at a clean EOF.
    #[error("short read: {0}")]
    ShortRead(String),
    /// Negative length/dimension/row-count, or a type unsupported in this
    /// context (e.g. a string column in column-major or collective mode).
    #[error("format error: {0}")]
    Format(String),
    /// Duplicate name, unknown name on read, fixed-value type mismatch,
    /// or array dimension mismatch.
    #[error("schema error: {0}")]
    Schema(String),
    /// Operation illegal for the handle's current state (e.g. `update_page`
    /// on a compressed file, `read_new_rows` on a column-major file).
    #[error("illegal operation for current state: {0}")]
    State(String),
    /// Allocation failure.
    #[error("allocation failure: {0}")]
    Alloc(String),
}

pub type Result<T> = std::result::Result<T, SddsError>;
