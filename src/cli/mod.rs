//! CLI subcommand implementations for the `sddsinfo` binary.
//!
//! `sddsinfo` is a thin diagnostic front-end over the [`crate`] library —
//! it never re-implements codec/page-engine logic, only formats what
//! [`crate::file::SddsFile`] returns. Argument parsing uses clap derive
//! macros, with the top-level [`app::Cli`] struct and [`app::Commands`]
//! enum defined in [`app`] and shared between `main.rs` and `build.rs`
//! (for man page/completion generation) via `include!()`.
//!
//! Each subcommand module follows the same pattern: an `Options` struct
//! holding the parsed arguments and a `pub fn execute(opts, writer) ->
//! Result<(), SddsError>` entry point. The `writer: &mut dyn Write`
//! parameter allows output to be captured in tests or redirected to a
//! file via the global `--output` flag.
//!
//! # Subcommands
//!
//! | Command | Module | Purpose |
//! |---------|--------|---------|
//! | `sddsinfo inspect` | [`inspect`] | Show a file's layout and per-page row counts |
//! | `sddsinfo dump` | [`dump`] | Hex dump of raw bytes at a byte offset |
//! | `sddsinfo pages` | [`pages`] | Read pages with sparsing/statistics and print their contents |
//! | `sddsinfo validate` | [`validate`] | Check header and page self-consistency |
//!
//! # Common patterns
//!
//! - **`--json`** — Most subcommands support structured JSON output via
//!   `#[derive(Serialize)]` structs and `serde_json`.
//! - **`--color`** (global) — Control colored terminal output (`auto`,
//!   `always`, `never`).
//! - **`--output` / `-o`** (global) — Redirect output to a file instead
//!   of stdout.

pub mod app;
pub mod dump;
pub mod inspect;
pub mod pages;
pub mod validate;

/// Write a line to the given writer, converting io::Error to SddsError.
macro_rules! wprintln {
    ($w:expr) => {
        writeln!($w).map_err(|e| $crate::SddsError::Io(e.to_string()))
    };
    ($w:expr, $($arg:tt)*) => {
        writeln!($w, $($arg)*).map_err(|e| $crate::SddsError::Io(e.to_string()))
    };
}

/// Write (without newline) to the given writer, converting io::Error to SddsError.
macro_rules! wprint {
    ($w:expr, $($arg:tt)*) => {
        write!($w, $($arg)*).map_err(|e| $crate::SddsError::Io(e.to_string()))
    };
}

pub(crate) use wprint;
pub(crate) use wprintln;

use indicatif::{ProgressBar, ProgressStyle};

/// Create a styled progress bar for iterating over pages.
pub(crate) fn create_progress_bar(count: u64, unit: &str) -> ProgressBar {
    let pb = ProgressBar::new(count);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {} ({{eta}})",
                unit
            ))
            .unwrap()
            .progress_chars("#>-"),
    );
    pb
}
