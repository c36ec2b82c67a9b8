//! CLI implementation for the `sddsinfo validate` subcommand.
//!
//! Checks that a file's header parses and that every page's row count
//! and byte layout are self-consistent: each page must read to
//! completion (no short read, no negative row count, no format error)
//! before the next is attempted. Uses `auto_recover = false` so a
//! corrupt page is reported rather than silently papered over.

use std::io::Write;

use colored::Colorize;
use serde::Serialize;

use crate::cli::wprintln;
use crate::file::SddsFile;
use crate::page::ReadOptions;
use crate::SddsError;

pub struct ValidateOptions {
    pub file: String,
    pub json: bool,
}

#[derive(Serialize)]
struct ValidateReport {
    file: String,
    passed: bool,
    pages_read: u64,
    total_rows: u64,
    error: Option<String>,
}

pub fn execute(opts: &ValidateOptions, writer: &mut dyn Write) -> Result<(), SddsError> {
    let report = match SddsFile::open(&opts.file) {
        Ok(mut file) => {
            let mut pages_read = 0u64;
            let mut total_rows = 0u64;
            let mut error = None;
            loop {
                match file.pages().read_page(ReadOptions::default()) {
                    Ok(Some(page)) => {
                        pages_read += 1;
                        total_rows += page.rows.len() as u64;
                    }
                    Ok(None) => break,
                    Err(e) => {
                        error = Some(e.to_string());
                        break;
                    }
                }
            }
            ValidateReport {
                file: opts.file.clone(),
                passed: error.is_none(),
                pages_read,
                total_rows,
                error,
            }
        }
        Err(e) => ValidateReport {
            file: opts.file.clone(),
            passed: false,
            pages_read: 0,
            total_rows: 0,
            error: Some(e.to_string()),
        },
    };

    if opts.json {
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| SddsError::Format(format!("JSON serialization error: {e}")))?;
        wprintln!(writer, "{json}")?;
    } else {
        wprintln!(writer, "{}", opts.file.bold())?;
        wprintln!(writer, "  pages read: {}  rows total: {}", report.pages_read, report.total_rows)?;
        if let Some(ref err) = report.error {
            wprintln!(writer, "  {}", err.red())?;
        }
        let status = if report.passed { "PASS".green() } else { "FAIL".red() };
        wprintln!(writer, "  result: {status}")?;
    }

    if !report.passed {
        return Err(SddsError::Format(format!("validation failed for {}", opts.file)));
    }
    Ok(())
}
