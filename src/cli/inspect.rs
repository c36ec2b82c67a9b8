//! CLI implementation for the `sddsinfo inspect` subcommand.
//!
//! Opens a file, prints its layout (schema) and per-page row counts. The
//! read loop exercises the same [`crate::page::PageHandle::read_page`]
//! path every other subcommand does, so `inspect` also serves as a quick
//! smoke test for a file that won't parse.

use std::io::Write;

use colored::Colorize;
use serde::Serialize;

use crate::cli::wprintln;
use crate::file::SddsFile;
use crate::layout::{DataMode, Layout, ScalarType};
use crate::page::ReadOptions;
use crate::SddsError;

pub struct InspectOptions {
    /// Path to a file (.sdds, .sdds.gz, .sdds.xz).
    pub file: String,
    /// Emit output as JSON.
    pub json: bool,
}

#[derive(Serialize)]
struct LayoutReport {
    description: Option<String>,
    contents: Option<String>,
    version: u32,
    byte_order: &'static str,
    data_mode: &'static str,
    column_major: bool,
    fixed_row_count: bool,
    fixed_row_increment: u32,
    parameters: Vec<FieldReport>,
    arrays: Vec<FieldReport>,
    columns: Vec<FieldReport>,
}

#[derive(Serialize)]
struct FieldReport {
    name: String,
    scalar_type: &'static str,
}

#[derive(Serialize)]
struct InspectReport {
    file: String,
    layout: LayoutReport,
    pages: Vec<u64>,
    total_rows: u64,
}

fn scalar_type_name(t: ScalarType) -> &'static str {
    match t {
        ScalarType::I16 => "i16",
        ScalarType::U16 => "u16",
        ScalarType::I32 => "i32",
        ScalarType::U32 => "u32",
        ScalarType::I64 => "i64",
        ScalarType::U64 => "u64",
        ScalarType::F32 => "f32",
        ScalarType::F64 => "f64",
        ScalarType::F80 => "f80",
        ScalarType::Char => "char",
        ScalarType::Str => "string",
    }
}

fn layout_report(layout: &Layout) -> LayoutReport {
    LayoutReport {
        description: layout.description.clone(),
        contents: layout.contents.clone(),
        version: layout.version,
        byte_order: match layout.declared_byte_order {
            crate::byteorder::ByteOrderKind::Big => "big",
            crate::byteorder::ByteOrderKind::Little => "little",
            crate::byteorder::ByteOrderKind::Unspecified => "unspecified",
        },
        data_mode: if layout.data_mode == DataMode::Ascii { "ascii" } else { "binary" },
        column_major: layout.column_major,
        fixed_row_count: layout.fixed_row_count,
        fixed_row_increment: layout.fixed_row_increment,
        parameters: layout
            .parameters()
            .iter()
            .map(|p| FieldReport {
                name: p.name.clone(),
                scalar_type: scalar_type_name(p.scalar_type),
            })
            .collect(),
        arrays: layout
            .arrays()
            .iter()
            .map(|a| FieldReport {
                name: a.field.name.clone(),
                scalar_type: scalar_type_name(a.field.scalar_type),
            })
            .collect(),
        columns: layout
            .columns()
            .iter()
            .map(|c| FieldReport {
                name: c.name.clone(),
                scalar_type: scalar_type_name(c.scalar_type),
            })
            .collect(),
    }
}

pub fn execute(opts: &InspectOptions, writer: &mut dyn Write) -> Result<(), SddsError> {
    let mut file = SddsFile::open(&opts.file)?;

    let mut pages = Vec::new();
    loop {
        let page = file.pages().read_page(ReadOptions::default())?;
        match page {
            Some(page) => pages.push(page.rows.len() as u64),
            None => break,
        }
    }
    let total_rows: u64 = pages.iter().sum();

    if opts.json {
        let report = InspectReport {
            file: opts.file.clone(),
            layout: layout_report(file.layout()),
            pages,
            total_rows,
        };
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| SddsError::Format(format!("JSON serialization error: {e}")))?;
        wprintln!(writer, "{json}")?;
        return Ok(());
    }

    let layout = file.layout();
    wprintln!(writer, "{}", opts.file.bold())?;
    wprintln!(
        writer,
        "  byte order: {}  data mode: {}  column major: {}",
        match layout.declared_byte_order {
            crate::byteorder::ByteOrderKind::Big => "big",
            crate::byteorder::ByteOrderKind::Little => "little",
            crate::byteorder::ByteOrderKind::Unspecified => "unspecified",
        },
        if layout.data_mode == DataMode::Ascii { "ascii" } else { "binary" },
        layout.column_major
    )?;
    if layout.fixed_row_count {
        wprintln!(writer, "  fixed row count, increment {}", layout.fixed_row_increment)?;
    }
    wprintln!(
        writer,
        "  {} parameter(s), {} array(s), {} column(s)",
        layout.parameters().len(),
        layout.arrays().len(),
        layout.columns().len()
    )?;
    for c in layout.columns() {
        wprintln!(writer, "    column {} : {}", c.name, scalar_type_name(c.scalar_type))?;
    }
    wprintln!(writer)?;
    wprintln!(writer, "  {} page(s), {} row(s) total", pages.len(), total_rows)?;
    for (i, rows) in pages.iter().enumerate() {
        wprintln!(writer, "    page {}: {} row(s)", i + 1, rows)?;
    }

    Ok(())
}
