//! CLI implementation for the `sddsinfo pages` subcommand.
//!
//! Reads one page (or every page) applying the sparsing/statistics
//! options from spec.md §4.5, and prints parameter, array, and row
//! contents. A thin formatting layer over [`crate::page::PageHandle`];
//! it never re-implements sparsing itself.

use std::io::Write;

use serde::Serialize;

use crate::cli::app::StatisticArg;
use crate::cli::wprintln;
use crate::codec::Value;
use crate::file::SddsFile;
use crate::page::{PageData, ReadOptions, SparseStatistic};
use crate::SddsError;

pub struct PagesOptions {
    pub file: String,
    /// 1-indexed page number; `None` reads every page.
    pub page: Option<u64>,
    pub sparse_interval: usize,
    pub sparse_offset: usize,
    pub last_rows: usize,
    pub statistic: StatisticArg,
    pub json: bool,
}

fn to_sparse_statistic(stat: StatisticArg) -> SparseStatistic {
    match stat {
        StatisticArg::None => SparseStatistic::None,
        StatisticArg::Mean => SparseStatistic::Mean,
        StatisticArg::Median => SparseStatistic::Median,
        StatisticArg::Min => SparseStatistic::Min,
        StatisticArg::Max => SparseStatistic::Max,
    }
}

fn value_string(v: &Value) -> String {
    match v {
        Value::I16(x) => x.to_string(),
        Value::U16(x) => x.to_string(),
        Value::I32(x) => x.to_string(),
        Value::U32(x) => x.to_string(),
        Value::I64(x) => x.to_string(),
        Value::U64(x) => x.to_string(),
        Value::F32(x) => x.to_string(),
        Value::F64(x) => x.to_string(),
        Value::Char(x) => (*x as char).to_string(),
        Value::Str(s) => s.clone(),
    }
}

#[derive(Serialize)]
struct PageReport {
    page_number: u64,
    parameters: Vec<String>,
    rows: Vec<Vec<String>>,
}

pub fn execute(opts: &PagesOptions, writer: &mut dyn Write) -> Result<(), SddsError> {
    let mut file = SddsFile::open(&opts.file)?;
    let read_opts = ReadOptions {
        sparse_interval: opts.sparse_interval.max(1),
        sparse_offset: opts.sparse_offset,
        last_rows: opts.last_rows,
        sparse_statistics: to_sparse_statistic(opts.statistic),
        auto_recover: false,
    };

    let mut reports = Vec::new();
    let mut page_number: u64 = 0;
    loop {
        page_number += 1;
        let is_target = match opts.page {
            Some(target) => page_number == target,
            None => true,
        };
        let opts_for_page = if is_target { read_opts } else { ReadOptions::default() };
        let page = file.pages().read_page(opts_for_page)?;
        let page: PageData = match page {
            Some(p) => p,
            None => break,
        };

        if is_target {
            reports.push(PageReport {
                page_number,
                parameters: page.parameters.iter().map(value_string).collect(),
                rows: page.rows.iter().map(|r| r.iter().map(value_string).collect()).collect(),
            });
        }
        if opts.page == Some(page_number) {
            break;
        }
    }

    if opts.json {
        let json = serde_json::to_string_pretty(&reports)
            .map_err(|e| SddsError::Format(format!("JSON serialization error: {e}")))?;
        wprintln!(writer, "{json}")?;
        return Ok(());
    }

    for report in &reports {
        wprintln!(writer, "page {}", report.page_number)?;
        if !report.parameters.is_empty() {
            wprintln!(writer, "  parameters: {}", report.parameters.join(", "))?;
        }
        for (i, row) in report.rows.iter().enumerate() {
            wprintln!(writer, "  row {}: {}", i, row.join(", "))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::byteorder::ByteOrderKind;
    use crate::layout::{DataMode, FieldDef, Layout, ScalarType};
    use tempfile::NamedTempFile;

    #[test]
    fn pages_prints_every_row_by_default() {
        let tmp = NamedTempFile::new().unwrap();
        let mut layout = Layout::new(ByteOrderKind::Little, DataMode::Binary);
        layout.define_column(FieldDef::new("x", ScalarType::I32)).unwrap();

        let mut file = SddsFile::create(tmp.path(), layout).unwrap();
        file.pages()
            .write_page(&PageData {
                parameters: vec![],
                arrays: vec![],
                rows: vec![vec![Value::I32(7)], vec![Value::I32(8)]],
                row_flags: vec![true, true],
            })
            .unwrap();
        file.pages().terminate().unwrap();

        let opts = PagesOptions {
            file: tmp.path().to_string_lossy().to_string(),
            page: None,
            sparse_interval: 1,
            sparse_offset: 0,
            last_rows: 0,
            statistic: StatisticArg::None,
            json: false,
        };
        let mut out = Vec::new();
        execute(&opts, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("row 0: 7"));
        assert!(text.contains("row 1: 8"));
    }
}
