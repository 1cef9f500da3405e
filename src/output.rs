use crate::compare::Comparison;
use crate::config::TableLayout;
use crate::error::{ReportError, Result};
use crate::types::InspectionRecord;
use crate::util::parse_f64_safe;
use rust_xlsxwriter::{Workbook, Worksheet, XlsxError};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tabled::{settings::Style, Table, Tabled};
use tracing::info;

pub const OLD_SUFFIX: &str = "_Cũ";
pub const NEW_SUFFIX: &str = "_Mới";
pub const TOTAL_DELTA_HEADER: &str = "Chênh lệch Tổng công tơ";
pub const RATIO_DELTA_HEADER: &str = "Chênh lệch Tỷ lệ";

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path).map_err(ReportError::render)?;
    for r in rows {
        wtr.serialize(r).map_err(ReportError::render)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value).map_err(ReportError::render)?;
    std::fs::write(path, s)?;
    Ok(())
}

/// Write `bytes` to `dir/name`, creating `dir` when needed.
pub fn save_bytes(dir: &Path, name: &str, bytes: &[u8]) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(name);
    std::fs::write(&path, bytes)?;
    info!(path = %path.display(), bytes = bytes.len(), "saved output");
    Ok(path)
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().cloned().take(max_rows).collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
    if rows.len() > max_rows {
        println!("({} more rows in the full report)\n", rows.len() - max_rows);
    }
}

/// Header row of the flat comparison export: previous columns (entity
/// unsuffixed, in place), current non-key columns, then the two deltas.
pub fn comparison_headers(layout: &TableLayout) -> Vec<String> {
    let entity = layout.entity_column();
    let mut headers: Vec<String> = layout
        .columns
        .iter()
        .map(|c| {
            if c == entity {
                c.clone()
            } else {
                format!("{}{}", c, OLD_SUFFIX)
            }
        })
        .collect();
    headers.extend(
        layout
            .columns
            .iter()
            .filter(|c| c.as_str() != entity)
            .map(|c| format!("{}{}", c, NEW_SUFFIX)),
    );
    headers.push(TOTAL_DELTA_HEADER.to_string());
    headers.push(RATIO_DELTA_HEADER.to_string());
    headers
}

/// Unformatted workbook holding the joined comparison table.
pub fn comparison_workbook(cmp: &Comparison, layout: &TableLayout) -> Result<Vec<u8>> {
    build_comparison_workbook(cmp, layout).map_err(ReportError::render)
}

fn build_comparison_workbook(cmp: &Comparison, layout: &TableLayout) -> std::result::Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (col, header) in comparison_headers(layout).iter().enumerate() {
        sheet.write_string(0, col as u16, header)?;
    }
    for (i, r) in cmp.records.iter().enumerate() {
        let row = (i + 1) as u32;
        let mut col = 0u16;
        write_seq(sheet, row, &mut col, &r.old)?;
        sheet.write_string(row, col, &r.old.entity)?;
        col += 1;
        write_numbers(sheet, row, &mut col, &r.old.numeric_fields())?;
        write_seq(sheet, row, &mut col, &r.new)?;
        write_numbers(sheet, row, &mut col, &r.new.numeric_fields())?;
        write_numbers(sheet, row, &mut col, &[r.total_delta, r.ratio_delta])?;
    }
    workbook.save_to_buffer()
}

fn write_seq(sheet: &mut Worksheet, row: u32, col: &mut u16, record: &InspectionRecord) -> std::result::Result<(), XlsxError> {
    if let Some(seq) = &record.seq {
        match parse_f64_safe(Some(seq)) {
            Some(n) => sheet.write_number(row, *col, n)?,
            None => sheet.write_string(row, *col, seq)?,
        };
    }
    *col += 1;
    Ok(())
}

fn write_numbers(
    sheet: &mut Worksheet,
    row: u32,
    col: &mut u16,
    values: &[Option<f64>],
) -> std::result::Result<(), XlsxError> {
    for v in values {
        if let Some(v) = v {
            sheet.write_number(row, *col, *v)?;
        }
        *col += 1;
    }
    Ok(())
}
