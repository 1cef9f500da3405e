// Copies the fixed result block of an inspection export into the master
// template. The template keeps its styles, formulas and other sheets; only
// the cells inside the region are overwritten.
use crate::config::ConsolidationConfig;
use crate::error::{ReportError, Result};
use crate::types::{CellValue, RawSheet};
use chrono::NaiveDate;
use std::io::Cursor;
use tracing::{debug, info};
use umya_spreadsheet::Worksheet;

#[derive(Debug)]
pub struct Consolidated {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub copied: usize,
    pub blanked: usize,
}

pub fn consolidate(
    source: &RawSheet,
    source_file: &str,
    template: &[u8],
    template_file: &str,
    config: &ConsolidationConfig,
    date: NaiveDate,
) -> Result<Consolidated> {
    if (source.row_count() as u32) < config.first_row || (source.col_count() as u32) < config.first_col {
        return Err(ReportError::input(
            source_file,
            format!(
                "sheet '{}' has no data in rows {}..={} / columns {}..={} (used area ends at row {}, column {})",
                source.name,
                config.first_row,
                config.last_row,
                config.first_col,
                config.last_col,
                source.row_count(),
                source.col_count()
            ),
        ));
    }

    let mut book = umya_spreadsheet::reader::xlsx::read_reader(Cursor::new(template), true)
        .map_err(|e| ReportError::input(template_file, format!("not a readable xlsx workbook: {}", e)))?;
    let sheet = book
        .get_sheet_by_name_mut(&config.template_sheet)
        .ok_or_else(|| {
            ReportError::input(
                template_file,
                format!("template sheet '{}' not found", config.template_sheet),
            )
        })?;

    let (copied, blanked) = copy_region(source, sheet, config);
    info!(
        source = source_file,
        template = template_file,
        copied,
        blanked,
        "consolidated result block"
    );

    let mut out = Cursor::new(Vec::new());
    umya_spreadsheet::writer::xlsx::write_writer(&book, &mut out).map_err(ReportError::render)?;

    Ok(Consolidated {
        file_name: config.file_name(date),
        bytes: out.into_inner(),
        copied,
        blanked,
    })
}

/// Copy every cell of the configured region verbatim. Returns
/// `(copied, blanked)` counts.
pub fn copy_region(source: &RawSheet, target: &mut Worksheet, config: &ConsolidationConfig) -> (usize, usize) {
    let (mut copied, mut blanked) = (0usize, 0usize);
    for row in config.first_row..=config.last_row {
        for col in config.first_col..=config.last_col {
            // umya addresses cells as (column, row).
            let cell = target.get_cell_mut((col, row));
            match source.get(row, col) {
                CellValue::Empty => {
                    cell.set_blank();
                    blanked += 1;
                    continue;
                }
                CellValue::Number(n) => {
                    cell.set_value_number(*n);
                }
                CellValue::Text(s) => {
                    cell.set_value_string(s.clone());
                }
                CellValue::Bool(b) => {
                    cell.set_value_bool(*b);
                }
            }
            copied += 1;
        }
    }
    debug!(copied, blanked, "region copy finished");
    (copied, blanked)
}
