use crate::config::{TableLayout, COLUMN_COUNT};
use crate::error::{ReportError, Result};
use crate::types::{CellValue, InspectionRecord, RawSheet};
use crate::util::coerce_number;
use calamine::{open_workbook_from_rs, Data, Range, Reader, Xlsx};
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, info};

static EMPTY_CELL: CellValue = CellValue::Empty;

/// An opened `.xlsx` file. Cell values are the cached results, never formulas.
pub struct Workbook {
    name: String,
    inner: Xlsx<Cursor<Vec<u8>>>,
    /// Index of the tab the workbook was saved with selected.
    active_tab: usize,
}

impl Workbook {
    pub fn open(path: &Path) -> Result<Workbook> {
        let bytes = std::fs::read(path)?;
        Workbook::from_bytes(path.display().to_string(), bytes)
    }

    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Result<Workbook> {
        let name = name.into();
        let active_tab = read_active_tab(&bytes, &name);
        let inner: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))
            .map_err(|e| ReportError::input(&name, format!("not a readable xlsx workbook: {}", e)))?;
        Ok(Workbook {
            name,
            inner,
            active_tab,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.inner.sheet_names().to_vec()
    }

    pub fn sheet(&mut self, sheet: &str) -> Result<RawSheet> {
        if !self.sheet_names().iter().any(|s| s == sheet) {
            return Err(ReportError::input(
                &self.name,
                format!(
                    "sheet '{}' not found (available: {})",
                    sheet,
                    self.sheet_names().join(", ")
                ),
            ));
        }
        let range = self
            .inner
            .worksheet_range(sheet)
            .map_err(|e| ReportError::input(&self.name, format!("cannot read sheet '{}': {}", sheet, e)))?;
        Ok(range_to_sheet(sheet, &range))
    }

    /// The sheet a spreadsheet opens on: the active tab, or the first sheet
    /// when the stored tab index is out of range.
    pub fn active_sheet(&mut self) -> Result<RawSheet> {
        let names = self.sheet_names();
        let name = names
            .get(self.active_tab)
            .or_else(|| names.first())
            .cloned()
            .ok_or_else(|| ReportError::input(&self.name, "workbook has no sheets"))?;
        self.sheet(&name)
    }
}

/// `activeTab` of the workbook view. Sheet contents are not parsed.
fn read_active_tab(bytes: &[u8], file: &str) -> usize {
    match umya_spreadsheet::reader::xlsx::read_reader(Cursor::new(bytes), false) {
        Ok(book) => {
            let tab: u32 = book.get_workbook_view().get_active_tab().to_owned();
            tab as usize
        }
        Err(e) => {
            debug!(file, error = %e, "workbook view unreadable, using the first sheet");
            0
        }
    }
}

fn range_to_sheet(name: &str, range: &Range<Data>) -> RawSheet {
    let mut sheet = RawSheet::new(name);
    // calamine ranges start at the first used cell; re-anchor at A1.
    let Some((row0, col0)) = range.start() else {
        return sheet;
    };
    for (r, c, data) in range.used_cells() {
        let cell = to_cell(data);
        if cell != CellValue::Empty {
            sheet.set(row0 + r as u32 + 1, col0 + c as u32 + 1, cell);
        }
    }
    sheet
}

fn to_cell(data: &Data) -> CellValue {
    match data {
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        _ => CellValue::Empty,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    pub total_rows: usize,
    pub kept_rows: usize,
    pub dropped_rows: usize,
    pub coerced_missing: usize,
}

/// Cleaned inspection table. Ratios are already percentages.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InspectionTable {
    pub records: Vec<InspectionRecord>,
}

impl InspectionTable {
    pub fn new(records: Vec<InspectionRecord>) -> Self {
        InspectionTable { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Re-apply the row rules to an already cleaned table: drop blank
    /// entities and non-finite numbers. The percentage rescale happens only
    /// when reading a raw sheet, so calling this repeatedly is a no-op.
    pub fn cleaned(&self) -> InspectionTable {
        let finite = |v: Option<f64>| v.filter(|x| x.is_finite());
        let records = self
            .records
            .iter()
            .filter(|r| !r.entity.trim().is_empty())
            .map(|r| InspectionRecord {
                seq: r.seq.clone(),
                entity: r.entity.trim().to_string(),
                single_phase_direct: finite(r.single_phase_direct),
                single_phase_indirect: finite(r.single_phase_indirect),
                three_phase_direct: finite(r.three_phase_direct),
                three_phase_indirect: finite(r.three_phase_indirect),
                voltage_transformers: finite(r.voltage_transformers),
                current_transformers: finite(r.current_transformers),
                total_meters: finite(r.total_meters),
                planned: finite(r.planned),
                ratio: finite(r.ratio),
            })
            .collect();
        InspectionTable { records }
    }
}

/// Turn a raw consolidated sheet into typed records.
///
/// Skips `layout.header_rows`, reads the eleven columns positionally, drops
/// rows without an entity name, coerces numbers and rescales the ratio from
/// a fraction to a percentage. A sheet with any other number of used
/// columns is rejected. The input sheet is only borrowed.
pub fn clean_sheet(
    sheet: &RawSheet,
    layout: &TableLayout,
    file: &str,
) -> Result<(InspectionTable, LoadReport)> {
    if sheet.row_count() <= layout.header_rows {
        return Err(ReportError::input(
            file,
            format!(
                "sheet '{}' has no data rows after the {} header rows",
                sheet.name, layout.header_rows
            ),
        ));
    }
    let width = sheet.col_count();
    if width < COLUMN_COUNT {
        let missing = layout
            .columns
            .get(width)
            .map(String::as_str)
            .unwrap_or("?");
        return Err(ReportError::input(
            file,
            format!(
                "sheet '{}' has {} columns, expected {} (missing column '{}')",
                sheet.name, width, COLUMN_COUNT, missing
            ),
        ));
    }
    if width > COLUMN_COUNT {
        let last = layout
            .columns
            .get(COLUMN_COUNT - 1)
            .map(String::as_str)
            .unwrap_or("?");
        return Err(ReportError::input(
            file,
            format!(
                "sheet '{}' has {} columns, expected {} (last expected column is '{}')",
                sheet.name, width, COLUMN_COUNT, last
            ),
        ));
    }

    let mut records = Vec::new();
    let mut total_rows = 0usize;
    let mut dropped_rows = 0usize;
    let mut coerced_missing = 0usize;

    for row in sheet.rows().skip(layout.header_rows) {
        total_rows += 1;
        let cell = |i: usize| row.get(i).unwrap_or(&EMPTY_CELL);

        let entity = match cell(1).as_text() {
            Some(name) if !name.is_empty() => name,
            _ => {
                dropped_rows += 1;
                continue;
            }
        };

        let mut num = |i: usize| {
            let c = cell(i);
            let v = coerce_number(c);
            if v.is_none() && !c.is_blank() {
                coerced_missing += 1;
            }
            v
        };

        let record = InspectionRecord {
            seq: cell(0).as_text(),
            entity,
            single_phase_direct: num(2),
            single_phase_indirect: num(3),
            three_phase_direct: num(4),
            three_phase_indirect: num(5),
            voltage_transformers: num(6),
            current_transformers: num(7),
            total_meters: num(8),
            planned: num(9),
            ratio: num(10).map(|fraction| fraction * 100.0),
        };
        records.push(record);
    }

    let report = LoadReport {
        total_rows,
        kept_rows: records.len(),
        dropped_rows,
        coerced_missing,
    };
    info!(
        file,
        sheet = %sheet.name,
        kept = report.kept_rows,
        dropped = report.dropped_rows,
        "cleaned inspection table"
    );
    if report.coerced_missing > 0 {
        debug!(file, cells = report.coerced_missing, "non-numeric cells coerced to missing");
    }
    Ok((InspectionTable::new(records), report))
}

/// Open `path`, read the configured sheet and clean it.
pub fn load_table(path: &Path, layout: &TableLayout) -> Result<(InspectionTable, LoadReport)> {
    let mut workbook = Workbook::open(path)?;
    load_table_from(&mut workbook, layout)
}

pub fn load_table_from(
    workbook: &mut Workbook,
    layout: &TableLayout,
) -> Result<(InspectionTable, LoadReport)> {
    let sheet = workbook.sheet(&layout.sheet_name)?;
    clean_sheet(&sheet, layout, workbook.name())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    fn num(v: f64) -> CellValue {
        CellValue::Number(v)
    }

    fn data_row(seq: f64, entity: CellValue, total: CellValue, plan: f64, ratio: CellValue) -> Vec<CellValue> {
        vec![
            num(seq),
            entity,
            num(10.0),
            num(20.0),
            num(3.0),
            text("x"),
            num(1.0),
            num(2.0),
            total,
            num(plan),
            ratio,
        ]
    }

    fn sample_sheet() -> RawSheet {
        let mut rows = vec![vec![text("title")], vec![], vec![], vec![text("STT"), text("Điện lực")]];
        rows.push(data_row(1.0, text("ĐL Bắc"), num(900.0), 1000.0, num(0.9)));
        rows.push(data_row(2.0, CellValue::Empty, num(5.0), 10.0, num(0.5)));
        rows.push(data_row(3.0, text("   "), num(5.0), 10.0, num(0.5)));
        rows.push(data_row(4.0, text("ĐL Nam"), text("bad"), 500.0, num(0.855)));
        rows.push(data_row(5.0, num(12.0), num(7.0), 0.0, CellValue::Empty));
        RawSheet::from_rows("Tong hop luy ke", rows)
    }

    #[test]
    fn drops_blank_entities_and_rescales_ratio() {
        let sheet = sample_sheet();
        let (table, report) = clean_sheet(&sheet, &TableLayout::default(), "t.xlsx").unwrap();
        let names: Vec<&str> = table.records.iter().map(|r| r.entity.as_str()).collect();
        assert_eq!(names, vec!["ĐL Bắc", "ĐL Nam", "12"]);
        assert_eq!(report.total_rows, 5);
        assert_eq!(report.dropped_rows, 2);
        assert_eq!(table.records[0].ratio, Some(0.9 * 100.0));
        assert_eq!(table.records[1].ratio, Some(0.855 * 100.0));
        assert_eq!(table.records[2].ratio, None);
        assert_eq!(table.records[0].seq.as_deref(), Some("1"));
    }

    #[test]
    fn non_numeric_cells_become_missing() {
        let (table, report) =
            clean_sheet(&sample_sheet(), &TableLayout::default(), "t.xlsx").unwrap();
        assert_eq!(table.records[1].total_meters, None);
        assert_eq!(table.records[0].three_phase_indirect, None);
        // "x" in every kept row plus "bad" in one.
        assert_eq!(report.coerced_missing, 4);
    }

    #[test]
    fn cleaning_leaves_input_untouched_and_is_idempotent() {
        let sheet = sample_sheet();
        let before = sheet.clone();
        let (first, _) = clean_sheet(&sheet, &TableLayout::default(), "t.xlsx").unwrap();
        let (second, _) = clean_sheet(&sheet, &TableLayout::default(), "t.xlsx").unwrap();
        assert_eq!(sheet, before);
        assert_eq!(first, second);
        assert_eq!(first.cleaned(), first);
        assert_eq!(first.cleaned().cleaned(), first);
    }

    #[test]
    fn no_blank_entity_survives_arbitrary_rows() {
        let mut rows = vec![vec![]; 4];
        for i in 0..40 {
            let entity = match i % 4 {
                0 => CellValue::Empty,
                1 => text(""),
                2 => text(" \t"),
                _ => text(&format!("ĐL {}", i)),
            };
            rows.push(data_row(i as f64, entity, num(i as f64), 10.0, num(0.1)));
        }
        let sheet = RawSheet::from_rows("s", rows);
        let (table, report) = clean_sheet(&sheet, &TableLayout::default(), "t.xlsx").unwrap();
        assert_eq!(table.len(), 10);
        assert_eq!(report.dropped_rows, 30);
        assert!(table.records.iter().all(|r| !r.entity.trim().is_empty()));
    }

    #[test]
    fn short_sheets_are_format_errors() {
        let header_only = RawSheet::from_rows("s", vec![vec![text("a")]; 4]);
        let err = clean_sheet(&header_only, &TableLayout::default(), "old.xlsx").unwrap_err();
        assert!(err.to_string().contains("old.xlsx"));

        let narrow = RawSheet::from_rows("s", vec![vec![text("a"); 9]; 6]);
        let err = clean_sheet(&narrow, &TableLayout::default(), "new.xlsx").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("new.xlsx"));
        assert!(msg.contains("Kế hoạch"));
    }

    #[test]
    fn wide_sheets_are_format_errors() {
        let mut rows = vec![vec![]; 4];
        let mut row = data_row(1.0, text("ĐL Bắc"), num(900.0), 1000.0, num(0.9));
        row.push(text("ghi chú"));
        rows.push(row);
        let sheet = RawSheet::from_rows("s", rows);
        let err = clean_sheet(&sheet, &TableLayout::default(), "wide.xlsx").unwrap_err();
        assert!(matches!(err, ReportError::InputFormat { .. }));
        let msg = err.to_string();
        assert!(msg.contains("wide.xlsx"));
        assert!(msg.contains("12 columns"));
    }

    #[test]
    fn active_sheet_follows_the_selected_tab() {
        let mut book = rust_xlsxwriter::Workbook::new();
        book.add_worksheet().set_name("Ghi chú").unwrap().write_string(0, 0, "notes").unwrap();
        let results = book.add_worksheet();
        results.set_name("Kết quả").unwrap().set_active(true);
        results.write_number(4, 2, 100.0).unwrap();
        let bytes = book.save_to_buffer().unwrap();

        let mut workbook = Workbook::from_bytes("export.xlsx", bytes).unwrap();
        let sheet = workbook.active_sheet().unwrap();
        assert_eq!(sheet.name, "Kết quả");
        assert_eq!(sheet.get(5, 3), &num(100.0));
    }

    #[test]
    fn active_sheet_defaults_to_the_first_tab() {
        let mut book = rust_xlsxwriter::Workbook::new();
        book.add_worksheet().set_name("Một").unwrap();
        book.add_worksheet().set_name("Hai").unwrap();
        let bytes = book.save_to_buffer().unwrap();

        let mut workbook = Workbook::from_bytes("export.xlsx", bytes).unwrap();
        assert_eq!(workbook.active_sheet().unwrap().name, "Một");
    }
}
