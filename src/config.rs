// Run configuration.
//
// Every value the workflow used to hardcode (sheet names, offsets, calendar
// anchors, output names) lives here with the old constant as its default, so
// a format drift in the source files is a config change.
use crate::error::{ReportError, Result};
use chrono::{Datelike, NaiveDate};
use num_format::Locale;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Number of positional columns in the consolidated sheet.
pub const COLUMN_COUNT: usize = 11;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub layout: TableLayout,
    pub consolidation: ConsolidationConfig,
    pub period: PeriodConfig,
    pub output: OutputConfig,
}

/// Where the cleaned table lives inside a consolidated workbook.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TableLayout {
    pub sheet_name: String,
    pub header_rows: usize,
    pub columns: Vec<String>,
}

impl Default for TableLayout {
    fn default() -> Self {
        TableLayout {
            sheet_name: "Tong hop luy ke".to_string(),
            header_rows: 4,
            columns: [
                "STT",
                "Điện lực",
                "1P_GT",
                "1P_TT",
                "3P_GT",
                "3P_TT",
                "TU",
                "TI",
                "Tổng công tơ",
                "Kế hoạch",
                "Tỷ lệ",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl TableLayout {
    pub fn entity_column(&self) -> &str {
        &self.columns[1]
    }
}

/// Rectangular block copied from the source workbook into the template.
/// Rows and columns are 1-based and inclusive.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConsolidationConfig {
    pub template_sheet: String,
    /// Sheet to copy from. Defaults to the source workbook's active tab.
    pub source_sheet: Option<String>,
    pub first_row: u32,
    pub last_row: u32,
    pub first_col: u32,
    pub last_col: u32,
    pub file_prefix: String,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        ConsolidationConfig {
            template_sheet: "KQUA".to_string(),
            source_sheet: None,
            first_row: 5,
            last_row: 76,
            first_col: 3,
            last_col: 8,
            file_prefix: "Tong_hop_ket_qua_den_ngay".to_string(),
        }
    }
}

impl ConsolidationConfig {
    /// `<prefix>_<DDMMYYYY>.xlsx`
    pub fn file_name(&self, date: NaiveDate) -> String {
        format!("{}_{}.xlsx", self.file_prefix, date.format("%d%m%Y"))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PeriodConfig {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl PeriodConfig {
    /// Resolve the planning period for a report dated `as_of`. Missing anchors
    /// fall back to Jan 1 and Sep 30 of that year.
    pub fn resolve(&self, as_of: NaiveDate) -> Period {
        let year = as_of.year();
        let start = self
            .start
            .or_else(|| NaiveDate::from_ymd_opt(year, 1, 1))
            .unwrap_or(as_of);
        let end = self
            .end
            .or_else(|| NaiveDate::from_ymd_opt(year, 9, 30))
            .unwrap_or(as_of);
        Period { start, end }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
    pub analysis_docx: String,
    pub comparison_docx: String,
    pub comparison_xlsx: String,
    pub number_locale: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            directory: PathBuf::from("reports"),
            analysis_docx: "Bao_cao_Phan_tich_DienLuc.docx".to_string(),
            comparison_docx: "Bao_cao_So_Sanh_DienLuc.docx".to_string(),
            comparison_xlsx: "So_sanh_DienLuc.xlsx".to_string(),
            number_locale: "en".to_string(),
        }
    }
}

impl OutputConfig {
    pub fn locale(&self) -> Result<Locale> {
        Locale::from_name(&self.number_locale).map_err(|_| {
            ReportError::input(
                "config",
                format!("unknown number locale '{}'", self.number_locale),
            )
        })
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Config> {
        let file = path.display().to_string();
        let text = std::fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&text).map_err(|e| ReportError::input(&file, e.to_string()))?;
        config.validate(&file)?;
        Ok(config)
    }

    pub fn validate(&self, file: &str) -> Result<()> {
        if self.layout.columns.len() != COLUMN_COUNT {
            return Err(ReportError::input(
                file,
                format!(
                    "layout.columns must name {} columns, found {}",
                    COLUMN_COUNT,
                    self.layout.columns.len()
                ),
            ));
        }
        let c = &self.consolidation;
        if c.first_row == 0 || c.first_col == 0 || c.first_row > c.last_row || c.first_col > c.last_col {
            return Err(ReportError::input(
                file,
                format!(
                    "consolidation region rows {}..={} cols {}..={} is empty or not 1-based",
                    c.first_row, c.last_row, c.first_col, c.last_col
                ),
            ));
        }
        if let (Some(start), Some(end)) = (self.period.start, self.period.end) {
            if end <= start {
                return Err(ReportError::input(
                    file,
                    format!("period.end {} must be after period.start {}", end, start),
                ));
            }
        }
        self.output.locale().map_err(|_| {
            ReportError::input(
                file,
                format!("unknown number locale '{}'", self.output.number_locale),
            )
        })?;
        Ok(())
    }
}
