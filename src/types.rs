use serde::Serialize;
use tabled::Tabled;

/// One scalar cell as loaded from a workbook.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
}

impl CellValue {
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Render as text the way a spreadsheet shows it (`12.0` becomes `12`).
    pub fn as_text(&self) -> Option<String> {
        match self {
            CellValue::Empty => None,
            CellValue::Text(s) => Some(s.trim().to_string()),
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                Some(format!("{}", *n as i64))
            }
            CellValue::Number(n) => Some(n.to_string()),
            CellValue::Bool(b) => Some(b.to_string()),
        }
    }
}

/// Untyped grid anchored at A1. Coordinates are 1-based `(row, col)`;
/// anything outside the stored area reads as `Empty`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSheet {
    pub name: String,
    rows: Vec<Vec<CellValue>>,
}

impl RawSheet {
    pub fn new(name: impl Into<String>) -> Self {
        RawSheet {
            name: name.into(),
            rows: Vec::new(),
        }
    }

    pub fn from_rows(name: impl Into<String>, rows: Vec<Vec<CellValue>>) -> Self {
        RawSheet {
            name: name.into(),
            rows,
        }
    }

    pub fn set(&mut self, row: u32, col: u32, value: CellValue) {
        if row == 0 || col == 0 {
            return;
        }
        let (r, c) = ((row - 1) as usize, (col - 1) as usize);
        if self.rows.len() <= r {
            self.rows.resize_with(r + 1, Vec::new);
        }
        let line = &mut self.rows[r];
        if line.len() <= c {
            line.resize(c + 1, CellValue::Empty);
        }
        line[c] = value;
    }

    pub fn get(&self, row: u32, col: u32) -> &CellValue {
        static EMPTY: CellValue = CellValue::Empty;
        if row == 0 || col == 0 {
            return &EMPTY;
        }
        self.rows
            .get((row - 1) as usize)
            .and_then(|line| line.get((col - 1) as usize))
            .unwrap_or(&EMPTY)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Widest row, in columns.
    pub fn col_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// 1-based rows, each as a slice of cells.
    pub fn rows(&self) -> impl Iterator<Item = &[CellValue]> {
        self.rows.iter().map(Vec::as_slice)
    }
}

/// One entity's row of the cleaned table. `ratio` is a percentage.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InspectionRecord {
    pub seq: Option<String>,
    pub entity: String,
    pub single_phase_direct: Option<f64>,
    pub single_phase_indirect: Option<f64>,
    pub three_phase_direct: Option<f64>,
    pub three_phase_indirect: Option<f64>,
    pub voltage_transformers: Option<f64>,
    pub current_transformers: Option<f64>,
    pub total_meters: Option<f64>,
    pub planned: Option<f64>,
    pub ratio: Option<f64>,
}

impl InspectionRecord {
    /// The nine numeric columns in sheet order.
    pub fn numeric_fields(&self) -> [Option<f64>; 9] {
        [
            self.single_phase_direct,
            self.single_phase_indirect,
            self.three_phase_direct,
            self.three_phase_indirect,
            self.voltage_transformers,
            self.current_transformers,
            self.total_meters,
            self.planned,
            self.ratio,
        ]
    }
}

/// Per-entity evaluation row, shown on the console and exported to CSV.
#[derive(Debug, Serialize, Tabled, Clone)]
pub struct EvaluationRow {
    #[serde(rename = "Entity")]
    #[tabled(rename = "Entity")]
    pub entity: String,
    #[serde(rename = "TotalMeters")]
    #[tabled(rename = "TotalMeters")]
    pub total_meters: String,
    #[serde(rename = "Planned")]
    #[tabled(rename = "Planned")]
    pub planned: String,
    #[serde(rename = "Ratio")]
    #[tabled(rename = "Ratio")]
    pub ratio: String,
    #[serde(rename = "ForecastRatio")]
    #[tabled(rename = "ForecastRatio")]
    pub forecast_ratio: String,
    #[serde(rename = "Conclusion")]
    #[tabled(rename = "Conclusion")]
    pub conclusion: String,
}

/// Joined old/new row for the console preview.
#[derive(Debug, Tabled, Clone)]
pub struct ComparisonRow {
    #[tabled(rename = "Entity")]
    pub entity: String,
    #[tabled(rename = "TotalOld")]
    pub total_old: String,
    #[tabled(rename = "TotalNew")]
    pub total_new: String,
    #[tabled(rename = "TotalDelta")]
    pub total_delta: String,
    #[tabled(rename = "RatioOld")]
    pub ratio_old: String,
    #[tabled(rename = "RatioNew")]
    pub ratio_new: String,
    #[tabled(rename = "RatioDelta")]
    pub ratio_delta: String,
}

#[derive(Debug, Serialize)]
pub struct SummaryStats {
    pub as_of: String,
    pub period_start: String,
    pub period_end: String,
    pub entities: usize,
    pub total_meters: f64,
    pub total_planned: f64,
    pub elapsed_days: i64,
    pub total_days: i64,
    pub daily_average: Option<f64>,
    pub forecast_total: Option<f64>,
    pub forecast_ratio_pct: Option<f64>,
    pub verdict: String,
}
