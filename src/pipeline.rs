// The three pipelines as plain functions from inputs and config to output
// artifacts. Nothing here touches the filesystem except through the
// `Workbook` values callers hand in; saving is left to the caller.
use crate::charts::Png;
use crate::compare::{compare_tables, Comparison};
use crate::config::Config;
use crate::consolidate::{consolidate, Consolidated};
use crate::document::ReportDocument;
use crate::error::Result;
use crate::forecast::{compute_forecast, record_forecasts, top_bottom, Forecast, RecordForecast};
use crate::loader::{InspectionTable, Workbook};
use crate::output::comparison_workbook;
use crate::reports::{
    build_analysis_document, build_comparison_document, render_analysis_charts,
    render_comparison_chart, AnalysisCharts, AnalysisData,
};
use crate::types::InspectionRecord;
use chrono::NaiveDate;
use num_format::Locale;
use tracing::info;

/// A finished output file held in memory.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

pub fn run_consolidation(
    source: &mut Workbook,
    template: &[u8],
    template_name: &str,
    config: &Config,
    date: NaiveDate,
) -> Result<Consolidated> {
    let sheet = match &config.consolidation.source_sheet {
        Some(name) => source.sheet(name)?,
        None => source.active_sheet()?,
    };
    consolidate(
        &sheet,
        source.name(),
        template,
        template_name,
        &config.consolidation,
        date,
    )
}

/// Statistics of one consolidated report.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub table: InspectionTable,
    pub forecast: Forecast,
    pub rows: Vec<RecordForecast>,
    pub top: Vec<InspectionRecord>,
    pub bottom: Vec<InspectionRecord>,
}

pub fn analyze(table: InspectionTable, config: &Config, as_of: NaiveDate) -> Result<Analysis> {
    let period = config.period.resolve(as_of);
    let forecast = compute_forecast(&table, period, as_of)?;
    let rows = record_forecasts(&table, &forecast);
    let (top, bottom) = top_bottom(&table);
    info!(
        entities = table.len(),
        elapsed_days = forecast.elapsed_days,
        total_days = forecast.total_days,
        verdict = %forecast.verdict(),
        "analysis computed"
    );
    Ok(Analysis {
        table,
        forecast,
        rows,
        top,
        bottom,
    })
}

impl Analysis {
    pub fn document(&self, charts: AnalysisCharts, locale: &Locale) -> ReportDocument {
        let data = AnalysisData {
            forecast: &self.forecast,
            rows: &self.rows,
            top: &self.top,
            bottom: &self.bottom,
        };
        build_analysis_document(&data, charts, locale)
    }

    /// Render the charts and the Word report.
    pub fn render(&self, config: &Config) -> Result<Artifact> {
        let locale = config.output.locale()?;
        let charts = render_analysis_charts(&self.table.records, &self.top, &self.bottom)?;
        let bytes = self.document(charts, &locale).to_docx()?;
        Ok(Artifact {
            file_name: config.output.analysis_docx.clone(),
            bytes,
        })
    }
}

pub fn compare(old: &InspectionTable, new: &InspectionTable) -> Comparison {
    let cmp = compare_tables(old, new);
    info!(
        joined = cmp.records.len(),
        only_old = cmp.only_old.len(),
        only_new = cmp.only_new.len(),
        "comparison joined"
    );
    cmp
}

pub fn comparison_document(cmp: &Comparison, chart: Png, date: NaiveDate, locale: &Locale) -> ReportDocument {
    build_comparison_document(cmp, chart, date, locale)
}

/// Render the Word report and the flat spreadsheet export.
pub fn render_comparison(cmp: &Comparison, config: &Config, date: NaiveDate) -> Result<(Artifact, Artifact)> {
    let locale = config.output.locale()?;
    let chart = render_comparison_chart(cmp)?;
    let document = Artifact {
        file_name: config.output.comparison_docx.clone(),
        bytes: comparison_document(cmp, chart, date, &locale).to_docx()?,
    };
    let workbook = Artifact {
        file_name: config.output.comparison_xlsx.clone(),
        bytes: comparison_workbook(cmp, &config.layout)?,
    };
    Ok((document, workbook))
}
