use crate::charts::{
    render_bar_chart, render_grouped_chart, Bar, BarChart, GroupedBarChart, Png,
};
use crate::compare::{Comparison, Trend};
use crate::document::{ReportDocument, TableBlock, GREEN, RED};
use crate::error::Result;
use crate::forecast::{Conclusion, Forecast, RecordForecast, RANK_SIZE};
use crate::types::{ComparisonRow, EvaluationRow, InspectionRecord};
use crate::util::{format_count, format_number, format_percent, NOT_AVAILABLE};
use chrono::NaiveDate;
use num_format::Locale;

const Y_LABEL: &str = "Completion (%)";

/// Everything the analysis document is built from.
pub struct AnalysisData<'a> {
    pub forecast: &'a Forecast,
    pub rows: &'a [RecordForecast],
    pub top: &'a [InspectionRecord],
    pub bottom: &'a [InspectionRecord],
}

/// The three charts embedded in the analysis document.
pub struct AnalysisCharts {
    pub all: Png,
    pub top: Png,
    pub bottom: Png,
}

fn ratio_bars(records: &[InspectionRecord]) -> Vec<Bar> {
    records
        .iter()
        .map(|r| Bar {
            label: r.entity.clone(),
            value: r.ratio,
        })
        .collect()
}

pub fn all_entities_chart(records: &[InspectionRecord]) -> BarChart {
    BarChart {
        title: "Plan completion by entity".to_string(),
        y_label: Y_LABEL.to_string(),
        bars: ratio_bars(records),
        size: (1000, 500),
    }
}

pub fn top_chart(top: &[InspectionRecord]) -> BarChart {
    BarChart {
        title: format!("Top {} entities by completion", RANK_SIZE),
        y_label: Y_LABEL.to_string(),
        bars: ratio_bars(top),
        size: (600, 400),
    }
}

pub fn bottom_chart(bottom: &[InspectionRecord]) -> BarChart {
    BarChart {
        title: format!("Bottom {} entities by completion", RANK_SIZE),
        y_label: Y_LABEL.to_string(),
        bars: ratio_bars(bottom),
        size: (600, 400),
    }
}

pub fn comparison_chart(cmp: &Comparison) -> GroupedBarChart {
    GroupedBarChart {
        title: "Completion: previous vs current period".to_string(),
        y_label: Y_LABEL.to_string(),
        categories: cmp.records.iter().map(|r| r.entity().to_string()).collect(),
        series: [
            (
                "Previous".to_string(),
                cmp.records.iter().map(|r| r.old.ratio).collect(),
            ),
            (
                "Current".to_string(),
                cmp.records.iter().map(|r| r.new.ratio).collect(),
            ),
        ],
        size: (1000, 500),
    }
}

pub fn render_analysis_charts(
    records: &[InspectionRecord],
    top: &[InspectionRecord],
    bottom: &[InspectionRecord],
) -> Result<AnalysisCharts> {
    Ok(AnalysisCharts {
        all: render_bar_chart(&all_entities_chart(records))?,
        top: render_bar_chart(&top_chart(top))?,
        bottom: render_bar_chart(&bottom_chart(bottom))?,
    })
}

pub fn evaluation_rows(rows: &[RecordForecast], locale: &Locale) -> Vec<EvaluationRow> {
    rows.iter()
        .map(|r| EvaluationRow {
            entity: r.record.entity.clone(),
            total_meters: format_count(r.record.total_meters, locale),
            planned: format_count(r.record.planned, locale),
            ratio: format_percent(r.record.ratio, locale),
            forecast_ratio: format_percent(r.forecast_ratio, locale),
            conclusion: r.conclusion.to_string(),
        })
        .collect()
}

fn day_month_year(d: NaiveDate) -> String {
    d.format("%d/%m/%Y").to_string()
}

pub fn verdict_line(forecast: &Forecast) -> String {
    let end = day_month_year(forecast.period.end);
    match forecast.verdict() {
        Conclusion::Meets => format!("Forecast: the overall plan WILL be met by {}.", end),
        Conclusion::Fails => format!("Forecast: the overall plan will NOT be met by {}.", end),
        Conclusion::Undetermined => format!(
            "Forecast for {} is undetermined (no elapsed days or no planned total).",
            end
        ),
    }
}

pub fn summary_lines(forecast: &Forecast, locale: &Locale) -> Vec<String> {
    let per_day = match forecast.daily_average {
        Some(avg) => format!("{} meters/day", format_number(avg, 2, locale)),
        None => NOT_AVAILABLE.to_string(),
    };
    let projected = match forecast.forecast_total {
        Some(total) => format!("{} meters", format_count(Some(total), locale)),
        None => NOT_AVAILABLE.to_string(),
    };
    vec![
        format!("Meters inspected: {}", format_count(Some(forecast.total_meters), locale)),
        format!("Planned total: {}", format_count(Some(forecast.total_planned), locale)),
        format!("Average pace: {}", per_day),
        format!(
            "Forecast to {}: {}",
            day_month_year(forecast.period.end),
            projected
        ),
        format!(
            "Forecast completion: {}",
            format_percent(forecast.forecast_percent(), locale)
        ),
    ]
}

fn ranking_table(records: &[InspectionRecord], locale: &Locale) -> TableBlock {
    let mut table = TableBlock::new(["Entity", "Total meters", "Planned", "Completion"]);
    for r in records {
        table.push(
            vec![
                r.entity.clone(),
                format_count(r.total_meters, locale),
                format_count(r.planned, locale),
                format_percent(r.ratio, locale),
            ],
            None,
        );
    }
    table
}

pub fn build_analysis_document(
    data: &AnalysisData<'_>,
    charts: AnalysisCharts,
    locale: &Locale,
) -> ReportDocument {
    let mut doc = ReportDocument::new();
    doc.title("INSPECTION RESULTS ANALYSIS REPORT");
    for line in summary_lines(data.forecast, locale) {
        doc.paragraph(line);
    }
    doc.paragraph(verdict_line(data.forecast));

    doc.heading("I. RESULTS BY ENTITY");
    let mut table = TableBlock::new([
        "Entity",
        "Total meters",
        "Planned",
        "Current ratio",
        "Forecast ratio",
        "Conclusion",
    ]);
    for (row, eval) in data.rows.iter().zip(evaluation_rows(data.rows, locale)) {
        let color = (row.conclusion == Conclusion::Fails).then_some(RED);
        table.push(
            vec![
                eval.entity,
                eval.total_meters,
                eval.planned,
                eval.ratio,
                eval.forecast_ratio,
                eval.conclusion,
            ],
            color,
        );
    }
    doc.table(table);

    doc.heading("II. SUMMARY CHART");
    doc.image(charts.all, 6.0);

    doc.heading(format!("III. TOP {}", RANK_SIZE));
    doc.image(charts.top, 5.0);
    doc.table(ranking_table(data.top, locale));

    doc.heading(format!("IV. BOTTOM {}", RANK_SIZE));
    doc.image(charts.bottom, 5.0);
    doc.table(ranking_table(data.bottom, locale));
    doc
}

pub fn comparison_rows(cmp: &Comparison, locale: &Locale) -> Vec<ComparisonRow> {
    cmp.records
        .iter()
        .map(|r| ComparisonRow {
            entity: r.entity().to_string(),
            total_old: format_count(r.old.total_meters, locale),
            total_new: format_count(r.new.total_meters, locale),
            total_delta: format_count(r.total_delta, locale),
            ratio_old: format_percent(r.old.ratio, locale),
            ratio_new: format_percent(r.new.ratio, locale),
            ratio_delta: format_percent(r.ratio_delta, locale),
        })
        .collect()
}

/// One line per entity whose ratio moved.
pub fn narrative(cmp: &Comparison) -> Vec<String> {
    cmp.records
        .iter()
        .filter_map(|r| match r.trend() {
            Trend::Improved => Some(format!("- {}: improvement over the previous period.", r.entity())),
            Trend::Declined => Some(format!("- {}: decline compared with the previous period.", r.entity())),
            Trend::Unchanged => None,
        })
        .collect()
}

pub fn build_comparison_document(
    cmp: &Comparison,
    chart: Png,
    date: NaiveDate,
    locale: &Locale,
) -> ReportDocument {
    let mut doc = ReportDocument::new();
    doc.title("INSPECTION RESULTS COMPARISON REPORT");
    doc.paragraph(format!("Comparison date: {}", day_month_year(date)));
    doc.paragraph(format!(
        "Overall completion: previous {}, current {}, change {}",
        format_percent(cmp.old_totals.ratio, locale),
        format_percent(cmp.new_totals.ratio, locale),
        format_percent(cmp.overall_ratio_delta(), locale)
    ));

    doc.heading("I. COMPARISON TABLE");
    let mut table = TableBlock::new([
        "Entity",
        "Total meters (previous)",
        "Total meters (current)",
        "Meter change",
        "Ratio (previous)",
        "Ratio (current)",
        "Ratio change",
    ]);
    for (record, row) in cmp.records.iter().zip(comparison_rows(cmp, locale)) {
        let color = match record.trend() {
            Trend::Improved => Some(GREEN),
            Trend::Declined => Some(RED),
            Trend::Unchanged => None,
        };
        table.push(
            vec![
                row.entity,
                row.total_old,
                row.total_new,
                row.total_delta,
                row.ratio_old,
                row.ratio_new,
                row.ratio_delta,
            ],
            color,
        );
    }
    doc.table(table);

    doc.heading("II. COMPARISON CHART");
    doc.image(chart, 6.0);

    doc.heading("III. REMARKS");
    for line in narrative(cmp) {
        doc.paragraph(line);
    }

    if !cmp.only_old.is_empty() || !cmp.only_new.is_empty() {
        doc.heading("IV. UNMATCHED ENTITIES");
        for entity in &cmp.only_old {
            doc.paragraph(format!("- {}: only in the previous report.", entity));
        }
        for entity in &cmp.only_new {
            doc.paragraph(format!("- {}: only in the current report.", entity));
        }
    }
    doc
}

pub fn render_comparison_chart(cmp: &Comparison) -> Result<Png> {
    render_grouped_chart(&comparison_chart(cmp))
}
