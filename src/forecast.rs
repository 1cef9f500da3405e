use crate::config::Period;
use crate::error::{ReportError, Result};
use crate::loader::InspectionTable;
use crate::types::{InspectionRecord, SummaryStats};
use crate::util::{days_diff, safe_div, sum_present};
use chrono::NaiveDate;
use std::cmp::Ordering;
use std::fmt;

/// Entities shown in each of the top / bottom rankings.
pub const RANK_SIZE: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conclusion {
    Meets,
    Fails,
    /// The forecast could not be computed (missing ratio or no elapsed days).
    Undetermined,
}

impl Conclusion {
    /// `value` is a percentage; 100 or more meets the plan.
    pub fn from_percent(value: Option<f64>) -> Conclusion {
        match value {
            Some(v) if v >= 100.0 => Conclusion::Meets,
            Some(_) => Conclusion::Fails,
            None => Conclusion::Undetermined,
        }
    }
}

impl fmt::Display for Conclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Conclusion::Meets => "Meets target",
            Conclusion::Fails => "Below target",
            Conclusion::Undetermined => "N/A",
        };
        f.write_str(s)
    }
}

/// Aggregate linear forecast for the whole table.
#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    pub as_of: NaiveDate,
    pub period: Period,
    pub total_meters: f64,
    pub total_planned: f64,
    pub elapsed_days: i64,
    pub total_days: i64,
    /// `None` when no day of the period has elapsed yet.
    pub daily_average: Option<f64>,
    pub forecast_total: Option<f64>,
    /// Fraction of the plan; `None` when the plan sums to zero.
    pub forecast_ratio: Option<f64>,
}

impl Forecast {
    pub fn forecast_percent(&self) -> Option<f64> {
        self.forecast_ratio.map(|r| r * 100.0)
    }

    pub fn verdict(&self) -> Conclusion {
        Conclusion::from_percent(self.forecast_percent())
    }

    /// Multiplier that projects a current ratio to the end of the period.
    pub fn projection_factor(&self) -> Option<f64> {
        if self.elapsed_days <= 0 {
            return None;
        }
        Some(self.total_days as f64 / self.elapsed_days as f64)
    }

    pub fn summary(&self, entities: usize) -> SummaryStats {
        SummaryStats {
            as_of: self.as_of.to_string(),
            period_start: self.period.start.to_string(),
            period_end: self.period.end.to_string(),
            entities,
            total_meters: self.total_meters,
            total_planned: self.total_planned,
            elapsed_days: self.elapsed_days,
            total_days: self.total_days,
            daily_average: self.daily_average,
            forecast_total: self.forecast_total,
            forecast_ratio_pct: self.forecast_percent(),
            verdict: self.verdict().to_string(),
        }
    }
}

/// Per-entity projection used by the evaluation table.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordForecast {
    pub record: InspectionRecord,
    /// Percentage.
    pub forecast_ratio: Option<f64>,
    pub conclusion: Conclusion,
}

pub fn compute_forecast(table: &InspectionTable, period: Period, as_of: NaiveDate) -> Result<Forecast> {
    let total_days = days_diff(period.start, period.end);
    if total_days <= 0 {
        return Err(ReportError::Computation(format!(
            "planning period {}..{} has no days",
            period.start, period.end
        )));
    }
    let elapsed_days = days_diff(period.start, as_of);
    let total_meters = sum_present(table.records.iter().map(|r| r.total_meters));
    let total_planned = sum_present(table.records.iter().map(|r| r.planned));

    let daily_average = if elapsed_days > 0 {
        Some(total_meters / elapsed_days as f64)
    } else {
        None
    };
    let forecast_total = daily_average.map(|avg| avg * total_days as f64);
    let forecast_ratio = safe_div(forecast_total, Some(total_planned));

    Ok(Forecast {
        as_of,
        period,
        total_meters,
        total_planned,
        elapsed_days,
        total_days,
        daily_average,
        forecast_total,
        forecast_ratio,
    })
}

pub fn record_forecasts(table: &InspectionTable, forecast: &Forecast) -> Vec<RecordForecast> {
    let factor = forecast.projection_factor();
    table
        .records
        .iter()
        .map(|record| {
            let forecast_ratio = match (record.ratio, factor) {
                (Some(ratio), Some(factor)) => Some(ratio * factor),
                _ => None,
            };
            RecordForecast {
                record: record.clone(),
                forecast_ratio,
                conclusion: Conclusion::from_percent(forecast_ratio),
            }
        })
        .collect()
}

/// Records sorted by ratio, highest first. Missing ratios sort last; ties
/// keep table order.
pub fn ranked(table: &InspectionTable) -> Vec<InspectionRecord> {
    let mut sorted = table.records.clone();
    sorted.sort_by(|a, b| match (a.ratio, b.ratio) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    sorted
}

/// First and last `RANK_SIZE` of the ranking. With fewer than twice that
/// many entities the two lists share members.
pub fn top_bottom(table: &InspectionTable) -> (Vec<InspectionRecord>, Vec<InspectionRecord>) {
    let sorted = ranked(table);
    let top = sorted.iter().take(RANK_SIZE).cloned().collect();
    let skip = sorted.len().saturating_sub(RANK_SIZE);
    let bottom = sorted[skip..].to_vec();
    (top, bottom)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(entity: &str, total: Option<f64>, plan: Option<f64>, ratio: Option<f64>) -> InspectionRecord {
        InspectionRecord {
            entity: entity.to_string(),
            total_meters: total,
            planned: plan,
            ratio,
            ..Default::default()
        }
    }

    fn period() -> Period {
        Period {
            start: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2025, 9, 30).unwrap(),
        }
    }

    fn day(n: i64) -> NaiveDate {
        period().start + chrono::Duration::days(n)
    }

    #[test]
    fn scenario_meets_target() {
        let table = InspectionTable::new(vec![
            record("A", Some(4000.0), Some(6000.0), Some(66.0)),
            record("B", Some(5000.0), Some(4000.0), Some(125.0)),
        ]);
        let f = compute_forecast(&table, period(), day(90)).unwrap();
        assert_eq!(f.total_meters, 9000.0);
        assert_eq!(f.total_planned, 10000.0);
        assert_eq!(f.elapsed_days, 90);
        assert_eq!(f.total_days, 272);

        // Same totals, a 273-day period.
        let p = Period {
            start: period().start,
            end: period().start + chrono::Duration::days(273),
        };
        let f = compute_forecast(&table, p, day(90)).unwrap();
        assert_eq!(f.daily_average, Some(100.0));
        assert_eq!(f.forecast_total, Some(27300.0));
        assert!((f.forecast_ratio.unwrap() - 2.73).abs() < 1e-12);
        assert_eq!(f.verdict(), Conclusion::Meets);
    }

    #[test]
    fn totals_ignore_missing_values() {
        let table = InspectionTable::new(vec![
            record("A", Some(10.0), None, None),
            record("B", None, Some(30.0), None),
            record("C", Some(5.5), Some(1.0), None),
        ]);
        let f = compute_forecast(&table, period(), day(10)).unwrap();
        assert_eq!(f.total_meters, 15.5);
        assert_eq!(f.total_planned, 31.0);
    }

    #[test]
    fn zero_elapsed_days_leave_forecast_undefined() {
        let table = InspectionTable::new(vec![record("A", Some(10.0), Some(10.0), Some(100.0))]);
        let f = compute_forecast(&table, period(), day(0)).unwrap();
        assert_eq!(f.daily_average, None);
        assert_eq!(f.forecast_ratio, None);
        assert_eq!(f.verdict(), Conclusion::Undetermined);
        let rows = record_forecasts(&table, &f);
        assert_eq!(rows[0].conclusion, Conclusion::Undetermined);
    }

    #[test]
    fn zero_plan_leaves_ratio_undefined() {
        let table = InspectionTable::new(vec![record("A", Some(10.0), Some(0.0), None)]);
        let f = compute_forecast(&table, period(), day(5)).unwrap();
        assert_eq!(f.daily_average, Some(2.0));
        assert_eq!(f.forecast_ratio, None);
    }

    #[test]
    fn empty_period_is_a_computation_error() {
        let p = Period {
            start: period().end,
            end: period().start,
        };
        let err = compute_forecast(&InspectionTable::default(), p, day(5)).unwrap_err();
        assert!(matches!(err, ReportError::Computation(_)));
    }

    #[test]
    fn forecast_ratio_grows_with_daily_average() {
        let mut last = f64::MIN;
        for total in [100.0, 500.0, 900.0, 2000.0] {
            let table = InspectionTable::new(vec![record("A", Some(total), Some(5000.0), None)]);
            let f = compute_forecast(&table, period(), day(30)).unwrap();
            let ratio = f.forecast_ratio.unwrap();
            assert!(ratio > last);
            last = ratio;
        }
    }

    #[test]
    fn per_row_conclusion_uses_projection() {
        let table = InspectionTable::new(vec![
            record("A", None, None, Some(50.0)),
            record("B", None, None, Some(20.0)),
            record("C", None, None, None),
        ]);
        // 100 of 200 days: factor 2.
        let p = Period {
            start: period().start,
            end: period().start + chrono::Duration::days(200),
        };
        let f = compute_forecast(&table, p, day(100)).unwrap();
        let rows = record_forecasts(&table, &f);
        assert_eq!(rows[0].forecast_ratio, Some(100.0));
        assert_eq!(rows[0].conclusion, Conclusion::Meets);
        assert_eq!(rows[1].forecast_ratio, Some(40.0));
        assert_eq!(rows[1].conclusion, Conclusion::Fails);
        assert_eq!(rows[2].conclusion, Conclusion::Undetermined);
    }

    fn names(v: &[InspectionRecord]) -> Vec<String> {
        v.iter().map(|r| r.entity.clone()).collect()
    }

    #[test]
    fn ranking_puts_missing_last_and_allows_overlap() {
        let table = InspectionTable::new(vec![
            record("A", None, None, Some(40.0)),
            record("B", None, None, None),
            record("C", None, None, Some(90.0)),
            record("D", None, None, Some(60.0)),
        ]);
        assert_eq!(names(&ranked(&table)), ["C", "D", "A", "B"]);
        let (top, bottom) = top_bottom(&table);
        assert_eq!(names(&top), ["C", "D", "A"]);
        assert_eq!(names(&bottom), ["D", "A", "B"]);
    }

    #[test]
    fn ranking_small_tables() {
        let table = InspectionTable::new(vec![record("A", None, None, Some(1.0))]);
        let (top, bottom) = top_bottom(&table);
        assert_eq!(top.len(), 1);
        assert_eq!(bottom.len(), 1);
        let (top, bottom) = top_bottom(&InspectionTable::default());
        assert!(top.is_empty() && bottom.is_empty());
    }
}
