use crate::loader::InspectionTable;
use crate::types::InspectionRecord;
use crate::util::{safe_div, sum_present};
use std::collections::HashSet;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Improved,
    Declined,
    Unchanged,
}

impl Trend {
    pub fn from_delta(delta: Option<f64>) -> Trend {
        match delta {
            Some(d) if d > 0.0 => Trend::Improved,
            Some(d) if d < 0.0 => Trend::Declined,
            _ => Trend::Unchanged,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRecord {
    pub old: InspectionRecord,
    pub new: InspectionRecord,
    /// `new.total_meters - old.total_meters`
    pub total_delta: Option<f64>,
    /// `new.ratio - old.ratio`, in percentage points.
    pub ratio_delta: Option<f64>,
}

impl ComparisonRecord {
    pub fn entity(&self) -> &str {
        &self.old.entity
    }

    pub fn trend(&self) -> Trend {
        Trend::from_delta(self.ratio_delta)
    }
}

/// Overall completion of one period: `Σtotal / Σplanned`, as a percentage.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodTotals {
    pub total_meters: f64,
    pub total_planned: f64,
    pub ratio: Option<f64>,
}

impl PeriodTotals {
    fn of(table: &InspectionTable) -> PeriodTotals {
        let total_meters = sum_present(table.records.iter().map(|r| r.total_meters));
        let total_planned = sum_present(table.records.iter().map(|r| r.planned));
        PeriodTotals {
            total_meters,
            total_planned,
            ratio: safe_div(Some(total_meters), Some(total_planned)).map(|r| r * 100.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub records: Vec<ComparisonRecord>,
    /// Entities present only in the previous report.
    pub only_old: Vec<String>,
    /// Entities present only in the current report.
    pub only_new: Vec<String>,
    pub old_totals: PeriodTotals,
    pub new_totals: PeriodTotals,
}

impl Comparison {
    /// Change of the overall completion ratio, in percentage points.
    pub fn overall_ratio_delta(&self) -> Option<f64> {
        delta(self.old_totals.ratio, self.new_totals.ratio)
    }
}

fn delta(old: Option<f64>, new: Option<f64>) -> Option<f64> {
    match (old, new) {
        (Some(o), Some(n)) => Some(n - o),
        _ => None,
    }
}

/// Inner join on entity name, in the previous report's order. Duplicate
/// names pair up with every match, like a relational join.
pub fn compare_tables(old: &InspectionTable, new: &InspectionTable) -> Comparison {
    let mut records = Vec::new();
    for o in &old.records {
        for n in new.records.iter().filter(|n| n.entity == o.entity) {
            records.push(ComparisonRecord {
                old: o.clone(),
                new: n.clone(),
                total_delta: delta(o.total_meters, n.total_meters),
                ratio_delta: delta(o.ratio, n.ratio),
            });
        }
    }

    let old_names: HashSet<&str> = old.records.iter().map(|r| r.entity.as_str()).collect();
    let new_names: HashSet<&str> = new.records.iter().map(|r| r.entity.as_str()).collect();
    let only_old = unmatched(&old.records, &new_names);
    let only_new = unmatched(&new.records, &old_names);
    if !only_old.is_empty() || !only_new.is_empty() {
        warn!(
            only_old = ?only_old,
            only_new = ?only_new,
            "entities without a counterpart are left out of the comparison"
        );
    }

    Comparison {
        records,
        only_old,
        only_new,
        old_totals: PeriodTotals::of(old),
        new_totals: PeriodTotals::of(new),
    }
}

fn unmatched(records: &[InspectionRecord], other: &HashSet<&str>) -> Vec<String> {
    let mut seen = HashSet::new();
    records
        .iter()
        .map(|r| r.entity.as_str())
        .filter(|e| !other.contains(e) && seen.insert(*e))
        .map(str::to_string)
        .collect()
}
