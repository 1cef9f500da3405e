// Utility helpers for coercion, dates and number formatting.
//
// This module centralizes the "dirty" cell handling so the rest of the code
// can assume typed values, and the display rules so every report renders
// numbers the same way.
use crate::types::CellValue;
use chrono::NaiveDate;
use num_format::{Locale, ToFormattedString};

/// Marker rendered wherever a value is missing or undefined.
pub const NOT_AVAILABLE: &str = "N/A";

/// Coerce a cell into a number.
///
/// Contract: parses to a number, else `None`. Never an error.
/// - Numbers pass through (non-finite values become `None`).
/// - Booleans count as 1 / 0.
/// - Text is trimmed, thousands commas are stripped, then parsed.
/// - Empty cells and anything unparsable are `None`.
pub fn coerce_number(cell: &CellValue) -> Option<f64> {
    match cell {
        CellValue::Number(n) if n.is_finite() => Some(*n),
        CellValue::Number(_) => None,
        CellValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        CellValue::Text(s) => parse_f64_safe(Some(s)),
        CellValue::Empty => None,
    }
}

/// Parse a string-like value into `f64` while being forgiving about the
/// formatting issues common in hand-edited sheets (commas, spaces).
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    let s = s.replace(',', "");
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub fn days_diff(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days()
}

/// Sum of the present values; missing ones are skipped.
pub fn sum_present<I>(values: I) -> f64
where
    I: IntoIterator<Item = Option<f64>>,
{
    values.into_iter().flatten().sum()
}

/// `a / b`, or `None` when `b` is zero or either side is missing.
pub fn safe_div(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) if b != 0.0 => Some(a / b).filter(|v| v.is_finite()),
        _ => None,
    }
}

pub fn format_number(n: f64, decimals: usize, locale: &Locale) -> String {
    // Fixed decimals plus locale thousands separators (`1,234,567.89` in en).
    let neg = n.is_sign_negative() && n != 0.0;
    let s = format!("{:.*}", decimals, n.abs());
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let int_val: u64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(locale);
    if let Some(frac) = frac_part {
        if decimals > 0 {
            res.push_str(locale.decimal());
            res.push_str(frac);
        }
    }
    // Negative values that round to zero print unsigned.
    if neg && res.chars().any(|c| c.is_ascii_digit() && c != '0') {
        format!("{}{}", locale.minus_sign(), res)
    } else {
        res
    }
}

pub fn format_int<T>(n: T, locale: &Locale) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(locale)
}

/// Whole-number count with separators, truncated toward zero. `N/A` when missing.
pub fn format_count(v: Option<f64>, locale: &Locale) -> String {
    match v {
        Some(v) => format_number(v.trunc(), 0, locale),
        None => NOT_AVAILABLE.to_string(),
    }
}

/// Two-decimal percentage. `N/A` when missing.
pub fn format_percent(v: Option<f64>, locale: &Locale) -> String {
    match v {
        Some(v) => format!("{}%", format_number(v, 2, locale)),
        None => NOT_AVAILABLE.to_string(),
    }
}

/// Chart label: one decimal, always `.` as separator.
pub fn bar_label(v: f64) -> String {
    format!("{:.1}%", v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coercion_never_fails() {
        assert_eq!(coerce_number(&CellValue::Number(3.5)), Some(3.5));
        assert_eq!(coerce_number(&CellValue::Text(" 1,250 ".into())), Some(1250.0));
        assert_eq!(coerce_number(&CellValue::Text("n/a".into())), None);
        assert_eq!(coerce_number(&CellValue::Text("".into())), None);
        assert_eq!(coerce_number(&CellValue::Bool(true)), Some(1.0));
        assert_eq!(coerce_number(&CellValue::Empty), None);
        assert_eq!(coerce_number(&CellValue::Number(f64::NAN)), None);
    }

    #[test]
    fn safe_div_guards_zero_and_missing() {
        assert_eq!(safe_div(Some(10.0), Some(4.0)), Some(2.5));
        assert_eq!(safe_div(Some(10.0), Some(0.0)), None);
        assert_eq!(safe_div(None, Some(4.0)), None);
        assert_eq!(safe_div(Some(1.0), None), None);
    }

    #[test]
    fn sums_skip_missing() {
        assert_eq!(sum_present([Some(1.0), None, Some(2.5)]), 3.5);
        assert_eq!(sum_present(Vec::<Option<f64>>::new()), 0.0);
    }

    #[test]
    fn numbers_use_locale_separators() {
        assert_eq!(format_number(1234567.891, 2, &Locale::en), "1,234,567.89");
        assert_eq!(format_number(-27300.0, 0, &Locale::en), "-27,300");
        assert_eq!(format_number(-0.001, 2, &Locale::en), "0.00");
        assert_eq!(format_number(1234.5, 2, &Locale::de), "1.234,50");
        assert_eq!(format_int(9855, &Locale::en), "9,855");
    }

    #[test]
    fn missing_values_render_as_marker() {
        assert_eq!(format_count(None, &Locale::en), "N/A");
        assert_eq!(format_percent(None, &Locale::en), "N/A");
        assert_eq!(format_count(Some(9000.9), &Locale::en), "9,000");
        assert_eq!(format_percent(Some(273.0), &Locale::en), "273.00%");
        assert_eq!(bar_label(85.54), "85.5%");
    }
}
