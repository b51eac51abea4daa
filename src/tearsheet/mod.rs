//! Tearsheet: performance statistics and chart for a returns series

mod figure;
mod statistics;

pub use figure::{create_figure, Figure, DEFAULT_HEIGHT, DEFAULT_WIDTH};
pub use statistics::{CurveStats, Statistics, TimeStats, TradeStats};

use crate::engine::ReturnSeries;
use chrono::Datelike;
use std::collections::BTreeMap;

/// Trading periods per year used for annualization
pub const PERIODS_PER_YEAR: f64 = 252.0;

pub(crate) fn round2(value: f64) -> f64 {
    if value.is_finite() {
        (value * 100.0).round() / 100.0
    } else {
        0.0
    }
}

/// Summed daily returns per (year, month)
pub(crate) fn group_by_month(returns: &ReturnSeries) -> BTreeMap<(i32, u32), f64> {
    let mut months = BTreeMap::new();
    for (date, r) in returns {
        *months.entry((date.year(), date.month())).or_insert(0.0) += r;
    }
    months
}

/// Summed daily returns per year
pub(crate) fn group_by_year(returns: &ReturnSeries) -> BTreeMap<i32, f64> {
    let mut years = BTreeMap::new();
    for (date, r) in returns {
        *years.entry(date.year()).or_insert(0.0) += r;
    }
    years
}

/// Format with thousands separators and two decimals, e.g. `-1,234.50`
pub fn format_amount(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (whole, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, frac)
}
