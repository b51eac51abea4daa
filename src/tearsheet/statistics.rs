//! Curve, trade and time statistics

use super::{group_by_month, group_by_year, round2, PERIODS_PER_YEAR};
use crate::engine::{ReturnSeries, Trade};
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Equity curve statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurveStats {
    #[serde(rename = "Total Return")]
    pub total_return: f64,
    #[serde(rename = "CAGR")]
    pub cagr: f64,
    #[serde(rename = "Sharpe Ratio")]
    pub sharpe_ratio: f64,
    #[serde(rename = "Annual Volatility")]
    pub annual_volatility: f64,
    #[serde(rename = "SQN")]
    pub sqn: f64,
    #[serde(rename = "R-Squared")]
    pub r_squared: f64,
    #[serde(rename = "Max Daily Drawdown")]
    pub max_daily_drawdown: f64,
    /// Longest stretch below a previous peak, in bars
    #[serde(rename = "Max Drawdown Duration")]
    pub max_drawdown_duration: f64,
    #[serde(rename = "Trades Per Year")]
    pub trades_per_year: f64,
}

/// Round-trip trade statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeStats {
    #[serde(rename = "Trade Winning %")]
    pub winning_pct: f64,
    #[serde(rename = "Average Trade")]
    pub average_trade: f64,
    #[serde(rename = "Average Win")]
    pub average_win: f64,
    #[serde(rename = "Average Loss")]
    pub average_loss: f64,
    #[serde(rename = "Best Trade")]
    pub best_trade: f64,
    #[serde(rename = "Worst Trade")]
    pub worst_trade: f64,
    /// Exit dates of every trade tied for the worst pnl, written as
    /// `"YYYY-MM-DD, YYYY-MM-DD"`, or `0` when there were no trades
    #[serde(
        rename = "Worst Trade Date",
        serialize_with = "serialize_date_cell",
        deserialize_with = "deserialize_date_cell"
    )]
    pub worst_trade_dates: Vec<NaiveDate>,
    #[serde(rename = "Avg Days in Trade")]
    pub avg_days_in_trade: f64,
    #[serde(rename = "Trades")]
    pub trades: u64,
}

/// Calendar statistics, all in percent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeStats {
    #[serde(rename = "Winning Months %")]
    pub winning_months: f64,
    #[serde(rename = "Average Winning Month %")]
    pub average_winning_month: f64,
    #[serde(rename = "Average Losing Month %")]
    pub average_losing_month: f64,
    #[serde(rename = "Best Month %")]
    pub best_month: f64,
    #[serde(rename = "Worst Month %")]
    pub worst_month: f64,
    #[serde(rename = "Winning Years %")]
    pub winning_years: f64,
    #[serde(rename = "Best Year %")]
    pub best_year: f64,
    #[serde(rename = "Worst Year %")]
    pub worst_year: f64,
}

/// The three statistics sections of a result bundle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    #[serde(rename = "Curve")]
    pub curve: CurveStats,
    #[serde(rename = "Trade")]
    pub trade: TradeStats,
    #[serde(rename = "Time")]
    pub time: TimeStats,
}

const DATE_SEPARATOR: &str = ", ";

fn join_dates(dates: &[NaiveDate]) -> String {
    dates
        .iter()
        .map(|d| d.format("%Y-%m-%d").to_string())
        .collect::<Vec<_>>()
        .join(DATE_SEPARATOR)
}

fn serialize_date_cell<S: Serializer>(dates: &[NaiveDate], s: S) -> Result<S::Ok, S::Error> {
    if dates.is_empty() {
        s.serialize_u8(0)
    } else {
        s.serialize_str(&join_dates(dates))
    }
}

fn deserialize_date_cell<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<NaiveDate>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Cell {
        Text(String),
        Other(serde_json::Value),
    }
    Ok(match Cell::deserialize(d)? {
        Cell::Text(text) => text
            .split(DATE_SEPARATOR)
            .filter_map(|part| NaiveDate::parse_from_str(part.trim(), "%Y-%m-%d").ok())
            .collect(),
        Cell::Other(_) => Vec::new(),
    })
}

impl Statistics {
    /// The all-zero template shown when no result is available
    pub fn zeroed() -> Self {
        Self::default()
    }

    /// Compute every section from daily returns and closed trades
    pub fn compute(returns: &ReturnSeries, trades: &[Trade]) -> Self {
        Self {
            curve: curve_stats(returns, trades),
            trade: trade_stats(trades),
            time: time_stats(returns),
        }
    }

    /// Format as table for CLI output
    pub fn format_table(&self) -> String {
        let c = &self.curve;
        let t = &self.trade;
        let m = &self.time;
        let worst_date = if t.worst_trade_dates.is_empty() {
            "-".to_string()
        } else {
            join_dates(&t.worst_trade_dates)
        };
        format!(
            r#"
══════════════════════════════════════════════════════
               BACKTEST STATISTICS
══════════════════════════════════════════════════════

CURVE
───────────────────────────────────────────────────────
Total Return:            {:.2}%
CAGR:                    {:.2}%
Sharpe Ratio:            {:.2}
Annual Volatility:       {:.2}%
SQN:                     {:.2}
R-Squared:               {:.2}
Max Daily Drawdown:      {:.2}%
Max Drawdown Duration:   {:.0} bars
Trades Per Year:         {:.2}

TRADE
───────────────────────────────────────────────────────
Trade Winning %:         {:.2}
Average Trade:           {:.2}
Average Win:             {:.2}
Average Loss:            {:.2}
Best Trade:              {:.2}
Worst Trade:             {:.2}
Worst Trade Date:        {}
Avg Days in Trade:       {:.2}
Trades:                  {}

TIME
───────────────────────────────────────────────────────
Winning Months %:        {:.2}
Average Winning Month %: {:.2}
Average Losing Month %:  {:.2}
Best Month %:            {:.2}
Worst Month %:           {:.2}
Winning Years %:         {:.2}
Best Year %:             {:.2}
Worst Year %:            {:.2}
══════════════════════════════════════════════════════
"#,
            c.total_return,
            c.cagr,
            c.sharpe_ratio,
            c.annual_volatility,
            c.sqn,
            c.r_squared,
            c.max_daily_drawdown,
            c.max_drawdown_duration,
            c.trades_per_year,
            t.winning_pct,
            t.average_trade,
            t.average_win,
            t.average_loss,
            t.best_trade,
            t.worst_trade,
            worst_date,
            t.avg_days_in_trade,
            t.trades,
            m.winning_months,
            m.average_winning_month,
            m.average_losing_month,
            m.best_month,
            m.worst_month,
            m.winning_years,
            m.best_year,
            m.worst_year,
        )
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Sample standard deviation
fn std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator.abs() < f64::EPSILON || !denominator.is_finite() {
        0.0
    } else {
        numerator / denominator
    }
}

fn max(values: impl Iterator<Item = f64>) -> f64 {
    values.fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
        .unwrap_or(0.0)
}

fn min(values: impl Iterator<Item = f64>) -> f64 {
    values.fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.min(v))))
        .unwrap_or(0.0)
}

/// Cumulative growth of 1.0
pub(crate) fn cumulative(returns: &ReturnSeries) -> Vec<f64> {
    let mut value = 1.0;
    returns
        .values()
        .map(|r| {
            value *= 1.0 + r;
            value
        })
        .collect()
}

/// Drawdown from the running peak, as a fraction (<= 0)
pub(crate) fn drawdowns(cumulative: &[f64]) -> Vec<f64> {
    let mut peak = f64::MIN;
    cumulative
        .iter()
        .map(|v| {
            peak = peak.max(*v);
            ratio(v - peak, peak)
        })
        .collect()
}

fn r_squared(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let xs: Vec<f64> = (0..n).map(|i| i as f64).collect();
    let (Some(mx), Some(my)) = (mean(&xs), mean(values)) else {
        return 0.0;
    };
    let sxy: f64 = xs.iter().zip(values).map(|(x, y)| (x - mx) * (y - my)).sum();
    let sxx: f64 = xs.iter().map(|x| (x - mx).powi(2)).sum();
    let syy: f64 = values.iter().map(|y| (y - my).powi(2)).sum();
    ratio(sxy * sxy, sxx * syy)
}

fn curve_stats(returns: &ReturnSeries, trades: &[Trade]) -> CurveStats {
    if returns.is_empty() {
        return CurveStats::default();
    }
    let daily: Vec<f64> = returns.values().copied().collect();
    let cum = cumulative(returns);
    let ending = cum.last().copied().unwrap_or(1.0);
    let years = daily.len() as f64 / PERIODS_PER_YEAR;

    let cagr = if ending > 0.0 {
        ending.powf(1.0 / years) - 1.0
    } else {
        -1.0
    };
    let sd = std_dev(&daily).unwrap_or(0.0);
    let sharpe = ratio(mean(&daily).unwrap_or(0.0), sd) * PERIODS_PER_YEAR.sqrt();

    let dd = drawdowns(&cum);
    let mut longest = 0usize;
    let mut current = 0usize;
    for d in &dd {
        if *d < 0.0 {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }

    CurveStats {
        total_return: round2((ending - 1.0) * 100.0),
        cagr: round2(cagr * 100.0),
        sharpe_ratio: round2(sharpe),
        annual_volatility: round2(sd * PERIODS_PER_YEAR.sqrt() * 100.0),
        sqn: sqn(trades),
        r_squared: round2(r_squared(&cum)),
        max_daily_drawdown: round2(min(dd.iter().copied()) * 100.0),
        max_drawdown_duration: longest as f64,
        trades_per_year: round2(ratio(trades.len() as f64, years)),
    }
}

fn trade_stats(trades: &[Trade]) -> TradeStats {
    if trades.is_empty() {
        return TradeStats::default();
    }
    let pnls: Vec<f64> = trades.iter().map(|t| t.pnl).collect();
    let wins: Vec<f64> = pnls.iter().copied().filter(|p| *p > 0.0).collect();
    let losses: Vec<f64> = pnls.iter().copied().filter(|p| *p < 0.0).collect();
    let worst = min(pnls.iter().copied());
    let worst_trade_dates = trades
        .iter()
        .filter(|t| t.pnl == worst)
        .map(|t| t.exit_date)
        .collect();
    let days: Vec<f64> = trades
        .iter()
        .map(|t| (t.exit_date - t.entry_date).num_days() as f64)
        .collect();

    TradeStats {
        winning_pct: round2(wins.len() as f64 / pnls.len() as f64 * 100.0),
        average_trade: round2(mean(&pnls).unwrap_or(0.0)),
        average_win: round2(mean(&wins).unwrap_or(0.0)),
        average_loss: round2(mean(&losses).unwrap_or(0.0)),
        best_trade: round2(max(pnls.iter().copied())),
        worst_trade: round2(worst),
        worst_trade_dates,
        avg_days_in_trade: round2(mean(&days).unwrap_or(0.0)),
        trades: trades.len() as u64,
    }
}

/// System quality number over trade pnl
fn sqn(trades: &[Trade]) -> f64 {
    let pnls: Vec<f64> = trades.iter().map(|t| t.pnl).collect();
    match (mean(&pnls), std_dev(&pnls)) {
        (Some(m), Some(sd)) => round2((pnls.len() as f64).sqrt() * ratio(m, sd)),
        _ => 0.0,
    }
}

fn time_stats(returns: &ReturnSeries) -> TimeStats {
    if returns.is_empty() {
        return TimeStats::default();
    }
    let months: Vec<f64> = group_by_month(returns).into_values().collect();
    let years: Vec<f64> = group_by_year(returns).into_values().collect();
    let winning: Vec<f64> = months.iter().copied().filter(|r| *r > 0.0).collect();
    let losing: Vec<f64> = months.iter().copied().filter(|r| *r < 0.0).collect();

    TimeStats {
        winning_months: round2(winning.len() as f64 / months.len() as f64 * 100.0),
        average_winning_month: round2(mean(&winning).unwrap_or(0.0) * 100.0),
        average_losing_month: round2(mean(&losing).unwrap_or(0.0) * 100.0),
        best_month: round2(max(months.iter().copied()) * 100.0),
        worst_month: round2(min(months.iter().copied()) * 100.0),
        winning_years: round2(
            years.iter().filter(|r| **r > 0.0).count() as f64 / years.len() as f64 * 100.0,
        ),
        best_year: round2(max(years.iter().copied()) * 100.0),
        worst_year: round2(min(years.iter().copied()) * 100.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn trade(pnl: f64, entry: NaiveDate, exit: NaiveDate) -> Trade {
        Trade {
            symbol: "TestData".to_string(),
            entry_date: entry,
            exit_date: exit,
            quantity: 1,
            pnl,
        }
    }

    #[test]
    fn test_zeroed_template_keys() {
        let value = serde_json::to_value(Statistics::zeroed()).unwrap();
        let curve = value["Curve"].as_object().unwrap();
        let keys: Vec<&str> = curve.keys().map(|k| k.as_str()).collect();
        assert!(keys.contains(&"Max Drawdown Duration"));
        assert_eq!(curve.len(), 9);
        assert_eq!(value["Trade"].as_object().unwrap().len(), 9);
        assert_eq!(value["Time"].as_object().unwrap().len(), 8);
        assert_eq!(value["Trade"]["Worst Trade Date"], json!(0));
        assert_eq!(value["Trade"]["Trades"], json!(0));
    }

    #[test]
    fn test_worst_trade_date_reads_both_forms() {
        let mut stats = Statistics::zeroed();
        stats.trade.worst_trade_dates = vec![day(2018, 3, 1), day(2018, 4, 2)];
        let text = serde_json::to_string(&stats).unwrap();
        assert!(text.contains(r#""Worst Trade Date":"2018-03-01, 2018-04-02""#));
        let back: Statistics = serde_json::from_str(&text).unwrap();
        assert_eq!(back, stats);

        let zero: Statistics = serde_json::from_value(serde_json::to_value(Statistics::zeroed()).unwrap()).unwrap();
        assert!(zero.trade.worst_trade_dates.is_empty());
    }

    #[test]
    fn test_curve_on_constant_growth() {
        let mut returns = ReturnSeries::new();
        let start = day(2018, 1, 1);
        for i in 0..252 {
            returns.insert(start + chrono::Duration::days(i), 0.001);
        }
        let stats = Statistics::compute(&returns, &[]);
        // 1.001^252 - 1
        assert_eq!(stats.curve.total_return, 28.64);
        assert_eq!(stats.curve.cagr, 28.64);
        assert_eq!(stats.curve.annual_volatility, 0.0);
        assert_eq!(stats.curve.sharpe_ratio, 0.0);
        assert_eq!(stats.curve.max_daily_drawdown, 0.0);
        assert_eq!(stats.curve.max_drawdown_duration, 0.0);
        assert!(stats.curve.r_squared > 0.99);
    }

    #[test]
    fn test_drawdown_depth_and_duration() {
        let mut returns = ReturnSeries::new();
        let rets = [0.0, 0.1, -0.5, 0.2, 0.2, 1.0];
        for (i, r) in rets.iter().enumerate() {
            returns.insert(day(2018, 1, 1) + chrono::Duration::days(i as i64), *r);
        }
        let stats = Statistics::compute(&returns, &[]);
        assert_eq!(stats.curve.max_daily_drawdown, -50.0);
        assert_eq!(stats.curve.max_drawdown_duration, 3.0);
    }

    #[test]
    fn test_trade_section() {
        let trades = vec![
            trade(90.0, day(2018, 1, 2), day(2018, 1, 29)),
            trade(-85.0, day(2018, 1, 30), day(2018, 2, 26)),
            trade(85.0, day(2018, 2, 27), day(2018, 3, 26)),
            trade(-85.0, day(2018, 3, 27), day(2018, 4, 23)),
        ];
        let stats = trade_stats(&trades);
        assert_eq!(stats.trades, 4);
        assert_eq!(stats.winning_pct, 50.0);
        assert_eq!(stats.average_trade, 1.25);
        assert_eq!(stats.average_win, 87.5);
        assert_eq!(stats.average_loss, -85.0);
        assert_eq!(stats.best_trade, 90.0);
        assert_eq!(stats.worst_trade, -85.0);
        assert_eq!(stats.worst_trade_dates, vec![day(2018, 2, 26), day(2018, 4, 23)]);
        assert_eq!(stats.avg_days_in_trade, 27.0);
        assert!(sqn(&trades).abs() < 1.0);
    }

    #[test]
    fn test_time_section_groups_calendar() {
        let mut returns = ReturnSeries::new();
        returns.insert(day(2018, 1, 2), 0.01);
        returns.insert(day(2018, 1, 3), 0.01);
        returns.insert(day(2018, 2, 1), -0.03);
        returns.insert(day(2019, 1, 2), 0.05);
        let stats = time_stats(&returns);
        assert_eq!(stats.winning_months, 66.67);
        assert_eq!(stats.average_winning_month, 3.5);
        assert_eq!(stats.average_losing_month, -3.0);
        assert_eq!(stats.best_month, 5.0);
        assert_eq!(stats.worst_month, -3.0);
        assert_eq!(stats.winning_years, 50.0);
        assert_eq!(stats.best_year, 5.0);
        assert_eq!(stats.worst_year, -1.0);
    }

    #[test]
    fn test_empty_inputs_are_zero() {
        let stats = Statistics::compute(&ReturnSeries::new(), &[]);
        assert_eq!(stats, Statistics::zeroed());
    }

    #[test]
    fn test_format_table() {
        let table = Statistics::zeroed().format_table();
        assert!(table.contains("Sharpe Ratio:"));
        assert!(table.contains("Worst Trade Date:        -"));
    }
}
