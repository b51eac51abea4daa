//! Result bundle and the lenient readers used for rendering

use crate::engine::{EngineOutput, ReturnSeries};
use crate::tearsheet::{create_figure, format_amount, Figure, Statistics};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// What one run leaves in the cache under `jobid + "result"`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Daily, non-cumulative returns
    pub returns: ReturnSeries,
    pub statistic: Statistics,
    pub title: String,
}

impl BacktestResult {
    pub fn from_output(symbols: &[String], output: &EngineOutput) -> Self {
        Self {
            statistic: Statistics::compute(&output.returns, &output.trades),
            title: format_title(symbols, output.pnl.to_f64().unwrap_or(0.0)),
            returns: output.returns.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(bundle: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(bundle)
    }
}

/// `"AAPL, MSFT: 1,234.56"`
pub fn format_title(symbols: &[String], pnl: f64) -> String {
    format!("{}: {}", symbols.join(", "), format_amount(pnl))
}

/// Statistics from a cached bundle, or the all-zero template
pub fn extract_statistic(bundle: Option<&str>) -> Statistics {
    let Some(bundle) = bundle else {
        return Statistics::zeroed();
    };
    match BacktestResult::from_json(bundle) {
        Ok(result) => result.statistic,
        Err(e) => {
            tracing::debug!(error = %e, "Unreadable result bundle, showing empty statistics");
            Statistics::zeroed()
        }
    }
}

/// Chart from a cached bundle, sized `width x height`; `None` renders as an empty chart
pub fn extract_figure(bundle: Option<&str>, width: u32, height: u32) -> Option<Figure> {
    let result = match BacktestResult::from_json(bundle?) {
        Ok(result) => result,
        Err(e) => {
            tracing::debug!(error = %e, "Unreadable result bundle, showing empty chart");
            return None;
        }
    };
    let mut figure = create_figure(&result.returns, &result.title);
    figure.set_size(width, height);
    Some(figure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Trade;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn output() -> EngineOutput {
        let mut returns = ReturnSeries::new();
        returns.insert(NaiveDate::from_ymd_opt(2018, 1, 2).unwrap(), 0.0);
        returns.insert(NaiveDate::from_ymd_opt(2018, 1, 3).unwrap(), 0.01);
        EngineOutput {
            pnl: dec!(1234.567),
            returns,
            trades: vec![Trade {
                symbol: "AAPL".to_string(),
                entry_date: NaiveDate::from_ymd_opt(2018, 1, 2).unwrap(),
                exit_date: NaiveDate::from_ymd_opt(2018, 1, 3).unwrap(),
                quantity: 1,
                pnl: 12.0,
            }],
        }
    }

    fn symbols() -> Vec<String> {
        vec!["AAPL".to_string(), "MSFT".to_string()]
    }

    #[test]
    fn test_title() {
        let result = BacktestResult::from_output(&symbols(), &output());
        assert_eq!(result.title, "AAPL, MSFT: 1,234.57");
        assert_eq!(result.statistic.trade.trades, 1);
    }

    #[test]
    fn test_bundle_roundtrip_keeps_dates() {
        let result = BacktestResult::from_output(&symbols(), &output());
        let json = result.to_json().unwrap();
        assert!(json.contains("\"2018-01-03\":0.01"));
        assert_eq!(BacktestResult::from_json(&json).unwrap(), result);
    }

    #[test]
    fn test_extract_statistic_is_lenient() {
        assert_eq!(extract_statistic(None), Statistics::zeroed());
        assert_eq!(extract_statistic(Some("")), Statistics::zeroed());
        assert_eq!(extract_statistic(Some("not json")), Statistics::zeroed());
        assert_eq!(extract_statistic(Some(r#"{"title": 1}"#)), Statistics::zeroed());

        let result = BacktestResult::from_output(&symbols(), &output());
        let stats = extract_statistic(Some(&result.to_json().unwrap()));
        assert_eq!(stats, result.statistic);
    }

    #[test]
    fn test_extract_figure() {
        assert!(extract_figure(None, 800, 600).is_none());
        assert!(extract_figure(Some("[]"), 800, 600).is_none());

        let bundle = BacktestResult::from_output(&symbols(), &output()).to_json().unwrap();
        let figure = extract_figure(Some(&bundle), 800, 600).unwrap();
        assert_eq!(figure.width(), Some(800));
        assert_eq!(figure.height(), Some(600));
        assert_eq!(figure.title(), Some("AAPL, MSFT: 1,234.57"));
    }
}
