//! Backtest engine module
//!
//! The engine is a plug-in: it owns the market data and the simulation, and
//! is driven synchronously by the backtest runner.

mod portfolio;
mod synthetic;

pub use portfolio::Portfolio;
pub use synthetic::SyntheticEngine;

use crate::strategy::StrategyFactory;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Daily, non-cumulative returns keyed by date
pub type ReturnSeries = BTreeMap<NaiveDate, f64>;

/// One daily bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: Decimal,
    pub close: Decimal,
}

/// A closed round trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub symbol: String,
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    /// Signed quantity closed (negative for shorts)
    pub quantity: i64,
    /// Realized profit and loss
    pub pnl: f64,
}

/// Everything the runner needs to start a simulation
pub struct EngineRequest<'a> {
    pub symbols: &'a [String],
    pub cash: Decimal,
    pub strategy: &'a dyn StrategyFactory,
    pub params: &'a Map<String, Value>,
}

/// Simulation output
#[derive(Debug, Clone)]
pub struct EngineOutput {
    /// Final portfolio value minus starting cash
    pub pnl: Decimal,
    pub returns: ReturnSeries,
    pub trades: Vec<Trade>,
}

/// Trait for backtest engine implementations
pub trait BacktestEngine: Send + Sync {
    /// Symbols offered in the symbol dropdown
    fn symbols(&self) -> Vec<String>;

    /// Parameters shown for a strategy; defaults to the strategy's own
    fn parameters(&self, strategy: &dyn StrategyFactory, _symbols: &[String]) -> Map<String, Value> {
        strategy.default_params()
    }

    /// Run one simulation
    fn run(&self, request: EngineRequest<'_>) -> anyhow::Result<EngineOutput>;
}
