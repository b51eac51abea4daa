//! Backtesting module
//!
//! Runs jobs through the engine and reads result bundles back for rendering

mod params;
mod result;
mod runner;

pub use params::{build_param_map, stringify_rows, ParamError, ParamRow, CASH};
pub use result::{extract_figure, extract_statistic, format_title, BacktestResult};
pub use runner::{BacktestRunner, RunError};
