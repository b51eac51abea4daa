//! Deterministic engine over generated daily bars

use super::{BacktestEngine, Bar, EngineOutput, EngineRequest, Portfolio, ReturnSeries};
use crate::strategy::{BarContext, Strategy};
use anyhow::{bail, Context};
use chrono::{Datelike, NaiveDate, Weekday};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

/// Symbols the synthetic engine can generate
pub const SYMBOLS: [&str; 3] = ["AAPL", "MSFT", "TestData"];

const DEFAULT_BARS: usize = 500;

/// Wave parameters for the equity-like series
struct Wave {
    base: f64,
    drift: f64,
    amplitude: f64,
    period: f64,
}

const AAPL: Wave = Wave {
    base: 170.0,
    drift: 0.0008,
    amplitude: 0.08,
    period: 15.0,
};

const MSFT: Wave = Wave {
    base: 85.0,
    drift: 0.001,
    amplitude: 0.06,
    period: 23.0,
};

/// Engine producing the same bars on every run
///
/// `TestData` is a saw-tooth: 1 on the first bar, then up 5 per bar from 1 to
/// 101 and back down, every 40 bars. `AAPL` and `MSFT` are trending waves.
#[derive(Debug, Clone)]
pub struct SyntheticEngine {
    start: NaiveDate,
    bars: usize,
}

impl Default for SyntheticEngine {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2018, 1, 2).unwrap_or_default(),
            bars: DEFAULT_BARS,
        }
    }
}

impl SyntheticEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bars(mut self, bars: usize) -> Self {
        self.bars = bars;
        self
    }

    /// Generated bars for `symbol`
    pub fn series(&self, symbol: &str) -> anyhow::Result<Vec<Bar>> {
        let close_at: fn(usize) -> Decimal = match symbol {
            "TestData" => saw_tooth,
            "AAPL" => |i| wave(&AAPL, i),
            "MSFT" => |i| wave(&MSFT, i),
            other => bail!("No data for symbol {}", other),
        };

        let mut bars = Vec::with_capacity(self.bars);
        let mut previous = None;
        for (i, date) in trading_days(self.start).take(self.bars).enumerate() {
            let close = close_at(i);
            bars.push(Bar {
                date,
                open: previous.unwrap_or(close),
                close,
            });
            previous = Some(close);
        }
        Ok(bars)
    }
}

fn trading_days(start: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start
        .iter_days()
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
}

fn saw_tooth(i: usize) -> Decimal {
    if i == 0 {
        return Decimal::ONE;
    }
    let step = ((i - 1) % 40) as i64;
    let price = if step <= 20 {
        1 + 5 * step
    } else {
        101 - 5 * (step - 20)
    };
    Decimal::from(price)
}

fn wave(w: &Wave, i: usize) -> Decimal {
    let t = i as f64;
    let trend = w.base * (1.0 + w.drift * t);
    let swing = 1.0 + w.amplitude * (t / w.period).sin() + 0.02 * (t / 3.7).sin();
    Decimal::from_f64(trend * swing)
        .unwrap_or_default()
        .round_dp(2)
}

impl BacktestEngine for SyntheticEngine {
    fn symbols(&self) -> Vec<String> {
        SYMBOLS.iter().map(|s| s.to_string()).collect()
    }

    fn run(&self, request: EngineRequest<'_>) -> anyhow::Result<EngineOutput> {
        if request.symbols.is_empty() {
            bail!("No symbols selected");
        }

        let data = request
            .symbols
            .iter()
            .map(|s| self.series(s).map(|bars| (s.as_str(), bars)))
            .collect::<anyhow::Result<Vec<_>>>()?;

        let mut strategies = request
            .symbols
            .iter()
            .map(|_| request.strategy.build(request.params))
            .collect::<anyhow::Result<Vec<Box<dyn Strategy>>>>()
            .with_context(|| format!("Failed to build strategy {}", request.strategy.name()))?;

        let mut portfolio = Portfolio::new(request.cash);
        let mut returns = ReturnSeries::new();
        let mut previous = request.cash;

        for i in 0..self.bars {
            let price_of = |symbol: &str| {
                data.iter()
                    .find(|(s, _)| *s == symbol)
                    .and_then(|(_, bars)| bars.get(i))
                    .map(|b| b.close)
            };
            let equity = portfolio.value(price_of);

            for ((symbol, bars), strategy) in data.iter().zip(strategies.iter_mut()) {
                let Some(bar) = bars.get(i) else { continue };
                let mut ctx = BarContext::new(symbol, &bars[..=i], portfolio.position(symbol), equity);
                strategy.on_bar(&mut ctx);
                for quantity in ctx.into_orders() {
                    tracing::debug!(symbol, quantity, price = %bar.close, "Order filled");
                    portfolio.fill(symbol, quantity, bar.close, bar.date);
                }
            }

            let Some(date) = data[0].1.get(i).map(|b| b.date) else {
                break;
            };
            let value = portfolio.value(price_of);
            let daily = if i == 0 || previous.is_zero() {
                0.0
            } else {
                (value / previous - Decimal::ONE).to_f64().unwrap_or(0.0)
            };
            returns.insert(date, daily);
            previous = value;
        }

        let trades = portfolio.into_trades();
        tracing::debug!(bars = returns.len(), trades = trades.len(), "Simulation finished");
        Ok(EngineOutput {
            pnl: previous - request.cash,
            returns,
            trades,
        })
    }
}
