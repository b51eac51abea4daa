//! Strategy plug-ins
//!
//! Strategies are grouped into named modules held by a versioned
//! [`StrategyRegistry`]. The engine builds one [`Strategy`] instance per
//! symbol through its [`StrategyFactory`] and calls it on every bar.

pub mod examples;
mod registry;

pub use registry::{RegistryError, ResolvedStrategy, StrategyRegistry};

use crate::engine::Bar;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{Map, Value};

/// Decision procedure invoked by the engine on each bar
pub trait Strategy: Send {
    fn on_bar(&mut self, ctx: &mut BarContext<'_>);
}

/// Builds configured strategy instances
pub trait StrategyFactory: Send + Sync {
    /// Name shown in the strategy dropdown
    fn name(&self) -> &str;

    /// Parameters and their defaults, shown in the parameter table
    fn default_params(&self) -> Map<String, Value>;

    /// Build an instance; unknown keys are ignored, missing keys use defaults
    fn build(&self, params: &Map<String, Value>) -> anyhow::Result<Box<dyn Strategy>>;
}

/// View of one symbol at the current bar, collecting the strategy's orders
pub struct BarContext<'a> {
    symbol: &'a str,
    bars: &'a [Bar],
    position: i64,
    equity: Decimal,
    orders: Vec<i64>,
}

impl<'a> BarContext<'a> {
    /// `bars` is the history up to and including the current bar
    pub fn new(symbol: &'a str, bars: &'a [Bar], position: i64, equity: Decimal) -> Self {
        Self {
            symbol,
            bars,
            position,
            equity,
            orders: Vec::new(),
        }
    }

    pub fn symbol(&self) -> &str {
        self.symbol
    }

    /// 1-based number of the current bar
    pub fn bar_number(&self) -> usize {
        self.bars.len()
    }

    pub fn bar(&self) -> Option<&Bar> {
        self.bars.last()
    }

    /// Close `ago` bars back; `close(0)` is the current bar
    pub fn close(&self, ago: usize) -> Option<Decimal> {
        let idx = self.bars.len().checked_sub(ago + 1)?;
        self.bars.get(idx).map(|b| b.close)
    }

    /// Closes from the first bar up to the current one
    pub fn closes(&self) -> impl DoubleEndedIterator<Item = Decimal> + '_ {
        self.bars.iter().map(|b| b.close)
    }

    /// Position after the orders placed so far on this bar
    pub fn position(&self) -> i64 {
        self.position + self.orders.iter().sum::<i64>()
    }

    pub fn equity(&self) -> Decimal {
        self.equity
    }

    pub fn buy(&mut self, quantity: i64) {
        if quantity > 0 {
            self.orders.push(quantity);
        }
    }

    pub fn sell(&mut self, quantity: i64) {
        if quantity > 0 {
            self.orders.push(-quantity);
        }
    }

    /// Flatten the position
    pub fn close_position(&mut self) {
        let position = self.position();
        if position != 0 {
            self.orders.push(-position);
        }
    }

    /// Trade towards holding `fraction` of equity (negative for short)
    pub fn order_target_percent(&mut self, fraction: Decimal) {
        let Some(price) = self.close(0).filter(|p| !p.is_zero()) else {
            return;
        };
        let target = (fraction * self.equity / price)
            .trunc()
            .to_i64()
            .unwrap_or(0);
        let delta = target - self.position();
        if delta != 0 {
            self.orders.push(delta);
        }
    }

    /// Signed quantities ordered on this bar
    pub fn into_orders(self) -> Vec<i64> {
        self.orders
    }
}

/// Integer parameter with a default
pub fn param_i64(params: &Map<String, Value>, name: &str, default: i64) -> anyhow::Result<i64> {
    match params.get(name) {
        None | Some(Value::Null) => Ok(default),
        Some(value) => value
            .as_i64()
            .ok_or_else(|| anyhow::anyhow!("Parameter {} must be an integer, got {}", name, value)),
    }
}
