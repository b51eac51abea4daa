//! Cash and position accounting

use super::Trade;
use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct Holding {
    quantity: i64,
    avg_price: Decimal,
    entry_date: NaiveDate,
}

/// Portfolio with average-price positions
///
/// A fill that reduces or flips a position realizes a [`Trade`] for the
/// closed quantity.
#[derive(Debug, Clone)]
pub struct Portfolio {
    cash: Decimal,
    holdings: HashMap<String, Holding>,
    trades: Vec<Trade>,
}

impl Portfolio {
    pub fn new(cash: Decimal) -> Self {
        Self {
            cash,
            holdings: HashMap::new(),
            trades: Vec::new(),
        }
    }

    pub fn cash(&self) -> Decimal {
        self.cash
    }

    pub fn position(&self, symbol: &str) -> i64 {
        self.holdings.get(symbol).map_or(0, |h| h.quantity)
    }

    /// Execute a signed quantity at `price`
    pub fn fill(&mut self, symbol: &str, quantity: i64, price: Decimal, date: NaiveDate) {
        if quantity == 0 {
            return;
        }
        self.cash -= Decimal::from(quantity) * price;

        let holding = self
            .holdings
            .entry(symbol.to_string())
            .or_insert_with(|| Holding {
                quantity: 0,
                avg_price: price,
                entry_date: date,
            });

        if holding.quantity == 0 || holding.quantity.signum() == quantity.signum() {
            let held = Decimal::from(holding.quantity.abs());
            let added = Decimal::from(quantity.abs());
            if holding.quantity == 0 {
                holding.entry_date = date;
            }
            holding.avg_price = (holding.avg_price * held + price * added) / (held + added);
            holding.quantity += quantity;
            return;
        }

        let closed = holding.quantity.abs().min(quantity.abs()) * holding.quantity.signum();
        let pnl = (price - holding.avg_price) * Decimal::from(closed);
        self.trades.push(Trade {
            symbol: symbol.to_string(),
            entry_date: holding.entry_date,
            exit_date: date,
            quantity: closed,
            pnl: pnl.to_f64().unwrap_or(0.0),
        });

        let before = holding.quantity;
        holding.quantity += quantity;
        if holding.quantity == 0 {
            self.holdings.remove(symbol);
        } else if holding.quantity.signum() != before.signum() {
            holding.avg_price = price;
            holding.entry_date = date;
        }
    }

    /// Cash plus positions marked at `price_of`; unpriced positions count as zero
    pub fn value(&self, price_of: impl Fn(&str) -> Option<Decimal>) -> Decimal {
        self.holdings.iter().fold(self.cash, |total, (symbol, h)| {
            total + price_of(symbol).unwrap_or_default() * Decimal::from(h.quantity)
        })
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn into_trades(self) -> Vec<Trade> {
        self.trades
    }
}
