//! Bundled example strategies (module `examples`)

use super::{param_i64, BarContext, Strategy, StrategyFactory};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Module name under which these strategies are registered
pub const MODULE: &str = "examples";

/// Loader for the `examples` module
pub fn load() -> Vec<Arc<dyn StrategyFactory>> {
    vec![
        Arc::new(StatsTestFactory),
        Arc::new(TestStrategyFactory),
        Arc::new(SmaCrossFactory),
    ]
}

fn log_prefix(ctx: &BarContext<'_>) -> String {
    ctx.bar()
        .map(|b| b.date.to_string())
        .unwrap_or_default()
}

/// Fixed round trips for checking statistics
///
/// Meant for the `TestData` series: buys one unit on bars 1, 21, 41, 61 and
/// exits on bars 20, 40, 60, 80.
pub struct StatsTest;

const STATS_BUY_BARS: [usize; 4] = [1, 21, 41, 61];
const STATS_CLOSE_BARS: [usize; 4] = [20, 40, 60, 80];

impl Strategy for StatsTest {
    fn on_bar(&mut self, ctx: &mut BarContext<'_>) {
        let bar = ctx.bar_number();
        let close = ctx.close(0).unwrap_or_default();
        if STATS_BUY_BARS.contains(&bar) {
            ctx.buy(1);
            tracing::info!("{} - Buy @ {}", log_prefix(ctx), close);
        } else if STATS_CLOSE_BARS.contains(&bar) {
            ctx.close_position();
            tracing::info!("{} - Exit @ {}", log_prefix(ctx), close);
        }
    }
}

struct StatsTestFactory;

impl StrategyFactory for StatsTestFactory {
    fn name(&self) -> &str {
        "StatsTest"
    }

    fn default_params(&self) -> Map<String, Value> {
        Map::new()
    }

    fn build(&self, _params: &Map<String, Value>) -> anyhow::Result<Box<dyn Strategy>> {
        tracing::info!("Strategy Initialized!");
        Ok(Box::new(StatsTest))
    }
}

/// Mean-reversion on three-bar runs
///
/// Two falling closes in a row target a 25% long, two rising closes a 25%
/// short. `param1` and `param2` are validated and echoed to the run log
/// only; they exercise the parameter table.
pub struct TestStrategy;

impl Strategy for TestStrategy {
    fn on_bar(&mut self, ctx: &mut BarContext<'_>) {
        let prefix = log_prefix(ctx);
        let (Some(c0), Some(c1), Some(c2)) = (ctx.close(0), ctx.close(1), ctx.close(2)) else {
            return;
        };
        tracing::debug!("{} - Close price: {}", prefix, c0);

        if c0 < c1 && c1 < c2 {
            tracing::info!("{} - Buy @ {}", prefix, c0);
            ctx.order_target_percent(dec!(0.25));
        }
        if c0 > c1 && c1 > c2 {
            tracing::info!("{} - Sell @ {}", prefix, c0);
            ctx.order_target_percent(dec!(-0.25));
        }
    }
}

struct TestStrategyFactory;

impl StrategyFactory for TestStrategyFactory {
    fn name(&self) -> &str {
        "TestStrategy"
    }

    fn default_params(&self) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("param1".to_string(), json!(10));
        params.insert("param2".to_string(), json!(20));
        params
    }

    fn build(&self, params: &Map<String, Value>) -> anyhow::Result<Box<dyn Strategy>> {
        let param1 = param_i64(params, "param1", 10)?;
        let param2 = param_i64(params, "param2", 20)?;
        tracing::info!("Strategy Initialized!");
        tracing::info!("Param1: {} - Param2: {}", param1, param2);
        Ok(Box::new(TestStrategy))
    }
}

/// Long while the fast moving average is above the slow one, flat otherwise
pub struct SmaCross {
    fast: usize,
    slow: usize,
}

const SMA_ALLOCATION: Decimal = dec!(0.95);

impl SmaCross {
    fn average(ctx: &BarContext<'_>, window: usize) -> Option<Decimal> {
        if ctx.bar_number() < window {
            return None;
        }
        let sum: Decimal = ctx.closes().rev().take(window).sum();
        Some(sum / Decimal::from(window as u64))
    }
}

impl Strategy for SmaCross {
    fn on_bar(&mut self, ctx: &mut BarContext<'_>) {
        let (Some(fast), Some(slow)) = (Self::average(ctx, self.fast), Self::average(ctx, self.slow))
        else {
            return;
        };
        let prefix = log_prefix(ctx);

        if fast > slow && ctx.position() <= 0 {
            tracing::info!("{} - Fast SMA {:.2} crossed above slow {:.2}", prefix, fast, slow);
            ctx.order_target_percent(SMA_ALLOCATION);
        } else if fast < slow && ctx.position() > 0 {
            tracing::info!("{} - Fast SMA {:.2} crossed below slow {:.2}", prefix, fast, slow);
            ctx.close_position();
        }
    }
}

struct SmaCrossFactory;

impl StrategyFactory for SmaCrossFactory {
    fn name(&self) -> &str {
        "SmaCross"
    }

    fn default_params(&self) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("fast".to_string(), json!(10));
        params.insert("slow".to_string(), json!(30));
        params
    }

    fn build(&self, params: &Map<String, Value>) -> anyhow::Result<Box<dyn Strategy>> {
        let fast = param_i64(params, "fast", 10)?;
        let slow = param_i64(params, "slow", 30)?;
        if fast < 1 || slow <= fast {
            anyhow::bail!("SmaCross needs 0 < fast < slow, got fast={} slow={}", fast, slow);
        }
        tracing::info!(fast, slow, "Strategy Initialized!");
        Ok(Box::new(SmaCross {
            fast: fast as usize,
            slow: slow as usize,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Bar;
    use chrono::NaiveDate;

    fn history(closes: &[i64]) -> Vec<Bar> {
        let start = NaiveDate::from_ymd_opt(2018, 1, 2).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, c)| Bar {
                date: start + chrono::Duration::days(i as i64),
                open: Decimal::from(*c),
                close: Decimal::from(*c),
            })
            .collect()
    }

    fn orders_at(strategy: &mut dyn Strategy, bars: &[Bar], position: i64) -> Vec<i64> {
        let mut ctx = BarContext::new("TestData", bars, position, dec!(1000));
        strategy.on_bar(&mut ctx);
        ctx.into_orders()
    }

    #[test]
    fn test_stats_test_trades_on_fixed_bars() {
        let bars = history(&(1..=25).collect::<Vec<_>>());
        let mut strategy = StatsTestFactory.build(&Map::new()).unwrap();

        assert_eq!(orders_at(strategy.as_mut(), &bars[..1], 0), vec![1]);
        assert!(orders_at(strategy.as_mut(), &bars[..2], 1).is_empty());
        assert_eq!(orders_at(strategy.as_mut(), &bars[..20], 1), vec![-1]);
        assert_eq!(orders_at(strategy.as_mut(), &bars[..21], 0), vec![1]);
    }

    #[test]
    fn test_test_strategy_params() {
        let factory = TestStrategyFactory;
        assert_eq!(factory.default_params()["param1"], json!(10));

        let params = json!({"param1": 3, "param2": 4});
        let built = factory.build(params.as_object().unwrap());
        assert!(built.is_ok());

        let bad = json!({"param1": "ten"});
        assert!(factory.build(bad.as_object().unwrap()).is_err());
    }

    #[test]
    fn test_test_strategy_buys_after_two_falls() {
        let mut strategy = TestStrategyFactory.build(&Map::new()).unwrap();
        let falling = history(&[10, 9, 8]);
        assert_eq!(orders_at(strategy.as_mut(), &falling, 0), vec![31]);

        let rising = history(&[8, 9, 10]);
        assert_eq!(orders_at(strategy.as_mut(), &rising, 0), vec![-25]);

        let flat = history(&[8, 9, 8]);
        assert!(orders_at(strategy.as_mut(), &flat, 0).is_empty());
    }

    #[test]
    fn test_sma_cross_validates_windows() {
        let factory = SmaCrossFactory;
        let bad = json!({"fast": 30, "slow": 10});
        assert!(factory.build(bad.as_object().unwrap()).is_err());
        assert!(factory.build(&Map::new()).is_ok());
    }

    #[test]
    fn test_sma_cross_enters_and_exits() {
        let params = json!({"fast": 2, "slow": 3});
        let mut strategy = SmaCrossFactory.build(params.as_object().unwrap()).unwrap();

        // Not enough history yet
        assert!(orders_at(strategy.as_mut(), &history(&[10, 10]), 0).is_empty());

        // fast (11+12)/2 = 11.5 > slow (10+11+12)/3 = 11
        let up = history(&[10, 11, 12]);
        let orders = orders_at(strategy.as_mut(), &up, 0);
        assert_eq!(orders, vec![79]); // 0.95 * 1000 / 12

        let down = history(&[12, 11, 10]);
        assert_eq!(orders_at(strategy.as_mut(), &down, 79), vec![-79]);
    }

    #[test]
    fn test_loader_order() {
        let names: Vec<String> = load().iter().map(|f| f.name().to_string()).collect();
        assert_eq!(names, vec!["StatsTest", "TestStrategy", "SmaCross"]);
    }
}
