//! Shared fixtures

use omega_ui::backtest::BacktestRunner;
use omega_ui::broker::InMemoryBroker;
use omega_ui::engine::SyntheticEngine;
use omega_ui::logstream::{JobLogLayer, LogFileNamer, SinkRegistry};
use omega_ui::strategy::StrategyRegistry;
use rust_decimal_macros::dec;
use std::sync::{Arc, OnceLock};
use tracing_subscriber::layer::SubscriberExt;

/// Process-wide sink registry behind a global job log layer
///
/// Runs happen on blocking worker threads, so a thread-local subscriber
/// would miss their records.
pub fn global_sinks() -> Arc<SinkRegistry> {
    static SINKS: OnceLock<Arc<SinkRegistry>> = OnceLock::new();
    SINKS
        .get_or_init(|| {
            let sinks = Arc::new(SinkRegistry::new());
            let subscriber = tracing_subscriber::registry().with(JobLogLayer::new(sinks.clone()));
            tracing::subscriber::set_global_default(subscriber).unwrap();
            sinks
        })
        .clone()
}

pub struct Pipeline {
    pub broker: Arc<InMemoryBroker>,
    pub runner: Arc<BacktestRunner>,
    pub logs: tempfile::TempDir,
}

pub fn pipeline() -> Pipeline {
    let logs = tempfile::tempdir().unwrap();
    let broker = Arc::new(InMemoryBroker::new());
    let runner = Arc::new(BacktestRunner::new(
        Arc::new(SyntheticEngine::new().with_bars(100)),
        Arc::new(StrategyRegistry::with_builtin()),
        broker.clone(),
        global_sinks(),
        LogFileNamer::new(logs.path()).unwrap(),
        dec!(100000),
    ));
    Pipeline {
        broker,
        runner,
        logs,
    }
}
