//! Backtest runner
//!
//! Runs one job synchronously: attaches the job's log sinks, resolves the
//! strategy, drives the engine and caches the result bundle. Every log line
//! emitted during the run (runner, engine and strategy alike) reaches the
//! job's channel and log file through the `job_id` span.

use super::params::{build_param_map, ParamError, ParamRow};
use super::result::BacktestResult;
use crate::broker::{result_key, BrokerError, MessageBroker};
use crate::engine::{BacktestEngine, EngineRequest};
use crate::job::{JobId, JobParams};
use crate::logstream::{ChannelSink, FileSink, LogFileNamer, LogSink, SinkRegistry};
use crate::strategy::{RegistryError, StrategyRegistry};
use crate::telemetry::{self, CounterMetric, LatencyMetric};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Why a run produced no result
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Please provide a value for: {0}")]
    MissingFields(String),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Params(#[from] ParamError),
    #[error("{0:#}")]
    Engine(anyhow::Error),
    #[error("Failed to serialize result: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error(transparent)]
    Broker(#[from] BrokerError),
    #[error("Backtest worker failed: {0}")]
    Worker(String),
}

/// Executes backtests against an engine and a strategy registry
pub struct BacktestRunner {
    engine: Arc<dyn BacktestEngine>,
    registry: Arc<StrategyRegistry>,
    broker: Arc<dyn MessageBroker>,
    sinks: Arc<SinkRegistry>,
    log_files: LogFileNamer,
    cash: Decimal,
}

impl BacktestRunner {
    pub fn new(
        engine: Arc<dyn BacktestEngine>,
        registry: Arc<StrategyRegistry>,
        broker: Arc<dyn MessageBroker>,
        sinks: Arc<SinkRegistry>,
        log_files: LogFileNamer,
        cash: Decimal,
    ) -> Self {
        Self {
            engine,
            registry,
            broker,
            sinks,
            log_files,
            cash,
        }
    }

    pub fn broker(&self) -> &Arc<dyn MessageBroker> {
        &self.broker
    }

    pub fn registry(&self) -> &Arc<StrategyRegistry> {
        &self.registry
    }

    pub fn cash(&self) -> Decimal {
        self.cash
    }

    pub fn module_options(&self) -> Vec<String> {
        self.registry.modules()
    }

    pub fn symbol_options(&self) -> Vec<String> {
        self.engine.symbols()
    }

    /// Strategies in `module`; empty when the module is unknown
    pub fn strategy_options(&self, module: &str) -> Vec<String> {
        self.registry.strategy_names(module).unwrap_or_else(|e| {
            tracing::debug!(module, error = %e, "No strategies for module");
            Vec::new()
        })
    }

    /// Reload a strategy module so edited strategies are picked up
    ///
    /// Runs resolved afterwards report the returned version.
    pub fn refresh_module(&self, module: &str) -> Result<u64, RegistryError> {
        let version = self.registry.refresh(module)?;
        tracing::info!("Reloaded strategy module {} (version {})", module, version);
        Ok(version)
    }

    /// Parameter table for a strategy: the `Cash` row, then the engine's parameters
    ///
    /// Lookup failures are logged and leave only the `Cash` row.
    pub fn params_list(&self, module: &str, strategy: &str, symbols: &[String]) -> Vec<ParamRow> {
        let mut rows = vec![ParamRow::cash(self.cash)];
        match self.registry.resolve(module, strategy) {
            Ok(resolved) => {
                let params = self.engine.parameters(resolved.factory.as_ref(), symbols);
                rows.extend(params.into_iter().map(|(name, value)| ParamRow::from_param(&name, value)));
            }
            Err(e) => tracing::error!("Error in loading params: {}!", e),
        }
        rows
    }

    /// Run `params` as job `job`, caching the bundle under `job + "result"`
    pub fn run(&self, job: JobId, params: &JobParams) -> Result<BacktestResult, RunError> {
        let span = tracing::info_span!("backtest", job_id = %job);
        let _entered = span.enter();

        let log_path = self.log_files.next_file_name();
        let mut sinks: Vec<Arc<dyn LogSink>> = vec![Arc::new(ChannelSink::for_job(self.broker.clone(), &job))];
        let file_error = match FileSink::create(&log_path) {
            Ok(file) => {
                sinks.push(Arc::new(file));
                None
            }
            Err(e) => Some(e),
        };
        let _guard = self.sinks.attach(job, sinks);
        if let Some(e) = file_error {
            tracing::warn!("Could not open log file {}: {}", log_path.display(), e);
        }

        tracing::debug!("start");
        let started = Instant::now();
        let outcome = self.execute(&job, params);
        telemetry::record_latency(LatencyMetric::BacktestRun, started.elapsed());

        match &outcome {
            Ok(_) => {
                telemetry::increment(CounterMetric::RunsCompleted);
                tracing::debug!("done");
            }
            Err(e) => {
                telemetry::increment(CounterMetric::RunsFailed);
                tracing::error!("Error in starting a backtest: {}", e);
            }
        }
        outcome
    }

    fn execute(&self, job: &JobId, params: &JobParams) -> Result<BacktestResult, RunError> {
        let missing = params.missing_fields();
        if !missing.is_empty() {
            return Err(RunError::MissingFields(missing.join(", ")));
        }
        let module = params.module.as_deref().unwrap_or_default();
        let strategy = params.strategy.as_deref().unwrap_or_default();
        let symbols = params.symbols.as_deref().unwrap_or_default();

        let resolved = self.registry.resolve(module, strategy)?;
        tracing::info!(
            "Running {} from module {} (version {}) on {}",
            strategy,
            module,
            resolved.version,
            symbols.join(", ")
        );

        let (cash, strategy_params) = build_param_map(&params.table_params)?;
        let output = self
            .engine
            .run(EngineRequest {
                symbols,
                cash,
                strategy: resolved.factory.as_ref(),
                params: &strategy_params,
            })
            .map_err(RunError::Engine)?;

        let result = BacktestResult::from_output(symbols, &output);
        self.broker.set(&result_key(job), &result.to_json()?)?;
        tracing::info!("{}", result.title);
        Ok(result)
    }
}
