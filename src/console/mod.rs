//! Console session
//!
//! Form state for one browser session and the operations the page calls:
//! dropdown options, the parameter table, the backtest button, the status
//! line, and the statistics and chart of the current job.

mod protocol;

pub use protocol::{ConsoleReply, ConsoleRequest};

use crate::backtest::{extract_figure, extract_statistic, stringify_rows, BacktestRunner, ParamRow, RunError};
use crate::broker::{result_key, size_key, MessageBroker};
use crate::job::{Job, JobCorrelator, JobError, JobId, JobParams, JobStatus};
use crate::listener::ChartSize;
use crate::tearsheet::{Figure, Statistics, DEFAULT_HEIGHT, DEFAULT_WIDTH};
use crate::telemetry::{self, LatencyMetric};
use std::sync::Arc;
use std::time::Instant;

/// One user's backtest form
pub struct Console {
    runner: Arc<BacktestRunner>,
    correlator: JobCorrelator,
    job: Job,
    module: Option<String>,
    strategy: Option<String>,
    symbols: Vec<String>,
    rows: Vec<ParamRow>,
    clicks: u32,
}

impl Console {
    pub fn new(runner: Arc<BacktestRunner>) -> Self {
        let correlator = JobCorrelator::new();
        let job = Job::new(correlator.current());
        let rows = vec![ParamRow::cash(runner.cash())];
        Self {
            runner,
            correlator,
            job,
            module: None,
            strategy: None,
            symbols: Vec::new(),
            rows,
            clicks: 0,
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job.id()
    }

    pub fn job(&self) -> &Job {
        &self.job
    }

    pub fn clicks(&self) -> u32 {
        self.clicks
    }

    pub fn module(&self) -> Option<&str> {
        self.module.as_deref()
    }

    pub fn strategy(&self) -> Option<&str> {
        self.strategy.as_deref()
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn params(&self) -> &[ParamRow] {
        &self.rows
    }

    pub fn module_options(&self) -> Vec<String> {
        self.runner.module_options()
    }

    pub fn symbol_options(&self) -> Vec<String> {
        self.runner.symbol_options()
    }

    /// Pick a module; returns its strategies and selects the first one
    pub fn select_module(&mut self, module: Option<&str>) -> Vec<String> {
        self.module = module.map(str::to_string);
        let options = match module {
            Some(module) => self.runner.strategy_options(module),
            None => Vec::new(),
        };
        self.strategy = options.first().cloned();
        self.selection_changed();
        options
    }

    pub fn select_strategy(&mut self, strategy: Option<&str>) {
        self.strategy = strategy.map(str::to_string);
        self.selection_changed();
    }

    pub fn select_symbols(&mut self, symbols: Vec<String>) {
        self.symbols = symbols;
        self.selection_changed();
    }

    /// Replace the parameter table; keeps the current job id
    ///
    /// A pending click is withdrawn: parameters collected from the old
    /// table are dropped and the job goes back to idle.
    pub fn edit_params(&mut self, rows: Vec<ParamRow>) {
        self.rows = rows;
        self.clicks = 0;
        if self.job.status() == &JobStatus::ParamsCollected {
            self.job = Job::new(self.job.id());
        }
    }

    /// Count a click and collect the form into the job
    pub fn click_backtest(&mut self) -> Result<JobParams, JobError> {
        if self.job.status().is_terminal() {
            self.clicks = 0;
            self.rotate_job();
        }
        self.clicks += 1;
        let params = JobParams {
            module: self.module.clone(),
            strategy: self.strategy.clone(),
            symbols: Some(self.symbols.clone()),
            table_params: stringify_rows(&self.rows),
        };
        self.job.collect(params.clone())?;
        Ok(params)
    }

    /// Run the collected job on a blocking worker and record its outcome
    ///
    /// Nothing runs without a pending click. A job with missing fields is
    /// left as collected; the status line asks for the missing values.
    pub async fn run(&mut self) -> Result<&JobStatus, JobError> {
        if self.clicks == 0 {
            return Ok(self.job.status());
        }
        if self.job.params().map_or(true, |p| !p.missing_fields().is_empty()) {
            return Ok(self.job.status());
        }
        let params = self.job.start()?;
        let runner = self.runner.clone();
        let job = self.job.id();
        let outcome = tokio::task::spawn_blocking(move || runner.run(job, &params))
            .await
            .unwrap_or_else(|e| Err(RunError::Worker(e.to_string())));

        match outcome {
            Ok(result) => self.job.complete(result)?,
            Err(e) => self.job.fail(e.to_string())?,
        }
        Ok(self.job.status())
    }

    /// Status line under the backtest button
    pub fn status(&self) -> String {
        match self.job.status() {
            JobStatus::Completed => return "Done!".to_string(),
            JobStatus::Failed(reason) => return format!("Error: {}", reason),
            _ => {}
        }
        if self.clicks == 0 {
            return String::new();
        }
        let missing = self
            .job
            .params()
            .map(JobParams::missing_fields)
            .unwrap_or_else(|| vec!["module", "strategy", "symbol"]);
        if !missing.is_empty() {
            return format!("Please provide a value for: {}!", missing.join(", "));
        }
        "Backtesting...".to_string()
    }

    fn cached(&self, key: &str) -> Option<String> {
        self.runner.broker().get(key).unwrap_or_else(|e| {
            tracing::warn!(key, error = %e, "Cache read failed");
            None
        })
    }

    /// Statistics of the current job, all zero until a result is cached
    pub fn statistics(&self) -> Statistics {
        extract_statistic(self.cached(&result_key(&self.job_id())).as_deref())
    }

    /// Chart of the current job at the size the browser reported
    pub fn chart(&self) -> Option<Figure> {
        let started = Instant::now();
        let job = self.job_id();
        let size = self
            .cached(&size_key(&job))
            .and_then(|s| ChartSize::parse(&s))
            .unwrap_or(ChartSize {
                width: DEFAULT_WIDTH,
                height: DEFAULT_HEIGHT,
            });
        let figure = extract_figure(self.cached(&result_key(&job)).as_deref(), size.width, size.height);
        telemetry::record_latency(LatencyMetric::ChartRender, started.elapsed());
        figure
    }

    fn selection_changed(&mut self) {
        self.clicks = 0;
        self.rotate_job();
        if let (Some(module), Some(strategy)) = (self.module.as_deref(), self.strategy.as_deref()) {
            self.rows = self.runner.params_list(module, strategy, &self.symbols);
        }
    }

    /// Mint a new job id and drop the cache entries of the old one
    fn rotate_job(&mut self) {
        let old = self.correlator.rotate();
        let broker = self.runner.broker();
        for key in [size_key(&old), result_key(&old)] {
            if let Err(e) = broker.del(&key) {
                tracing::warn!(key, error = %e, "Failed to drop cache entry");
            }
        }
        self.job = Job::new(self.correlator.current());
        tracing::debug!(old = %old, new = %self.job.id(), "Rotated job id");
    }
}
