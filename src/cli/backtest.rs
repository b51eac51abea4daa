//! Backtest command implementation

use super::AppContext;
use crate::backtest::ParamRow;
use crate::broker::{log_channel, result_key, MessageBroker, Subscription};
use crate::console::Console;
use crate::job::{JobId, JobStatus};
use crate::logstream::LogRecord;
use clap::Args;
use serde_json::Value;
use std::path::PathBuf;
use tokio::sync::oneshot;

#[derive(Args, Debug)]
pub struct BacktestArgs {
    /// Strategy module
    #[arg(long, default_value = "examples")]
    pub module: String,

    /// Strategy name; defaults to the module's first strategy
    #[arg(long)]
    pub strategy: Option<String>,

    /// Comma-separated symbols
    #[arg(long, value_delimiter = ',', required = true)]
    pub symbols: Vec<String>,

    /// Parameter override as name=value (value is JSON, e.g. fast=5)
    #[arg(long = "param", value_parser = parse_key_value)]
    pub params: Vec<(String, String)>,

    /// Write the result bundle JSON here
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Write the chart JSON here
    #[arg(long)]
    pub chart: Option<PathBuf>,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected name=value, got {:?}", s))
}

fn print_record(job: &JobId, payload: &str) {
    match LogRecord::from_payload(payload) {
        Some(record) => println!("{}: {}: {}", record.source, record.level, record.message),
        None => tracing::debug!(%job, "Skipping malformed log record"),
    }
}

/// Print records until told to stop, then drain what is left
async fn print_log(job: JobId, mut subscription: Subscription, mut done: oneshot::Receiver<()>) {
    loop {
        tokio::select! {
            payload = subscription.next() => match payload {
                Some(payload) => print_record(&job, &payload),
                None => return,
            },
            _ = &mut done => break,
        }
    }
    while let Some(payload) = subscription.try_next() {
        print_record(&job, &payload);
    }
}

impl BacktestArgs {
    fn apply_overrides(&self, mut rows: Vec<ParamRow>) -> Vec<ParamRow> {
        for (name, value) in &self.params {
            let value = Value::String(value.clone());
            match rows.iter_mut().find(|row| &row.parameter == name) {
                Some(row) => row.value = value,
                None => rows.push(ParamRow::new(name.as_str(), value)),
            }
        }
        rows
    }

    pub async fn execute(&self, ctx: &AppContext) -> anyhow::Result<()> {
        let runner = ctx.runner()?;
        let mut console = Console::new(runner);

        let strategies = console.select_module(Some(self.module.as_str()));
        if strategies.is_empty() {
            anyhow::bail!("Unknown strategy module: {}", self.module);
        }
        if let Some(strategy) = &self.strategy {
            console.select_strategy(Some(strategy.as_str()));
        }
        console.select_symbols(self.symbols.clone());
        let rows = self.apply_overrides(console.params().to_vec());
        console.edit_params(rows);

        let job = console.job_id();
        let subscription = ctx.broker.subscribe(&log_channel(&job))?;
        let (stop, done) = oneshot::channel();
        let printer = tokio::spawn(print_log(job, subscription, done));

        console.click_backtest()?;
        tracing::info!(%job, "Starting backtest");
        let status = console.run().await?.clone();

        let _ = stop.send(());
        if let Err(e) = printer.await {
            tracing::warn!(error = %e, "Log printer failed");
        }

        if let JobStatus::Failed(reason) = status {
            anyhow::bail!("Backtest failed: {}", reason);
        }
        println!("{}", console.status());
        println!("{}", console.statistics().format_table());

        if let Some(path) = &self.output {
            let bundle = ctx
                .broker
                .get(&result_key(&job))?
                .ok_or_else(|| anyhow::anyhow!("No result cached for job {}", job))?;
            std::fs::write(path, bundle)?;
            println!("Result bundle written to {}", path.display());
        }
        if let Some(path) = &self.chart {
            match console.chart() {
                Some(figure) => {
                    std::fs::write(path, serde_json::to_string(&figure)?)?;
                    println!("Chart written to {}", path.display());
                }
                None => tracing::warn!("No chart available"),
            }
        }
        Ok(())
    }
}
