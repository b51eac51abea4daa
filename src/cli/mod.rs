//! CLI interface for omega-ui
//!
//! Provides subcommands for:
//! - `serve`: Run the log listener and console sessions
//! - `backtest`: Run one backtest in process, streaming its log
//! - `report`: Show statistics and chart of a saved result bundle
//! - `strategies`: List strategy modules and their parameters
//! - `users`: Manage the credentials file
//! - `config`: Show configuration

mod backtest;
mod report;
mod serve;
mod users;

pub use backtest::BacktestArgs;
pub use report::ReportArgs;
pub use serve::ServeArgs;
pub use users::{UsersArgs, UsersCommand};

use crate::backtest::BacktestRunner;
use crate::broker::InMemoryBroker;
use crate::config::{Config, ListenerConfig};
use crate::engine::SyntheticEngine;
use crate::listener::LogListener;
use crate::logstream::{LogFileNamer, SinkRegistry};
use crate::strategy::StrategyRegistry;
use clap::{Parser, Subcommand};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "omega-ui")]
#[command(about = "Backtest console service: job runner, live log listener and tearsheets")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the log listener and console sessions
    Serve(ServeArgs),
    /// Run one backtest in process
    Backtest(BacktestArgs),
    /// Show statistics of a saved result bundle
    Report(ReportArgs),
    /// List strategy modules
    Strategies {
        /// Only this module
        module: Option<String>,

        /// Reload the modules before listing
        #[arg(long)]
        refresh: bool,
    },
    /// Manage users
    Users(UsersArgs),
    /// Show configuration
    Config,
}

/// Shared services for the subcommands
pub struct AppContext {
    pub config: Config,
    pub broker: Arc<InMemoryBroker>,
    pub sinks: Arc<SinkRegistry>,
    pub registry: Arc<StrategyRegistry>,
}

impl AppContext {
    pub fn new(config: Config, sinks: Arc<SinkRegistry>) -> Self {
        let broker = Arc::new(InMemoryBroker::with_capacity(config.broker.channel_capacity));
        let registry = Arc::new(StrategyRegistry::with_modules(&config.backtest.modules));
        Self {
            config,
            broker,
            sinks,
            registry,
        }
    }

    /// Runner over the synthetic engine, writing run logs under `logging.root`
    pub fn runner(&self) -> anyhow::Result<Arc<BacktestRunner>> {
        let log_files = LogFileNamer::new(&self.config.logging.root).map_err(|e| {
            anyhow::anyhow!(
                "Cannot use log directory {}: {}",
                self.config.logging.root.display(),
                e
            )
        })?;
        Ok(Arc::new(BacktestRunner::new(
            Arc::new(SyntheticEngine::new().with_bars(self.config.backtest.bars)),
            self.registry.clone(),
            self.broker.clone(),
            self.sinks.clone(),
            log_files,
            self.config.backtest.cash,
        )))
    }

    /// Listener on the shared broker, hosting console sessions whose runs
    /// stream to its log namespace
    pub fn listener(&self, config: &ListenerConfig) -> anyhow::Result<LogListener> {
        Ok(LogListener::new(config, self.broker.clone()).with_console(self.runner()?))
    }

    /// Print modules, strategies and default parameters
    pub fn print_strategies(&self, module: Option<&str>, refresh: bool) -> anyhow::Result<()> {
        let runner = self.runner()?;
        let modules = match module {
            Some(m) => vec![m.to_string()],
            None => runner.module_options(),
        };
        if refresh {
            for module in &modules {
                runner.refresh_module(module)?;
            }
        }
        for module in modules {
            let strategies = runner.strategy_options(&module);
            if strategies.is_empty() {
                println!("{}: no strategies", module);
                continue;
            }
            println!("{} (version {})", module, self.registry.version(&module)?);
            for strategy in strategies {
                let params: Vec<String> = runner
                    .params_list(&module, &strategy, &[])
                    .iter()
                    .map(|row| format!("{}={}", row.parameter, row.value_text()))
                    .collect();
                println!("  {:<16} {}", strategy, params.join(" "));
            }
        }
        Ok(())
    }

    pub fn print_config(&self) {
        let c = &self.config;
        println!("Current configuration:");
        println!("  Backtest: cash={} modules={}", c.backtest.cash, c.backtest.modules.join(","));
        println!("  Broker: channel_capacity={}", c.broker.channel_capacity);
        println!("  Logging: root={}", c.logging.root.display());
        println!(
            "  Listener: {} log={} console={} poll={}ms pool={}",
            c.listener.bind,
            c.listener.namespace,
            c.listener.console_namespace,
            c.listener.poll_interval_ms,
            c.listener.max_connections
        );
        println!("  Users: {}", c.users.file.display());
        println!(
            "  Telemetry: level={} format={:?} metrics_port={}",
            c.telemetry.log_level,
            c.telemetry.log_format,
            c.telemetry
                .metrics_port
                .map_or_else(|| "off".to_string(), |p| p.to_string())
        );
    }
}
