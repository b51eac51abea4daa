//! Console session messages
//!
//! A browser drives its [`Console`] over a WebSocket with JSON requests
//! tagged by `type`; every reply carries the current job id so the page can
//! open the matching log stream.

use super::Console;
use crate::backtest::ParamRow;
use crate::job::JobId;
use crate::tearsheet::{Figure, Statistics};
use serde::{Deserialize, Serialize};

/// Browser-to-server requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConsoleRequest {
    /// Dropdown options
    Options,
    SelectModule {
        #[serde(default)]
        module: Option<String>,
    },
    SelectStrategy {
        #[serde(default)]
        strategy: Option<String>,
    },
    SelectSymbols {
        #[serde(default)]
        symbols: Vec<String>,
    },
    EditParams {
        rows: Vec<ParamRow>,
    },
    /// Click the backtest button; the run follows when the form is complete
    Backtest,
    Status,
    Statistics,
    Chart,
    /// Reload a strategy module
    Refresh {
        module: String,
    },
}

/// Server-to-browser replies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConsoleReply {
    Options {
        job: JobId,
        modules: Vec<String>,
        symbols: Vec<String>,
    },
    /// Form state after a selection or edit
    Form {
        job: JobId,
        module: Option<String>,
        strategy: Option<String>,
        strategies: Vec<String>,
        symbols: Vec<String>,
        rows: Vec<ParamRow>,
    },
    Status {
        job: JobId,
        clicks: u32,
        status: String,
    },
    Statistics {
        job: JobId,
        statistic: Statistics,
    },
    /// `figure` is absent until the job has a result
    Chart {
        job: JobId,
        figure: Option<Figure>,
    },
    Refreshed {
        module: String,
        version: u64,
    },
    Error {
        message: String,
    },
}

impl ConsoleReply {
    pub fn error(message: impl Into<String>) -> Self {
        ConsoleReply::Error {
            message: message.into(),
        }
    }
}

impl Console {
    /// Apply one request and describe the resulting state
    ///
    /// `Backtest` only clicks; the caller runs the job with [`Console::run`]
    /// and reports [`Console::status_reply`] afterwards.
    pub fn handle(&mut self, request: &ConsoleRequest) -> ConsoleReply {
        match request {
            ConsoleRequest::Options => ConsoleReply::Options {
                job: self.job_id(),
                modules: self.module_options(),
                symbols: self.symbol_options(),
            },
            ConsoleRequest::SelectModule { module } => {
                self.select_module(module.as_deref());
                self.form_reply()
            }
            ConsoleRequest::SelectStrategy { strategy } => {
                self.select_strategy(strategy.as_deref());
                self.form_reply()
            }
            ConsoleRequest::SelectSymbols { symbols } => {
                self.select_symbols(symbols.clone());
                self.form_reply()
            }
            ConsoleRequest::EditParams { rows } => {
                self.edit_params(rows.clone());
                self.form_reply()
            }
            ConsoleRequest::Backtest => match self.click_backtest() {
                Ok(_) => self.status_reply(),
                Err(e) => ConsoleReply::error(e.to_string()),
            },
            ConsoleRequest::Status => self.status_reply(),
            ConsoleRequest::Statistics => ConsoleReply::Statistics {
                job: self.job_id(),
                statistic: self.statistics(),
            },
            ConsoleRequest::Chart => ConsoleReply::Chart {
                job: self.job_id(),
                figure: self.chart(),
            },
            ConsoleRequest::Refresh { module } => match self.runner.refresh_module(module) {
                Ok(version) => ConsoleReply::Refreshed {
                    module: module.clone(),
                    version,
                },
                Err(e) => ConsoleReply::error(e.to_string()),
            },
        }
    }

    pub fn status_reply(&self) -> ConsoleReply {
        ConsoleReply::Status {
            job: self.job_id(),
            clicks: self.clicks(),
            status: self.status(),
        }
    }

    fn form_reply(&self) -> ConsoleReply {
        ConsoleReply::Form {
            job: self.job_id(),
            module: self.module().map(str::to_string),
            strategy: self.strategy().map(str::to_string),
            strategies: self
                .module()
                .map(|m| self.runner.strategy_options(m))
                .unwrap_or_default(),
            symbols: self.symbols().to_vec(),
            rows: self.params().to_vec(),
        }
    }
}
