//! Job state machine
//!
//! `Idle -> ParamsCollected -> Running -> {Completed | Failed}`. A job only
//! runs once; a new run needs a freshly minted [`JobId`].

use super::JobId;
use crate::backtest::BacktestResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Parameters collected from the form when the backtest button is clicked
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobParams {
    #[serde(rename = "module_i")]
    pub module: Option<String>,
    #[serde(rename = "strategy_i")]
    pub strategy: Option<String>,
    #[serde(rename = "symbols_i")]
    pub symbols: Option<Vec<String>>,
    /// Parameter table, every value stringified
    pub table_params: BTreeMap<String, String>,
}

impl JobParams {
    /// Required fields that are unset, in display order
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.module.as_deref().map_or(true, str::is_empty) {
            missing.push("module");
        }
        if self.strategy.as_deref().map_or(true, str::is_empty) {
            missing.push("strategy");
        }
        if self.symbols.as_ref().map_or(true, Vec::is_empty) {
            missing.push("symbol");
        }
        missing
    }
}

/// Lifecycle of a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Idle,
    ParamsCollected,
    Running,
    Completed,
    Failed(String),
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed(_))
    }

    fn name(&self) -> &'static str {
        match self {
            JobStatus::Idle => "idle",
            JobStatus::ParamsCollected => "params-collected",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed(_) => "failed",
        }
    }
}

/// Job state machine errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum JobError {
    #[error("Cannot {action} job {id} while {status}")]
    InvalidTransition {
        id: JobId,
        action: &'static str,
        status: &'static str,
    },
}

/// One backtest invocation: `{status, params, result}`
#[derive(Debug, Clone)]
pub struct Job {
    id: JobId,
    status: JobStatus,
    params: Option<JobParams>,
    result: Option<BacktestResult>,
}

impl Job {
    pub fn new(id: JobId) -> Self {
        Self {
            id,
            status: JobStatus::Idle,
            params: None,
            result: None,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn status(&self) -> &JobStatus {
        &self.status
    }

    pub fn params(&self) -> Option<&JobParams> {
        self.params.as_ref()
    }

    pub fn result(&self) -> Option<&BacktestResult> {
        self.result.as_ref()
    }

    /// Record (or replace) the collected parameters
    pub fn collect(&mut self, params: JobParams) -> Result<(), JobError> {
        match self.status {
            JobStatus::Idle | JobStatus::ParamsCollected => {
                self.params = Some(params);
                self.status = JobStatus::ParamsCollected;
                Ok(())
            }
            _ => Err(self.invalid("collect params for")),
        }
    }

    /// Mark the job as running, handing out its parameters
    pub fn start(&mut self) -> Result<JobParams, JobError> {
        match (&self.status, &self.params) {
            (JobStatus::ParamsCollected, Some(params)) => {
                let params = params.clone();
                self.status = JobStatus::Running;
                Ok(params)
            }
            _ => Err(self.invalid("start")),
        }
    }

    pub fn complete(&mut self, result: BacktestResult) -> Result<(), JobError> {
        if self.status != JobStatus::Running {
            return Err(self.invalid("complete"));
        }
        self.result = Some(result);
        self.status = JobStatus::Completed;
        Ok(())
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), JobError> {
        if self.status != JobStatus::Running {
            return Err(self.invalid("fail"));
        }
        self.status = JobStatus::Failed(reason.into());
        Ok(())
    }

    fn invalid(&self, action: &'static str) -> JobError {
        JobError::InvalidTransition {
            id: self.id,
            action,
            status: self.status.name(),
        }
    }
}
