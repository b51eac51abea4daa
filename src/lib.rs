//! omega-ui: backend of a browser backtest console
//!
//! This library provides the core components for:
//! - Job ids correlating a run with its log stream and cached results
//! - An in-process pub/sub broker with a key/value cache
//! - Routing of run logs to per-job channels and log files
//! - A WebSocket listener pushing live logs to browsers
//! - A backtest runner over a pluggable engine and strategy registry
//! - Tearsheet statistics and chart figures from cached results

pub mod backtest;
pub mod broker;
pub mod cli;
pub mod config;
pub mod console;
pub mod engine;
pub mod job;
pub mod listener;
pub mod logstream;
pub mod strategy;
pub mod tearsheet;
pub mod telemetry;
pub mod users;
