//! Configuration types for omega-ui

use crate::telemetry::LogFormat;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backtest: BacktestConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub listener: ListenerConfig,
    #[serde(default)]
    pub users: UsersConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Backtest defaults
#[derive(Debug, Clone, Deserialize)]
pub struct BacktestConfig {
    /// Starting cash shown as the first parameter row
    #[serde(default = "default_cash")]
    pub cash: Decimal,

    /// Strategy modules offered in the module dropdown
    #[serde(default = "default_modules")]
    pub modules: Vec<String>,

    /// Bars generated per symbol by the synthetic engine
    #[serde(default = "default_bars")]
    pub bars: usize,
}

fn default_cash() -> Decimal {
    Decimal::new(100_000, 0)
}
fn default_modules() -> Vec<String> {
    vec!["examples".to_string()]
}
fn default_bars() -> usize {
    500
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            cash: default_cash(),
            modules: default_modules(),
            bars: default_bars(),
        }
    }
}

/// Message broker configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    /// Buffered messages per channel before slow subscribers skip ahead
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_channel_capacity() -> usize {
    1024
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

/// Run log files
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Directory holding `backtestNNN-logs.txt` files
    #[serde(default = "default_log_root")]
    pub root: PathBuf,
}

fn default_log_root() -> PathBuf {
    PathBuf::from("./logs")
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            root: default_log_root(),
        }
    }
}

/// Log listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ListenerConfig {
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,

    /// WebSocket path browsers connect to
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// WebSocket path of console sessions driving backtests
    #[serde(default = "default_console_namespace")]
    pub console_namespace: String,

    /// Pause before forwarding each record
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Connection pool size
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 5000))
}
fn default_namespace() -> String {
    "/omega_log".to_string()
}
fn default_console_namespace() -> String {
    "/omega_console".to_string()
}
fn default_poll_interval_ms() -> u64 {
    10
}
fn default_max_connections() -> usize {
    1000
}

impl ListenerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            namespace: default_namespace(),
            console_namespace: default_console_namespace(),
            poll_interval_ms: default_poll_interval_ms(),
            max_connections: default_max_connections(),
        }
    }
}

/// Credentials file
#[derive(Debug, Clone, Deserialize)]
pub struct UsersConfig {
    #[serde(default = "default_users_file")]
    pub file: PathBuf,
}

fn default_users_file() -> PathBuf {
    PathBuf::from("users.json")
}

impl Default for UsersConfig {
    fn default() -> Self {
        Self {
            file: default_users_file(),
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
    /// Prometheus exporter port; no exporter when unset
    pub metrics_port: Option<u16>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            metrics_port: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
