//! Prometheus metrics

use std::time::Duration;

/// Latency metric types
#[derive(Debug, Clone, Copy)]
pub enum LatencyMetric {
    /// Wall time of one backtest run
    BacktestRun,
    /// Building a chart from a cached bundle
    ChartRender,
}

/// Counter metric types
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    /// Runs that produced a result bundle
    RunsCompleted,
    /// Runs that ended in an error
    RunsFailed,
    /// Log records forwarded to browsers
    RecordsForwarded,
    /// Channel payloads that were not valid log records
    RecordsMalformed,
    /// Listener connections refused because the pool was full
    ConnectionsRejected,
}

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Open listener connections
    ActiveConnections,
}

fn latency_name(metric: LatencyMetric) -> &'static str {
    match metric {
        LatencyMetric::BacktestRun => "omega_backtest_run_latency_ms",
        LatencyMetric::ChartRender => "omega_chart_render_latency_ms",
    }
}

fn counter_name(metric: CounterMetric) -> &'static str {
    match metric {
        CounterMetric::RunsCompleted => "omega_backtest_runs_completed_total",
        CounterMetric::RunsFailed => "omega_backtest_runs_failed_total",
        CounterMetric::RecordsForwarded => "omega_log_records_forwarded_total",
        CounterMetric::RecordsMalformed => "omega_log_records_malformed_total",
        CounterMetric::ConnectionsRejected => "omega_listener_connections_rejected_total",
    }
}

fn gauge_name(metric: GaugeMetric) -> &'static str {
    match metric {
        GaugeMetric::ActiveConnections => "omega_listener_active_connections",
    }
}

/// Record a latency measurement
pub fn record_latency(metric: LatencyMetric, duration: Duration) {
    let metric_name = latency_name(metric);
    let value_ms = duration.as_secs_f64() * 1000.0;
    ::metrics::histogram!(metric_name).record(value_ms);
    tracing::trace!(metric = metric_name, value_ms, "Recording latency");
}

/// Increment a counter by one
pub fn increment(metric: CounterMetric) {
    ::metrics::counter!(counter_name(metric)).increment(1);
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    let metric_name = gauge_name(metric);
    ::metrics::gauge!(metric_name).set(value);
    tracing::trace!(metric = metric_name, value, "Setting gauge");
}
