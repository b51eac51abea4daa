//! Integration tests for the console pipeline

use crate::support::pipeline;
use omega_ui::backtest::BacktestResult;
use omega_ui::broker::{log_channel, result_key, size_key, MessageBroker};
use omega_ui::console::Console;
use omega_ui::job::JobStatus;
use omega_ui::logstream::LogRecord;

#[tokio::test]
async fn test_full_backtest_pipeline() {
    let p = pipeline();
    let mut console = Console::new(p.runner.clone());

    let strategies = console.select_module(Some("examples"));
    assert!(strategies.contains(&"StatsTest".to_string()));
    console.select_strategy(Some("StatsTest"));
    console.select_symbols(vec!["TestData".to_string()]);

    let job = console.job_id();
    let mut subscription = p.broker.subscribe(&log_channel(&job)).unwrap();
    p.broker.set(&size_key(&job), "640,480").unwrap();

    console.click_backtest().unwrap();
    let status = console.run().await.unwrap().clone();
    assert_eq!(status, JobStatus::Completed);
    assert_eq!(console.status(), "Done!");

    let mut messages = Vec::new();
    while let Some(payload) = subscription.try_next() {
        messages.push(LogRecord::from_payload(&payload).unwrap().message);
    }
    assert_eq!(messages.first().map(String::as_str), Some("start"));
    assert!(messages.iter().any(|m| m == "TestData: 5.00"));

    let bundle = p.broker.get(&result_key(&job)).unwrap().unwrap();
    let result = BacktestResult::from_json(&bundle).unwrap();
    assert_eq!(result.title, "TestData: 5.00");
    assert_eq!(console.statistics().trade.trades, 4);

    let chart = console.chart().unwrap();
    assert_eq!(chart.width(), Some(640));
    assert_eq!(chart.title(), Some("TestData: 5.00"));

    let log_files: Vec<_> = std::fs::read_dir(p.logs.path()).unwrap().collect();
    assert_eq!(log_files.len(), 1);
}

#[tokio::test]
async fn test_new_selection_drops_previous_result() {
    let p = pipeline();
    let mut console = Console::new(p.runner.clone());
    console.select_module(Some("examples"));
    console.select_strategy(Some("StatsTest"));
    console.select_symbols(vec!["TestData".to_string()]);
    console.click_backtest().unwrap();
    console.run().await.unwrap();
    let finished = console.job_id();
    assert!(p.broker.get(&result_key(&finished)).unwrap().is_some());

    console.select_symbols(vec!["AAPL".to_string()]);
    assert_ne!(console.job_id(), finished);
    assert!(p.broker.get(&result_key(&finished)).unwrap().is_none());
    assert_eq!(console.status(), "");
    assert_eq!(console.statistics().trade.trades, 0);
    assert!(console.chart().is_none());
}

#[tokio::test]
async fn test_failed_run_reports_error() {
    let p = pipeline();
    let mut console = Console::new(p.runner.clone());
    console.select_module(Some("examples"));
    console.select_strategy(Some("StatsTest"));
    console.select_symbols(vec!["NOPE".to_string()]);
    console.click_backtest().unwrap();

    let status = console.run().await.unwrap().clone();
    assert!(matches!(status, JobStatus::Failed(_)));
    assert!(console.status().starts_with("Error: "));
    assert!(console.chart().is_none());
}
