//! End-to-end: console runs streamed through the log listener

use crate::support::{pipeline, Pipeline};
use futures_util::{SinkExt, StreamExt};
use omega_ui::config::ListenerConfig;
use omega_ui::console::{Console, ConsoleReply};
use omega_ui::job::{JobId, JobStatus};
use omega_ui::listener::{LogEvent, LogListener};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start(p: &Pipeline, console: bool) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let config = ListenerConfig {
        poll_interval_ms: 0,
        ..ListenerConfig::default()
    };
    let mut server = LogListener::new(&config, p.broker.clone());
    if console {
        server = server.with_console(p.runner.clone());
    }
    tokio::spawn(server.serve(listener));
    port
}

async fn connect(port: u16, path: &str) -> Client {
    let (client, _) = connect_async(format!("ws://127.0.0.1:{}{}", port, path))
        .await
        .unwrap();
    client
}

async fn next_text(client: &mut Client) -> String {
    loop {
        let msg = timeout(Duration::from_secs(10), client.next())
            .await
            .expect("timed out waiting for message")
            .expect("stream ended")
            .unwrap();
        if let Message::Text(text) = msg {
            return text;
        }
    }
}

async fn next_event(client: &mut Client) -> LogEvent {
    serde_json::from_str(&next_text(client).await).unwrap()
}

async fn request(client: &mut Client, body: Value) -> ConsoleReply {
    client.send(Message::Text(body.to_string())).await.unwrap();
    serde_json::from_str(&next_text(client).await).unwrap()
}

/// Subscribe a log client to `job` at 640x480
async fn subscribe(port: u16, job: JobId) -> Client {
    let mut log = connect(port, "/omega_log").await;
    assert_eq!(next_event(&mut log).await, LogEvent::new("Connected", 0));
    let hello = format!("{};640,480", job);
    log.send(Message::Text(hello.clone())).await.unwrap();
    assert_eq!(next_event(&mut log).await, LogEvent::new(hello, 1));
    log
}

/// Read forwarded records up to the run's final one
async fn collect_run(log: &mut Client) -> Vec<LogEvent> {
    let mut events = Vec::new();
    loop {
        let event = next_event(log).await;
        let done = event.data.ends_with("DEBUG: done");
        events.push(event);
        if done {
            return events;
        }
    }
}

fn assert_run_stream(job: JobId, events: &[LogEvent]) {
    let first = &events[0];
    assert!(first.data.starts_with(&job.to_string()), "{}", first.data);
    assert!(first.data.ends_with("DEBUG: start"), "{}", first.data);
    assert_eq!(first.count, 1);
    assert!(events.iter().any(|e| e.data.ends_with("INFO: TestData: 5.00")));
    assert!(events.windows(2).all(|w| w[0].count < w[1].count));
}

#[tokio::test]
async fn test_listener_streams_console_run() {
    let p = pipeline();
    let port = start(&p, false).await;

    let mut console = Console::new(p.runner.clone());
    console.select_module(Some("examples"));
    console.select_strategy(Some("StatsTest"));
    console.select_symbols(vec!["TestData".to_string()]);
    let job = console.job_id();
    let mut log = subscribe(port, job).await;

    console.click_backtest().unwrap();
    assert_eq!(console.run().await.unwrap(), &JobStatus::Completed);

    let events = collect_run(&mut log).await;
    assert_run_stream(job, &events);

    // Size written by the log connection reaches the chart
    let chart = console.chart().unwrap();
    assert_eq!(chart.width(), Some(640));
    assert_eq!(chart.height(), Some(480));
}

#[tokio::test]
async fn test_console_session_streams_to_log_namespace() {
    let p = pipeline();
    let port = start(&p, true).await;
    let mut session = connect(port, "/omega_console").await;

    let options: Value = serde_json::from_str(&next_text(&mut session).await).unwrap();
    assert_eq!(options["type"], "options");
    assert_eq!(options["modules"], json!(["examples"]));

    request(&mut session, json!({"type": "select_module", "module": "examples"})).await;
    request(&mut session, json!({"type": "select_strategy", "strategy": "StatsTest"})).await;
    let form = request(&mut session, json!({"type": "select_symbols", "symbols": ["TestData"]})).await;
    let ConsoleReply::Form { job, symbols, .. } = form else {
        panic!("expected form, got {:?}", form);
    };
    assert_eq!(symbols, vec!["TestData"]);

    let mut log = subscribe(port, job).await;

    let clicked = request(&mut session, json!({"type": "backtest"})).await;
    assert_eq!(
        clicked,
        ConsoleReply::Status {
            job,
            clicks: 1,
            status: "Backtesting...".to_string()
        }
    );
    let finished: ConsoleReply = serde_json::from_str(&next_text(&mut session).await).unwrap();
    assert_eq!(
        finished,
        ConsoleReply::Status {
            job,
            clicks: 1,
            status: "Done!".to_string()
        }
    );

    let events = collect_run(&mut log).await;
    assert_run_stream(job, &events);

    let chart = request(&mut session, json!({"type": "chart"})).await;
    let ConsoleReply::Chart { figure: Some(figure), .. } = chart else {
        panic!("expected chart, got {:?}", chart);
    };
    assert_eq!(figure.layout["width"], 640);

    let ConsoleReply::Statistics { statistic, .. } =
        request(&mut session, json!({"type": "statistics"})).await
    else {
        panic!("expected statistics");
    };
    assert_eq!(statistic.trade.trades, 4);
}

#[tokio::test]
async fn test_console_session_rejects_bad_requests() {
    let p = pipeline();
    let port = start(&p, true).await;
    let mut session = connect(port, "/omega_console").await;
    next_text(&mut session).await;

    let reply = request(&mut session, json!({"type": "launch"})).await;
    let ConsoleReply::Error { message } = reply else {
        panic!("expected error, got {:?}", reply);
    };
    assert!(message.starts_with("Invalid request"));

    // Session survives the bad request
    let reply = request(&mut session, json!({"type": "status"})).await;
    assert!(matches!(reply, ConsoleReply::Status { clicks: 0, .. }));
}

#[tokio::test]
async fn test_console_namespace_needs_runner() {
    let p = pipeline();
    let port = start(&p, false).await;
    let result = connect_async(format!("ws://127.0.0.1:{}/omega_console", port)).await;
    assert!(result.is_err());
}
