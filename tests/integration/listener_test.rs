//! Integration tests for the log listener

use futures_util::{SinkExt, StreamExt};
use omega_ui::broker::{log_channel, size_key, InMemoryBroker, MessageBroker};
use omega_ui::config::ListenerConfig;
use omega_ui::job::JobId;
use omega_ui::listener::{LogEvent, LogListener};
use omega_ui::logstream::{LogLevel, LogRecord};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start(broker: Arc<InMemoryBroker>) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let config = ListenerConfig {
        poll_interval_ms: 0,
        ..ListenerConfig::default()
    };
    tokio::spawn(LogListener::new(&config, broker).serve(listener));
    port
}

async fn next_event(client: &mut Client) -> LogEvent {
    loop {
        let msg = timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for event")
            .expect("stream ended")
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn connect(port: u16) -> Client {
    let (client, _) = connect_async(format!("ws://127.0.0.1:{}/omega_log", port))
        .await
        .unwrap();
    client
}

fn payload(message: &str) -> String {
    LogRecord::new(LogLevel::Info, message, "omega.run")
        .to_payload()
        .unwrap()
}

#[tokio::test]
async fn test_connect_and_stream_records() {
    let broker = Arc::new(InMemoryBroker::new());
    let port = start(broker.clone()).await;
    let mut client = connect(port).await;

    assert_eq!(next_event(&mut client).await, LogEvent::new("Connected", 0));

    let job = JobId::new();
    let hello = format!("{};800,600", job);
    client.send(Message::Text(hello.clone())).await.unwrap();
    assert_eq!(next_event(&mut client).await, LogEvent::new(hello, 1));
    assert_eq!(broker.get(&size_key(&job)).unwrap().as_deref(), Some("800,600"));

    broker.publish(&log_channel(&job), &payload("start")).unwrap();
    let event = next_event(&mut client).await;
    assert_eq!(event.count, 1);
    assert_eq!(event.data, format!("{}omega.run: INFO: start", job));

    // Malformed records are dropped but still counted
    broker.publish(&log_channel(&job), "not a record").unwrap();
    broker.publish(&log_channel(&job), &payload("done")).unwrap();
    let event = next_event(&mut client).await;
    assert_eq!(event.count, 3);
    assert!(event.data.ends_with("INFO: done"));
}

#[tokio::test]
async fn test_other_jobs_are_not_forwarded() {
    let broker = Arc::new(InMemoryBroker::new());
    let port = start(broker.clone()).await;
    let mut client = connect(port).await;
    next_event(&mut client).await;

    let job = JobId::new();
    client
        .send(Message::Text(format!("{{\"data\": \"{};640,480\"}}", job)))
        .await
        .unwrap();
    assert_eq!(next_event(&mut client).await.count, 1);

    broker.publish(&log_channel(&JobId::new()), &payload("elsewhere")).unwrap();
    broker.publish(&log_channel(&job), &payload("mine")).unwrap();
    let event = next_event(&mut client).await;
    assert!(event.data.ends_with("mine"));
    assert_eq!(event.count, 1);
}

#[tokio::test]
async fn test_wrong_path_rejected() {
    let broker = Arc::new(InMemoryBroker::new());
    let port = start(broker).await;
    let result = connect_async(format!("ws://127.0.0.1:{}/elsewhere", port)).await;
    assert!(result.is_err());
}
