//! WebSocket server forwarding job log records to browsers
//!
//! Two paths share one port: the log namespace streams a job's records, and
//! the console namespace (when a runner is attached) hosts a [`Console`]
//! session whose runs publish on the same broker.

use super::protocol::{ConnectRequest, ListenerError, LogEvent};
use crate::backtest::BacktestRunner;
use crate::broker::{log_channel, size_key, MessageBroker, Subscription};
use crate::config::ListenerConfig;
use crate::console::{Console, ConsoleReply, ConsoleRequest};
use crate::job::JobId;
use crate::logstream::LogRecord;
use crate::telemetry::{self, CounterMetric, GaugeMetric};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};

type WsWriter = SplitSink<WebSocketStream<TcpStream>, Message>;
type WsReader = SplitStream<WebSocketStream<TcpStream>>;

/// Push listener: one task per browser connection, bounded by a pool
pub struct LogListener {
    namespace: Arc<str>,
    console_namespace: Arc<str>,
    poll_interval: Duration,
    bind: SocketAddr,
    broker: Arc<dyn MessageBroker>,
    runner: Option<Arc<BacktestRunner>>,
    pool: Arc<Semaphore>,
    max_connections: usize,
}

impl LogListener {
    pub fn new(config: &ListenerConfig, broker: Arc<dyn MessageBroker>) -> Self {
        Self {
            namespace: Arc::from(config.namespace.as_str()),
            console_namespace: Arc::from(config.console_namespace.as_str()),
            poll_interval: config.poll_interval(),
            bind: config.bind,
            broker,
            runner: None,
            pool: Arc::new(Semaphore::new(config.max_connections)),
            max_connections: config.max_connections,
        }
    }

    /// Serve console sessions backed by `runner`
    ///
    /// The runner must publish on this listener's broker, or its runs never
    /// reach the log namespace.
    pub fn with_console(mut self, runner: Arc<BacktestRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    /// Bind the configured address and serve forever
    pub async fn run(self) -> Result<(), ListenerError> {
        let listener = TcpListener::bind(self.bind)
            .await
            .map_err(|source| ListenerError::Bind {
                addr: self.bind,
                source,
            })?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound socket
    pub async fn serve(self, listener: TcpListener) -> Result<(), ListenerError> {
        tracing::info!(
            addr = %listener.local_addr()?,
            namespace = %self.namespace,
            console_namespace = %self.console_namespace,
            console = self.runner.is_some(),
            pool = self.max_connections,
            "Log listener started"
        );

        loop {
            let (stream, peer) = listener.accept().await?;

            let Ok(permit) = self.pool.clone().try_acquire_owned() else {
                telemetry::increment(CounterMetric::ConnectionsRejected);
                tracing::warn!(%peer, "Connection pool exhausted, rejecting");
                drop(stream);
                continue;
            };
            self.report_active();

            let connection = Connection {
                namespace: self.namespace.clone(),
                console_namespace: self.console_namespace.clone(),
                poll_interval: self.poll_interval,
                broker: self.broker.clone(),
                runner: self.runner.clone(),
            };
            let pool = self.pool.clone();
            let max_connections = self.max_connections;
            tokio::spawn(async move {
                match connection.handle(stream).await {
                    Ok(()) => tracing::debug!(%peer, "Client disconnected"),
                    Err(e) => tracing::warn!(%peer, error = %e, "Connection closed with error"),
                }
                drop(permit);
                let active = max_connections.saturating_sub(pool.available_permits());
                telemetry::set_gauge(GaugeMetric::ActiveConnections, active as f64);
            });
        }
    }

    fn report_active(&self) {
        let active = self.max_connections.saturating_sub(self.pool.available_permits());
        telemetry::set_gauge(GaugeMetric::ActiveConnections, active as f64);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Log,
    Console,
}

struct Connection {
    namespace: Arc<str>,
    console_namespace: Arc<str>,
    poll_interval: Duration,
    broker: Arc<dyn MessageBroker>,
    runner: Option<Arc<BacktestRunner>>,
}

async fn send<T: Serialize>(write: &mut WsWriter, event: &T) -> Result<(), ListenerError> {
    let text = serde_json::to_string(event)?;
    write
        .send(Message::Text(text))
        .await
        .map_err(|e| ListenerError::SendFailed(e.to_string()))
}

impl Connection {
    async fn handle(self, stream: TcpStream) -> Result<(), ListenerError> {
        let mut route = None;
        let check_path = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
            let path = request.uri().path();
            if path == &*self.namespace {
                route = Some(Route::Log);
                Ok(response)
            } else if self.runner.is_some() && path == &*self.console_namespace {
                route = Some(Route::Console);
                Ok(response)
            } else {
                let mut not_found = ErrorResponse::new(Some("Not Found".to_string()));
                *not_found.status_mut() = StatusCode::NOT_FOUND;
                Err(not_found)
            }
        };
        let ws = accept_hdr_async(stream, check_path)
            .await
            .map_err(|e| ListenerError::Handshake(e.to_string()))?;
        let (write, read) = ws.split();

        match (route, &self.runner) {
            (Some(Route::Console), Some(runner)) => Self::session(runner.clone(), write, read).await,
            _ => self.stream_log(write, read).await,
        }
    }

    async fn stream_log(&self, mut write: WsWriter, mut read: WsReader) -> Result<(), ListenerError> {
        send(&mut write, &LogEvent::new("Connected", 0)).await?;

        let request = loop {
            match read.next().await {
                Some(Ok(Message::Text(text))) => break ConnectRequest::parse(&text)?,
                Some(Ok(Message::Ping(data))) => {
                    write
                        .send(Message::Pong(data))
                        .await
                        .map_err(|e| ListenerError::SendFailed(e.to_string()))?;
                }
                Some(Ok(Message::Close(_))) | None => return Ok(()),
                Some(Err(e)) => return Err(ListenerError::ConnectionFailed(e.to_string())),
                Some(Ok(_)) => {}
            }
        };

        self.broker.set(&size_key(&request.job), &request.size.to_string())?;
        let subscription = self.broker.subscribe(&log_channel(&request.job))?;
        tracing::info!(job = %request.job, size = %request.size, "Client subscribed");
        send(&mut write, &LogEvent::new(request.text.as_str(), 1)).await?;

        self.forward(request.job, subscription, write, read).await
    }

    async fn forward(
        &self,
        job: JobId,
        mut subscription: Subscription,
        mut write: WsWriter,
        mut read: WsReader,
    ) -> Result<(), ListenerError> {
        let mut count: u64 = 0;
        loop {
            tokio::select! {
                payload = subscription.next() => {
                    let Some(payload) = payload else {
                        return Ok(());
                    };
                    count += 1;
                    sleep(self.poll_interval).await;
                    match LogRecord::from_payload(&payload) {
                        Some(record) => {
                            send(&mut write, &LogEvent::new(record.display(&job), count)).await?;
                            telemetry::increment(CounterMetric::RecordsForwarded);
                        }
                        None => {
                            telemetry::increment(CounterMetric::RecordsMalformed);
                            tracing::debug!(%job, "Dropping malformed log record");
                        }
                    }
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await
                                .map_err(|e| ListenerError::SendFailed(e.to_string()))?;
                        }
                        Some(Ok(Message::Close(_))) | None => return Ok(()),
                        Some(Err(e)) => return Err(ListenerError::ConnectionFailed(e.to_string())),
                        Some(Ok(_)) => tracing::debug!(%job, "Ignoring client message after connect"),
                    }
                }
            }
        }
    }

    /// One console per connection; requests are handled in order
    async fn session(
        runner: Arc<BacktestRunner>,
        mut write: WsWriter,
        mut read: WsReader,
    ) -> Result<(), ListenerError> {
        let mut console = Console::new(runner);
        send(&mut write, &console.handle(&ConsoleRequest::Options)).await?;

        loop {
            let text = match read.next().await {
                Some(Ok(Message::Text(text))) => text,
                Some(Ok(Message::Ping(data))) => {
                    write
                        .send(Message::Pong(data))
                        .await
                        .map_err(|e| ListenerError::SendFailed(e.to_string()))?;
                    continue;
                }
                Some(Ok(Message::Close(_))) | None => return Ok(()),
                Some(Err(e)) => return Err(ListenerError::ConnectionFailed(e.to_string())),
                Some(Ok(_)) => continue,
            };

            let request = match serde_json::from_str::<ConsoleRequest>(&text) {
                Ok(request) => request,
                Err(e) => {
                    tracing::debug!(error = %e, "Rejecting console request");
                    send(&mut write, &ConsoleReply::error(format!("Invalid request: {}", e))).await?;
                    continue;
                }
            };

            send(&mut write, &console.handle(&request)).await?;
            if request == ConsoleRequest::Backtest {
                let outcome = console.run().await.map(|_| ());
                let reply = match outcome {
                    Ok(()) => console.status_reply(),
                    Err(e) => ConsoleReply::error(e.to_string()),
                };
                send(&mut write, &reply).await?;
            }
        }
    }
}
